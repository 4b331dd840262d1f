use std::ffi::{c_char, c_int, c_void};
use std::marker::PhantomData;

use crate::native::domain::bindings::Bindings;
use crate::shared::error::{PrivIdError, Result};

/// Which engine deallocator owns a buffer.
pub trait BufferKind {
    type Elem;

    /// # Safety
    /// `ptr` must be non-null, engine-allocated and not yet freed.
    unsafe fn release(bindings: &Bindings, ptr: *mut Self::Elem);
}

/// Result strings, freed with `privid_free_char_buffer`.
pub enum CharBuffer {}

/// Image payloads, freed with `privid_free_buffer`.
pub enum RawBuffer {}

impl BufferKind for CharBuffer {
    type Elem = c_char;

    unsafe fn release(bindings: &Bindings, ptr: *mut c_char) {
        (bindings.free_char_buffer)(ptr);
    }
}

impl BufferKind for RawBuffer {
    type Elem = u8;

    unsafe fn release(bindings: &Bindings, ptr: *mut u8) {
        (bindings.free_buffer)(ptr.cast::<c_void>());
    }
}

/// Owns one engine-allocated buffer until it is dropped.
///
/// The bytes can only be read by consuming the buffer, and the matching free
/// function runs exactly once on drop, whichever path the caller takes.
pub struct NativeBuffer<'a, K: BufferKind> {
    ptr: *mut K::Elem,
    len: usize,
    bindings: &'a Bindings,
    _kind: PhantomData<K>,
}

pub type CharNativeBuffer<'a> = NativeBuffer<'a, CharBuffer>;
pub type RawNativeBuffer<'a> = NativeBuffer<'a, RawBuffer>;

impl<'a, K: BufferKind> NativeBuffer<'a, K> {
    /// Take ownership of an out-parameter pair written by the engine.
    ///
    /// # Safety
    /// `ptr` must be null or point to `len` readable bytes allocated by the
    /// engine that `bindings` belongs to, and nothing else may free it.
    pub unsafe fn adopt(bindings: &'a Bindings, ptr: *mut K::Elem, len: c_int) -> Self {
        if ptr.is_null() && len > 0 {
            log::warn!("Engine reported {len} bytes in a null buffer");
        }
        Self {
            ptr,
            len: usize::try_from(len).unwrap_or(0),
            bindings,
            _kind: PhantomData,
        }
    }

    /// True when there are no bytes to read.
    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }
        // SAFETY: `adopt` guarantees `len` readable bytes behind a non-null `ptr`.
        unsafe { std::slice::from_raw_parts(self.ptr.cast::<u8>(), self.len) }.to_vec()
    }
}

impl<'a> NativeBuffer<'a, CharBuffer> {
    /// UTF-8 JSON result text; an empty or invalid buffer is malformed.
    pub fn into_text(self) -> Result<String> {
        if self.is_empty() {
            return Err(PrivIdError::MalformedResponse(
                "engine returned an empty result buffer".into(),
            ));
        }
        let mut bytes = self.into_bytes();
        // Some engine builds count the terminating NUL in the length.
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        String::from_utf8(bytes)
            .map_err(|e| PrivIdError::MalformedResponse(format!("result is not UTF-8: {e}")))
    }
}

impl<K: BufferKind> Drop for NativeBuffer<'_, K> {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        // SAFETY: non-null, engine-allocated, and this is the only owner.
        unsafe { K::release(self.bindings, self.ptr) };
        self.ptr = std::ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::stub;

    stub::stub_library!(lib);

    #[test]
    fn test_text_buffer_freed_once_after_read() {
        let bindings = lib::bindings();
        let (ptr, len) = stub::alloc_text("{\"call_status\":{}}");
        stub::reset();

        let text = unsafe { CharNativeBuffer::adopt(&bindings, ptr, len) }
            .into_text()
            .unwrap();

        assert_eq!(text, "{\"call_status\":{}}");
        let ledger = stub::ledger();
        assert_eq!(ledger.char_frees, 1);
        assert_eq!(ledger.raw_frees, 0);
    }

    #[test]
    fn test_raw_buffer_uses_raw_free() {
        let bindings = lib::bindings();
        let (ptr, len) = stub::alloc_bytes(&[1, 2, 3]);
        stub::reset();

        let bytes = unsafe { RawNativeBuffer::adopt(&bindings, ptr, len) }.into_bytes();

        assert_eq!(bytes, vec![1, 2, 3]);
        let ledger = stub::ledger();
        assert_eq!(ledger.raw_frees, 1);
        assert_eq!(ledger.char_frees, 0);
    }

    #[test]
    fn test_dropped_unread_buffer_is_freed() {
        let bindings = lib::bindings();
        let (ptr, len) = stub::alloc_bytes(&[9; 16]);
        stub::reset();

        drop(unsafe { RawNativeBuffer::adopt(&bindings, ptr, len) });

        assert_eq!(stub::ledger().raw_frees, 1);
    }

    #[test]
    fn test_null_buffer_is_empty_and_not_freed() {
        let bindings = lib::bindings();
        stub::reset();

        let buffer = unsafe { RawNativeBuffer::adopt(&bindings, std::ptr::null_mut(), 42) };
        assert!(buffer.is_empty());
        assert!(buffer.into_bytes().is_empty());

        assert_eq!(stub::ledger().raw_frees, 0);
    }

    #[test]
    fn test_empty_text_is_malformed_but_still_freed() {
        let bindings = lib::bindings();
        let (ptr, _) = stub::alloc_text("ignored");
        stub::reset();

        let err = unsafe { CharNativeBuffer::adopt(&bindings, ptr, 0) }
            .into_text()
            .unwrap_err();

        assert!(matches!(err, PrivIdError::MalformedResponse(_)));
        assert_eq!(stub::ledger().char_frees, 1);
    }

    #[test]
    fn test_trailing_nul_is_trimmed() {
        let bindings = lib::bindings();
        let (ptr, len) = stub::alloc_text("{}\0");
        let text = unsafe { CharNativeBuffer::adopt(&bindings, ptr, len) }
            .into_text()
            .unwrap();
        assert_eq!(text, "{}");
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let bindings = lib::bindings();
        let (ptr, len) = stub::alloc_bytes(&[0xff, 0xfe]);
        let err = unsafe { CharNativeBuffer::adopt(&bindings, ptr.cast(), len) }
            .into_text()
            .unwrap_err();
        assert!(matches!(err, PrivIdError::MalformedResponse(_)));
    }
}
