use std::ffi::{c_char, c_int, c_void};
use std::ptr;
use std::sync::Arc;

use crate::engine::engine_handle::EngineHandle;
use crate::native::domain::bindings::{Bindings, SingleImageFn};
use crate::native::domain::native_buffer::{CharNativeBuffer, RawNativeBuffer};
use crate::native::infrastructure::dynamic_library::NativeLibrary;
use crate::session::image_input::ImageInputArg;
use crate::shared::error::{PrivIdError, Result};

/// One native session pointer and the raw JSON-text operations on it.
///
/// Configs go in as encoded JSON bytes and results come back as the engine's
/// JSON text. Every buffer the engine hands back is freed before a method
/// returns. Calls take `&mut self` because the engine allows one call in
/// flight per session.
pub struct NativeSession {
    engine: EngineHandle,
    generation: u64,
    ptr: *mut c_void,
}

// SAFETY: the pointer is only used through `&mut self`, and the engine does
// not tie a session to the thread that created it.
unsafe impl Send for NativeSession {}

impl NativeSession {
    /// Open a session from encoded `SessionSettings`.
    pub fn new(engine: &EngineHandle, settings: &[u8]) -> Result<Self> {
        let (library, generation) = engine.current()?;
        let bindings = library.bindings();
        let len = c_len(settings, "session settings")?;

        let mut session: *mut c_void = ptr::null_mut();
        // SAFETY: `settings` outlives the call and `len` is its length;
        // `session` is a valid out-pointer.
        let ok = unsafe { (bindings.initialize_session)(settings.as_ptr().cast(), len, &mut session) };

        if !ok || session.is_null() {
            if !session.is_null() {
                // SAFETY: the engine handed out this pointer and nothing else holds it.
                unsafe { (bindings.deinitialize_session)(session) };
            }
            return Err(PrivIdError::Session(
                "native session initialization failed (check the session token and collection URLs)"
                    .into(),
            ));
        }

        log::debug!("Opened native session (engine generation {generation})");
        Ok(Self {
            engine: engine.clone(),
            generation,
            ptr: session,
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.ptr.is_null()
    }

    /// Release the native session. Safe to call more than once.
    ///
    /// If the engine was shut down since the session was opened, the
    /// pointer is already gone with it and is only forgotten here.
    pub fn dispose(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        let session = std::mem::replace(&mut self.ptr, ptr::null_mut());
        match self.engine.acquire(self.generation) {
            Ok(library) => {
                // SAFETY: `session` came from this engine generation and is
                // released exactly once.
                unsafe { (library.bindings().deinitialize_session)(session) };
                log::debug!("Released native session");
            }
            Err(_) => log::warn!("Engine shut down before session release; skipping native call"),
        }
    }

    fn library(&self) -> Result<Arc<NativeLibrary>> {
        if self.ptr.is_null() {
            return Err(PrivIdError::Session("session has been disposed".into()));
        }
        self.engine.acquire(self.generation)
    }

    fn single_image(
        &mut self,
        name: &'static str,
        select: fn(&Bindings) -> SingleImageFn,
        config: &[u8],
        image: &ImageInputArg,
    ) -> Result<(i32, String)> {
        let library = self.library()?;
        let bindings = library.bindings();
        let config_len = c_len(config, "config")?;
        let (width, height) = image.native_dims()?;

        let mut out: *mut c_char = ptr::null_mut();
        let mut out_len: c_int = 0;
        // SAFETY: every input outlives the call with its stated length; the
        // out-pointers are valid and adopted right after.
        let operation_id = unsafe {
            select(bindings)(
                self.ptr,
                config.as_ptr().cast(),
                config_len,
                image.data().as_ptr(),
                width,
                height,
                &mut out,
                &mut out_len,
            )
        };
        // SAFETY: written by the engine for this call.
        let result = unsafe { CharNativeBuffer::adopt(bindings, out, out_len) };

        log::debug!("{name} returned operation {operation_id}");
        Ok((operation_id, result.into_text()?))
    }

    pub fn validate(&mut self, config: &[u8], image: &ImageInputArg) -> Result<(i32, String)> {
        self.single_image("validate", |b| b.validate, config, image)
    }

    pub fn estimate_age(&mut self, config: &[u8], image: &ImageInputArg) -> Result<(i32, String)> {
        self.single_image("estimate_age", |b| b.estimate_age, config, image)
    }

    pub fn enroll_onefa(&mut self, config: &[u8], image: &ImageInputArg) -> Result<(i32, String)> {
        self.single_image("enroll_onefa", |b| b.enroll_onefa, config, image)
    }

    pub fn face_predict_onefa(
        &mut self,
        config: &[u8],
        image: &ImageInputArg,
    ) -> Result<(i32, String)> {
        self.single_image("face_predict_onefa", |b| b.face_predict_onefa, config, image)
    }

    pub fn anti_spoofing(&mut self, config: &[u8], image: &ImageInputArg) -> Result<(i32, String)> {
        self.single_image("anti_spoofing", |b| b.anti_spoofing, config, image)
    }

    /// Returns the ISO face crop bytes alongside the result.
    pub fn face_iso(
        &mut self,
        config: &[u8],
        image: &ImageInputArg,
    ) -> Result<(i32, String, Vec<u8>)> {
        let library = self.library()?;
        let bindings = library.bindings();
        let config_len = c_len(config, "config")?;
        let (width, height) = image.native_dims()?;

        let mut iso: *mut u8 = ptr::null_mut();
        let mut iso_len: c_int = 0;
        let mut out: *mut c_char = ptr::null_mut();
        let mut out_len: c_int = 0;
        // SAFETY: as in `single_image`, plus one more out-pair.
        let operation_id = unsafe {
            (bindings.face_iso)(
                self.ptr,
                config.as_ptr().cast(),
                config_len,
                image.data().as_ptr(),
                width,
                height,
                &mut iso,
                &mut iso_len,
                &mut out,
                &mut out_len,
            )
        };
        // SAFETY: written by the engine for this call.
        let (iso, result) = unsafe {
            (
                RawNativeBuffer::adopt(bindings, iso, iso_len),
                CharNativeBuffer::adopt(bindings, out, out_len),
            )
        };

        log::debug!("face_iso returned operation {operation_id}");
        let text = result.into_text()?;
        Ok((operation_id, text, iso.into_bytes()))
    }

    /// Returns the cropped document and cropped face bytes alongside the result.
    pub fn doc_scan_face(
        &mut self,
        config: &[u8],
        image: &ImageInputArg,
    ) -> Result<(i32, String, Vec<u8>, Vec<u8>)> {
        let library = self.library()?;
        let bindings = library.bindings();
        let config_len = c_len(config, "config")?;
        let (width, height) = image.native_dims()?;

        let mut doc: *mut u8 = ptr::null_mut();
        let mut doc_len: c_int = 0;
        let mut face: *mut u8 = ptr::null_mut();
        let mut face_len: c_int = 0;
        let mut out: *mut c_char = ptr::null_mut();
        let mut out_len: c_int = 0;
        // SAFETY: as in `single_image`, plus two more out-pairs.
        let operation_id = unsafe {
            (bindings.doc_scan_face)(
                self.ptr,
                config.as_ptr().cast(),
                config_len,
                image.data().as_ptr(),
                width,
                height,
                &mut doc,
                &mut doc_len,
                &mut face,
                &mut face_len,
                &mut out,
                &mut out_len,
            )
        };
        // SAFETY: written by the engine for this call.
        let (doc, face, result) = unsafe {
            (
                RawNativeBuffer::adopt(bindings, doc, doc_len),
                RawNativeBuffer::adopt(bindings, face, face_len),
                CharNativeBuffer::adopt(bindings, out, out_len),
            )
        };

        log::debug!("doc_scan_face returned operation {operation_id}");
        let text = result.into_text()?;
        Ok((operation_id, text, doc.into_bytes(), face.into_bytes()))
    }

    pub fn face_compare_files(
        &mut self,
        config: &[u8],
        image_a: &ImageInputArg,
        image_b: &ImageInputArg,
    ) -> Result<(i32, String)> {
        let library = self.library()?;
        let bindings = library.bindings();
        let config_len = c_len(config, "config")?;
        let (width_a, height_a) = image_a.native_dims()?;
        let (width_b, height_b) = image_b.native_dims()?;

        let mut out: *mut c_char = ptr::null_mut();
        let mut out_len: c_int = 0;
        // SAFETY: both images outlive the call with their stated shapes.
        let operation_id = unsafe {
            (bindings.face_compare_files)(
                self.ptr,
                config.as_ptr().cast(),
                config_len,
                image_a.data().as_ptr(),
                width_a,
                height_a,
                image_b.data().as_ptr(),
                width_b,
                height_b,
                &mut out,
                &mut out_len,
            )
        };
        // SAFETY: written by the engine for this call.
        let result = unsafe { CharNativeBuffer::adopt(bindings, out, out_len) };

        log::debug!("face_compare_files returned operation {operation_id}");
        Ok((operation_id, result.into_text()?))
    }

    pub fn user_delete(&mut self, config: &[u8], puid: &str) -> Result<(i32, String)> {
        let library = self.library()?;
        let bindings = library.bindings();
        let config_len = c_len(config, "config")?;
        let puid_len = c_len(puid.as_bytes(), "puid")?;

        let mut out: *mut c_char = ptr::null_mut();
        let mut out_len: c_int = 0;
        // SAFETY: `config` and `puid` outlive the call with their lengths.
        let operation_id = unsafe {
            (bindings.user_delete)(
                self.ptr,
                config.as_ptr().cast(),
                config_len,
                puid.as_ptr().cast(),
                puid_len,
                &mut out,
                &mut out_len,
            )
        };
        // SAFETY: written by the engine for this call.
        let result = unsafe { CharNativeBuffer::adopt(bindings, out, out_len) };

        log::debug!("user_delete returned operation {operation_id}");
        Ok((operation_id, result.into_text()?))
    }

    /// Session-wide engine defaults. Returns what the engine answered.
    pub fn set_configuration(&mut self, config: &[u8]) -> Result<bool> {
        let library = self.library()?;
        let config_len = c_len(config, "config")?;
        // SAFETY: `config` outlives the call with its length.
        Ok(unsafe {
            (library.bindings().set_configuration)(self.ptr, config.as_ptr().cast(), config_len)
        })
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn c_len(bytes: &[u8], what: &str) -> Result<c_int> {
    c_int::try_from(bytes.len())
        .map_err(|_| PrivIdError::Session(format!("{what} of {} bytes is too large", bytes.len())))
}
