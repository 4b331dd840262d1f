//! In-process stand-in for the engine's C ABI.
//!
//! Lifecycle functions live in per-test modules generated by
//! [`stub_library!`] so their counters are not shared between tests.
//! Session and operation functions record into a thread-local ledger and
//! answer from a thread-local script.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_void, CStr};

use crate::native::domain::bindings::{
    Bindings, GetLogLevelFn, GetVersionFn, InitializeLibFn, IsLibraryInitializedFn,
    SetLogLevelFn, ShutdownLibFn,
};
use crate::native::infrastructure::dynamic_library::NativeLibrary;
use crate::native::infrastructure::library_loader::{LoadStrategy, LoadedEngine};
use crate::shared::error::Result;

#[derive(Clone, Debug, Default)]
pub struct Ledger {
    pub char_frees: usize,
    pub raw_frees: usize,
    pub sessions_created: usize,
    pub sessions_released: usize,
    pub calls: Vec<&'static str>,
    pub last_settings: Option<String>,
    pub last_config: Option<String>,
    pub last_dims: Vec<(c_int, c_int)>,
    pub last_puid: Option<String>,
}

#[derive(Clone, Debug)]
struct Script {
    operation_id: i32,
    result: Option<String>,
    aux: Vec<Option<Vec<u8>>>,
    reject_sessions: bool,
    accept_configuration: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            operation_id: 1,
            result: Some(r#"{"call_status":{"return_status":0,"operation_id":1}}"#.into()),
            aux: Vec::new(),
            reject_sessions: false,
            accept_configuration: true,
        }
    }
}

thread_local! {
    static LEDGER: RefCell<Ledger> = RefCell::new(Ledger::default());
    static SCRIPT: RefCell<Script> = RefCell::new(Script::default());
}

pub fn ledger() -> Ledger {
    LEDGER.with(|l| l.borrow().clone())
}

/// Clear the ledger and restore the default script.
pub fn reset() {
    LEDGER.with(|l| *l.borrow_mut() = Ledger::default());
    SCRIPT.with(|s| *s.borrow_mut() = Script::default());
}

fn record(f: impl FnOnce(&mut Ledger)) {
    LEDGER.with(|l| f(&mut l.borrow_mut()));
}

/// Next operations return `operation_id` and `result`.
pub fn reply(operation_id: i32, result: &str) {
    SCRIPT.with(|s| {
        let mut s = s.borrow_mut();
        s.operation_id = operation_id;
        s.result = Some(result.to_string());
        s.aux.clear();
    });
}

/// Auxiliary image buffers for the next operations; `None` writes a null pointer.
pub fn reply_aux(aux: Vec<Option<Vec<u8>>>) {
    SCRIPT.with(|s| s.borrow_mut().aux = aux);
}

/// Next operations write a null result pointer.
pub fn reply_without_result(operation_id: i32) {
    SCRIPT.with(|s| {
        let mut s = s.borrow_mut();
        s.operation_id = operation_id;
        s.result = None;
    });
}

pub fn reject_sessions(reject: bool) {
    SCRIPT.with(|s| s.borrow_mut().reject_sessions = reject);
}

pub fn accept_configuration(accept: bool) {
    SCRIPT.with(|s| s.borrow_mut().accept_configuration = accept);
}

fn script() -> Script {
    SCRIPT.with(|s| s.borrow().clone())
}

pub fn alloc_bytes(bytes: &[u8]) -> (*mut u8, c_int) {
    // SAFETY: malloc of at least one byte; the copy stays within the allocation.
    unsafe {
        let ptr = libc::malloc(bytes.len().max(1)).cast::<u8>();
        assert!(!ptr.is_null());
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        (ptr, bytes.len() as c_int)
    }
}

pub fn alloc_text(text: &str) -> (*mut c_char, c_int) {
    let (ptr, len) = alloc_bytes(text.as_bytes());
    (ptr.cast(), len)
}

unsafe fn read_text(ptr: *const c_char, len: c_int) -> String {
    if ptr.is_null() || len <= 0 {
        return String::new();
    }
    let bytes = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
    String::from_utf8_lossy(bytes).into_owned()
}

unsafe extern "C" fn free_char_buffer(ptr: *mut c_char) {
    record(|l| l.char_frees += 1);
    libc::free(ptr.cast());
}

unsafe extern "C" fn free_buffer(ptr: *mut c_void) {
    record(|l| l.raw_frees += 1);
    libc::free(ptr);
}

unsafe extern "C" fn initialize_session(
    settings: *const c_char,
    len: c_int,
    out: *mut *mut c_void,
) -> bool {
    let text = read_text(settings, len);
    record(|l| l.last_settings = Some(text));
    if script().reject_sessions {
        *out = std::ptr::null_mut();
        return false;
    }
    record(|l| l.sessions_created += 1);
    *out = Box::into_raw(Box::new(0u64)).cast();
    true
}

unsafe extern "C" fn deinitialize_session(session: *mut c_void) {
    record(|l| l.sessions_released += 1);
    if !session.is_null() {
        drop(Box::from_raw(session.cast::<u64>()));
    }
}

unsafe extern "C" fn set_configuration(
    _session: *mut c_void,
    config: *const c_char,
    len: c_int,
) -> bool {
    let text = read_text(config, len);
    record(|l| {
        l.calls.push("set_configuration");
        l.last_config = Some(text);
    });
    script().accept_configuration
}

unsafe fn write_buffer<T>(bytes: Option<&Vec<u8>>, out: *mut *mut T, out_len: *mut c_int) {
    match bytes {
        Some(bytes) => {
            let (ptr, len) = alloc_bytes(bytes);
            *out = ptr.cast();
            *out_len = len;
        }
        None => {
            *out = std::ptr::null_mut();
            *out_len = 0;
        }
    }
}

unsafe fn answer(
    name: &'static str,
    config: *const c_char,
    config_len: c_int,
    dims: &[(c_int, c_int)],
    out: *mut *mut c_char,
    out_len: *mut c_int,
) -> i32 {
    let text = read_text(config, config_len);
    record(|l| {
        l.calls.push(name);
        l.last_config = Some(text);
        l.last_dims = dims.to_vec();
    });
    let script = script();
    let result = script.result.map(String::into_bytes);
    write_buffer(result.as_ref(), out, out_len);
    script.operation_id
}

fn aux(index: usize) -> Option<Vec<u8>> {
    script().aux.get(index).cloned().flatten()
}

macro_rules! single_image_stub {
    ($fn_name:ident) => {
        unsafe extern "C" fn $fn_name(
            _session: *mut c_void,
            config: *const c_char,
            config_len: c_int,
            _image: *const u8,
            width: c_int,
            height: c_int,
            out: *mut *mut c_char,
            out_len: *mut c_int,
        ) -> i32 {
            answer(
                stringify!($fn_name),
                config,
                config_len,
                &[(width, height)],
                out,
                out_len,
            )
        }
    };
}

single_image_stub!(validate);
single_image_stub!(estimate_age);
single_image_stub!(enroll_onefa);
single_image_stub!(face_predict_onefa);
single_image_stub!(anti_spoofing);

unsafe extern "C" fn user_delete(
    _session: *mut c_void,
    config: *const c_char,
    config_len: c_int,
    puid: *const c_char,
    puid_len: c_int,
    out: *mut *mut c_char,
    out_len: *mut c_int,
) -> i32 {
    let puid = read_text(puid, puid_len);
    record(|l| l.last_puid = Some(puid));
    answer("user_delete", config, config_len, &[], out, out_len)
}

unsafe extern "C" fn doc_scan_face(
    _session: *mut c_void,
    config: *const c_char,
    config_len: c_int,
    _image: *const u8,
    width: c_int,
    height: c_int,
    doc_out: *mut *mut u8,
    doc_len: *mut c_int,
    face_out: *mut *mut u8,
    face_len: *mut c_int,
    out: *mut *mut c_char,
    out_len: *mut c_int,
) -> i32 {
    write_buffer(aux(0).as_ref(), doc_out, doc_len);
    write_buffer(aux(1).as_ref(), face_out, face_len);
    answer("doc_scan_face", config, config_len, &[(width, height)], out, out_len)
}

unsafe extern "C" fn face_compare_files(
    _session: *mut c_void,
    config: *const c_char,
    config_len: c_int,
    _a: *const u8,
    width_a: c_int,
    height_a: c_int,
    _b: *const u8,
    width_b: c_int,
    height_b: c_int,
    out: *mut *mut c_char,
    out_len: *mut c_int,
) -> i32 {
    answer(
        "face_compare_files",
        config,
        config_len,
        &[(width_a, height_a), (width_b, height_b)],
        out,
        out_len,
    )
}

unsafe extern "C" fn face_iso(
    _session: *mut c_void,
    config: *const c_char,
    config_len: c_int,
    _image: *const u8,
    width: c_int,
    height: c_int,
    iso_out: *mut *mut u8,
    iso_len: *mut c_int,
    out: *mut *mut c_char,
    out_len: *mut c_int,
) -> i32 {
    write_buffer(aux(0).as_ref(), iso_out, iso_len);
    answer("face_iso", config, config_len, &[(width, height)], out, out_len)
}

/// Full table from lifecycle functions plus the shared session functions.
pub fn with_lifecycle(
    get_version: GetVersionFn,
    initialize_lib: InitializeLibFn,
    set_log_level: SetLogLevelFn,
    get_log_level: GetLogLevelFn,
    is_library_initialized: IsLibraryInitializedFn,
    shutdown_lib: ShutdownLibFn,
) -> Bindings {
    Bindings {
        get_version,
        initialize_lib,
        set_log_level,
        get_log_level,
        is_library_initialized,
        shutdown_lib,
        initialize_session,
        deinitialize_session,
        set_configuration,
        free_char_buffer,
        free_buffer,
        validate,
        estimate_age,
        enroll_onefa,
        face_predict_onefa,
        anti_spoofing,
        user_delete,
        doc_scan_face,
        face_compare_files,
        face_iso,
    }
}

pub fn version_of(bindings: &Bindings) -> String {
    // SAFETY: stub versions are static NUL-terminated strings.
    unsafe { CStr::from_ptr((bindings.get_version)()) }
        .to_string_lossy()
        .into_owned()
}

/// Hands out a fresh stub table on every load and counts the loads.
pub struct StubStrategy {
    bindings: fn() -> Bindings,
    models_directory: std::path::PathBuf,
    pub loads: std::sync::atomic::AtomicUsize,
}

impl StubStrategy {
    pub fn new(bindings: fn() -> Bindings, models_directory: impl Into<std::path::PathBuf>) -> Self {
        Self {
            bindings,
            models_directory: models_directory.into(),
            loads: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl LoadStrategy for StubStrategy {
    fn load(&self) -> Result<LoadedEngine> {
        self.loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(LoadedEngine {
            // SAFETY: the stub functions follow the engine ABI and are 'static.
            library: unsafe { NativeLibrary::from_bindings((self.bindings)()) },
            models_directory: self.models_directory.clone(),
        })
    }
}

/// Generate a module of lifecycle functions with private counters.
macro_rules! stub_library {
    ($name:ident) => {
        #[allow(dead_code)]
        mod $name {
            use std::ffi::{c_char, c_int};
            use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

            use $crate::native::domain::bindings::Bindings;

            pub static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
            pub static SHUTDOWN_CALLS: AtomicUsize = AtomicUsize::new(0);
            pub static NEVER_READY: AtomicBool = AtomicBool::new(false);
            pub static READY: AtomicBool = AtomicBool::new(false);
            pub static LOG_LEVEL: AtomicI32 = AtomicI32::new(0);
            pub static MODELS_DIR: parking_lot::Mutex<String> =
                parking_lot::Mutex::new(String::new());

            unsafe extern "C" fn get_version() -> *const c_char {
                b"4.2.0-stub\0".as_ptr().cast()
            }

            unsafe extern "C" fn initialize_lib(dir: *const c_char, len: c_int, level: c_int) {
                INIT_CALLS.fetch_add(1, Ordering::SeqCst);
                let bytes = std::slice::from_raw_parts(dir.cast::<u8>(), len as usize);
                *MODELS_DIR.lock() = String::from_utf8_lossy(bytes).into_owned();
                LOG_LEVEL.store(level, Ordering::SeqCst);
                if !NEVER_READY.load(Ordering::SeqCst) {
                    READY.store(true, Ordering::SeqCst);
                }
            }

            unsafe extern "C" fn set_log_level(level: c_int) -> bool {
                LOG_LEVEL.store(level, Ordering::SeqCst);
                true
            }

            unsafe extern "C" fn get_log_level() -> c_int {
                LOG_LEVEL.load(Ordering::SeqCst)
            }

            unsafe extern "C" fn is_library_initialized() -> bool {
                READY.load(Ordering::SeqCst)
            }

            unsafe extern "C" fn shutdown_lib() {
                SHUTDOWN_CALLS.fetch_add(1, Ordering::SeqCst);
                READY.store(false, Ordering::SeqCst);
            }

            pub fn bindings() -> Bindings {
                $crate::native::stub::with_lifecycle(
                    get_version,
                    initialize_lib,
                    set_log_level,
                    get_log_level,
                    is_library_initialized,
                    shutdown_lib,
                )
            }
        }
    };
}
pub(crate) use stub_library;

#[cfg(test)]
mod tests {
    use super::*;

    stub_library!(lib);

    #[test]
    fn test_version_string() {
        assert_eq!(version_of(&lib::bindings()), "4.2.0-stub");
    }
}
