//! The engine's C ABI as a table of typed function pointers.
//!
//! Every entry must match the exported symbol's signature exactly; a mismatch
//! cannot be detected at bind time and is undefined behavior at call time.

use std::ffi::{c_char, c_int, c_void};

pub type GetVersionFn = unsafe extern "C" fn() -> *const c_char;
pub type InitializeLibFn = unsafe extern "C" fn(*const c_char, c_int, c_int);
pub type SetLogLevelFn = unsafe extern "C" fn(c_int) -> bool;
pub type GetLogLevelFn = unsafe extern "C" fn() -> c_int;
pub type IsLibraryInitializedFn = unsafe extern "C" fn() -> bool;
pub type ShutdownLibFn = unsafe extern "C" fn();

pub type InitializeSessionFn =
    unsafe extern "C" fn(*const c_char, c_int, *mut *mut c_void) -> bool;
pub type DeinitializeSessionFn = unsafe extern "C" fn(*mut c_void);
pub type SetConfigurationFn = unsafe extern "C" fn(*mut c_void, *const c_char, c_int) -> bool;

pub type FreeCharBufferFn = unsafe extern "C" fn(*mut c_char);
pub type FreeBufferFn = unsafe extern "C" fn(*mut c_void);

/// `(session, config, config_len, image, width, height, result_out, result_len_out) -> op_id`
pub type SingleImageFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    c_int,
    *const u8,
    c_int,
    c_int,
    *mut *mut c_char,
    *mut c_int,
) -> i32;

pub type UserDeleteFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    c_int,
    *const c_char,
    c_int,
    *mut *mut c_char,
    *mut c_int,
) -> i32;

pub type DocScanFaceFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    c_int,
    *const u8,
    c_int,
    c_int,
    *mut *mut u8,
    *mut c_int,
    *mut *mut u8,
    *mut c_int,
    *mut *mut c_char,
    *mut c_int,
) -> i32;

pub type FaceCompareFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    c_int,
    *const u8,
    c_int,
    c_int,
    *const u8,
    c_int,
    c_int,
    *mut *mut c_char,
    *mut c_int,
) -> i32;

pub type FaceIsoFn = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    c_int,
    *const u8,
    c_int,
    c_int,
    *mut *mut u8,
    *mut c_int,
    *mut *mut c_char,
    *mut c_int,
) -> i32;

/// Resolved entry points of one loaded engine.
#[derive(Clone, Copy, Debug)]
pub struct Bindings {
    pub get_version: GetVersionFn,
    pub initialize_lib: InitializeLibFn,
    pub set_log_level: SetLogLevelFn,
    pub get_log_level: GetLogLevelFn,
    pub is_library_initialized: IsLibraryInitializedFn,
    pub shutdown_lib: ShutdownLibFn,
    pub initialize_session: InitializeSessionFn,
    pub deinitialize_session: DeinitializeSessionFn,
    pub set_configuration: SetConfigurationFn,
    pub free_char_buffer: FreeCharBufferFn,
    pub free_buffer: FreeBufferFn,
    pub validate: SingleImageFn,
    pub estimate_age: SingleImageFn,
    pub enroll_onefa: SingleImageFn,
    pub face_predict_onefa: SingleImageFn,
    pub anti_spoofing: SingleImageFn,
    pub user_delete: UserDeleteFn,
    pub doc_scan_face: DocScanFaceFn,
    pub face_compare_files: FaceCompareFn,
    pub face_iso: FaceIsoFn,
}
