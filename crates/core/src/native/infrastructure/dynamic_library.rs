use std::path::Path;

use libloading::{Library, Symbol};

use crate::native::domain::bindings::Bindings;
use crate::shared::error::{PrivIdError, Result};

/// A bound engine together with the shared objects its pointers live in.
///
/// Shared through `Arc`, so a session that outlives the engine handle's
/// reference still holds the libraries open.
pub struct NativeLibrary {
    bindings: Bindings,
    // Dropped after `bindings`; main library first, then its dependency.
    _libraries: Vec<Library>,
}

impl NativeLibrary {
    /// Open `dependency` (if any), then `main`, and bind every engine symbol
    /// from `main`.
    pub fn open(main: &Path, dependency: Option<&Path>) -> Result<Self> {
        let mut libraries = Vec::with_capacity(2);
        if let Some(dep) = dependency {
            log::debug!("Loading dependency library {}", dep.display());
            libraries.push(open_library(dep)?);
        }
        log::debug!("Loading engine library {}", main.display());
        let engine = open_library(main)?;
        let bindings = bind(&engine)?;
        libraries.insert(0, engine);
        Ok(Self {
            bindings,
            _libraries: libraries,
        })
    }

    /// Wrap a table whose functions are linked into the process.
    ///
    /// # Safety
    /// Every pointer must follow the engine's C ABI contract and stay valid
    /// for the lifetime of the returned value.
    pub unsafe fn from_bindings(bindings: Bindings) -> Self {
        Self {
            bindings,
            _libraries: Vec::new(),
        }
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

fn open_library(path: &Path) -> Result<Library> {
    // SAFETY: loading runs the library's initializers; the engine artifacts
    // are checksum-verified before they reach this point.
    unsafe { Library::new(path) }.map_err(|e| {
        PrivIdError::load_with(format!("failed to open {}", path.display()), e)
    })
}

unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let sym: Symbol<T> = library
        .get(name.as_bytes())
        .map_err(|source| PrivIdError::SymbolBinding {
            symbol: name.to_string(),
            source,
        })?;
    Ok(*sym)
}

fn bind(library: &Library) -> Result<Bindings> {
    // SAFETY: the types below mirror the engine's exported C declarations.
    unsafe {
        Ok(Bindings {
            get_version: symbol(library, "privid_get_version")?,
            initialize_lib: symbol(library, "privid_initialize_lib")?,
            set_log_level: symbol(library, "privid_set_log_level")?,
            get_log_level: symbol(library, "privid_get_log_level")?,
            is_library_initialized: symbol(library, "privid_is_library_initialized")?,
            shutdown_lib: symbol(library, "privid_shutdown_lib")?,
            initialize_session: symbol(library, "privid_initialize_session")?,
            deinitialize_session: symbol(library, "privid_deinitialize_session")?,
            set_configuration: symbol(library, "privid_set_configuration")?,
            free_char_buffer: symbol(library, "privid_free_char_buffer")?,
            free_buffer: symbol(library, "privid_free_buffer")?,
            validate: symbol(library, "privid_validate")?,
            estimate_age: symbol(library, "privid_estimate_age")?,
            enroll_onefa: symbol(library, "privid_enroll_onefa")?,
            face_predict_onefa: symbol(library, "privid_face_predict_onefa")?,
            anti_spoofing: symbol(library, "privid_anti_spoofing")?,
            user_delete: symbol(library, "privid_user_delete")?,
            doc_scan_face: symbol(library, "privid_doc_scan_face")?,
            face_compare_files: symbol(library, "privid_face_compare_files")?,
            face_iso: symbol(library, "privid_face_iso")?,
        })
    }
}
