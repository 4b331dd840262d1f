use std::cell::RefCell;
use std::ffi::{c_int, CStr, CString};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::ReentrantMutex;

use crate::native::domain::bindings::Bindings;
use crate::native::infrastructure::dynamic_library::NativeLibrary;
use crate::native::infrastructure::library_loader::{DefaultLoadStrategy, LoadStrategy};
use crate::shared::config::EngineConfig;
use crate::shared::constants::{READY_POLL_ATTEMPTS, READY_POLL_INTERVAL_MS};
use crate::shared::error::{PrivIdError, Result};

/// Engine-side log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    #[default]
    Off,
    Minimal,
    Normal,
    Full,
}

impl LogLevel {
    pub fn as_raw(self) -> c_int {
        match self {
            Self::Off => 0,
            Self::Minimal => 1,
            Self::Normal => 2,
            Self::Full => 3,
        }
    }

    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Minimal),
            2 => Some(Self::Normal),
            3 => Some(Self::Full),
            _ => None,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(Self::Off),
            "minimal" | "1" => Ok(Self::Minimal),
            "normal" | "2" => Ok(Self::Normal),
            "full" | "3" => Ok(Self::Full),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
}

struct EngineInner {
    state: EngineState,
    library: Option<Arc<NativeLibrary>>,
    models_directory: Option<PathBuf>,
    version: Option<String>,
    /// Bumped by every successful initialization.
    generation: u64,
}

impl EngineInner {
    fn reset(&mut self) {
        self.state = EngineState::Uninitialized;
        self.library = None;
        self.models_directory = None;
        self.version = None;
    }
}

/// Process-wide lifecycle of the native engine.
///
/// Clones share one state. `initialize`, `shutdown` and the accessors take
/// a reentrant lock; a second initializer blocks until the first finishes
/// and then finds the engine ready.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<ReentrantMutex<RefCell<EngineInner>>>,
    strategy: Arc<dyn LoadStrategy>,
    default_log_level: LogLevel,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl EngineHandle {
    /// Handle that downloads and loads the engine described by `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let level = config.log_level;
        let strategy = DefaultLoadStrategy::new(config)?;
        Ok(Self::with_strategy(Arc::new(strategy)).with_default_log_level(level))
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EngineConfig::from_env())
    }

    pub fn with_strategy(strategy: Arc<dyn LoadStrategy>) -> Self {
        Self {
            shared: Arc::new(ReentrantMutex::new(RefCell::new(EngineInner {
                state: EngineState::Uninitialized,
                library: None,
                models_directory: None,
                version: None,
                generation: 0,
            }))),
            strategy,
            default_log_level: LogLevel::Off,
            poll_attempts: READY_POLL_ATTEMPTS,
            poll_interval: Duration::from_millis(READY_POLL_INTERVAL_MS),
        }
    }

    pub fn with_default_log_level(mut self, level: LogLevel) -> Self {
        self.default_log_level = level;
        self
    }

    /// How many times, and how often, readiness is polled after
    /// `initialize_lib`.
    pub fn with_poll_budget(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    /// Initialize with the configured default log level.
    pub fn initialize_default(&self) -> Result<()> {
        self.initialize(self.default_log_level)
    }

    /// Load, initialize and wait for the engine. A no-op once ready.
    ///
    /// On failure the handle is back to `Uninitialized` and the error is
    /// returned as produced by the failing step.
    pub fn initialize(&self, log_level: LogLevel) -> Result<()> {
        let guard = self.shared.lock();
        match guard.borrow().state {
            EngineState::Ready => return Ok(()),
            EngineState::Uninitialized => {}
            state => {
                return Err(PrivIdError::load(format!(
                    "engine initialization re-entered while {state:?}"
                )))
            }
        }

        guard.borrow_mut().state = EngineState::Initializing;
        log::info!("Initializing engine (log level {log_level:?})");

        match self.bring_up(log_level) {
            Ok((library, models_directory, version)) => {
                let mut inner = guard.borrow_mut();
                inner.library = Some(Arc::new(library));
                inner.models_directory = Some(models_directory);
                inner.version = Some(version.clone());
                inner.generation += 1;
                inner.state = EngineState::Ready;
                log::info!("Engine {version} ready");
                Ok(())
            }
            Err(e) => {
                guard.borrow_mut().reset();
                log::warn!("Engine initialization failed: {e}");
                Err(e)
            }
        }
    }

    fn bring_up(&self, log_level: LogLevel) -> Result<(NativeLibrary, PathBuf, String)> {
        let loaded = self.strategy.load()?;
        let bindings = loaded.library.bindings();

        let dir = loaded.models_directory.to_string_lossy().into_owned();
        let dir_len = c_int::try_from(dir.len())
            .map_err(|_| PrivIdError::load("models directory path too long"))?;
        let dir_c = CString::new(dir)
            .map_err(|e| PrivIdError::load_with("models directory contains NUL", e))?;

        // SAFETY: `dir_c` outlives the call and `dir_len` is its byte length.
        unsafe { (bindings.initialize_lib)(dir_c.as_ptr(), dir_len, log_level.as_raw()) };

        let version = self.wait_ready(bindings).and_then(|()| read_version(bindings));
        match version {
            Ok(version) => Ok((loaded.library, loaded.models_directory, version)),
            Err(e) => {
                // SAFETY: the engine was handed to `initialize_lib` above.
                unsafe { (bindings.shutdown_lib)() };
                Err(e)
            }
        }
    }

    fn wait_ready(&self, bindings: &Bindings) -> Result<()> {
        for attempt in 1..=self.poll_attempts {
            // SAFETY: plain query with no arguments.
            if unsafe { (bindings.is_library_initialized)() } {
                log::debug!("Engine reported ready after {attempt} poll(s)");
                return Ok(());
            }
            if attempt < self.poll_attempts {
                std::thread::sleep(self.poll_interval);
            }
        }
        Err(PrivIdError::load(format!(
            "engine did not become ready after {} polls",
            self.poll_attempts
        )))
    }

    /// Release the engine. A no-op unless ready.
    pub fn shutdown(&self) {
        let guard = self.shared.lock();
        let library = {
            let mut inner = guard.borrow_mut();
            if inner.state != EngineState::Ready {
                return;
            }
            inner.state = EngineState::ShuttingDown;
            inner.library.clone()
        };
        if let Some(library) = library {
            // SAFETY: the engine is initialized; sessions check the
            // generation before touching it again.
            unsafe { (library.bindings().shutdown_lib)() };
        }
        guard.borrow_mut().reset();
        log::info!("Engine shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == EngineState::Ready
    }

    pub fn state(&self) -> EngineState {
        self.shared.lock().borrow().state
    }

    pub fn native_version(&self) -> Result<String> {
        self.read(|inner| inner.version.clone())
    }

    pub fn models_cache_directory(&self) -> Result<PathBuf> {
        self.read(|inner| inner.models_directory.clone())
    }

    pub fn set_log_level(&self, level: LogLevel) -> Result<bool> {
        let (library, _) = self.current()?;
        // SAFETY: the library stays loaded while `library` is held.
        Ok(unsafe { (library.bindings().set_log_level)(level.as_raw()) })
    }

    pub fn log_level(&self) -> Result<LogLevel> {
        let (library, _) = self.current()?;
        // SAFETY: the library stays loaded while `library` is held.
        let raw = unsafe { (library.bindings().get_log_level)() };
        LogLevel::from_raw(raw)
            .ok_or_else(|| PrivIdError::MalformedResponse(format!("unknown log level {raw}")))
    }

    fn read<T>(&self, f: impl FnOnce(&EngineInner) -> Option<T>) -> Result<T> {
        let guard = self.shared.lock();
        let inner = guard.borrow();
        if inner.state != EngineState::Ready {
            return Err(PrivIdError::NotInitialized);
        }
        f(&inner).ok_or(PrivIdError::NotInitialized)
    }

    /// The loaded engine and the generation it belongs to.
    pub(crate) fn current(&self) -> Result<(Arc<NativeLibrary>, u64)> {
        let guard = self.shared.lock();
        let inner = guard.borrow();
        match (&inner.state, &inner.library) {
            (EngineState::Ready, Some(library)) => Ok((library.clone(), inner.generation)),
            _ => Err(PrivIdError::NotInitialized),
        }
    }

    /// The loaded engine, if it is still the one from `generation`.
    pub(crate) fn acquire(&self, generation: u64) -> Result<Arc<NativeLibrary>> {
        match self.current()? {
            (library, current) if current == generation => Ok(library),
            _ => Err(PrivIdError::NotInitialized),
        }
    }
}

fn read_version(bindings: &Bindings) -> Result<String> {
    // SAFETY: the engine returns a static NUL-terminated string or null.
    let ptr = unsafe { (bindings.get_version)() };
    if ptr.is_null() {
        return Err(PrivIdError::load("engine returned no version string"));
    }
    // SAFETY: checked non-null above; the engine owns the memory.
    Ok(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}
