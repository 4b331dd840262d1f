//! Session layer over the PrivID native face-recognition engine.
//!
//! The engine ships as a platform-specific shared library. This crate
//! downloads and verifies it, binds its C ABI, drives its process-wide
//! lifecycle through [`EngineHandle`] and exposes per-credential
//! [`Session`]s whose operations exchange JSON with the engine.

pub mod artifacts;
pub mod codec;
pub mod engine;
pub mod native;
pub mod platform;
pub mod session;
pub mod shared;

pub use codec::call_result::{CallResult, CallResultHeader, ReturnStatus};
pub use codec::operation_config::{ConfigBuilder, Operation, OperationConfig};
pub use codec::settings::{Collection, NamedUrls, SessionSettings};
pub use engine::engine_handle::{EngineHandle, EngineState, LogLevel};
pub use session::image_input::{ImageFormat, ImageInputArg};
pub use session::native_session::NativeSession;
pub use session::session::Session;
pub use shared::config::EngineConfig;
pub use shared::error::{PrivIdError, Result};
