use serde::Serialize;

use crate::codec::call_result::CallResult;
use crate::codec::settings::SessionSettings;
use crate::shared::error::{PrivIdError, Result};

/// Serialize caller input for the engine. Unset optional fields are
/// skipped by the types themselves, never emitted as `null`.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(PrivIdError::ConfigEncoding)
}

/// Decode the engine's result text.
pub fn decode_result(text: &str) -> Result<CallResult> {
    serde_json::from_str(text)
        .map_err(|e| PrivIdError::MalformedResponse(format!("undecodable call result: {e}")))
}

/// Decode caller-supplied session settings.
pub fn decode_settings(text: &str) -> Result<SessionSettings> {
    serde_json::from_str(text)
        .map_err(|e| PrivIdError::Session(format!("invalid session settings: {e}")))
}
