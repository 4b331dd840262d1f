pub mod call_result;
pub mod json;
pub mod operation_config;
pub mod settings;
