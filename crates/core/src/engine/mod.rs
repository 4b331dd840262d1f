pub mod engine_handle;
