pub mod bindings;
pub mod native_buffer;
