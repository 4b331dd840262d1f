pub mod manifest;
pub mod object_store;
