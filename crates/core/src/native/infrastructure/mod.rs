pub mod dynamic_library;
pub mod library_loader;
