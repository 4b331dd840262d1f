pub mod artifact_fetcher;
pub mod cache_dirs;
pub mod http_object_store;
