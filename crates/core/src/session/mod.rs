pub mod image_input;
pub mod native_session;
#[allow(clippy::module_inception)]
pub mod session;
