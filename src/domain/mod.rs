pub mod duration;
pub mod models;
pub mod session;
pub mod timeline;
pub mod timeparse;
