pub mod advisor_client;
pub mod config;
pub mod error;
pub mod log_store;
pub mod snapshot_store;
pub mod storage;
