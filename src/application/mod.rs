pub mod advisor;
pub mod bootstrap;
pub mod commands;
pub mod history;
pub mod ticker;
