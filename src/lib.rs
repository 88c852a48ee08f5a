pub mod config;
pub mod document;
pub mod errors;
pub mod job;
pub mod logging;
pub mod monitor;
pub mod publish;
pub mod status;
pub mod ui;
