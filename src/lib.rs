pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod loader;
pub mod models;
pub mod refresh;
pub mod report;
pub mod status;
