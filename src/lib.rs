pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod console;
pub mod executor;
pub mod init;
pub mod parser;
pub mod scheduler;
pub mod types;

// Re-export main types
pub use types::Outcome;

// Re-export init API for convenience
pub use init::{InitBuilder, InitOptions};
