//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use panostitch::error::PanoError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to read or parse the panorama record file
    Records { path: String, error: std::io::Error },
    /// Failed to create the HTTP client
    HttpClient(String),
    /// The run aborted on a fatal error
    Run(PanoError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Records { .. } = self {
            eprintln!();
            eprintln!("The record file must be a JSON array of objects with");
            eprintln!("\"panoid\", \"lat\", and \"lon\" fields.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Records { path, error } => {
                write!(f, "Failed to load records from {}: {}", path, error)
            }
            CliError::HttpClient(msg) => write!(f, "Failed to create HTTP client: {}", msg),
            CliError::Run(e) => write!(f, "Run aborted: {}", e),
        }
    }
}

impl std::error::Error for CliError {}
