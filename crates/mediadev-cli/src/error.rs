// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// No registered device satisfies the requested match
    NoMatch(String),
    /// Neither udev nor sysfs discovery could be initialised
    BackendUnavailable(String),
    /// General error from MediaDev library
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::NoMatch(msg) => write!(f, "No matching device: {}", msg),
            CliError::BackendUnavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::General(_) => 1,
            CliError::InvalidArgs(_) => 2,
            CliError::NoMatch(_) => 3,
            CliError::BackendUnavailable(_) => 4,
        }
    }
}

/// Map mediadev::Error to CliError with appropriate exit codes
impl From<mediadev::Error> for CliError {
    fn from(err: mediadev::Error) -> Self {
        use mediadev::Error;

        match err {
            Error::BackendUnavailable(msg) => CliError::BackendUnavailable(msg),
            Error::LibraryNotLoaded(lib_err) => {
                CliError::BackendUnavailable(format!("Failed to load libudev: {}", lib_err))
            }
            Error::SymbolNotFound(sym) => {
                CliError::BackendUnavailable(format!("Symbol not found: {}", sym))
            }
            Error::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    CliError::General(format!("Permission denied: {}", io_err))
                }
                _ => CliError::General(format!("I/O error: {}", io_err)),
            },
            other => CliError::General(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::General(format!("JSON serialization failed: {}", err))
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}
