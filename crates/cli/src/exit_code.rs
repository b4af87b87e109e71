//! Process exit codes
//!
//! Codes are stable so CI pipelines can branch on them.

use sitepush_core::Error;

/// Exit codes returned by the sitepush binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Everything was published
    Success = 0,
    /// Unexpected failure, or at least one file failed to upload
    GeneralError = 1,
    /// Bad arguments or configuration
    UsageError = 2,
    /// Endpoint unreachable or transport failure
    NetworkError = 3,
    /// Credentials rejected
    AuthError = 4,
    /// Bucket or folder does not exist
    NotFound = 5,
}

impl ExitCode {
    /// Map a core error onto an exit code
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Config(_) | Error::InvalidPath(_) => ExitCode::UsageError,
            Error::Network(_) => ExitCode::NetworkError,
            Error::Auth(_) => ExitCode::AuthError,
            Error::NotFound(_) => ExitCode::NotFound,
            Error::Io(_) | Error::General(_) => ExitCode::GeneralError,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code() as u8)
    }
}
