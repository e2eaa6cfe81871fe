//! Fatal, run-level errors.
//!
//! Per-event reconstruction problems are never errors: they end up as a
//! [`crate::domain::FitStatus`] in the output record. `AppError` is reserved
//! for conditions that make the whole run meaningless (unreadable input,
//! inconsistent configuration) and carries the process exit code.

/// Unreadable or malformed input/config file, or an I/O failure.
pub const EXIT_INPUT: u8 = 2;
/// Configuration that is readable but inconsistent.
pub const EXIT_CONFIG: u8 = 3;
/// Internal failure affecting the whole run.
pub const EXIT_INTERNAL: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
