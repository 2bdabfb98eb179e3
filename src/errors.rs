//! Custom error types for the probe engine.
//!
//! This module provides user-friendly error types that wrap underlying
//! errors with clear, actionable messages.

use std::error::Error;
use std::fmt;

/// Exit codes for the application.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Network error (connection failed, timeout, etc.).
    pub const NETWORK_ERROR: i32 = 1;
    /// Persistence error (history or settings could not be read/written).
    pub const PERSISTENCE_ERROR: i32 = 2;
    /// Configuration error (invalid arguments, bad endpoints).
    pub const CONFIG_ERROR: i32 = 3;
    /// A probe cycle failed outside of the per-sample recovery.
    pub const CYCLE_ERROR: i32 = 4;
    /// The user stopped a running cycle.
    pub const CANCELLED: i32 = 130;
    /// Unknown/unexpected error.
    pub const UNKNOWN_ERROR: i32 = 99;
}

/// Categories of errors that can occur while probing or persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network connectivity issues.
    Network,
    /// Request timeout.
    Timeout,
    /// The server answered with a non-success status.
    Http,
    /// Reading or writing the durable store failed.
    Persistence,
    /// A stored snapshot or export could not be (de)serialized.
    Serialization,
    /// Invalid configuration or arguments.
    Config,
    /// A probe cycle failed unexpectedly.
    Cycle,
    /// Unknown or unexpected errors.
    Unknown,
}

impl ErrorKind {
    /// Get the exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Network => exit_codes::NETWORK_ERROR,
            ErrorKind::Timeout => exit_codes::NETWORK_ERROR,
            ErrorKind::Http => exit_codes::NETWORK_ERROR,
            ErrorKind::Persistence => exit_codes::PERSISTENCE_ERROR,
            ErrorKind::Serialization => exit_codes::PERSISTENCE_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::Cycle => exit_codes::CYCLE_ERROR,
            ErrorKind::Unknown => exit_codes::UNKNOWN_ERROR,
        }
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network error",
            ErrorKind::Timeout => "Request timeout",
            ErrorKind::Http => "HTTP error",
            ErrorKind::Persistence => "Storage error",
            ErrorKind::Serialization => "Data format error",
            ErrorKind::Config => "Configuration error",
            ErrorKind::Cycle => "Speed test failed",
            ErrorKind::Unknown => "Unknown error",
        }
    }
}

/// A user-friendly error type for probe and history operations.
#[derive(Debug)]
pub struct SpeedLensError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// User-friendly error message.
    pub message: String,
    /// Optional suggestion for how to resolve the error.
    pub suggestion: Option<String>,
    /// The underlying error, if any.
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl SpeedLensError {
    /// Create a new SpeedLensError.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    /// Add a suggestion for how to resolve the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
            .with_suggestion("Check your internet connection and try again.")
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message).with_suggestion(
            "The endpoint may be slow or unreachable. Try again later.",
        )
    }

    /// Create an HTTP status error.
    pub fn http(status: u16, url: &str) -> Self {
        Self::new(ErrorKind::Http, format!("{} answered with status {}", url, status))
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message).with_suggestion(
            "Check that the data directory exists and is writable.",
        )
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Create a cycle failure.
    pub fn cycle(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cycle, message)
            .with_suggestion("Please try again.")
    }
}

impl fmt::Display for SpeedLensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for SpeedLensError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<reqwest::Error> for SpeedLensError {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();

        let speed_error = if error.is_timeout() {
            SpeedLensError::timeout(message)
        } else if let Some(status) = error.status() {
            let url = error.url().map(|u| u.as_str()).unwrap_or("endpoint");
            SpeedLensError::http(status.as_u16(), url)
        } else if error.is_connect() || error.is_request() {
            SpeedLensError::network(message)
        } else {
            match classify_error(&error) {
                ErrorKind::Timeout => SpeedLensError::timeout(message),
                ErrorKind::Network => SpeedLensError::network(message),
                kind => SpeedLensError::new(kind, message),
            }
        };

        speed_error.with_source(error)
    }
}

impl From<std::io::Error> for SpeedLensError {
    fn from(error: std::io::Error) -> Self {
        SpeedLensError::persistence(error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for SpeedLensError {
    fn from(error: serde_json::Error) -> Self {
        SpeedLensError::serialization(error.to_string()).with_source(error)
    }
}

impl From<url::ParseError> for SpeedLensError {
    fn from(error: url::ParseError) -> Self {
        SpeedLensError::config(format!("invalid endpoint URL: {}", error))
            .with_source(error)
    }
}

/// Classify an error into an ErrorKind based on its message.
pub fn classify_error(error: &dyn Error) -> ErrorKind {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("deadline")
    {
        return ErrorKind::Timeout;
    }

    if error_str.contains("dns")
        || error_str.contains("resolve")
        || error_str.contains("no such host")
        || error_str.contains("connection refused")
        || error_str.contains("connection reset")
        || error_str.contains("network unreachable")
        || error_str.contains("host unreachable")
        || error_str.contains("no route")
        || error_str.contains("broken pipe")
        || error_str.contains("certificate")
        || error_str.contains("handshake")
    {
        return ErrorKind::Network;
    }

    if error_str.contains("status: 4")
        || error_str.contains("status: 5")
        || error_str.contains("server error")
    {
        return ErrorKind::Http;
    }

    if error_str.contains("permission denied")
        || error_str.contains("read-only file system")
        || error_str.contains("no space left")
    {
        return ErrorKind::Persistence;
    }

    ErrorKind::Unknown
}

/// Format an error for user display.
///
/// This function creates a user-friendly error message that includes
/// the error description and any available suggestions.
pub fn format_error_for_display(error: &SpeedLensError) -> String {
    let mut output = format!("Error: {}", error.message);

    if let Some(ref suggestion) = error.suggestion {
        output.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    output
}
