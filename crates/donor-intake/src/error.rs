//! Error types for donor-intake.
//!
//! This module defines all error types used throughout the donor-intake crate.
//! Every variant can be turned into a short, user-facing message via
//! [`Error::user_message`], since no failure in the kiosk flow is fatal.

use thiserror::Error;

/// Fallback shown when the backend fails without an error body.
pub const GENERIC_SUBMIT_FAILURE: &str = "Could not save the donation. Please try again.";

/// Fallback shown when the backend cannot be reached at all.
pub const GENERIC_NETWORK_FAILURE: &str =
    "Could not reach the donor service. Please check the connection and try again.";

/// The main error type for donor-intake operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A configured URL could not be parsed.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    // === Backend Errors ===
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to donor service failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("donor service returned {status}: {message}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// The `error` field of the response body, or a fallback.
        message: String,
    },

    /// No donor exists for the given identifier.
    #[error("donor '{id}' not found")]
    DonorNotFound {
        /// The identifier that was looked up.
        id: String,
    },

    // === Form Errors ===
    /// A form field failed validation.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the field, as shown on the form.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// A submission was attempted while another is still pending.
    #[error("a submission is already in progress")]
    SubmissionInFlight,

    // === Session Errors ===
    /// A screen that needs a donor record was reached without one.
    #[error("no donor record in the current session")]
    MissingRecord,

    // === Scanner Errors ===
    /// The scanning device could not be opened.
    #[error("failed to open scanner '{name}': {message}")]
    ScannerOpen {
        /// Name of the scan source.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// The scanner stopped producing input (device unplugged, stdin closed).
    #[error("scanner '{name}' closed")]
    ScannerClosed {
        /// Name of the scan source.
        name: &'static str,
    },

    // === I/O Errors ===
    /// Terminal or file system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for donor-intake operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for a form field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a backend error from a status code and an optional server message.
    #[must_use]
    pub fn backend(status: u16, message: Option<String>, fallback: &str) -> Self {
        Self::Backend {
            status,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    /// Create a scanner open error.
    #[must_use]
    pub fn scanner_open(name: &'static str, message: impl Into<String>) -> Self {
        Self::ScannerOpen {
            name,
            message: message.into(),
        }
    }

    /// Check if this error came from form validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error means the donor does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DonorNotFound { .. })
    }

    /// The message shown to the person at the kiosk.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend { message, .. } => message.clone(),
            Self::Validation { message, .. } => message.clone(),
            Self::DonorNotFound { .. } => {
                "No donor record was found. Please fill in your details.".to_string()
            }
            Self::Http(_) => GENERIC_NETWORK_FAILURE.to_string(),
            Self::SubmissionInFlight => {
                "Your submission is being processed. Please wait.".to_string()
            }
            Self::MissingRecord => "There is nothing to confirm yet.".to_string(),
            other => other.to_string(),
        }
    }
}
