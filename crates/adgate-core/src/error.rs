//! Error types for Adgate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Directory Errors
    #[error("Directory transport error: {0}")]
    Transport(String),

    #[error("Directory bind rejected (code {code}): {message}")]
    Bind { code: u32, message: String },

    #[error("Directory entry not found: {0}")]
    Resolution(String),

    #[error("Directory operation failed (code {code}): {message}")]
    Operation { code: u32, message: String },

    #[error("Directory login failed")]
    LoginFailed(#[source] Box<Error>),

    // Programmer Errors
    #[error("Directory connection is not bound")]
    NotBound,

    #[error("Invalid account control value: {0}")]
    InvalidControlValue(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Local Store Errors
    #[error("Identity store error: {0}")]
    Store(String),

    #[error("Credential hash error: {0}")]
    CredentialHash(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Wrap a directory failure as a uniform login failure
    pub fn login_failed(cause: Error) -> Self {
        Error::LoginFailed(Box::new(cause))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Transport(_) => "TransportError",
            Error::Bind { .. } => "BindError",
            Error::Resolution(_) => "ResolutionError",
            Error::Operation { .. } => "OperationError",
            Error::LoginFailed(_) => "LoginFailed",
            Error::NotBound => "NotBoundError",
            Error::InvalidControlValue(_) => "InvalidControlValue",
            Error::Configuration(_) => "ConfigurationError",
            Error::Store(_) => "StoreError",
            Error::CredentialHash(_) => "CredentialHashError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Programmer and deployment defects. These are never collapsed into a
    /// denied authentication.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::NotBound | Error::InvalidControlValue(_) | Error::Configuration(_) => true,
            Error::LoginFailed(cause) => cause.is_fatal(),
            _ => false,
        }
    }

    /// The innermost error behind any `LoginFailed` wrapping
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::LoginFailed(cause) => cause.root_cause(),
            other => other,
        }
    }
}
