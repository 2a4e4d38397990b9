//! Error types for Sift

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Resolved locally, never reaches the network (no file chosen, missing id)
    #[error("{0}")]
    Validation(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the processing service
    #[error("Server returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Coarse error category, used to pick how a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Timeout,
    Data,
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            Self::Http(_) | Self::Api { .. } => ErrorKind::Transport,
            Self::Json(_) | Self::Io(_) | Self::Config(_) | Self::InvalidData(_) => {
                ErrorKind::Data
            }
        }
    }

    /// Text shown to the user: the server's `detail` when it sent one,
    /// otherwise the transport's own error text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { detail, .. } => detail.clone(),
            Self::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Map a reqwest failure, splitting timeouts into their own category
    pub(crate) fn from_transport(err: reqwest::Error, what: &str) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("{} did not complete in time", what))
        } else {
            Self::Http(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_prefers_detail() {
        let err = Error::Api {
            status: 409,
            detail: "Receipt already approved".to_string(),
        };
        assert_eq!(err.user_message(), "Receipt already approved");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "Server returned 409: Receipt already approved");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::Timeout("x".into()).kind(), ErrorKind::Timeout);
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Data);
    }

    #[test]
    fn test_validation_message_is_bare() {
        let err = Error::validation("Choose a file first");
        assert_eq!(err.user_message(), "Choose a file first");
        assert_eq!(err.to_string(), "Choose a file first");
    }
}
