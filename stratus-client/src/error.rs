//! Client errors

use crate::config::ConfigError;
use thiserror::Error;

/// API error codes the control plane uses to refuse a caller
const AUTHORIZATION_ERROR_CODES: [u16; 3] = [401, 432, 531];

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Not authorized to call {command}: {code} - {message}")]
    Unauthorized {
        command: String,
        code: u16,
        message: String,
    },
    #[error("API error from {command}: {code} - {message}")]
    Api {
        command: String,
        code: u16,
        message: String,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Async job {job_id} failed: {message}")]
    JobFailed {
        job_id: String,
        code: Option<u16>,
        message: String,
    },
    #[error("Async job {job_id} still pending: {message}")]
    JobTimedOut { job_id: String, message: String },
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Build the error for an `errorcode`/`errortext` pair returned by `command`
    pub fn from_api(command: &str, code: u16, message: String) -> Self {
        if AUTHORIZATION_ERROR_CODES.contains(&code) || code == 403 {
            ClientError::Unauthorized {
                command: command.to_string(),
                code,
                message,
            }
        } else {
            ClientError::Api {
                command: command.to_string(),
                code,
                message,
            }
        }
    }

    /// Transport errors keep their cause, timeouts become `Timeout`
    pub fn from_transport(command: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(format!("{}: {}", command, err))
        } else {
            ClientError::Http(err)
        }
    }

    /// Whether the server rejected the caller's privileges
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_) | ClientError::JobTimedOut { .. })
    }

    /// Id of the async job the error belongs to, if any
    pub fn job_id(&self) -> Option<&str> {
        match self {
            ClientError::JobFailed { job_id, .. } | ClientError::JobTimedOut { job_id, .. } => {
                Some(job_id)
            }
            _ => None,
        }
    }
}
