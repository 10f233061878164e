//! Common types shared between stratus-client and stratus-cli

pub mod identity;

pub use identity::{
    Account, AccountType, ApiKeyPair, Domain, InvalidAccountType, PrivilegeTier, UnknownAccountType,
    User,
};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Async job status as reported by `queryAsyncJobResult`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl TryFrom<u8> for JobStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Succeeded),
            2 => Ok(Self::Failed),
            other => Err(format!("invalid job status: {}", other)),
        }
    }
}

impl From<JobStatus> for u8 {
    fn from(value: JobStatus) -> Self {
        match value {
            JobStatus::Pending => 0,
            JobStatus::Succeeded => 1,
            JobStatus::Failed => 2,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of an async job poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncJobResult {
    #[serde(rename = "jobid")]
    pub job_id: String,
    #[serde(rename = "jobstatus")]
    pub status: JobStatus,
    #[serde(default, rename = "jobresultcode")]
    pub result_code: Option<i64>,
    #[serde(default, rename = "jobresulttype")]
    pub result_type: Option<String>,
    #[serde(default, rename = "jobresult")]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

impl AsyncJobResult {
    pub fn is_finished(&self) -> bool {
        self.status != JobStatus::Pending
    }

    /// Error code and text carried by a failed job's result
    pub fn error(&self) -> Option<(Option<u16>, String)> {
        if self.status != JobStatus::Failed {
            return None;
        }
        let result = self.result.as_ref();
        let code = result
            .and_then(|r| r.get("errorcode"))
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok());
        let text = result
            .and_then(|r| r.get("errortext"))
            .and_then(|t| t.as_str())
            .unwrap_or("async job failed without error text")
            .to_string();
        Some((code, text))
    }

    /// Parse the control plane's `created` timestamp (`2024-01-31T10:00:00+0000`)
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.created
            .as_deref()
            .and_then(|s| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z").ok())
    }
}
