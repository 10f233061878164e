//! Connection to the management server
//!
//! A [`Connection`] owns the HTTP client and the credentials for one
//! management-server endpoint. It sends commands, decodes the
//! `<command>response` envelope and polls async jobs to completion.

use crate::command::{ApiCommand, QueryAsyncJobResult, RawCommand};
use crate::config::ManagementServerConfig;
use crate::error::{ClientError, Result};
use crate::signing;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use stratus_common::{ApiKeyPair, AsyncJobResult, JobStatus};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Parameters the connection sets itself
const RESERVED_PARAMS: [&str; 4] = ["command", "response", "apikey", "signature"];

/// How requests are authenticated
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Unsigned requests against the integration port
    Integration,
    /// Requests signed with a user's key pair
    Keys(ApiKeyPair),
}

/// Output of one command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Job id, for async commands
    pub job_id: Option<String>,
    /// Response object (the job result for async commands)
    pub body: Value,
}

pub struct Connection {
    http: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
    username: String,
    password: String,
    request_timeout: Duration,
    async_timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("username", &self.username)
            .field("async_timeout", &self.async_timeout)
            .finish()
    }
}

impl Connection {
    /// Connect with the bootstrap credentials of `config`
    pub fn new(
        config: &ManagementServerConfig,
        async_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let credentials = match config.key_pair() {
            Some(keys) => Credentials::Keys(keys),
            None => Credentials::Integration,
        };

        Self::build(
            config.endpoint(),
            credentials,
            config.username.clone(),
            config.password.clone(),
            config.request_timeout(),
            async_timeout,
            poll_interval,
        )
    }

    fn build(
        endpoint: String,
        credentials: Credentials,
        username: String,
        password: String,
        request_timeout: Duration,
        async_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(request_timeout)
            .build()?;

        info!(
            "Connection to {} ({})",
            endpoint,
            match &credentials {
                Credentials::Integration => "integration port",
                Credentials::Keys(_) => "signed",
            }
        );

        Ok(Self {
            http,
            endpoint,
            credentials,
            username,
            password,
            request_timeout,
            async_timeout,
            poll_interval,
        })
    }

    /// New connection to the same endpoint, signed with `keys`
    pub fn with_keys(&self, keys: ApiKeyPair) -> Result<Self> {
        Self::build(
            self.endpoint.clone(),
            Credentials::Keys(keys),
            self.username.clone(),
            self.password.clone(),
            self.request_timeout,
            self.async_timeout,
            self.poll_interval,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// API key the requests are signed with, if any
    pub fn api_key(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::Keys(keys) => Some(keys.apikey.as_str()),
            Credentials::Integration => None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn async_timeout(&self) -> Duration {
        self.async_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Execute a typed command
    pub async fn execute<C: ApiCommand>(&self, command: &C) -> Result<C::Response> {
        let output = self.execute_raw(&command.to_raw()?).await?;
        Ok(serde_json::from_value(output.body)?)
    }

    /// Execute a command, waiting for its job when it is async
    pub async fn execute_raw(&self, command: &RawCommand) -> Result<CommandOutput> {
        let body = self.send(&command.name, &command.params).await?;
        if !command.is_async {
            return Ok(CommandOutput { job_id: None, body });
        }

        let job_id = match body.get("jobid") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ClientError::InvalidResponse(format!(
                    "{} is async but returned no jobid",
                    command.name
                )))
            }
        };

        let job = self.wait_for_job(&command.name, &job_id).await?;
        Ok(CommandOutput {
            job_id: Some(job_id),
            body: job.result.unwrap_or_else(|| Value::Object(Default::default())),
        })
    }

    /// Poll a job once
    pub async fn query_job(&self, job_id: &str) -> Result<AsyncJobResult> {
        let mut params = BTreeMap::new();
        params.insert("jobid".to_string(), job_id.to_string());
        let body = self.send(QueryAsyncJobResult::NAME, &params).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Poll a job until it finishes or the async timeout elapses
    pub async fn wait_for_job(&self, command: &str, job_id: &str) -> Result<AsyncJobResult> {
        let deadline = Instant::now() + self.async_timeout;

        loop {
            let job = self.query_job(job_id).await?;
            match job.status {
                JobStatus::Succeeded => {
                    debug!(command, job_id, "async job succeeded");
                    return Ok(job);
                }
                JobStatus::Failed => {
                    let (code, message) = job
                        .error()
                        .unwrap_or((None, "async job failed".to_string()));
                    return Err(ClientError::JobFailed {
                        job_id: job_id.to_string(),
                        code,
                        message,
                    });
                }
                JobStatus::Pending => {}
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(ClientError::JobTimedOut {
                    job_id: job_id.to_string(),
                    message: format!("{} did not finish within {:?}", command, self.async_timeout),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn send(&self, command: &str, params: &BTreeMap<String, String>) -> Result<Value> {
        let mut pairs: Vec<(&str, &str)> = vec![("command", command), ("response", "json")];
        pairs.extend(
            params
                .iter()
                .filter(|(name, _)| !RESERVED_PARAMS.contains(&name.as_str()))
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );

        let query = match &self.credentials {
            Credentials::Integration => signing::canonical_query(pairs),
            Credentials::Keys(keys) => {
                pairs.push(("apikey", keys.apikey.as_str()));
                signing::signed_query(pairs, &keys.secretkey)?
            }
        };

        let url = format!("{}?{}", self.endpoint, query);
        debug!(command, %url, "sending request");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(command, e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(command, e))?;

        decode_response(command, status, &text)
    }
}

/// Decode the `<command>response` envelope of a reply
pub(crate) fn decode_response(command: &str, status: u16, text: &str) -> Result<Value> {
    let success = (200..300).contains(&status);
    let key = format!("{}response", command.to_lowercase());

    let Ok(mut body) = serde_json::from_str::<Value>(text) else {
        if success {
            return Err(ClientError::InvalidResponse(format!(
                "{} returned a non-JSON body",
                command
            )));
        }
        return Err(ClientError::from_api(command, status, text.trim().to_string()));
    };

    let inner = if let Some(inner) = body.get_mut(&key).map(Value::take) {
        inner
    } else if let Some(inner) = body.get_mut("errorresponse").map(Value::take) {
        inner
    } else {
        body
    };

    if let Some(code) = inner.get("errorcode").and_then(Value::as_u64) {
        let message = inner
            .get("errortext")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let code = u16::try_from(code).unwrap_or(status);
        return Err(ClientError::from_api(command, code, message));
    }

    if !success {
        return Err(ClientError::from_api(command, status, inner.to_string()));
    }

    if !inner.is_object() {
        return Err(ClientError::InvalidResponse(format!(
            "{} returned no '{}' object",
            command, key
        )));
    }

    Ok(inner)
}
