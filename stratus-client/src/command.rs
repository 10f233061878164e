//! API commands
//!
//! Every control-plane call is a named command plus flat query parameters.
//! Typed commands implement [`ApiCommand`]; [`RawCommand`] carries any command
//! by name for the job runner and the CLI.

use crate::error::{ClientError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use stratus_common::{Account, AccountType, ApiKeyPair, AsyncJobResult, Domain, User};

/// A typed control-plane command
pub trait ApiCommand: Serialize + Send + Sync {
    /// Command name as sent in the `command` parameter
    const NAME: &'static str;
    /// Async commands return a job id that has to be polled
    const IS_ASYNC: bool = false;

    type Response: DeserializeOwned + Send;

    fn to_params(&self) -> Result<Vec<(String, String)>> {
        params_from(self)
    }

    fn to_raw(&self) -> Result<RawCommand> {
        Ok(RawCommand {
            name: Self::NAME.to_string(),
            is_async: Self::IS_ASYNC,
            params: self.to_params()?.into_iter().collect(),
        })
    }
}

/// Untyped command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommand {
    pub name: String,
    pub is_async: bool,
    pub params: BTreeMap<String, String>,
}

impl RawCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_async: false,
            params: BTreeMap::new(),
        }
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Parse `name=value` pairs as given on a command line
    pub fn with_pairs<I, S>(mut self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                ClientError::InvalidCommand(format!("expected name=value, got '{}'", pair))
            })?;
            self.params.insert(name.to_string(), value.to_string());
        }
        Ok(self)
    }
}

/// Flatten a serialized command into query parameters
///
/// Nulls are dropped, arrays are comma-joined and nested objects become
/// `name[0].key=value` map parameters.
pub fn params_from<T: Serialize + ?Sized>(command: &T) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(command)?;
    let Value::Object(fields) = value else {
        return Err(ClientError::InvalidCommand(
            "command must serialize to an object".to_string(),
        ));
    };

    let mut params = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        match value {
            Value::Null => {}
            Value::Object(map) => {
                for (key, inner) in map {
                    if let Some(inner) = scalar(&inner) {
                        params.push((format!("{}[0].{}", name, key), inner));
                    }
                }
            }
            Value::Array(items) => {
                let joined: Vec<String> = items.iter().filter_map(scalar).collect();
                if !joined.is_empty() {
                    params.push((name, joined.join(",")));
                }
            }
            other => {
                if let Some(value) = scalar(&other) {
                    params.push((name, value));
                }
            }
        }
    }
    Ok(params)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Domains
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListDomains {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listall: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDomainsResponse {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default, rename = "domain")]
    pub domains: Vec<Domain>,
}

impl ApiCommand for ListDomains {
    const NAME: &'static str = "listDomains";
    type Response = ListDomainsResponse;
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDomain {
    pub name: String,
    #[serde(rename = "parentdomainid", skip_serializing_if = "Option::is_none")]
    pub parent_domain_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDomainResponse {
    pub domain: Domain,
}

impl ApiCommand for CreateDomain {
    const NAME: &'static str = "createDomain";
    type Response = CreateDomainResponse;
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListAccounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "domainid", skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listall: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAccountsResponse {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default, rename = "account")]
    pub accounts: Vec<Account>,
}

impl ApiCommand for ListAccounts {
    const NAME: &'static str = "listAccounts";
    type Response = ListAccountsResponse;
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAccount {
    #[serde(rename = "accounttype")]
    pub account_type: AccountType,
    #[serde(rename = "domainid")]
    pub domain_id: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountResponse {
    pub account: Account,
}

impl ApiCommand for CreateAccount {
    const NAME: &'static str = "createAccount";
    type Response = CreateAccountResponse;
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteAccount {
    pub id: String,
}

/// Result body of commands that only report success
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: Option<Value>,
    #[serde(default)]
    pub displaytext: Option<String>,
}

impl SuccessResponse {
    pub fn is_success(&self) -> bool {
        match &self.success {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

impl ApiCommand for DeleteAccount {
    const NAME: &'static str = "deleteAccount";
    const IS_ASYNC: bool = true;
    type Response = SuccessResponse;
}

// ============================================================================
// Users and keys
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListUsers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(rename = "domainid", skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listall: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListUsersResponse {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default, rename = "user")]
    pub users: Vec<User>,
}

impl ApiCommand for ListUsers {
    const NAME: &'static str = "listUsers";
    type Response = ListUsersResponse;
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserKeysResponse {
    pub userkeys: ApiKeyPair,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterUserKeys {
    pub id: String,
}

impl ApiCommand for RegisterUserKeys {
    const NAME: &'static str = "registerUserKeys";
    type Response = UserKeysResponse;
}

#[derive(Debug, Clone, Serialize)]
pub struct GetUserKeys {
    pub id: String,
}

impl ApiCommand for GetUserKeys {
    const NAME: &'static str = "getUserKeys";
    type Response = UserKeysResponse;
}

// ============================================================================
// Async jobs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct QueryAsyncJobResult {
    #[serde(rename = "jobid")]
    pub job_id: String,
}

impl ApiCommand for QueryAsyncJobResult {
    const NAME: &'static str = "queryAsyncJobResult";
    type Response = AsyncJobResult;
}
