//! API client bound to one connection

use crate::command::{
    ApiCommand, CreateAccount, CreateDomain, DeleteAccount, GetUserKeys, ListAccounts, ListDomains,
    ListUsers, QueryAsyncJobResult, RawCommand, RegisterUserKeys,
};
use crate::connection::{CommandOutput, Connection};
use crate::error::{ClientError, Result};
use std::sync::Arc;
use stratus_common::{Account, ApiKeyPair, AsyncJobResult, Domain, User};
use tracing::info;

/// Control-plane API client
///
/// Cloning is cheap: clones share the same [`Connection`].
#[derive(Clone)]
pub struct ApiClient {
    connection: Arc<Connection>,
    identifier: Option<String>,
    hypervisor: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.connection.endpoint())
            .field("api_key", &self.connection.api_key())
            .field("identifier", &self.identifier)
            .field("hypervisor", &self.hypervisor)
            .finish()
    }
}

impl ApiClient {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Arc::new(connection),
            identifier: None,
            hypervisor: None,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Identifier of the test this client works for
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn with_identifier(mut self, identifier: Option<String>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn hypervisor(&self) -> Option<&str> {
        self.hypervisor.as_deref()
    }

    pub fn with_hypervisor(mut self, hypervisor: Option<String>) -> Self {
        self.hypervisor = hypervisor;
        self
    }

    /// Derive a client signed with `keys`, keeping identifier and hypervisor
    pub fn derive(&self, keys: ApiKeyPair) -> Result<Self> {
        Ok(Self {
            connection: Arc::new(self.connection.with_keys(keys)?),
            identifier: self.identifier.clone(),
            hypervisor: self.hypervisor.clone(),
        })
    }

    pub async fn execute<C: ApiCommand>(&self, command: &C) -> Result<C::Response> {
        self.connection.execute(command).await
    }

    pub async fn execute_raw(&self, command: &RawCommand) -> Result<CommandOutput> {
        self.connection.execute_raw(command).await
    }

    pub async fn list_domains(&self, command: &ListDomains) -> Result<Vec<Domain>> {
        Ok(self.execute(command).await?.domains)
    }

    pub async fn create_domain(&self, name: &str, parent_domain_id: Option<&str>) -> Result<Domain> {
        let command = CreateDomain {
            name: name.to_string(),
            parent_domain_id: parent_domain_id.map(str::to_string),
        };
        let domain = self.execute(&command).await?.domain;
        info!("Created domain '{}' ({})", domain.name, domain.id);
        Ok(domain)
    }

    pub async fn list_accounts(&self, command: &ListAccounts) -> Result<Vec<Account>> {
        Ok(self.execute(command).await?.accounts)
    }

    pub async fn create_account(&self, command: &CreateAccount) -> Result<Account> {
        let account = self.execute(command).await?.account;
        info!(
            "Created account '{}' ({}) in domain {}",
            account.name, account.id, account.domain_id
        );
        Ok(account)
    }

    /// Delete an account (async job)
    pub async fn delete_account(&self, id: &str) -> Result<()> {
        let response = self.execute(&DeleteAccount { id: id.to_string() }).await?;
        if !response.is_success() {
            return Err(ClientError::InvalidResponse(format!(
                "deleteAccount {} did not report success",
                id
            )));
        }
        info!("Deleted account {}", id);
        Ok(())
    }

    pub async fn list_users(&self, command: &ListUsers) -> Result<Vec<User>> {
        Ok(self.execute(command).await?.users)
    }

    pub async fn register_user_keys(&self, user_id: &str) -> Result<ApiKeyPair> {
        let keys = self
            .execute(&RegisterUserKeys { id: user_id.to_string() })
            .await?
            .userkeys;
        info!("Registered API keys for user {}", user_id);
        Ok(keys)
    }

    pub async fn get_user_keys(&self, user_id: &str) -> Result<ApiKeyPair> {
        Ok(self
            .execute(&GetUserKeys { id: user_id.to_string() })
            .await?
            .userkeys)
    }

    pub async fn query_async_job_result(&self, job_id: &str) -> Result<AsyncJobResult> {
        self.execute(&QueryAsyncJobResult { job_id: job_id.to_string() })
            .await
    }
}
