//! Test client: the session a test suite works through
//!
//! Bootstraps the admin connection from configuration, optionally opens the
//! database connection, and hands out the admin client, derived user clients
//! and the job runner.

use crate::client::ApiClient;
use crate::command::RawCommand;
use crate::config::TestClientConfig;
use crate::connection::Connection;
use crate::db::DbConnection;
use crate::error::Result;
use crate::factory::UserClientFactory;
use crate::jobs::{JobBatchReport, JobRunner};
use crate::privilege::ContextClassifier;
use std::sync::Arc;
use std::time::Duration;
use stratus_common::{AccountType, PrivilegeTier};
use tracing::info;

pub struct TestClient {
    config: TestClientConfig,
    api: ApiClient,
    db: Option<Arc<DbConnection>>,
    classifier: ContextClassifier,
    jobs: JobRunner,
    identifier: Option<String>,
}

// The config carries passwords and secrets; show only what identifies the session
impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("api", &self.api)
            .field("database", &self.db.is_some())
            .field("identifier", &self.identifier)
            .finish()
    }
}

impl TestClient {
    /// Connect with the bootstrap credentials of `config`
    pub async fn connect(config: TestClientConfig) -> Result<Self> {
        config.validate()?;

        let connection = Connection::new(
            &config.management,
            config.async_timeout(),
            config.poll_interval(),
        )?;
        let api = ApiClient::new(connection).with_hypervisor(config.hypervisor.clone());

        let db = match &config.database {
            Some(db_config) => Some(Arc::new(DbConnection::connect(db_config).await?)),
            None => None,
        };

        Ok(Self::assemble(config, api, db))
    }

    /// Build from parts that are already connected
    pub fn from_parts(config: TestClientConfig, api: ApiClient, db: Option<DbConnection>) -> Self {
        Self::assemble(config, api, db.map(Arc::new))
    }

    fn assemble(config: TestClientConfig, api: ApiClient, db: Option<Arc<DbConnection>>) -> Self {
        // A job may spend a full request plus the whole polling window
        let batch_timeout = config.async_timeout() + config.management.request_timeout();
        let jobs = JobRunner::new(api.clone(), db.clone(), batch_timeout);
        info!(
            "Test client ready for {} (database: {})",
            api.connection().endpoint(),
            if db.is_some() { "yes" } else { "no" }
        );

        Self {
            config,
            api,
            db,
            classifier: ContextClassifier::default(),
            jobs,
            identifier: None,
        }
    }

    /// Replace the privilege classifier
    pub fn with_classifier(mut self, classifier: ContextClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &TestClientConfig {
        &self.config
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = Some(identifier.into());
    }

    /// Admin client, stamped with the current test identifier
    pub fn api_client(&self) -> ApiClient {
        self.api.clone().with_identifier(self.identifier.clone())
    }

    pub fn db_connection(&self) -> Option<&DbConnection> {
        self.db.as_deref()
    }

    pub fn job_runner(&self) -> &JobRunner {
        &self.jobs
    }

    /// Privilege tier of the bootstrap credentials
    pub async fn privilege_tier(&self) -> Result<PrivilegeTier> {
        self.classifier.classify(&self.api).await
    }

    /// Whether the bootstrap credentials can derive user clients
    pub async fn is_admin_context(&self) -> Result<bool> {
        Ok(self.privilege_tier().await?.is_admin())
    }

    /// Factory deriving user clients from the admin client
    pub fn user_factory(&self) -> UserClientFactory<'_> {
        UserClientFactory::new(&self.api, &self.classifier)
    }

    /// Client authenticated as the user of `account` in `domain`
    pub async fn user_api_client(
        &self,
        account: &str,
        domain: &str,
        account_type: AccountType,
    ) -> Result<ApiClient> {
        let client = self
            .user_factory()
            .user_api_client(account, domain, account_type)
            .await?;
        Ok(client.with_identifier(self.identifier.clone()))
    }

    /// Run commands on `workers` concurrent workers (default worker count when `None`)
    pub async fn submit_cmds_and_wait(
        &self,
        commands: Vec<RawCommand>,
        workers: Option<usize>,
    ) -> JobBatchReport {
        let workers = workers.unwrap_or(self.config.default_worker_threads);
        self.jobs.submit_cmds_and_wait(commands, workers).await
    }

    /// Run one command `times` times
    pub async fn submit_job(
        &self,
        command: RawCommand,
        times: usize,
        workers: usize,
        interval: Duration,
    ) -> JobBatchReport {
        self.jobs
            .submit_job_n_times(command, times, workers, interval)
            .await
    }

    /// Run distinct commands, `interval` apart
    pub async fn submit_jobs(
        &self,
        commands: Vec<RawCommand>,
        workers: usize,
        interval: Duration,
    ) -> JobBatchReport {
        self.jobs.submit_jobs(commands, workers, interval).await
    }

    /// Close the session
    pub async fn close(self) {
        if let Some(db) = &self.db {
            db.close().await;
        }
        info!("Test client closed");
    }
}
