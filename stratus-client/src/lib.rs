//! Session and credential management for control-plane integration tests
//!
//! [`TestClient`] bootstraps an authenticated connection to the management
//! server, classifies the privileges of its credentials, derives clients for
//! per-test users and runs batches of commands on a bounded worker pool.

pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod factory;
pub mod fixture;
pub mod jobs;
pub mod privilege;
pub mod session;
pub mod signing;

pub use client::ApiClient;
pub use command::{ApiCommand, RawCommand};
pub use config::{ConfigError, DatabaseConfig, ManagementServerConfig, TestClientConfig};
pub use connection::{CommandOutput, Connection, Credentials};
pub use db::{AsyncJobRecord, DbConnection};
pub use error::{ClientError, Result};
pub use factory::{UserClientFactory, UserCredentials};
pub use fixture::AccountFixture;
pub use jobs::{JobBatchReport, JobOutcome, JobResult, JobRunner};
pub use privilege::{AccountTypeProbe, ContextClassifier, PrivilegeProbe, ProbeOutcome, RootDomainProbe};
pub use session::TestClient;

pub use stratus_common::{Account, AccountType, ApiKeyPair, Domain, PrivilegeTier, User};
