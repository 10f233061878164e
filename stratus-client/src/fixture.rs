//! Explicit per-test account fixtures
//!
//! A test sets up the accounts it needs, passes the fixtures by reference to
//! whatever needs them and tears them down at the end.

use crate::client::ApiClient;
use crate::error::Result;
use crate::factory::UserCredentials;
use crate::session::TestClient;
use stratus_common::{Account, AccountType, Domain, User};

pub struct AccountFixture {
    credentials: UserCredentials,
    client: ApiClient,
}

impl AccountFixture {
    /// Make sure the account exists and derive a client for its user
    pub async fn setup(
        session: &TestClient,
        account: &str,
        domain: &str,
        account_type: AccountType,
    ) -> Result<Self> {
        let credentials = session
            .user_factory()
            .ensure_user(account, domain, account_type)
            .await?;
        let client = session.api_client().derive(credentials.keys.clone())?;

        Ok(Self { credentials, client })
    }

    /// Client authenticated as the account's user
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn domain(&self) -> &Domain {
        &self.credentials.domain
    }

    pub fn account(&self) -> &Account {
        &self.credentials.account
    }

    pub fn user(&self) -> &User {
        &self.credentials.user
    }

    /// Delete the account through the admin client
    pub async fn teardown(self, session: &TestClient) -> Result<()> {
        session
            .api_client()
            .delete_account(&self.credentials.account.id)
            .await
    }
}
