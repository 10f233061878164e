//! Derivation of user-scoped API clients
//!
//! Given an account and domain name, the factory makes sure the domain, the
//! account, its user and the user's key pair exist, then hands out a client
//! signed with that key pair. Only the domain and the account are created when
//! missing; a missing user is an error.

use crate::client::ApiClient;
use crate::command::{CreateAccount, ListAccounts, ListDomains, ListUsers};
use crate::error::{ClientError, Result};
use crate::privilege::ContextClassifier;
use rand::distributions::Alphanumeric;
use rand::Rng;
use stratus_common::{Account, AccountType, ApiKeyPair, Domain, User};
use tracing::{debug, info};

/// Password given to accounts the factory creates
pub const DEFAULT_ACCOUNT_PASSWORD: &str = "password";

/// Records behind a derived client
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub domain: Domain,
    pub account: Account,
    pub user: User,
    pub keys: ApiKeyPair,
}

pub struct UserClientFactory<'a> {
    api: &'a ApiClient,
    classifier: &'a ContextClassifier,
}

impl<'a> UserClientFactory<'a> {
    pub fn new(api: &'a ApiClient, classifier: &'a ContextClassifier) -> Self {
        Self { api, classifier }
    }

    /// Client authenticated as the user of `account_name` in `domain_name`
    ///
    /// Without admin privileges nothing can be derived and the admin client
    /// itself is returned.
    pub async fn user_api_client(
        &self,
        account_name: &str,
        domain_name: &str,
        account_type: AccountType,
    ) -> Result<ApiClient> {
        let tier = self.classifier.classify(self.api).await?;
        if !tier.is_admin() {
            debug!(%tier, "credentials cannot derive users, reusing current client");
            return Ok(self.api.clone());
        }

        let credentials = self.ensure_user(account_name, domain_name, account_type).await?;
        self.api.derive(credentials.keys)
    }

    /// Resolve or create everything a user client needs
    pub async fn ensure_user(
        &self,
        account_name: &str,
        domain_name: &str,
        account_type: AccountType,
    ) -> Result<UserCredentials> {
        let domain = self.ensure_domain(domain_name).await?;
        let account = self.ensure_account(account_name, &domain, account_type).await?;
        let user = self.find_user(&account).await?;
        let keys = self.ensure_keys(&user).await?;

        Ok(UserCredentials {
            domain,
            account,
            user,
            keys,
        })
    }

    async fn ensure_domain(&self, name: &str) -> Result<Domain> {
        let command = ListDomains {
            name: Some(name.to_string()),
            listall: Some(true),
            ..Default::default()
        };
        let existing = self
            .api
            .list_domains(&command)
            .await?
            .into_iter()
            .find(|d| d.name == name);

        match existing {
            Some(domain) => {
                debug!("Found domain '{}' ({})", domain.name, domain.id);
                Ok(domain)
            }
            None => self.api.create_domain(name, None).await,
        }
    }

    async fn ensure_account(
        &self,
        name: &str,
        domain: &Domain,
        account_type: AccountType,
    ) -> Result<Account> {
        let command = ListAccounts {
            name: Some(name.to_string()),
            domain_id: Some(domain.id.clone()),
            listall: Some(true),
            ..Default::default()
        };
        let existing = self
            .api
            .list_accounts(&command)
            .await?
            .into_iter()
            .find(|a| a.name == name);

        if let Some(account) = existing {
            debug!("Found account '{}' ({})", account.name, account.id);
            return Ok(account);
        }

        let command = CreateAccount {
            account_type,
            domain_id: domain.id.clone(),
            email: test_email(&domain.name),
            firstname: name.to_string(),
            lastname: name.to_string(),
            password: DEFAULT_ACCOUNT_PASSWORD.to_string(),
            username: name.to_string(),
            account: None,
        };
        self.api.create_account(&command).await
    }

    async fn find_user(&self, account: &Account) -> Result<User> {
        let command = ListUsers {
            username: Some(account.name.clone()),
            account: Some(account.name.clone()),
            domain_id: Some(account.domain_id.clone()),
            listall: Some(true),
            ..Default::default()
        };

        self.api
            .list_users(&command)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClientError::NotFound(format!(
                    "user of account '{}' in domain {}",
                    account.name, account.domain_id
                ))
            })
    }

    async fn ensure_keys(&self, user: &User) -> Result<ApiKeyPair> {
        if let Some(keys) = user.key_pair() {
            return Ok(keys);
        }
        // Listings may withhold the secret of an existing pair
        if user.apikey.is_some() {
            return self.api.get_user_keys(&user.id).await;
        }

        info!("User '{}' has no API keys, registering a pair", user.username);
        self.api.register_user_keys(&user.id).await
    }
}

/// `test-<random>@<domain>.test`, with the domain name lower-cased and
/// reduced to characters valid in a host label
fn test_email(domain_name: &str) -> String {
    let label: String = domain_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("test-{}@{}.test", random_suffix(), label.trim_matches('-'))
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}
