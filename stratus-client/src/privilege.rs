//! Privilege classification of the credentials in use
//!
//! A [`PrivilegeProbe`] answers "which tier do these credentials have".
//! [`AccountTypeProbe`] asks directly by reading the caller's own account;
//! [`RootDomainProbe`] infers the tier from whether the root domain can be
//! listed. [`ContextClassifier`] runs probes in order until one answers.
//!
//! Only authorization failures are read as "regular user". Transport errors,
//! timeouts and other API errors are returned to the caller unchanged.

use crate::client::ApiClient;
use crate::command::{ListAccounts, ListDomains};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use stratus_common::{Domain, PrivilegeTier};
use tracing::debug;

/// What a probe found out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Tier(PrivilegeTier),
    /// The probe cannot answer for these credentials
    Unavailable,
}

#[async_trait]
pub trait PrivilegeProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, api: &ApiClient) -> Result<ProbeOutcome>;
}

/// Reads the account type of the account owning the connection's API key
pub struct AccountTypeProbe;

#[async_trait]
impl PrivilegeProbe for AccountTypeProbe {
    fn name(&self) -> &'static str {
        "account-type"
    }

    async fn probe(&self, api: &ApiClient) -> Result<ProbeOutcome> {
        let Some(api_key) = api.connection().api_key() else {
            return Ok(ProbeOutcome::Unavailable);
        };

        let accounts = match api.list_accounts(&ListAccounts::default()).await {
            Ok(accounts) => accounts,
            Err(e) if e.is_authorization_failure() => return Ok(ProbeOutcome::Unavailable),
            Err(e) => return Err(e),
        };

        let own = accounts.iter().find(|account| {
            account
                .users
                .iter()
                .any(|user| user.apikey.as_deref() == Some(api_key))
        });

        Ok(match own {
            Some(account) => ProbeOutcome::Tier(account.account_type.privilege_tier()),
            None => ProbeOutcome::Unavailable,
        })
    }
}

/// Lists the root domain by name
///
/// Seeing it means root admin, succeeding without it means domain admin and
/// being refused means regular user.
pub struct RootDomainProbe;

#[async_trait]
impl PrivilegeProbe for RootDomainProbe {
    fn name(&self) -> &'static str {
        "root-domain"
    }

    async fn probe(&self, api: &ApiClient) -> Result<ProbeOutcome> {
        let command = ListDomains {
            name: Some(Domain::ROOT.to_string()),
            ..Default::default()
        };

        match api.list_domains(&command).await {
            Ok(domains) if domains.iter().any(Domain::is_root) => {
                Ok(ProbeOutcome::Tier(PrivilegeTier::RootAdmin))
            }
            Ok(_) => Ok(ProbeOutcome::Tier(PrivilegeTier::DomainAdmin)),
            Err(e) if e.is_authorization_failure() => Ok(ProbeOutcome::Tier(PrivilegeTier::User)),
            Err(e) => Err(e),
        }
    }
}

/// Runs probes in order until one determines the tier
pub struct ContextClassifier {
    probes: Vec<Box<dyn PrivilegeProbe>>,
}

impl Default for ContextClassifier {
    /// Direct account-type query first, root-domain listing as fallback
    fn default() -> Self {
        Self::new(vec![Box::new(AccountTypeProbe), Box::new(RootDomainProbe)])
    }
}

impl ContextClassifier {
    pub fn new(probes: Vec<Box<dyn PrivilegeProbe>>) -> Self {
        Self { probes }
    }

    /// Only the root-domain listing
    pub fn heuristic() -> Self {
        Self::new(vec![Box::new(RootDomainProbe)])
    }

    pub async fn classify(&self, api: &ApiClient) -> Result<PrivilegeTier> {
        for probe in &self.probes {
            match probe.probe(api).await? {
                ProbeOutcome::Tier(tier) => {
                    debug!(probe = probe.name(), %tier, "classified credentials");
                    return Ok(tier);
                }
                ProbeOutcome::Unavailable => {
                    debug!(probe = probe.name(), "probe unavailable, trying next");
                }
            }
        }

        Err(ClientError::InvalidResponse(
            "no privilege probe could classify the credentials".to_string(),
        ))
    }
}
