//! Identity records of the control plane: domains, accounts and users

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain (the top of the identity hierarchy)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "parentdomainid")]
    pub parent_domain_id: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
}

impl Domain {
    /// Name of the root domain every installation starts with
    pub const ROOT: &'static str = "ROOT";

    /// The top-level root domain, not a subdomain that happens to share its name
    pub fn is_root(&self) -> bool {
        self.name == Self::ROOT && self.parent_domain_id.is_none()
    }
}

/// Account type as encoded by the control plane
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccountType {
    #[default]
    Normal,
    Admin,
    DomainAdmin,
    ResourceDomainAdmin,
    ReadOnlyAdmin,
    Project,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid account type: {0}")]
pub struct InvalidAccountType(pub u8);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown account type '{0}'")]
pub struct UnknownAccountType(pub String);

impl TryFrom<u8> for AccountType {
    type Error = InvalidAccountType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Admin),
            2 => Ok(Self::DomainAdmin),
            3 => Ok(Self::ResourceDomainAdmin),
            4 => Ok(Self::ReadOnlyAdmin),
            5 => Ok(Self::Project),
            other => Err(InvalidAccountType(other)),
        }
    }
}

impl From<AccountType> for u8 {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Normal => 0,
            AccountType::Admin => 1,
            AccountType::DomainAdmin => 2,
            AccountType::ResourceDomainAdmin => 3,
            AccountType::ReadOnlyAdmin => 4,
            AccountType::Project => 5,
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "normal" | "0" => Ok(Self::Normal),
            "admin" | "1" => Ok(Self::Admin),
            "domain-admin" | "domainadmin" | "2" => Ok(Self::DomainAdmin),
            "resource-domain-admin" | "3" => Ok(Self::ResourceDomainAdmin),
            "read-only-admin" | "4" => Ok(Self::ReadOnlyAdmin),
            "project" | "5" => Ok(Self::Project),
            _ => Err(UnknownAccountType(s.to_string())),
        }
    }
}

impl AccountType {
    /// Privilege tier an account of this type operates with
    pub fn privilege_tier(self) -> PrivilegeTier {
        match self {
            Self::Admin | Self::ReadOnlyAdmin => PrivilegeTier::RootAdmin,
            Self::DomainAdmin | Self::ResourceDomainAdmin => PrivilegeTier::DomainAdmin,
            Self::Normal | Self::Project => PrivilegeTier::User,
        }
    }
}

/// Account (owned by a domain, owns users)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "accounttype")]
    pub account_type: AccountType,
    #[serde(rename = "domainid")]
    pub domain_id: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, rename = "user")]
    pub users: Vec<User>,
}

/// User (credentials are issued per user)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default, rename = "accountid")]
    pub account_id: Option<String>,
    #[serde(default, rename = "domainid")]
    pub domain_id: Option<String>,
    #[serde(default, rename = "accounttype")]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub apikey: Option<String>,
    #[serde(default)]
    pub secretkey: Option<String>,
}

impl User {
    /// Key pair of this user, if the listing returned both halves
    pub fn key_pair(&self) -> Option<ApiKeyPair> {
        match (&self.apikey, &self.secretkey) {
            (Some(apikey), Some(secretkey)) => Some(ApiKeyPair {
                apikey: apikey.clone(),
                secretkey: secretkey.clone(),
            }),
            _ => None,
        }
    }
}

/// API key/secret pair used to sign requests
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyPair {
    pub apikey: String,
    pub secretkey: String,
}

impl ApiKeyPair {
    pub fn new(apikey: impl Into<String>, secretkey: impl Into<String>) -> Self {
        Self {
            apikey: apikey.into(),
            secretkey: secretkey.into(),
        }
    }
}

// Keep secrets out of logs
impl std::fmt::Debug for ApiKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyPair")
            .field("apikey", &self.apikey)
            .field("secretkey", &"<redacted>")
            .finish()
    }
}

/// Privilege tier of the credentials in use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PrivilegeTier {
    RootAdmin,
    DomainAdmin,
    User,
}

impl PrivilegeTier {
    /// Whether this tier may create domains, accounts and keys for others
    pub fn is_admin(self) -> bool {
        matches!(self, Self::RootAdmin | Self::DomainAdmin)
    }
}

impl std::fmt::Display for PrivilegeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootAdmin => write!(f, "root-admin"),
            Self::DomainAdmin => write!(f, "domain-admin"),
            Self::User => write!(f, "user"),
        }
    }
}
