//! Session and credential commands

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use serde::Serialize;
use stratus_client::TestClient;
use stratus_common::AccountType;
use tabled::Tabled;

#[derive(Serialize, Tabled)]
struct WhoamiRow {
    endpoint: String,
    api_key: String,
    tier: String,
    admin: bool,
}

pub async fn whoami(session: &TestClient, format: OutputFormat) -> Result<()> {
    let api = session.api_client();
    let tier = session
        .privilege_tier()
        .await
        .context("Failed to classify credentials")?;

    let row = WhoamiRow {
        endpoint: api.connection().endpoint().to_string(),
        api_key: api
            .connection()
            .api_key()
            .unwrap_or("(integration port)")
            .to_string(),
        tier: tier.to_string(),
        admin: tier.is_admin(),
    };

    output::print_output(vec![row], format)
}

#[derive(Serialize, Tabled)]
struct UserKeysRow {
    domain: String,
    account: String,
    username: String,
    user_id: String,
    apikey: String,
    secretkey: String,
}

pub async fn user_keys(
    session: &TestClient,
    account: &str,
    domain: &str,
    account_type: AccountType,
    show_secret: bool,
    format: OutputFormat,
) -> Result<()> {
    if !session.is_admin_context().await? {
        anyhow::bail!("The configured credentials cannot create users or keys");
    }

    let credentials = session
        .user_factory()
        .ensure_user(account, domain, account_type)
        .await
        .with_context(|| format!("Failed to prepare user '{}' in domain '{}'", account, domain))?;

    let secretkey = if show_secret {
        credentials.keys.secretkey.clone()
    } else {
        output::mask_secret(&credentials.keys.secretkey)
    };

    if format == OutputFormat::Table {
        output::print_success(&format!(
            "User '{}' ready in account '{}' ({})",
            credentials.user.username, credentials.account.name, credentials.account.id
        ));
    }

    let row = UserKeysRow {
        domain: credentials.domain.name,
        account: credentials.account.name,
        username: credentials.user.username,
        user_id: credentials.user.id,
        apikey: credentials.keys.apikey,
        secretkey,
    };

    output::print_output(vec![row], format)
}
