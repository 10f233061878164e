//! In-process mock of the management server's query API
//!
//! Verifies request signatures, keeps domains, accounts, users and async jobs
//! in memory and counts every command it serves.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stratus_client::signing;
use stratus_client::{TestClient, TestClientConfig};
use stratus_common::{Account, AccountType, ApiKeyPair, Domain, PrivilegeTier, User};
use tokio::net::TcpListener;

pub const API_PATH: &str = "/client/api";
pub const ADMIN_KEY: &str = "admin-api-key";
pub const ADMIN_SECRET: &str = "admin-secret-key";
pub const ROOT_DOMAIN_ID: &str = "d-root";

pub type Shared = Arc<Mutex<MockState>>;

struct MockJob {
    command: String,
    polls_left: u32,
    outcome: std::result::Result<Value, String>,
}

#[derive(Clone)]
enum Caller {
    System,
    Account {
        account_type: AccountType,
        account_id: String,
        domain_id: String,
    },
}

impl Caller {
    fn tier(&self) -> PrivilegeTier {
        match self {
            Caller::System => PrivilegeTier::RootAdmin,
            Caller::Account { account_type, .. } => account_type.privilege_tier(),
        }
    }
}

pub struct MockState {
    pub domains: Vec<Domain>,
    pub accounts: Vec<Account>,
    jobs: HashMap<String, MockJob>,
    next_id: u64,
    calls: HashMap<String, usize>,
    in_flight: usize,
    pub max_in_flight: usize,
    /// Leave `secretkey` out of user listings
    pub hide_secrets: bool,
    /// Commands answered with an internal error
    pub broken_commands: HashSet<String>,
    /// Polls an async job stays pending for
    pub job_polls: u32,
}

impl MockState {
    fn new() -> Self {
        let root = Domain {
            id: ROOT_DOMAIN_ID.to_string(),
            name: Domain::ROOT.to_string(),
            path: Some("ROOT".to_string()),
            parent_domain_id: None,
            level: Some(0),
        };
        let mut state = Self {
            domains: vec![root],
            accounts: Vec::new(),
            jobs: HashMap::new(),
            next_id: 1,
            calls: HashMap::new(),
            in_flight: 0,
            max_in_flight: 0,
            hide_secrets: false,
            broken_commands: HashSet::new(),
            job_polls: 1,
        };
        state.insert_account(
            ROOT_DOMAIN_ID,
            "admin",
            AccountType::Admin,
            Some(ApiKeyPair::new(ADMIN_KEY, ADMIN_SECRET)),
        );
        state
    }

    fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }

    /// Id the next async job will get
    pub fn next_job_id(&self) -> String {
        format!("job-{}", self.next_id)
    }

    pub fn calls(&self, command: &str) -> usize {
        self.calls.get(command).copied().unwrap_or(0)
    }

    pub fn domain_count(&self, name: &str) -> usize {
        self.domains.iter().filter(|d| d.name == name).count()
    }

    pub fn account_count(&self, name: &str) -> usize {
        self.accounts.iter().filter(|a| a.name == name).count()
    }

    pub fn insert_domain(&mut self, name: &str, parent_id: &str) -> Domain {
        let parent_path = self
            .domains
            .iter()
            .find(|d| d.id == parent_id)
            .and_then(|d| d.path.clone())
            .unwrap_or_else(|| "ROOT".to_string());
        let domain = Domain {
            id: self.next_id("d"),
            name: name.to_string(),
            path: Some(format!("{}/{}", parent_path, name)),
            parent_domain_id: Some(parent_id.to_string()),
            level: Some(parent_path.matches('/').count() as u32 + 1),
        };
        self.domains.push(domain.clone());
        domain
    }

    pub fn insert_account(
        &mut self,
        domain_id: &str,
        name: &str,
        account_type: AccountType,
        keys: Option<ApiKeyPair>,
    ) -> Account {
        let account_id = self.next_id("a");
        let user = User {
            id: self.next_id("u"),
            username: name.to_string(),
            account: Some(name.to_string()),
            account_id: Some(account_id.clone()),
            domain_id: Some(domain_id.to_string()),
            account_type: Some(account_type),
            email: None,
            firstname: Some(name.to_string()),
            lastname: Some(name.to_string()),
            state: Some("enabled".to_string()),
            apikey: keys.as_ref().map(|k| k.apikey.clone()),
            secretkey: keys.as_ref().map(|k| k.secretkey.clone()),
        };
        let account = Account {
            id: account_id,
            name: name.to_string(),
            account_type,
            domain_id: domain_id.to_string(),
            domain: None,
            state: Some("enabled".to_string()),
            users: vec![user],
        };
        self.accounts.push(account.clone());
        account
    }

    fn domain_path(&self, id: &str) -> Option<String> {
        self.domains.iter().find(|d| d.id == id).and_then(|d| d.path.clone())
    }

    fn domain_visible(&self, caller: &Caller, domain_id: &str) -> bool {
        match caller {
            Caller::System => true,
            Caller::Account { account_type, domain_id: own, .. } => {
                match account_type.privilege_tier() {
                    PrivilegeTier::RootAdmin => true,
                    PrivilegeTier::DomainAdmin => {
                        match (self.domain_path(own), self.domain_path(domain_id)) {
                            (Some(own), Some(other)) => other == own || other.starts_with(&format!("{}/", own)),
                            _ => false,
                        }
                    }
                    PrivilegeTier::User => false,
                }
            }
        }
    }

    fn account_visible(&self, caller: &Caller, account: &Account) -> bool {
        match caller {
            Caller::Account { account_type, account_id, .. }
                if account_type.privilege_tier() == PrivilegeTier::User =>
            {
                &account.id == account_id
            }
            _ => self.domain_visible(caller, &account.domain_id),
        }
    }

    fn authenticate(&self, params: &HashMap<String, String>) -> Option<Caller> {
        let Some(apikey) = params.get("apikey") else {
            return Some(Caller::System);
        };
        let signature = params.get("signature")?;
        let (account, user) = self.accounts.iter().find_map(|a| {
            a.users
                .iter()
                .find(|u| u.apikey.as_deref() == Some(apikey.as_str()))
                .map(|u| (a, u))
        })?;
        let secret = user.secretkey.as_deref()?;

        let pairs = params.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        if !signing::verify(pairs, secret, signature) {
            return None;
        }

        Some(Caller::Account {
            account_type: account.account_type,
            account_id: account.id.clone(),
            domain_id: account.domain_id.clone(),
        })
    }

    fn user_json(&self, user: &User) -> Value {
        let mut value = serde_json::to_value(user).unwrap_or(Value::Null);
        if self.hide_secrets {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("secretkey");
            }
        }
        value
    }

    fn account_json(&self, account: &Account) -> Value {
        let mut value = serde_json::to_value(account).unwrap_or(Value::Null);
        value["user"] = Value::Array(account.users.iter().map(|u| self.user_json(u)).collect());
        value
    }

    fn new_job(&mut self, command: &str, outcome: std::result::Result<Value, String>) -> String {
        let job_id = self.next_id("job");
        self.jobs.insert(
            job_id.clone(),
            MockJob {
                command: command.to_string(),
                polls_left: self.job_polls,
                outcome,
            },
        );
        job_id
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl MockServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::new()));
        let app = Router::new()
            .route(API_PATH, get(handle))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to read mock server address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock server failed");
        });

        MockServer { addr, state }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("Mock state poisoned")
    }

    /// Configuration pointing at this server, signed with `keys`
    pub fn config(&self, keys: Option<&ApiKeyPair>) -> TestClientConfig {
        let mut config = TestClientConfig::default();
        config.management.host = self.addr.ip().to_string();
        config.management.port = self.addr.port();
        config.management.path = API_PATH.to_string();
        config.management.request_timeout_secs = 5;
        config.management.api_key = keys.map(|k| k.apikey.clone());
        config.management.secret_key = keys.map(|k| k.secretkey.clone());
        config.async_timeout_secs = 5;
        config.poll_interval_ms = 10;
        config.default_worker_threads = 4;
        config.hypervisor = Some("Simulator".to_string());
        config
    }

    pub fn admin_keys() -> ApiKeyPair {
        ApiKeyPair::new(ADMIN_KEY, ADMIN_SECRET)
    }

    /// Remove every user of the named account
    pub fn drop_users(&self, account: &str) {
        let mut state = self.state();
        for a in state.accounts.iter_mut().filter(|a| a.name == account) {
            a.users.clear();
        }
    }

    /// Seed a domain under ROOT with one account of `account_type` holding `keys`
    pub fn seed_account(
        &self,
        domain: &str,
        account: &str,
        account_type: AccountType,
        keys: Option<ApiKeyPair>,
    ) -> Account {
        let mut state = self.state();
        let domain_id = match state.domains.iter().find(|d| d.name == domain) {
            Some(d) => d.id.clone(),
            None => state.insert_domain(domain, ROOT_DOMAIN_ID).id,
        };
        state.insert_account(&domain_id, account, account_type, keys)
    }
}

/// Per-test environment: a fresh server and a client connected to it
pub struct TestEnv {
    pub server: MockServer,
    pub client: TestClient,
}

impl TestEnv {
    pub async fn admin() -> Self {
        let server = MockServer::start().await;
        let client = TestClient::connect(server.config(Some(&MockServer::admin_keys())))
            .await
            .expect("Failed to connect test client");
        TestEnv { server, client }
    }

    pub async fn with_keys(server: MockServer, keys: &ApiKeyPair) -> Self {
        let client = TestClient::connect(server.config(Some(keys)))
            .await
            .expect("Failed to connect test client");
        TestEnv { server, client }
    }
}

fn envelope(command: &str, body: Value) -> Response {
    let key = format!("{}response", command.to_lowercase());
    Json(json!({ key: body })).into_response()
}

fn api_error(command: &str, code: u16, text: &str) -> Response {
    let key = format!("{}response", command.to_lowercase());
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({ key: { "errorcode": code, "cserrorcode": 9999, "errortext": text } })),
    )
        .into_response()
}

fn list(key: &str, items: Vec<Value>) -> Value {
    if items.is_empty() {
        json!({})
    } else {
        json!({ "count": items.len(), key: items })
    }
}

async fn handle(State(state): State<Shared>, Query(params): Query<HashMap<String, String>>) -> Response {
    let command = params.get("command").cloned().unwrap_or_default();

    if command == "slowCommand" {
        return slow_command(&state, &params).await;
    }

    let mut state = match state.lock() {
        Ok(state) => state,
        Err(_) => return api_error(&command, 530, "state poisoned"),
    };
    *state.calls.entry(command.clone()).or_default() += 1;

    let Some(caller) = state.authenticate(&params) else {
        return api_error(&command, 401, "unable to verify user credentials and/or request signature");
    };

    if state.broken_commands.contains(&command) {
        return api_error(&command, 530, "internal error executing command");
    }

    let admin = caller.tier().is_admin();
    let param = |name: &str| params.get(name).cloned();

    match command.as_str() {
        "listDomains" => {
            if !admin {
                return api_error(&command, 432, "The given command does not exist or it is not available for user");
            }
            let name = param("name");
            let items = state
                .domains
                .iter()
                .filter(|d| name.as_ref().map_or(true, |n| &d.name == n))
                .filter(|d| state.domain_visible(&caller, &d.id))
                .map(|d| serde_json::to_value(d).unwrap_or(Value::Null))
                .collect();
            envelope(&command, list("domain", items))
        }
        "createDomain" => {
            if !admin {
                return api_error(&command, 432, "The given command does not exist or it is not available for user");
            }
            let Some(name) = param("name") else {
                return api_error(&command, 431, "Unable to execute API command createdomain due to missing parameter name");
            };
            let parent = param("parentdomainid").unwrap_or_else(|| ROOT_DOMAIN_ID.to_string());
            let domain = state.insert_domain(&name, &parent);
            envelope(&command, json!({ "domain": domain }))
        }
        "listAccounts" => {
            let name = param("name");
            let domain_id = param("domainid");
            let items = state
                .accounts
                .iter()
                .filter(|a| name.as_ref().map_or(true, |n| &a.name == n))
                .filter(|a| domain_id.as_ref().map_or(true, |d| &a.domain_id == d))
                .filter(|a| state.account_visible(&caller, a))
                .map(|a| state.account_json(a))
                .collect();
            envelope(&command, list("account", items))
        }
        "createAccount" => {
            if !admin {
                return api_error(&command, 432, "The given command does not exist or it is not available for user");
            }
            let (Some(domain_id), Some(username), Some(account_type)) =
                (param("domainid"), param("username"), param("accounttype"))
            else {
                return api_error(&command, 431, "missing parameter");
            };
            let account_type = account_type
                .parse::<u8>()
                .ok()
                .and_then(|t| AccountType::try_from(t).ok())
                .unwrap_or_default();
            let name = param("account").unwrap_or(username);
            let mut account = state.insert_account(&domain_id, &name, account_type, None);
            if let Some(email) = param("email") {
                for user in state
                    .accounts
                    .iter_mut()
                    .filter(|a| a.id == account.id)
                    .flat_map(|a| a.users.iter_mut())
                {
                    user.email = Some(email.clone());
                }
                account.users.iter_mut().for_each(|u| u.email = Some(email.clone()));
            }
            let body = json!({ "account": state.account_json(&account) });
            envelope(&command, body)
        }
        "deleteAccount" => {
            if !admin {
                return api_error(&command, 432, "The given command does not exist or it is not available for user");
            }
            let id = param("id").unwrap_or_default();
            let existed = state.accounts.iter().any(|a| a.id == id);
            state.accounts.retain(|a| a.id != id);
            let outcome = if existed {
                Ok(json!({ "success": true }))
            } else {
                Err(format!("Unable to find account by id {}", id))
            };
            let job_id = state.new_job(&command, outcome);
            envelope(&command, json!({ "jobid": job_id }))
        }
        "failingJob" => {
            let job_id = state.new_job(&command, Err("simulated failure".to_string()));
            envelope(&command, json!({ "jobid": job_id }))
        }
        "listUsers" => {
            let username = param("username");
            let account = param("account");
            let domain_id = param("domainid");
            let items = state
                .accounts
                .iter()
                .filter(|a| state.account_visible(&caller, a))
                .filter(|a| account.as_ref().map_or(true, |n| &a.name == n))
                .filter(|a| domain_id.as_ref().map_or(true, |d| &a.domain_id == d))
                .flat_map(|a| a.users.iter())
                .filter(|u| username.as_ref().map_or(true, |n| &u.username == n))
                .map(|u| state.user_json(u))
                .collect();
            envelope(&command, list("user", items))
        }
        "registerUserKeys" | "getUserKeys" => {
            if !admin {
                return api_error(&command, 432, "The given command does not exist or it is not available for user");
            }
            let id = param("id").unwrap_or_default();
            let register = command == "registerUserKeys";
            let fresh = if register {
                let n = state.next_id("key");
                Some(ApiKeyPair::new(format!("{}-api", n), format!("{}-secret", n)))
            } else {
                None
            };
            let user = state
                .accounts
                .iter_mut()
                .flat_map(|a| a.users.iter_mut())
                .find(|u| u.id == id);
            let Some(user) = user else {
                return api_error(&command, 431, "Unable to find user by id");
            };
            if let Some(keys) = fresh {
                user.apikey = Some(keys.apikey);
                user.secretkey = Some(keys.secretkey);
            }
            let body = json!({ "userkeys": { "apikey": user.apikey, "secretkey": user.secretkey } });
            envelope(&command, body)
        }
        "queryAsyncJobResult" => {
            let job_id = param("jobid").unwrap_or_default();
            let Some(job) = state.jobs.get_mut(&job_id) else {
                return api_error(&command, 530, "Unable to find job");
            };
            let body = if job.polls_left > 0 {
                job.polls_left -= 1;
                json!({ "jobid": job_id, "jobstatus": 0, "cmd": job.command })
            } else {
                match &job.outcome {
                    Ok(result) => json!({
                        "jobid": job_id,
                        "jobstatus": 1,
                        "jobresultcode": 0,
                        "jobresulttype": "object",
                        "jobresult": result,
                        "cmd": job.command,
                    }),
                    Err(text) => json!({
                        "jobid": job_id,
                        "jobstatus": 2,
                        "jobresultcode": 530,
                        "jobresulttype": "object",
                        "jobresult": { "errorcode": 530, "errortext": text },
                        "cmd": job.command,
                    }),
                }
            };
            envelope(&command, body)
        }
        _ => api_error(&command, 432, "The given command does not exist or it is not available for user"),
    }
}

/// Sync command that takes a while and records how many run at once
async fn slow_command(state: &Shared, params: &HashMap<String, String>) -> Response {
    let delay = params
        .get("ms")
        .and_then(|ms| ms.parse().ok())
        .unwrap_or(50);

    {
        let Ok(mut state) = state.lock() else {
            return api_error("slowCommand", 530, "state poisoned");
        };
        *state.calls.entry("slowCommand".to_string()).or_default() += 1;
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
    }

    tokio::time::sleep(Duration::from_millis(delay)).await;

    let Ok(mut state) = state.lock() else {
        return api_error("slowCommand", 530, "state poisoned");
    };
    state.in_flight -= 1;
    envelope("slowCommand", json!({ "success": true }))
}
