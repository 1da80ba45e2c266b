use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::model::{Account, AccountId, Credentials, ServiceKind, DEFAULT_BATCH_WINDOW_MINUTES};

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub personas: Vec<PersonaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u8,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

/// Base URLs of the service APIs. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_twitter")]
    pub twitter: Url,
    #[serde(default = "default_delicious")]
    pub delicious: Url,
    #[serde(default = "default_flickr")]
    pub flickr: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub service: String,
    #[serde(default)]
    pub username: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub batching: bool,
    #[serde(default = "default_batch_window")]
    pub batch_window_minutes: i64,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u8 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_batch_window() -> i64 {
    DEFAULT_BATCH_WINDOW_MINUTES
}

fn default_twitter() -> Url {
    Url::parse("https://api.twitter.com/").expect("static url")
}

fn default_delicious() -> Url {
    Url::parse("http://feeds.delicious.com/").expect("static url")
}

fn default_flickr() -> Url {
    Url::parse("https://api.flickr.com/services/rest/").expect("static url")
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            twitter: default_twitter(),
            delicious: default_delicious(),
            flickr: default_flickr(),
        }
    }
}

impl FetchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl AccountConfig {
    pub fn to_account(&self, persona: &str) -> Result<Account, ConfigError> {
        let service: ServiceKind = self.service.parse()?;
        let mut account = Account::new(service, self.username.clone());
        if let Some(id) = self.id.as_ref().filter(|id| !id.trim().is_empty()) {
            account.id = AccountId::new(id.clone());
        }
        account.persona = persona.to_owned();
        account.credentials = self.credentials.clone();
        account.active = self.active;
        account.batching = self.batching;
        account.batch_window = chrono::Duration::try_minutes(self.batch_window_minutes.max(0))
            .ok_or(ConfigError::InvalidBatchWindow(self.batch_window_minutes))?;
        Ok(account)
    }
}

impl AppConfig {
    /// Default configuration root, e.g. `~/.config/lifestream` on Linux.
    pub fn default_root() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("lifestream"))
    }

    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_from_file(dir.as_ref().join(CONFIG_FILE_NAME))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_content = std::fs::read_to_string(path)?;
        Self::from_json(&config_content)
    }

    /// Parse and validate. Unknown services and duplicate accounts are rejected here,
    /// before anything is fetched.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(content)?;
        config.accounts()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let config_json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, config_json)?;
        Ok(())
    }

    /// Every configured account, in persona order.
    pub fn accounts(&self) -> Result<Vec<Account>, ConfigError> {
        let mut seen = HashSet::new();
        let mut accounts = Vec::new();
        for persona in &self.personas {
            for account in &persona.accounts {
                let account = account.to_account(&persona.name)?;
                if !seen.insert(account.id.clone()) {
                    return Err(ConfigError::DuplicateAccount(account.id.0));
                }
                accounts.push(account);
            }
        }
        Ok(accounts)
    }
}
