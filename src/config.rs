use crate::error::RandCapsError;
use randcaps_channels::message_stream::Credential;
use serde::Deserialize;
use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "RANDCAPS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "./randcaps.config.yaml";

fn default_homeserver_url() -> String {
    "https://matrix.org".into()
}
fn default_device_name() -> String {
    "randcaps-bot".into()
}
fn default_mongodb_uri() -> String {
    "mongodb://mongo:27017".into()
}
fn default_mongodb_db() -> String {
    "matrix_index".into()
}
fn default_events_collection() -> String {
    "events".into()
}
fn default_sample_size() -> u32 {
    50
}
fn default_sync_timeout_ms() -> u64 {
    30_000
}
fn default_blocklist() -> Vec<String> {
    vec![
        "@fish:cclub.cs.wmich.edu".into(),
        "@rustix:cclub.cs.wmich.edu".into(),
        "@gooey:cclub.cs.wmich.edu".into(),
    ]
}
fn default_data_dir() -> String {
    "./randcaps.data".into()
}

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_homeserver_url")]
    pub homeserver_url: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,
    #[serde(default = "default_events_collection")]
    pub events_collection: String,
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
    #[serde(default = "default_blocklist")]
    pub blocklist: Vec<String>,
    #[serde(default)]
    pub allowed_room_ids: Vec<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            homeserver_url: default_homeserver_url(),
            user_id: String::new(),
            access_token: None,
            password: None,
            device_name: default_device_name(),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            events_collection: default_events_collection(),
            sample_size: default_sample_size(),
            sync_timeout_ms: default_sync_timeout_ms(),
            blocklist: default_blocklist(),
            allowed_room_ids: Vec::new(),
            data_dir: default_data_dir(),
            log_dir: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("homeserver_url", &self.homeserver_url)
            .field("user_id", &self.user_id)
            .field("access_token", &redact(&self.access_token))
            .field("password", &redact(&self.password))
            .field("device_name", &self.device_name)
            .field("mongodb_uri", &self.mongodb_uri)
            .field("mongodb_db", &self.mongodb_db)
            .field("events_collection", &self.events_collection)
            .field("sample_size", &self.sample_size)
            .field("sync_timeout_ms", &self.sync_timeout_ms)
            .field("blocklist", &self.blocklist)
            .field("allowed_room_ids", &self.allowed_room_ids)
            .field("data_dir", &self.data_dir)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(false) {
        *value = None;
    }
}

impl Config {
    pub fn resolve_config_path() -> Result<Option<PathBuf>, RandCapsError> {
        if let Ok(custom) = std::env::var(CONFIG_PATH_ENV) {
            if std::path::Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(RandCapsError::Config(format!(
                "{CONFIG_PATH_ENV} points to non-existent file: {custom}"
            )));
        }

        if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Ok(Some(PathBuf::from(DEFAULT_CONFIG_FILE)));
        }
        Ok(None)
    }

    /// Load the optional YAML file, overlay process environment, validate.
    pub fn load() -> Result<Self, RandCapsError> {
        let mut config = match Self::resolve_config_path()? {
            Some(path) => {
                let path_str = path.to_string_lossy().to_string();
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    RandCapsError::Config(format!("Failed to read {path_str}: {e}"))
                })?;
                Self::from_yaml(&content)
                    .map_err(|e| RandCapsError::Config(format!("Failed to parse {path_str}: {e}")))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.post_deserialize()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MATRIX_HOMESERVER") {
            self.homeserver_url = v;
        }
        if let Some(v) = lookup("MATRIX_USER_ID") {
            self.user_id = v;
        }
        if let Some(v) = lookup("MATRIX_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = lookup("MATRIX_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = lookup("MONGODB_URI") {
            self.mongodb_uri = v;
        }
        if let Some(v) = lookup("MONGODB_DB") {
            self.mongodb_db = v;
        }
        if let Some(v) = lookup("RANDCAPS_DATA_DIR") {
            self.data_dir = v;
        }
        if let Some(v) = lookup("RANDCAPS_LOG_DIR") {
            self.log_dir = Some(v);
        }
    }

    /// Apply post-deserialization normalization and validation.
    pub fn post_deserialize(&mut self) -> Result<(), RandCapsError> {
        self.homeserver_url = self.homeserver_url.trim().trim_end_matches('/').to_string();
        if self.homeserver_url.is_empty() {
            self.homeserver_url = default_homeserver_url();
        }
        self.user_id = self.user_id.trim().to_string();
        blank_to_none(&mut self.access_token);
        blank_to_none(&mut self.password);
        blank_to_none(&mut self.log_dir);

        if self.mongodb_uri.trim().is_empty() {
            self.mongodb_uri = default_mongodb_uri();
        }
        if self.mongodb_db.trim().is_empty() {
            self.mongodb_db = default_mongodb_db();
        }
        if self.device_name.trim().is_empty() {
            self.device_name = default_device_name();
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        if self.sample_size == 0 {
            self.sample_size = default_sample_size();
        }
        if self.sync_timeout_ms == 0 {
            self.sync_timeout_ms = default_sync_timeout_ms();
        }
        self.blocklist = self
            .blocklist
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self.allowed_room_ids = self
            .allowed_room_ids
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if self.events_collection.trim().is_empty() {
            return Err(RandCapsError::Config(
                "events_collection must not be empty".into(),
            ));
        }
        if self.user_id.is_empty() {
            return Err(RandCapsError::Config("MATRIX_USER_ID is required".into()));
        }
        if self.credential().is_none() {
            return Err(RandCapsError::Config(
                "MATRIX_PASSWORD or MATRIX_ACCESS_TOKEN required".into(),
            ));
        }

        Ok(())
    }

    pub fn credential(&self) -> Option<Credential> {
        Credential::resolve(
            &self.user_id,
            self.access_token.as_deref(),
            self.password.as_deref(),
        )
    }

    /// Configured blocklist plus the bot's own account.
    pub fn blocklist_with_self(&self) -> Vec<String> {
        let mut list = self.blocklist.clone();
        if !self.user_id.is_empty() && !list.iter().any(|s| s == &self.user_id) {
            list.push(self.user_id.clone());
        }
        list
    }

    /// Human-readable settings with secrets masked.
    pub fn redacted_summary(&self) -> String {
        let credential = self
            .credential()
            .map(|c| c.kind())
            .unwrap_or("none");
        [
            format!("homeserver_url: {}", self.homeserver_url),
            format!("user_id: {}", self.user_id),
            format!("credential: {credential}"),
            format!("mongodb_db: {}", self.mongodb_db),
            format!("events_collection: {}", self.events_collection),
            format!("sample_size: {}", self.sample_size),
            format!("sync_timeout_ms: {}", self.sync_timeout_ms),
            format!("blocklist: {}", self.blocklist_with_self().join(", ")),
            format!("data_dir: {}", self.data_dir),
        ]
        .join("\n")
    }
}
