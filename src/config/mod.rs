// backup-dav/src/config/mod.rs
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_REMOTE_PATH: &str = "/backup";
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 6 * 60 * 60;
const DEFAULT_MYSQL_PORT: u16 = 3306;
const DEFAULT_MONGO_PORT: u16 = 27017;
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_MONGO_AUTH_DB: &str = "admin";

/// Named WebDAV providers and their endpoints. Any other provider value is
/// taken as a base URL.
const PROVIDERS: &[(&str, &str)] = &[
    ("yandex", "https://webdav.yandex.ru"),
    ("mailru", "https://webdav.cloud.mail.ru"),
    ("box", "https://dav.box.com/dav"),
    ("4shared", "https://webdav.4shared.com"),
];

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRemoteConfig {
    pub provider: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub path: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonDatabaseConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub auth_database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub name: Option<String>,
    pub days_to_keep: Option<i64>,
    pub retries: Option<u32>,
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    #[serde(default)]
    pub exclude: Vec<PathBuf>,
    pub remote: Option<JsonRemoteConfig>,
    pub mysql: Option<JsonDatabaseConfig>,
    pub mongo: Option<JsonDatabaseConfig>,
}

// Application's internal configuration structs
#[derive(Clone)]
pub struct RemoteConfig {
    pub endpoint_url: String,
    pub login: String,
    pub password: String,
    /// Normalised remote directory, leading `/` and no trailing `/`.
    pub path: String,
    pub upload_timeout: Duration,
}

#[derive(Clone)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Clone)]
pub struct MongoConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub auth_database: String,
}

/// Fully resolved, immutable run configuration.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub name: String,
    /// `None` keeps backups forever.
    pub days_to_keep: Option<i64>,
    pub retries: u32,
    pub directories: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
    pub remote: RemoteConfig,
    pub mysql: Option<MysqlConfig>,
    pub mongo: Option<MongoConfig>,
}

impl BackupConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        let raw_json_config = apply_env_overrides(raw_json_config, |key| std::env::var(key).ok());
        Self::from_raw(raw_json_config)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let name = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context("name must be set in config.json")?
            .to_string();
        let name_pattern = Regex::new(r"^[A-Za-z0-9]+$")?;
        if !name_pattern.is_match(&name) {
            anyhow::bail!("name must be alphanumeric, got '{}'", name);
        }

        let remote = load_remote_config(raw.remote.as_ref().context("remote must be set in config.json")?)?;

        let mysql = raw
            .mysql
            .as_ref()
            .map(|db| -> Result<MysqlConfig> {
                Ok(MysqlConfig {
                    host: db.host.clone().unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
                    port: db.port.unwrap_or(DEFAULT_MYSQL_PORT),
                    user: required(&db.user, "mysql.user")?,
                    password: db.password.clone().unwrap_or_default(),
                    database: required(&db.database, "mysql.database")?,
                })
            })
            .transpose()?;

        let mongo = raw
            .mongo
            .as_ref()
            .map(|db| -> Result<MongoConfig> {
                Ok(MongoConfig {
                    host: db.host.clone().unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
                    port: db.port.unwrap_or(DEFAULT_MONGO_PORT),
                    user: required(&db.user, "mongo.user")?,
                    password: db.password.clone().unwrap_or_default(),
                    database: required(&db.database, "mongo.database")?,
                    auth_database: db
                        .auth_database
                        .clone()
                        .unwrap_or_else(|| DEFAULT_MONGO_AUTH_DB.to_string()),
                })
            })
            .transpose()?;

        Ok(BackupConfig {
            name,
            days_to_keep: raw.days_to_keep,
            retries: raw.retries.unwrap_or(DEFAULT_RETRIES),
            directories: raw.directories,
            exclude: raw.exclude,
            remote,
            mysql,
            mongo,
        })
    }

    /// True when at least one directory or database is configured.
    pub fn has_targets(&self) -> bool {
        !self.directories.is_empty() || self.mysql.is_some() || self.mongo.is_some()
    }
}

fn load_remote_config(raw: &JsonRemoteConfig) -> Result<RemoteConfig> {
    let provider = required(&raw.provider, "remote.provider")?;
    Ok(RemoteConfig {
        endpoint_url: resolve_endpoint(&provider)?,
        login: required(&raw.login, "remote.login")?,
        password: required(&raw.password, "remote.password")?,
        path: normalize_remote_path(raw.path.as_deref().unwrap_or(DEFAULT_REMOTE_PATH)),
        upload_timeout: Duration::from_secs(raw.timeout_secs.unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS)),
    })
}

fn required(value: &Option<String>, field: &str) -> Result<String> {
    value
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .with_context(|| format!("{} must be set in config.json", field))
}

/// Maps a provider name to its WebDAV endpoint, or validates a verbatim URL.
pub fn resolve_endpoint(provider: &str) -> Result<String> {
    let key = provider.trim().to_ascii_lowercase();
    if let Some((_, url)) = PROVIDERS.iter().find(|(name, _)| *name == key) {
        return Ok((*url).to_string());
    }

    let url = Url::parse(provider.trim())
        .with_context(|| format!("remote.provider '{}' is neither a known provider nor a URL", provider))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("remote.provider URL must use http:// or https://, got {}", url.scheme());
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// `backup//nightly/` -> `/backup/nightly`; empty input is the root `/`.
pub fn normalize_remote_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Secrets may come from the environment (or `.env`) instead of the file.
fn apply_env_overrides(mut raw: RawJsonConfig, lookup: impl Fn(&str) -> Option<String>) -> RawJsonConfig {
    if let Some(login) = lookup("BACKUP_REMOTE_LOGIN") {
        raw.remote.get_or_insert_with(Default::default).login = Some(login);
    }
    if let Some(password) = lookup("BACKUP_REMOTE_PASSWORD") {
        raw.remote.get_or_insert_with(Default::default).password = Some(password);
    }
    if let (Some(password), Some(mysql)) = (lookup("BACKUP_MYSQL_PASSWORD"), raw.mysql.as_mut()) {
        mysql.password = Some(password);
    }
    if let (Some(password), Some(mongo)) = (lookup("BACKUP_MONGO_PASSWORD"), raw.mongo.as_mut()) {
        mongo.password = Some(password);
    }
    raw
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("login", &self.login)
            .field("password", &"***")
            .field("path", &self.path)
            .field("upload_timeout", &self.upload_timeout)
            .finish()
    }
}

impl fmt::Debug for MysqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("auth_database", &self.auth_database)
            .finish()
    }
}
