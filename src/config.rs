use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::constants::{directory, session};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub session: SessionConfig,

    pub auth: AuthConfig,

    pub directory: DirectoryConfig,

    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite database and other runtime state.
    pub data_dir: String,

    /// Empty means `<data_dir>/onessa.sqlite`. Relative paths resolve against `data_dir`.
    pub database_path: String,

    pub log_level: String,

    /// `text` or `json`
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            database_path: String::new(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,

    /// Frontend bundle served for every non-API path.
    pub static_dir: String,

    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            static_dir: "./static".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC key for session cookies. Change it in production.
    pub secret: String,

    pub secure_cookie: bool,

    pub ttl_hours: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: session::INSECURE_DEFAULT_SECRET.to_string(),
            secure_cookie: false,
            ttl_hours: session::DEFAULT_TTL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Logins allowed to sign in. Empty allows every directory user.
    pub allowed_logins: Vec<String>,

    /// When set, session-less writes to `/api/` must send it in `X-API-Token`.
    pub write_api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub url: String,

    pub base_dn: String,

    /// Service identity. Empty binds anonymously.
    pub bind_dn: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub bind_password: String,

    /// Attribute holding the login name.
    pub user_attribute: String,

    /// Empty uses the Active Directory default.
    pub users_filter: String,

    /// Empty falls back to `base_dn`.
    pub computers_base_dn: String,

    pub computers_filter: String,

    pub timeout_seconds: u64,

    pub page_size: i32,

    pub tls: DirectoryTlsConfig,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            user_attribute: directory::DEFAULT_USER_ATTRIBUTE.to_string(),
            users_filter: String::new(),
            computers_base_dn: String::new(),
            computers_filter: String::new(),
            timeout_seconds: 15,
            page_size: directory::DEFAULT_PAGE_SIZE,
            tls: DirectoryTlsConfig::default(),
        }
    }
}

impl DirectoryConfig {
    /// Authentication and sync only run when both endpoint and base DN are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.base_dn.trim().is_empty()
    }

    #[must_use]
    pub fn effective_users_filter(&self) -> &str {
        non_empty_or(&self.users_filter, directory::DEFAULT_USERS_FILTER)
    }

    #[must_use]
    pub fn effective_computers_filter(&self) -> &str {
        non_empty_or(&self.computers_filter, directory::DEFAULT_COMPUTERS_FILTER)
    }

    #[must_use]
    pub fn effective_computers_base_dn(&self) -> &str {
        non_empty_or(&self.computers_base_dn, self.base_dn.trim())
    }

    #[must_use]
    pub fn effective_user_attribute(&self) -> &str {
        non_empty_or(&self.user_attribute, directory::DEFAULT_USER_ATTRIBUTE)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { fallback } else { value }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryTlsConfig {
    /// PEM bundle trusted in addition to the system store.
    pub ca_file: Option<String>,

    /// Accept any server certificate. Only for lab setups.
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_seconds: u64,

    pub run_on_startup: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 24 * 60 * 60,
            run_on_startup: true,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;

        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("onessa").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".onessa").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Overrides file values with environment-style variables.
    ///
    /// `lookup` returns the raw value of a variable, if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = get("DATA_DIR") {
            self.general.data_dir = v;
        }
        if let Some(v) = get("DB_PATH") {
            self.general.database_path = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.general.log_format = v.to_lowercase();
        }
        if let Some(v) = get("HTTP_ADDR") {
            self.server.listen_addr = normalize_listen_addr(&v);
        }
        if let Some(v) = get("STATIC_DIR") {
            self.server.static_dir = v;
        }
        if let Some(v) = get("AUTH_USERS") {
            self.auth.allowed_logins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("WRITE_API_TOKEN") {
            self.auth.write_api_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Some(v) = get("SESSION_SECRET") {
            self.session.secret = v;
        }
        if let Some(v) = get("SESSION_COOKIE_SECURE") {
            self.session.secure_cookie = parse_bool("SESSION_COOKIE_SECURE", &v)?;
        }
        if let Some(v) = get("LDAP_URL") {
            self.directory.url = v;
        }
        if let Some(v) = get("LDAP_BASE_DN") {
            self.directory.base_dn = v;
        }
        if let Some(v) = get("LDAP_BIND_DN") {
            self.directory.bind_dn = v;
        }
        // Passwords are taken verbatim.
        if let Some(v) = lookup("LDAP_BIND_PASSWORD") {
            self.directory.bind_password = v;
        }
        if let Some(v) = get("LDAP_USER_ATTR") {
            self.directory.user_attribute = v;
        }
        if let Some(v) = get("LDAP_USERS_FILTER") {
            self.directory.users_filter = v;
        }
        if let Some(v) = get("LDAP_COMPUTERS_BASE_DN") {
            self.directory.computers_base_dn = v;
        }
        if let Some(v) = get("LDAP_COMPUTERS_FILTER") {
            self.directory.computers_filter = v;
        }
        if let Some(v) = get("LDAP_CA_FILE") {
            self.directory.tls.ca_file = Some(v).filter(|p| !p.is_empty());
        }
        if let Some(v) = get("LDAP_TLS_INSECURE_SKIP_VERIFY") {
            self.directory.tls.insecure_skip_verify =
                parse_bool("LDAP_TLS_INSECURE_SKIP_VERIFY", &v)?;
        }
        if let Some(v) = get("LDAP_SYNC_EVERY") {
            let every = parse_duration(&v)
                .with_context(|| format!("Invalid LDAP_SYNC_EVERY value: {v}"))?;
            self.sync.interval_seconds = every.as_secs();
        }
        if let Some(v) = get("LDAP_SYNC_ON_STARTUP") {
            self.sync.run_on_startup = parse_bool("LDAP_SYNC_ON_STARTUP", &v)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.interval_seconds == 0 {
            anyhow::bail!("Sync interval must be > 0");
        }

        if self.directory.page_size <= 0 {
            anyhow::bail!("Directory page size must be > 0");
        }

        if self.directory.is_configured() && self.directory.user_attribute.trim().is_empty() {
            anyhow::bail!("Directory user attribute cannot be empty when the directory is set");
        }

        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            anyhow::bail!(
                "Unknown log format '{}', expected 'text' or 'json'",
                self.general.log_format
            );
        }

        if self.session.ttl_hours == 0 {
            anyhow::bail!("Session TTL must be > 0");
        }

        Ok(())
    }

    /// `sqlite:` URL of the database file.
    #[must_use]
    pub fn database_url(&self) -> String {
        let configured = self.general.database_path.trim();
        if configured.starts_with("sqlite:") {
            return configured.to_string();
        }

        let data_dir = Path::new(&self.general.data_dir);
        let path = if configured.is_empty() {
            data_dir.join("onessa.sqlite")
        } else if Path::new(configured).is_absolute() {
            PathBuf::from(configured)
        } else {
            data_dir.join(configured)
        };

        format!("sqlite:{}", path.display())
    }

    #[must_use]
    pub fn uses_default_session_secret(&self) -> bool {
        self.session.secret == session::INSECURE_DEFAULT_SECRET
    }
}

/// `:8080` binds all interfaces.
fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("Invalid boolean for {key}: {other}"),
    }
}

/// Parses durations such as `24h`, `30m`, `90s` or `1h30m`.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("empty duration");
    }

    let mut total: u64 = 0;
    let mut digits = String::new();

    for ch in value.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let amount: u64 = digits
            .parse()
            .with_context(|| format!("missing number before '{ch}'"))?;
        digits.clear();

        let unit = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            other => anyhow::bail!("unknown duration unit '{other}'"),
        };
        total = total.saturating_add(amount.saturating_mul(unit));
    }

    if !digits.is_empty() {
        anyhow::bail!("missing unit after '{digits}'");
    }

    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.directory.user_attribute, "sAMAccountName");
        assert_eq!(config.sync.interval(), Duration::from_secs(86_400));
        assert!(config.sync.run_on_startup);
        assert!(!config.directory.tls.insecure_skip_verify);
        assert!(!config.directory.is_configured());
        assert!(config.uses_default_session_secret());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[directory]"));
        assert!(toml_str.contains("[sync]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [directory]
            url = "ldaps://dc01.corp.example"
            base_dn = "DC=corp,DC=example"

            [sync]
            interval_seconds = 1800
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.sync.interval(), Duration::from_secs(1800));
        assert!(config.directory.is_configured());
        assert_eq!(
            config.directory.effective_computers_base_dn(),
            "DC=corp,DC=example"
        );
        assert_eq!(config.directory.page_size, 500);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("HTTP_ADDR", ":9090"),
                ("AUTH_USERS", "CORP\\Alice, bob@corp.example,,"),
                ("LDAP_URL", "ldap://dc01"),
                ("LDAP_BASE_DN", "DC=corp"),
                ("LDAP_SYNC_EVERY", "1h30m"),
                ("LDAP_SYNC_ON_STARTUP", "false"),
                ("SESSION_COOKIE_SECURE", "1"),
                ("WRITE_API_TOKEN", ""),
                ("LDAP_BIND_PASSWORD", " spaced "),
            ]))
            .unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0:9090");
        assert_eq!(
            config.auth.allowed_logins,
            vec!["CORP\\Alice".to_string(), "bob@corp.example".to_string()]
        );
        assert!(config.directory.is_configured());
        assert_eq!(config.sync.interval(), Duration::from_secs(5400));
        assert!(!config.sync.run_on_startup);
        assert!(config.session.secure_cookie);
        assert_eq!(config.auth.write_api_token, None);
        assert_eq!(config.directory.bind_password, " spaced ");
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("LDAP_SYNC_EVERY", "soon")])).is_err());
        config.apply_env(env(&[("LDAP_SYNC_EVERY", "0s")])).unwrap();
        assert!(config.validate().is_err());
        assert!(config.apply_env(env(&[("SESSION_COOKIE_SECURE", "maybe")])).is_err());
    }

    #[test]
    fn test_sync_every_keeps_seconds() {
        let mut config = Config::default();
        config.apply_env(env(&[("LDAP_SYNC_EVERY", "90s")])).unwrap();
        assert_eq!(config.sync.interval(), Duration::from_secs(90));

        config.apply_env(env(&[("LDAP_SYNC_EVERY", "30s")])).unwrap();
        assert_eq!(config.sync.interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_duration("1h30m15s").unwrap(), Duration::from_secs(5_415));
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_database_url() {
        let mut config = Config::default();
        config.general.data_dir = "/var/lib/onessa".to_string();
        assert_eq!(config.database_url(), "sqlite:/var/lib/onessa/onessa.sqlite");

        config.general.database_path = "inventory.db".to_string();
        assert_eq!(config.database_url(), "sqlite:/var/lib/onessa/inventory.db");

        config.general.database_path = "sqlite::memory:".to_string();
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.general.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
