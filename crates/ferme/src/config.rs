use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,

    #[error("invalid reminders.daily_at '{0}' (expected HH:MM)")]
    InvalidTimeOfDay(String),
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        let config: Self = serde_saphyr::from_str(&expanded)?;
        config.reminders.fire_at()?;
        Ok(config)
    }

    /// Resolved paths for everything stored under the workspace.
    pub fn paths(&self, config_path: &Path) -> WorkspacePaths {
        let workspace_raw = self
            .workspace
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_WORKSPACE));
        let workspace = resolve_path(config_path, workspace_raw);

        let documents = self
            .storage
            .documents_path
            .as_ref()
            .map(|p| resolve_path(config_path, p))
            .unwrap_or_else(|| workspace.join(DEFAULT_DOCUMENTS_DIR));
        let blobs = self
            .storage
            .blobs_path
            .as_ref()
            .map(|p| resolve_path(config_path, p))
            .unwrap_or_else(|| workspace.join(DEFAULT_BLOBS_DIR));
        let permission_file = workspace.join(DEFAULT_PERMISSION_FILE);

        WorkspacePaths {
            workspace,
            documents,
            blobs,
            permission_file,
        }
    }
}

/// Filesystem locations derived from a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub workspace: PathBuf,
    pub documents: PathBuf,
    pub blobs: PathBuf,
    pub permission_file: PathBuf,
}

/// Resolve a path relative to the config file directory.
///
/// Absolute paths are returned as-is.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// Default Paths
// ============================================================================

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "ferme.yaml";
/// Default workspace directory (relative to config file).
pub const DEFAULT_WORKSPACE: &str = ".ferme";
/// Default documents directory (relative to workspace).
pub const DEFAULT_DOCUMENTS_DIR: &str = "documents";
/// Default blobs directory (relative to workspace).
pub const DEFAULT_BLOBS_DIR: &str = "blobs";
/// Notification permission state file (relative to workspace).
pub const DEFAULT_PERMISSION_FILE: &str = "notifications.yaml";

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_public_base_url() -> String {
    "/files".to_string()
}

fn default_daily_at() -> String {
    "10:00".to_string()
}

fn default_due_soon_days() -> u32 {
    3
}

/// Serde default for bool fields that should be `true` (serde's default is `false`).
fn default_true() -> bool {
    true
}

fn default_deliveries() -> Vec<DeliveryConfig> {
    vec![DeliveryConfig::Log]
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in the raw config text.
///
/// - `${VAR}` - required, errors if not set
/// - `${VAR:-default}` - falls back to `default` (may be empty)
/// - `$$` - literal `$`
///
/// No nested expansion. A plain `$` not followed by `{` is kept as-is.
///
/// ```yaml
/// server:
///   api_token: ${FERME_API_TOKEN:-}
/// notifications:
///   deliveries:
///     - type: webhook
///       url: ${FERME_WEBHOOK_URL}
/// ```
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                let reference = take_reference(&mut chars)?;
                result.push_str(&lookup_reference(&reference)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Consume everything up to the closing `}` of a `${...}` reference.
fn take_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut reference = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(reference);
        }
        reference.push(c);
    }
    Err(ConfigError::UnclosedVarReference)
}

/// Resolve `VAR` or `VAR:-default` against the process environment.
fn lookup_reference(reference: &str) -> Result<String, ConfigError> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Bearer token for `/api/v1`. Loopback-only when unset.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Bearer token for admin endpoints. Loopback-only when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_connections: default_max_connections(),
            api_token: None,
            admin_token: None,
        }
    }
}

// ============================================================================
// StorageConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub documents_path: Option<PathBuf>,
    #[serde(default)]
    pub blobs_path: Option<PathBuf>,
    /// Prefix for public blob URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_path: None,
            blobs_path: None,
            public_base_url: default_public_base_url(),
        }
    }
}

// ============================================================================
// ReminderConfig
// ============================================================================

/// Daily reminder settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local time of day of the daily reminder (`HH:MM`).
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
    /// Forward window, in days, within which a due date counts as upcoming.
    #[serde(default = "default_due_soon_days")]
    pub due_soon_days: u32,
}

impl ReminderConfig {
    /// Parse `daily_at`.
    pub fn fire_at(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.daily_at, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.daily_at, "%H:%M:%S"))
            .map_err(|_| ConfigError::InvalidTimeOfDay(self.daily_at.clone()))
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_at: default_daily_at(),
            due_soon_days: default_due_soon_days(),
        }
    }
}

// ============================================================================
// NotificationsConfig
// ============================================================================

/// Notification worker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// When false the platform is treated as unsupported.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_deliveries")]
    pub deliveries: Vec<DeliveryConfig>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deliveries: default_deliveries(),
        }
    }
}

/// A single notification delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeliveryConfig {
    /// Log to tracing.
    Log,
    /// POST the notification as JSON.
    Webhook { url: String },
    /// Desktop notification center.
    Desktop,
}

// ============================================================================
// Tests
// ============================================================================
