use crate::connection::{ShipSize, SystemId};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const PLACEHOLDER_BOT_TOKEN: &str = "YOUR_DISCORD_BOT_TOKEN_HERE";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Discord {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub channel_id: u64,
    #[serde(default = "default_true")]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mention_role_id: Option<u64>,
    /// Log alerts instead of posting them
    #[serde(default = "default_false")]
    pub dry_run: bool,
}

impl Default for Discord {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: 0,
            mention_everyone: default_true(),
            mention_role_id: None,
            dry_run: default_false(),
        }
    }
}

impl Discord {
    /// Role mention wins over `@everyone`; `None` when neither is enabled.
    pub fn mention(&self) -> Option<String> {
        match self.mention_role_id {
            Some(role_id) if role_id != 0 => Some(format!("<@&{}>", role_id)),
            _ if self.mention_everyone => Some("@everyone".to_string()),
            _ => None,
        }
    }
}

fn default_false() -> bool {
    false
}
fn default_true() -> bool {
    true
}

/// A system routes start from.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct OriginSystem {
    pub name: String,
    pub system_id: SystemId,
}

/// A system routes should reach, with the jump budget that makes a route worth announcing.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DestinationSystem {
    pub name: String,
    pub system_id: SystemId,
    pub max_jumps: u32,
    /// Wormholes smaller than this are ignored for this destination
    #[serde(default)]
    pub min_ship_size: Option<ShipSize>,
}

/// Pre-multi-origin layout: a single `[hq_system]` table.
#[derive(Debug, Deserialize, Clone)]
pub struct LegacyHqSystem {
    pub name: String,
    pub id: SystemId,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Polling {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

fn default_interval_seconds() -> u64 {
    300
}
fn default_cooldown_seconds() -> u64 {
    3600
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

/// Route flag passed to the routing service.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutePreference {
    #[default]
    Shortest,
    Secure,
    Insecure,
}

impl RoutePreference {
    pub fn as_flag(&self) -> &'static str {
        match self {
            RoutePreference::Shortest => "shortest",
            RoutePreference::Secure => "secure",
            RoutePreference::Insecure => "insecure",
        }
    }
}

impl std::fmt::Display for RoutePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_flag())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Route {
    #[serde(default)]
    pub preference: RoutePreference,
    #[serde(default = "default_route_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: u32,
}

fn default_route_cache_ttl_seconds() -> u64 {
    1800 // 30 minutes
}
fn default_max_concurrent_lookups() -> usize {
    8
}
fn default_max_requests_per_second() -> u32 {
    20
}

impl Default for Route {
    fn default() -> Self {
        Self {
            preference: RoutePreference::default(),
            cache_ttl_seconds: default_route_cache_ttl_seconds(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            max_requests_per_second: default_max_requests_per_second(),
        }
    }
}

/// The hub every monitored connection touches.
#[derive(Debug, Deserialize, Clone)]
pub struct Anchor {
    #[serde(default = "default_anchor_system_id")]
    pub system_id: SystemId,
    #[serde(default = "default_anchor_system_name")]
    pub system_name: String,
}

fn default_anchor_system_id() -> SystemId {
    31000005 // Thera
}
fn default_anchor_system_name() -> String {
    "Thera".to_string()
}

impl Default for Anchor {
    fn default() -> Self {
        Self {
            system_id: default_anchor_system_id(),
            system_name: default_anchor_system_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Api {
    #[serde(default = "default_signatures_url")]
    pub signatures_url: String,
    #[serde(default = "default_esi_base_url")]
    pub esi_base_url: String,
    #[serde(default = "default_discord_api_url")]
    pub discord_api_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_signatures_url() -> String {
    "https://api.eve-scout.com/v2/public/signatures".to_string()
}
fn default_esi_base_url() -> String {
    "https://esi.evetech.net/latest".to_string()
}
fn default_discord_api_url() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_user_agent() -> String {
    concat!("thera-route-watch/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for Api {
    fn default() -> Self {
        Self {
            signatures_url: default_signatures_url(),
            esi_base_url: default_esi_base_url(),
            discord_api_url: default_discord_api_url(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[default]
    #[serde(rename = "pretty")]
    Pretty,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also append log lines to this file
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            enabled: default_false(),
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub discord: Discord,
    #[serde(default)]
    pub departure_systems: Vec<OriginSystem>,
    #[serde(default)]
    pub hq_system: Option<LegacyHqSystem>,
    #[serde(default)]
    pub destinations: Vec<DestinationSystem>,
    #[serde(default)]
    pub polling: Polling,
    #[serde(default)]
    pub route: Route,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub metrics: Metrics,
}

impl Settings {
    /// Loads `Config.toml` from the working directory plus `THERA_*` overrides.
    pub fn new() -> Result<Self, SettingsError> {
        Self::from_path("Config.toml")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let s = Config::builder()
            .add_source(File::from(path))
            .add_source(env_overrides())
            .build()?;
        Self::finish(s.try_deserialize()?)
    }

    /// Parses settings from TOML text; environment overrides still apply.
    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        let s = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .add_source(env_overrides())
            .build()?;
        Self::finish(s.try_deserialize()?)
    }

    fn finish(mut settings: Self) -> Result<Self, SettingsError> {
        if settings.departure_systems.is_empty() {
            if let Some(hq) = settings.hq_system.take() {
                settings.departure_systems.push(OriginSystem {
                    name: hq.name,
                    system_id: hq.id,
                });
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.departure_systems.is_empty() {
            return Err(SettingsError::Invalid(
                "missing departure_systems (or legacy hq_system)".to_string(),
            ));
        }
        for (i, dep) in self.departure_systems.iter().enumerate() {
            if dep.name.trim().is_empty() {
                return Err(SettingsError::Invalid(format!(
                    "departure_systems[{}] has an empty name",
                    i
                )));
            }
        }
        for (i, dest) in self.destinations.iter().enumerate() {
            if dest.name.trim().is_empty() {
                return Err(SettingsError::Invalid(format!(
                    "destinations[{}] has an empty name",
                    i
                )));
            }
        }
        if self.polling.interval_seconds == 0 {
            return Err(SettingsError::Invalid(
                "polling.interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.route.max_concurrent_lookups == 0 || self.route.max_requests_per_second == 0 {
            return Err(SettingsError::Invalid(
                "route.max_concurrent_lookups and route.max_requests_per_second must be non-zero"
                    .to_string(),
            ));
        }
        for (label, raw) in [
            ("api.signatures_url", &self.api.signatures_url),
            ("api.esi_base_url", &self.api.esi_base_url),
            ("api.discord_api_url", &self.api.discord_api_url),
        ] {
            url::Url::parse(raw)
                .map_err(|e| SettingsError::Invalid(format!("{} is not a valid URL: {}", label, e)))?;
        }
        if !self.discord.dry_run {
            let token = self.discord.bot_token.trim();
            if token.is_empty() || token == PLACEHOLDER_BOT_TOKEN {
                return Err(SettingsError::Invalid(
                    "discord.bot_token is not configured".to_string(),
                ));
            }
            if self.discord.channel_id == 0 {
                return Err(SettingsError::Invalid(
                    "discord.channel_id is not configured".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// `THERA_DISCORD__BOT_TOKEN=...` overrides `discord.bot_token`.
fn env_overrides() -> Environment {
    Environment::with_prefix("THERA")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
