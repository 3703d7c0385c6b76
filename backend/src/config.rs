//! Process settings.
//!
//! Sources, lowest precedence first: built-in defaults, the optional file
//! named by `HUDDLE_CONFIG` (default `config/huddle`), then `HUDDLE_*`
//! environment variables with `__` between section and key, e.g.
//! `HUDDLE_AUTH__SECRET` or `HUDDLE_SESSION__USAGE_LIMIT`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::application::services::SessionPolicy;
use crate::infrastructure::driven::{classifier, realtime, rooms};

pub const DEFAULT_CONFIG_PATH: &str = "config/huddle";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub session: SessionSettings,
    pub reaper: ReaperSettings,
    pub classifier: ClassifierSettings,
    pub realtime: RealtimeSettings,
    pub rooms: RoomSettings,
    pub relay: RelaySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret. Required.
    #[serde(default)]
    pub secret: Option<String>,
    pub ai_capability_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub ttl_secs: i64,
    pub usage_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaperSettings {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    pub url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    pub pending_limit: usize,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HUDDLE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_sources(Some(&path), environment())
    }

    fn from_sources(path: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind", "0.0.0.0:8080")?
            .set_default("auth.ai_capability_ttl_secs", 600_i64)?
            .set_default("session.ttl_secs", 3600_i64)?
            .set_default("session.usage_limit", 20_i64)?
            .set_default("reaper.interval_secs", 30_i64)?
            .set_default("classifier.base_url", classifier::chat_completions::DEFAULT_BASE_URL)?
            .set_default("classifier.model", classifier::chat_completions::DEFAULT_MODEL)?
            .set_default("classifier.timeout_ms", 6000_i64)?
            .set_default("realtime.url", realtime::websocket_upstream::DEFAULT_URL)?
            .set_default("realtime.model", realtime::websocket_upstream::DEFAULT_MODEL)?
            .set_default("rooms.base_url", rooms::http_room_provider::DEFAULT_BASE_URL)?
            .set_default("relay.pending_limit", crate::application::relay::DEFAULT_PENDING_LIMIT as i64)?;
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings: Settings = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret().is_none() {
            return Err(ConfigError::Message("auth.secret must be set".to_string()));
        }
        if self.session.ttl_secs <= 0 || self.auth.ai_capability_ttl_secs <= 0 {
            return Err(ConfigError::Message("lifetimes must be positive".to_string()));
        }
        if self.session.usage_limit == 0 {
            return Err(ConfigError::Message("session.usage_limit must be positive".to_string()));
        }
        if self.reaper.interval_secs == 0 {
            return Err(ConfigError::Message("reaper.interval_secs must be positive".to_string()));
        }
        url::Url::parse(&self.realtime.url)
            .map_err(|e| ConfigError::Message(format!("realtime.url: {}", e)))?;
        Ok(())
    }

    pub fn secret(&self) -> Option<&str> {
        non_empty(&self.auth.secret)
    }

    pub fn classifier_key(&self) -> Option<&str> {
        non_empty(&self.classifier.api_key)
    }

    pub fn realtime_key(&self) -> Option<&str> {
        non_empty(&self.realtime.api_key)
    }

    pub fn rooms_key(&self) -> Option<&str> {
        non_empty(&self.rooms.api_key)
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            ttl: chrono::Duration::seconds(self.session.ttl_secs),
            usage_limit: self.session.usage_limit,
            ai_capability_ttl: chrono::Duration::seconds(self.auth.ai_capability_ttl_secs),
        }
    }

    pub fn reaper_period(&self) -> Duration {
        Duration::from_secs(self.reaper.interval_secs)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier.timeout_ms)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("HUDDLE").prefix_separator("_").separator("__")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
