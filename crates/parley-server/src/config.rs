//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persisted-document and reference-data paths.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session memory settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Completion backend settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Local STT/TTS engine settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Telephony provider settings.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Paths for the persisted JSON documents and the reference text.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_customers_path")]
    pub customers_path: String,

    #[serde(default = "default_calls_path")]
    pub calls_path: String,

    /// Static business reference text loaded once at startup.
    #[serde(default = "default_reference_path")]
    pub reference_path: String,
}

/// Session memory tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Seconds since session start after which history is discarded.
    #[serde(default = "default_session_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum stored turns per session.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Idle seconds after which the background reaper evicts a session.
    /// 0 disables reaping.
    #[serde(default = "default_reap_idle_secs")]
    pub reap_idle_secs: u64,
}

/// Completion backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

/// Local speech engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_stt_binary")]
    pub stt_binary_path: String,

    #[serde(default)]
    pub stt_model_path: String,

    #[serde(default = "default_tts_binary")]
    pub tts_binary_path: String,

    #[serde(default)]
    pub tts_model_path: String,

    #[serde(default = "default_tts_speed")]
    pub tts_speed: f32,
}

/// Telephony provider settings. Empty `api_url` disables outbound calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelephonyConfig {
    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub account_sid: String,

    #[serde(default)]
    pub auth_token: String,

    #[serde(default)]
    pub from_number: String,

    /// Publicly reachable URL the provider POSTs webhooks to.
    #[serde(default)]
    pub webhook_url: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "parley_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_customers_path() -> String {
    "customers.json".to_string()
}

fn default_calls_path() -> String {
    "calls.json".to_string()
}

fn default_reference_path() -> String {
    "reference.txt".to_string()
}

fn default_session_timeout_secs() -> u64 {
    300
}

fn default_max_turns() -> usize {
    20
}

fn default_reap_idle_secs() -> u64 {
    900
}

fn default_completion_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_completion_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_completion_timeout_secs() -> u64 {
    30
}

fn default_stt_binary() -> String {
    "whisper".to_string()
}

fn default_tts_binary() -> String {
    "piper".to_string()
}

fn default_tts_speed() -> f32 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            customers_path: default_customers_path(),
            calls_path: default_calls_path(),
            reference_path: default_reference_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout_secs(),
            max_turns: default_max_turns(),
            reap_idle_secs: default_reap_idle_secs(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            api_key: String::new(),
            model: default_completion_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_binary_path: default_stt_binary(),
            stt_model_path: String::new(),
            tts_binary_path: default_tts_binary(),
            tts_model_path: String::new(),
            tts_speed: default_tts_speed(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PARLEY_HOST` overrides `server.host`
/// - `PARLEY_PORT` overrides `server.port`
/// - `PARLEY_COMPLETION_API_KEY` overrides `completion.api_key`
/// - `PARLEY_LOG_LEVEL` overrides `logging.level`
/// - `PARLEY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("PARLEY_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("PARLEY_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(key) = std::env::var("PARLEY_COMPLETION_API_KEY") {
        config.completion.api_key = key;
    }
    if let Ok(level) = std::env::var("PARLEY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("PARLEY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
