use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Typed configuration for one channel process.
///
/// Built once at startup and shared read-only (`Arc<Config>`) afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    // Channel identity
    pub channel_name: String,
    pub channel_secret: String,
    pub channel_endpoint: String,
    pub type_of_service: String,
    pub bind_addr: SocketAddr,

    // Storage / retention
    pub message_file: PathBuf,
    pub max_message_age_days: u32,
    pub welcome_message: String,

    // Hub
    pub hub_url: Option<String>,
    pub hub_secret: String,

    // External lookups
    pub lookup_timeout: Duration,
    pub geocoding_url: String,
    pub weather_url: String,

    // Profanity filter
    pub censor_words: Vec<String>,
}

impl Config {
    /// Config with every optional setting at its default.
    pub fn new(
        channel_name: impl Into<String>,
        channel_secret: impl Into<String>,
        message_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            channel_name: channel_name.into(),
            channel_secret: channel_secret.into(),
            channel_endpoint: "http://127.0.0.1:5001".to_string(),
            type_of_service: "aiweb24:chat".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5001)),
            message_file: message_file.into(),
            max_message_age_days: 7,
            welcome_message: "Hello to our server. Here we discuss...".to_string(),
            hub_url: Some("http://127.0.0.1:5555".to_string()),
            hub_secret: "1234567890".to_string(),
            lookup_timeout: Duration::from_secs(10),
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            censor_words: Vec::new(),
        }
    }

    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let channel_secret = env_str("CHANNEL_AUTHKEY").unwrap_or_default();
        if channel_secret.trim().is_empty() {
            return Err(Error::Config(
                "CHANNEL_AUTHKEY environment variable is required".to_string(),
            ));
        }

        let channel_name = env_str("CHANNEL_NAME")
            .and_then(non_empty)
            .unwrap_or("The One and Only Channel".to_string());
        let message_file = env_path("CHANNEL_FILE").unwrap_or_else(|| "messages.json".into());

        let mut cfg = Self::new(channel_name, channel_secret, message_file);

        if let Some(endpoint) = env_str("CHANNEL_ENDPOINT").and_then(non_empty) {
            cfg.channel_endpoint = endpoint;
        }
        if let Some(tag) = env_str("CHANNEL_TYPE_OF_SERVICE").and_then(non_empty) {
            cfg.type_of_service = tag;
        }
        if let Some(raw) = env_str("CHANNEL_BIND").and_then(non_empty) {
            cfg.bind_addr = raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("CHANNEL_BIND {raw:?}: {e}")))?;
        }

        if let Some(days) = env_u32("CHANNEL_MAX_MESSAGE_AGE") {
            cfg.max_message_age_days = days;
        }
        if let Some(text) = env_str("CHANNEL_WELCOME_MESSAGE").and_then(non_empty) {
            cfg.welcome_message = text;
        }

        // An explicitly empty HUB_URL disables registration.
        if let Some(hub) = env_str("HUB_URL") {
            cfg.hub_url = non_empty(hub.trim_end_matches('/').to_string());
        }
        if let Some(secret) = env_str("HUB_AUTHKEY") {
            cfg.hub_secret = secret;
        }

        if let Some(ms) = env_u64("LOOKUP_TIMEOUT_MS") {
            cfg.lookup_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(url) = env_str("GEOCODING_URL").and_then(non_empty) {
            cfg.geocoding_url = url;
        }
        if let Some(url) = env_str("WEATHER_URL").and_then(non_empty) {
            cfg.weather_url = url;
        }

        cfg.censor_words = parse_csv_lower(env_str("CENSOR_WORDS"));

        Ok(cfg)
    }

    /// Retention window as a chrono duration.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.max_message_age_days))
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
