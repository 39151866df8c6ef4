use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::network::reconnect::ReconnectPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";

const API_BASE_URL_ENV: &str = "CHAT_API_BASE_URL";
const WS_URL_ENV: &str = "CHAT_WS_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub ws_url: String,
    /// Inbound messages addressed to the signed-in user.
    pub subscribe_destination: String,
    /// Where composed messages are published.
    pub send_destination: String,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout_ms: u64,
    pub storage_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api/v1".to_string(),
            ws_url: "ws://localhost:8080/ws".to_string(),
            subscribe_destination: "/user/queue/messages".to_string(),
            send_destination: "/app/chat.send".to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout_ms: 10_000,
            storage_path: "data/client.db".to_string(),
        }
    }
}

/// Loads the JSON config, falling back to defaults, then applies
/// environment overrides.
pub fn load_config(path: &str) -> AppConfig {
    let config = read_config_file(Path::new(path));
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn read_config_file(path: &Path) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

fn apply_overrides(mut config: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
    if let Some(url) = lookup(API_BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
        config.api_base_url = url;
    }
    if let Some(url) = lookup(WS_URL_ENV).filter(|url| !url.trim().is_empty()) {
        config.ws_url = url;
    }
    config
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::reconnect::Backoff;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = read_config_file(&dir.path().join("absent.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.reconnect.backoff,
            Backoff::Fixed { delay_ms: 3_000 }
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.json");
        fs::write(&path, r#"{"ws_url":"wss://shop.example.com/ws"}"#).unwrap();

        let config = read_config_file(&path);
        assert_eq!(config.ws_url, "wss://shop.example.com/ws");
        assert_eq!(config.send_destination, "/app/chat.send");
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.json");
        fs::write(&path, "{ nope").unwrap();
        assert_eq!(read_config_file(&path), AppConfig::default());
    }

    #[test]
    fn environment_overrides_urls() {
        let config = apply_overrides(AppConfig::default(), |key| match key {
            API_BASE_URL_ENV => Some("https://shop.example.com/api".into()),
            WS_URL_ENV => Some(" ".into()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://shop.example.com/api");
        assert_eq!(config.ws_url, AppConfig::default().ws_url);
    }

    #[test]
    fn saved_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("chat.json");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.connect_timeout_ms = 2_500;
        save_config(path, &config).unwrap();

        assert_eq!(read_config_file(Path::new(path)), config);
    }
}
