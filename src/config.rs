use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base origin of the mail provider's REST API.
    pub api_base: String,
    /// Deep link to the companion bot for identity handoff.
    pub bot_link: String,
    pub poll_interval_secs: u64,
    /// Service name for the keyring identity record.
    pub keyring_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://api.mail.tm".to_string(),
            bot_link: "https://t.me/tmpmailbot".to_string(),
            poll_interval_secs: 15,
            keyring_service: "tmpmail".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        use std::fs;
        if let Ok(content) = fs::read_to_string("settings.toml") {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
        }
        Self::default()
    }
}
