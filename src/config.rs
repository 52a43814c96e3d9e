//! Runtime configuration.
//!
//! Built from defaults, then environment overrides, then CLI flags.
//! The API key comes from `SKYSNIFFER_API_KEY` or, failing that, the OS
//! keychain (service "skysniffer", account = profile id).

use crate::llm::profile::{clamp_wait, AnalysisProfile};
use crate::llm::prompts::DEFAULT_MODEL;
use crate::store::JsonFileStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "SKYSNIFFER_ENDPOINT";
pub const ENV_API_KEY: &str = "SKYSNIFFER_API_KEY";
pub const ENV_MODEL: &str = "SKYSNIFFER_MODEL";
pub const ENV_PROFILE: &str = "SKYSNIFFER_PROFILE";
pub const ENV_TIMEOUT: &str = "SKYSNIFFER_TIMEOUT_SECS";
pub const ENV_DATA_DIR: &str = "SKYSNIFFER_DATA_DIR";

const KEYRING_SERVICE: &str = "skysniffer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the chat-completions service (or its proxy).
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub profile: AnalysisProfile,
    /// Explicit wait bound in seconds; `None` uses the profile default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            profile: AnalysisProfile::default(),
            wait_secs: None,
            data_dir: None,
        }
    }
}

impl AppConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (env in production, a map in tests).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(profile) = get(ENV_PROFILE) {
            match profile.parse() {
                Ok(p) => self.profile = p,
                Err(e) => log::warn!("[CONFIG] {}; keeping {}", e, self.profile),
            }
        }
        if let Some(secs) = get(ENV_TIMEOUT) {
            match secs.trim().parse() {
                Ok(s) => self.wait_secs = Some(s),
                Err(_) => log::warn!("[CONFIG] Ignoring non-numeric {}={}", ENV_TIMEOUT, secs),
            }
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Effective wait bound, clamped to the supported 20–60s range.
    pub fn wait(&self) -> Duration {
        match self.wait_secs {
            Some(secs) => clamp_wait(Duration::from_secs(secs)),
            None => self.profile.default_wait(),
        }
    }

    pub fn store_root(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(JsonFileStore::default_root)
            .unwrap_or_else(|| PathBuf::from(".skysniffer"))
    }

    /// API key from config/env, else the OS keychain.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        match keyring::Entry::new(KEYRING_SERVICE, self.profile.id()) {
            Ok(entry) => match entry.get_password() {
                Ok(key) if !key.is_empty() => {
                    log::info!("[CONFIG] Loaded {} key from OS keychain", self.profile);
                    Some(key)
                }
                _ => None,
            },
            Err(_) => None,
        }
    }

    /// Store an API key in the OS keychain for the active profile.
    pub fn store_api_key(&self, key: &str) -> Result<(), String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, self.profile.id())
            .map_err(|e| format!("Keychain unavailable: {}", e))?;
        entry
            .set_password(key)
            .map_err(|e| format!("Failed to store key: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_use_profile_wait() {
        let config = AppConfig::default();
        assert_eq!(config.profile, AnalysisProfile::Contrail);
        assert_eq!(config.wait(), Duration::from_secs(30));
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn overrides_apply() {
        let config = AppConfig::default().with_overrides(lookup(&[
            (ENV_ENDPOINT, "https://api.aiproxy.com/abc/def"),
            (ENV_PROFILE, "chemtrail"),
            (ENV_TIMEOUT, "45"),
            (ENV_API_KEY, "v2|partial"),
        ]));
        assert_eq!(config.endpoint, "https://api.aiproxy.com/abc/def");
        assert_eq!(config.profile, AnalysisProfile::Chemtrail);
        assert_eq!(config.wait(), Duration::from_secs(45));
        assert_eq!(config.resolve_api_key().as_deref(), Some("v2|partial"));
    }

    #[test]
    fn bad_overrides_are_ignored() {
        let config = AppConfig::default().with_overrides(lookup(&[
            (ENV_PROFILE, "weather"),
            (ENV_TIMEOUT, "soon"),
            (ENV_MODEL, "   "),
        ]));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn wait_is_clamped() {
        let mut config = AppConfig::default();
        config.wait_secs = Some(1);
        assert_eq!(config.wait(), Duration::from_secs(20));
        config.wait_secs = Some(3600);
        assert_eq!(config.wait(), Duration::from_secs(60));
    }
}
