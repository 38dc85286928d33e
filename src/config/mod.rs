//! Configuration system (layered: defaults < TOML file < environment).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{CodemindError, Result};
use crate::gateway::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::gateway::speech::{DEFAULT_TTS_MODEL, DEFAULT_VOICE};
use crate::gateway::{GeminiGateway, GeminiSpeech};
use crate::orchestrator::{ExhaustionPolicy, DEFAULT_MAX_ITERATIONS};
use crate::store::{
    ElasticConfig, ElasticSessionStore, FileSessionStore, MemorySessionStore, SessionStore,
    DEFAULT_INDEX,
};

const CONFIG_FILE: &str = "config.toml";

/// Which session store backend to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
    Elastic,
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElasticSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub index: String,
}

impl Default for ElasticSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            index: DEFAULT_INDEX.to_string(),
        }
    }
}

impl fmt::Debug for ElasticSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticSettings")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("index", &self.index)
            .finish()
    }
}

/// Layered configuration for codemind.
///
/// Resolution order, later wins:
/// 1. Built-in defaults
/// 2. `config.toml` in the data directory, or the file named by `CODEMIND_CONFIG`
/// 3. Environment variables (a `.env` file is loaded first when present)
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodemindConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub tts_model: String,
    pub voice: String,
    pub data_dir: PathBuf,
    pub max_iterations: usize,
    pub on_exhaustion: ExhaustionPolicy,
    /// Per tool call, in seconds. No limit when unset.
    pub tool_timeout_secs: Option<u64>,
    pub store: StoreBackend,
    pub elastic: ElasticSettings,
}

impl Default for CodemindConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            data_dir: default_data_dir(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            on_exhaustion: ExhaustionPolicy::default(),
            tool_timeout_secs: None,
            store: StoreBackend::default(),
            elastic: ElasticSettings::default(),
        }
    }
}

impl fmt::Debug for CodemindConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodemindConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("data_dir", &self.data_dir)
            .field("max_iterations", &self.max_iterations)
            .field("on_exhaustion", &self.on_exhaustion)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("store", &self.store)
            .field("elastic", &self.elastic)
            .finish_non_exhaustive()
    }
}

impl CodemindConfig {
    /// Load from `.env`, the config file, and the process environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`CodemindConfig::load`] with an explicit variable lookup.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = match lookup("CODEMIND_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => lookup("CODEMIND_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir)
                .join(CONFIG_FILE),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                Self::from_toml_str(&raw)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err.into()),
        };
        config.apply_env_from(lookup)?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| CodemindError::Configuration(format!("invalid config file: {e}")))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CodemindError::Configuration(e.to_string()))
    }

    /// Overlay environment variables onto this config.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = get("CODEMIND_MODEL") {
            self.model = model;
        }
        if let Some(dir) = get("CODEMIND_HOME") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("CODEMIND_MAX_ITERATIONS") {
            self.max_iterations = raw.trim().parse().map_err(|_| {
                CodemindError::Configuration(format!("CODEMIND_MAX_ITERATIONS must be a positive integer, got {raw:?}"))
            })?;
        }
        if let Some(raw) = get("CODEMIND_ON_EXHAUSTION") {
            self.on_exhaustion = raw.trim().parse().map_err(|_| {
                CodemindError::Configuration(format!("CODEMIND_ON_EXHAUSTION must be silent or notify, got {raw:?}"))
            })?;
        }
        if let Some(raw) = get("CODEMIND_STORE") {
            self.store = raw.trim().parse().map_err(|_| {
                CodemindError::Configuration(format!("CODEMIND_STORE must be file, memory or elastic, got {raw:?}"))
            })?;
        }
        if let Some(url) = get("ELASTIC_URL") {
            self.elastic.url = Some(url);
        }
        if let Some(key) = get("ELASTIC_API_KEY") {
            self.elastic.api_key = Some(key);
        }
        if let Some(index) = get("ELASTIC_INDEX") {
            self.elastic.index = index;
        }

        if self.max_iterations == 0 {
            return Err(CodemindError::Configuration("max_iterations must be at least 1".into()));
        }
        Ok(())
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            CodemindError::Configuration("no API key configured; set GOOGLE_API_KEY or GEMINI_API_KEY".into())
        })
    }

    pub fn gateway(&self) -> Result<GeminiGateway> {
        Ok(GeminiGateway::new(self.require_api_key()?, &self.model).with_base_url(&self.base_url))
    }

    pub fn speech(&self) -> Result<GeminiSpeech> {
        Ok(GeminiSpeech::new(self.require_api_key()?)
            .with_model(&self.tts_model)
            .with_voice(&self.voice)
            .with_base_url(&self.base_url))
    }

    /// Build the configured session store backend.
    pub fn session_store(&self) -> Result<Arc<dyn SessionStore>> {
        Ok(match self.store {
            StoreBackend::File => Arc::new(FileSessionStore::new(self.sessions_dir())),
            StoreBackend::Memory => Arc::new(MemorySessionStore::new()),
            StoreBackend::Elastic => {
                let url = self.elastic.url.as_deref().ok_or_else(|| {
                    CodemindError::Configuration("CODEMIND_STORE=elastic requires ELASTIC_URL".into())
                })?;
                let mut config = ElasticConfig::new(url).with_index(&self.elastic.index);
                if let Some(key) = &self.elastic.api_key {
                    config = config.with_api_key(key);
                }
                Arc::new(ElasticSessionStore::new(config))
            }
        })
    }
}

fn default_data_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".codemind"))
        .unwrap_or_else(|| PathBuf::from(".codemind"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_sensible() {
        let config = CodemindConfig::default();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.on_exhaustion, ExhaustionPolicy::Silent);
        assert_eq!(config.store, StoreBackend::File);
        assert_eq!(config.elastic.index, "codemind-chat-history");
    }

    #[test]
    fn google_key_wins_over_gemini_key() {
        let mut config = CodemindConfig::default();
        config
            .apply_env_from(env(&[("GOOGLE_API_KEY", "g"), ("GEMINI_API_KEY", "m")]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g"));
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let mut config = CodemindConfig::default();
        let err = config
            .apply_env_from(env(&[("CODEMIND_MAX_ITERATIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, CodemindError::Configuration(_)));

        let err = config
            .apply_env_from(env(&[("CODEMIND_MAX_ITERATIONS", "0")]))
            .unwrap_err();
        assert!(matches!(err, CodemindError::Configuration(_)));
    }

    #[test]
    fn elastic_backend_needs_a_url() {
        let config = CodemindConfig {
            store: StoreBackend::Elastic,
            ..Default::default()
        };
        assert!(config.session_store().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = CodemindConfig {
            api_key: Some("secret-key".into()),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
