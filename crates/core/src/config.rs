use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{Result, ScenesearchError};

/// Environment variable holding the translation service key.
pub const TRANSLATOR_KEY_ENV: &str = "TRANSLATOR_API_KEY";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub vector_index: String,
    pub visual_captioner: String,
    pub speech_captioner: String,
    pub audio_captioner: String,
    pub query_analyzer: String,
    pub scene_detector: String,
    pub translator: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            vector_index: "http://localhost:1234".to_string(),
            visual_captioner: "http://localhost:30742".to_string(),
            speech_captioner: "http://localhost:30076".to_string(),
            audio_captioner: "http://localhost:30077".to_string(),
            query_analyzer: "http://localhost:30896".to_string(),
            scene_detector: "http://localhost:30743".to_string(),
            translator: "https://api-free.deepl.com/v2/translate".to_string(),
        }
    }
}

/// Timeout and retry budget applied to every outbound collaborator call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpPolicy {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl HttpPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "EN".to_string(),
            target_lang: "KO".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:30936".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoints: Endpoints,
    pub http: HttpPolicy,
    /// SQLite file of the cast/crew store. Without it the metadata source
    /// always comes back empty.
    pub metadata_db: Option<PathBuf>,
    /// Directory holding `<video_id>.mp4` clips.
    pub clips_dir: PathBuf,
    pub translation: TranslationConfig,
    pub index_processed_segments: bool,
    pub server: ServerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            http: HttpPolicy::default(),
            metadata_db: None,
            clips_dir: PathBuf::from("/data/movie_clips"),
            translation: TranslationConfig::default(),
            index_processed_segments: true,
            server: ServerConfig::default(),
        }
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scenesearch").join("config.toml"))
}

impl EngineConfig {
    /// Load configuration: the explicit path if given, else the default
    /// location when it exists, else built-in defaults. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ScenesearchError::Config {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `SCENESEARCH_*` overrides through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let endpoints = &mut self.endpoints;
        let string_overrides: [(&str, &mut String); 8] = [
            ("SCENESEARCH_VECTOR_INDEX_URL", &mut endpoints.vector_index),
            ("SCENESEARCH_VISUAL_CAPTIONER_URL", &mut endpoints.visual_captioner),
            ("SCENESEARCH_SPEECH_CAPTIONER_URL", &mut endpoints.speech_captioner),
            ("SCENESEARCH_AUDIO_CAPTIONER_URL", &mut endpoints.audio_captioner),
            ("SCENESEARCH_QUERY_ANALYZER_URL", &mut endpoints.query_analyzer),
            ("SCENESEARCH_SCENE_DETECTOR_URL", &mut endpoints.scene_detector),
            ("SCENESEARCH_TRANSLATOR_URL", &mut endpoints.translator),
            ("SCENESEARCH_BIND", &mut self.server.bind),
        ];
        for (name, slot) in string_overrides {
            if let Some(value) = lookup(name) {
                *slot = value;
            }
        }

        if let Some(value) = lookup("SCENESEARCH_METADATA_DB") {
            self.metadata_db = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("SCENESEARCH_CLIPS_DIR") {
            self.clips_dir = PathBuf::from(value);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(ScenesearchError::Config {
                reason: "http.timeout_secs must be > 0".to_string(),
            });
        }
        let endpoints = [
            ("vector_index", &self.endpoints.vector_index),
            ("visual_captioner", &self.endpoints.visual_captioner),
            ("speech_captioner", &self.endpoints.speech_captioner),
            ("audio_captioner", &self.endpoints.audio_captioner),
            ("query_analyzer", &self.endpoints.query_analyzer),
            ("scene_detector", &self.endpoints.scene_detector),
            ("translator", &self.endpoints.translator),
        ];
        for (name, url) in endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ScenesearchError::Config {
                    reason: format!("endpoints.{name} must be an http(s) URL, got {url:?}"),
                });
            }
        }
        Ok(())
    }

    /// Translator key from the environment, if set.
    pub fn translator_api_key() -> Result<String> {
        std::env::var(TRANSLATOR_KEY_ENV).map_err(|_| ScenesearchError::MissingApiKey {
            env_var: TRANSLATOR_KEY_ENV.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_toml_keeps_defaults_for_the_rest() {
        let config = EngineConfig::from_toml(
            r#"
            metadata_db = "/srv/movies.db"
            index_processed_segments = false

            [endpoints]
            vector_index = "http://vectors:1234"

            [http]
            max_retries = 5
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.endpoints.vector_index, "http://vectors:1234");
        assert_eq!(config.endpoints.query_analyzer, Endpoints::default().query_analyzer);
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.metadata_db, Some(PathBuf::from("/srv/movies.db")));
        assert!(!config.index_processed_segments);
        assert_eq!(config.translation.target_lang, "KO");
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut config = EngineConfig::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("SCENESEARCH_SCENE_DETECTOR_URL", "http://scenes:9000"),
            ("SCENESEARCH_METADATA_DB", "/tmp/meta.db"),
            ("SCENESEARCH_BIND", "127.0.0.1:8080"),
        ]);

        config.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.endpoints.scene_detector, "http://scenes:9000");
        assert_eq!(config.metadata_db, Some(PathBuf::from("/tmp/meta.db")));
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.endpoints.vector_index, "http://localhost:1234");
    }

    #[test]
    fn validation_rejects_non_http_endpoints_and_zero_timeout() {
        let mut config = EngineConfig::default();
        config.endpoints.translator = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.http.timeout_secs = 0;
        assert!(config.validate().is_err());

        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = HttpPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(3), Duration::from_millis(750));
    }
}
