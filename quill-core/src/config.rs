use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to expand environment in `{field}`: {source}")]
    EnvVar {
        field: &'static str,
        #[source]
        source: shellexpand::LookupError<std::env::VarError>,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the retrieval engine.
///
/// Provider credentials and tuning knobs live here; the engine itself owns no
/// persistent state, so nothing in this file points at a storage location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rag: RagConfig,
}

/// Configuration for the embedding provider.
///
/// `provider` is kept as a plain string so an unknown name survives parsing
/// and is rejected by the provider factory at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `local`, `openai` or `azure`
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name. For the local provider `local-<dim>` selects the dimension.
    #[serde(default)]
    pub model: String,
    /// Request timeout for remote providers, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Configuration for the retrieval façade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Physical collection names are `<prefix>_<context type>`
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    /// Chapters longer than this many characters are embedded as an excerpt
    #[serde(default = "default_chapter_excerpt_chars")]
    pub chapter_excerpt_chars: usize,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    #[serde(default = "default_character_threshold")]
    pub character_threshold: f32,
    /// Upper bound on documents fetched by project-wide scans
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_collection_prefix() -> String {
    "novel".to_string()
}

fn default_chapter_excerpt_chars() -> usize {
    2000
}

fn default_relevance_threshold() -> f32 {
    0.7
}

fn default_character_threshold() -> f32 {
    0.6
}

fn default_scan_limit() -> usize {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            api_key: String::new(),
            base_url: default_base_url(),
            model: "local-768".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection_prefix: default_collection_prefix(),
            chapter_excerpt_chars: default_chapter_excerpt_chars(),
            relevance_threshold: default_relevance_threshold(),
            character_threshold: default_character_threshold(),
            scan_limit: default_scan_limit(),
        }
    }
}

impl EmbeddingConfig {
    /// Expands `${VAR}` and `$VAR` references in the credential fields.
    pub fn expand_env(&mut self) -> Result<()> {
        self.api_key = expand("api_key", &self.api_key)?;
        self.base_url = expand("base_url", &self.base_url)?;
        Ok(())
    }
}

fn expand(field: &'static str, value: &str) -> Result<String> {
    shellexpand::env(value)
        .map(|expanded| expanded.into_owned())
        .map_err(|source| ConfigError::EnvVar { field, source })
}

impl Config {
    /// Load configuration from a YAML file, expanding environment references.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text, expanding environment references.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(contents)?;
        config.embedding.expand_env()?;
        Ok(config)
    }

    /// Load configuration from `quill.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Result<Self> {
        Self::load_or_default_from("quill.yaml")
    }

    /// Load configuration from `path`, using defaults only when the file is
    /// absent. Unreadable, malformed or unexpandable files are errors.
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(ConfigError::FileRead(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedding_config_defaults() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "local");
        assert_eq!(config.model, "local-768");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_rag_config_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.collection_prefix, "novel");
        assert_eq!(config.chapter_excerpt_chars, 2000);
        assert_eq!(config.relevance_threshold, 0.7);
        assert_eq!(config.character_threshold, 0.6);
        assert_eq!(config.scan_limit, 1000);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = Config::from_yaml("embedding:\n  provider: openai\n").unwrap();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.timeout_secs, 30);
        assert_eq!(config.rag.scan_limit, 1000);
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("QUILL_TEST_API_KEY", "sk-from-env");
        let yaml = "embedding:\n  provider: openai\n  api_key: ${QUILL_TEST_API_KEY}\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.embedding.api_key, "sk-from-env");
    }

    #[test]
    fn test_missing_env_var_fails_at_load() {
        let yaml = "embedding:\n  provider: openai\n  api_key: ${QUILL_TEST_DEFINITELY_UNSET}\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { field: "api_key", .. }));
    }

    #[test]
    fn test_load_or_default_only_falls_back_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.yaml");

        let config = Config::load_or_default_from(&path).unwrap();
        assert_eq!(config.embedding.provider, "local");

        std::fs::write(
            &path,
            "embedding:\n  provider: openai\n  api_key: ${QUILL_TEST_UNSET_OPENAI_KEY}\n",
        )
        .unwrap();
        let err = Config::load_or_default_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { field: "api_key", .. }));

        std::fs::write(&path, "embedding: [not, a, map]\n").unwrap();
        assert!(matches!(
            Config::load_or_default_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "embedding:\n  provider: local\n  model: local-64\nrag:\n  collection_prefix: saga"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.embedding.model, "local-64");
        assert_eq!(config.rag.collection_prefix, "saga");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/quill.yaml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }
}
