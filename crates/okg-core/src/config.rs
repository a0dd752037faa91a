//! OKG Configuration Management
//!
//! Handles configuration from environment variables and TOML config files,
//! with defaults matching the BAEO aviation-accident ontology setup.
//!
//! Author: hephaex@gmail.com

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::rdf::Iri;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Ontology source
    pub ontology: OntologyConfig,

    /// Graph namespace and output
    pub graph: GraphConfig,

    /// Extraction retry and filtering
    pub extraction: ExtractionConfig,

    /// Input documents
    pub input: InputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        config.llm.api_key = api_key_from_env();
        if let Ok(value) = std::env::var("LLM_TEMPERATURE") {
            config.llm.temperature = parse_env("LLM_TEMPERATURE", value)?;
        }
        if let Ok(value) = std::env::var("LLM_MAX_TOKENS") {
            config.llm.max_tokens = parse_env("LLM_MAX_TOKENS", value)?;
        }
        if let Ok(value) = std::env::var("LLM_TIMEOUT") {
            config.llm.timeout_secs = parse_env("LLM_TIMEOUT", value)?;
        }

        // Ontology and graph
        if let Ok(path) = std::env::var("ONTOLOGY_PATH") {
            config.ontology.path = PathBuf::from(path);
        }
        if let Ok(namespace) = std::env::var("OKG_NAMESPACE") {
            config.graph.namespace = namespace;
        }
        if let Ok(prefix) = std::env::var("OKG_PREFIX") {
            config.graph.prefix = prefix;
        }
        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            config.graph.output_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("INPUT_DIR") {
            config.input.dir = PathBuf::from(dir);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError { path, message },
            other => other,
        })
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;
        let defaults = Self::default();

        // Only override if env values differ from defaults
        if env_config.llm.provider != defaults.llm.provider {
            self.llm.provider = env_config.llm.provider;
        }
        if env_config.llm.model != defaults.llm.model {
            self.llm.model = env_config.llm.model;
        }
        if env_config.llm.base_url.is_some() {
            self.llm.base_url = env_config.llm.base_url;
        }
        if env_config.llm.ollama_url != defaults.llm.ollama_url {
            self.llm.ollama_url = env_config.llm.ollama_url;
        }
        if env_config.llm.temperature != defaults.llm.temperature {
            self.llm.temperature = env_config.llm.temperature;
        }
        if env_config.llm.max_tokens != defaults.llm.max_tokens {
            self.llm.max_tokens = env_config.llm.max_tokens;
        }
        if env_config.llm.timeout_secs != defaults.llm.timeout_secs {
            self.llm.timeout_secs = env_config.llm.timeout_secs;
        }
        if env_config.ontology.path != defaults.ontology.path {
            self.ontology.path = env_config.ontology.path;
        }
        if env_config.graph.namespace != defaults.graph.namespace {
            self.graph.namespace = env_config.graph.namespace;
        }
        if env_config.graph.prefix != defaults.graph.prefix {
            self.graph.prefix = env_config.graph.prefix;
        }
        if env_config.graph.output_dir != defaults.graph.output_dir {
            self.graph.output_dir = env_config.graph.output_dir;
        }
        if env_config.input.dir != defaults.input.dir {
            self.input.dir = env_config.input.dir;
        }
        if env_config.logging.level != defaults.logging.level {
            self.logging.level = env_config.logging.level;
        }

        // Always use env for credentials
        if env_config.llm.api_key.is_some() {
            self.llm.api_key = env_config.llm.api_key;
        }

        Ok(self)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "llm.temperature".to_string(),
                value: self.llm.temperature.to_string(),
            });
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "llm.max_tokens".to_string(),
                value: "0".to_string(),
            });
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "llm.timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired("llm.model".to_string()));
        }
        if Iri::new(self.graph.namespace.clone()).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "graph.namespace".to_string(),
                value: self.graph.namespace.clone(),
            });
        }
        if self.graph.prefix.is_empty() || !self.graph.prefix.chars().all(is_prefix_char) {
            return Err(ConfigError::InvalidValue {
                key: "graph.prefix".to_string(),
                value: self.graph.prefix.clone(),
            });
        }
        if self.extraction.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "extraction.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.llm.provider.requires_api_key() && self.llm.api_key.is_none() {
            return Err(ConfigError::MissingRequired(format!(
                "API key for provider {} (set HF_TOKEN or OPENAI_API_KEY)",
                self.llm.provider
            )));
        }
        Ok(())
    }
}

fn is_prefix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn api_key_from_env() -> Option<String> {
    ["LLM_API_KEY", "HF_TOKEN", "HUGGING_FACE_HUB_TOKEN", "OPENAI_API_KEY"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// Access credential (never read from the config file)
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Base URL override for OpenAI-compatible endpoints
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model identifier
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation, in [0, 1]
    pub temperature: f32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::HuggingFace,
            api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "mistralai/Mixtral-8x7B-Instruct-v0.1".to_string(),
            max_tokens: 1024,
            temperature: 0.1,
            timeout_secs: 320,
        }
    }
}

impl LlmConfig {
    /// Base URL for OpenAI-compatible providers
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProvider::HuggingFace => "https://router.huggingface.co/v1".to_string(),
            LlmProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => self.ollama_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Hugging Face inference router (OpenAI-compatible chat API)
    #[serde(alias = "hf")]
    HuggingFace,
    OpenAI,
    Ollama,
}

impl LlmProvider {
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HuggingFace => write!(f, "huggingface"),
            Self::OpenAI => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Ontology source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    /// Path to the Turtle ontology
    pub path: PathBuf,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ontology/baeo_application.ttl"),
        }
    }
}

/// Graph namespace and output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// IRI prefix for generated entities
    pub namespace: String,

    /// Prefix name bound to the namespace in serializations
    pub prefix: String,

    /// Directory receiving the serialized graphs
    pub output_dir: PathBuf,

    /// Base file name (without extension) of the serialized graphs
    pub file_stem: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            namespace: "http://www.enit.fr/2022/03/baeo#".to_string(),
            prefix: "baeo".to_string(),
            output_dir: PathBuf::from("output"),
            file_stem: "knowledge_graph".to_string(),
        }
    }
}

/// Extraction retry and filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Attempts per chunk
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds (doubled after each failure)
    pub base_delay_ms: u64,

    /// Admit literal objects at the pre-filter stage
    pub accept_literal_objects: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            accept_literal_objects: false,
        }
    }
}

/// Input document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory scanned for documents
    pub dir: PathBuf,

    /// Sentences shorter than this (in characters) are dropped
    pub min_chunk_chars: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            min_chunk_chars: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
