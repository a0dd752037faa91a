//! OKG Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the OKG system:
//! - RDF term model (IRIs, literals, triples)
//! - Ontology vocabulary entries
//! - Common error types
//! - The chat-model client trait used as extraction oracle
//! - Configuration management
//!
//! Author: hephaex@gmail.com

pub mod config;
pub mod rdf;

pub use config::{
    AppConfig, ConfigError, ExtractionConfig, GraphConfig, InputConfig, LlmConfig, LlmProvider,
    LoggingConfig, OntologyConfig,
};
pub use rdf::{Iri, IriError, Literal, Term, TermError, Triple};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for OKG operations
#[derive(Error, Debug)]
pub enum OkgError {
    #[error("Ontology load error: {0}")]
    OntologyLoad(String),

    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<IriError> for OkgError {
    fn from(err: IriError) -> Self {
        Self::InvalidIri(err.to_string())
    }
}

impl From<ConfigError> for OkgError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OkgError>;

// ============================================================================
// Ontology Models
// ============================================================================

/// Kind of vocabulary entry harvested from an ontology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// `owl:Class`
    Class,
    /// `owl:ObjectProperty`
    ObjectProperty,
    /// `owl:DatatypeProperty`
    DatatypeProperty,
}

impl EntryKind {
    /// Whether this entry is one of the property kinds
    pub fn is_property(&self) -> bool {
        matches!(self, Self::ObjectProperty | Self::DatatypeProperty)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class => write!(f, "owl:Class"),
            Self::ObjectProperty => write!(f, "owl:ObjectProperty"),
            Self::DatatypeProperty => write!(f, "owl:DatatypeProperty"),
        }
    }
}

/// One ontology class or property
///
/// Labels are already language-filtered (untagged or French) when the entry
/// is built. Domain and range are kept for later constraint checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyEntry {
    /// Resource IRI
    pub iri: Iri,

    /// Entry kind
    pub kind: EntryKind,

    /// Accepted `rdfs:label` values
    pub labels: Vec<String>,

    /// `rdfs:domain` values (properties only)
    pub domains: Vec<Iri>,

    /// `rdfs:range` values (properties only)
    pub ranges: Vec<Iri>,
}

impl OntologyEntry {
    /// Create an entry without labels
    pub fn new(iri: Iri, kind: EntryKind) -> Self {
        Self {
            iri,
            kind,
            labels: Vec::new(),
            domains: Vec::new(),
            ranges: Vec::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Names offered to the oracle for this entry.
    ///
    /// Every non-empty label, or the IRI local name when no label survives.
    pub fn display_names(&self) -> Vec<String> {
        let names: Vec<String> = self
            .labels
            .iter()
            .filter(|l| !l.is_empty())
            .cloned()
            .collect();

        if names.is_empty() {
            vec![self.iri.local_name().to_string()]
        } else {
            names
        }
    }
}

// ============================================================================
// Chat Model Types
// ============================================================================

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// A chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,

    /// Token budget override (client default when `None`)
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Single user-message request
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: None,
        }
    }

    /// Override the token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Prompt sent by [`LlmClient::health_check`]
pub const HEALTH_CHECK_PROMPT: &str = "Test prompt";

/// Token budget for the health check
pub const HEALTH_CHECK_MAX_TOKENS: u32 = 50;

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send role-tagged messages, receive the generated text content
    async fn chat(&self, request: &ChatRequest) -> Result<String>;

    /// Generate a response for a single user prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(&ChatRequest::user(prompt)).await
    }

    /// Verify the endpoint answers; returns the reply text
    async fn health_check(&self) -> Result<String> {
        let request = ChatRequest::user(HEALTH_CHECK_PROMPT).with_max_tokens(HEALTH_CHECK_MAX_TOKENS);
        let reply = self.chat(&request).await?;
        if reply.trim().is_empty() {
            return Err(OkgError::LlmError(
                "Health check returned an empty reply".to_string(),
            ));
        }
        Ok(reply)
    }

    /// Model identifier for logging
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoClient {
        seen: Mutex<Vec<ChatRequest>>,
        reply: String,
    }

    #[async_trait::async_trait]
    impl LlmClient for EchoClient {
        async fn chat(&self, request: &ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn iri(s: &str) -> Iri {
        Iri::new(s).unwrap()
    }

    #[test]
    fn test_display_names_prefer_labels() {
        let entry = OntologyEntry::new(iri("http://ex.org/onto#Avion"), EntryKind::Class)
            .with_label("avion")
            .with_label("aéronef");
        assert_eq!(entry.display_names(), vec!["avion", "aéronef"]);
    }

    #[test]
    fn test_display_names_fall_back_to_fragment() {
        let entry = OntologyEntry::new(iri("http://ex.org/onto#Accident"), EntryKind::Class)
            .with_label("");
        assert_eq!(entry.display_names(), vec!["Accident"]);
    }

    #[test]
    fn test_entry_kind() {
        assert!(EntryKind::ObjectProperty.is_property());
        assert!(EntryKind::DatatypeProperty.is_property());
        assert!(!EntryKind::Class.is_property());
        assert_eq!(EntryKind::Class.to_string(), "owl:Class");
    }

    #[tokio::test]
    async fn test_health_check_uses_small_budget() {
        let client = EchoClient {
            seen: Mutex::new(Vec::new()),
            reply: "Bonjour".to_string(),
        };

        let reply = client.health_check().await.unwrap();
        assert_eq!(reply, "Bonjour");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, Some(HEALTH_CHECK_MAX_TOKENS));
        assert_eq!(seen[0].messages[0].content, HEALTH_CHECK_PROMPT);
    }

    #[test]
    fn test_health_check_rejects_blank_reply() {
        let client = EchoClient {
            seen: Mutex::new(Vec::new()),
            reply: "   ".to_string(),
        };
        let result = tokio_test::block_on(client.health_check());
        assert!(matches!(result, Err(OkgError::LlmError(_))));
    }
}
