//! Extraction client: prompt, call the model, keep well-shaped lines
//!
//! The client retries failed calls with exponential backoff. A failed call is
//! any error from the model client (transport, timeout, HTTP status, body
//! decoding, missing or blank content). A successful reply with no usable
//! lines is not a failure.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use okg_core::{ChatRequest, ExtractionConfig, LlmClient, OkgError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ntriples::{prefilter, PrefilterMode};
use crate::prompt::build_prompt;

// ============================================================================
// Retry policy
// ============================================================================

/// Attempt budget and backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// Sleep before the next attempt after 0-based `attempt` failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Async sleep seam
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Results
// ============================================================================

/// A trimmed response line that passed the shape check
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateLine(String);

impl CandidateLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CandidateLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CandidateLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a successful extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Lines kept by the shape check, in response order
    pub lines: Vec<CandidateLine>,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Non-blank response lines dropped by the shape check
    pub discarded: usize,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: OkgError,
    },
}

/// Split a model reply into candidate lines
pub fn filter_response(response: &str, mode: PrefilterMode) -> (Vec<CandidateLine>, usize) {
    let mut lines = Vec::new();
    let mut discarded = 0;

    for line in response.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if prefilter(line, mode) {
            lines.push(CandidateLine(line.to_string()));
        } else {
            debug!(line, "Discarding malformed response line");
            discarded += 1;
        }
    }

    (lines, discarded)
}

// ============================================================================
// Client
// ============================================================================

/// Turns one text chunk into candidate N-Triples lines
pub struct ExtractionClient {
    llm: Arc<dyn LlmClient>,
    namespace: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    prefilter: PrefilterMode,
}

impl ExtractionClient {
    pub fn new(llm: Arc<dyn LlmClient>, namespace: impl Into<String>) -> Self {
        Self {
            llm,
            namespace: namespace.into(),
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            prefilter: PrefilterMode::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_prefilter(mut self, mode: PrefilterMode) -> Self {
        self.prefilter = mode;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Extract candidate lines, reporting exhaustion as an error
    pub async fn try_extract(
        &self,
        chunk: &str,
        class_names: &[String],
        property_names: &[String],
    ) -> Result<Extraction, ExtractionError> {
        let prompt = build_prompt(chunk, class_names, property_names, &self.namespace);
        let request = ChatRequest::user(prompt);
        let max_attempts = self.retry.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            match self.llm.chat(&request).await {
                Ok(response) => {
                    let (lines, discarded) = filter_response(&response, self.prefilter);
                    debug!(
                        attempt = attempt + 1,
                        kept = lines.len(),
                        discarded,
                        "Model reply filtered"
                    );
                    return Ok(Extraction {
                        lines,
                        attempts: attempt + 1,
                        discarded,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Extraction attempt failed"
                    );
                    if attempt + 1 >= max_attempts {
                        return Err(ExtractionError::Exhausted {
                            attempts: max_attempts,
                            last_error: e,
                        });
                    }
                    self.sleeper.sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Extract candidate lines; exhaustion yields an empty vector
    pub async fn extract(
        &self,
        chunk: &str,
        class_names: &[String],
        property_names: &[String],
    ) -> Vec<CandidateLine> {
        match self.try_extract(chunk, class_names, property_names).await {
            Ok(extraction) => extraction.lines,
            Err(e) => {
                warn!(error = %e, "Giving up on chunk");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use okg_core::Result;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of replies, then fails
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, request: &ChatRequest) -> Result<String> {
            self.calls.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(OkgError::LlmError("script exhausted".to_string())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    const NS: &str = "http://www.enit.fr/2022/03/baeo#";
    const LINE: &str = "<http://www.enit.fr/2022/03/baeo#AccidentAvion> <http://www.enit.fr/2022/03/baeo#aCause> <http://www.enit.fr/2022/03/baeo#MauvaisTemps> .";

    fn transient() -> Result<String> {
        Err(OkgError::LlmError("503 Service Unavailable".to_string()))
    }

    fn client(llm: Arc<ScriptedLlm>, sleeper: Arc<RecordingSleeper>) -> ExtractionClient {
        ExtractionClient::new(llm, NS).with_sleeper(sleeper)
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&ExtractionConfig {
            max_attempts: 0,
            base_delay_ms: 250,
            accept_literal_objects: false,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_success_after_two_failures_sleeps_one_then_two() {
        let llm = ScriptedLlm::new(vec![transient(), transient(), Ok(format!("{LINE}\n"))]);
        let sleeper = Arc::new(RecordingSleeper::default());

        let extraction = client(llm.clone(), sleeper.clone())
            .try_extract("chunk", &[], &[])
            .await
            .unwrap();

        assert_eq!(extraction.attempts, 3);
        assert_eq!(extraction.lines.len(), 1);
        assert_eq!(extraction.lines[0].as_str(), LINE);
        assert_eq!(llm.call_count(), 3);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_returns_empty_without_final_sleep() {
        let llm = ScriptedLlm::new(vec![transient(), transient(), transient()]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let extractor = client(llm.clone(), sleeper.clone());

        let err = extractor.try_extract("chunk", &[], &[]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Exhausted { attempts: 3, .. }));
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 2);

        let lines = extractor.extract("chunk", &[], &[]).await;
        assert!(lines.is_empty());
        assert_eq!(llm.call_count(), 6);
    }

    #[tokio::test]
    async fn test_reply_is_filtered_line_by_line() {
        let reply = format!(
            "Voici les triplets :\n\n  {LINE}  \n<http://ex#A> <http://ex#p> not-a-uri .\n<http://ex#A> <http://ex#nom> \"Airbus\" .\n"
        );
        let llm = ScriptedLlm::new(vec![Ok(reply.clone()), Ok(reply)]);
        let sleeper = Arc::new(RecordingSleeper::default());

        let strict = client(llm.clone(), sleeper.clone());
        let extraction = strict.try_extract("chunk", &[], &[]).await.unwrap();
        assert_eq!(extraction.attempts, 1);
        assert_eq!(extraction.lines.len(), 1);
        assert_eq!(extraction.discarded, 3);

        let lenient = client(llm, sleeper.clone()).with_prefilter(PrefilterMode::AllowLiteralObjects);
        let extraction = lenient.try_extract("chunk", &[], &[]).await.unwrap();
        assert_eq!(extraction.lines.len(), 2);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_carries_chunk_and_vocabulary() {
        let llm = ScriptedLlm::new(vec![Ok("rien".to_string())]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let classes = vec!["Accident".to_string()];
        let properties = vec!["aCause".to_string()];

        let lines = client(llm.clone(), sleeper)
            .extract("Le vol AF447 a disparu.", &classes, &properties)
            .await;
        assert!(lines.is_empty());

        let calls = llm.calls.lock().unwrap();
        let prompt = &calls[0].messages[0].content;
        assert_eq!(*prompt, build_prompt("Le vol AF447 a disparu.", &classes, &properties, NS));
        assert_eq!(calls[0].max_tokens, None);
    }
}
