//! OKG Extractor - Ontology-constrained triple extraction
//!
//! Builds the extraction prompt from the ontology vocabulary, asks the model
//! for N-Triples with retries, and validates returned lines in two stages
//! (shape pre-filter, then full canonicalization).
//!
//! Author: hephaex@gmail.com

pub mod client;
pub mod ntriples;
pub mod prompt;

pub use client::{
    filter_response, CandidateLine, Extraction, ExtractionClient, ExtractionError, RetryPolicy,
    Sleeper, TokioSleeper,
};
pub use ntriples::{canonicalize, prefilter, LineError, LineErrorKind, PrefilterMode};
pub use prompt::build_prompt;
