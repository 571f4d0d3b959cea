#![forbid(unsafe_code)]

//! # brand-survey
//!
//! Pairwise brand-similarity survey. A respondent sees a reference brand
//! (sample product images plus average price) and two candidates, and picks
//! the candidate that is more similar.
//!
//! The interesting part is question generation: questions either contrast a
//! same-cluster candidate with a cross-cluster one, or mix three brands from
//! three distinct clusters. Images are sampled weighted by how common their
//! subcategory is within the brand. Every random draw goes through a
//! caller-supplied `Rng`, so seeded runs are reproducible.

pub mod catalog;
pub mod clusters;
pub mod config;
pub mod question;
pub mod session;
pub mod sink;

pub use catalog::{CatalogIndex, WeightingPolicy};
pub use clusters::{ClusterId, ClusterMap};
pub use config::SurveyConfig;
pub use question::{
    BrandSnapshot, Choice, GenerationError, GeneratorConfig, Question, QuestionGenerator,
    QuestionKind, QuestionMix, Response,
};
pub use session::{Page, SessionError, SessionState, SurveySession};
pub use sink::{
    CsvResponseSink, ResponseSink, RetryConfig, RetryingSink, SinkError, SinkReceipt,
    SqliteResponseSink,
};
