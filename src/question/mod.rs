//! Question generation.
//!
//! Builds ordered batches of pairwise-comparison questions from the catalog
//! and cluster map:
//! - Cluster-contrast questions (same-cluster vs. cross-cluster candidate)
//! - Mixed questions (three brands from three distinct clusters)
//! - Weighted image sampling per brand snapshot
//!
//! All randomness flows through a caller-supplied `Rng`, so a seeded
//! `StdRng` reproduces a batch exactly.

pub mod generator;
pub mod options;
pub mod sampler;
pub mod types;

use rand::distributions::WeightedError;

use crate::clusters::ClusterId;

pub use generator::{PlannedQuestion, QuestionGenerator};
pub use options::{GeneratorConfig, QuestionMix};
pub use sampler::weighted_sample;
pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("survey must contain at least one question")]
    EmptySurvey,
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),
    #[error("insufficient catalog data for {what}: need {needed} eligible brand(s), found {available}")]
    InsufficientCatalog {
        what: String,
        needed: usize,
        available: usize,
    },
    #[error("cluster pair ({verify}, {test}) must name two different clusters")]
    InvalidClusterPair { verify: ClusterId, test: ClusterId },
    #[error("brand '{0}' is not in the catalog")]
    UnknownBrand(String),
    #[error("cannot sample images for '{brand}': {source}")]
    ImageSampling {
        brand: String,
        #[source]
        source: WeightedError,
    },
}

impl GenerationError {
    pub(crate) fn insufficient(what: impl Into<String>, needed: usize, available: usize) -> Self {
        Self::InsufficientCatalog {
            what: what.into(),
            needed,
            available,
        }
    }
}
