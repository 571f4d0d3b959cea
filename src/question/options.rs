//! Generator settings.

use serde::{Deserialize, Serialize};

use super::GenerationError;

pub const DEFAULT_TOTAL_QUESTIONS: usize = 30;
pub const DEFAULT_DISTINCT_PAIRS: usize = 4;
pub const DEFAULT_IMAGES_PER_SNAPSHOT: usize = 6;

/// Relative share of contrast vs. mixed questions in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionMix {
    pub contrast: u32,
    pub mixed: u32,
}

impl Default for QuestionMix {
    fn default() -> Self {
        Self {
            contrast: 2,
            mixed: 1,
        }
    }
}

impl QuestionMix {
    /// Number of contrast questions in a batch of `total`, rounded half up.
    pub fn contrast_count(&self, total: usize) -> usize {
        let parts = self.contrast as usize + self.mixed as usize;
        if parts == 0 {
            return 0;
        }
        (total * self.contrast as usize + parts / 2) / parts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub total_questions: usize,
    pub mix: QuestionMix,
    /// Leading contrast questions drawn from distinct cluster pairs.
    pub distinct_pairs: usize,
    pub images_per_snapshot: usize,
    /// Fixed seed for reproducible batches; `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            total_questions: DEFAULT_TOTAL_QUESTIONS,
            mix: QuestionMix::default(),
            distinct_pairs: DEFAULT_DISTINCT_PAIRS,
            images_per_snapshot: DEFAULT_IMAGES_PER_SNAPSHOT,
            rng_seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn with_total(mut self, total_questions: usize) -> Self {
        self.total_questions = total_questions;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.total_questions == 0 {
            return Err(GenerationError::EmptySurvey);
        }
        if self.images_per_snapshot == 0 {
            return Err(GenerationError::InvalidConfig(
                "images_per_snapshot must be >= 1".to_string(),
            ));
        }
        if self.mix.contrast == 0 && self.mix.mixed == 0 {
            return Err(GenerationError::InvalidConfig(
                "question mix must have a non-zero contrast or mixed share".to_string(),
            ));
        }
        Ok(())
    }
}
