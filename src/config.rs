//! Survey configuration file.
//!
//! JSON with three optional sections; anything omitted falls back to the
//! defaults below. Command-line flags override file values.
//!
//! ```json
//! {
//!   "catalog": { "prices": "prices.csv", "images": "images.csv", "weighting": "subcategory" },
//!   "generator": { "total_questions": 30, "mix": { "contrast": 2, "mixed": 1 }, "rng_seed": 7 },
//!   "sink": { "kind": "csv", "path": "responses.csv", "retry": { "max_retries": 2 } }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::WeightingPolicy;
use crate::question::{GenerationError, GeneratorConfig};
use crate::sink::{RetryConfig, SinkKind};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(#[from] GenerationError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub prices: Option<PathBuf>,
    pub images: Option<PathBuf>,
    /// JSON cluster map; the built-in fashion clusters are used when absent.
    pub clusters: Option<PathBuf>,
    pub weighting: WeightingPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub path: Option<PathBuf>,
    pub retry: RetryConfig,
}

impl SinkConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| self.kind.default_path())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub catalog: CatalogConfig,
    pub generator: GeneratorConfig,
    pub sink: SinkConfig,
}

impl SurveyConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: SurveyConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator.validate()?;
        Ok(())
    }
}
