//! Cluster-aware question generator.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::catalog::CatalogIndex;
use crate::clusters::{ClusterId, ClusterMap};

use super::options::GeneratorConfig;
use super::sampler::weighted_sample;
use super::types::{BrandSnapshot, Question, QuestionKind};
use super::GenerationError;

/// Strategy chosen for one slot of a batch, before any brand is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedQuestion {
    Contrast { verify: ClusterId, test: ClusterId },
    Mixed,
}

/// Generates questions over a shared, read-only catalog and cluster map.
///
/// With an empty cluster map the generator falls back to fully random
/// triples of distinct catalog brands.
#[derive(Debug, Clone)]
pub struct QuestionGenerator {
    catalog: Arc<CatalogIndex>,
    clusters: Arc<ClusterMap>,
    config: GeneratorConfig,
    pools: BTreeMap<ClusterId, Vec<String>>,
}

impl QuestionGenerator {
    pub fn new(
        catalog: Arc<CatalogIndex>,
        clusters: Arc<ClusterMap>,
        config: GeneratorConfig,
    ) -> Result<Self, GenerationError> {
        config.validate()?;
        let pools = clusters.eligible_pools(&catalog);
        let clustered: usize = pools.values().map(Vec::len).sum();
        if !clusters.is_empty() && clustered < clusters.len() {
            info!(
                clustered,
                mapped = clusters.len(),
                "some clustered brands are missing from the catalog and will be skipped"
            );
        }
        Ok(Self {
            catalog,
            clusters,
            config,
            pools,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    pub fn clusters(&self) -> &ClusterMap {
        &self.clusters
    }

    /// Cluster id -> eligible brands (clustered and present in the catalog).
    pub fn cluster_pools(&self) -> &BTreeMap<ClusterId, Vec<String>> {
        &self.pools
    }

    fn random_triples(&self) -> bool {
        self.clusters.is_empty()
    }

    fn pool(&self, cluster: ClusterId) -> &[String] {
        self.pools.get(&cluster).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ordered (verify, test) pairs that can produce a contrast question.
    pub fn satisfiable_pairs(&self) -> Vec<(ClusterId, ClusterId)> {
        let mut pairs = Vec::new();
        for (&verify, verify_pool) in &self.pools {
            if verify_pool.len() < 2 {
                continue;
            }
            for (&test, test_pool) in &self.pools {
                if test != verify && !test_pool.is_empty() {
                    pairs.push((verify, test));
                }
            }
        }
        pairs
    }

    /// Materializes a brand for display: rounded price plus sampled images.
    pub fn get_brand_data<R: Rng + ?Sized>(
        &self,
        brand: &str,
        rng: &mut R,
    ) -> Result<BrandSnapshot, GenerationError> {
        let entry = self
            .catalog
            .get(brand)
            .ok_or_else(|| GenerationError::UnknownBrand(brand.to_string()))?;
        let images = weighted_sample(&entry.images, self.config.images_per_snapshot, rng)
            .map_err(|source| GenerationError::ImageSampling {
                brand: brand.to_string(),
                source,
            })?;
        Ok(BrandSnapshot {
            brand: entry.name.clone(),
            price: entry.display_price(),
            images,
        })
    }

    pub fn generate_cluster_question<R: Rng + ?Sized>(
        &self,
        verify_cluster: ClusterId,
        test_cluster: ClusterId,
        rng: &mut R,
    ) -> Result<Question, GenerationError> {
        if verify_cluster == test_cluster {
            return Err(GenerationError::InvalidClusterPair {
                verify: verify_cluster,
                test: test_cluster,
            });
        }
        let verify_pool = self.pool(verify_cluster);
        if verify_pool.len() < 2 {
            return Err(GenerationError::insufficient(
                format!("verify cluster {verify_cluster}"),
                2,
                verify_pool.len(),
            ));
        }
        let test_pool = self.pool(test_cluster);
        if test_pool.is_empty() {
            return Err(GenerationError::insufficient(
                format!("test cluster {test_cluster}"),
                1,
                0,
            ));
        }

        let reference = choose_brand(verify_pool, rng, verify_cluster)?;
        let same_pool: Vec<&String> = verify_pool.iter().filter(|b| *b != reference).collect();
        let same = same_pool.choose(rng).copied().ok_or_else(|| {
            GenerationError::insufficient(format!("verify cluster {verify_cluster}"), 2, 1)
        })?;
        let different = choose_brand(test_pool, rng, test_cluster)?;

        // Randomize which side the same-cluster candidate lands on.
        let (a, b) = if rng.gen_bool(0.5) {
            (same, different)
        } else {
            (different, same)
        };

        Ok(Question {
            kind: QuestionKind::Contrast {
                verify_cluster,
                test_cluster,
            },
            reference: self.get_brand_data(reference, rng)?,
            candidate_a: self.get_brand_data(a, rng)?,
            candidate_b: self.get_brand_data(b, rng)?,
        })
    }

    pub fn generate_mixed_cluster_question<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Question, GenerationError> {
        let mut picks: Vec<(&str, Option<ClusterId>)> = if self.random_triples() {
            let brands: Vec<&str> = self.catalog.brand_names().collect();
            if brands.len() < 3 {
                return Err(GenerationError::insufficient("a random triple", 3, brands.len()));
            }
            brands.choose_multiple(rng, 3).map(|b| (*b, None)).collect()
        } else {
            let populated: Vec<ClusterId> = self.pools.keys().copied().collect();
            if populated.len() < 3 {
                return Err(GenerationError::insufficient(
                    "a mixed question (distinct populated clusters)",
                    3,
                    populated.len(),
                ));
            }
            let chosen: Vec<ClusterId> = populated.choose_multiple(rng, 3).copied().collect();
            let mut picks = Vec::with_capacity(3);
            for cluster in chosen {
                let brand = choose_brand(self.pool(cluster), rng, cluster)?;
                picks.push((brand.as_str(), Some(cluster)));
            }
            picks
        };
        picks.shuffle(rng);

        let clusters = picks.iter().filter_map(|(_, c)| *c).collect();
        Ok(Question {
            kind: QuestionKind::Mixed { clusters },
            reference: self.get_brand_data(picks[0].0, rng)?,
            candidate_a: self.get_brand_data(picks[1].0, rng)?,
            candidate_b: self.get_brand_data(picks[2].0, rng)?,
        })
    }

    /// Decides the strategy of every slot in a batch of `count` questions.
    ///
    /// Fails before anything is drawn if the catalog cannot satisfy the plan.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<PlannedQuestion>, GenerationError> {
        if count == 0 {
            return Err(GenerationError::EmptySurvey);
        }

        let contrast_count = if self.random_triples() {
            0
        } else {
            self.config.mix.contrast_count(count)
        };
        let mixed_count = count - contrast_count;

        if mixed_count > 0 {
            let available = if self.random_triples() {
                self.catalog.len()
            } else {
                self.pools.len()
            };
            if available < 3 {
                let what = if self.random_triples() {
                    "mixed questions (catalog brands)"
                } else {
                    "mixed questions (distinct populated clusters)"
                };
                return Err(GenerationError::insufficient(what, 3, available));
            }
        }

        let mut plan = Vec::with_capacity(count);
        if contrast_count > 0 {
            let pairs = self.satisfiable_pairs();
            if pairs.is_empty() {
                let best = self.pools.values().map(Vec::len).max().unwrap_or(0);
                return Err(GenerationError::insufficient(
                    "contrast questions (a cluster with 2 brands plus another populated cluster)",
                    2,
                    best,
                ));
            }

            let mut distinct = self.config.distinct_pairs.min(contrast_count);
            if distinct > pairs.len() {
                warn!(
                    requested = distinct,
                    available = pairs.len(),
                    "fewer satisfiable cluster pairs than requested distinct pairs"
                );
                distinct = pairs.len();
            }
            for &(verify, test) in pairs.choose_multiple(rng, distinct) {
                plan.push(PlannedQuestion::Contrast { verify, test });
            }
            for _ in distinct..contrast_count {
                if let Some(&(verify, test)) = pairs.choose(rng) {
                    plan.push(PlannedQuestion::Contrast { verify, test });
                }
            }
        }
        plan.extend(std::iter::repeat(PlannedQuestion::Mixed).take(mixed_count));
        Ok(plan)
    }

    pub fn generate_all_questions<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Question>, GenerationError> {
        let plan = self.plan(count, rng)?;
        let mut questions = Vec::with_capacity(plan.len());
        for (idx, slot) in plan.into_iter().enumerate() {
            let question = match slot {
                PlannedQuestion::Contrast { verify, test } => {
                    self.generate_cluster_question(verify, test, rng)?
                }
                PlannedQuestion::Mixed => self.generate_mixed_cluster_question(rng)?,
            };
            debug!(
                ordinal = idx + 1,
                reference = %question.reference.brand,
                a = %question.candidate_a.brand,
                b = %question.candidate_b.brand,
                "generated question"
            );
            questions.push(question);
        }
        Ok(questions)
    }

    /// Generates a batch of the configured length.
    pub fn generate_batch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<Question>, GenerationError> {
        self.generate_all_questions(self.config.total_questions, rng)
    }
}

fn choose_brand<'a, R: Rng + ?Sized>(
    pool: &'a [String],
    rng: &mut R,
    cluster: ClusterId,
) -> Result<&'a String, GenerationError> {
    pool.choose(rng)
        .ok_or_else(|| GenerationError::insufficient(format!("cluster {cluster}"), 1, 0))
}
