//! Static brand -> cluster assignment.
//!
//! Clusters group brands that are considered stylistically and price-tier
//! similar. The generator uses them to control question difficulty.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{canonical_brand, CatalogIndex};

pub type ClusterId = u32;

/// Built-in fashion clusters. Later entries win, so a brand listed twice
/// ends up in the last cluster it appears under.
const DEFAULT_CLUSTERS: &[(&str, ClusterId)] = &[
    ("GUCCI", 1),
    ("SAINT LAURENT", 1),
    ("ALEXANDER MCQUEEN", 1),
    ("TOM FORD", 1),
    ("MAISON MARGIELA", 1),
    ("RICK OWENS", 1),
    ("YOHJI YAMAMOTO", 1),
    ("OFF-WHITE", 2),
    ("SUPREME", 2),
    ("PALM ANGELS", 2),
    ("FEAR OF GOD", 2),
    ("THE FRANKIE SHOP", 3),
    ("A.P.C.", 3),
    ("VINCE", 3),
    ("NANUSHKA", 3),
    ("RAG & BONE", 3),
    ("POLO RALPH LAUREN", 3),
    ("NIKE", 4),
    ("ADIDAS", 4),
    ("THE NORTH FACE", 4),
    ("LULULEMON", 4),
    ("LEVI'S", 5),
    ("AGOLDE", 5),
    ("7 FOR ALL MANKIND", 5),
    ("CALVIN KLEIN JEANS", 5),
    ("ZIMMERMANN", 6),
    ("JOHANNA ORTIZ", 6),
    ("SOLID & STRIPED", 6),
    ("HUNZA G", 6),
    ("MICHAEL KORS COLLECTION", 7),
    ("VERSACE JEANS COUTURE", 7),
    ("CALVIN KLEIN JEANS", 7),
    ("POLO RALPH LAUREN", 7),
];

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("failed to read cluster config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse cluster config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("cluster config maps an empty brand name")]
    EmptyBrand,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterMap {
    assignments: BTreeMap<String, ClusterId>,
}

impl ClusterMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a map from (brand, cluster) pairs; brand names are canonicalized.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, ClusterId)>,
        S: AsRef<str>,
    {
        let mut map = Self::default();
        for (brand, cluster) in pairs {
            map.insert(brand.as_ref(), cluster);
        }
        map
    }

    pub fn fashion_default() -> Self {
        Self::from_pairs(DEFAULT_CLUSTERS.iter().copied())
    }

    /// Loads a JSON object of `{"BRAND": cluster_id}`.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ClusterError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let parsed: BTreeMap<String, ClusterId> = serde_json::from_str(&raw)?;
        if parsed.keys().any(|k| k.trim().is_empty()) {
            return Err(ClusterError::EmptyBrand);
        }
        Ok(Self::from_pairs(parsed))
    }

    pub fn insert(&mut self, brand: &str, cluster: ClusterId) {
        self.assignments.insert(canonical_brand(brand), cluster);
    }

    pub fn cluster_of(&self, brand: &str) -> Option<ClusterId> {
        self.assignments.get(brand).copied()
    }

    pub fn cluster_ids(&self) -> BTreeSet<ClusterId> {
        self.assignments.values().copied().collect()
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&str, ClusterId)> {
        self.assignments.iter().map(|(b, c)| (b.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Cluster id -> sorted brands that are both clustered and in the catalog.
    ///
    /// Clusters with no eligible brand are omitted.
    pub fn eligible_pools(&self, catalog: &CatalogIndex) -> BTreeMap<ClusterId, Vec<String>> {
        let mut pools: BTreeMap<ClusterId, Vec<String>> = BTreeMap::new();
        for (brand, cluster) in &self.assignments {
            if catalog.contains(brand) {
                pools.entry(*cluster).or_default().push(brand.clone());
            }
        }
        pools
    }
}
