//! Catalog index: brand -> average price and brand -> weighted image pool.
//!
//! Raw price and image rows are joined on the canonical brand name. Only
//! brands present in both lookups are "available" for question generation.

pub mod load;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use load::{load_catalog, read_image_table, read_price_table};

/// Group name for image rows that carry no subcategory.
pub const UNCATEGORIZED: &str = "(uncategorized)";

/// Canonical join key across the price and image tables.
pub fn canonical_brand(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("brand '{0}' is not in the catalog")]
    UnknownBrand(String),
}

/// How image sampling probability is assigned within a brand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingPolicy {
    /// Each image row is weighted by the size of its subcategory within the brand.
    #[default]
    Subcategory,
    /// Deduplicated URLs, each equally likely.
    Uniform,
}

/// One row of the price table.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub brand: String,
    pub average_price: Option<f64>,
}

impl PriceRecord {
    pub fn new(brand: impl Into<String>, average_price: f64) -> Self {
        Self {
            brand: brand.into(),
            average_price: Some(average_price),
        }
    }
}

/// One row of the image table.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub brand: String,
    pub category: Option<String>,
    pub url: Option<String>,
}

impl ImageRecord {
    pub fn new(brand: impl Into<String>, category: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            category: Some(category.into()),
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedImage {
    pub url: String,
    pub weight: f64,
}

/// Per-brand pool of sampleable image URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImagePool {
    entries: Vec<WeightedImage>,
}

impl ImagePool {
    pub fn from_entries(entries: Vec<WeightedImage>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[WeightedImage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn from_rows(rows: &[(String, String)], policy: WeightingPolicy) -> Self {
        let entries = match policy {
            WeightingPolicy::Subcategory => {
                let mut counts: HashMap<&str, usize> = HashMap::new();
                for (_, category) in rows {
                    *counts.entry(category.as_str()).or_default() += 1;
                }
                rows.iter()
                    .map(|(url, category)| WeightedImage {
                        url: url.clone(),
                        weight: counts.get(category.as_str()).copied().unwrap_or(1) as f64,
                    })
                    .collect()
            }
            WeightingPolicy::Uniform => {
                let mut seen = BTreeSet::new();
                rows.iter()
                    .filter(|(url, _)| seen.insert(url.as_str()))
                    .map(|(url, _)| WeightedImage {
                        url: url.clone(),
                        weight: 1.0,
                    })
                    .collect()
            }
        };
        Self { entries }
    }
}

/// A brand that has both a price and at least one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandEntry {
    pub name: String,
    pub average_price: f64,
    pub images: ImagePool,
}

impl BrandEntry {
    /// Price as shown to respondents.
    pub fn display_price(&self) -> i64 {
        self.average_price.round() as i64
    }
}

/// Row accounting from a catalog build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub price_rows: usize,
    pub image_rows: usize,
    pub dropped_price_rows: usize,
    pub dropped_image_rows: usize,
    pub priced_brands: usize,
    pub imaged_brands: usize,
    pub available_brands: usize,
}

/// Read-only brand lookups shared across survey sessions.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    brands: BTreeMap<String, BrandEntry>,
    policy: WeightingPolicy,
    stats: CatalogStats,
}

impl CatalogIndex {
    pub fn from_records(
        prices: &[PriceRecord],
        images: &[ImageRecord],
        policy: WeightingPolicy,
    ) -> Self {
        let mut stats = CatalogStats {
            price_rows: prices.len(),
            image_rows: images.len(),
            ..CatalogStats::default()
        };

        let mut price_lookup: HashMap<String, f64> = HashMap::new();
        for row in prices {
            let brand = canonical_brand(&row.brand);
            match row.average_price {
                Some(price) if !brand.is_empty() && price.is_finite() && price >= 0.0 => {
                    // Later rows overwrite earlier ones.
                    price_lookup.insert(brand, price);
                }
                _ => {
                    warn!(brand = %row.brand, price = ?row.average_price, "dropping unusable price row");
                    stats.dropped_price_rows += 1;
                }
            }
        }

        let mut image_rows: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for row in images {
            let brand = canonical_brand(&row.brand);
            let url = row.url.as_deref().map(str::trim).unwrap_or_default();
            if brand.is_empty() || url.is_empty() {
                stats.dropped_image_rows += 1;
                continue;
            }
            let category = row
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNCATEGORIZED);
            image_rows
                .entry(brand)
                .or_default()
                .push((url.to_string(), category.to_string()));
        }
        if stats.dropped_image_rows > 0 {
            warn!(dropped = stats.dropped_image_rows, "dropped image rows without a url");
        }

        stats.priced_brands = price_lookup.len();
        stats.imaged_brands = image_rows.len();

        let mut brands = BTreeMap::new();
        for (name, rows) in &image_rows {
            let Some(&average_price) = price_lookup.get(name) else {
                continue;
            };
            let pool = ImagePool::from_rows(rows, policy);
            if pool.is_empty() {
                continue;
            }
            brands.insert(
                name.clone(),
                BrandEntry {
                    name: name.clone(),
                    average_price,
                    images: pool,
                },
            );
        }
        stats.available_brands = brands.len();

        info!(
            available = stats.available_brands,
            priced = stats.priced_brands,
            imaged = stats.imaged_brands,
            ?policy,
            "catalog index built"
        );

        Self {
            brands,
            policy,
            stats,
        }
    }

    pub fn get(&self, brand: &str) -> Option<&BrandEntry> {
        self.brands.get(brand)
    }

    pub fn entry(&self, brand: &str) -> Result<&BrandEntry, CatalogError> {
        self.get(brand)
            .ok_or_else(|| CatalogError::UnknownBrand(brand.to_string()))
    }

    pub fn contains(&self, brand: &str) -> bool {
        self.brands.contains_key(brand)
    }

    /// Available brand names in sorted order.
    pub fn brand_names(&self) -> impl Iterator<Item = &str> {
        self.brands.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &BrandEntry> {
        self.brands.values()
    }

    pub fn len(&self) -> usize {
        self.brands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    pub fn policy(&self) -> WeightingPolicy {
        self.policy
    }

    pub fn stats(&self) -> &CatalogStats {
        &self.stats
    }
}
