//! CSV loading for the price and image tables.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use super::{CatalogError, CatalogIndex, ImageRecord, PriceRecord, WeightingPolicy};

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(rename = "Brand")]
    brand: String,
    #[serde(rename = "Average Price", default)]
    average_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageRow {
    #[serde(rename = "Brand")]
    brand: String,
    #[serde(rename = "Category", alias = "Category 2", default)]
    category: Option<String>,
    #[serde(rename = "Product image URL", default)]
    url: Option<String>,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, CatalogError> {
    let file = std::fs::File::open(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file))
}

fn csv_error(path: &Path, source: csv::Error) -> CatalogError {
    CatalogError::Csv {
        path: path.display().to_string(),
        source,
    }
}

/// Reads a `Brand,Average Price` table. Unparseable prices become `None`.
pub fn read_price_table(path: impl AsRef<Path>) -> Result<Vec<PriceRecord>, CatalogError> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let mut out = Vec::new();
    for row in reader.deserialize::<PriceRow>() {
        let row = row.map_err(|e| csv_error(path, e))?;
        let average_price = match row.average_price.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.trim_start_matches('$').replace(',', "").parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(brand = %row.brand, raw, "unparseable average price");
                    None
                }
            },
        };
        out.push(PriceRecord {
            brand: row.brand,
            average_price,
        });
    }
    Ok(out)
}

/// Reads a `Brand,Category,Product image URL` table.
pub fn read_image_table(path: impl AsRef<Path>) -> Result<Vec<ImageRecord>, CatalogError> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let mut out = Vec::new();
    for row in reader.deserialize::<ImageRow>() {
        let row = row.map_err(|e| csv_error(path, e))?;
        out.push(ImageRecord {
            brand: row.brand,
            category: row.category,
            url: row.url,
        });
    }
    Ok(out)
}

pub fn load_catalog(
    prices: impl AsRef<Path>,
    images: impl AsRef<Path>,
    policy: WeightingPolicy,
) -> Result<CatalogIndex, CatalogError> {
    let prices = read_price_table(prices)?;
    let images = read_image_table(images)?;
    Ok(CatalogIndex::from_records(&prices, &images, policy))
}
