use std::fs;

use brand_survey::catalog::{
    canonical_brand, load_catalog, read_price_table, CatalogError, CatalogIndex, ImageRecord,
    PriceRecord, WeightingPolicy, UNCATEGORIZED,
};
use brand_survey::clusters::ClusterMap;
use tempfile::tempdir;

fn image(brand: &str, category: &str, url: &str) -> ImageRecord {
    ImageRecord::new(brand, category, url)
}

#[test]
fn brand_names_are_trimmed_and_uppercased() {
    assert_eq!(canonical_brand("  Gucci "), "GUCCI");
    assert_eq!(canonical_brand("Levi's"), "LEVI'S");

    let catalog = CatalogIndex::from_records(
        &[PriceRecord::new(" gucci", 1200.0)],
        &[image("GUCCI ", "bags", "https://img/1")],
        WeightingPolicy::Subcategory,
    );
    assert!(catalog.contains("GUCCI"));
    assert_eq!(catalog.len(), 1);
}

#[test]
fn only_brands_in_both_tables_are_available() {
    let prices = vec![
        PriceRecord::new("Gucci", 1200.0),
        PriceRecord::new("Prada", 1100.0),
    ];
    let images = vec![
        image("Gucci", "bags", "https://img/g1"),
        image("Nike", "shoes", "https://img/n1"),
    ];
    let catalog = CatalogIndex::from_records(&prices, &images, WeightingPolicy::Subcategory);

    let names: Vec<&str> = catalog.brand_names().collect();
    assert_eq!(names, vec!["GUCCI"]);
    assert!(matches!(
        catalog.entry("PRADA"),
        Err(CatalogError::UnknownBrand(_))
    ));

    let stats = catalog.stats();
    assert_eq!(stats.priced_brands, 2);
    assert_eq!(stats.imaged_brands, 2);
    assert_eq!(stats.available_brands, 1);
}

#[test]
fn later_price_rows_win() {
    let prices = vec![
        PriceRecord::new("Gucci", 1000.0),
        PriceRecord::new("GUCCI", 1500.0),
    ];
    let images = vec![image("Gucci", "bags", "https://img/g1")];
    let catalog = CatalogIndex::from_records(&prices, &images, WeightingPolicy::Subcategory);
    assert_eq!(catalog.get("GUCCI").unwrap().average_price, 1500.0);
}

#[test]
fn unusable_rows_are_dropped_and_counted() {
    let prices = vec![
        PriceRecord {
            brand: "Gucci".to_string(),
            average_price: None,
        },
        PriceRecord::new("Prada", f64::NAN),
        PriceRecord::new("Nike", 90.0),
    ];
    let images = vec![
        ImageRecord {
            brand: "Nike".to_string(),
            category: Some("shoes".to_string()),
            url: None,
        },
        ImageRecord {
            brand: "Nike".to_string(),
            category: Some("shoes".to_string()),
            url: Some("   ".to_string()),
        },
        image("Nike", "shoes", "https://img/n1"),
        image("Gucci", "bags", "https://img/g1"),
    ];
    let catalog = CatalogIndex::from_records(&prices, &images, WeightingPolicy::Subcategory);

    let stats = catalog.stats();
    assert_eq!(stats.dropped_price_rows, 2);
    assert_eq!(stats.dropped_image_rows, 2);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.get("NIKE").unwrap().images.len(), 1);
}

#[test]
fn subcategory_weights_follow_category_sizes() {
    let images = vec![
        image("Nike", "shoes", "https://img/s1"),
        image("Nike", "shoes", "https://img/s2"),
        image("Nike", "shoes", "https://img/s3"),
        image("Nike", "tees", "https://img/t1"),
        ImageRecord {
            brand: "Nike".to_string(),
            category: None,
            url: Some("https://img/u1".to_string()),
        },
        ImageRecord {
            brand: "Nike".to_string(),
            category: Some(String::new()),
            url: Some("https://img/u2".to_string()),
        },
    ];
    let catalog = CatalogIndex::from_records(
        &[PriceRecord::new("Nike", 90.0)],
        &images,
        WeightingPolicy::Subcategory,
    );
    let pool = &catalog.get("NIKE").unwrap().images;
    let weights: Vec<(&str, f64)> = pool
        .entries()
        .iter()
        .map(|e| (e.url.as_str(), e.weight))
        .collect();
    assert_eq!(
        weights,
        vec![
            ("https://img/s1", 3.0),
            ("https://img/s2", 3.0),
            ("https://img/s3", 3.0),
            ("https://img/t1", 1.0),
            ("https://img/u1", 2.0),
            ("https://img/u2", 2.0),
        ]
    );
    assert_eq!(UNCATEGORIZED, "(uncategorized)");
}

#[test]
fn uniform_policy_deduplicates_urls() {
    let images = vec![
        image("Nike", "shoes", "https://img/s1"),
        image("Nike", "shoes", "https://img/s1"),
        image("Nike", "tees", "https://img/t1"),
    ];
    let catalog = CatalogIndex::from_records(
        &[PriceRecord::new("Nike", 90.0)],
        &images,
        WeightingPolicy::Uniform,
    );
    assert_eq!(catalog.policy(), WeightingPolicy::Uniform);
    let pool = &catalog.get("NIKE").unwrap().images;
    assert_eq!(pool.len(), 2);
    assert!(pool.entries().iter().all(|e| e.weight == 1.0));
}

#[test]
fn display_price_rounds_to_whole_units() {
    let catalog = CatalogIndex::from_records(
        &[
            PriceRecord::new("A", 10.4),
            PriceRecord::new("B", 10.5),
            PriceRecord::new("C", 10.6),
        ],
        &[
            image("A", "x", "https://img/a"),
            image("B", "x", "https://img/b"),
            image("C", "x", "https://img/c"),
        ],
        WeightingPolicy::Subcategory,
    );
    let prices: Vec<i64> = catalog.entries().map(|e| e.display_price()).collect();
    assert_eq!(prices, vec![10, 11, 11]);
}

#[test]
fn loads_tables_from_csv_files() {
    let dir = tempdir().unwrap();
    let prices = dir.path().join("prices.csv");
    let images = dir.path().join("images.csv");
    fs::write(
        &prices,
        "Brand,Average Price\n\
         Gucci,\"$1,250.50\"\n\
         Nike,95\n\
         Prada,n/a\n\
         Supreme,\n",
    )
    .unwrap();
    fs::write(
        &images,
        "Brand,Category 2,Product image URL\n\
         gucci,bags,https://img/g1\n\
         Gucci,bags,https://img/g2\n\
         Nike,shoes,https://img/n1\n\
         Nike,shoes,\n\
         Prada,bags,https://img/p1\n",
    )
    .unwrap();

    let parsed = read_price_table(&prices).unwrap();
    assert_eq!(parsed.len(), 4);
    assert_eq!(parsed[0].average_price, Some(1250.5));
    assert_eq!(parsed[2].average_price, None);
    assert_eq!(parsed[3].average_price, None);

    let catalog = load_catalog(&prices, &images, WeightingPolicy::Subcategory).unwrap();
    let names: Vec<&str> = catalog.brand_names().collect();
    assert_eq!(names, vec!["GUCCI", "NIKE"]);
    assert_eq!(catalog.get("GUCCI").unwrap().display_price(), 1251);
    assert_eq!(catalog.get("GUCCI").unwrap().images.len(), 2);
    assert_eq!(catalog.stats().dropped_image_rows, 1);
    assert_eq!(catalog.stats().dropped_price_rows, 2);
}

#[test]
fn missing_table_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = load_catalog(
        dir.path().join("nope.csv"),
        dir.path().join("nope2.csv"),
        WeightingPolicy::Subcategory,
    )
    .unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }));
}

#[test]
fn cluster_pools_skip_brands_outside_the_catalog() {
    let catalog = CatalogIndex::from_records(
        &[PriceRecord::new("Gucci", 1.0), PriceRecord::new("Nike", 1.0)],
        &[
            image("Gucci", "x", "https://img/g"),
            image("Nike", "x", "https://img/n"),
        ],
        WeightingPolicy::Subcategory,
    );
    let clusters = ClusterMap::from_pairs([("gucci", 1), ("Prada", 1), ("NIKE", 2), ("Vans", 3)]);
    let pools = clusters.eligible_pools(&catalog);
    assert_eq!(pools.len(), 2);
    assert_eq!(pools[&1], vec!["GUCCI".to_string()]);
    assert_eq!(pools[&2], vec!["NIKE".to_string()]);
    assert_eq!(clusters.cluster_of("PRADA"), Some(1));
}

#[test]
fn default_clusters_resolve_duplicate_assignments_to_the_last_entry() {
    let clusters = ClusterMap::fashion_default();
    assert!(!clusters.is_empty());
    assert_eq!(clusters.cluster_of("CALVIN KLEIN JEANS"), Some(7));
    assert_eq!(clusters.cluster_of("POLO RALPH LAUREN"), Some(7));
}

#[test]
fn cluster_map_loads_from_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clusters.json");
    fs::write(&path, r#"{"gucci": 1, " Nike ": 2}"#).unwrap();
    let clusters = ClusterMap::load_from_path(&path).unwrap();
    assert_eq!(clusters.cluster_of("GUCCI"), Some(1));
    assert_eq!(clusters.cluster_of("NIKE"), Some(2));
    assert_eq!(clusters.cluster_ids().len(), 2);

    fs::write(&path, r#"{"  ": 1}"#).unwrap();
    assert!(ClusterMap::load_from_path(&path).is_err());
}
