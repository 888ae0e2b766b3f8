#![allow(dead_code)]

use product_classifier::{
    classify, create_default_config, ClassifiedProduct, ClassifierConfig, FeedSource, Product,
    RawFeedRow, CURRENCY,
};
use serde_json::Value;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Feed row from string pairs, the way a CSV reader hands them over.
pub fn row(pairs: &[(&str, &str)]) -> RawFeedRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

/// Minimal valid product; tests adjust the fields they care about.
pub fn product(id: &str, title: &str, price: Option<f64>) -> Product {
    Product {
        id: id.to_string(),
        source: FeedSource::Manual,
        merchant: None,
        title: title.to_string(),
        description: None,
        brand: None,
        price,
        currency: CURRENCY.to_string(),
        original_price: None,
        image_url: None,
        images: Vec::new(),
        affiliate_url: format!("https://shop.example.com/p/{}", id.replace(':', "-")),
        category: None,
        product_type: None,
        google_product_category: None,
        gtin: None,
        mpn: None,
        sku: None,
        in_stock: true,
        delivery_days: None,
        suitable_for: None,
    }
}

pub fn branded(id: &str, brand: &str, title: &str, price: Option<f64>) -> Product {
    Product {
        brand: Some(brand.to_string()),
        ..product(id, title, price)
    }
}

pub fn default_config() -> ClassifierConfig {
    create_default_config()
        .prepare()
        .expect("default config is valid")
}

pub fn classified(product: Product) -> ClassifiedProduct {
    classify(product, &default_config())
}

/// Classified product with its facets set directly.
pub fn faceted(
    id: &str,
    brand: &str,
    category: &str,
    audience: &str,
    price: f64,
    confidence: f64,
) -> ClassifiedProduct {
    let mut item = classified(branded(id, brand, id, Some(price)));
    item.facets.category = category.to_string();
    item.facets.audience = audience.to_string();
    item.facets.confidence = confidence;
    item
}
