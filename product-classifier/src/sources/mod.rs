pub mod amazon;
pub mod awin;
pub mod bol;
pub mod coolblue;
pub mod manual;

pub use amazon::{normalize_amazon, AmazonAdapter};
pub use awin::{normalize_awin, AwinAdapter};
pub use bol::{normalize_bol, BolAdapter};
pub use coolblue::{normalize_coolblue, CoolblueAdapter};
pub use manual::{normalize_manual, ManualAdapter};

use crate::traits::FeedAdapter;
use crate::types::{DropReason, FeedSource, Product, RawFeedRow, CURRENCY};
use crate::utils::{fields, price, text, url};
use serde_json::Value;

/// Adapter for a feed source.
pub fn adapter_for(source: FeedSource) -> Box<dyn FeedAdapter> {
    match source {
        FeedSource::Awin => Box::new(AwinAdapter),
        FeedSource::Coolblue => Box::new(CoolblueAdapter),
        FeedSource::Bol => Box::new(BolAdapter),
        FeedSource::Amazon => Box::new(AmazonAdapter),
        FeedSource::Manual => Box::new(ManualAdapter),
    }
}

/// Fields collected by an adapter before the mandatory-field checks run.
#[derive(Debug, Clone)]
pub(crate) struct ProductDraft {
    pub source: FeedSource,
    pub merchant_id: String,
    pub product_id: Option<String>,
    pub merchant: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub images: Vec<String>,
    pub affiliate_url: Option<String>,
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub google_product_category: Option<String>,
    pub gtin: Option<String>,
    pub mpn: Option<String>,
    pub sku: Option<String>,
    pub in_stock: bool,
    pub delivery_days: Option<u32>,
    pub suitable_for: Option<String>,
}

impl ProductDraft {
    pub fn new(source: FeedSource, merchant_id: impl Into<String>) -> Self {
        Self {
            source,
            merchant_id: merchant_id.into(),
            product_id: None,
            merchant: None,
            title: None,
            description: None,
            brand: None,
            price: None,
            original_price: None,
            images: Vec::new(),
            affiliate_url: None,
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

    /// Enforce the mandatory fields and assemble the product.
    pub fn finish(self) -> Result<Product, DropReason> {
        let title = text::clean_text(self.title.as_deref()).ok_or(DropReason::MissingTitle)?;
        let affiliate_url = self
            .affiliate_url
            .map(|u| u.trim().to_string())
            .filter(|u| url::is_resolvable(u))
            .ok_or(DropReason::MissingUrl)?;

        let product_id = self
            .product_id
            .clone()
            .or_else(|| self.sku.clone())
            .or_else(|| self.gtin.clone())
            .unwrap_or_else(|| slug(&title));

        let mut images = Vec::new();
        for image in self.images {
            if !images.contains(&image) {
                images.push(image);
            }
        }

        Ok(Product {
            id: generate_id(self.source, &self.merchant_id, &product_id),
            source: self.source,
            merchant: self.merchant,
            title,
            description: self.description,
            brand: self.brand,
            price: self.price,
            currency: CURRENCY.to_string(),
            original_price: self.original_price,
            image_url: images.first().cloned(),
            images,
            affiliate_url,
            category: self.category,
            product_type: self.product_type,
            google_product_category: self.google_product_category,
            gtin: self.gtin.map(|g| g.replace(' ', "")),
            mpn: self.mpn,
            sku: self.sku,
            in_stock: self.in_stock,
            delivery_days: self.delivery_days,
            suitable_for: self.suitable_for,
        })
    }
}

/// Stable product id: `{source}:{merchant}:{productId}`.
pub fn generate_id(source: FeedSource, merchant_id: &str, product_id: &str) -> String {
    format!("{}:{}:{}", source, merchant_id.trim(), product_id.trim()).to_lowercase()
}

fn slug(title: &str) -> String {
    text::normalize_for_hash(title).replace(' ', "-")
}

/// Cleaned text of the first present column.
pub(crate) fn text_field(row: &RawFeedRow, keys: &[&str]) -> Option<String> {
    text::clean_text(fields::first(row, keys).as_deref())
}

/// First column holding a usable http(s) link, in key order.
pub(crate) fn link_field(row: &RawFeedRow, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields::lookup(row, key))
        .filter_map(fields::value_to_string)
        .find(|link| url::is_resolvable(link))
}

/// Description text with markup removed.
pub(crate) fn description_field(row: &RawFeedRow, keys: &[&str]) -> Option<String> {
    let raw = fields::first(row, keys)?;
    text::clean_text(Some(text::strip_html(&raw).as_ref()))
}

/// Price from the first present column, or `None` when the row declares a
/// currency other than EUR.
pub(crate) fn eur_price(row: &RawFeedRow, currency_keys: &[&str], price_keys: &[&str]) -> Option<f64> {
    if let Some(currency) = fields::first(row, currency_keys) {
        if !currency.eq_ignore_ascii_case(CURRENCY) && currency != "€" {
            return None;
        }
    }
    fields::first_value(row, price_keys).and_then(price::parse_price)
}

/// All image URLs from the candidate columns, best resolution first.
pub(crate) fn collect_images(row: &RawFeedRow, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| fields::lookup(row, key))
        .flat_map(extract_images)
        .collect()
}

/// Image URLs from a single value: a URL, a delimited list of URLs, or an array.
pub fn extract_images(value: &Value) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Value::String(s) => split_url_list(s),
        Value::Array(items) => items
            .iter()
            .filter_map(fields::value_to_string)
            .collect(),
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .map(|u| fix_image_url(&u))
        .collect()
}

/// Split on `|` and `;` always, on `,` only where a new URL starts; CDN
/// transform URLs carry commas of their own.
fn split_url_list(list: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for chunk in list.split(|c| c == '|' || c == ';') {
        let mut current = String::new();
        for part in chunk.split(',') {
            let starts_url = part.trim_start().starts_with("http");
            if starts_url && !current.trim().is_empty() {
                urls.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(',');
            }
            current.push_str(part);
        }
        if !current.trim().is_empty() {
            urls.push(current);
        }
    }
    urls
}

/// Coolblue's Bynder CDN needs explicit dimensions for the transform to apply.
pub fn fix_image_url(image_url: &str) -> String {
    if image_url.contains("coolblue.bynder.com/transform")
        && image_url.contains("io=transform:fit")
        && !image_url.contains("w=")
        && !image_url.contains("width")
    {
        return image_url.replacen("io=transform:fit", "io=transform:fit,width:400,height:400", 1);
    }
    image_url.to_string()
}

/// Leading integer of a delivery-time column ("2-3 werkdagen" -> 2).
pub(crate) fn delivery_days(row: &RawFeedRow, keys: &[&str]) -> Option<u32> {
    let raw = fields::first(row, keys)?;
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
