use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
// Boundary types shared with the feed download tooling
pub use interfaces::defs::{FeedBatch, FeedReader, FeedSource, FeedSpec, RawFeedRow};

/// Brand placeholder used wherever a product has no brand.
pub const UNKNOWN_BRAND: &str = "unknown";

/// Currency every normalized price is expressed in.
pub const CURRENCY: &str = "EUR";

/// Unified, source-agnostic product record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// `{source}:{merchant}:{productId}`, lowercased.
    pub id: String,
    pub source: FeedSource,
    pub merchant: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub original_price: Option<f64>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub affiliate_url: String,
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub google_product_category: Option<String>,
    pub gtin: Option<String>,
    pub mpn: Option<String>,
    pub sku: Option<String>,
    pub in_stock: bool,
    pub delivery_days: Option<u32>,
    /// Source-supplied audience hint (AWIN `Fashion:suitable_for`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suitable_for: Option<String>,
}

impl Product {
    pub fn has_image(&self) -> bool {
        self.image_url.is_some() || !self.images.is_empty()
    }

    pub fn has_description(&self) -> bool {
        self.description.as_deref().map_or(false, |d| !d.is_empty())
    }

    /// Strong identifiers in lookup priority order.
    pub fn identifiers(&self) -> Vec<&str> {
        [self.gtin.as_deref(), self.mpn.as_deref(), self.sku.as_deref()]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.id.as_str()))
            .collect()
    }

    /// Lowercased brand, or `unknown`.
    pub fn brand_key(&self) -> String {
        self.brand
            .as_deref()
            .map(|b| b.trim().to_lowercase())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| UNKNOWN_BRAND.to_string())
    }
}

impl AsRef<Product> for Product {
    fn as_ref(&self) -> &Product {
        self
    }
}

/// Closed, ordered price ranges. Each bucket includes its lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceBucket {
    #[serde(rename = "under-25")]
    Under25,
    #[serde(rename = "25-50")]
    From25To50,
    #[serde(rename = "50-100")]
    From50To100,
    #[serde(rename = "over-100")]
    Over100,
    #[serde(rename = "unknown")]
    Unknown,
}

impl PriceBucket {
    pub const BOUNDARIES: [(f64, PriceBucket); 3] = [
        (25.0, PriceBucket::Under25),
        (50.0, PriceBucket::From25To50),
        (100.0, PriceBucket::From50To100),
    ];

    pub fn from_price(price: Option<f64>) -> Self {
        let Some(price) = price else {
            return PriceBucket::Unknown;
        };
        for (upper, bucket) in Self::BOUNDARIES {
            if price < upper {
                return bucket;
            }
        }
        PriceBucket::Over100
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceBucket::Under25 => "under-25",
            PriceBucket::From25To50 => "25-50",
            PriceBucket::From50To100 => "50-100",
            PriceBucket::Over100 => "over-100",
            PriceBucket::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub audience: String,
    pub category: String,
    pub price_bucket: PriceBucket,
    pub occasions: Vec<String>,
    pub interests: Vec<String>,
    /// 0.0..=1.0, averaged over the audience and category signals.
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub needs_review: bool,
    pub is_giftable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub facets: Facets,
    pub search_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_key: Option<String>,
}

impl ClassifiedProduct {
    /// The `(category, audience, priceBucket)` triple used for diversity checks.
    pub fn combination(&self) -> (String, String, PriceBucket) {
        (
            self.facets.category.clone(),
            self.facets.audience.clone(),
            self.facets.price_bucket,
        )
    }
}

impl AsRef<Product> for ClassifiedProduct {
    fn as_ref(&self) -> &Product {
        &self.product
    }
}

/// Per-run knobs for the source adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeContext {
    /// AWIN advertiser id; becomes the merchant segment of AWIN product ids.
    pub advertiser_id: Option<String>,
    /// Publisher id used to build AWIN deep links when a feed only has merchant URLs.
    pub awin_affiliate_id: Option<String>,
    /// Amazon associate tag used to build detail page links from an ASIN.
    pub amazon_tag: Option<String>,
}

/// Why a raw row never became a `Product`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropReason {
    MissingTitle,
    MissingUrl,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingTitle => f.write_str("missing title"),
            DropReason::MissingUrl => f.write_str("missing or unresolvable url"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub source: FeedSource,
    pub products: Vec<Product>,
    /// Rows dropped for missing mandatory fields.
    pub malformed: usize,
    pub drops: BTreeMap<DropReason, usize>,
}

impl NormalizedBatch {
    pub fn rows_seen(&self) -> usize {
        self.products.len() + self.malformed
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedBatch {
    pub products: Vec<ClassifiedProduct>,
    /// Products removed by exclusion rules or the configured price window.
    pub excluded: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Invalid classifier config: {0}")]
    InvalidConfig(String),

    #[error("Unknown {facet} value '{value}' referenced by {origin}")]
    UnknownFacetValue {
        facet: String,
        value: String,
        origin: String,
    },

    #[error("Brand alias cycle: {chain}")]
    CyclicBrandAlias { chain: String },

    #[error("Contradictory override for '{key}': {reason}")]
    ContradictoryOverride { key: String, reason: String },

    #[error("Invalid diversify options: {0}")]
    InvalidOptions(String),

    #[error("Unsupported feed format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Feed read error: {0}")]
    FeedRead(String),

    #[error("Dropped {dropped} of {rows} feed rows as malformed, above the allowed ratio {allowed}")]
    TooManyMalformed {
        dropped: usize,
        rows: usize,
        allowed: f64,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
