use crate::diversify::{diversify_mmr_around, get_diversity_stats, DiversifyOptions, DiversityStats};
use crate::traits::IndexWriter;
use crate::types::{ClassifiedProduct, ClassifierError, Result};
use crate::utils::text;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Relevance added per boost keyword found in a product's search text.
pub const BOOST_KEYWORD_WEIGHT: f64 = 0.1;
/// Relevance added for a preferred merchant.
pub const PREFERRED_MERCHANT_WEIGHT: f64 = 0.2;
/// Delivery promise, in days, that counts as fast.
pub const FAST_DELIVERY_DAYS: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageFilters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// A product must match at least one of these when any are given.
    pub keywords: Vec<String>,
    pub boost_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub exclude_merchants: Vec<String>,
    pub preferred_merchants: Vec<String>,
    pub max_results: Option<usize>,
    pub in_stock_only: bool,
    pub fast_delivery: bool,
    /// Only products carrying the `sustainable` interest.
    pub eco: bool,
}

/// Product pinned to the top of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorPick {
    /// GTIN, MPN, SKU or product id.
    pub sku: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One programmatic landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub intro: String,
    /// Accepted audience values; empty accepts all.
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub interest: Option<String>,
    #[serde(default)]
    pub filters: PageFilters,
    #[serde(default)]
    pub editor_picks: Vec<EditorPick>,
    #[serde(default)]
    pub diversify: Option<DiversifyOptions>,
}

impl PageConfig {
    pub fn validate(&self) -> Result<()> {
        let slug_ok = !self.slug.is_empty()
            && self
                .slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !slug_ok {
            return Err(ClassifierError::InvalidConfig(format!(
                "page slug '{}' must be non-empty ASCII letters, digits, '-' or '_'",
                self.slug
            )));
        }
        if let Some(options) = &self.diversify {
            options.validate()?;
        }
        Ok(())
    }

    /// Load a JSON array of page configs and validate each one.
    pub async fn load_all(path: impl AsRef<Path>) -> Result<Vec<PageConfig>> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let pages: Vec<PageConfig> = serde_json::from_str(&raw)?;
        let mut seen = HashSet::new();
        for page in &pages {
            page.validate()?;
            if !seen.insert(page.slug.as_str()) {
                return Err(ClassifierError::InvalidConfig(format!("duplicate page slug '{}'", page.slug)));
            }
        }
        info!("Loaded {} page configs from {}", pages.len(), path.display());
        Ok(pages)
    }

    /// Whether a product belongs on this page at all.
    pub fn accepts(&self, item: &ClassifiedProduct) -> bool {
        let product = &item.product;
        let facets = &item.facets;
        let filters = &self.filters;

        if filters.in_stock_only && !product.in_stock {
            return false;
        }
        if filters.fast_delivery && !product.delivery_days.is_some_and(|d| d <= FAST_DELIVERY_DAYS) {
            return false;
        }
        if filters.eco && !facets.interests.iter().any(|i| i == "sustainable") {
            return false;
        }
        if filters.min_price.is_some() || filters.max_price.is_some() {
            let Some(price) = product.price else {
                return false;
            };
            if filters.min_price.is_some_and(|min| price < min) || filters.max_price.is_some_and(|max| price > max) {
                return false;
            }
        }
        if !self.audience.is_empty() && !self.audience.contains(&facets.audience) {
            return false;
        }
        if self.category.as_ref().is_some_and(|c| *c != facets.category) {
            return false;
        }
        if self.occasion.as_ref().is_some_and(|o| !facets.occasions.contains(o)) {
            return false;
        }
        if self.interest.as_ref().is_some_and(|i| !facets.interests.contains(i)) {
            return false;
        }
        if !filters.keywords.is_empty() && !text::contains_any(&item.search_text, &filters.keywords) {
            return false;
        }
        if text::contains_any(&item.search_text, &filters.exclude_keywords) {
            return false;
        }
        !merchant_listed(item, &filters.exclude_merchants)
    }

    /// Page-specific bonus on top of the base relevance.
    pub fn boost(&self, item: &ClassifiedProduct) -> f64 {
        let filters = &self.filters;
        let keyword_hits = text::count_matches(&item.search_text, &filters.boost_keywords);
        let mut boost = keyword_hits as f64 * BOOST_KEYWORD_WEIGHT;
        if merchant_listed(item, &filters.preferred_merchants) {
            boost += PREFERRED_MERCHANT_WEIGHT;
        }
        boost
    }
}

fn merchant_listed(item: &ClassifiedProduct, merchants: &[String]) -> bool {
    let Some(merchant) = item.product.merchant.as_deref() else {
        return false;
    };
    merchants.iter().any(|m| m.trim().eq_ignore_ascii_case(merchant.trim()))
}

/// Identity of one pipeline run, stamped on every index it writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl RunInfo {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
        }
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFilters {
    pub audience: Vec<String>,
    pub category: Option<String>,
    pub occasion: Option<String>,
    pub interest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub title: String,
    pub description: String,
    pub filters: IndexFilters,
    pub total_products: usize,
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(flatten)]
    pub diversity: DiversityStats,
    /// Products that passed the page filters.
    pub candidates: usize,
    pub average_price: Option<f64>,
    pub price_range: Option<(f64, f64)>,
}

/// Everything a landing page renders, written once per page per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgrammaticIndex {
    pub route_key: String,
    pub metadata: IndexMetadata,
    pub featured: Vec<ClassifiedProduct>,
    pub products: Vec<ClassifiedProduct>,
    pub stats: IndexStats,
}

impl ProgrammaticIndex {
    /// Featured products first, then the diversified selection.
    pub fn all_products(&self) -> impl Iterator<Item = &ClassifiedProduct> {
        self.featured.iter().chain(self.products.iter())
    }
}

fn pull_editor_picks(page: &PageConfig, pool: &[ClassifiedProduct]) -> Vec<ClassifiedProduct> {
    let mut featured: Vec<ClassifiedProduct> = Vec::new();
    for pick in &page.editor_picks {
        let wanted = pick.sku.trim().to_lowercase();
        let found = pool.iter().find(|item| {
            item.product
                .identifiers()
                .iter()
                .any(|id| id.trim().to_lowercase() == wanted)
        });
        match found {
            Some(item) if !featured.iter().any(|f| f.product.id == item.product.id) => featured.push(item.clone()),
            Some(_) => {}
            None => warn!("Editor pick '{}' for page {} is not in the pool", pick.sku, page.slug),
        }
    }
    featured
}

fn price_summary(items: &[ClassifiedProduct]) -> (Option<f64>, Option<(f64, f64)>) {
    let prices: Vec<f64> = items.iter().filter_map(|i| i.product.price).collect();
    if prices.is_empty() {
        return (None, None);
    }
    let average = prices.iter().sum::<f64>() / prices.len() as f64;
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (Some(average), Some((min, max)))
}

/// Filter the deduplicated pool down to one page, pin editor picks and fill
/// the rest with an MMR selection.
pub fn build_index(page: &PageConfig, pool: &[ClassifiedProduct], run: &RunInfo) -> Result<ProgrammaticIndex> {
    page.validate()?;

    let featured = pull_editor_picks(page, pool);
    let featured_ids: HashSet<&str> = featured.iter().map(|f| f.product.id.as_str()).collect();
    let candidates: Vec<ClassifiedProduct> = pool
        .iter()
        .filter(|item| !featured_ids.contains(item.product.id.as_str()) && page.accepts(item))
        .cloned()
        .collect();
    let candidate_count = candidates.len();
    debug!("Page {}: {} candidates, {} editor picks", page.slug, candidate_count, featured.len());

    let mut options = page.diversify.clone().unwrap_or_default();
    if let Some(max_results) = page.filters.max_results {
        options.target_size = max_results;
    }
    options.target_size = options.target_size.saturating_sub(featured.len());

    let base = options.relevance;
    let products = diversify_mmr_around(candidates, &featured, &options, |item| base.score(item) + page.boost(item))?;

    let shown: Vec<ClassifiedProduct> = featured.iter().chain(products.iter()).cloned().collect();
    let (average_price, price_range) = price_summary(&shown);
    let stats = IndexStats {
        diversity: get_diversity_stats(&shown),
        candidates: candidate_count,
        average_price,
        price_range,
    };

    if shown.is_empty() {
        warn!("Page {} has no matching products", page.slug);
    }
    info!(
        "Built index for {}: {} featured, {} selected from {} candidates",
        page.slug,
        featured.len(),
        products.len(),
        candidate_count
    );

    Ok(ProgrammaticIndex {
        route_key: page.slug.clone(),
        metadata: IndexMetadata {
            title: page.title.clone(),
            description: page.intro.clone(),
            filters: IndexFilters {
                audience: page.audience.clone(),
                category: page.category.clone(),
                occasion: page.occasion.clone(),
                interest: page.interest.clone(),
            },
            total_products: shown.len(),
            generated_at: run.generated_at,
            run_id: run.run_id,
        },
        featured,
        products,
        stats,
    })
}

/// Writes `<out_dir>/<route_key>.json`, pretty-printed.
#[derive(Debug, Clone)]
pub struct JsonFileWriter {
    out_dir: PathBuf,
}

impl JsonFileWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn path_for(&self, route_key: &str) -> PathBuf {
        self.out_dir.join(format!("{}.json", route_key))
    }
}

impl IndexWriter for JsonFileWriter {
    async fn write_index(&self, index: &ProgrammaticIndex) -> Result<String> {
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let path = self.path_for(&index.route_key);
        let json = serde_json::to_string_pretty(index)?;

        // Stage then rename over the previous artifact
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &path).await?;

        debug!("Wrote {} ({} products)", path.display(), index.metadata.total_products);
        Ok(path.display().to_string())
    }
}
