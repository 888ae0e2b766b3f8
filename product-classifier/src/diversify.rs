use crate::types::{ClassifiedProduct, ClassifierError, PriceBucket, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Facet compared when measuring how alike two products are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacetDimension {
    Category,
    Audience,
    PriceBucket,
    Brand,
    Merchant,
}

impl FacetDimension {
    fn value(&self, item: &ClassifiedProduct) -> String {
        match self {
            FacetDimension::Category => item.facets.category.clone(),
            FacetDimension::Audience => item.facets.audience.clone(),
            FacetDimension::PriceBucket => item.facets.price_bucket.to_string(),
            FacetDimension::Brand => item.product.brand_key(),
            FacetDimension::Merchant => item.product.merchant.clone().unwrap_or_default().to_lowercase(),
        }
    }
}

/// Built-in relevance functions for MMR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelevanceScore {
    Confidence,
    InversePrice,
    Uniform,
}

impl RelevanceScore {
    pub fn score(&self, item: &ClassifiedProduct) -> f64 {
        match self {
            RelevanceScore::Confidence => item.facets.confidence,
            // 1.0 for free, 0.5 at 100 EUR, unpriced items last
            RelevanceScore::InversePrice => item.product.price.map_or(0.0, |p| 1.0 / (1.0 + p / 100.0)),
            RelevanceScore::Uniform => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiversifyOptions {
    pub target_size: usize,
    /// Relevance weight; `1 - lambda` weighs novelty.
    pub lambda: f64,
    pub dimensions: Vec<FacetDimension>,
    pub relevance: RelevanceScore,
    /// Brandless products all share the brand key `unknown`, so this also
    /// caps how many brandless products one selection holds.
    pub max_per_brand: usize,
    pub max_per_category: usize,
    pub max_per_price_bucket: usize,
    pub min_different_brands: usize,
    pub min_different_categories: usize,
    /// Largest share of an MMR selection one `(category, audience, priceBucket)`
    /// combination may take. A combination may always contribute one item.
    pub max_combination_share: f64,
}

impl Default for DiversifyOptions {
    fn default() -> Self {
        Self {
            target_size: 24,
            lambda: 0.7,
            dimensions: vec![
                FacetDimension::Category,
                FacetDimension::Audience,
                FacetDimension::PriceBucket,
            ],
            relevance: RelevanceScore::Confidence,
            max_per_brand: 2,
            max_per_category: 6,
            max_per_price_bucket: 8,
            min_different_brands: 8,
            min_different_categories: 4,
            max_combination_share: 0.25,
        }
    }
}

impl DiversifyOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(ClassifierError::InvalidOptions(format!(
                "lambda {} is outside 0..=1",
                self.lambda
            )));
        }
        if !(self.max_combination_share > 0.0 && self.max_combination_share <= 1.0) {
            return Err(ClassifierError::InvalidOptions(format!(
                "max combination share {} is outside (0, 1]",
                self.max_combination_share
            )));
        }
        Ok(())
    }

    /// Most items one combination may contribute to a full selection.
    pub fn combination_cap(&self) -> usize {
        self.combination_cap_for(self.target_size)
    }

    /// Most items one combination may contribute to a selection of `shown`
    /// items; always at least one.
    pub fn combination_cap_for(&self, shown: usize) -> usize {
        ((self.max_combination_share * shown as f64).floor() as usize).max(1)
    }
}

/// Share of the considered dimensions on which two products agree.
pub fn similarity(a: &ClassifiedProduct, b: &ClassifiedProduct, dimensions: &[FacetDimension]) -> f64 {
    if dimensions.is_empty() {
        return 0.0;
    }
    let equal = dimensions
        .iter()
        .filter(|d| d.value(a) == d.value(b))
        .count();
    equal as f64 / dimensions.len() as f64
}

fn is_mid_range(item: &ClassifiedProduct) -> bool {
    item.product.price.is_some_and(|p| (25.0..=100.0).contains(&p))
}

/// Greedy cap-based selection: confident, mid-range products first, each
/// accepted while brand, category and price bucket caps allow it and it
/// still adds variety.
pub fn diversify(products: Vec<ClassifiedProduct>, options: &DiversifyOptions) -> Vec<ClassifiedProduct> {
    let total = products.len();
    let mut sorted = products;
    sorted.sort_by(|a, b| {
        b.facets
            .confidence
            .total_cmp(&a.facets.confidence)
            .then_with(|| is_mid_range(b).cmp(&is_mid_range(a)))
    });

    let mut selected = Vec::new();
    let mut brands: HashMap<String, usize> = HashMap::new();
    let mut categories: HashMap<String, usize> = HashMap::new();
    let mut buckets: HashMap<PriceBucket, usize> = HashMap::new();

    for item in sorted {
        if selected.len() >= options.target_size {
            break;
        }
        let brand = item.product.brand_key();
        let brand_count = brands.get(&brand).copied().unwrap_or(0);
        let category_count = categories.get(&item.facets.category).copied().unwrap_or(0);
        let bucket_count = buckets.get(&item.facets.price_bucket).copied().unwrap_or(0);

        if brand_count >= options.max_per_brand
            || category_count >= options.max_per_category
            || bucket_count >= options.max_per_price_bucket
        {
            continue;
        }

        let novelty = 1.0 - 0.3 * brand_count as f64 - 0.2 * category_count as f64
            + if bucket_count == 0 { 0.3 } else { 0.0 };
        let need_brands = brands.len() < options.min_different_brands;
        let need_categories = categories.len() < options.min_different_categories;

        if novelty >= 0.5 || need_brands || need_categories {
            *brands.entry(brand).or_insert(0) += 1;
            *categories.entry(item.facets.category.clone()).or_insert(0) += 1;
            *buckets.entry(item.facets.price_bucket).or_insert(0) += 1;
            selected.push(item);
        }
    }

    info!(
        "Diversified {} -> {} products ({} brands, {} categories)",
        total,
        selected.len(),
        brands.len(),
        categories.len()
    );
    selected
}

/// MMR selection with the relevance function named in `options`.
pub fn diversify_mmr(products: Vec<ClassifiedProduct>, options: &DiversifyOptions) -> Result<Vec<ClassifiedProduct>> {
    let relevance = options.relevance;
    diversify_mmr_by(products, options, |item| relevance.score(item))
}

/// Maximal marginal relevance: repeatedly take the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max similarity to the selection`.
///
/// Ties go to the earlier candidate. Brand and category caps apply, and no
/// `(category, audience, priceBucket)` combination takes more than
/// `max_combination_share` of the returned selection.
pub fn diversify_mmr_by<F>(
    products: Vec<ClassifiedProduct>,
    options: &DiversifyOptions,
    relevance: F,
) -> Result<Vec<ClassifiedProduct>>
where
    F: Fn(&ClassifiedProduct) -> f64,
{
    diversify_mmr_around(products, &[], options, relevance)
}

/// MMR selection filling up a page that already shows `pinned`. Pinned items
/// are not returned, but they count toward every cap and the similarity
/// penalty, and the combination share is measured over pinned plus selected.
pub fn diversify_mmr_around<F>(
    products: Vec<ClassifiedProduct>,
    pinned: &[ClassifiedProduct],
    options: &DiversifyOptions,
    relevance: F,
) -> Result<Vec<ClassifiedProduct>>
where
    F: Fn(&ClassifiedProduct) -> f64,
{
    options.validate()?;
    let total = products.len();
    let scores: Vec<f64> = products.iter().map(&relevance).collect();

    // Share is of the page actually shown; reselect until the cap fits it
    let mut cap = options.combination_cap_for(options.target_size + pinned.len());
    let order = loop {
        let order = mmr_order(&products, &scores, pinned, options, cap);
        let fitted = options.combination_cap_for(pinned.len() + order.len());
        if fitted >= cap {
            break order;
        }
        debug!(
            "MMR selected {} items; combination cap {} -> {}",
            order.len(),
            cap,
            fitted
        );
        cap = fitted;
    };

    let mut slots: Vec<Option<ClassifiedProduct>> = products.into_iter().map(Some).collect();
    let selected: Vec<ClassifiedProduct> = order.into_iter().filter_map(|idx| slots[idx].take()).collect();

    info!("MMR diversified {} -> {} products", total, selected.len());
    Ok(selected)
}

/// One MMR pass with a fixed combination cap; returns indices in pick order.
fn mmr_order(
    products: &[ClassifiedProduct],
    scores: &[f64],
    pinned: &[ClassifiedProduct],
    options: &DiversifyOptions,
    combination_cap: usize,
) -> Vec<usize> {
    let lambda = options.lambda;
    let mut max_similarity = vec![0.0_f64; products.len()];
    let mut taken = vec![false; products.len()];
    let mut order: Vec<usize> = Vec::with_capacity(options.target_size.min(products.len()));

    let mut tally = Tally::default();
    for pick in pinned {
        tally.add(pick);
        raise_similarity(products, &taken, pick, &options.dimensions, &mut max_similarity);
    }

    while order.len() < options.target_size {
        let mut best: Option<(usize, f64)> = None;
        for (idx, item) in products.iter().enumerate() {
            if taken[idx] {
                continue;
            }
            if tally.is_capped(item, options, combination_cap) {
                continue;
            }

            let score = lambda * scores[idx] - (1.0 - lambda) * max_similarity[idx];
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        let Some((chosen, score)) = best else {
            debug!("MMR stopped early: every remaining candidate is capped");
            break;
        };
        debug!("MMR pick #{}: {} (score {:.3})", order.len() + 1, products[chosen].product.id, score);

        taken[chosen] = true;
        order.push(chosen);
        tally.add(&products[chosen]);
        raise_similarity(products, &taken, &products[chosen], &options.dimensions, &mut max_similarity);
    }
    order
}

/// Per-facet counts of what a page already shows.
#[derive(Default)]
struct Tally {
    brands: HashMap<String, usize>,
    categories: HashMap<String, usize>,
    combinations: HashMap<(String, String, PriceBucket), usize>,
}

impl Tally {
    fn add(&mut self, item: &ClassifiedProduct) {
        *self.brands.entry(item.product.brand_key()).or_insert(0) += 1;
        *self.categories.entry(item.facets.category.clone()).or_insert(0) += 1;
        *self.combinations.entry(item.combination()).or_insert(0) += 1;
    }

    fn is_capped(&self, item: &ClassifiedProduct, options: &DiversifyOptions, combination_cap: usize) -> bool {
        self.brands.get(&item.product.brand_key()).copied().unwrap_or(0) >= options.max_per_brand
            || self.categories.get(&item.facets.category).copied().unwrap_or(0) >= options.max_per_category
            || self.combinations.get(&item.combination()).copied().unwrap_or(0) >= combination_cap
    }
}

fn raise_similarity(
    products: &[ClassifiedProduct],
    taken: &[bool],
    pick: &ClassifiedProduct,
    dimensions: &[FacetDimension],
    max_similarity: &mut [f64],
) {
    for (idx, item) in products.iter().enumerate() {
        if !taken[idx] {
            let sim = similarity(item, pick, dimensions);
            if sim > max_similarity[idx] {
                max_similarity[idx] = sim;
            }
        }
    }
}

/// Facet distributions of a selection, for validating a page after the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiversityStats {
    pub total_products: usize,
    pub unique_brands: usize,
    pub unique_categories: usize,
    pub unique_combinations: usize,
    pub brand_distribution: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    pub audience_distribution: BTreeMap<String, usize>,
    pub price_bucket_distribution: BTreeMap<String, usize>,
    /// Keyed `category|audience|priceBucket`.
    pub combination_distribution: BTreeMap<String, usize>,
    /// Share of the selection held by its most common combination.
    pub max_combination_share: f64,
    pub average_confidence: f64,
}

pub fn get_diversity_stats(selection: &[ClassifiedProduct]) -> DiversityStats {
    let mut stats = DiversityStats {
        total_products: selection.len(),
        ..DiversityStats::default()
    };
    if selection.is_empty() {
        return stats;
    }

    let mut confidence = 0.0;
    for item in selection {
        *stats.brand_distribution.entry(item.product.brand_key()).or_insert(0) += 1;
        *stats.category_distribution.entry(item.facets.category.clone()).or_insert(0) += 1;
        *stats.audience_distribution.entry(item.facets.audience.clone()).or_insert(0) += 1;
        *stats
            .price_bucket_distribution
            .entry(item.facets.price_bucket.to_string())
            .or_insert(0) += 1;
        let (category, audience, bucket) = item.combination();
        *stats
            .combination_distribution
            .entry(format!("{}|{}|{}", category, audience, bucket))
            .or_insert(0) += 1;
        confidence += item.facets.confidence;
    }

    let largest = stats.combination_distribution.values().copied().max().unwrap_or(0);
    stats.unique_brands = stats.brand_distribution.len();
    stats.unique_categories = stats.category_distribution.len();
    stats.unique_combinations = stats.combination_distribution.len();
    stats.max_combination_share = largest as f64 / selection.len() as f64;
    stats.average_confidence = confidence / selection.len() as f64;
    stats
}
