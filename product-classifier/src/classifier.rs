use crate::config::{ClassifierConfig, FacetOverride, FacetRules};
use crate::hash;
use crate::types::{ClassifiedBatch, ClassifiedProduct, Facets, PriceBucket, Product};
use crate::utils::text;
use tracing::{debug, info};

/// Description characters that take part in keyword matching.
pub const DESCRIPTION_EXCERPT_CHARS: usize = 200;

pub const OVERRIDE_CONFIDENCE: f64 = 1.0;
pub const SUITABLE_FOR_CONFIDENCE: f64 = 0.95;
pub const GPC_CONFIDENCE: f64 = 0.85;
pub const CATEGORY_PATH_CONFIDENCE: f64 = 0.75;
pub const TITLE_KEYWORD_CONFIDENCE: f64 = 0.9;
pub const TEXT_KEYWORD_CONFIDENCE: f64 = 0.6;
pub const AUDIENCE_FALLBACK_CONFIDENCE: f64 = 0.3;
pub const CATEGORY_FALLBACK_CONFIDENCE: f64 = 0.2;

/// Lowercased, diacritic-free text the keyword rules run against.
pub fn search_text(product: &Product) -> String {
    let description = product
        .description
        .as_deref()
        .map(|d| text::excerpt(d, DESCRIPTION_EXCERPT_CHARS));
    let parts = [
        Some(product.title.as_str()),
        product.brand.as_deref(),
        product.product_type.as_deref(),
        product.category.as_deref(),
        description,
    ];
    let joined = parts.into_iter().flatten().collect::<Vec<_>>().join(" ");
    text::normalize_text(&joined)
}

/// A resolved facet value and where it came from.
#[derive(Debug, Clone)]
struct Signal {
    value: String,
    confidence: f64,
    reason: String,
}

impl Signal {
    fn new(value: &str, confidence: f64, reason: String) -> Self {
        Self {
            value: value.to_string(),
            confidence,
            reason,
        }
    }
}

/// Overrides that apply to one product; identifier beats brand per field.
struct AppliedOverrides<'a> {
    identifier: Option<(String, &'a FacetOverride)>,
    brand: Option<(String, &'a FacetOverride)>,
}

impl<'a> AppliedOverrides<'a> {
    fn find(product: &Product, config: &'a ClassifierConfig) -> Self {
        let overrides = &config.overrides;
        let canonical_title = hash::canonical_title(&product.title);
        let identifier = product
            .identifiers()
            .into_iter()
            .chain(std::iter::once(canonical_title.as_str()))
            .find_map(|key| overrides.identifier_override(key).map(|o| (key.to_string(), o)));
        let brand = product.brand.as_deref().and_then(|brand| {
            overrides
                .brand_override(brand)
                .map(|o| (overrides.resolve_brand(brand), o))
        });
        Self { identifier, brand }
    }

    /// First override, identifier before brand, that sets this field.
    fn pick<T>(&self, field: impl Fn(&FacetOverride) -> Option<T>) -> Option<(T, String)> {
        let candidates = [
            self.identifier.as_ref().map(|(k, o)| (*o, format!("identifier override '{}'", k))),
            self.brand.as_ref().map(|(k, o)| (*o, format!("brand override '{}'", k))),
        ];
        candidates.into_iter().flatten().find_map(|(o, origin)| {
            field(o).map(|value| {
                let reason = match &o.reason {
                    Some(why) => format!("{}: {}", origin, why),
                    None => origin,
                };
                (value, reason)
            })
        })
    }
}

/// Keyword signal: a hit in the title alone is stronger than one elsewhere.
fn keyword_signal(facet: &str, rules: &FacetRules, title: &str, full_text: &str) -> Option<Signal> {
    if let Some((rule, keyword)) = rules.first_match(title) {
        return Some(Signal::new(
            &rule.value,
            TITLE_KEYWORD_CONFIDENCE,
            format!("{} keyword '{}' in title", facet, keyword),
        ));
    }
    rules.first_match(full_text).map(|(rule, keyword)| {
        Signal::new(
            &rule.value,
            TEXT_KEYWORD_CONFIDENCE,
            format!("{} keyword '{}' in text", facet, keyword),
        )
    })
}

fn fallback_signal(facet: &str, rules: &FacetRules, confidence: f64) -> Signal {
    Signal::new(&rules.fallback, confidence, format!("{} fallback", facet))
}

fn resolve_audience(
    product: &Product,
    overrides: &AppliedOverrides,
    config: &ClassifierConfig,
    title: &str,
    full_text: &str,
) -> Signal {
    let rules = &config.keywords.audience;
    if let Some((value, reason)) = overrides.pick(|o| o.audience.clone()) {
        return Signal::new(&value, OVERRIDE_CONFIDENCE, reason);
    }
    if let Some(hint) = product.suitable_for.as_deref() {
        let hint = text::normalize_text(hint);
        let value = if rules.allows(&hint) {
            Some(hint.clone())
        } else {
            rules.first_match(&hint).map(|(rule, _)| rule.value.clone())
        };
        if let Some(value) = value {
            return Signal::new(&value, SUITABLE_FOR_CONFIDENCE, format!("suitable_for '{}'", hint));
        }
    }
    keyword_signal("audience", rules, title, full_text)
        .unwrap_or_else(|| fallback_signal("audience", rules, AUDIENCE_FALLBACK_CONFIDENCE))
}

fn gpc_lookup<'a>(config: &'a ClassifierConfig, path: &str) -> Option<&'a str> {
    let path = path.to_lowercase();
    config
        .gpc_mapping
        .iter()
        .find(|rule| path.contains(&rule.path.to_lowercase()))
        .map(|rule| rule.category.as_str())
}

fn resolve_category(
    product: &Product,
    overrides: &AppliedOverrides,
    config: &ClassifierConfig,
    title: &str,
    full_text: &str,
) -> Signal {
    let rules = &config.keywords.category;
    if let Some((value, reason)) = overrides.pick(|o| o.category.clone()) {
        return Signal::new(&value, OVERRIDE_CONFIDENCE, reason);
    }
    if let Some(gpc) = product.google_product_category.as_deref() {
        if let Some(category) = gpc_lookup(config, gpc) {
            return Signal::new(category, GPC_CONFIDENCE, format!("GPC '{}'", gpc));
        }
    }
    if let Some(path) = product.category.as_deref() {
        if let Some(category) = gpc_lookup(config, path) {
            return Signal::new(category, CATEGORY_PATH_CONFIDENCE, format!("category path '{}'", path));
        }
    }
    keyword_signal("category", rules, title, full_text)
        .unwrap_or_else(|| fallback_signal("category", rules, CATEGORY_FALLBACK_CONFIDENCE))
}

/// Multi-valued facet: override list, else every matching rule, else the fallback.
fn resolve_multi(
    facet: &str,
    rules: &FacetRules,
    forced: Option<(Vec<String>, String)>,
    full_text: &str,
    reasons: &mut Vec<String>,
) -> Vec<String> {
    if let Some((values, reason)) = forced {
        if !values.is_empty() {
            reasons.push(reason);
            return values;
        }
    }
    let values = rules.all_matches(full_text);
    if values.is_empty() {
        vec![rules.fallback.clone()]
    } else {
        reasons.push(format!("{} keywords: {}", facet, values.join(", ")));
        values
    }
}

fn resolve_giftable(overrides: &AppliedOverrides, config: &ClassifierConfig, full_text: &str) -> bool {
    if let Some((giftable, _)) = overrides.pick(|o| o.is_giftable) {
        return giftable;
    }
    let keywords = &config.keywords;
    if text::contains_any(full_text, &keywords.not_giftable) {
        return false;
    }
    if text::contains_any(full_text, &keywords.force_giftable) {
        return true;
    }
    !text::contains_any(full_text, &keywords.exclude)
}

/// Assign every facet to one product. Never fails: unmatched facets take the
/// configured fallback.
pub fn classify(product: Product, config: &ClassifierConfig) -> ClassifiedProduct {
    let full_text = search_text(&product);
    let title = text::normalize_text(&product.title);
    let overrides = AppliedOverrides::find(&product, config);

    let audience = resolve_audience(&product, &overrides, config, &title, &full_text);
    let category = resolve_category(&product, &overrides, config, &title, &full_text);

    let mut reasons = vec![audience.reason.clone(), category.reason.clone()];
    let occasions = resolve_multi(
        "occasion",
        &config.keywords.occasion,
        overrides.pick(|o| o.occasions.clone()),
        &full_text,
        &mut reasons,
    );
    let interests = resolve_multi(
        "interest",
        &config.keywords.interest,
        overrides.pick(|o| o.interests.clone()),
        &full_text,
        &mut reasons,
    );

    let confidence = (audience.confidence + category.confidence) / 2.0;
    let facets = Facets {
        audience: audience.value,
        category: category.value,
        price_bucket: PriceBucket::from_price(product.price),
        occasions,
        interests,
        confidence,
        reasons,
        needs_review: confidence < config.confidence_threshold,
        is_giftable: resolve_giftable(&overrides, config, &full_text),
    };

    ClassifiedProduct {
        product,
        facets,
        search_text: full_text,
        canonical_key: None,
    }
}

/// Why a product is removed from the run, if it is.
pub fn exclusion_reason(item: &ClassifiedProduct, config: &ClassifierConfig) -> Option<String> {
    let product = &item.product;
    let overrides = &config.overrides;
    let identifiers = product.identifiers();

    if identifiers.iter().any(|id| overrides.is_force_included(id)) {
        return None;
    }
    if let Some(id) = identifiers.iter().find(|id| overrides.is_identifier_excluded(id)) {
        return Some(format!("excluded identifier '{}'", id));
    }
    if let Some(brand) = product.brand.as_deref() {
        if overrides.is_brand_excluded(brand) {
            return Some(format!("excluded brand '{}'", brand));
        }
    }
    if let Some(phrase) = overrides
        .exclude
        .contains
        .iter()
        .find(|phrase| text::contains_keyword(&item.search_text, phrase))
    {
        return Some(format!("excluded phrase '{}'", phrase));
    }
    if let Some(price) = product.price {
        if config.min_price.is_some_and(|min| price < min) || config.max_price.is_some_and(|max| price > max) {
            return Some(format!("price {:.2} outside configured window", price));
        }
    }
    None
}

/// Classify a whole normalized pool, dropping excluded products.
pub fn classify_batch(products: Vec<Product>, config: &ClassifierConfig) -> ClassifiedBatch {
    let total = products.len();
    let mut classified = Vec::with_capacity(total);
    let mut excluded = 0;

    for product in products {
        let item = classify(product, config);
        match exclusion_reason(&item, config) {
            Some(reason) => {
                debug!("Excluding {}: {}", item.product.id, reason);
                excluded += 1;
            }
            None => classified.push(item),
        }
    }

    let review = classified.iter().filter(|p| p.facets.needs_review).count();
    info!(
        "Classified {} products ({} excluded, {} need review)",
        classified.len(),
        excluded,
        review
    );

    ClassifiedBatch {
        products: classified,
        excluded,
    }
}
