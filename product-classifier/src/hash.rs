use crate::types::{ClassifiedProduct, Product, UNKNOWN_BRAND};
use crate::utils::text;
use once_cell::sync::Lazy;
use regex::Regex;

// Applied to `normalize_for_hash` output: lowercase ASCII-folded words, no punctuation.
static EU_SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:maat|size)\s+\d+\b").unwrap());
static UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+\s*(?:ml|cl|l|gr|g|kg|mm|cm|m|oz|inch)\b").unwrap()
});
static LETTER_SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:xxs|xs|s|m|l|xl|xxl|xxxl|2xl|3xl|4xl)\b").unwrap()
});
static COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    let colors = [
        "zwart", "wit", "witte", "rood", "rode", "blauw", "blauwe", "groen", "groene", "geel",
        "gele", "roze", "paars", "grijs", "grijze", "bruin", "bruine", "beige", "oranje",
        "zilver", "goud", "black", "white", "red", "blue", "green", "yellow", "pink", "purple",
        "grey", "gray", "brown", "orange", "silver", "gold", "navy",
    ];
    Regex::new(&format!(r"\b(?:{})\b", colors.join("|"))).unwrap()
});

/// Title with punctuation, size and colour variants removed, so listings of
/// the same model in different sizes or colours collapse together.
pub fn canonical_title(title: &str) -> String {
    let normalized = text::normalize_for_hash(title);
    let mut stripped = EU_SIZE_RE.replace_all(&normalized, " ").into_owned();
    for re in [&*UNIT_RE, &*LETTER_SIZE_RE, &*COLOR_RE] {
        stripped = re.replace_all(&stripped, " ").into_owned();
    }
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        // A title made only of variant words still needs a key
        normalized
    } else {
        collapsed
    }
}

fn brand_part(product: &Product) -> String {
    product
        .brand
        .as_deref()
        .map(text::normalize_for_hash)
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| UNKNOWN_BRAND.to_string())
}

fn has_known_brand(product: &Product) -> bool {
    brand_part(product) != UNKNOWN_BRAND
}

/// `brand|title` grouping key. Stable across runs for identical input.
pub fn canonical_key(product: &Product) -> String {
    format!("{}|{}", brand_part(product), canonical_title(&product.title))
}

fn identifier(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

/// Strongest identifier available: GTIN, then MPN, then source SKU, then the
/// canonical key. The prefix names the kind.
pub fn identifier_hash(product: &Product) -> String {
    if let Some(gtin) = identifier(product.gtin.as_deref()) {
        return format!("gtin:{}", gtin);
    }
    if let Some(mpn) = identifier(product.mpn.as_deref()) {
        return format!("mpn:{}", mpn);
    }
    if let Some(sku) = identifier(product.sku.as_deref()) {
        return format!("sku:{}:{}", product.source, sku);
    }
    format!("key:{}", canonical_key(product))
}

/// Every key under which a product can collide with another. Two products
/// are duplicates exactly when they share at least one.
pub(crate) fn match_keys(product: &Product) -> Vec<String> {
    let mut keys = Vec::with_capacity(4);
    if let Some(gtin) = identifier(product.gtin.as_deref()) {
        keys.push(format!("gtin:{}", gtin));
    }
    if let Some(mpn) = identifier(product.mpn.as_deref()) {
        keys.push(format!("mpn:{}", mpn));
    }
    if let Some(sku) = identifier(product.sku.as_deref()) {
        keys.push(format!("sku:{}:{}", product.source, sku));
    }
    // Brandless titles are too generic to merge on
    if has_known_brand(product) {
        keys.push(format!("key:{}", canonical_key(product)));
    }
    keys
}

pub fn are_duplicates(a: &Product, b: &Product) -> bool {
    let b_keys = match_keys(b);
    match_keys(a).iter().any(|k| b_keys.contains(k))
}

pub fn assign_canonical_keys(products: &mut [ClassifiedProduct]) {
    for item in products.iter_mut() {
        item.canonical_key = Some(canonical_key(&item.product));
    }
}
