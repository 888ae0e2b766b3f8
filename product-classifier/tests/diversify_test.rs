mod common;

use common::{faceted, init_tracing};
use product_classifier::{
    diversify, diversify_mmr, diversify_mmr_around, diversify_mmr_by, get_diversity_stats, ClassifiedProduct,
    ClassifierError, DiversifyOptions, FacetDimension, RelevanceScore,
};
use tracing::info;

const CATEGORIES: [&str; 5] = ["tech", "home", "kitchen", "fashion", "books"];
const AUDIENCES: [&str; 3] = ["men", "women", "kids"];
const PRICES: [f64; 4] = [15.0, 35.0, 75.0, 150.0];

fn pool(size: usize) -> Vec<ClassifiedProduct> {
    (0..size)
        .map(|i| {
            faceted(
                &format!("pool:{}", i),
                &format!("brand{}", i % 10),
                CATEGORIES[i % CATEGORIES.len()],
                AUDIENCES[i % AUDIENCES.len()],
                PRICES[i % PRICES.len()],
                0.5 + (i % 7) as f64 / 20.0,
            )
        })
        .collect()
}

fn ids(items: &[ClassifiedProduct]) -> Vec<&str> {
    items.iter().map(|p| p.product.id.as_str()).collect()
}

#[test]
fn test_mmr_fills_target_within_caps() {
    init_tracing();

    let options = DiversifyOptions {
        target_size: 10,
        ..DiversifyOptions::default()
    };
    let selected = diversify_mmr(pool(30), &options).unwrap();
    assert_eq!(selected.len(), 10);

    let stats = get_diversity_stats(&selected);
    let cap = options.combination_cap();
    assert_eq!(cap, 2);
    assert!(stats.max_combination_share <= cap as f64 / options.target_size as f64 + 1e-9);
    assert!(stats.brand_distribution.values().all(|&n| n <= options.max_per_brand));
    assert!(stats.category_distribution.values().all(|&n| n <= options.max_per_category));
    info!("MMR stats: {:?}", stats);
}

#[test]
fn test_mmr_penalizes_similar_items() {
    let a = faceted("s:a", "jbl", "tech", "men", 60.0, 0.9);
    let b = faceted("s:b", "sony", "tech", "men", 70.0, 0.89);
    let c = faceted("s:c", "ikea", "home", "women", 20.0, 0.6);

    let balanced = DiversifyOptions {
        target_size: 2,
        max_combination_share: 1.0,
        ..DiversifyOptions::default()
    };
    let selected = diversify_mmr(vec![a.clone(), b.clone(), c.clone()], &balanced).unwrap();
    assert_eq!(ids(&selected), vec!["s:a", "s:c"]);

    let relevance_only = DiversifyOptions {
        lambda: 1.0,
        ..balanced
    };
    let selected = diversify_mmr(vec![a, b, c], &relevance_only).unwrap();
    assert_eq!(ids(&selected), vec!["s:a", "s:b"]);
}

#[test]
fn test_mmr_combination_cap_applies() {
    let a = faceted("c:a", "jbl", "tech", "men", 60.0, 0.9);
    let b = faceted("c:b", "sony", "tech", "men", 70.0, 0.89);
    let c = faceted("c:c", "ikea", "home", "women", 20.0, 0.1);

    let options = DiversifyOptions {
        target_size: 2,
        lambda: 1.0,
        max_combination_share: 0.25,
        ..DiversifyOptions::default()
    };
    let selected = diversify_mmr(vec![a, b, c], &options).unwrap();
    assert_eq!(ids(&selected), vec!["c:a", "c:c"]);
}

#[test]
fn test_mmr_ties_go_to_earlier_candidate() {
    let options = DiversifyOptions {
        target_size: 1,
        ..DiversifyOptions::default()
    };
    let first = faceted("t:1", "jbl", "tech", "men", 60.0, 0.7);
    let second = faceted("t:2", "sony", "tech", "men", 60.0, 0.7);

    let selected = diversify_mmr(vec![first.clone(), second.clone()], &options).unwrap();
    assert_eq!(ids(&selected), vec!["t:1"]);
    let selected = diversify_mmr(vec![second, first], &options).unwrap();
    assert_eq!(ids(&selected), vec!["t:2"]);
}

#[test]
fn test_mmr_rejects_invalid_options() {
    let bad_lambda = DiversifyOptions {
        lambda: 1.5,
        ..DiversifyOptions::default()
    };
    assert!(matches!(
        diversify_mmr(pool(3), &bad_lambda),
        Err(ClassifierError::InvalidOptions(_))
    ));

    let bad_share = DiversifyOptions {
        max_combination_share: 0.0,
        ..DiversifyOptions::default()
    };
    assert!(matches!(bad_share.validate(), Err(ClassifierError::InvalidOptions(_))));
}

#[test]
fn test_mmr_with_custom_relevance() {
    let items = vec![
        faceted("r:1", "a", "tech", "men", 90.0, 0.9),
        faceted("r:2", "b", "home", "women", 12.0, 0.2),
        faceted("r:3", "c", "books", "kids", 40.0, 0.5),
    ];
    let options = DiversifyOptions {
        target_size: 3,
        lambda: 1.0,
        dimensions: vec![FacetDimension::Brand],
        ..DiversifyOptions::default()
    };

    let cheapest_first =
        diversify_mmr_by(items.clone(), &options, |p| -p.product.price.unwrap_or(f64::MAX)).unwrap();
    assert_eq!(ids(&cheapest_first), vec!["r:2", "r:3", "r:1"]);

    let by_inverse_price = DiversifyOptions {
        relevance: RelevanceScore::InversePrice,
        ..options
    };
    let selected = diversify_mmr(items, &by_inverse_price).unwrap();
    assert_eq!(ids(&selected), vec!["r:2", "r:3", "r:1"]);
}

#[test]
fn test_relevance_scores() {
    let item = faceted("v:1", "a", "tech", "men", 100.0, 0.8);
    assert_eq!(RelevanceScore::Confidence.score(&item), 0.8);
    assert_eq!(RelevanceScore::InversePrice.score(&item), 0.5);
    assert_eq!(RelevanceScore::Uniform.score(&item), 1.0);

    let mut unpriced = item.clone();
    unpriced.product.price = None;
    assert_eq!(RelevanceScore::InversePrice.score(&unpriced), 0.0);
}

#[test]
fn test_empty_pool_selects_nothing() {
    let options = DiversifyOptions::default();
    assert!(diversify_mmr(Vec::new(), &options).unwrap().is_empty());
    assert!(diversify(Vec::new(), &options).is_empty());

    let stats = get_diversity_stats(&[]);
    assert_eq!(stats.total_products, 0);
    assert_eq!(stats.max_combination_share, 0.0);
}

#[test]
fn test_mmr_is_deterministic() {
    let options = DiversifyOptions {
        target_size: 12,
        ..DiversifyOptions::default()
    };
    let first = diversify_mmr(pool(40), &options).unwrap();
    let second = diversify_mmr(pool(40), &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_greedy_respects_brand_cap() {
    let items: Vec<_> = CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, category)| faceted(&format!("g:{}", i), "same", category, "men", 40.0, 0.9 - i as f64 / 10.0))
        .collect();
    let options = DiversifyOptions {
        target_size: 10,
        ..DiversifyOptions::default()
    };

    let selected = diversify(items, &options);
    assert_eq!(ids(&selected), vec!["g:0", "g:1"]);
}

#[test]
fn test_greedy_prefers_confident_items() {
    let selected = diversify(pool(30), &DiversifyOptions::default());
    assert!(!selected.is_empty());
    assert!(selected.len() <= 24);

    let stats = get_diversity_stats(&selected);
    assert!(stats.brand_distribution.values().all(|&n| n <= 2));
    assert!(stats.category_distribution.values().all(|&n| n <= 6));
    assert!(stats.price_bucket_distribution.values().all(|&n| n <= 8));
    assert!(selected[0].facets.confidence >= selected[selected.len() - 1].facets.confidence);
}

#[test]
fn test_options_deserialize_with_defaults() {
    let options: DiversifyOptions =
        serde_json::from_str(r#"{"targetSize": 12, "relevance": "inverse-price", "dimensions": ["brand", "priceBucket"]}"#)
            .unwrap();
    assert_eq!(options.target_size, 12);
    assert_eq!(options.relevance, RelevanceScore::InversePrice);
    assert_eq!(options.dimensions, vec![FacetDimension::Brand, FacetDimension::PriceBucket]);
    assert_eq!(options.lambda, 0.7);
    assert_eq!(options.combination_cap(), 3);
}

#[test]
fn test_mmr_combination_share_holds_on_thin_pool() {
    init_tracing();
    let mut items: Vec<ClassifiedProduct> = (0..8)
        .map(|i| faceted(&format!("same:{}", i), &format!("audio{}", i), "tech", "men", 75.0, 0.9))
        .collect();
    for (i, (category, audience)) in ["home", "kitchen", "books", "fashion"]
        .iter()
        .flat_map(|c| ["women", "kids"].map(|a| (*c, a)))
        .enumerate()
    {
        items.push(faceted(&format!("other:{}", i), &format!("other{}", i), category, audience, 20.0, 0.6));
    }

    let options = DiversifyOptions::default();
    let selected = diversify_mmr(items, &options).unwrap();
    let stats = get_diversity_stats(&selected);

    assert!(selected.len() < options.target_size);
    assert_eq!(selected.len(), 10);
    assert_eq!(stats.combination_distribution.get("tech|men|50-100"), Some(&2));
    assert!(stats.max_combination_share <= options.max_combination_share + 1e-9);
    info!("Thin pool stats: {:?}", stats);
}

#[test]
fn test_mmr_counts_pinned_items_toward_caps() {
    let pinned = vec![faceted("pin:1", "jbl", "tech", "men", 75.0, 0.9)];
    let candidates = vec![
        faceted("cand:1", "sony", "tech", "men", 80.0, 0.95),
        faceted("cand:2", "bose", "tech", "men", 90.0, 0.9),
        faceted("cand:3", "ikea", "home", "women", 20.0, 0.5),
        faceted("cand:4", "lego", "books", "kids", 30.0, 0.4),
    ];
    let options = DiversifyOptions {
        target_size: 4,
        max_combination_share: 0.5,
        ..DiversifyOptions::default()
    };

    let selected = diversify_mmr_around(candidates, &pinned, &options, |p| p.facets.confidence).unwrap();
    let ids = ids(&selected);
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&"pin:1"));
    assert_eq!(ids.iter().filter(|id| ["cand:1", "cand:2"].contains(id)).count(), 1);

    let shown: Vec<ClassifiedProduct> = pinned.into_iter().chain(selected).collect();
    let stats = get_diversity_stats(&shown);
    assert!(stats.max_combination_share <= options.max_combination_share + 1e-9);
}

#[test]
fn test_brandless_products_share_one_brand_budget() {
    let items: Vec<ClassifiedProduct> = CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let mut item = faceted(&format!("nb:{}", i), "x", category, "women", 30.0 + i as f64 * 30.0, 0.8);
            item.product.brand = None;
            item
        })
        .collect();
    let options = DiversifyOptions {
        target_size: 5,
        max_combination_share: 1.0,
        ..DiversifyOptions::default()
    };

    let selected = diversify_mmr(items, &options).unwrap();
    assert_eq!(selected.len(), options.max_per_brand);
    assert!(selected.iter().all(|p| p.product.brand_key() == "unknown"));
}
