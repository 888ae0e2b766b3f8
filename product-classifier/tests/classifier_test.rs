mod common;

use common::{branded, classified, default_config, init_tracing, product, row};
use product_classifier::classifier::{
    CATEGORY_PATH_CONFIDENCE, GPC_CONFIDENCE, OVERRIDE_CONFIDENCE, SUITABLE_FOR_CONFIDENCE,
};
use product_classifier::config::GpcRule;
use product_classifier::{
    classify, classify_batch, create_default_config, normalize, search_text, ClassifierConfig,
    ClassifierError, FacetOverride, FacetRules, FeedSource, KeywordRule, NormalizeContext,
    PriceBucket,
};
use tracing::info;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_price_bucket_boundaries() {
    assert_eq!(PriceBucket::from_price(Some(0.0)), PriceBucket::Under25);
    assert_eq!(PriceBucket::from_price(Some(24.99)), PriceBucket::Under25);
    assert_eq!(PriceBucket::from_price(Some(25.0)), PriceBucket::From25To50);
    assert_eq!(PriceBucket::from_price(Some(49.99)), PriceBucket::From25To50);
    assert_eq!(PriceBucket::from_price(Some(50.0)), PriceBucket::From50To100);
    assert_eq!(PriceBucket::from_price(Some(100.0)), PriceBucket::Over100);
    assert_eq!(PriceBucket::from_price(Some(150.0)), PriceBucket::Over100);
    assert_eq!(PriceBucket::from_price(None), PriceBucket::Unknown);
    assert_eq!(PriceBucket::From50To100.to_string(), "50-100");
}

#[test]
fn test_jbl_tune_headphones() {
    init_tracing();

    let raw = row(&[
        ("aw_product_id", "JBL510"),
        ("product_name", "JBL Tune 510BT"),
        ("brand_name", "JBL"),
        ("search_price", "59.99"),
        ("aw_deep_link", "https://www.awin1.com/pclick.php?p=510"),
        ("merchant_category", "Koptelefoons"),
    ]);
    let product = normalize(&raw, FeedSource::Awin, &NormalizeContext::default()).unwrap();
    assert_eq!(product.price, Some(59.99));

    let item = classify(product, &default_config());
    assert_eq!(item.facets.price_bucket, PriceBucket::From50To100);
    assert_eq!(item.facets.category, "tech");
    assert!(item
        .facets
        .reasons
        .iter()
        .any(|r| r.contains("koptelefoon")));
    info!("JBL classified as {:?}", item.facets);
}

#[test]
fn test_unmatched_category_falls_back() {
    let item = classified(branded("m:1", "JBL", "JBL Tune 510BT", Some(59.99)));
    assert_eq!(item.facets.category, "other");
    assert_eq!(item.facets.audience, "unisex");
    assert_eq!(item.facets.occasions, vec!["general".to_string()]);
    assert_eq!(item.facets.interests, vec!["other".to_string()]);
    assert!(item.facets.needs_review);
}

#[test]
fn test_classification_is_idempotent() {
    let config = default_config();
    let mut p = branded("m:2", "Fossil", "Fossil Heren Horloge Chronograaf", Some(129.0));
    p.description = Some("Een stoer horloge voor vaderdag".to_string());

    let first = classify(p.clone(), &config);
    let second = classify(p, &config);
    assert_eq!(first, second);
    assert_eq!(first.facets.category, "watches");
    assert_eq!(first.facets.audience, "men");
    assert!(first.facets.occasions.contains(&"fathers-day".to_string()));
}

#[test]
fn test_search_text_is_folded() {
    let mut p = product("m:3", "Crème Brûlée   Set", Some(19.95));
    p.brand = Some("Küchenprofi".to_string());
    p.description = Some("x".repeat(500));

    let text = search_text(&p);
    assert!(text.starts_with("creme brulee set kuchenprofi"));
    assert!(text.len() < 260);
}

#[test]
fn test_gpc_beats_keywords() {
    let mut p = product("m:4", "Horloge speaker", Some(40.0));
    p.google_product_category = Some("Electronics > Audio > Speakers".to_string());
    let item = classified(p);
    assert_eq!(item.facets.category, "tech");
    assert!(item.facets.reasons.iter().any(|r| r.starts_with("GPC")));
    // audience falls back, category came from GPC
    assert!(approx(item.facets.confidence, (0.3 + GPC_CONFIDENCE) / 2.0));
}

#[test]
fn test_category_path_uses_gpc_mapping() {
    let mut p = product("m:5", "Geurkaars vanille", Some(14.0));
    p.category = Some("Home & Garden > Decor".to_string());
    let item = classified(p);
    assert_eq!(item.facets.category, "home");
    assert!(approx(item.facets.confidence, (0.3 + CATEGORY_PATH_CONFIDENCE) / 2.0));
}

#[test]
fn test_title_keyword_outranks_text_keyword() {
    let in_title = classified(product("m:6", "Koptelefoon X", Some(30.0)));

    let mut p = product("m:7", "Luxe set", Some(30.0));
    p.description = Some("Mooie koptelefoon".to_string());
    let in_text = classified(p);

    assert_eq!(in_title.facets.category, "tech");
    assert_eq!(in_text.facets.category, "tech");
    assert!(approx(in_title.facets.confidence, (0.3 + 0.9) / 2.0));
    assert!(approx(in_text.facets.confidence, (0.3 + 0.6) / 2.0));
}

#[test]
fn test_suitable_for_sets_audience() {
    let mut p = product("m:8", "Jurk met bloemen", Some(39.0));
    p.suitable_for = Some("Female".to_string());
    let item = classified(p);
    assert_eq!(item.facets.audience, "women");
    assert_eq!(item.facets.category, "fashion");
    assert!(item.facets.reasons.iter().any(|r| r.contains("suitable_for")));
    assert!(approx(item.facets.confidence, (SUITABLE_FOR_CONFIDENCE + 0.9) / 2.0));
}

#[test]
fn test_multi_valued_facets_follow_rule_order() {
    let item = classified(product("m:9", "Kerst verjaardag cadeau", Some(20.0)));
    assert_eq!(
        item.facets.occasions,
        vec!["birthday".to_string(), "christmas".to_string()]
    );
}

#[test]
fn test_keyword_rules_respect_word_starts_and_order() {
    let rules = FacetRules {
        values: vec!["men".to_string(), "first".to_string(), "second".to_string()],
        fallback: "men".to_string(),
        rules: vec![
            KeywordRule::new("men", &["men"]),
            KeywordRule::new("first", &["horloge"]),
            KeywordRule::new("second", &["horloge"]),
        ],
    };
    assert!(rules.first_match("womens scarf").is_none());
    assert_eq!(rules.first_match("mens scarf").map(|(r, _)| r.value.as_str()), Some("men"));
    assert_eq!(rules.first_match("horloges").map(|(r, _)| r.value.as_str()), Some("first"));
    assert_eq!(rules.all_matches("men horloge"), vec!["men".to_string(), "first".to_string(), "second".to_string()]);
}

#[test]
fn test_giftable_flags() {
    assert!(!classified(product("g:1", "HP 301 Toner cartridge", Some(25.0))).facets.is_giftable);
    assert!(classified(product("g:2", "Cadeauset thee", Some(25.0))).facets.is_giftable);
    assert!(!classified(product("g:3", "USB kabel 2m", Some(9.0))).facets.is_giftable);
    assert!(classified(product("g:4", "Leren portemonnee", Some(45.0))).facets.is_giftable);
}

fn config_with_overrides() -> ClassifierConfig {
    let mut config = create_default_config();
    config.overrides.brands.insert(
        "JBL".to_string(),
        FacetOverride {
            category: Some("kitchen".to_string()),
            ..FacetOverride::default()
        },
    );
    config.overrides.identifiers.insert(
        "6925281974571".to_string(),
        FacetOverride {
            category: Some("toys".to_string()),
            audience: Some("kids".to_string()),
            reason: Some("curated".to_string()),
            ..FacetOverride::default()
        },
    );
    config
        .overrides
        .brand_aliases
        .insert("JBL by Harman".to_string(), "jbl".to_string());
    config.prepare().unwrap()
}

#[test]
fn test_identifier_override_beats_brand_override() {
    let config = config_with_overrides();

    let mut with_gtin = branded("o:1", "JBL", "JBL Tune 510BT koptelefoon", Some(59.99));
    with_gtin.gtin = Some("6925281974571".to_string());
    let item = classify(with_gtin, &config);
    assert_eq!(item.facets.category, "toys");
    assert_eq!(item.facets.audience, "kids");
    assert!(approx(item.facets.confidence, OVERRIDE_CONFIDENCE));
    assert!(item.facets.reasons.iter().any(|r| r.contains("curated")));

    let brand_only = classify(branded("o:2", "JBL", "JBL Flip 6 speaker", Some(129.0)), &config);
    assert_eq!(brand_only.facets.category, "kitchen");

    let aliased = classify(branded("o:3", "JBL by Harman", "Charge 5", Some(179.0)), &config);
    assert_eq!(aliased.facets.category, "kitchen");
}

#[test]
fn test_canonical_title_override() {
    let mut config = create_default_config();
    config.overrides.identifiers.insert(
        "Lego Technic Porsche".to_string(),
        FacetOverride {
            audience: Some("men".to_string()),
            ..FacetOverride::default()
        },
    );
    let config = config.prepare().unwrap();

    let item = classify(product("o:4", "LEGO Technic Porsche - Zwart", Some(149.0)), &config);
    assert_eq!(item.facets.audience, "men");
}

#[test]
fn test_punctuated_title_override() {
    let mut config = create_default_config();
    config.overrides.identifiers.insert(
        "Basic T-Shirt".to_string(),
        FacetOverride {
            audience: Some("men".to_string()),
            ..FacetOverride::default()
        },
    );
    let config = config.prepare().unwrap();

    for title in ["Basic T-Shirt", "Basic T-shirt Rood XL", "basic tshirt"] {
        let item = classify(product("o:5", title, Some(19.99)), &config);
        assert_eq!(item.facets.audience, "men", "title {:?}", title);
        assert_eq!(item.facets.reasons[0], "identifier override 'basic tshirt'");
    }
}

#[test]
fn test_classify_batch_exclusions() {
    init_tracing();

    let mut config = create_default_config();
    config.overrides.exclude.brands.push("Acme".to_string());
    config.overrides.exclude.contains.push("proefverpakking".to_string());
    config.overrides.exclude.identifiers.push("sku-excluded".to_string());
    config.overrides.force_include.push("8712345678906".to_string());
    let config = config.prepare().unwrap();

    let mut excluded_sku = product("x:3", "Notitieboek", Some(12.0));
    excluded_sku.sku = Some("SKU-EXCLUDED".to_string());
    let mut forced = branded("x:5", "Acme", "Acme thermosfles", Some(22.0));
    forced.gtin = Some("8712345678906".to_string());

    let products = vec![
        branded("x:1", "ACME", "Acme mok", Some(20.0)),
        product("x:2", "Parfum proefverpakking", Some(15.0)),
        excluded_sku,
        product("x:4", "Sleutelhanger", Some(3.0)),
        forced,
        product("x:6", "Leren portemonnee", Some(45.0)),
        product("x:7", "Verrassingspakket", None),
    ];

    let batch = classify_batch(products, &config);
    assert_eq!(batch.excluded, 4);
    let kept: Vec<&str> = batch.products.iter().map(|p| p.product.id.as_str()).collect();
    assert_eq!(kept, vec!["x:5", "x:6", "x:7"]);
}

#[test]
fn test_unknown_facet_values_are_rejected() {
    let mut config = create_default_config();
    config.keywords.category.rules.push(KeywordRule::new("gadgets", &["gadget"]));
    assert!(matches!(
        config.validate(),
        Err(ClassifierError::UnknownFacetValue { ref facet, ref value, .. }) if facet == "category" && value == "gadgets"
    ));

    let mut config = create_default_config();
    config.keywords.occasion.fallback = "none".to_string();
    assert!(matches!(config.validate(), Err(ClassifierError::UnknownFacetValue { .. })));

    let mut config = create_default_config();
    config.gpc_mapping.push(GpcRule {
        path: "Media > Music".to_string(),
        category: "music".to_string(),
    });
    assert!(matches!(config.validate(), Err(ClassifierError::UnknownFacetValue { .. })));

    let mut config = create_default_config();
    config.overrides.identifiers.insert(
        "123".to_string(),
        FacetOverride {
            audience: Some("pets".to_string()),
            ..FacetOverride::default()
        },
    );
    assert!(matches!(config.validate(), Err(ClassifierError::UnknownFacetValue { .. })));
}

#[test]
fn test_malformed_configs_are_rejected() {
    let mut config = create_default_config();
    config.keywords.interest.values.clear();
    assert!(matches!(config.validate(), Err(ClassifierError::InvalidConfig(_))));

    let mut config = create_default_config();
    config.overrides.brand_aliases.insert("a".to_string(), "b".to_string());
    config.overrides.brand_aliases.insert("b".to_string(), "a".to_string());
    assert!(matches!(config.validate(), Err(ClassifierError::CyclicBrandAlias { .. })));

    let mut config = create_default_config();
    config.overrides.brands.insert(
        "JBL".to_string(),
        FacetOverride {
            category: Some("tech".to_string()),
            ..FacetOverride::default()
        },
    );
    config.overrides.brands.insert(
        "jbl".to_string(),
        FacetOverride {
            category: Some("toys".to_string()),
            ..FacetOverride::default()
        },
    );
    assert!(matches!(config.validate(), Err(ClassifierError::ContradictoryOverride { .. })));

    let mut config = create_default_config();
    config.overrides.exclude.identifiers.push("8712345678906".to_string());
    config.overrides.force_include.push("8712345678906".to_string());
    assert!(matches!(config.validate(), Err(ClassifierError::ContradictoryOverride { .. })));

    let mut config = create_default_config();
    config.confidence_threshold = 1.5;
    assert!(matches!(config.validate(), Err(ClassifierError::InvalidConfig(_))));
}

#[test]
fn test_default_config_loads_from_json() {
    let json = serde_json::to_string(&create_default_config()).unwrap();
    let loaded = ClassifierConfig::from_json_str(&json).unwrap();
    assert_eq!(loaded, default_config());

    let broken = json.replace("\"fallback\":\"general\"", "\"fallback\":\"someday\"");
    assert!(ClassifierConfig::from_json_str(&broken).is_err());
}
