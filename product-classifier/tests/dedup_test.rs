mod common;

use common::{branded, classified, init_tracing, product};
use product_classifier::hash::canonical_title;
use product_classifier::{
    are_duplicates, assign_canonical_keys, canonical_key, dedup, dedup_multi_source,
    identifier_hash, FeedSource, Product,
};
use tracing::info;

fn with_gtin(mut p: Product, source: FeedSource, gtin: &str) -> Product {
    p.source = source;
    p.gtin = Some(gtin.to_string());
    p
}

fn ids<T: AsRef<Product>>(items: &[T]) -> Vec<String> {
    items.iter().map(|p| p.as_ref().id.clone()).collect()
}

#[test]
fn test_canonical_key_ignores_size_and_colour() {
    let a = branded("a:1", "Nike", "Nike Air Max 90 Zwart Maat 42", Some(129.0));
    let b = branded("a:2", "NIKE", "Nike Air Max 90 - White, size 44", Some(119.0));

    assert_eq!(canonical_key(&a), "nike|nike air max 90");
    assert_eq!(canonical_key(&a), canonical_key(&b));
    assert!(are_duplicates(&a, &b));
}

#[test]
fn test_colour_and_size_variants_share_base_key() {
    let base = canonical_key(&branded("v:0", "Acme", "Shirt", Some(20.0)));
    assert_eq!(base, "acme|shirt");

    let cases = [
        ("Shirt Rood XL", "v:1"),
        ("shirt rood xl", "v:2"),
        ("SHIRT ROOD XL", "v:3"),
    ];
    for (title, id) in cases {
        let variant = branded(id, "Acme", title, Some(20.0));
        assert_eq!(canonical_key(&variant), base, "title {:?}", title);
    }
}

#[test]
fn test_canonical_title_strips_units() {
    assert_eq!(
        canonical_title("Chanel No 5 Eau de Parfum 50ml"),
        canonical_title("Chanel No. 5 Eau de Parfum 100 ml")
    );
    assert_eq!(canonical_title("Zwart"), "zwart");
}

#[test]
fn test_brandless_titles_do_not_merge() {
    let a = product("b:1", "Geurkaars vanille", Some(12.0));
    let b = product("b:2", "Geurkaars vanille", Some(14.0));
    assert!(!are_duplicates(&a, &b));
    assert_eq!(dedup(vec![a, b]).len(), 2);
}

#[test]
fn test_same_gtin_keeps_cheapest_listing() {
    init_tracing();

    let awin = with_gtin(
        branded("awin:shop:1", "JBL", "JBL Tune 510BT", Some(49.99)),
        FeedSource::Awin,
        "6925281974571",
    );
    let bol = with_gtin(
        branded("bol:bol:1", "JBL", "JBL Tune 510 BT koptelefoon", Some(44.99)),
        FeedSource::Bol,
        "6925281974571",
    );

    let unique = dedup(vec![awin, bol]);
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].id, "bol:bol:1");
    assert_eq!(unique[0].price, Some(44.99));
    info!("Kept {} at {:?}", unique[0].id, unique[0].price);
}

#[test]
fn test_groups_are_transitive() {
    let mut a = product("t:1", "Speaker een", Some(30.0));
    a.gtin = Some("111".to_string());
    let mut b = product("t:2", "Speaker twee", Some(40.0));
    b.gtin = Some("111".to_string());
    b.mpn = Some("MPN-7".to_string());
    let mut c = product("t:3", "Speaker drie", Some(20.0));
    c.mpn = Some("mpn-7".to_string());

    assert!(!are_duplicates(&a, &c));
    let unique = dedup(vec![a, b, c]);
    assert_eq!(ids(&unique), vec!["t:3".to_string()]);
}

#[test]
fn test_unpriced_listing_ranks_last() {
    let mut rich = with_gtin(product("p:1", "Lamp", None), FeedSource::Bol, "222");
    rich.image_url = Some("https://img.example.com/lamp.jpg".to_string());
    rich.description = Some("Mooie lamp".to_string());
    let priced = with_gtin(product("p:2", "Lamp", Some(80.0)), FeedSource::Awin, "222");

    let unique = dedup(vec![rich, priced]);
    assert_eq!(ids(&unique), vec!["p:2".to_string()]);
}

#[test]
fn test_richer_listing_wins_price_tie() {
    let bare = with_gtin(product("r:1", "Mok", Some(9.95)), FeedSource::Awin, "333");
    let mut rich = with_gtin(product("r:2", "Mok", Some(9.95)), FeedSource::Bol, "333");
    rich.images = vec!["https://img.example.com/mok.jpg".to_string()];

    let unique = dedup(vec![bare.clone(), rich]);
    assert_eq!(ids(&unique), vec!["r:2".to_string()]);

    let twin = with_gtin(product("r:3", "Mok", Some(9.95)), FeedSource::Bol, "333");
    assert_eq!(ids(&dedup(vec![bare, twin])), vec!["r:1".to_string()]);
}

#[test]
fn test_groups_keep_first_appearance_order() {
    let first = with_gtin(product("o:1", "Thermosfles", Some(25.0)), FeedSource::Awin, "444");
    let second = product("o:2", "Picknickmand", Some(60.0));
    let cheaper_first = with_gtin(product("o:3", "Thermosfles 0,5", Some(19.0)), FeedSource::Bol, "444");

    let unique = dedup(vec![first, second, cheaper_first]);
    assert_eq!(ids(&unique), vec!["o:3".to_string(), "o:2".to_string()]);
}

#[test]
fn test_same_sku_from_different_sources_is_not_a_match() {
    let mut a = product("s:1", "Bordspel", Some(30.0));
    a.sku = Some("SKU-1".to_string());
    let mut b = product("s:2", "Kaartspel", Some(12.0));
    b.source = FeedSource::Bol;
    b.sku = Some("SKU-1".to_string());
    assert!(!are_duplicates(&a, &b));

    let mut c = product("s:3", "Kaartspel deluxe", Some(15.0));
    c.sku = Some("sku-1".to_string());
    assert!(are_duplicates(&a, &c));
}

#[test]
fn test_multi_source_groups_keep_provenance() {
    let awin = with_gtin(
        branded("awin:shop:1", "JBL", "JBL Tune 510BT", Some(49.99)),
        FeedSource::Awin,
        "6925281974571",
    );
    let bol = with_gtin(
        branded("bol:bol:1", "JBL", "JBL Tune 510BT", Some(44.99)),
        FeedSource::Bol,
        "6925281974571",
    );
    let other = with_gtin(
        branded("bol:bol:2", "Sony", "Sony WH-1000XM5", Some(349.0)),
        FeedSource::Bol,
        "4548736132450",
    );

    let groups = dedup_multi_source(vec![awin, bol, other]);
    assert_eq!(groups.len(), 2);

    let jbl = &groups[0];
    assert_eq!(jbl.representative.id, "bol:bol:1");
    assert_eq!(jbl.member_ids, vec!["awin:shop:1".to_string(), "bol:bol:1".to_string()]);
    assert_eq!(jbl.sources, vec![FeedSource::Awin, FeedSource::Bol]);
    assert_eq!(jbl.price_range, Some((44.99, 49.99)));
    assert_eq!(jbl.duplicates(), 1);

    assert_eq!(groups[1].duplicates(), 0);
    assert_eq!(groups[1].price_range, Some((349.0, 349.0)));
}

#[test]
fn test_identifier_hash_prefers_strongest_identifier() {
    let mut p = product("h:1", "Geurkaars vanille", Some(12.0));
    assert_eq!(identifier_hash(&p), "key:unknown|geurkaars vanille");

    p.sku = Some("SKU9".to_string());
    assert_eq!(identifier_hash(&p), "sku:manual:sku9");

    p.mpn = Some("ABC-1".to_string());
    assert_eq!(identifier_hash(&p), "mpn:abc-1");

    p.gtin = Some(" 8712345678906 ".to_string());
    assert_eq!(identifier_hash(&p), "gtin:8712345678906");
}

#[test]
fn test_dedup_is_deterministic_on_classified_products() {
    let products = vec![
        branded("d:1", "Philips", "Philips Airfryer XL Zwart", Some(129.0)),
        branded("d:2", "Philips", "Philips Airfryer XL Wit", Some(119.0)),
        branded("d:3", "Tefal", "Tefal Koekenpan 28cm", Some(39.0)),
        branded("d:4", "Tefal", "Tefal Koekenpan 24 cm", Some(34.0)),
    ];

    let run = || {
        let mut pool: Vec<_> = products.iter().cloned().map(classified).collect();
        assign_canonical_keys(&mut pool);
        dedup(pool)
    };
    let first = run();
    let second = run();

    assert_eq!(first, second);
    assert_eq!(ids(&first), vec!["d:2".to_string(), "d:4".to_string()]);
    assert_eq!(first[0].canonical_key.as_deref(), Some("philips|philips airfryer"));
}
