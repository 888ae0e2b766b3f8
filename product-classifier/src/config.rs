use crate::hash;
use crate::types::{ClassifierError, Result};
use crate::utils::text;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// One value of a facet and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub value: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(value: &str, keywords: &[&str]) -> Self {
        Self {
            value: value.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Closed vocabulary and ordered rules for one facet dimension.
///
/// Rules are evaluated in list order. For single-valued facets (audience,
/// category) the first rule with a matching keyword wins; multi-valued facets
/// (occasions, interests) collect every matching rule, still in list order.
/// When nothing matches, the facet resolves to `fallback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRules {
    pub values: Vec<String>,
    pub fallback: String,
    #[serde(default)]
    pub rules: Vec<KeywordRule>,
}

impl FacetRules {
    pub fn allows(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// First rule with a keyword present in `normalized_text`, plus that keyword.
    pub fn first_match<'a>(&'a self, normalized_text: &str) -> Option<(&'a KeywordRule, &'a str)> {
        self.rules.iter().find_map(|rule| {
            rule.keywords
                .iter()
                .find(|kw| text::contains_keyword(normalized_text, kw))
                .map(|kw| (rule, kw.as_str()))
        })
    }

    /// Values of every matching rule, deduplicated, in rule order.
    pub fn all_matches(&self, normalized_text: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for rule in &self.rules {
            if values.contains(&rule.value) {
                continue;
            }
            if text::contains_any(normalized_text, &rule.keywords) {
                values.push(rule.value.clone());
            }
        }
        values
    }
}

/// Keyword rules for every text-derived facet plus the giftability lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSet {
    pub audience: FacetRules,
    pub category: FacetRules,
    pub occasion: FacetRules,
    pub interest: FacetRules,
    /// Consumables, spare parts and the like; never giftable.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub force_giftable: Vec<String>,
    #[serde(default)]
    pub not_giftable: Vec<String>,
}

/// Google Product Category path fragment mapped to a category value.
/// Entries are tried in list order, so specific paths go before their parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpcRule {
    pub path: String,
    pub category: String,
}

pub type GpcMapping = Vec<GpcRule>;

/// Partial facets forced onto matching products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetOverride {
    pub audience: Option<String>,
    pub category: Option<String>,
    pub occasions: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
    pub is_giftable: Option<bool>,
    pub reason: Option<String>,
}

impl FacetOverride {
    /// Same forced facets, ignoring the free-text reason.
    fn same_effect(&self, other: &FacetOverride) -> bool {
        self.audience == other.audience
            && self.category == other.category
            && self.occasions == other.occasions
            && self.interests == other.interests
            && self.is_giftable == other.is_giftable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// GTIN, MPN, SKU or product id.
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
    /// Phrases that exclude a product when found in its search text.
    #[serde(default)]
    pub contains: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    /// Keyed by GTIN, MPN, SKU, product id or canonical title.
    #[serde(default)]
    pub identifiers: BTreeMap<String, FacetOverride>,
    #[serde(default)]
    pub brands: BTreeMap<String, FacetOverride>,
    /// Brand spelling -> canonical brand. Chains are followed.
    #[serde(default)]
    pub brand_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub exclude: ExcludeRules,
    /// Identifiers kept even when an exclusion rule matches.
    #[serde(default)]
    pub force_include: Vec<String>,
}

impl Overrides {
    /// Canonical spelling of a brand, following `brand_aliases`.
    pub fn resolve_brand(&self, brand: &str) -> String {
        let mut current = normalize_key(brand);
        // A validated alias table is acyclic, so a chain is at most len() long
        for _ in 0..=self.brand_aliases.len() {
            match self.brand_aliases.get(&current) {
                Some(next) => current = normalize_key(next),
                None => break,
            }
        }
        current
    }

    pub fn identifier_override(&self, key: &str) -> Option<&FacetOverride> {
        self.identifiers.get(&normalize_key(key))
    }

    pub fn brand_override(&self, brand: &str) -> Option<&FacetOverride> {
        self.brands.get(&self.resolve_brand(brand))
    }

    pub fn is_force_included(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.force_include.iter().any(|k| *k == key)
    }

    pub fn is_identifier_excluded(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.exclude.identifiers.iter().any(|k| *k == key)
    }

    pub fn is_brand_excluded(&self, brand: &str) -> bool {
        let brand = self.resolve_brand(brand);
        self.exclude.brands.iter().any(|b| *b == brand)
    }
}

/// Lookup form for override keys, brands and identifiers.
pub fn normalize_key(key: &str) -> String {
    text::normalize_text(key)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    pub keywords: KeywordSet,
    #[serde(default)]
    pub gpc_mapping: GpcMapping,
    #[serde(default)]
    pub overrides: Overrides,
    /// Below this confidence a product is flagged for review.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Products priced outside this window are excluded.
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

fn default_confidence_threshold() -> f64 {
    0.5
}

impl ClassifierConfig {
    /// Load a JSON config file, validate it and normalize its lookup keys.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let config = Self::from_json_str(&raw)?;
        info!("Loaded classifier config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: ClassifierConfig = serde_json::from_str(raw)?;
        config.prepare()
    }

    /// Validate, then rewrite every override, alias and exclusion key into
    /// its lookup form. Every config reaching the classifier went through here.
    pub fn prepare(mut self) -> Result<Self> {
        self.validate()?;

        let overrides = &mut self.overrides;
        overrides.identifiers = normalize_map_keys(std::mem::take(&mut overrides.identifiers));
        // Title keys are also reachable through their canonical title
        let title_keys: Vec<(String, FacetOverride)> = overrides
            .identifiers
            .iter()
            .map(|(key, o)| (hash::canonical_title(key), o.clone()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        for (key, o) in title_keys {
            overrides.identifiers.entry(key).or_insert(o);
        }
        overrides.brands = normalize_map_keys(std::mem::take(&mut overrides.brands));
        overrides.brand_aliases = std::mem::take(&mut overrides.brand_aliases)
            .into_iter()
            .map(|(from, to)| (normalize_key(&from), normalize_key(&to)))
            .collect();
        for list in [
            &mut overrides.exclude.identifiers,
            &mut overrides.exclude.brands,
            &mut overrides.force_include,
        ] {
            for key in list.iter_mut() {
                *key = normalize_key(key);
            }
        }
        // Excluded brands compare against resolved brands
        let excluded_brands: Vec<String> = overrides
            .exclude
            .brands
            .iter()
            .map(|b| overrides.resolve_brand(b))
            .collect();
        overrides.exclude.brands = excluded_brands;

        debug!(
            "Prepared classifier config: {} identifier overrides, {} brand overrides, {} aliases",
            overrides.identifiers.len(),
            overrides.brands.len(),
            overrides.brand_aliases.len()
        );
        Ok(self)
    }

    /// Reject configs that reference values outside their vocabularies or
    /// whose overrides contradict each other.
    pub fn validate(&self) -> Result<()> {
        let facets = [
            ("audience", &self.keywords.audience),
            ("category", &self.keywords.category),
            ("occasion", &self.keywords.occasion),
            ("interest", &self.keywords.interest),
        ];
        for (name, rules) in facets {
            validate_facet(name, rules)?;
        }

        for gpc in &self.gpc_mapping {
            if gpc.path.trim().is_empty() {
                return Err(ClassifierError::InvalidConfig("GPC mapping with an empty path".to_string()));
            }
            require_value("category", &self.keywords.category, &gpc.category, &format!("GPC mapping '{}'", gpc.path))?;
        }

        for (key, o) in self.overrides.identifiers.iter().chain(self.overrides.brands.iter()) {
            self.validate_override(key, o)?;
        }

        self.check_alias_cycles()?;
        self.check_contradictions()?;

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ClassifierError::InvalidConfig(format!(
                "confidence threshold {} is outside 0..=1",
                self.confidence_threshold
            )));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ClassifierError::InvalidConfig(format!(
                    "min price {} is above max price {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    fn validate_override(&self, key: &str, o: &FacetOverride) -> Result<()> {
        let origin = format!("override '{}'", key);
        if let Some(audience) = &o.audience {
            require_value("audience", &self.keywords.audience, audience, &origin)?;
        }
        if let Some(category) = &o.category {
            require_value("category", &self.keywords.category, category, &origin)?;
        }
        for occasion in o.occasions.iter().flatten() {
            require_value("occasion", &self.keywords.occasion, occasion, &origin)?;
        }
        for interest in o.interests.iter().flatten() {
            require_value("interest", &self.keywords.interest, interest, &origin)?;
        }
        Ok(())
    }

    fn check_alias_cycles(&self) -> Result<()> {
        let aliases: BTreeMap<String, String> = self
            .overrides
            .brand_aliases
            .iter()
            .map(|(from, to)| (normalize_key(from), normalize_key(to)))
            .collect();

        for start in aliases.keys() {
            let mut chain = vec![start.clone()];
            let mut current = start;
            while let Some(next) = aliases.get(current) {
                if chain.contains(next) {
                    chain.push(next.clone());
                    return Err(ClassifierError::CyclicBrandAlias {
                        chain: chain.join(" -> "),
                    });
                }
                chain.push(next.clone());
                current = next;
            }
        }
        Ok(())
    }

    fn check_contradictions(&self) -> Result<()> {
        let overrides = &self.overrides;

        let mut seen: BTreeMap<String, &FacetOverride> = BTreeMap::new();
        for (key, o) in &overrides.identifiers {
            let normalized = normalize_key(key);
            if let Some(previous) = seen.insert(normalized.clone(), o) {
                if !previous.same_effect(o) {
                    return Err(ClassifierError::ContradictoryOverride {
                        key: normalized,
                        reason: "identifier listed twice with different facets".to_string(),
                    });
                }
            }
        }

        // Brand overrides collide when two spellings resolve to the same brand
        let resolver = Overrides {
            brand_aliases: overrides
                .brand_aliases
                .iter()
                .map(|(from, to)| (normalize_key(from), normalize_key(to)))
                .collect(),
            ..Overrides::default()
        };
        let mut seen: BTreeMap<String, &FacetOverride> = BTreeMap::new();
        for (brand, o) in &overrides.brands {
            let resolved = resolver.resolve_brand(brand);
            if let Some(previous) = seen.insert(resolved.clone(), o) {
                if !previous.same_effect(o) {
                    return Err(ClassifierError::ContradictoryOverride {
                        key: resolved,
                        reason: "brand spellings resolve to the same brand with different facets".to_string(),
                    });
                }
            }
        }

        let excluded: BTreeSet<String> = overrides
            .exclude
            .identifiers
            .iter()
            .map(|k| normalize_key(k))
            .collect();
        if let Some(key) = overrides
            .force_include
            .iter()
            .map(|k| normalize_key(k))
            .find(|k| excluded.contains(k))
        {
            return Err(ClassifierError::ContradictoryOverride {
                key,
                reason: "identifier is both excluded and force-included".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_facet(name: &str, rules: &FacetRules) -> Result<()> {
    if rules.values.is_empty() {
        return Err(ClassifierError::InvalidConfig(format!("{} has an empty vocabulary", name)));
    }
    require_value(name, rules, &rules.fallback, "the fallback")?;
    for rule in &rules.rules {
        require_value(name, rules, &rule.value, "a keyword rule")?;
        if rule.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ClassifierError::InvalidConfig(format!(
                "{} rule '{}' has no keywords",
                name, rule.value
            )));
        }
    }
    Ok(())
}

fn require_value(facet: &str, rules: &FacetRules, value: &str, origin: &str) -> Result<()> {
    if rules.allows(value) {
        Ok(())
    } else {
        Err(ClassifierError::UnknownFacetValue {
            facet: facet.to_string(),
            value: value.to_string(),
            origin: origin.to_string(),
        })
    }
}

fn normalize_map_keys(map: BTreeMap<String, FacetOverride>) -> BTreeMap<String, FacetOverride> {
    map.into_iter().map(|(k, v)| (normalize_key(&k), v)).collect()
}

fn values(list: &[&str]) -> Vec<String> {
    list.iter().map(|v| v.to_string()).collect()
}

/// Baseline Dutch/English gift taxonomy. Callers extend the returned value
/// (more rules, overrides, GPC entries) before handing it to the classifier.
pub fn create_default_config() -> ClassifierConfig {
    let audience = FacetRules {
        values: values(&["men", "women", "unisex", "kids", "baby"]),
        fallback: "unisex".to_string(),
        rules: vec![
            KeywordRule::new("baby", &["baby", "babies", "newborn", "kraamcadeau", "rompertje"]),
            KeywordRule::new("kids", &["kinder", "kids", "jongens", "meisjes", "boys", "girls", "peuter", "speelgoed"]),
            KeywordRule::new("women", &["dames", "female", "vrouw", "women", "woman", "ladies", "voor haar", "for her", "moeder"]),
            KeywordRule::new("men", &["heren", "male", "mannen", "men", "mens", "voor hem", "for him", "vader"]),
            KeywordRule::new("unisex", &["unisex"]),
        ],
    };

    let category = FacetRules {
        values: values(&[
            "tech", "watches", "jewelry", "fashion", "beauty", "fragrance", "home", "kitchen",
            "sport", "outdoor", "books", "toys", "wellness", "other",
        ]),
        fallback: "other".to_string(),
        rules: vec![
            KeywordRule::new("watches", &["horloge", "watch", "chronograaf", "chronograph"]),
            KeywordRule::new("jewelry", &["sieraad", "sieraden", "jewelry", "jewellery", "ketting", "armband", "oorbel", "ring", "necklace", "bracelet", "earring", "pendant", "hanger"]),
            KeywordRule::new("tech", &["koptelefoon", "headphone", "oordopjes", "earbuds", "speaker", "bluetooth", "smartwatch", "laptop", "tablet", "camera", "drone", "powerbank", "oplader", "charger", "console", "gadget", "smart home"]),
            KeywordRule::new("fragrance", &["parfum", "eau de toilette", "eau de parfum", "fragrance", "geur", "aftershave"]),
            KeywordRule::new("beauty", &["make-up", "makeup", "skincare", "huidverzorging", "lippenstift", "mascara", "serum", "gezichtsmasker", "nagellak"]),
            KeywordRule::new("kitchen", &["keuken", "kitchen", "koken", "koekenpan", "pannen", "messen", "koffie", "coffee", "espresso", "barbecue", "bbq", "cocktail"]),
            KeywordRule::new("home", &["kussen", "plaid", "deken", "kaars", "candle", "vaas", "vase", "lamp", "poster", "decoratie", "decor", "wonen", "interieur"]),
            KeywordRule::new("sport", &["sport", "fitness", "yoga", "hardloop", "running", "fiets", "bike", "voetbal", "tennis", "golf"]),
            KeywordRule::new("outdoor", &["outdoor", "kamperen", "camping", "wandel", "hiking", "tent", "rugzak", "backpack"]),
            KeywordRule::new("fashion", &["shirt", "trui", "sweater", "hoodie", "jas", "jacket", "broek", "jurk", "dress", "sneaker", "schoen", "shoe", "tas", "bag", "riem", "belt", "portemonnee", "wallet", "sjaal", "scarf", "sokken", "socks", "baseball cap"]),
            KeywordRule::new("books", &["boek", "book", "roman", "paperback", "hardcover", "kookboek"]),
            KeywordRule::new("toys", &["speelgoed", "toy", "lego", "puzzel", "puzzle", "bordspel", "board game", "knuffel"]),
            KeywordRule::new("wellness", &["massage", "wellness", "badjas", "badzout", "bath", "ontspanning", "relax", "aromatherapie"]),
        ],
    };

    let occasion = FacetRules {
        values: values(&[
            "birthday", "christmas", "sinterklaas", "fathers-day", "mothers-day", "valentines",
            "housewarming", "baby-shower", "graduation", "retirement", "general",
        ]),
        fallback: "general".to_string(),
        rules: vec![
            KeywordRule::new("birthday", &["verjaardag", "birthday", "jarig"]),
            KeywordRule::new("christmas", &["kerst", "christmas", "xmas"]),
            KeywordRule::new("sinterklaas", &["sinterklaas", "sint", "pakjesavond"]),
            KeywordRule::new("fathers-day", &["vaderdag", "fathers day", "father's day"]),
            KeywordRule::new("mothers-day", &["moederdag", "mothers day", "mother's day"]),
            KeywordRule::new("valentines", &["valentijn", "valentine", "romantisch", "romantic"]),
            KeywordRule::new("housewarming", &["housewarming", "nieuwe woning", "verhuizing"]),
            KeywordRule::new("baby-shower", &["babyshower", "baby shower", "kraamcadeau"]),
            KeywordRule::new("graduation", &["geslaagd", "afstuderen", "graduation", "diploma"]),
            KeywordRule::new("retirement", &["pensioen", "retirement"]),
        ],
    };

    let interest = FacetRules {
        values: values(&[
            "gamer", "sustainable", "tech", "fitness", "travel", "cooking", "gardening", "reading",
            "music", "art", "fashion", "beauty", "other",
        ]),
        fallback: "other".to_string(),
        rules: vec![
            KeywordRule::new("gamer", &["gaming", "gamer", "playstation", "xbox", "nintendo", "controller"]),
            KeywordRule::new("sustainable", &["duurzaam", "sustainable", "eco", "gerecycled", "recycled", "biologisch", "organic", "vegan", "fair trade"]),
            KeywordRule::new("tech", &["bluetooth", "smart", "usb", "wifi", "draadloos", "wireless"]),
            KeywordRule::new("fitness", &["fitness", "workout", "yoga", "hardlopen", "running", "gym"]),
            KeywordRule::new("travel", &["reis", "travel", "koffer", "suitcase", "paspoort"]),
            KeywordRule::new("cooking", &["koken", "cooking", "recept", "chef", "keuken"]),
            KeywordRule::new("gardening", &["tuin", "garden", "planten"]),
            KeywordRule::new("reading", &["boek", "book", "lezen", "e-reader", "kindle"]),
            KeywordRule::new("music", &["muziek", "music", "vinyl", "speaker", "koptelefoon", "headphone"]),
            KeywordRule::new("art", &["kunst", "art print", "schilder", "painting", "tekenen"]),
            KeywordRule::new("fashion", &["modieus", "fashion", "stijl", "style"]),
            KeywordRule::new("beauty", &["beauty", "verzorging", "skincare", "make-up"]),
        ],
    };

    let gpc_mapping = [
        ("Apparel & Accessories > Jewelry > Watches", "watches"),
        ("Apparel & Accessories > Jewelry", "jewelry"),
        ("Apparel & Accessories", "fashion"),
        ("Electronics", "tech"),
        ("Health & Beauty > Personal Care > Cosmetics > Perfume & Cologne", "fragrance"),
        ("Health & Beauty > Personal Care > Cosmetics", "beauty"),
        ("Health & Beauty", "wellness"),
        ("Home & Garden > Kitchen & Dining", "kitchen"),
        ("Home & Garden", "home"),
        ("Sporting Goods > Outdoor Recreation", "outdoor"),
        ("Sporting Goods", "sport"),
        ("Media > Books", "books"),
        ("Toys & Games", "toys"),
    ]
    .into_iter()
    .map(|(path, category)| GpcRule {
        path: path.to_string(),
        category: category.to_string(),
    })
    .collect();

    ClassifierConfig {
        keywords: KeywordSet {
            audience,
            category,
            occasion,
            interest,
            exclude: values(&["vervangingsonderdeel", "spare part", "navulling", "refill", "cartridge", "batterij", "battery pack", "kabel", "cable", "adapter"]),
            force_giftable: values(&["cadeau", "gift", "geschenk", "giftset", "cadeauset"]),
            not_giftable: values(&["reparatie", "repair kit", "onderdeel", "toner"]),
        },
        gpc_mapping,
        overrides: Overrides::default(),
        confidence_threshold: default_confidence_threshold(),
        min_price: Some(5.0),
        max_price: Some(1000.0),
    }
}
