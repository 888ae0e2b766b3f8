use crate::hash::match_keys;
use crate::types::{FeedSource, Product};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

/// Disjoint-set forest over product positions.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    /// The smaller position becomes the root, so roots are first appearances.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Positions of each duplicate group, groups in order of first appearance.
fn group_positions(products: &[&Product]) -> Vec<Vec<usize>> {
    let mut forest = UnionFind::new(products.len());
    let mut owner: HashMap<String, usize> = HashMap::new();

    for (idx, product) in products.iter().enumerate() {
        for key in match_keys(product) {
            match owner.get(&key) {
                Some(&first) => forest.union(first, idx),
                None => {
                    owner.insert(key, idx);
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for idx in 0..products.len() {
        let root = forest.find(idx);
        let slot = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(idx);
    }
    groups
}

fn richness(product: &Product) -> u8 {
    product.has_image() as u8 + product.has_description() as u8
}

/// Representative order: priced before unpriced, cheaper first, then more
/// complete data. Equal products keep input order through the stable sort.
fn representative_order(a: &Product, b: &Product) -> Ordering {
    let by_price = match (a.price, b.price) {
        (Some(pa), Some(pb)) => pa.total_cmp(&pb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_price.then_with(|| richness(b).cmp(&richness(a)))
}

fn pick_representative(group: &[usize], products: &[&Product]) -> usize {
    let mut members = group.to_vec();
    members.sort_by(|&a, &b| representative_order(products[a], products[b]));
    members[0]
}

/// Collapse duplicate listings to one representative per group, preserving
/// the order in which groups first appear.
pub fn dedup<T: AsRef<Product>>(products: Vec<T>) -> Vec<T> {
    let total = products.len();
    let refs: Vec<&Product> = products.iter().map(|p| p.as_ref()).collect();
    let groups = group_positions(&refs);
    let keep: Vec<usize> = groups
        .iter()
        .map(|group| pick_representative(group, &refs))
        .collect();
    drop(refs);

    let mut slots: Vec<Option<T>> = products.into_iter().map(Some).collect();
    let unique: Vec<T> = keep.into_iter().filter_map(|idx| slots[idx].take()).collect();

    info!("Deduplicated {} products into {} ({} duplicates removed)", total, unique.len(), total - unique.len());
    unique
}

/// A duplicate group with its chosen listing and where the others came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupGroup<T> {
    pub representative: T,
    /// Product ids of every member, representative included, in input order.
    pub member_ids: Vec<String>,
    pub sources: Vec<FeedSource>,
    /// Lowest and highest price among priced members.
    pub price_range: Option<(f64, f64)>,
}

impl<T> DedupGroup<T> {
    pub fn duplicates(&self) -> usize {
        self.member_ids.len().saturating_sub(1)
    }
}

/// Same grouping as `dedup`, keeping provenance for every group.
pub fn dedup_multi_source<T: AsRef<Product>>(products: Vec<T>) -> Vec<DedupGroup<T>> {
    let refs: Vec<&Product> = products.iter().map(|p| p.as_ref()).collect();
    let groups = group_positions(&refs);

    let mut plans = Vec::with_capacity(groups.len());
    for group in &groups {
        let mut sources: Vec<FeedSource> = group.iter().map(|&idx| refs[idx].source).collect();
        sources.sort_by_key(|s| s.as_str());
        sources.dedup();

        let prices: Vec<f64> = group.iter().filter_map(|&idx| refs[idx].price).collect();
        let price_range = prices.iter().copied().reduce(f64::min).zip(prices.iter().copied().reduce(f64::max));

        plans.push((
            pick_representative(group, &refs),
            group.iter().map(|&idx| refs[idx].id.clone()).collect::<Vec<_>>(),
            sources,
            price_range,
        ));
    }
    drop(refs);

    let mut slots: Vec<Option<T>> = products.into_iter().map(Some).collect();
    let merged: Vec<DedupGroup<T>> = plans
        .into_iter()
        .filter_map(|(idx, member_ids, sources, price_range)| {
            slots[idx].take().map(|representative| DedupGroup {
                representative,
                member_ids,
                sources,
                price_range,
            })
        })
        .collect();

    let cross_source = merged.iter().filter(|g| g.sources.len() > 1).count();
    debug!("{} duplicate groups, {} spanning several sources", merged.len(), cross_source);
    merged
}
