use crate::sources::{
    adapter_for, normalize_amazon, normalize_awin, normalize_bol, normalize_coolblue,
    normalize_manual,
};
use crate::types::{
    DropReason, FeedBatch, FeedSource, NormalizeContext, NormalizedBatch, Product, RawFeedRow,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Route a raw row to the adapter for its source.
pub fn normalize(
    row: &RawFeedRow,
    source: FeedSource,
    ctx: &NormalizeContext,
) -> Result<Product, DropReason> {
    match source {
        FeedSource::Awin => normalize_awin(row, ctx),
        FeedSource::Coolblue => normalize_coolblue(row, ctx),
        FeedSource::Bol => normalize_bol(row, ctx),
        FeedSource::Amazon => normalize_amazon(row, ctx),
        FeedSource::Manual => normalize_manual(row, ctx),
    }
}

/// Normalize every row of one feed. Malformed rows are dropped and counted.
pub fn normalize_batch(
    rows: &[RawFeedRow],
    source: FeedSource,
    ctx: &NormalizeContext,
) -> NormalizedBatch {
    let adapter = adapter_for(source);
    let mut products = Vec::with_capacity(rows.len());
    let mut drops: BTreeMap<DropReason, usize> = BTreeMap::new();

    for (line, row) in rows.iter().enumerate() {
        match adapter.normalize_row(row, ctx) {
            Ok(product) => products.push(product),
            Err(reason) => {
                debug!("Dropping {} row {}: {}", adapter.source_name(), line + 1, reason);
                *drops.entry(reason).or_insert(0) += 1;
            }
        }
    }

    let malformed: usize = drops.values().sum();
    if malformed > 0 {
        warn!("Dropped {}/{} malformed {} rows", malformed, rows.len(), source);
    }

    let without_price = products.iter().filter(|p| p.price.is_none()).count();
    if without_price > 0 {
        debug!("{} {} products have no usable EUR price", without_price, source);
    }

    info!("Normalized {} products from {} {} rows", products.len(), rows.len(), source);

    NormalizedBatch {
        source: adapter.source(),
        products,
        malformed,
        drops,
    }
}

/// Normalize a feed batch read by a `FeedReader`.
pub fn normalize_feed(batch: &FeedBatch, ctx: &NormalizeContext) -> NormalizedBatch {
    let mut ctx = ctx.clone();
    if batch.spec.advertiser_id.is_some() {
        ctx.advertiser_id = batch.spec.advertiser_id.clone();
    }
    normalize_batch(&batch.rows, batch.spec.source, &ctx)
}
