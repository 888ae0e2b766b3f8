use super::{
    collect_images, delivery_days, description_field, eur_price, link_field, text_field, ProductDraft,
};
use crate::traits::FeedAdapter;
use crate::types::{DropReason, FeedSource, NormalizeContext, Product, RawFeedRow};
use crate::utils::{fields, text};

const IMAGE_KEYS: [&str; 4] = ["large_image", "merchant_image_url", "aw_image_url", "image_url"];

/// Coolblue product feed, delivered through AWIN with Coolblue-specific columns.
pub struct CoolblueAdapter;

impl FeedAdapter for CoolblueAdapter {
    fn source(&self) -> FeedSource {
        FeedSource::Coolblue
    }

    fn source_name(&self) -> String {
        "Coolblue".to_string()
    }

    fn normalize_row(
        &self,
        row: &RawFeedRow,
        ctx: &NormalizeContext,
    ) -> Result<Product, DropReason> {
        normalize_coolblue(row, ctx)
    }
}

pub fn normalize_coolblue(row: &RawFeedRow, _ctx: &NormalizeContext) -> Result<Product, DropReason> {
    let merchant_id = fields::first(row, &["merchant_id"]).unwrap_or_else(|| "coolblue".to_string());

    let mut draft = ProductDraft::new(FeedSource::Coolblue, merchant_id);
    draft.product_id = fields::first(row, &["aw_product_id", "merchant_product_id", "product_id"]);
    draft.merchant = text_field(row, &["merchant_name"]).or_else(|| Some("Coolblue".to_string()));
    draft.title = text_field(row, &["product_name", "title"]);
    draft.description = description_field(row, &["description", "product_short_description"]);
    draft.brand = text_field(row, &["brand_name", "brand", "manufacturer"]);

    draft.price = eur_price(row, &["currency"], &["search_price", "price", "store_price"]);
    draft.original_price = eur_price(row, &["currency"], &["rrp_price", "product_price_old"]);
    draft.images = collect_images(row, &IMAGE_KEYS);
    draft.affiliate_url = link_field(row, &["aw_deep_link", "merchant_deep_link", "product_link"]);

    draft.category = category_path(row);
    draft.product_type = text_field(row, &["product_type", "Fashion:category"]);
    draft.google_product_category = text_field(row, &["category_name", "google_product_category"]);

    draft.gtin = text_field(row, &["ean", "product_GTIN", "gtin"]);
    draft.mpn = text_field(row, &["mpn"]);
    draft.sku = text_field(row, &["sku", "aw_product_id", "merchant_product_id", "product_id"]);

    draft.in_stock = fields::flag(row, &["in_stock", "stock_status"]).unwrap_or(true);
    // Coolblue ships next day unless the feed says otherwise
    draft.delivery_days = delivery_days(row, &["delivery_time"]).or(Some(1));
    draft.suitable_for = text_field(row, &["Fashion:suitable_for"]);

    draft.finish()
}

/// Coolblue spreads its taxonomy over several columns; join what is there.
fn category_path(row: &RawFeedRow) -> Option<String> {
    let parts: Vec<String> = ["merchant_category", "merchant_product_category_path", "product_type"]
        .iter()
        .filter_map(|key| text::clean_text(fields::first(row, &[*key]).as_deref()))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" > "))
    }
}
