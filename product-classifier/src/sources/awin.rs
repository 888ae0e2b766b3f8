use super::{
    collect_images, delivery_days, description_field, eur_price, link_field, text_field, ProductDraft,
};
use crate::traits::FeedAdapter;
use crate::types::{DropReason, FeedSource, NormalizeContext, Product, RawFeedRow};
use crate::utils::{fields, url};

const IMAGE_KEYS: [&str; 6] = [
    "large_image",
    "merchant_image_url",
    "aw_image_url",
    "alternate_image",
    "merchant_thumb_url",
    "aw_thumb_url",
];

/// AWIN enhanced feed (product_name, search_price, aw_deep_link, ...).
pub struct AwinAdapter;

impl FeedAdapter for AwinAdapter {
    fn source(&self) -> FeedSource {
        FeedSource::Awin
    }

    fn source_name(&self) -> String {
        "AWIN".to_string()
    }

    fn normalize_row(
        &self,
        row: &RawFeedRow,
        ctx: &NormalizeContext,
    ) -> Result<Product, DropReason> {
        normalize_awin(row, ctx)
    }
}

pub fn normalize_awin(row: &RawFeedRow, ctx: &NormalizeContext) -> Result<Product, DropReason> {
    let advertiser_id = ctx
        .advertiser_id
        .clone()
        .or_else(|| fields::first(row, &["merchant_id", "advertiser_id"]))
        .unwrap_or_else(|| "unknown".to_string());

    let mut draft = ProductDraft::new(FeedSource::Awin, advertiser_id.clone());
    draft.product_id = fields::first(row, &["product_id", "aw_product_id", "merchant_product_id"]);
    draft.merchant = text_field(row, &["merchant_name"]);
    draft.title = text_field(row, &["product_name", "title"]);
    draft.description = description_field(row, &["description", "product_short_description"]);
    draft.brand = text_field(row, &["brand_name", "brand"]);

    draft.price = eur_price(row, &["currency"], &["search_price", "price", "store_price"]);
    draft.original_price = eur_price(row, &["currency"], &["rrp_price", "product_price_old"]);
    draft.images = collect_images(row, &IMAGE_KEYS);
    draft.affiliate_url = affiliate_url(row, &advertiser_id, ctx);

    draft.category = text_field(row, &["merchant_category"]);
    draft.product_type = text_field(row, &["product_type", "custom_1"]);
    draft.google_product_category = text_field(row, &["category_name", "google_product_category"]);

    draft.gtin = text_field(row, &["product_GTIN", "ean", "gtin"]);
    draft.mpn = text_field(row, &["mpn", "model_number"]);
    draft.sku = text_field(row, &["sku", "product_id", "aw_product_id"]);

    draft.in_stock = fields::flag(row, &["in_stock", "stock_status"]).unwrap_or(true);
    draft.delivery_days = delivery_days(row, &["delivery_time"]);
    draft.suitable_for = text_field(row, &["Fashion:suitable_for"]);

    draft.finish()
}

/// Tracked deep link, built from the merchant URL when the feed has none.
fn affiliate_url(row: &RawFeedRow, advertiser_id: &str, ctx: &NormalizeContext) -> Option<String> {
    if let Some(deep_link) = link_field(row, &["aw_deep_link"]) {
        return Some(deep_link);
    }
    let merchant_link = link_field(row, &["merchant_deep_link"])?;
    match ctx.awin_affiliate_id.as_deref() {
        Some(affiliate_id) => url::awin_deep_link(advertiser_id, affiliate_id, &merchant_link)
            .or(Some(merchant_link)),
        None => Some(merchant_link),
    }
}
