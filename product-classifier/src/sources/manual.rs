use super::{collect_images, description_field, eur_price, link_field, text_field, ProductDraft};
use crate::traits::FeedAdapter;
use crate::types::{DropReason, FeedSource, NormalizeContext, Product, RawFeedRow};
use crate::utils::fields;

/// Hand-curated editorial picks, already in (roughly) the unified shape.
pub struct ManualAdapter;

impl FeedAdapter for ManualAdapter {
    fn source(&self) -> FeedSource {
        FeedSource::Manual
    }

    fn source_name(&self) -> String {
        "Manual".to_string()
    }

    fn normalize_row(
        &self,
        row: &RawFeedRow,
        ctx: &NormalizeContext,
    ) -> Result<Product, DropReason> {
        normalize_manual(row, ctx)
    }
}

pub fn normalize_manual(row: &RawFeedRow, _ctx: &NormalizeContext) -> Result<Product, DropReason> {
    let merchant = text_field(row, &["merchant", "retailer"]);
    let merchant_id = merchant
        .as_deref()
        .map(|m| m.replace(' ', "-"))
        .unwrap_or_else(|| "editorial".to_string());

    let mut draft = ProductDraft::new(FeedSource::Manual, merchant_id);
    draft.product_id = fields::first(row, &["id", "sku"]);
    draft.merchant = merchant;
    draft.title = text_field(row, &["title", "name"]);
    draft.description = description_field(row, &["description"]);
    draft.brand = text_field(row, &["brand"]);

    draft.price = eur_price(row, &["currency"], &["price"]);
    draft.original_price = eur_price(row, &["currency"], &["originalPrice", "original_price"]);
    draft.images = collect_images(row, &["images", "image", "imageUrl", "image_url"]);
    draft.affiliate_url = link_field(row, &["affiliateUrl", "affiliate_url", "url"]);

    draft.category = text_field(row, &["category"]);
    draft.product_type = text_field(row, &["productType", "product_type"]);
    draft.google_product_category = text_field(row, &["googleProductCategory", "google_product_category"]);

    draft.gtin = text_field(row, &["gtin", "ean"]);
    draft.mpn = text_field(row, &["mpn"]);
    draft.sku = text_field(row, &["sku"]);

    draft.in_stock = fields::flag(row, &["inStock", "in_stock"]).unwrap_or(true);
    draft.suitable_for = text_field(row, &["audience", "suitableFor"]);

    draft.finish()
}
