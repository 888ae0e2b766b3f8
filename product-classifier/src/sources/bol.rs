use super::{collect_images, description_field, eur_price, link_field, text_field, ProductDraft};
use crate::traits::FeedAdapter;
use crate::types::{DropReason, FeedSource, NormalizeContext, Product, RawFeedRow};
use crate::utils::fields;

const IMAGE_KEYS: [&str; 4] = ["image_large", "image_url", "image", "media_url"];

/// Bol.com partner product feed.
pub struct BolAdapter;

impl FeedAdapter for BolAdapter {
    fn source(&self) -> FeedSource {
        FeedSource::Bol
    }

    fn source_name(&self) -> String {
        "Bol.com".to_string()
    }

    fn normalize_row(
        &self,
        row: &RawFeedRow,
        ctx: &NormalizeContext,
    ) -> Result<Product, DropReason> {
        normalize_bol(row, ctx)
    }
}

pub fn normalize_bol(row: &RawFeedRow, _ctx: &NormalizeContext) -> Result<Product, DropReason> {
    let mut draft = ProductDraft::new(FeedSource::Bol, "bol");
    draft.product_id = fields::first(row, &["id", "product_id", "ean"]);
    draft.merchant = Some("Bol.com".to_string());
    draft.title = text_field(row, &["title", "product_name"]);
    draft.description = description_field(row, &["description", "short_description"]);
    draft.brand = text_field(row, &["brand", "publisher", "author"]);

    draft.price = eur_price(row, &["currency"], &["price", "offer_price"]);
    draft.original_price = eur_price(row, &["currency"], &["list_price"]);
    draft.images = collect_images(row, &IMAGE_KEYS);
    draft.affiliate_url = link_field(row, &["product_url", "url"]);

    draft.category = text_field(row, &["category_path", "category"]);
    draft.product_type = text_field(row, &["product_type", "sub_category"]);
    draft.google_product_category = text_field(row, &["google_product_category"]);

    draft.gtin = text_field(row, &["ean", "gtin"]);
    draft.mpn = text_field(row, &["mpn"]);
    draft.sku = text_field(row, &["sku", "id", "product_id"]);

    draft.in_stock = fields::flag(row, &["in_stock", "availability"]).unwrap_or(true);
    // Delivery code 1 means ordered before midnight, delivered tomorrow
    draft.delivery_days = match fields::first(row, &["delivery_code"]).as_deref() {
        Some("1") => Some(1),
        Some(_) => Some(2),
        None => None,
    };

    draft.finish()
}
