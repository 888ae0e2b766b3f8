use super::{collect_images, description_field, eur_price, link_field, text_field, ProductDraft};
use crate::traits::FeedAdapter;
use crate::types::{DropReason, FeedSource, NormalizeContext, Product, RawFeedRow};
use crate::utils::{fields, url};

const IMAGE_KEYS: [&str; 7] = [
    "LargeImage",
    "Images.Primary.Large.URL",
    "ImageURL",
    "image_url",
    "MediumImage",
    "Images.Primary.Medium.URL",
    "SmallImage",
];

/// Amazon rows, either flat CSV exports or Product Advertising API items.
pub struct AmazonAdapter;

impl FeedAdapter for AmazonAdapter {
    fn source(&self) -> FeedSource {
        FeedSource::Amazon
    }

    fn source_name(&self) -> String {
        "Amazon".to_string()
    }

    fn normalize_row(
        &self,
        row: &RawFeedRow,
        ctx: &NormalizeContext,
    ) -> Result<Product, DropReason> {
        normalize_amazon(row, ctx)
    }
}

pub fn normalize_amazon(row: &RawFeedRow, ctx: &NormalizeContext) -> Result<Product, DropReason> {
    let asin = fields::first(row, &["ASIN", "asin", "product_id"]);

    let mut draft = ProductDraft::new(FeedSource::Amazon, "amazon");
    draft.product_id = asin.clone();
    draft.merchant = Some("Amazon".to_string());
    draft.title = text_field(row, &["Title", "title", "product_name", "ItemInfo.Title.DisplayValue"]);
    draft.description = description_field(
        row,
        &["Description", "description", "Feature", "ItemInfo.Features.DisplayValues.0"],
    );
    draft.brand = text_field(
        row,
        &[
            "Brand",
            "brand",
            "Manufacturer",
            "ItemInfo.ByLineInfo.Brand.DisplayValue",
            "ItemInfo.ByLineInfo.Manufacturer.DisplayValue",
        ],
    );

    let currency_keys = ["Currency", "currency", "Offers.Listings.0.Price.Currency"];
    draft.price = eur_price(row, &currency_keys, &["Price", "price", "Offers.Listings.0.Price.Amount"]);
    draft.original_price = eur_price(
        row,
        &currency_keys,
        &["ListPrice", "rrp", "Offers.Listings.0.SavingBasis.Amount"],
    );
    draft.images = collect_images(row, &IMAGE_KEYS);
    draft.affiliate_url = link_field(row, &["DetailPageURL", "url", "link"]).or_else(|| {
        let asin = asin.as_deref()?;
        let tag = ctx.amazon_tag.as_deref()?;
        url::amazon_detail_link(asin, tag)
    });

    draft.category = text_field(
        row,
        &["ProductGroup", "Category", "Binding", "ItemInfo.Classifications.ProductGroup.DisplayValue"],
    );
    draft.product_type = text_field(
        row,
        &["ProductTypeName", "Binding", "ItemInfo.Classifications.Binding.DisplayValue"],
    );
    draft.google_product_category = text_field(row, &["google_product_category"]);

    draft.gtin = text_field(row, &["EAN", "UPC", "ean", "ItemInfo.ExternalIds.EANs.DisplayValues.0"]);
    draft.mpn = text_field(row, &["PartNumber", "mpn", "ItemInfo.ManufactureInfo.Model.DisplayValue"]);
    draft.sku = text_field(row, &["SKU", "ASIN", "asin"]);

    draft.in_stock = fields::flag(row, &["Availability", "availability"]).unwrap_or(true);

    draft.finish()
}
