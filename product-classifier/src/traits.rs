use crate::index::ProgrammaticIndex;
use crate::types::{DropReason, FeedSource, NormalizeContext, Product, RawFeedRow, Result};

/// Maps one affiliate network's row layout onto the unified `Product`.
pub trait FeedAdapter: Send + Sync {
    /// Feed source this adapter understands
    fn source(&self) -> FeedSource;

    /// Human-readable name for logs
    fn source_name(&self) -> String;

    /// Convert a single raw row. Rows missing a mandatory field come back as
    /// the reason they were dropped.
    fn normalize_row(
        &self,
        row: &RawFeedRow,
        ctx: &NormalizeContext,
    ) -> std::result::Result<Product, DropReason>;
}

/// Destination for finished landing-page indices.
pub trait IndexWriter {
    /// Persist one index, replacing any previous artifact for the same page.
    /// Returns where it was written.
    async fn write_index(&self, index: &ProgrammaticIndex) -> Result<String>;
}
