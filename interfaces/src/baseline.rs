use std::collections::HashMap;

use anyhow::Result;

use crate::defs::FeedBatch;
use crate::defs::FeedReader;
use crate::defs::FeedSpec;
use crate::defs::RawFeedRow;

/// Serves rows registered up front, keyed by feed path.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFeedReader {
    feeds: HashMap<String, Vec<RawFeedRow>>,
}

impl InMemoryFeedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, path: impl Into<String>, rows: Vec<RawFeedRow>) -> Self {
        self.feeds.insert(path.into(), rows);
        self
    }
}

impl FeedReader for InMemoryFeedReader {
    async fn read(&self, spec: &FeedSpec) -> Result<FeedBatch> {
        let rows = self
            .feeds
            .get(&spec.path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no in-memory feed registered for {}", spec.path))?;
        Ok(FeedBatch {
            spec: spec.clone(),
            rows,
        })
    }
}
