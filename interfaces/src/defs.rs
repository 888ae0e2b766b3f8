use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One row exactly as an affiliate network delivered it.
///
/// CSV feeds produce string values only; JSON feeds may nest objects and
/// arrays (Amazon PA-API items, for example).
pub type RawFeedRow = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Awin,
    Coolblue,
    Bol,
    Amazon,
    Manual,
}

impl FeedSource {
    pub const ALL: [FeedSource; 5] = [
        FeedSource::Awin,
        FeedSource::Coolblue,
        FeedSource::Bol,
        FeedSource::Amazon,
        FeedSource::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSource::Awin => "awin",
            FeedSource::Coolblue => "coolblue",
            FeedSource::Bol => "bol",
            FeedSource::Amazon => "amazon",
            FeedSource::Manual => "manual",
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        FeedSource::ALL
            .into_iter()
            .find(|source| source.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("unknown feed source: {}", s))
    }
}

/// Where a feed snapshot lives and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub path: String,
    pub source: FeedSource,
    /// AWIN advertiser (merchant) id, part of the product id for AWIN rows.
    #[serde(default)]
    pub advertiser_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub spec: FeedSpec,
    pub rows: Vec<RawFeedRow>,
}

impl FeedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Object style note:
// Download scripts drop feed snapshots on disk; a FeedReader turns one
// snapshot into rows and nothing else. Readers are created per pipeline run
// and hold no state between runs.

pub trait FeedReader {
    async fn read(&self, spec: &FeedSpec) -> Result<FeedBatch>;
}
