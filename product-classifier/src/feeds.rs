use crate::types::{ClassifierError, FeedBatch, FeedReader, FeedSpec, RawFeedRow, Result};
use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk layout of a feed snapshot, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Csv,
    Json,
}

impl FeedFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") | Some("tsv") | Some("txt") => Ok(FeedFormat::Csv),
            Some("json") => Ok(FeedFormat::Json),
            _ => Err(ClassifierError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

/// Guess the delimiter from the header line. Feeds come comma, semicolon,
/// tab or pipe separated.
fn sniff_delimiter(data: &[u8]) -> u8 {
    let header_end = data.iter().position(|b| *b == b'\n').unwrap_or(data.len());
    let header = &data[..header_end];
    let mut best = (b',', 0);
    for delimiter in [b',', b';', b'\t', b'|'] {
        let count = header.iter().filter(|b| **b == delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}

/// Rows of a CSV feed keyed by header. Blank cells are left out.
///
/// Cells that are not valid UTF-8 are decoded as Latin-1.
pub fn parse_csv(data: &[u8]) -> Result<Vec<RawFeedRow>> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(data))
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| decode_cell(h).trim().to_string())
        .collect();
    let mut rows = Vec::new();
    let mut recoded = 0usize;
    for record in reader.byte_records() {
        let record = record?;
        let row: RawFeedRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| {
                let text = match std::str::from_utf8(cell) {
                    Ok(text) => text.to_string(),
                    Err(_) => {
                        recoded += 1;
                        latin1(cell)
                    }
                };
                (header, text)
            })
            .filter(|(_, cell)| !cell.trim().is_empty())
            .map(|(header, cell)| (header.clone(), Value::String(cell)))
            .collect();
        if !row.is_empty() {
            rows.push(row);
        }
    }
    if recoded > 0 {
        warn!("{} CSV cells were not UTF-8 and were read as Latin-1", recoded);
    }
    Ok(rows)
}

fn decode_cell(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).map_or_else(|_| latin1(bytes), str::to_string)
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Rows of a JSON feed: either a top-level array of objects or an object
/// wrapping one under `items` or `products`.
pub fn parse_json(data: &[u8]) -> Result<Vec<RawFeedRow>> {
    let value: Value = serde_json::from_slice(data)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items").or_else(|| map.remove("products")) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ClassifierError::FeedRead(
                    "JSON feed object has no items array".to_string(),
                ))
            }
        },
        _ => {
            return Err(ClassifierError::FeedRead(
                "JSON feed must be an array or an object with items".to_string(),
            ))
        }
    };

    let total = items.len();
    let rows: Vec<RawFeedRow> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        })
        .collect();
    if rows.len() < total {
        warn!("Skipped {} non-object entries in JSON feed", total - rows.len());
    }
    Ok(rows)
}

/// Reads feed snapshots from disk. Relative feed paths resolve against
/// `base_dir`, normally the directory of the feed manifest.
#[derive(Debug, Clone, Default)]
pub struct FileFeedReader {
    base_dir: Option<PathBuf>,
}

impl FileFeedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl FeedReader for FileFeedReader {
    async fn read(&self, spec: &FeedSpec) -> anyhow::Result<FeedBatch> {
        let path = self.resolve(&spec.path);
        let format = FeedFormat::from_path(&path)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {} feed {}", spec.source, path.display()))?;

        let rows = match format {
            FeedFormat::Csv => parse_csv(&data),
            FeedFormat::Json => parse_json(&data),
        }
        .with_context(|| format!("parsing {} feed {}", spec.source, path.display()))?;

        debug!("Read {} rows from {}", rows.len(), path.display());
        Ok(FeedBatch {
            spec: spec.clone(),
            rows,
        })
    }
}

/// Load the JSON array of feeds to process.
pub async fn load_feed_manifest(path: impl AsRef<Path>) -> Result<Vec<FeedSpec>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await?;
    let feeds: Vec<FeedSpec> = serde_json::from_str(&raw)?;
    info!("Feed manifest {} lists {} feeds", path.display(), feeds.len());
    Ok(feeds)
}
