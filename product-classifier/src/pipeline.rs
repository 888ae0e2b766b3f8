use crate::classifier::classify_batch;
use crate::config::{create_default_config, ClassifierConfig};
use crate::dedup::dedup;
use crate::hash::assign_canonical_keys;
use crate::index::{build_index, PageConfig, RunInfo};
use crate::normalizer::normalize_feed;
use crate::traits::IndexWriter;
use crate::types::{
    ClassifiedProduct, ClassifierError, DropReason, FeedReader, FeedSource, FeedSpec,
    NormalizeContext, Result,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Counts collected over one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub rows_read: usize,
    pub products_normalized: usize,
    pub malformed: BTreeMap<FeedSource, usize>,
    pub drops: BTreeMap<DropReason, usize>,
    pub excluded: usize,
    pub classified: usize,
    pub needs_review: usize,
    pub duplicates_removed: usize,
    pub pool_size: usize,
    /// Written artifact locations, in page order.
    pub pages_written: Vec<String>,
}

impl RunReport {
    pub fn total_malformed(&self) -> usize {
        self.malformed.values().sum()
    }

    pub fn malformed_ratio(&self) -> f64 {
        if self.rows_read == 0 {
            0.0
        } else {
            self.total_malformed() as f64 / self.rows_read as f64
        }
    }
}

/// Feeds in, one index per page out: read, normalize, classify, dedup, then
/// build and write every page.
pub struct IndexPipeline<R, W> {
    config: ClassifierConfig,
    feeds: Vec<FeedSpec>,
    pages: Vec<PageConfig>,
    context: NormalizeContext,
    max_malformed_ratio: Option<f64>,
    reader: R,
    writer: W,
}

impl<R, W> IndexPipeline<R, W> {
    pub fn builder(reader: R, writer: W) -> PipelineBuilder<R, W> {
        PipelineBuilder::new(reader, writer)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

impl<R: FeedReader, W> IndexPipeline<R, W> {
    /// Read, normalize, classify and deduplicate every feed into the shared
    /// product pool that pages are built from.
    pub async fn build_pool(&self) -> Result<(Vec<ClassifiedProduct>, RunReport)> {
        let mut report = RunReport::default();
        let mut products = Vec::new();

        for spec in &self.feeds {
            let batch = self.reader.read(spec).await.map_err(|e| {
                error!("Failed to read {} feed {}: {:#}", spec.source, spec.path, e);
                ClassifierError::FeedRead(format!("{}: {:#}", spec.path, e))
            })?;

            let normalized = normalize_feed(&batch, &self.context);
            report.rows_read += normalized.rows_seen();
            *report.malformed.entry(spec.source).or_insert(0) += normalized.malformed;
            for (reason, count) in &normalized.drops {
                *report.drops.entry(*reason).or_insert(0) += count;
            }
            products.extend(normalized.products);
        }
        report.products_normalized = products.len();

        if let Some(allowed) = self.max_malformed_ratio {
            if report.malformed_ratio() > allowed {
                return Err(ClassifierError::TooManyMalformed {
                    dropped: report.total_malformed(),
                    rows: report.rows_read,
                    allowed,
                });
            }
        }

        let classified = classify_batch(products, &self.config);
        report.excluded = classified.excluded;
        report.classified = classified.products.len();
        report.needs_review = classified
            .products
            .iter()
            .filter(|p| p.facets.needs_review)
            .count();

        let mut pool = classified.products;
        assign_canonical_keys(&mut pool);
        let pool = dedup(pool);
        report.duplicates_removed = report.classified - pool.len();
        report.pool_size = pool.len();

        info!(
            "Pool ready: {} products from {} rows ({} malformed, {} excluded, {} duplicates)",
            report.pool_size,
            report.rows_read,
            report.total_malformed(),
            report.excluded,
            report.duplicates_removed
        );
        Ok((pool, report))
    }
}

impl<R: FeedReader, W: IndexWriter> IndexPipeline<R, W> {
    /// Full run: build the pool, then build and write every page index.
    pub async fn run(&self) -> Result<RunReport> {
        let run = RunInfo::new();
        info!("Starting run {} over {} feeds and {} pages", run.run_id, self.feeds.len(), self.pages.len());

        let (pool, mut report) = self.build_pool().await?;

        for page in &self.pages {
            let index = build_index(page, &pool, &run)?;
            if index.metadata.total_products == 0 {
                warn!("Writing empty index for page {}", page.slug);
            }
            let location = self.writer.write_index(&index).await?;
            report.pages_written.push(location);
        }

        info!("Run {} wrote {} page indices", run.run_id, report.pages_written.len());
        Ok(report)
    }
}

/// Builder for `IndexPipeline`. The config defaults to
/// `create_default_config()`. Pass `()` as the writer when only the product
/// pool is needed.
pub struct PipelineBuilder<R, W> {
    config: Option<ClassifierConfig>,
    feeds: Vec<FeedSpec>,
    pages: Vec<PageConfig>,
    context: NormalizeContext,
    max_malformed_ratio: Option<f64>,
    reader: R,
    writer: W,
}

impl<R, W> PipelineBuilder<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            config: None,
            feeds: Vec::new(),
            pages: Vec::new(),
            context: NormalizeContext::default(),
            max_malformed_ratio: None,
            reader,
            writer,
        }
    }

    pub fn config(mut self, config: ClassifierConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn add_feed(mut self, spec: FeedSpec) -> Self {
        self.feeds.push(spec);
        self
    }

    pub fn feeds(mut self, specs: impl IntoIterator<Item = FeedSpec>) -> Self {
        self.feeds.extend(specs);
        self
    }

    pub fn add_page(mut self, page: PageConfig) -> Self {
        self.pages.push(page);
        self
    }

    pub fn pages(mut self, pages: impl IntoIterator<Item = PageConfig>) -> Self {
        self.pages.extend(pages);
        self
    }

    pub fn context(mut self, context: NormalizeContext) -> Self {
        self.context = context;
        self
    }

    pub fn max_malformed_ratio(mut self, ratio: Option<f64>) -> Self {
        self.max_malformed_ratio = ratio;
        self
    }

    /// Validate the config and every page before anything is read.
    pub fn build(self) -> Result<IndexPipeline<R, W>> {
        let config = self.config.unwrap_or_else(create_default_config).prepare()?;
        for page in &self.pages {
            page.validate()?;
        }
        if let Some(ratio) = self.max_malformed_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ClassifierError::InvalidConfig(format!(
                    "max malformed ratio {} is outside 0..=1",
                    ratio
                )));
            }
        }

        Ok(IndexPipeline {
            config,
            feeds: self.feeds,
            pages: self.pages,
            context: self.context,
            max_malformed_ratio: self.max_malformed_ratio,
            reader: self.reader,
            writer: self.writer,
        })
    }
}
