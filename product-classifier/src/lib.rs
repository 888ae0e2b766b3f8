pub mod types;
pub mod utils;
pub mod traits;
pub mod sources;
pub mod normalizer;
pub mod config;
pub mod classifier;
pub mod hash;
pub mod dedup;
pub mod diversify;
pub mod index;
pub mod feeds;
pub mod pipeline;

pub use types::*;
pub use traits::{FeedAdapter, IndexWriter};
pub use normalizer::{normalize, normalize_batch, normalize_feed};
pub use config::{create_default_config, ClassifierConfig, FacetOverride, FacetRules, KeywordRule};
pub use classifier::{classify, classify_batch, search_text};
pub use hash::{are_duplicates, assign_canonical_keys, canonical_key, identifier_hash};
pub use dedup::{dedup, dedup_multi_source, DedupGroup};
pub use diversify::{
    diversify, diversify_mmr, diversify_mmr_around, diversify_mmr_by, get_diversity_stats, DiversifyOptions,
    DiversityStats, FacetDimension, RelevanceScore,
};
pub use index::{build_index, JsonFileWriter, PageConfig, ProgrammaticIndex, RunInfo};
pub use feeds::{load_feed_manifest, FileFeedReader};
pub use pipeline::{IndexPipeline, PipelineBuilder, RunReport};
