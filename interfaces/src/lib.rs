pub mod baseline;
pub mod defs;

pub use baseline::InMemoryFeedReader;
pub use defs::{FeedBatch, FeedReader, FeedSource, FeedSpec, RawFeedRow};
