//! Business logic services.

pub mod feed;

pub use feed::{Feed, FeedService, FetchFailure, MAX_SNAPSHOT_CLIPS};
