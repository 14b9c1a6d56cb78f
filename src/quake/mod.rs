//! Seismic event feed: wire types, upstream client, TTL-cached fetcher.

pub mod feed;
pub mod fetcher;
pub mod types;

pub use feed::{FeedClient, FeedQuery, FetchError, UsgsFeed};
pub use fetcher::SourceFetcher;
pub use types::{Event, EventCollection};
