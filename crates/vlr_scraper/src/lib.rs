//! vlr.gg scraper: listing → match detail → VOD feed.

pub mod aggregate;
pub mod detail;
pub mod error;
pub mod fetcher;
pub mod html;
pub mod links;
pub mod listing;
pub mod map_stats;
pub mod model;
pub mod vod;

pub use aggregate::{Aggregator, AggregatorConfig, EntityKind, FeedQuery, LimitBounds, SortOrder};
pub use error::{FetchError, Result};
pub use fetcher::{Fetcher, FetcherConfig, HttpFetcher, StaticFetcher};
pub use model::{MapStat, MapStatsFeed, Match, MatchFeed, MatchInfo, MatchReference, Platform, Score, TeamInfo, VodLink};
pub use vod::EmbedContext;
