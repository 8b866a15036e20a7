// Public modules
pub mod bluesky;
pub mod config;
pub mod digest;
pub mod feed;
pub mod fetch;
pub mod io;
pub mod logging;
pub mod models;
pub mod sources;
pub mod summarizer;
pub mod window;
pub mod youtube;

// Re-export commonly used types
pub use config::SummarizerConfig;
pub use digest::{DigestDocument, DigestGenerator};
pub use feed::{parse_feed, ParsedFeed};
pub use fetch::{Fetcher, HttpFetcher, StaticFetcher};
pub use io::{digest_filename, write_markdown};
pub use models::{Category, FeedEntry, SourceDescriptor};
pub use summarizer::{
    CallOutcome, Completion, EntrySummarizer, GitHubModelsClient, SummaryPolicy, SummaryReport,
};
pub use window::DayWindow;
