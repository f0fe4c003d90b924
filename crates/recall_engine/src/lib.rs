//! Recall watch engine: feed and detail fetching, enrichment, storage, mail
//! delivery and the run pipeline that drives them.
mod cache;
mod decode;
mod detail;
mod enrich;
mod feed;
mod fetch;
mod mail;
mod persist;
mod pipeline;
mod store;
mod types;

pub use cache::{DetailCache, MemoryDetailCache};
pub use decode::{decode_html, DecodedHtml};
pub use detail::{extract_distributor_info, DetailFetcher, HttpDetailFetcher, DEFAULT_DETAIL_HOST};
pub use enrich::{EnrichReport, Enricher, DEFAULT_CONCURRENCY};
pub use feed::{parse_feed, FeedSource, RssFeedSource, DEFAULT_FEED_URL};
pub use fetch::{FetchSettings, ReqwestFetcher};
pub use mail::{MailTransport, SendError, SmtpMailer, SmtpSettings};
pub use persist::{ensure_data_dir, AtomicFileWriter, PersistError};
pub use pipeline::{Collaborators, Pipeline, PipelineSettings};
pub use store::{
    FileRecipientStore, FileSnapshotStore, RecipientSource, SnapshotStore, StoreError,
};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};
