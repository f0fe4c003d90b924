use chrono::DateTime;
use recall_core::FeedItem;
use recall_logging::recall_debug;
use rss::{Channel, Item};

use crate::fetch::ReqwestFetcher;
use crate::{FailureKind, FetchError};

pub const DEFAULT_FEED_URL: &str = "https://rappel.conso.gouv.fr/rss?categorie=01";

const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";
const FEED_CONTENT_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/xml",
    "text/xml",
    "application/octet-stream",
];

/// Source of the current, normalized item list.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<FeedItem>, FetchError>;
}

/// RSS 2.0 feed over HTTP.
pub struct RssFeedSource {
    fetcher: ReqwestFetcher,
    url: String,
}

impl RssFeedSource {
    pub fn new(fetcher: ReqwestFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_items(&self) -> Result<Vec<FeedItem>, FetchError> {
        let output = self
            .fetcher
            .get(&self.url, FEED_ACCEPT, FEED_CONTENT_TYPES)
            .await?;
        recall_debug!(
            "Fetched feed url={} bytes={} redirects={}",
            output.metadata.final_url,
            output.metadata.byte_len,
            output.metadata.redirect_count
        );
        parse_feed(&output.bytes)
    }
}

/// Parse RSS bytes into items sorted most recent first.
///
/// Ties and undated items keep their feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::new(FailureKind::Empty, "feed body is empty"));
    }
    let channel = Channel::read_from(bytes)
        .map_err(|err| FetchError::new(FailureKind::Parse, format!("RSS parse error: {err}")))?;
    let mut items: Vec<FeedItem> = channel
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_item(index, item))
        .collect();
    items.sort_by(|a, b| b.pub_date_ts.cmp(&a.pub_date_ts));
    Ok(items)
}

fn normalize_item(index: usize, item: &Item) -> FeedItem {
    let title = item.title().unwrap_or_default().trim().to_string();
    let link = item.link().unwrap_or_default().trim().to_string();
    let guid = item.guid().map(|g| g.value().trim()).unwrap_or_default();
    let id = if !guid.is_empty() {
        guid.to_string()
    } else if !link.is_empty() {
        link.clone()
    } else {
        index.to_string()
    };

    let pub_date = item.pub_date().unwrap_or_default().trim().to_string();
    let parsed = DateTime::parse_from_rfc2822(&pub_date).ok();

    FeedItem {
        id,
        title,
        link,
        pub_date_iso: parsed.map(|dt| dt.format("%Y-%m-%d").to_string()),
        pub_date_ts: parsed.map(|dt| dt.timestamp_millis()).unwrap_or(0),
        pub_date,
        description_html: item.description().unwrap_or_default().to_string(),
        enclosure_url: enclosure_url(item),
        distributor: None,
    }
}

/// `<enclosure url>`, falling back to `<media:content url>`.
fn enclosure_url(item: &Item) -> String {
    if let Some(enclosure) = item.enclosure() {
        if !enclosure.url().is_empty() {
            return enclosure.url().to_string();
        }
    }
    item.extensions()
        .get("media")
        .and_then(|media| media.get("content"))
        .and_then(|contents| contents.iter().find_map(|ext| ext.attrs().get("url")))
        .cloned()
        .unwrap_or_default()
}
