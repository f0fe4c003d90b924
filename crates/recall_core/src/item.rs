use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recall notice as normalized from the feed.
///
/// `id` comes from the feed guid, falling back to the link and then to the
/// item's position. The feed does not guarantee uniqueness within a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default, rename = "pubDateISO")]
    pub pub_date_iso: Option<String>,
    #[serde(default)]
    pub pub_date_ts: i64,
    #[serde(default)]
    pub description_html: String,
    #[serde(default)]
    pub enclosure_url: String,
    /// Detail-page data attached by enrichment. Never persisted in snapshots.
    #[serde(default, skip_serializing)]
    pub distributor: Option<DistributorInfo>,
}

impl FeedItem {
    /// Title for display, falling back to the id.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }

    /// Copy of this item carrying the given detail-page data.
    pub fn with_distributor(&self, info: DistributorInfo) -> Self {
        Self {
            distributor: Some(info),
            ..self.clone()
        }
    }
}

/// Data scraped from a recall's detail page, keyed by the item link.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributorInfo {
    pub distributeurs_raw: String,
    pub distributeurs_list: Vec<String>,
    pub motif_raw: String,
}

impl DistributorInfo {
    /// Distributors joined for display: the parsed list when present, else the raw text.
    pub fn display_distributeurs(&self) -> String {
        if self.distributeurs_list.is_empty() {
            self.distributeurs_raw.clone()
        } else {
            self.distributeurs_list.join(", ")
        }
    }
}

/// Split a raw distributor string on `;`, `,` and line breaks.
pub fn split_distributeurs(raw: &str) -> Vec<String> {
    raw.split([';', ',', '\n', '\r'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Persisted capture of the full item list seen by one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<FeedItem>,
}

impl Snapshot {
    /// Build a snapshot, dropping items whose id is empty.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>, items: Vec<FeedItem>) -> Self {
        Self {
            id: id.into(),
            created_at,
            items: items.into_iter().filter(|item| !item.id.is_empty()).collect(),
        }
    }
}
