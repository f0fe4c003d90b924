use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::filter::filter_by_distributeurs;
use crate::{FeedItem, RecipientConfig};

/// How many of the most recent items make up the "latest" view.
pub const LATEST_COUNT: usize = 10;

/// Operator-selected email mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailMode {
    /// Send on diffs; bootstrap runs send the latest view.
    #[default]
    #[serde(alias = "diff")]
    Auto,
    /// Always send the latest view to non-`onlyNewItems` recipients.
    Latest10,
}

impl FromStr for EmailMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "auto" | "diff" => Ok(Self::Auto),
            "latest10" => Ok(Self::Latest10),
            other => Err(format!("unknown email mode '{other}'")),
        }
    }
}

impl fmt::Display for EmailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailMode::Auto => write!(f, "auto"),
            EmailMode::Latest10 => write!(f, "latest10"),
        }
    }
}

/// Run-wide inputs that shape every recipient's routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePlan {
    /// Forced latest10 mode or bootstrap run.
    pub force_latest: bool,
    /// Any new, changed or removed item.
    pub has_changes: bool,
}

impl RoutePlan {
    pub fn new(mode: EmailMode, bootstrap: bool, has_changes: bool) -> Self {
        Self {
            force_latest: mode == EmailMode::Latest10 || bootstrap,
            has_changes,
        }
    }

    /// True when no recipient can receive anything this run.
    pub fn is_quiet(&self) -> bool {
        !self.force_latest && !self.has_changes
    }
}

/// What a single recipient receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSpec {
    NewOnly(Vec<FeedItem>),
    /// New items first, then the remaining latest items.
    LatestPlusNew {
        items: Vec<FeedItem>,
        new_count: usize,
    },
}

impl ContentSpec {
    pub fn items(&self) -> &[FeedItem] {
        match self {
            ContentSpec::NewOnly(items) => items,
            ContentSpec::LatestPlusNew { items, .. } => items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedRecipient {
    pub recipient: RecipientConfig,
    pub content: Option<ContentSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no alert email recipients configured")]
    NoRecipients,
}

/// Decide what each recipient receives. Recipients are independent.
pub fn route(
    new_items: &[FeedItem],
    latest_items: &[FeedItem],
    recipients: &[RecipientConfig],
    plan: RoutePlan,
) -> Result<Vec<RoutedRecipient>, RouteError> {
    if recipients.is_empty() {
        return Err(RouteError::NoRecipients);
    }
    Ok(recipients
        .iter()
        .map(|recipient| RoutedRecipient {
            recipient: recipient.clone(),
            content: route_one(new_items, latest_items, recipient, plan),
        })
        .collect())
}

fn route_one(
    new_items: &[FeedItem],
    latest_items: &[FeedItem],
    recipient: &RecipientConfig,
    plan: RoutePlan,
) -> Option<ContentSpec> {
    if recipient.only_new_items {
        let items = filter_by_distributeurs(new_items, &recipient.distributeurs);
        return (!items.is_empty()).then_some(ContentSpec::NewOnly(items));
    }

    if plan.is_quiet() {
        return None;
    }
    let new_filtered = filter_by_distributeurs(new_items, &recipient.distributeurs);
    let latest_filtered = filter_by_distributeurs(latest_items, &recipient.distributeurs);
    let (items, new_count) = merge_new_first(new_filtered, latest_filtered);
    if items.is_empty() {
        None
    } else {
        Some(ContentSpec::LatestPlusNew { items, new_count })
    }
}

/// New items, then latest items not already listed; first occurrence per id wins.
fn merge_new_first(new_items: Vec<FeedItem>, latest: Vec<FeedItem>) -> (Vec<FeedItem>, usize) {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(new_items.len() + latest.len());
    for item in new_items {
        if seen.insert(item.id.clone()) {
            merged.push(item);
        }
    }
    let new_count = merged.len();
    for item in latest {
        if seen.insert(item.id.clone()) {
            merged.push(item);
        }
    }
    (merged, new_count)
}
