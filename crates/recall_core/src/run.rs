use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ChangeSet;

/// Stages of one pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Fetching,
    Diffing,
    Persisting,
    Enriching,
    Routing,
    Sending,
    Done,
}

impl RunStage {
    pub fn next(self) -> Self {
        match self {
            RunStage::Fetching => RunStage::Diffing,
            RunStage::Diffing => RunStage::Persisting,
            RunStage::Persisting => RunStage::Enriching,
            RunStage::Enriching => RunStage::Routing,
            RunStage::Routing => RunStage::Sending,
            RunStage::Sending | RunStage::Done => RunStage::Done,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStage::Fetching => "fetching",
            RunStage::Diffing => "diffing",
            RunStage::Persisting => "persisting",
            RunStage::Enriching => "enriching",
            RunStage::Routing => "routing",
            RunStage::Sending => "sending",
            RunStage::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunCounts {
    pub previous: usize,
    pub current: usize,
    pub new: usize,
    pub changed: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl RunCounts {
    pub fn from_changes(previous: usize, current: usize, changes: &ChangeSet) -> Self {
        Self {
            previous,
            current,
            new: changes.new.len(),
            changed: changes.changed.len(),
            removed: changes.removed.len(),
            unchanged: changes.unchanged,
        }
    }
}

/// Which kind of mail a run actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    None,
    Diff,
    Latest10,
    Test,
}

/// What to do when the mail transport fails for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendPolicy {
    /// Stop at the first failure; later recipients are not attempted.
    #[default]
    AbortOnFirstError,
    /// Attempt every recipient and report each outcome.
    ContinueAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Delivery {
    pub fn sent(email: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(email: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            message_id: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichStats {
    pub items: usize,
    pub fetched: usize,
    pub cache_hits: usize,
    pub errors: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    pub counts: RunCounts,
    pub email_mode: DeliveryMode,
    pub email_message_ids: Vec<String>,
    pub deliveries: Vec<Delivery>,
    pub enrichment: EnrichStats,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("feed fetch failed: {0}")]
    Fetch(String),
    #[error("snapshot storage failed: {0}")]
    Persist(String),
    #[error("no alert email recipients configured")]
    NoRecipients,
    #[error("email send failed: {0}")]
    Send(String),
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::Fetch(_) => "fetch_error",
            FailureReason::Persist(_) => "persist_error",
            FailureReason::NoRecipients => "no_recipients",
            FailureReason::Send(_) => "send_error",
        }
    }
}

/// A failed run: the reason, where it stopped, and whatever was known by then.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("run failed while {stage}: {reason}")]
pub struct RunError {
    pub stage: RunStage,
    pub reason: FailureReason,
    /// Present once the run got past diffing.
    pub counts: Option<RunCounts>,
    pub deliveries: Vec<Delivery>,
}

impl RunError {
    pub fn new(stage: RunStage, reason: FailureReason) -> Self {
        Self {
            stage,
            reason,
            counts: None,
            deliveries: Vec::new(),
        }
    }

    pub fn with_counts(mut self, counts: RunCounts) -> Self {
        self.counts = Some(counts);
        self
    }

    pub fn with_deliveries(mut self, deliveries: Vec<Delivery>) -> Self {
        self.deliveries = deliveries;
        self
    }
}
