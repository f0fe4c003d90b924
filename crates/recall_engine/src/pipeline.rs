use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use recall_core::{
    detect_changes, filter_by_distributeurs, normalize_recipients, route, ChangeSet,
    ContentBuilder, ContentOptions, ContentSpec, Delivery, DeliveryMode, DistributorInfo,
    EmailMessage, EmailMode, EnrichStats, FailureReason, FeedItem, RecipientConfig, RoutePlan,
    RoutedRecipient, RunCounts, RunError, RunResult, RunStage, SendPolicy, Snapshot,
    LATEST_COUNT,
};
use recall_logging::{recall_debug, recall_error, recall_info, recall_warn, run_tag};
use tokio_util::sync::CancellationToken;

use crate::cache::DetailCache;
use crate::detail::DetailFetcher;
use crate::enrich::{Enricher, DEFAULT_CONCURRENCY};
use crate::feed::FeedSource;
use crate::mail::MailTransport;
use crate::store::{RecipientSource, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub email_mode: EmailMode,
    pub send_policy: SendPolicy,
    pub enrich_concurrency: usize,
    pub content: ContentOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            email_mode: EmailMode::Auto,
            send_policy: SendPolicy::AbortOnFirstError,
            enrich_concurrency: DEFAULT_CONCURRENCY,
            content: ContentOptions::default(),
        }
    }
}

/// Everything a run talks to.
pub struct Collaborators {
    pub feed: Arc<dyn FeedSource>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub details: Arc<dyn DetailFetcher>,
    pub cache: Arc<dyn DetailCache>,
    pub recipients: Arc<dyn RecipientSource>,
    pub mailer: Arc<dyn MailTransport>,
}

/// Sequences one watch run: fetch, diff, snapshot, enrich, route, send.
///
/// The snapshot is written before any mail goes out, so a failed send is not
/// retried by the next run. Runs must not overlap; callers serialize them.
pub struct Pipeline {
    feed: Arc<dyn FeedSource>,
    snapshots: Arc<dyn SnapshotStore>,
    recipients: Arc<dyn RecipientSource>,
    mailer: Arc<dyn MailTransport>,
    enricher: Enricher,
    builder: ContentBuilder,
    settings: PipelineSettings,
}

/// Items a run has diffed, with the latest view cut from the current list.
struct Diffed {
    changes: ChangeSet,
    latest: Vec<FeedItem>,
    counts: RunCounts,
    bootstrap: bool,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        let Collaborators {
            feed,
            snapshots,
            details,
            cache,
            recipients,
            mailer,
        } = collaborators;
        Self {
            feed,
            snapshots,
            recipients,
            mailer,
            enricher: Enricher::new(details, cache, settings.enrich_concurrency),
            builder: ContentBuilder::new(settings.content.clone()),
            settings,
        }
    }

    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RunResult, RunError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let tag = run_tag(&run_id);
        let mut stage = RunStage::Fetching;
        recall_info!("[{}] {} feed (mode={})", tag, stage, self.settings.email_mode);

        let current = self
            .feed
            .fetch_items()
            .await
            .map_err(|err| fail(&tag, RunError::new(stage, FailureReason::Fetch(err.to_string()))))?;

        stage = stage.next();
        let previous = self
            .snapshots
            .latest_snapshot()
            .map_err(|err| fail(&tag, RunError::new(stage, FailureReason::Persist(err.to_string()))))?;
        let diffed = diff(previous.as_ref(), current.clone());
        recall_info!(
            "[{}] {}: previous={} current={} new={} changed={} removed={} unchanged={}",
            tag,
            stage,
            diffed.counts.previous,
            diffed.counts.current,
            diffed.counts.new,
            diffed.counts.changed,
            diffed.counts.removed,
            diffed.counts.unchanged
        );
        let counts = diffed.counts;

        stage = stage.next();
        let snapshot = Snapshot::new(run_id.clone(), Utc::now(), current);
        self.snapshots.insert_snapshot(&snapshot).map_err(|err| {
            fail(
                &tag,
                RunError::new(stage, FailureReason::Persist(err.to_string())).with_counts(counts),
            )
        })?;
        recall_info!("[{}] {} snapshot {}", tag, stage, snapshot.id);

        stage = stage.next();
        let plan = RoutePlan::new(
            self.settings.email_mode,
            diffed.bootstrap,
            diffed.changes.has_changes(),
        );
        let (new_items, latest, enrichment) = if plan.is_quiet() {
            recall_info!("[{}] no changes; skipping enrichment", tag);
            (diffed.changes.new, diffed.latest, EnrichStats::default())
        } else {
            self.enrich_for_routing(&tag, &diffed.changes, diffed.latest, cancel)
                .await
        };

        stage = stage.next();
        let recipients = self.load_recipients().map_err(|reason| {
            fail(&tag, RunError::new(stage, reason).with_counts(counts))
        })?;
        let routed = route(&new_items, &latest, &recipients, plan).map_err(|_| {
            fail(
                &tag,
                RunError::new(stage, FailureReason::NoRecipients).with_counts(counts),
            )
        })?;
        recall_info!(
            "[{}] {} {} recipients ({} with content)",
            tag,
            stage,
            routed.len(),
            routed.iter().filter(|r| r.content.is_some()).count()
        );

        stage = stage.next();
        let deliveries = self
            .send_all(&tag, &routed)
            .await
            .map_err(|(reason, deliveries)| {
                fail(
                    &tag,
                    RunError::new(stage, reason)
                        .with_counts(counts)
                        .with_deliveries(deliveries),
                )
            })?;

        let result = RunResult {
            email_mode: delivery_mode(&routed, &deliveries, plan),
            email_message_ids: deliveries
                .iter()
                .filter_map(|d| d.message_id.clone())
                .collect(),
            run_id,
            snapshot_id: Some(snapshot.id),
            counts,
            deliveries,
            enrichment,
        };
        recall_info!(
            "[{}] {}: mode={:?} sent={}",
            tag,
            stage.next(),
            result.email_mode,
            result.email_message_ids.len()
        );
        Ok(result)
    }

    /// Mail every recipient its filtered latest view without touching snapshots.
    pub async fn send_test_digest(&self, cancel: &CancellationToken) -> Result<RunResult, RunError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let tag = run_tag(&run_id);
        recall_info!("[{}] test digest", tag);

        let current = self.feed.fetch_items().await.map_err(|err| {
            fail(&tag, RunError::new(RunStage::Fetching, FailureReason::Fetch(err.to_string())))
        })?;
        if current.is_empty() {
            return Err(fail(
                &tag,
                RunError::new(RunStage::Fetching, FailureReason::Fetch("no items".to_string())),
            ));
        }
        let counts = RunCounts {
            current: current.len(),
            ..RunCounts::default()
        };

        let latest: Vec<FeedItem> = current.into_iter().take(LATEST_COUNT).collect();
        let report = self.enricher.enrich(latest, cancel).await;

        let recipients = self.load_recipients().map_err(|reason| {
            fail(&tag, RunError::new(RunStage::Routing, reason).with_counts(counts))
        })?;
        if recipients.is_empty() {
            return Err(fail(
                &tag,
                RunError::new(RunStage::Routing, FailureReason::NoRecipients).with_counts(counts),
            ));
        }
        let routed: Vec<RoutedRecipient> = recipients
            .into_iter()
            .map(|recipient| {
                let items = filter_by_distributeurs(&report.items, &recipient.distributeurs);
                let content = (!items.is_empty())
                    .then_some(ContentSpec::LatestPlusNew { items, new_count: 0 });
                RoutedRecipient { recipient, content }
            })
            .collect();

        let deliveries = self
            .send_all(&tag, &routed)
            .await
            .map_err(|(reason, deliveries)| {
                fail(
                    &tag,
                    RunError::new(RunStage::Sending, reason)
                        .with_counts(counts)
                        .with_deliveries(deliveries),
                )
            })?;

        Ok(RunResult {
            email_mode: if deliveries.is_empty() {
                DeliveryMode::None
            } else {
                DeliveryMode::Test
            },
            email_message_ids: deliveries
                .iter()
                .filter_map(|d| d.message_id.clone())
                .collect(),
            run_id,
            snapshot_id: None,
            counts,
            deliveries,
            enrichment: report.stats,
        })
    }

    /// Enrich new, changed, removed and latest items in one batch, then hand
    /// back the new and latest lists with detail data attached.
    async fn enrich_for_routing(
        &self,
        tag: &str,
        changes: &ChangeSet,
        latest: Vec<FeedItem>,
        cancel: &CancellationToken,
    ) -> (Vec<FeedItem>, Vec<FeedItem>, EnrichStats) {
        let mut seen = HashSet::new();
        let batch: Vec<FeedItem> = changes
            .new
            .iter()
            .chain(&changes.changed)
            .chain(&changes.removed)
            .chain(&latest)
            .filter(|item| seen.insert(item.id.clone()))
            .cloned()
            .collect();
        let report = self.enricher.enrich(batch, cancel).await;
        recall_info!(
            "[{}] enriched items={} fetched={} cache_hits={} errors={}{}",
            tag,
            report.stats.items,
            report.stats.fetched,
            report.stats.cache_hits,
            report.stats.errors,
            if report.stats.cancelled { " (cancelled)" } else { "" }
        );

        let by_link: HashMap<&str, &DistributorInfo> = report
            .items
            .iter()
            .filter_map(|item| Some((item.link.as_str(), item.distributor.as_ref()?)))
            .collect();
        let attach = |items: &[FeedItem]| -> Vec<FeedItem> {
            items
                .iter()
                .map(|item| match by_link.get(item.link.as_str()) {
                    Some(info) => item.with_distributor((*info).clone()),
                    None => item.clone(),
                })
                .collect()
        };
        (attach(&changes.new), attach(&latest), report.stats)
    }

    fn load_recipients(&self) -> Result<Vec<RecipientConfig>, FailureReason> {
        self.recipients
            .recipient_configs()
            .map(normalize_recipients)
            .map_err(|err| FailureReason::Persist(err.to_string()))
    }

    /// One message per recipient with content. On failure, returns the reason
    /// and every delivery attempted so far.
    async fn send_all(
        &self,
        tag: &str,
        routed: &[RoutedRecipient],
    ) -> Result<Vec<Delivery>, (FailureReason, Vec<Delivery>)> {
        let mut deliveries = Vec::new();
        let mut first_error = None;
        for entry in routed {
            let Some(spec) = &entry.content else {
                recall_debug!("[{}] nothing for {}", tag, entry.recipient.email);
                continue;
            };
            let email = &entry.recipient.email;
            let message = EmailMessage::new(self.builder.build(spec), vec![email.clone()]);
            match self.mailer.send_message(&message).await {
                Ok(message_id) => {
                    recall_info!("[{}] sent {} items to {}", tag, spec.items().len(), email);
                    deliveries.push(Delivery::sent(email, message_id));
                }
                Err(err) => {
                    recall_warn!("[{}] send to {} failed: {}", tag, email, err);
                    deliveries.push(Delivery::failed(email, err.to_string()));
                    let reason = FailureReason::Send(format!("{email}: {err}"));
                    match self.settings.send_policy {
                        SendPolicy::AbortOnFirstError => return Err((reason, deliveries)),
                        SendPolicy::ContinueAll => {
                            first_error.get_or_insert(reason);
                        }
                    }
                }
            }
        }
        match first_error {
            Some(reason) => Err((reason, deliveries)),
            None => Ok(deliveries),
        }
    }
}

fn diff(previous: Option<&Snapshot>, current: Vec<FeedItem>) -> Diffed {
    let previous_items = previous.map(|s| s.items.as_slice()).unwrap_or_default();
    let changes = detect_changes(previous_items, &current);
    let counts = RunCounts::from_changes(previous_items.len(), current.len(), &changes);
    Diffed {
        latest: current.into_iter().take(LATEST_COUNT).collect(),
        changes,
        counts,
        bootstrap: previous.is_none(),
    }
}

fn delivery_mode(routed: &[RoutedRecipient], deliveries: &[Delivery], plan: RoutePlan) -> DeliveryMode {
    let sent: HashSet<&str> = deliveries
        .iter()
        .filter(|d| d.message_id.is_some())
        .map(|d| d.email.as_str())
        .collect();
    if sent.is_empty() {
        return DeliveryMode::None;
    }
    let latest_sent = routed.iter().any(|r| {
        matches!(r.content, Some(ContentSpec::LatestPlusNew { .. }))
            && sent.contains(r.recipient.email.as_str())
    });
    if plan.force_latest && latest_sent {
        DeliveryMode::Latest10
    } else {
        DeliveryMode::Diff
    }
}

fn fail(tag: &str, err: RunError) -> RunError {
    recall_error!("[{}] {}", tag, err);
    err
}
