use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use recall_core::{DistributorInfo, EnrichStats, FeedItem};
use recall_logging::{recall_debug, recall_error, recall_warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::DetailCache;
use crate::detail::DetailFetcher;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichReport {
    pub items: Vec<FeedItem>,
    pub stats: EnrichStats,
}

/// Attaches detail-page data to items through a fixed-size worker pool.
///
/// Each distinct link is looked up in the cache first and fetched at most once
/// per batch. Failed or cancelled fetches leave their items untouched; the
/// output always has the input's length and order.
pub struct Enricher {
    fetcher: Arc<dyn DetailFetcher>,
    cache: Arc<dyn DetailCache>,
    concurrency: usize,
}

#[derive(Default)]
struct WorkerTally {
    fetched: Vec<(String, DistributorInfo)>,
    errors: usize,
}

impl Enricher {
    pub fn new(
        fetcher: Arc<dyn DetailFetcher>,
        cache: Arc<dyn DetailCache>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn enrich(&self, items: Vec<FeedItem>, cancel: &CancellationToken) -> EnrichReport {
        let mut resolved: HashMap<String, DistributorInfo> = HashMap::new();
        let mut pending = VecDeque::new();
        let mut queued = HashSet::new();
        let mut cache_hits = 0;
        for item in &items {
            let link = item.link.as_str();
            if link.is_empty() || resolved.contains_key(link) || queued.contains(link) {
                continue;
            }
            match self.cache.get(link) {
                Some(info) => {
                    cache_hits += 1;
                    resolved.insert(link.to_string(), info);
                }
                None => {
                    queued.insert(link.to_string());
                    pending.push_back(link.to_string());
                }
            }
        }

        let workers = self.concurrency.min(pending.len());
        let queue = Arc::new(Mutex::new(pending));
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    queue.clone(),
                    self.fetcher.clone(),
                    self.cache.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        let mut fetched = 0;
        let mut errors = 0;
        for joined in futures_util::future::join_all(handles).await {
            match joined {
                Ok(tally) => {
                    errors += tally.errors;
                    fetched += tally.fetched.len();
                    resolved.extend(tally.fetched);
                }
                Err(err) => {
                    recall_error!("Enrichment worker died: {}", err);
                    errors += 1;
                }
            }
        }

        let stats = EnrichStats {
            items: items.len(),
            fetched,
            cache_hits,
            errors,
            cancelled: cancel.is_cancelled(),
        };
        let items = items
            .into_iter()
            .map(|item| match resolved.get(&item.link) {
                Some(info) => item.with_distributor(info.clone()),
                None => item,
            })
            .collect();
        EnrichReport { items, stats }
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<Mutex<VecDeque<String>>>,
    fetcher: Arc<dyn DetailFetcher>,
    cache: Arc<dyn DetailCache>,
    cancel: CancellationToken,
) -> WorkerTally {
    let mut tally = WorkerTally::default();
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(link) = queue.lock().await.pop_front() else {
            break;
        };
        // Dropping the fetch future on cancellation abandons the request.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = fetcher.fetch_detail(&link) => outcome,
        };
        match outcome {
            Ok(info) => {
                recall_debug!(
                    "worker={} enriched link={} distributeurs={}",
                    worker,
                    link,
                    info.distributeurs_list.len()
                );
                cache.insert(link.clone(), info.clone());
                tally.fetched.push((link, info));
            }
            Err(err) => {
                recall_warn!("worker={} detail fetch failed link={}: {}", worker, link, err);
                tally.errors += 1;
            }
        }
    }
    tally
}
