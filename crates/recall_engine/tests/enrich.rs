use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use recall_core::{DistributorInfo, FeedItem};
use recall_engine::{
    DetailCache, DetailFetcher, Enricher, FailureKind, FetchError, MemoryDetailCache,
};
use tokio_util::sync::CancellationToken;

/// Answers from a fixed table; unknown links fail. Counts calls per link.
#[derive(Default)]
struct TableFetcher {
    pages: HashMap<String, DistributorInfo>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl TableFetcher {
    fn with_page(mut self, link: &str, distributeurs: &str) -> Self {
        self.pages.insert(link.to_string(), info(distributeurs));
        self
    }

    fn calls(&self, link: &str) -> usize {
        self.calls.lock().unwrap().get(link).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl DetailFetcher for TableFetcher {
    async fn fetch_detail(&self, link: &str) -> Result<DistributorInfo, FetchError> {
        *self.calls.lock().unwrap().entry(link.to_string()).or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.pages
            .get(link)
            .cloned()
            .ok_or_else(|| FetchError::new(FailureKind::HttpStatus(404), link.to_string()))
    }
}

fn info(distributeurs: &str) -> DistributorInfo {
    DistributorInfo {
        distributeurs_raw: distributeurs.to_string(),
        distributeurs_list: recall_core::split_distributeurs(distributeurs),
        motif_raw: "Listeria".to_string(),
    }
}

fn item(id: &str, link: &str) -> FeedItem {
    FeedItem {
        id: id.to_string(),
        title: format!("Title {id}"),
        link: link.to_string(),
        ..FeedItem::default()
    }
}

#[tokio::test]
async fn keeps_length_and_order_and_degrades_failures() {
    let fetcher = Arc::new(
        TableFetcher::default()
            .with_page("https://h/1", "Acme")
            .with_page("https://h/3", "Carrefour"),
    );
    let enricher = Enricher::new(fetcher.clone(), Arc::new(MemoryDetailCache::new()), 4);
    let input = vec![
        item("1", "https://h/1"),
        item("2", "https://h/2"),
        item("3", "https://h/3"),
        item("4", ""),
    ];

    let report = enricher.enrich(input.clone(), &CancellationToken::new()).await;

    assert_eq!(report.items.len(), input.len());
    let ids: Vec<_> = report.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(report.items[0].distributor, Some(info("Acme")));
    assert_eq!(report.items[1], input[1]);
    assert_eq!(report.items[2].distributor, Some(info("Carrefour")));
    assert_eq!(report.items[3], input[3]);

    assert_eq!(report.stats.items, 4);
    assert_eq!(report.stats.fetched, 2);
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.stats.cache_hits, 0);
    assert!(!report.stats.cancelled);
    // Items without a link are never fetched.
    assert_eq!(fetcher.total_calls(), 3);
}

#[tokio::test]
async fn shared_links_are_fetched_once_and_cached() {
    let fetcher = Arc::new(TableFetcher::default().with_page("https://h/1", "Acme"));
    let cache = Arc::new(MemoryDetailCache::new());
    let enricher = Enricher::new(fetcher.clone(), cache.clone(), 2);
    let items = vec![item("a", "https://h/1"), item("b", "https://h/1")];

    let first = enricher.enrich(items.clone(), &CancellationToken::new()).await;
    assert_eq!(fetcher.calls("https://h/1"), 1);
    assert!(first.items.iter().all(|i| i.distributor == Some(info("Acme"))));
    assert_eq!(cache.get("https://h/1"), Some(info("Acme")));

    let second = enricher.enrich(items, &CancellationToken::new()).await;
    assert_eq!(fetcher.calls("https://h/1"), 1);
    assert_eq!(second.stats.cache_hits, 1);
    assert_eq!(second.stats.fetched, 0);
    assert_eq!(second.items, first.items);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let fetcher = Arc::new(TableFetcher::default());
    let cache = Arc::new(MemoryDetailCache::new());
    let enricher = Enricher::new(fetcher.clone(), cache.clone(), 4);

    enricher
        .enrich(vec![item("x", "https://h/x")], &CancellationToken::new())
        .await;
    enricher
        .enrich(vec![item("x", "https://h/x")], &CancellationToken::new())
        .await;

    assert_eq!(fetcher.calls("https://h/x"), 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn worker_count_bounds_concurrency() {
    let mut fetcher = TableFetcher {
        delay: Duration::from_millis(20),
        ..TableFetcher::default()
    };
    let mut items = Vec::new();
    for n in 0..12 {
        let link = format!("https://h/{n}");
        fetcher = fetcher.with_page(&link, "Acme");
        items.push(item(&n.to_string(), &link));
    }
    let fetcher = Arc::new(fetcher);
    let enricher = Enricher::new(fetcher.clone(), Arc::new(MemoryDetailCache::new()), 3);

    let report = enricher.enrich(items, &CancellationToken::new()).await;

    assert_eq!(report.stats.fetched, 12);
    assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn cancellation_keeps_completed_results() {
    let fetcher = Arc::new(TableFetcher {
        delay: Duration::from_secs(30),
        ..TableFetcher::default()
    });
    let cache = Arc::new(MemoryDetailCache::new());
    cache.insert("https://h/cached".to_string(), info("Acme"));
    let enricher = Enricher::new(fetcher, cache, 2);
    let items = vec![
        item("cached", "https://h/cached"),
        item("slow1", "https://h/slow1"),
        item("slow2", "https://h/slow2"),
    ];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), enricher.enrich(items, &cancel))
        .await
        .expect("cancellation ends the batch");

    assert!(report.stats.cancelled);
    assert_eq!(report.items.len(), 3);
    assert_eq!(report.items[0].distributor, Some(info("Acme")));
    assert_eq!(report.items[1].distributor, None);
    assert_eq!(report.items[2].distributor, None);
    assert_eq!(report.stats.fetched, 0);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let enricher = Enricher::new(
        Arc::new(TableFetcher::default()),
        Arc::new(MemoryDetailCache::new()),
        4,
    );
    let report = enricher.enrich(Vec::new(), &CancellationToken::new()).await;
    assert!(report.items.is_empty());
    assert_eq!(report.stats.items, 0);
}
