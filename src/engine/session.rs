use crate::config::CrawlerConfig;
use crate::engine::known::{dedupe, KnownHrefs};
use crate::engine::pipeline::{ExtractionPipeline, PipelineSettings};
use crate::engine::reconcile::{reconcile, ReconcileReport};
use crate::engine::walker::{CrawlSession, PaginationWalker, TerminationReason, WalkerSettings};
use crate::models::{PropertyRecord, StoredRecord};
use crate::remote::{EventSink, RemoteStore};
use crate::scrapers::traits::{FieldExtractor, RenderEngine};
use crate::scrapers::types::RequestFilter;
use crate::scrapers::zonaprop::ListingLayout;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of one full crawl-and-reconcile pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub termination: TerminationReason,
    pub pages_walked: u32,
    /// Records in the truth snapshot after dedup
    pub truth_count: usize,
    pub added: usize,
    /// Truth records whose listing is still on the site
    pub existing: usize,
    pub removed: usize,
    pub failed_navigations: usize,
    pub failed_extractions: usize,
    pub failed_writes: usize,
    pub failed_deletions: usize,
    /// False when the walk aborted and stale records were left alone
    pub reconciled: bool,
}

/// Runs crawl sessions against one site and one remote store.
///
/// Each call to [`SessionRunner::run_one_session`] is self-contained; what
/// happens between sessions is up to the caller.
pub struct SessionRunner {
    engine: Arc<dyn RenderEngine>,
    extractor: Arc<dyn FieldExtractor>,
    store: Arc<dyn RemoteStore>,
    events: Arc<dyn EventSink>,
    layout: ListingLayout,
    config: CrawlerConfig,
    seed: Vec<PropertyRecord>,
}

impl SessionRunner {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        extractor: Arc<dyn FieldExtractor>,
        store: Arc<dyn RemoteStore>,
        events: Arc<dyn EventSink>,
        config: CrawlerConfig,
    ) -> Result<Self, url::ParseError> {
        let layout = ListingLayout::new(&config.site_base_url, &config.listing_path_template)?;
        Ok(Self {
            engine,
            extractor,
            store,
            events,
            layout,
            config,
            seed: Vec::new(),
        })
    }

    /// Records from a previous run that never need extracting again
    pub fn with_seed(mut self, seed: Vec<PropertyRecord>) -> Self {
        self.seed = dedupe(seed);
        self
    }

    pub async fn run_one_session(&self) -> SessionResult {
        let started_at = Utc::now();
        info!("Starting crawl session");

        let truth = dedupe(self.load_truth().await);
        let known = Arc::new(KnownHrefs::from_hrefs(
            truth.iter().map(|stored| stored.href().to_string()),
        ));
        for record in &self.seed {
            known.mark_known(&record.href);
        }
        info!(
            truth = truth.len(),
            seeded = self.seed.len(),
            known = known.known_count(),
            "known set ready"
        );

        let pipeline = ExtractionPipeline::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.extractor),
            Arc::clone(&self.store),
            Arc::clone(&self.events),
            Arc::clone(&known),
            PipelineSettings {
                concurrency: self.config.concurrency,
                navigation: self.config.navigation,
                retry: self.config.navigation_retry,
                settle_delay: self.config.settle_delay,
                request_filter: RequestFilter::allow_all(),
            },
        );
        let walker = PaginationWalker::new(
            Arc::clone(&self.engine),
            self.layout.clone(),
            WalkerSettings {
                navigation: self.config.navigation,
                retry: self.config.navigation_retry,
                request_filter: RequestFilter::essentials_only(),
            },
        );

        let mut session = CrawlSession::new(Arc::clone(&known), self.config.stagnation_threshold);
        let walk = walker.walk(&mut session, &pipeline).await;

        // A walk that died on a listing page saw only part of the catalog.
        let reconciled = walk.termination != TerminationReason::NavigationFailed;
        let cleanup = if reconciled {
            reconcile(self.store.as_ref(), &truth, &known).await
        } else {
            warn!("Walk aborted, skipping reconciliation");
            ReconcileReport::default()
        };

        let result = SessionResult {
            started_at,
            finished_at: Utc::now(),
            termination: walk.termination,
            pages_walked: walk.pages_walked,
            truth_count: truth.len(),
            added: walk.extraction.added,
            existing: truth.iter().filter(|stored| known.was_seen(stored.href())).count(),
            removed: cleanup.removed,
            failed_navigations: walk.extraction.failed_navigations,
            failed_extractions: walk.extraction.failed_extractions,
            failed_writes: walk.extraction.failed_writes,
            failed_deletions: cleanup.failed,
            reconciled,
        };

        info!(
            added = result.added,
            removed = result.removed,
            existing = result.existing,
            pages = result.pages_walked,
            reason = %result.termination,
            "crawl session finished"
        );
        result
    }

    /// A snapshot that cannot be read degrades to an empty one; every
    /// listing then counts as new.
    async fn load_truth(&self) -> Vec<StoredRecord> {
        let store = &self.store;
        match self
            .config
            .remote_retry
            .execute("truth snapshot", || store.fetch_all())
            .await
        {
            Ok(records) => {
                info!("Loaded {} records from the remote store", records.len());
                records
            }
            Err(e) => {
                error!("Proceeding with an empty truth snapshot: {}", e);
                Vec::new()
            }
        }
    }
}
