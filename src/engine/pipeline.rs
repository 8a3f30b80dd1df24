use crate::engine::known::KnownHrefs;
use crate::engine::retry::RetryPolicy;
use crate::error::ExtractionError;
use crate::models::PropertyRecord;
use crate::remote::{EventSink, RemoteStore};
use crate::scrapers::traits::{FieldExtractor, RenderEngine};
use crate::scrapers::types::{NavigateOptions, RequestFilter, SurfaceId};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Detail pages open at the same time
    pub concurrency: usize,
    pub navigation: NavigateOptions,
    pub retry: RetryPolicy,
    /// Pause between content materialization and reading the page
    pub settle_delay: Duration,
    pub request_filter: RequestFilter,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: 3,
            navigation: NavigateOptions::default(),
            retry: RetryPolicy::default(),
            settle_delay: Duration::from_millis(200),
            request_filter: RequestFilter::allow_all(),
        }
    }
}

/// Counters for one or more processed batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub dispatched: usize,
    pub added: usize,
    pub already_known: usize,
    pub failed_navigations: usize,
    pub failed_extractions: usize,
    pub failed_writes: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.dispatched += other.dispatched;
        self.added += other.added;
        self.already_known += other.already_known;
        self.failed_navigations += other.failed_navigations;
        self.failed_extractions += other.failed_extractions;
        self.failed_writes += other.failed_writes;
    }

    fn record(&mut self, outcome: HrefOutcome) {
        self.dispatched += 1;
        match outcome {
            HrefOutcome::Added { write_failed } => {
                self.added += 1;
                if write_failed {
                    self.failed_writes += 1;
                }
            }
            HrefOutcome::AlreadyKnown => self.already_known += 1,
            HrefOutcome::NavigationFailed => self.failed_navigations += 1,
            HrefOutcome::ExtractionFailed => self.failed_extractions += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HrefOutcome {
    Added { write_failed: bool },
    AlreadyKnown,
    NavigationFailed,
    ExtractionFailed,
}

/// Visits detail pages, extracts them and pushes the records out.
///
/// Tasks of a batch are interleaved on the calling task; the semaphore caps
/// how many hold a render surface at once.
pub struct ExtractionPipeline {
    engine: Arc<dyn RenderEngine>,
    extractor: Arc<dyn FieldExtractor>,
    store: Arc<dyn RemoteStore>,
    events: Arc<dyn EventSink>,
    known: Arc<KnownHrefs>,
    gate: Semaphore,
    settings: PipelineSettings,
}

impl ExtractionPipeline {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        extractor: Arc<dyn FieldExtractor>,
        store: Arc<dyn RemoteStore>,
        events: Arc<dyn EventSink>,
        known: Arc<KnownHrefs>,
        settings: PipelineSettings,
    ) -> Self {
        let gate = Semaphore::new(settings.concurrency.max(1));
        Self {
            engine,
            extractor,
            store,
            events,
            known,
            gate,
            settings,
        }
    }

    /// Processes every href of one listing page; returns once all are done
    pub async fn process_batch(&self, hrefs: Vec<String>) -> BatchReport {
        let outcomes = join_all(hrefs.into_iter().map(|href| self.process(href))).await;

        let mut report = BatchReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    async fn process(&self, href: String) -> HrefOutcome {
        // Claimed before any await so a duplicate in flight is skipped.
        if !self.known.mark_known(&href) {
            debug!("Listing already processed: {}", href);
            return HrefOutcome::AlreadyKnown;
        }

        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Extraction gate closed, abandoning {}: {}", href, e);
                return HrefOutcome::ExtractionFailed;
            }
        };

        let surface = match self.engine.open_surface().await {
            Ok(surface) => surface,
            Err(e) => {
                warn!("No render surface for {}: {}", href, e);
                return HrefOutcome::ExtractionFailed;
            }
        };

        let outcome = self.visit(surface, &href).await;
        self.engine.close_surface(surface).await;
        outcome
    }

    async fn visit(&self, surface: SurfaceId, href: &str) -> HrefOutcome {
        if !self.settings.request_filter.is_pass_through() {
            if let Err(e) = self
                .engine
                .set_request_filter(surface, self.settings.request_filter.clone())
                .await
            {
                warn!("Request filter not applied for {}: {}", href, e);
            }
        }

        info!(href, "visiting listing");
        let navigation = self
            .settings
            .retry
            .execute("detail navigation", || {
                self.engine.navigate(surface, href, &self.settings.navigation)
            })
            .await;
        if let Err(e) = navigation {
            warn!(href, error = %e, "abandoning listing");
            return HrefOutcome::NavigationFailed;
        }

        let record = match self.read(surface, href).await {
            Ok(record) => record,
            Err(e) => {
                warn!(href, error = %e, "extraction failed");
                return HrefOutcome::ExtractionFailed;
            }
        };

        let write_failed = match self.store.create(&record).await {
            Ok(()) => false,
            Err(e) => {
                error!(href = %record.href, error = %e, "could not store listing");
                true
            }
        };
        self.events.publish(&record);

        info!(href = %record.href, price = %record.price, "listing extracted");
        HrefOutcome::Added { write_failed }
    }

    async fn read(&self, surface: SurfaceId, href: &str) -> Result<PropertyRecord, ExtractionError> {
        self.engine.materialize(surface).await?;
        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }
        let page = self.engine.snapshot(surface).await?;
        if page.url != href {
            warn!(href, served = %page.url, "listing redirected, keeping the listed href");
        }
        self.extractor.extract(&page, href)
    }
}
