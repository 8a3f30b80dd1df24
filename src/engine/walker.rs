use crate::engine::known::KnownHrefs;
use crate::engine::pipeline::{BatchReport, ExtractionPipeline};
use crate::engine::retry::RetryPolicy;
use crate::scrapers::traits::RenderEngine;
use crate::scrapers::types::{NavigateOptions, RequestFilter, SurfaceId};
use crate::scrapers::zonaprop::ListingLayout;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Why a pagination walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    /// A listing page could not be loaded within the retry budget
    NavigationFailed,
    /// A listing page had no candidate links at all
    NoLinksOnPage,
    /// The site served a page that was already walked
    LoopDetected,
    /// Several pages in a row contributed nothing new
    Stagnation,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::NavigationFailed => "listing navigation failed",
            TerminationReason::NoLinksOnPage => "no links on page",
            TerminationReason::LoopDetected => "page loop detected",
            TerminationReason::Stagnation => "no new listings on consecutive pages",
        };
        f.write_str(text)
    }
}

/// Bookkeeping for one pagination walk
#[derive(Debug)]
pub struct CrawlSession {
    known: Arc<KnownHrefs>,
    visited: HashSet<u32>,
    consecutive_empty: u32,
    stagnation_threshold: u32,
    page_index: u32,
}

impl CrawlSession {
    pub const DEFAULT_STAGNATION_THRESHOLD: u32 = 3;

    pub fn new(known: Arc<KnownHrefs>, stagnation_threshold: u32) -> Self {
        Self {
            known,
            visited: HashSet::new(),
            consecutive_empty: 0,
            stagnation_threshold: stagnation_threshold.max(1),
            page_index: 1,
        }
    }

    pub fn known(&self) -> &Arc<KnownHrefs> {
        &self.known
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }

    /// Judges the links found on the page served as `served_index`.
    ///
    /// Returns the links to dispatch, or why the walk has to stop. A page
    /// served twice stops the walk before anything is dispatched for it.
    pub fn evaluate(
        &mut self,
        served_index: u32,
        links: &[String],
    ) -> Result<Vec<String>, TerminationReason> {
        if links.is_empty() {
            return Err(TerminationReason::NoLinksOnPage);
        }
        if self.visited.contains(&served_index) {
            return Err(TerminationReason::LoopDetected);
        }

        self.known.observe_all(links);
        let fresh: Vec<String> = links
            .iter()
            .filter(|link| !self.known.is_known(link))
            .cloned()
            .collect();

        if fresh.is_empty() {
            self.consecutive_empty += 1;
        } else {
            self.consecutive_empty = 0;
        }
        Ok(fresh)
    }

    /// Closes out the page served as `served_index` and moves to the next one
    pub fn advance(&mut self, served_index: u32) -> Result<u32, TerminationReason> {
        self.visited.insert(served_index);
        if self.consecutive_empty >= self.stagnation_threshold {
            return Err(TerminationReason::Stagnation);
        }
        self.page_index += 1;
        Ok(self.page_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkReport {
    pub termination: TerminationReason,
    pub pages_walked: u32,
    pub extraction: BatchReport,
}

#[derive(Debug, Clone)]
pub struct WalkerSettings {
    pub navigation: NavigateOptions,
    pub retry: RetryPolicy,
    pub request_filter: RequestFilter,
}

impl Default for WalkerSettings {
    fn default() -> Self {
        Self {
            navigation: NavigateOptions::default(),
            retry: RetryPolicy::default(),
            request_filter: RequestFilter::essentials_only(),
        }
    }
}

/// Walks the listing index one page at a time, handing new links to the
/// extraction pipeline. Page N+1 is never requested before page N's batch
/// has finished.
pub struct PaginationWalker {
    engine: Arc<dyn RenderEngine>,
    layout: ListingLayout,
    settings: WalkerSettings,
}

impl PaginationWalker {
    pub fn new(engine: Arc<dyn RenderEngine>, layout: ListingLayout, settings: WalkerSettings) -> Self {
        Self {
            engine,
            layout,
            settings,
        }
    }

    pub async fn walk(&self, session: &mut CrawlSession, pipeline: &ExtractionPipeline) -> WalkReport {
        let mut extraction = BatchReport::default();
        let mut pages_walked = 0;

        let surface = match self.engine.open_surface().await {
            Ok(surface) => surface,
            Err(e) => {
                error!("No render surface for the listing index: {}", e);
                return WalkReport {
                    termination: TerminationReason::NavigationFailed,
                    pages_walked,
                    extraction,
                };
            }
        };
        if let Err(e) = self
            .engine
            .set_request_filter(surface, self.settings.request_filter.clone())
            .await
        {
            warn!("Listing request filter not applied: {}", e);
        }

        let termination = loop {
            let (served, links) = match self.fetch(surface, session.page_index()).await {
                Ok(found) => found,
                Err(reason) => break reason,
            };
            pages_walked += 1;
            info!(page = served, links = links.len(), "listing page loaded");

            let fresh = match session.evaluate(served, &links) {
                Ok(fresh) => fresh,
                Err(reason) => break reason,
            };

            if fresh.is_empty() {
                info!(
                    page = served,
                    streak = session.consecutive_empty(),
                    "every listing on this page is already known"
                );
            } else {
                info!(page = served, new_links = fresh.len(), "dispatching new listings");
                let batch = pipeline.process_batch(fresh).await;
                info!(page = served, added = batch.added, "page batch finished");
                extraction.merge(batch);
            }

            if let Err(reason) = session.advance(served) {
                break reason;
            }
        };

        self.engine.close_surface(surface).await;

        match termination {
            TerminationReason::NavigationFailed => {
                error!(pages = pages_walked, reason = %termination, "walk aborted")
            }
            _ => info!(pages = pages_walked, reason = %termination, "walk finished"),
        }

        WalkReport {
            termination,
            pages_walked,
            extraction,
        }
    }

    /// Loads listing page `page`; returns the page index actually served and
    /// its candidate links.
    async fn fetch(
        &self,
        surface: SurfaceId,
        page: u32,
    ) -> Result<(u32, Vec<String>), TerminationReason> {
        let url = self.layout.page_url(page);
        info!(page, "navigating to listing page {}", url);

        let navigation = self
            .settings
            .retry
            .execute("listing navigation", || {
                self.engine.navigate(surface, &url, &self.settings.navigation)
            })
            .await;
        if let Err(e) = navigation {
            error!(page, error = %e, "listing page unreachable");
            return Err(TerminationReason::NavigationFailed);
        }

        let snapshot = match self
            .settings
            .retry
            .execute("listing snapshot", || self.engine.snapshot(surface))
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(page, error = %e, "listing page unreadable");
                return Err(TerminationReason::NavigationFailed);
            }
        };

        let served = ListingLayout::page_index_of(&snapshot.url).unwrap_or(page);
        if served != page {
            warn!(requested = page, served, "listing page redirected");
        }
        Ok((served, self.layout.candidate_links(&snapshot.html)))
    }
}
