#![allow(dead_code)]

use async_trait::async_trait;
use listing_sync::config::CrawlerConfig;
use listing_sync::error::{NavigationError, RemoteError, RenderError};
use listing_sync::models::{PropertyRecord, RemoteId, StoredRecord};
use listing_sync::remote::{EventSink, RemoteStore};
use listing_sync::scrapers::traits::RenderEngine;
use listing_sync::scrapers::types::{NavigateOptions, PageSnapshot, RequestFilter, SurfaceId};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const BASE: &str = "https://site.test";

pub fn listing_url(page: u32) -> String {
    format!("{}/alquiler-pagina-{}.html", BASE, page)
}

pub fn detail_url(slug: &str) -> String {
    format!("{}/propiedades/{}.html", BASE, slug)
}

pub fn config() -> CrawlerConfig {
    CrawlerConfig {
        site_base_url: BASE.to_string(),
        listing_path_template: "/alquiler-pagina-{page}.html".to_string(),
        concurrency: 3,
        settle_delay: Duration::ZERO,
        ..Default::default()
    }
}

pub fn listing_html(slugs: &[&str]) -> String {
    let cards: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<div data-qa="POSTING_CARD_DESCRIPTION"><a href="/propiedades/{}.html">{}</a></div>"#,
                slug, slug
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
}

pub fn detail_html(slug: &str) -> String {
    format!(
        r#"<html><body>
            <div class="price-value">USD 1.000</div>
            <h2 class="title-type-sup-property">Departamento {}</h2>
            <div id="user-views"><p>Publicado hace 2 días</p><p>40 visualizaciones</p></div>
        </body></html>"#,
        slug
    )
}

/// A site held in memory: requested URL -> (served URL, markup)
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, PageSnapshot>,
    unreachable: HashSet<String>,
    next_surface: AtomicU64,
    current: Mutex<HashMap<SurfaceId, String>>,
    navigations: Mutex<Vec<String>>,
    open: AtomicUsize,
    snapshot_failures: AtomicUsize,
    pub snapshots: AtomicUsize,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(mut self, page: u32, slugs: &[&str]) -> Self {
        let url = listing_url(page);
        self.pages.insert(
            url.clone(),
            PageSnapshot {
                url,
                html: listing_html(slugs),
            },
        );
        for slug in slugs {
            let url = detail_url(slug);
            self.pages.entry(url.clone()).or_insert(PageSnapshot {
                url,
                html: detail_html(slug),
            });
        }
        self
    }

    /// Requests for `page` land on `served` instead
    pub fn redirect(mut self, page: u32, served: u32) -> Self {
        if let Some(target) = self.pages.get(&listing_url(served)).cloned() {
            self.pages.insert(listing_url(page), target);
        }
        self
    }

    /// The detail page for `slug` is served under `served` instead
    pub fn moved(mut self, slug: &str, served: &str) -> Self {
        if let Some(page) = self.pages.get_mut(&detail_url(slug)) {
            page.url = served.to_string();
        }
        self
    }

    /// The next `count` page reads fail
    pub fn flaky_snapshots(self, count: usize) -> Self {
        self.snapshot_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn unreachable(mut self, url: String) -> Self {
        self.unreachable.insert(url);
        self
    }

    pub fn navigations_to(&self, url: &str) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .iter()
            .filter(|visited| visited.as_str() == url)
            .count()
    }

    pub fn detail_navigations(&self) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .iter()
            .filter(|visited| visited.contains("/propiedades/"))
            .count()
    }

    pub fn open_surfaces(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderEngine for FakeSite {
    async fn open_surface(&self) -> Result<SurfaceId, RenderError> {
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(SurfaceId(self.next_surface.fetch_add(1, Ordering::SeqCst)))
    }

    async fn set_request_filter(&self, _: SurfaceId, _: RequestFilter) -> Result<(), RenderError> {
        Ok(())
    }

    async fn navigate(
        &self,
        surface: SurfaceId,
        url: &str,
        _: &NavigateOptions,
    ) -> Result<(), NavigationError> {
        self.navigations.lock().unwrap().push(url.to_string());
        tokio::task::yield_now().await;
        if self.unreachable.contains(url) {
            return Err(NavigationError::Failed {
                url: url.to_string(),
                reason: "net::ERR_TIMED_OUT".to_string(),
            });
        }
        self.current.lock().unwrap().insert(surface, url.to_string());
        Ok(())
    }

    async fn evaluate(&self, _: SurfaceId, _: &str) -> Result<Value, RenderError> {
        Ok(Value::Null)
    }

    async fn close_surface(&self, surface: SurfaceId) {
        self.current.lock().unwrap().remove(&surface);
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    async fn materialize(&self, _: SurfaceId) -> Result<(), RenderError> {
        Ok(())
    }

    async fn snapshot(&self, surface: SurfaceId) -> Result<PageSnapshot, RenderError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .snapshot_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RenderError::Evaluate("Execution context was destroyed".to_string()));
        }
        let url = self
            .current
            .lock()
            .unwrap()
            .get(&surface)
            .cloned()
            .ok_or(RenderError::SurfaceClosed(surface))?;
        // Unknown URLs render like the site's empty "no results" page.
        Ok(self.pages.get(&url).cloned().unwrap_or(PageSnapshot {
            url,
            html: "<html><body><p>Sin resultados</p></body></html>".to_string(),
        }))
    }
}

/// Remote store and event sink in one, recording every call
#[derive(Default)]
pub struct MemoryBackend {
    truth: Vec<StoredRecord>,
    fail_reads: bool,
    pub reads: AtomicUsize,
    pub created: Mutex<Vec<PropertyRecord>>,
    pub deleted: Mutex<Vec<String>>,
    pub published: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn with_truth(entries: Vec<(i64, String)>) -> Self {
        let truth = entries
            .into_iter()
            .map(|(id, href)| StoredRecord {
                id: Some(RemoteId(id.to_string())),
                record: PropertyRecord {
                    href,
                    ..Default::default()
                },
            })
            .collect();
        Self {
            truth,
            ..Default::default()
        }
    }

    pub fn unreadable() -> Self {
        Self {
            fail_reads: true,
            ..Default::default()
        }
    }

    pub fn created_hrefs(&self) -> Vec<String> {
        let mut hrefs: Vec<String> = self
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.href.clone())
            .collect();
        hrefs.sort();
        hrefs
    }
}

#[async_trait]
impl RemoteStore for MemoryBackend {
    async fn fetch_all(&self) -> Result<Vec<StoredRecord>, RemoteError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(RemoteError::Status {
                method: "GET",
                url: "/api/data".to_string(),
                status: 502,
            });
        }
        Ok(self.truth.clone())
    }

    async fn create(&self, record: &PropertyRecord) -> Result<(), RemoteError> {
        self.created.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn delete(&self, id: &RemoteId) -> Result<(), RemoteError> {
        self.deleted.lock().unwrap().push(id.0.clone());
        Ok(())
    }
}

impl EventSink for MemoryBackend {
    fn publish(&self, record: &PropertyRecord) {
        self.published.lock().unwrap().push(record.href.clone());
    }
}
