use crate::error::{NavigationError, RenderError};
use crate::scrapers::traits::RenderEngine;
use crate::scrapers::types::{NavigateOptions, RequestFilter, ResourceKind, SurfaceId, WaitUntil};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Extra wait after the load event when a navigation asks for network idle
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

/// Render engine backed by headless Chrome, one tab per surface.
///
/// headless_chrome is blocking, so every call runs on the blocking pool.
pub struct ChromeRenderEngine {
    browser: Arc<Browser>,
    tabs: Mutex<HashMap<SurfaceId, Arc<Tab>>>,
    next_id: AtomicU64,
}

impl ChromeRenderEngine {
    /// Launch a new Chrome instance
    pub fn launch(headless: bool) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(false)
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser: Arc::new(browser),
            tabs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn tab(&self, surface: SurfaceId) -> Option<Arc<Tab>> {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&surface)
            .cloned()
    }
}

fn resource_kind(resource: &ResourceType) -> ResourceKind {
    match resource {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Media => ResourceKind::Media,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Script => ResourceKind::Script,
        _ => ResourceKind::Other,
    }
}

async fn blocking<T, F>(job: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(e) => Err(format!("browser task panicked: {}", e)),
    }
}

#[async_trait]
impl RenderEngine for ChromeRenderEngine {
    async fn open_surface(&self) -> Result<SurfaceId, RenderError> {
        let browser = Arc::clone(&self.browser);
        let tab = blocking(move || browser.new_tab()).await.map_err(RenderError::Open)?;

        let surface = SurfaceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(surface, tab);
        debug!("Opened render surface {}", surface);
        Ok(surface)
    }

    async fn set_request_filter(
        &self,
        surface: SurfaceId,
        filter: RequestFilter,
    ) -> Result<(), RenderError> {
        if filter.is_pass_through() {
            return Ok(());
        }
        let tab = self.tab(surface).ok_or(RenderError::SurfaceClosed(surface))?;

        blocking(move || {
            let patterns = vec![RequestPattern {
                url_pattern: None,
                resource_Type: None,
                request_stage: Some(RequestStage::Request),
            }];
            tab.enable_fetch(Some(patterns.as_slice()), None)?;
            tab.enable_request_interception(Arc::new(
                move |_transport: Arc<Transport>,
                      _session_id: SessionId,
                      intercepted: RequestPausedEvent| {
                    if filter.blocks(resource_kind(&intercepted.params.resource_Type)) {
                        RequestPausedDecision::Fail(FailRequest {
                            request_id: intercepted.params.request_id,
                            error_reason: ErrorReason::BlockedByClient,
                        })
                    } else {
                        RequestPausedDecision::Continue(None)
                    }
                },
            ))?;
            Ok(())
        })
        .await
        .map_err(RenderError::RequestFilter)
    }

    async fn navigate(
        &self,
        surface: SurfaceId,
        url: &str,
        options: &NavigateOptions,
    ) -> Result<(), NavigationError> {
        let tab = self.tab(surface).ok_or(NavigationError::SurfaceClosed(surface))?;
        let target = url.to_string();
        let options = *options;

        blocking(move || {
            tab.set_default_timeout(options.timeout);
            tab.navigate_to(&target)?.wait_until_navigated()?;
            if options.wait_until == WaitUntil::NetworkIdle {
                thread::sleep(NETWORK_IDLE_GRACE);
            }
            Ok(())
        })
        .await
        .map_err(|reason| NavigationError::Failed {
            url: url.to_string(),
            reason,
        })
    }

    async fn evaluate(&self, surface: SurfaceId, script: &str) -> Result<Value, RenderError> {
        let tab = self.tab(surface).ok_or(RenderError::SurfaceClosed(surface))?;
        let script = script.to_string();

        blocking(move || {
            let result = tab.evaluate(&script, true)?;
            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
        .map_err(RenderError::Evaluate)
    }

    async fn close_surface(&self, surface: SurfaceId) {
        let tab = self
            .tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&surface);
        let Some(tab) = tab else {
            return;
        };

        if let Err(e) = blocking(move || tab.close(true).map(|_| ())).await {
            debug!("Render surface {} did not close cleanly: {}", surface, e);
        }
    }
}
