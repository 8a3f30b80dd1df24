use crate::error::{ExtractionError, NavigationError, RenderError};
use crate::models::PropertyRecord;
use crate::scrapers::types::{NavigateOptions, PageSnapshot, RequestFilter, SurfaceId};
use async_trait::async_trait;
use serde_json::Value;

/// Scrolls the document in 100px steps every 100ms until the bottom is
/// reached, so lazily loaded content gets materialized.
pub const PROGRESSIVE_SCROLL_SCRIPT: &str = r#"
new Promise((resolve) => {
    let totalHeight = 0;
    const distance = 100;
    const timer = setInterval(() => {
        const { scrollHeight } = document.body;
        window.scrollBy(0, distance);
        totalHeight += distance;
        if (totalHeight >= scrollHeight - window.innerHeight) {
            clearInterval(timer);
            resolve(true);
        }
    }, 100);
})
"#;

const LOCATION_SCRIPT: &str = "window.location.href";
const OUTER_HTML_SCRIPT: &str = "document.documentElement.outerHTML";

/// Browser capability the crawler drives.
///
/// Surfaces are addressed by id so the engine can be shared behind an `Arc`
/// and used from many extraction tasks at once.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn open_surface(&self) -> Result<SurfaceId, RenderError>;

    async fn set_request_filter(
        &self,
        surface: SurfaceId,
        filter: RequestFilter,
    ) -> Result<(), RenderError>;

    async fn navigate(
        &self,
        surface: SurfaceId,
        url: &str,
        options: &NavigateOptions,
    ) -> Result<(), NavigationError>;

    async fn evaluate(&self, surface: SurfaceId, script: &str) -> Result<Value, RenderError>;

    /// Must not fail; a surface that cannot be closed cleanly is just dropped.
    async fn close_surface(&self, surface: SurfaceId);

    /// Reveal lazily loaded content before the structure is read
    async fn materialize(&self, surface: SurfaceId) -> Result<(), RenderError> {
        self.evaluate(surface, PROGRESSIVE_SCROLL_SCRIPT).await.map(|_| ())
    }

    async fn snapshot(&self, surface: SurfaceId) -> Result<PageSnapshot, RenderError> {
        let url = self.evaluate(surface, LOCATION_SCRIPT).await?;
        let html = self.evaluate(surface, OUTER_HTML_SCRIPT).await?;
        Ok(PageSnapshot {
            url: url.as_str().unwrap_or_default().to_string(),
            html: html.as_str().unwrap_or_default().to_string(),
        })
    }
}

/// Maps one materialized detail page to a record
pub trait FieldExtractor: Send + Sync {
    /// `requested_href` is the link that was followed; the page's own final
    /// URL takes precedence when it is known.
    fn extract(
        &self,
        page: &PageSnapshot,
        requested_href: &str,
    ) -> Result<PropertyRecord, ExtractionError>;
}
