use crate::scrapers::types::SurfaceId;
use thiserror::Error;

/// A page did not reach a stable load state.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("navigation to {url} failed: {reason}")]
    Failed { url: String, reason: String },

    #[error("render surface {0} is not open")]
    SurfaceClosed(SurfaceId),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to open render surface: {0}")]
    Open(String),

    #[error("render surface {0} is not open")]
    SurfaceClosed(SurfaceId),

    #[error("script evaluation failed: {0}")]
    Evaluate(String),

    #[error("request filter could not be installed: {0}")]
    RequestFilter(String),
}

/// Structural assumptions about a detail page did not hold.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("{0} does not look like a listing detail page")]
    NotADetailPage(String),

    #[error("detail page resolved to an empty href")]
    MissingHref,

    #[error("page structure could not be read: {0}")]
    Render(#[from] RenderError),
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("record {0} has no remote identifier")]
    MissingId(String),
}

/// Every attempt of a retried operation failed.
///
/// Whether this is fatal is up to the caller.
#[derive(Error, Debug)]
#[error("{operation} failed after {attempts} attempts: {last_error}")]
pub struct ExhaustedRetries<E: std::error::Error + 'static> {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub last_error: E,
}
