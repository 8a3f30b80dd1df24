use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

const BANNER: &str = "Scraper service running...";

/// Answers 200 text/plain on every path; the hosting platform polls it.
pub fn router() -> Router {
    Router::new().fallback(|| async { BANNER })
}

pub async fn serve(port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind liveness probe on port {}", port))?;
    info!("Liveness probe listening on port {}", port);

    axum::serve(listener, router())
        .await
        .context("Liveness probe stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn any_path_reports_alive_as_plain_text() {
        let response = router()
            .oneshot(Request::builder().uri("/anything/at/all").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], BANNER.as_bytes());
    }
}
