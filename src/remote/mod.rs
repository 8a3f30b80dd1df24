pub mod events;

use crate::error::RemoteError;
use crate::models::{PropertyRecord, RemoteId, StoredRecord};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub use events::{EventSink, NullEventSink, WsEventSink};

/// Backend that holds the previously known listings
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Current truth snapshot
    async fn fetch_all(&self) -> Result<Vec<StoredRecord>, RemoteError>;

    async fn create(&self, record: &PropertyRecord) -> Result<(), RemoteError>;

    async fn delete(&self, id: &RemoteId) -> Result<(), RemoteError>;
}

/// The backend has answered both with a bare array and with `{"data": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotBody {
    Bare(Vec<StoredRecord>),
    Wrapped { data: Vec<StoredRecord> },
}

impl SnapshotBody {
    fn into_records(self) -> Vec<StoredRecord> {
        match self {
            SnapshotBody::Bare(records) | SnapshotBody::Wrapped { data: records } => records,
        }
    }
}

/// JSON-over-HTTP remote store
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(method: &'static str, url: String, response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(RemoteError::Status {
                method,
                url,
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_all(&self) -> Result<Vec<StoredRecord>, RemoteError> {
        let url = self.endpoint("/api/data");
        debug!("Fetching truth snapshot from {}", url);

        let response = self.client.get(&url).send().await?;
        let body: SnapshotBody = Self::check("GET", url, response)?.json().await?;
        Ok(body.into_records())
    }

    async fn create(&self, record: &PropertyRecord) -> Result<(), RemoteError> {
        let url = self.endpoint("/api/tasks");
        let response = self.client.post(&url).json(record).send().await?;
        let response = Self::check("POST", url, response)?;
        debug!("Stored {} ({})", record.href, response.status());
        Ok(())
    }

    async fn delete(&self, id: &RemoteId) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("/api/data/{}", id));
        let response = self.client.delete(&url).send().await?;
        Self::check("DELETE", url, response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_accepts_bare_and_wrapped_bodies() {
        let bare: SnapshotBody =
            serde_json::from_value(json!([{"id": 1, "href": "/a"}, {"id": 2, "href": "/b"}]))
                .unwrap();
        assert_eq!(bare.into_records().len(), 2);

        let wrapped: SnapshotBody =
            serde_json::from_value(json!({"data": [{"href": "/a", "price": "USD 1"}]})).unwrap();
        let records = wrapped.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.price, "USD 1");
        assert_eq!(records[0].id, None);
    }

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let store = HttpRemoteStore::new("https://backend.test/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.endpoint("/api/data"), "https://backend.test/api/data");
    }
}
