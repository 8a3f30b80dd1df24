use crate::engine::known::dedupe;
use crate::models::PropertyRecord;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info};

/// Reads records saved by a previous run.
///
/// The cache only speeds things up, so a missing or unreadable file yields
/// an empty list instead of an error.
pub async fn load_seed_cache(path: &Path) -> Vec<PropertyRecord> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No seed cache at {}", path.display());
            return Vec::new();
        }
        Err(e) => {
            error!("Could not read seed cache {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<PropertyRecord>>(&raw) {
        Ok(records) => {
            let total = records.len();
            let records = dedupe(records);
            info!(
                "Loaded {} cached records ({} duplicates dropped)",
                records.len(),
                total - records.len()
            );
            records
        }
        Err(e) => {
            error!("Could not parse seed cache {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
