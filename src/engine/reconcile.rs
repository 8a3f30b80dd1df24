use crate::engine::known::KnownHrefs;
use crate::error::RemoteError;
use crate::models::StoredRecord;
use crate::remote::RemoteStore;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub obsolete: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Truth records whose listing did not show up on any crawled page
pub fn obsolete_records<'a>(truth: &'a [StoredRecord], known: &KnownHrefs) -> Vec<&'a StoredRecord> {
    truth
        .iter()
        .filter(|stored| !known.was_seen(stored.href()))
        .collect()
}

/// Deletes every stale record from the remote store.
///
/// Deletions are independent: one failing does not stop the rest, and
/// nothing is retried.
pub async fn reconcile(
    store: &dyn RemoteStore,
    truth: &[StoredRecord],
    known: &KnownHrefs,
) -> ReconcileReport {
    let obsolete = obsolete_records(truth, known);
    let mut report = ReconcileReport {
        obsolete: obsolete.len(),
        ..Default::default()
    };

    for stored in obsolete {
        let result = match &stored.id {
            Some(id) => store.delete(id).await,
            None => Err(RemoteError::MissingId(stored.href().to_string())),
        };
        match result {
            Ok(()) => {
                report.removed += 1;
                info!("Removed obsolete listing {}", stored.href());
            }
            Err(e) => {
                report.failed += 1;
                error!("Could not remove obsolete listing {}: {}", stored.href(), e);
            }
        }
    }

    report
}
