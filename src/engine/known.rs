use crate::models::Listing;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Hrefs already accounted for during one crawl session.
///
/// Two sets are tracked:
/// * `known`: remote truth, the seed cache and everything dispatched this
///   session. Drives dedup; a known href is never extracted again.
/// * `seen`: hrefs actually present on the pages crawled this session.
///   Drives reconciliation; remote records outside it are stale.
///
/// Keys are compared verbatim, no URL normalisation. Both sets only grow.
#[derive(Debug, Default)]
pub struct KnownHrefs {
    inner: Mutex<Sets>,
}

#[derive(Debug, Default)]
struct Sets {
    known: HashSet<String>,
    seen: HashSet<String>,
}

impl KnownHrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hrefs<I, S>(hrefs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let known = hrefs.into_iter().map(Into::into).collect();
        Self {
            inner: Mutex::new(Sets {
                known,
                seen: HashSet::new(),
            }),
        }
    }

    fn sets(&self) -> std::sync::MutexGuard<'_, Sets> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_known(&self, href: &str) -> bool {
        self.sets().known.contains(href)
    }

    /// Inserts `href`, returning `true` only for the caller that inserted it.
    ///
    /// Insert-then-check in a single step: of any number of concurrent
    /// callers with the same href exactly one gets `true`.
    pub fn mark_known(&self, href: &str) -> bool {
        self.sets().known.insert(href.to_string())
    }

    /// Records that these hrefs are listed on a page crawled this session
    pub fn observe_all<'a>(&self, hrefs: impl IntoIterator<Item = &'a String>) {
        let mut sets = self.sets();
        for href in hrefs {
            sets.seen.insert(href.clone());
        }
    }

    pub fn was_seen(&self, href: &str) -> bool {
        self.sets().seen.contains(href)
    }

    pub fn known_count(&self) -> usize {
        self.sets().known.len()
    }

    pub fn seen_count(&self) -> usize {
        self.sets().seen.len()
    }
}

/// Collapses `records` to the first occurrence of each href, keeping order
pub fn dedupe<T: Listing>(records: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.href().to_string()))
        .collect()
}
