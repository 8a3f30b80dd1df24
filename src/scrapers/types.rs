use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque handle to one open render surface (a browser tab)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Load state a navigation waits for before it counts as done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitUntil {
    /// The load event fired
    Load,
    /// The load event fired and the network has been quiet for a short window
    NetworkIdle,
}

/// Options for a single navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::NetworkIdle,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Resource classes a surface may be told to block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Other,
}

/// Which resource kinds a surface refuses to load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    blocked: Vec<ResourceKind>,
}

impl RequestFilter {
    /// Let every request through
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Only the document itself and its data requests; used on listing pages
    /// where nothing but the anchors matters.
    pub fn essentials_only() -> Self {
        Self {
            blocked: vec![
                ResourceKind::Image,
                ResourceKind::Stylesheet,
                ResourceKind::Font,
                ResourceKind::Script,
                ResourceKind::Media,
            ],
        }
    }

    pub fn blocks(&self, kind: ResourceKind) -> bool {
        self.blocked.contains(&kind)
    }

    pub fn is_pass_through(&self) -> bool {
        self.blocked.is_empty()
    }
}

/// What a surface currently shows: where it ended up and its markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}
