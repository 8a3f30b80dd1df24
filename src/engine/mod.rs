//! Crawl-and-reconcile engine: pagination walk, detail extraction and
//! cleanup of listings that disappeared from the site.

pub mod cooldown;
pub mod known;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod walker;

pub use cooldown::CooldownWindow;
pub use known::{dedupe, KnownHrefs};
pub use pipeline::{BatchReport, ExtractionPipeline, PipelineSettings};
pub use reconcile::{reconcile, ReconcileReport};
pub use retry::RetryPolicy;
pub use session::{SessionResult, SessionRunner};
pub use walker::{CrawlSession, PaginationWalker, TerminationReason, WalkReport, WalkerSettings};
