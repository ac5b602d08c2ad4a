//! Engagement Flux - session reconstruction and dwell-time estimation
//!
//! Flux turns an append-only log of page-view events into engagement
//! summaries through a deterministic batch pipeline: store read → session
//! reconstruction → dwell-time estimation + popularity ranking → report.
//!
//! ## Modules
//!
//! - **Recording**: session tokens and the page-view recorder
//! - **Store**: the event-store contract with in-memory and SQLite backends
//! - **Pipeline**: reconstruction, dwell estimation, ranking and aggregation
//! - **Output**: text rendering and JSON encoding

pub mod aggregator;
pub mod config;
pub mod dwell;
pub mod encoder;
pub mod error;
pub mod ingest;
pub mod ranking;
pub mod reconstruct;
pub mod recorder;
pub mod render;
pub mod session_token;
pub mod store;
pub mod types;

pub use aggregator::{EngagementAggregator, UserOutcome};
pub use config::{AveragePolicy, EngagementConfig};
pub use dwell::DwellEstimator;
pub use error::{ComputeError, StoreError};
pub use recorder::EventRecorder;
pub use session_token::SessionContext;
pub use store::{EventStore, MemoryEventStore, SqliteEventStore};
pub use types::{
    EngagementSummary, GlobalSummary, NewPageView, PageCount, PageViewEvent, Session,
    UserProfile, UserReport,
};

/// Flux version embedded in report envelopes
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report envelopes
pub const PRODUCER_NAME: &str = "engagement-flux";
