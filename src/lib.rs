// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod random;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod timeline;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::classifier::{classify, Classification, Verdict, CRISIS_LEXICON};
pub use crate::config::TriageConfig;
pub use crate::engine::TriageEngine;
pub use crate::error::TriageError;
pub use crate::policy::{Reply, ReplyKind, ResponsePolicy};
pub use crate::session::{Message, Sender, Session, SessionRegistry};
pub use crate::timeline::{Pacing, PendingReply, Submission, Timeline};

/// Build the HTTP app from configuration, including `/metrics` when enabled.
///
/// Installing the Prometheus recorder is process-global, so call this once.
pub fn app(cfg: &TriageConfig) -> anyhow::Result<axum::Router> {
    let state = AppState::from_config(cfg)?;
    let mut router = api::router(state);
    if cfg.metrics {
        let m = crate::metrics::Metrics::init()?;
        router = router.merge(m.router());
    }
    Ok(router)
}
