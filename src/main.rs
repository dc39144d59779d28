//! MindCare triage service: binary entrypoint.
//! Boots the Axum HTTP server with the chat routes and optional metrics.

use mindcare_triage::{telemetry, TriageConfig};
use shuttle_axum::ShuttleAxum;
use tracing::info;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let cfg = TriageConfig::from_env();
    // The hosting runtime may already have installed a subscriber.
    telemetry::init_tracing(cfg.log_json);

    let router = mindcare_triage::app(&cfg)?;
    info!(
        target: "api",
        keep_history = cfg.keep_history,
        metrics = cfg.metrics,
        custom_policy = cfg.policy_path.is_some(),
        "triage service ready"
    );

    Ok(router.into())
}
