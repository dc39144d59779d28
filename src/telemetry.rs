//! Tracing setup and log-safe text fingerprints.

use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "triage=info,api=info,warn";

/// Install the global subscriber: compact lines by default, JSON when asked.
/// Filter comes from `RUST_LOG`. Returns false if a subscriber was already
/// installed (e.g. by the hosting runtime).
pub fn init_tracing(json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    res.is_ok()
}

/// Short SHA-256 fingerprint of a message body. Raw chat text never goes to
/// the logs; this id lets operators correlate lines about the same message.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
