// src/config/triage.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::policy::ResponsePolicy;
use crate::timeline::Pacing;

// --- env defaults & names ---
pub const DEFAULT_TYPING_MIN_MS: u64 = 1000;
pub const DEFAULT_TYPING_MAX_MS: u64 = 3000;
pub const DEFAULT_API_DELAY_MS: u64 = 0;

pub const ENV_TYPING_MIN_MS: &str = "TRIAGE_TYPING_MIN_MS";
pub const ENV_TYPING_MAX_MS: &str = "TRIAGE_TYPING_MAX_MS";
pub const ENV_API_DELAY_MS: &str = "TRIAGE_API_DELAY_MS";
pub const ENV_POLICY_PATH: &str = "TRIAGE_POLICY_PATH";
pub const ENV_KEEP_HISTORY: &str = "TRIAGE_KEEP_HISTORY";
pub const ENV_METRICS: &str = "TRIAGE_METRICS";
pub const ENV_LOG_JSON: &str = "TRIAGE_LOG_JSON";

/// Upper bound for any configured delay; keeps a typo from parking replies for hours.
const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageConfig {
    /// Reply pacing for the interactive chat.
    pub typing: Pacing,
    /// Reply pacing for `POST /api/chat`.
    pub api_delay: Duration,
    /// `None` → embedded reference policy.
    pub policy_path: Option<PathBuf>,
    pub keep_history: bool,
    pub metrics: bool,
    pub log_json: bool,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            typing: Pacing::new(
                Duration::from_millis(DEFAULT_TYPING_MIN_MS),
                Duration::from_millis(DEFAULT_TYPING_MAX_MS),
            ),
            api_delay: Duration::from_millis(DEFAULT_API_DELAY_MS),
            policy_path: None,
            keep_history: false,
            metrics: false,
            log_json: false,
        }
    }
}

impl TriageConfig {
    /// Read from process environment (call `dotenvy::dotenv()` first in binaries).
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let min = parse_ms(lookup(ENV_TYPING_MIN_MS)).unwrap_or(DEFAULT_TYPING_MIN_MS);
        let max = parse_ms(lookup(ENV_TYPING_MAX_MS)).unwrap_or(DEFAULT_TYPING_MAX_MS);
        let api = parse_ms(lookup(ENV_API_DELAY_MS)).unwrap_or(DEFAULT_API_DELAY_MS);

        let policy_path = lookup(ENV_POLICY_PATH)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            typing: Pacing::new(Duration::from_millis(min), Duration::from_millis(max)),
            api_delay: Duration::from_millis(api),
            policy_path,
            keep_history: parse_flag(lookup(ENV_KEEP_HISTORY)),
            metrics: parse_flag(lookup(ENV_METRICS)),
            log_json: parse_flag(lookup(ENV_LOG_JSON)),
        }
    }

    pub fn api_pacing(&self) -> Pacing {
        Pacing::fixed(self.api_delay)
    }

    /// Load the configured policy, or the embedded reference one.
    pub fn load_policy(&self) -> anyhow::Result<ResponsePolicy> {
        match &self.policy_path {
            Some(path) => ResponsePolicy::from_path(path)
                .with_context(|| format!("{ENV_POLICY_PATH}={}", path.display())),
            None => Ok(ResponsePolicy::reference().clone()),
        }
    }
}

// parse a millisecond count and clamp to <0..=MAX_DELAY_MS>
fn parse_ms(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .map(|v| v.min(MAX_DELAY_MS))
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(
        raw.unwrap_or_default().trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> TriageConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TriageConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_env_gives_reference_defaults() {
        let c = cfg(&[]);
        assert_eq!(c, TriageConfig::default());
        assert_eq!(c.typing, Pacing::typing());
        assert_eq!(c.api_pacing(), Pacing::immediate());
    }

    #[test]
    fn bad_numbers_fall_back_and_inverted_window_is_swapped() {
        let c = cfg(&[
            (ENV_TYPING_MIN_MS, "5000"),
            (ENV_TYPING_MAX_MS, "200"),
            (ENV_API_DELAY_MS, "soon"),
        ]);
        assert_eq!(c.typing.min(), Duration::from_millis(200));
        assert_eq!(c.typing.max(), Duration::from_millis(5000));
        assert_eq!(c.api_delay, Duration::ZERO);
    }

    #[test]
    fn huge_delay_is_clamped() {
        let c = cfg(&[(ENV_API_DELAY_MS, "999999999")]);
        assert_eq!(c.api_delay, Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn flags_accept_common_truthy_values() {
        let c = cfg(&[
            (ENV_KEEP_HISTORY, "1"),
            (ENV_METRICS, "TRUE"),
            (ENV_LOG_JSON, "off"),
        ]);
        assert!(c.keep_history);
        assert!(c.metrics);
        assert!(!c.log_json);
    }

    #[test]
    fn missing_policy_file_is_an_error() {
        let c = cfg(&[(ENV_POLICY_PATH, "/definitely/not/here.toml")]);
        let err = c.load_policy().unwrap_err();
        assert!(format!("{err:#}").contains("TRIAGE_POLICY_PATH"), "{err:#}");
    }
}
