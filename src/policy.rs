//! Response policy: crisis script, ordered topic rules, and the fallback pool.
//!
//! The reference policy lives in `config/response_policy.toml` and is embedded
//! at build time; operators may load a replacement file with the same schema.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::classifier::{normalize, Verdict};
use crate::random::RandomSource;

/// Minimum number of generic replies a policy must carry.
pub const MIN_FALLBACK_POOL: usize = 4;

static REFERENCE: Lazy<ResponsePolicy> = Lazy::new(|| {
    ResponsePolicy::from_toml_str(include_str!("../config/response_policy.toml"))
        .expect("valid reference response policy")
});

/// One topical rule: any keyword present selects `reply`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopicRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub reply: String,
}

impl TopicRule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Validated on every deserialize: a constructed policy always has a
/// non-empty crisis script and at least [`MIN_FALLBACK_POOL`] fallbacks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub struct ResponsePolicy {
    /// Opening bot message of every new conversation.
    greeting: String,
    crisis_script: String,
    /// Evaluated in file order; first match wins.
    topics: Vec<TopicRule>,
    fallback: Vec<String>,
}

/// On-disk shape of a policy, before keyword normalization and validation.
#[derive(Deserialize)]
struct RawPolicy {
    greeting: String,
    crisis_script: String,
    #[serde(default)]
    topics: Vec<TopicRule>,
    fallback: Vec<String>,
}

impl TryFrom<RawPolicy> for ResponsePolicy {
    type Error = anyhow::Error;

    /// Keywords are lowercased so they compare against the normalized message.
    fn try_from(raw: RawPolicy) -> anyhow::Result<Self> {
        let mut topics = raw.topics;
        for topic in &mut topics {
            for k in &mut topic.keywords {
                *k = k.trim().to_lowercase();
            }
        }
        let policy = ResponsePolicy {
            greeting: raw.greeting,
            crisis_script: raw.crisis_script,
            topics,
            fallback: raw.fallback,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// Which branch of the policy produced a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    Crisis,
    Topic(String),
    Fallback(usize),
}

impl ReplyKind {
    /// Low-cardinality label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ReplyKind::Crisis => "crisis",
            ReplyKind::Topic(_) => "topic",
            ReplyKind::Fallback(_) => "fallback",
        }
    }
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyKind::Crisis => f.write_str("crisis"),
            ReplyKind::Topic(name) => write!(f, "topic:{name}"),
            ReplyKind::Fallback(i) => write!(f, "fallback:{i}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,
}

impl ResponsePolicy {
    /// The built-in MindBot policy.
    pub fn reference() -> &'static ResponsePolicy {
        &REFERENCE
    }

    /// Parse and validate a policy from TOML.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn crisis_script(&self) -> &str {
        &self.crisis_script
    }

    pub fn topics(&self) -> &[TopicRule] {
        &self.topics
    }

    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading response policy from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid response policy in {}", path.display()))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.greeting.trim().is_empty() {
            bail!("greeting must not be empty");
        }
        if self.crisis_script.trim().is_empty() {
            bail!("crisis_script must not be empty");
        }
        for t in &self.topics {
            if t.reply.trim().is_empty() {
                bail!("topic `{}` has an empty reply", t.name);
            }
            if t.keywords.is_empty() || t.keywords.iter().any(|k| k.is_empty()) {
                bail!("topic `{}` needs non-empty keywords", t.name);
            }
        }
        if self.fallback.len() < MIN_FALLBACK_POOL {
            bail!(
                "fallback pool needs at least {MIN_FALLBACK_POOL} replies, got {}",
                self.fallback.len()
            );
        }
        if self.fallback.iter().any(|r| r.trim().is_empty()) {
            bail!("fallback pool contains an empty reply");
        }
        Ok(())
    }

    /// Pick the reply for `text` under `verdict`.
    ///
    /// Crisis short-circuits everything and always yields the fixed script.
    /// Otherwise the first matching topic wins, and only when none matches is
    /// a fallback drawn from `rng`.
    pub fn select_reply(&self, text: &str, verdict: &Verdict, rng: &dyn RandomSource) -> Reply {
        if verdict.is_crisis {
            return Reply {
                text: self.crisis_script.clone(),
                kind: ReplyKind::Crisis,
            };
        }

        let lowered = normalize(text);
        if let Some(rule) = self.topics.iter().find(|t| t.matches(&lowered)) {
            return Reply {
                text: rule.reply.clone(),
                kind: ReplyKind::Topic(rule.name.clone()),
            };
        }

        // Pool is non-empty once validated.
        let idx = rng.index(self.fallback.len()) % self.fallback.len();
        Reply {
            text: self.fallback[idx].clone(),
            kind: ReplyKind::Fallback(idx),
        }
    }
}
