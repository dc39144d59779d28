//! # Triage engine
//! The one classifier + response policy pair that both the HTTP route and the
//! interactive chat call into, so crisis behavior cannot drift between them.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::classifier::{self, Verdict};
use crate::policy::{Reply, ResponsePolicy};
use crate::random::{RandomSource, ThreadRandom};
use crate::telemetry::fingerprint;

pub struct TriageEngine {
    policy: ResponsePolicy,
    rng: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for TriageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriageEngine")
            .field("topics", &self.policy.topics().len())
            .field("fallback", &self.policy.fallback().len())
            .finish()
    }
}

impl TriageEngine {
    pub fn new(policy: ResponsePolicy, rng: Arc<dyn RandomSource>) -> Self {
        Self { policy, rng }
    }

    /// Reference policy with the thread RNG.
    pub fn reference() -> Self {
        Self::new(ResponsePolicy::reference().clone(), Arc::new(ThreadRandom))
    }

    pub fn policy(&self) -> &ResponsePolicy {
        &self.policy
    }

    pub fn random(&self) -> &dyn RandomSource {
        self.rng.as_ref()
    }

    /// Classify and record the outcome. Crisis hits are logged at warn with
    /// the matched terms and a fingerprint of the text, never the text.
    pub fn classify(&self, text: &str) -> Verdict {
        let verdict = classifier::classify(text);
        let label = verdict.classification().as_str();
        counter!("triage_messages_total", "classification" => label).increment(1);

        if verdict.is_crisis {
            warn!(
                target: "triage",
                id = %fingerprint(text),
                matched = ?verdict.matched,
                "crisis message detected"
            );
        } else {
            debug!(target: "triage", id = %fingerprint(text), "message classified normal");
        }
        verdict
    }

    /// Select the reply for `text` under an already computed verdict.
    pub fn reply_for(&self, text: &str, verdict: &Verdict) -> Reply {
        let reply = self.policy.select_reply(text, verdict, self.rng.as_ref());
        counter!("triage_replies_total", "kind" => reply.kind.label()).increment(1);
        debug!(target: "triage", id = %fingerprint(text), kind = %reply.kind, "reply selected");
        reply
    }

    /// Classify and reply in one step.
    pub fn respond(&self, text: &str) -> (Verdict, Reply) {
        let verdict = self.classify(text);
        let reply = self.reply_for(text, &verdict);
        (verdict, reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ReplyKind;
    use crate::random::SequenceRandom;

    #[test]
    fn respond_hopeless_gives_crisis_script() {
        let engine = TriageEngine::reference();
        let (v, r) = engine.respond("I feel hopeless and can't go on");
        assert!(v.is_crisis);
        assert_eq!(r.kind, ReplyKind::Crisis);
        assert_eq!(r.text, engine.policy().crisis_script());
    }

    #[test]
    fn respond_anxious_gives_anxiety_script() {
        let engine = TriageEngine::reference();
        let (v, r) = engine.respond("I'm anxious about my exam");
        assert!(!v.is_crisis);
        assert_eq!(r.kind, ReplyKind::Topic("anxiety".into()));
    }

    #[test]
    fn injected_random_drives_fallback_choice() {
        let engine = TriageEngine::new(
            ResponsePolicy::reference().clone(),
            Arc::new(SequenceRandom::new([3, 0])),
        );
        let (_, first) = engine.respond("just saying hi");
        let (_, second) = engine.respond("just saying hi");
        assert_eq!(first.kind, ReplyKind::Fallback(3));
        assert_eq!(second.kind, ReplyKind::Fallback(0));
        assert_ne!(first.text, second.text);
    }
}
