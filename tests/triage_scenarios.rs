// tests/triage_scenarios.rs
//
// Classification and reply-selection properties over the public API.

use std::collections::HashSet;
use std::sync::Arc;

use mindcare_triage::random::SequenceRandom;
use mindcare_triage::{classify, ReplyKind, ResponsePolicy, TriageEngine, CRISIS_LEXICON};

const WRAPPERS: &[(&str, &str)] = &[
    ("", ""),
    ("honestly ", " tonight"),
    ("WHY DO I ALWAYS THINK ", "?!"),
    ("text before.", ".text after"),
];

const BENIGN: &[&str] = &[
    "I aced my chemistry quiz",
    "going for a walk with friends",
    "what time is the library open",
    "thanks for the help",
    "",
];

#[test]
fn any_lexicon_term_in_any_context_is_crisis() {
    for term in CRISIS_LEXICON {
        for (pre, post) in WRAPPERS {
            for variant in [term.to_string(), term.to_uppercase()] {
                let text = format!("{pre}{variant}{post}");
                assert!(classify(&text).is_crisis, "{text:?}");
            }
        }
    }
}

#[test]
fn text_without_lexicon_terms_is_not_crisis() {
    for text in BENIGN {
        let v = classify(text);
        assert!(!v.is_crisis, "{text:?}");
        assert!(v.matched.is_empty());
    }
}

#[test]
fn crisis_reply_is_constant_regardless_of_term_or_surrounding_text() {
    let engine = TriageEngine::reference();
    let script = engine.policy().crisis_script();
    for term in CRISIS_LEXICON {
        for topic_noise in ["", " and I'm anxious", " so stressed and sad"] {
            let text = format!("I {term}{topic_noise}");
            let (v, r) = engine.respond(&text);
            assert!(v.is_crisis);
            assert_eq!(r.kind, ReplyKind::Crisis);
            assert_eq!(r.text, script, "{text:?}");
        }
    }
}

#[test]
fn anxiety_beats_stress_beats_sadness() {
    let engine = TriageEngine::reference();
    let cases = [
        ("anxiety and stress", "anxiety"),
        ("stressed, anxious, sad", "anxiety"),
        ("stress and feeling sad", "stress"),
        ("a bit depressed", "sadness"),
    ];
    for (text, topic) in cases {
        let (_, r) = engine.respond(text);
        assert_eq!(r.kind, ReplyKind::Topic(topic.to_string()), "{text:?}");
    }
}

#[test]
fn scenario_hopeless_is_crisis() {
    let engine = TriageEngine::reference();
    let (v, r) = engine.respond("I feel hopeless and can't go on");
    assert!(v.is_crisis);
    assert_eq!(r.text, engine.policy().crisis_script());
}

#[test]
fn scenario_anxious_exam_gets_anxiety_script() {
    let engine = TriageEngine::reference();
    let (v, r) = engine.respond("I'm anxious about my exam");
    assert!(!v.is_crisis);
    assert_eq!(r.text, engine.policy().topics()[0].reply);
}

#[test]
fn scenario_greeting_draws_from_fallback_pool() {
    let policy = ResponsePolicy::reference();
    assert!(policy.fallback().len() >= 4);

    let scripted = TriageEngine::new(policy.clone(), Arc::new(SequenceRandom::new([0, 2])));
    let (_, first) = scripted.respond("just saying hi");
    let (_, second) = scripted.respond("just saying hi");
    assert_eq!(first.text, policy.fallback()[0]);
    assert_eq!(second.text, policy.fallback()[2]);

    // With the real RNG the pool is actually sampled.
    let engine = TriageEngine::reference();
    let seen: HashSet<String> = (0..64)
        .map(|_| engine.respond("just saying hi").1.text)
        .collect();
    assert!(seen.iter().all(|r| policy.fallback().contains(r)));
    assert!(seen.len() > 1, "fallback never varied");
}

#[test]
fn known_false_positive_is_preserved() {
    // "die" fires inside "studied"; flagged for clinical review, not patched.
    let v = classify("I studied all night");
    assert!(v.is_crisis);
    assert_eq!(v.matched, vec!["die"]);
}
