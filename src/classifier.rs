//! # Crisis classifier
//! Fixed-lexicon crisis detection shared by the HTTP and interactive chat.
//!
//! Matching is plain substring containment over the lowercased message, so a
//! term also fires inside a longer word ("die" in "diet"). Recall wins over
//! precision here; a missed crisis is the failure mode that matters.

use serde::{Deserialize, Serialize};

/// Terms whose presence marks a message as crisis. Compiled in on purpose so
/// the escalation trigger can be audited from source alone.
pub const CRISIS_LEXICON: &[&str] = &[
    "suicide",
    "kill myself",
    "end it all",
    "hurt myself",
    "die",
    "hopeless",
    "can't go on",
];

/// Message-level classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Crisis,
    Normal,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Crisis => "crisis",
            Classification::Normal => "normal",
        }
    }
}

/// Outcome of [`classify`]: the crisis flag plus the lexicon terms that fired.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Verdict {
    pub is_crisis: bool,
    /// Lexicon terms found in the text, in lexicon order. Empty when not crisis.
    pub matched: Vec<&'static str>,
}

impl Verdict {
    /// Label for the bot reply produced under this verdict.
    pub fn classification(&self) -> Classification {
        if self.is_crisis {
            Classification::Crisis
        } else {
            Classification::Normal
        }
    }

    /// Label stamped on the triggering user message: only crisis is recorded,
    /// ordinary user messages stay unlabelled.
    pub fn user_label(&self) -> Option<Classification> {
        self.is_crisis.then_some(Classification::Crisis)
    }
}

/// Classify `text` against [`CRISIS_LEXICON`]. Pure and infallible; empty
/// text is never crisis.
pub fn classify(text: &str) -> Verdict {
    let haystack = normalize(text);
    let matched: Vec<&'static str> = CRISIS_LEXICON
        .iter()
        .copied()
        .filter(|term| haystack.contains(term))
        .collect();

    Verdict {
        is_crisis: !matched.is_empty(),
        matched,
    }
}

/// Lowercase and fold the typographic apostrophe (`’`) into `'`, which mobile
/// keyboards insert in "can’t".
pub(crate) fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_lexicon_term_triggers_in_any_case() {
        for term in CRISIS_LEXICON {
            let upper = format!("Lately I {} and nobody knows", term.to_uppercase());
            let v = classify(&upper);
            assert!(v.is_crisis, "term '{term}' must trigger");
            assert!(v.matched.contains(term));
        }
    }

    #[test]
    fn plain_text_is_not_crisis() {
        let v = classify("Exams are next week and I want to plan my revision");
        assert!(!v.is_crisis);
        assert!(v.matched.is_empty());
        assert_eq!(v.classification(), Classification::Normal);
        assert_eq!(v.user_label(), None);
    }

    #[test]
    fn empty_text_is_not_crisis() {
        assert_eq!(classify(""), Verdict::default());
    }

    #[test]
    fn substring_inside_longer_word_still_fires() {
        // Known false positive kept for recall.
        let v = classify("starting a new diet tomorrow");
        assert!(v.is_crisis);
        assert_eq!(v.matched, vec!["die"]);
    }

    #[test]
    fn typographic_apostrophe_matches() {
        let v = classify("I can\u{2019}t go on like this");
        assert!(v.is_crisis);
        assert_eq!(v.matched, vec!["can't go on"]);
    }

    #[test]
    fn multiple_terms_are_reported_in_lexicon_order() {
        let v = classify("I feel hopeless and can't go on");
        assert!(v.is_crisis);
        assert_eq!(v.matched, vec!["hopeless", "can't go on"]);
        assert_eq!(v.user_label(), Some(Classification::Crisis));
    }

    #[test]
    fn classify_is_idempotent() {
        let text = "I want to END IT ALL";
        assert_eq!(classify(text), classify(text));
    }
}
