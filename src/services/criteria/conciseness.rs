//! Conciseness: no filler, no more words than the obligation needs.

use super::text::{self, words};
use super::{clamp_score, RawScore, Rubric};
use crate::domain::models::CriterionId;

const FILLER: &[(&str, &str)] = &[
    ("it should be noted that", ""),
    ("due to the fact that", "because"),
    ("at this point in time", "now"),
    ("in the event that", "if"),
    ("for the purpose of", "for"),
    ("in order to", "to"),
    ("be able to", ""),
    ("have the ability to", ""),
    ("basically", ""),
    ("actually", ""),
    ("really", ""),
    ("very", ""),
];

pub struct Conciseness;

fn length_score(word_count: usize) -> f64 {
    match word_count {
        0..=30 => 0.9,
        31..=45 => 0.7,
        46..=60 => 0.5,
        _ => 0.3,
    }
}

fn filler(text: &str) -> Vec<&'static str> {
    FILLER
        .iter()
        .filter(|(phrase, _)| text::contains_phrase(text, phrase))
        .map(|(phrase, _)| *phrase)
        .collect()
}

impl Rubric for Conciseness {
    fn criterion(&self) -> CriterionId {
        CriterionId::Conciseness
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement is stated in as few words as its meaning allows. \
         Penalize filler phrases (in order to, basically, it should be noted that), \
         redundancy, and sentences longer than about 30 words."
    }

    fn fix_instructions(&self) -> &'static str {
        "Shorten the requirement: remove filler phrases and redundant wording without \
         changing its meaning, subject, modal verb, or any numeric bound."
    }

    fn assess(&self, text: &str) -> RawScore {
        let count = words(text).len();
        let found = filler(text);
        let rationale = if found.is_empty() {
            format!("{count} words, no filler.")
        } else {
            format!("{count} words; filler: {}.", found.join(", "))
        };
        RawScore {
            score: clamp_score(length_score(count) - 0.1 * found.len() as f64).max(0.1),
            rationale,
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        if filler(text).is_empty() {
            return None;
        }
        let mut revised = text.to_string();
        for (phrase, shorter) in FILLER {
            revised = text::replace_phrase(&revised, phrase, shorter);
        }
        Some(text::as_sentence(&revised))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_is_removed() {
        let text = "In order to comply, the system must basically be able to archive invoices.";
        let revised = Conciseness.revise(text, None).unwrap();
        assert_eq!(revised, "To comply, the system must archive invoices.");
    }

    #[test]
    fn long_text_scores_lower() {
        let long = "word ".repeat(70);
        assert!(Conciseness.assess(&long).score < 0.6);
        assert!(Conciseness.assess("The app must be fast").score >= 0.6);
    }
}
