//! Lexical helpers shared by the heuristic rubrics.
//!
//! Everything here is ASCII case-insensitive and works on byte offsets of
//! the original text, so replacements preserve the casing of untouched
//! words.

pub const STRONG_MODALS: &[&str] = &["shall", "must"];
pub const WEAK_MODALS: &[&str] = &["should", "will", "may", "might", "could", "can"];

const UNITS: &[&str] = &[
    "ms", "millisecond", "milliseconds", "s", "sec", "secs", "second", "seconds", "min", "mins",
    "minute", "minutes", "h", "hour", "hours", "day", "days", "%", "percent", "percentile", "kb",
    "mb", "gb", "tb", "bytes", "users", "requests", "transactions", "rps", "qps", "records",
    "items", "times", "attempts", "retries", "characters", "connections", "sessions", "files",
    "pages",
];

/// Lowercased words with surrounding punctuation stripped.
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect()
}

fn normalize_word(raw: &str) -> String {
    raw.trim_matches(|c: char| !(c.is_alphanumeric() || c == '%' || c == '-'))
        .to_lowercase()
}

pub fn is_modal(word: &str) -> bool {
    STRONG_MODALS.contains(&word) || WEAK_MODALS.contains(&word)
}

pub fn has_strong_modal(words: &[String]) -> bool {
    words.iter().any(|w| STRONG_MODALS.contains(&w.as_str()))
}

pub fn has_weak_modal(words: &[String]) -> bool {
    words.iter().any(|w| WEAK_MODALS.contains(&w.as_str()))
}

pub fn contains_word(words: &[String], target: &str) -> bool {
    words.iter().any(|w| w == target)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-'
}

/// Byte offsets of `phrase` in `text` on word boundaries, ignoring ASCII case.
pub fn find_phrase(text: &str, phrase: &str) -> Vec<usize> {
    if phrase.is_empty() {
        return Vec::new();
    }
    let haystack = text.to_ascii_lowercase();
    let needle = phrase.to_ascii_lowercase();
    let check_start = needle.chars().next().is_some_and(is_word_char);
    let check_end = needle.chars().next_back().is_some_and(is_word_char);

    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let start_ok = !check_start || !haystack[..start].chars().next_back().is_some_and(is_word_char);
        let end_ok = !check_end || !haystack[end..].chars().next().is_some_and(is_word_char);
        if start_ok && end_ok {
            found.push(start);
        }
        from = end;
    }
    found
}

pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    !find_phrase(text, phrase).is_empty()
}

pub fn count_phrase(text: &str, phrase: &str) -> usize {
    find_phrase(text, phrase).len()
}

/// Replace every occurrence of `phrase`, then [`tidy`] the result.
pub fn replace_phrase(text: &str, phrase: &str, replacement: &str) -> String {
    let positions = find_phrase(text, phrase);
    if positions.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + replacement.len());
    let mut last = 0;
    for start in positions {
        out.push_str(&text[last..start]);
        out.push_str(replacement);
        last = start + phrase.len();
    }
    out.push_str(&text[last..]);
    tidy(&out)
}

/// Collapse whitespace and drop spaces left in front of punctuation.
pub fn tidy(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        if matches!(c, ',' | '.' | ';' | ':') && out.ends_with(' ') {
            out.pop();
        }
        out.push(c);
    }
    out
}

/// Text without trailing sentence punctuation, for appending clauses.
pub fn strip_terminal(text: &str) -> &str {
    text.trim().trim_end_matches(['.', ';', '!', ',']).trim_end()
}

/// Capitalized, terminated with a single period.
pub fn as_sentence(text: &str) -> String {
    let trimmed = strip_terminal(text);
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut sentence: String = first.to_uppercase().chain(chars).collect();
    sentence.push('.');
    sentence
}

/// Append `suffix` before the terminal period.
pub fn append_clause(text: &str, suffix: &str) -> String {
    as_sentence(&format!("{} {}", strip_terminal(text), suffix.trim()))
}

fn is_number(word: &str) -> bool {
    let stripped = word
        .trim_end_matches('%')
        .trim_end_matches("st")
        .trim_end_matches("nd")
        .trim_end_matches("rd")
        .trim_end_matches("th")
        .replace(',', "");
    !stripped.is_empty() && stripped.parse::<f64>().is_ok()
}

fn number_with_unit(word: &str) -> bool {
    if !word.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    let split = word
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(word.len());
    let (number, unit) = word.split_at(split);
    is_number(number) && UNITS.contains(&unit)
}

pub fn has_number(words: &[String]) -> bool {
    words.iter().any(|w| w.starts_with(|c: char| c.is_ascii_digit()))
}

/// A number followed (within two words) by a unit, or a number with a unit suffix.
pub fn has_quantity(words: &[String]) -> bool {
    words.iter().enumerate().any(|(i, w)| {
        number_with_unit(w)
            || (is_number(w)
                && words[i + 1..words.len().min(i + 3)]
                    .iter()
                    .any(|next| UNITS.contains(&next.as_str())))
    })
}

/// Split into sentences on `;`, `!`, `?` and on periods followed by
/// whitespace, so decimals such as `99.9%` survive.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let ends = matches!(c, ';' | '!' | '?')
            || (c == '.' && chars.peek().is_none_or(|next| next.is_whitespace()));
        if ends {
            push_trimmed(&mut out, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_trimmed(&mut out, &current);
    out
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Words of `clause` up to its first modal, in original casing.
fn subject_before_modal(clause: &str) -> Option<String> {
    let mut subject = Vec::new();
    for raw in clause.split_whitespace() {
        if is_modal(&normalize_word(raw)) {
            return if subject.is_empty() {
                None
            } else {
                Some(subject.join(" "))
            };
        }
        subject.push(raw);
    }
    None
}

fn has_modal(text: &str) -> bool {
    words(text).iter().any(|w| is_modal(w))
}

/// Independent obligations in `text`.
///
/// A new obligation starts at each sentence and at each `and` whose right
/// side carries its own modal verb. An obligation that starts with the modal
/// borrows the subject of the one before it. Fragments without a modal are
/// folded into the neighbouring obligation.
pub fn obligations(text: &str) -> Vec<String> {
    let mut clauses: Vec<(String, bool)> = Vec::new();

    for sentence in sentences(text) {
        let mut sentence_clauses: Vec<(String, bool)> = Vec::new();
        let mut last = 0;
        let mut parts = Vec::new();
        for start in find_phrase(&sentence, "and") {
            parts.push(&sentence[last..start]);
            last = start + "and".len();
        }
        parts.push(&sentence[last..]);

        for part in parts.into_iter().map(str::trim).filter(|p| !p.is_empty()) {
            let part_modal = has_modal(part);
            match sentence_clauses.last_mut() {
                Some((previous, true)) if part_modal => {
                    let starts_with_modal = part
                        .split_whitespace()
                        .next()
                        .is_some_and(|w| is_modal(&normalize_word(w)));
                    let clause = match subject_before_modal(previous) {
                        Some(subject) if starts_with_modal => format!("{subject} {part}"),
                        _ => part.to_string(),
                    };
                    sentence_clauses.push((clause, true));
                }
                Some((previous, previous_modal)) => {
                    previous.push_str(" and ");
                    previous.push_str(part);
                    *previous_modal |= part_modal;
                }
                None => sentence_clauses.push((part.to_string(), part_modal)),
            }
        }
        clauses.extend(sentence_clauses);
    }

    fold_fragments(clauses)
}

fn fold_fragments(clauses: Vec<(String, bool)>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for (clause, modal) in clauses {
        if modal {
            let mut merged = pending.drain(..).map(|p| as_sentence(&p)).collect::<Vec<_>>();
            merged.push(as_sentence(&clause));
            out.push(merged.join(" "));
        } else if let Some(previous) = out.last_mut() {
            previous.push(' ');
            previous.push_str(&as_sentence(&clause));
        } else {
            pending.push(clause);
        }
    }
    if !pending.is_empty() {
        out.push(pending.iter().map(|p| as_sentence(p)).collect::<Vec<_>>().join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_strip_punctuation_and_lowercase() {
        assert_eq!(words("The App, must (be) fast."), vec!["the", "app", "must", "be", "fast"]);
    }

    #[test]
    fn phrases_respect_word_boundaries() {
        assert!(contains_phrase("The app must be fast", "fast"));
        assert!(!contains_phrase("The app must be steadfast", "fast"));
        assert_eq!(count_phrase("Uptime of 100% and 100%", "100%"), 2);
    }

    #[test]
    fn replace_keeps_surrounding_case_and_tidies() {
        let out = replace_phrase("The System must BASICALLY store data .", "basically", "");
        assert_eq!(out, "The System must store data.");
    }

    #[test]
    fn quantities_need_a_unit() {
        assert!(has_quantity(&words("respond within 2 seconds")));
        assert!(has_quantity(&words("at the 95th percentile")));
        assert!(has_quantity(&words("with 99.9% availability")));
        assert!(has_quantity(&words("in under 200ms")));
        assert!(has_quantity(&words("at least 1,000 concurrent users")));
        assert!(!has_quantity(&words("version 2 of the spec")));
    }

    #[test]
    fn sentences_keep_decimals_together() {
        assert_eq!(
            sentences("Uptime shall be 99.9%. Logs must rotate; backups must run"),
            vec!["Uptime shall be 99.9%", "Logs must rotate", "backups must run"]
        );
    }

    #[test]
    fn obligations_split_on_modal_conjunctions() {
        let clauses = obligations("The system must export reports and must email invoices.");
        assert_eq!(
            clauses,
            vec!["The system must export reports.", "The system must email invoices."]
        );
    }

    #[test]
    fn obligations_do_not_split_compound_subjects_or_objects() {
        assert_eq!(obligations("Research and development must review logs and alerts.").len(), 1);
    }

    #[test]
    fn obligations_fold_fragments_without_modal() {
        let clauses = obligations("Reports are monthly. The system must export reports.");
        assert_eq!(clauses, vec!["Reports are monthly. The system must export reports."]);
    }
}
