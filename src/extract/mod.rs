//! Pattern extractors — one per game bot.
//!
//! Extractors recognize a bot's announcements by fixed anchor labels rather
//! than strict structural parsing, so cosmetic drift between bot releases
//! does not break extraction. Contract: `extract` never panics; a missing
//! required field yields zero activities for the message, never a partial
//! one; optional fields default.

mod bunker;
mod cards;
mod crocodile;
mod fishing;

pub use bunker::BunkerExtractor;
pub use cards::CardGameExtractor;
pub use crocodile::{CrocodileExtractor, SessionState};
pub use fishing::FishingExtractor;

use crate::activity::{DetectedActivity, SourceGame};

/// A pattern extractor for one game bot.
pub trait Extractor: Send + Sync {
    /// Which bot this extractor understands.
    fn game(&self) -> SourceGame;

    /// Cheap membership test over fixed anchor strings. Used by the router
    /// for first-match-wins family selection.
    fn detect(&self, text: &str) -> bool;

    /// Extract zero or more activities from an announcement. `chat_id`
    /// scopes session state; stateless extractors ignore it.
    fn extract(&self, text: &str, chat_id: &str) -> Vec<DetectedActivity>;
}

// ── Anchor-label scanning helpers ───────────────────────────────────

/// First non-negative integer found on a line containing one of `labels`,
/// after the label. Handles `Label: +5` and `Label: 5`. Labels carry their
/// trailing `:` so that one label cannot match inside a longer word.
pub(crate) fn labeled_int(text: &str, labels: &[&str]) -> Option<i64> {
    for line in text.lines() {
        for label in labels {
            if let Some(pos) = line.find(label) {
                if let Some(v) = first_int(&line[pos + label.len()..]) {
                    return Some(v);
                }
            }
        }
    }
    None
}

/// Trimmed remainder of the first line containing `label`, after the label
/// and an optional `:` separator. Empty values count as missing.
pub(crate) fn labeled_value(text: &str, labels: &[&str]) -> Option<String> {
    for line in text.lines() {
        for label in labels {
            if let Some(pos) = line.find(label) {
                let rest = line[pos + label.len()..]
                    .trim_start_matches([':', ' ', '\t'])
                    .trim();
                if !rest.is_empty() {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

/// First run of ASCII digits in `s`, parsed. A `+` prefix is skipped with
/// the other separators; explicit negatives never appear in announcements.
pub(crate) fn first_int(s: &str) -> Option<i64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Split a comma-separated mention list into cleaned names (`@` stripped).
pub(crate) fn mention_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(clean_name)
        .filter(|n| !n.is_empty())
        .collect()
}

/// Strip mention/decoration characters from a name fragment.
pub(crate) fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('@')
        .trim_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_int_parses_plus_prefixed() {
        assert_eq!(labeled_int("Монеты: +5", &["Монеты:"]), Some(5));
        assert_eq!(labeled_int("Очки: 12", &["Очки:"]), Some(12));
        assert_eq!(labeled_int("x\nПриз: +10 монет", &["Приз:"]), Some(10));
    }

    #[test]
    fn labeled_int_missing() {
        assert_eq!(labeled_int("Монеты: много", &["Монеты:"]), None);
        assert_eq!(labeled_int("ничего", &["Монеты:"]), None);
    }

    #[test]
    fn labeled_value_trims_separator() {
        assert_eq!(
            labeled_value("Редкость: Эпическая", &["Редкость:"]),
            Some("Эпическая".to_string())
        );
        assert_eq!(labeled_value("Редкость:", &["Редкость:"]), None);
    }

    #[test]
    fn colon_anchored_label_does_not_match_longer_word() {
        // "Рыба:" must not fire inside "Рыбак: alice"
        assert_eq!(labeled_value("Рыбак: alice", &["Рыба:"]), None);
    }

    #[test]
    fn mention_names_strips_decorations() {
        assert_eq!(
            mention_names("@alice, @bob_92, Carol!"),
            vec!["alice", "bob_92", "Carol"]
        );
        assert!(mention_names(" , ,").is_empty());
    }

    #[test]
    fn first_int_ignores_leading_noise() {
        assert_eq!(first_int(": +42 шт."), Some(42));
        assert_eq!(first_int("нет"), None);
    }
}
