//! Fishing bot extractor.
//!
//! Typical announcement:
//!
//! ```text
//! 🎣 Улов!
//! Рыбак: @alice
//! Рыба: Окунь
//! Монеты: +5
//! ```

use crate::activity::{ActivityKind, DetectedActivity, SourceGame};

use super::{Extractor, clean_name, labeled_int, labeled_value};

/// Anchors that mark a message as coming from the fishing bot.
const DETECT_ANCHORS: &[&str] = &["🎣", "Улов", "Рыбалка"];

/// Labels naming the player. "Игрок:" appeared in a later bot release.
const ACTOR_LABELS: &[&str] = &["Рыбак:", "Игрок:"];

/// Label carrying the coin reward.
const COINS_LABELS: &[&str] = &["Монеты:"];

/// Label carrying the fish name (optional, metadata only).
const FISH_LABELS: &[&str] = &["Рыба:"];

/// Extractor for fishing-result announcements.
#[derive(Debug, Default)]
pub struct FishingExtractor;

impl FishingExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for FishingExtractor {
    fn game(&self) -> SourceGame {
        SourceGame::Fishing
    }

    fn detect(&self, text: &str) -> bool {
        DETECT_ANCHORS.iter().any(|a| text.contains(a))
    }

    fn extract(&self, text: &str, _chat_id: &str) -> Vec<DetectedActivity> {
        // Actor and coin amount are required; anything else defaults.
        let Some(actor) = labeled_value(text, ACTOR_LABELS).map(|v| clean_name(&v)) else {
            return Vec::new();
        };
        let Some(points) = labeled_int(text, COINS_LABELS) else {
            return Vec::new();
        };
        if actor.is_empty() {
            return Vec::new();
        }

        let mut activity = DetectedActivity::new(
            actor,
            ActivityKind::Fishing,
            points,
            SourceGame::Fishing,
            text,
        );
        if let Some(fish) = labeled_value(text, FISH_LABELS) {
            activity = activity.with_meta("fish", fish);
        }
        vec![activity]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATCH: &str = "🎣 Улов!\nРыбак: @alice\nРыба: Окунь\nМонеты: +5";

    #[test]
    fn detects_fishing_announcement() {
        let ex = FishingExtractor::new();
        assert!(ex.detect(CATCH));
        assert!(!ex.detect("привет всем"));
    }

    #[test]
    fn extracts_catch() {
        let ex = FishingExtractor::new();
        let acts = ex.extract(CATCH, "chat-1");
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].actor, "alice");
        assert_eq!(acts[0].kind, ActivityKind::Fishing);
        assert_eq!(acts[0].raw_points, 5);
        assert_eq!(acts[0].metadata["fish"], "Окунь");
    }

    #[test]
    fn newer_release_uses_igrok_label() {
        let ex = FishingExtractor::new();
        let acts = ex.extract("🎣 Рыбалка\nИгрок: bob\nМонеты: 3", "c");
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].actor, "bob");
        assert_eq!(acts[0].raw_points, 3);
    }

    #[test]
    fn missing_coins_is_a_parse_miss() {
        let ex = FishingExtractor::new();
        assert!(ex.extract("🎣 Улов!\nРыбак: alice", "c").is_empty());
    }

    #[test]
    fn missing_actor_is_a_parse_miss() {
        let ex = FishingExtractor::new();
        assert!(ex.extract("🎣 Улов!\nМонеты: +5", "c").is_empty());
    }

    #[test]
    fn fish_name_is_optional() {
        let ex = FishingExtractor::new();
        let acts = ex.extract("🎣\nРыбак: alice\nМонеты: +2", "c");
        assert_eq!(acts.len(), 1);
        assert!(!acts[0].metadata.contains_key("fish"));
    }
}
