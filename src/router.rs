//! Activity router — decides which extractor family an announcement
//! belongs to and collects its activities in order.
//!
//! Family membership is inferred by scanning fixed anchor sets in an
//! explicit priority order; the *first* matching family wins, not the best
//! match. The order is a field of the router so it stays auditable and
//! testable rather than an implicit fallthrough.

use std::sync::Arc;

use tracing::debug;

use crate::activity::{DetectedActivity, SourceGame};
use crate::extract::{
    BunkerExtractor, CardGameExtractor, CrocodileExtractor, Extractor, FishingExtractor,
};

/// Routes raw announcement text to the right extractor family.
pub struct ActivityRouter {
    /// Priority order: crocodile first (most specific markers), bunker last.
    families: Vec<Arc<dyn Extractor>>,
    /// Kept separately for the mid-round fallback.
    crocodile: Arc<CrocodileExtractor>,
}

impl ActivityRouter {
    pub fn new() -> Self {
        let crocodile = Arc::new(CrocodileExtractor::new());
        let families: Vec<Arc<dyn Extractor>> = vec![
            crocodile.clone(),
            Arc::new(CardGameExtractor::new()),
            Arc::new(FishingExtractor::new()),
            Arc::new(BunkerExtractor::new()),
        ];
        Self {
            families,
            crocodile,
        }
    }

    /// The family priority order, for audit and tests.
    pub fn family_order(&self) -> Vec<SourceGame> {
        self.families.iter().map(|e| e.game()).collect()
    }

    /// Route a message to its extractor family.
    ///
    /// A recognized `source_hint` restricts routing to that game's
    /// extractor. Without one, the first family whose anchors match wins.
    /// Anchor-less lines still reach the crocodile extractor while a round
    /// is in progress for this chat.
    pub fn route(
        &self,
        text: &str,
        chat_id: &str,
        source_hint: Option<&str>,
    ) -> Vec<DetectedActivity> {
        if let Some(game) = source_hint.and_then(SourceGame::from_hint) {
            debug!(chat_id, game = game.label(), "routing by source hint");
            return self
                .families
                .iter()
                .filter(|e| e.game() == game)
                .flat_map(|e| e.extract(text, chat_id))
                .collect();
        }

        for extractor in &self.families {
            if extractor.detect(text) {
                debug!(chat_id, game = extractor.game().label(), "anchor match");
                return extractor.extract(text, chat_id);
            }
        }

        // Mid-round crocodile lines ("Alice: банан") carry no anchors.
        if self.crocodile.has_active_round(chat_id) {
            return self.crocodile.extract(text, chat_id);
        }

        Vec::new()
    }

    /// Access to crocodile session state (inspection and tests).
    pub fn crocodile(&self) -> &CrocodileExtractor {
        &self.crocodile
    }
}

impl Default for ActivityRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;

    #[test]
    fn family_order_is_pinned() {
        let router = ActivityRouter::new();
        assert_eq!(
            router.family_order(),
            vec![
                SourceGame::Crocodile,
                SourceGame::Cards,
                SourceGame::Fishing,
                SourceGame::Bunker,
            ]
        );
    }

    #[test]
    fn routes_fishing_by_anchor() {
        let router = ActivityRouter::new();
        let acts = router.route("🎣 Улов!\nРыбак: alice\nМонеты: +5", "c", None);
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].source_game, SourceGame::Fishing);
    }

    #[test]
    fn routes_cards_by_anchor() {
        let router = ActivityRouter::new();
        let acts = router.route("🎴 Новая карта!\nИгрок: bob\nОчки: +3", "c", None);
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].source_game, SourceGame::Cards);
    }

    #[test]
    fn unmatched_text_yields_nothing() {
        let router = ActivityRouter::new();
        assert!(router.route("всем привет", "c", None).is_empty());
    }

    #[test]
    fn source_hint_restricts_family() {
        let router = ActivityRouter::new();
        // Fishing-shaped message, but the hint says cards: no cards anchors → miss.
        let acts = router.route("🎣 Улов!\nРыбак: alice\nМонеты: +5", "c", Some("cards"));
        assert!(acts.is_empty());
        // Matching hint extracts normally.
        let acts = router.route("🎣 Улов!\nРыбак: alice\nМонеты: +5", "c", Some("fishing"));
        assert_eq!(acts.len(), 1);
    }

    #[test]
    fn unknown_hint_falls_back_to_inference() {
        let router = ActivityRouter::new();
        let acts = router.route("🎣 Улов!\nРыбак: alice\nМонеты: +5", "c", Some("chess"));
        assert_eq!(acts.len(), 1);
    }

    #[test]
    fn mid_round_lines_reach_crocodile_without_anchors() {
        let router = ActivityRouter::new();
        assert!(router.route("🐊 раунд начался!", "c", None).is_empty());

        let acts = router.route("Alice: банан", "c", None);
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].kind, ActivityKind::Participate);

        // Without an active round the same line routes nowhere.
        assert!(router.route("Alice: банан", "other-chat", None).is_empty());
    }

    #[test]
    fn first_match_wins_over_later_families() {
        let router = ActivityRouter::new();
        // A crocodile end marker mentioning a prize must not reach bunker,
        // even though bunker also knows "Приз:".
        router.route("🐊 раунд начался!", "c", None);
        router.route("Bob угадал слово!", "c", None);
        let acts = router.route("🐊 Раунд окончен! Приз: +7", "c", None);
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].source_game, SourceGame::Crocodile);
    }
}
