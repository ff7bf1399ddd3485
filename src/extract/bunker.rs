//! Bunker (survival social game) bot extractor.
//!
//! Two announcement kinds, both potentially multi-reward:
//!
//! ```text
//! 🏚 Игра окончена!            🏚 Раунд пройден!
//! Победители: @alice, @bob     Выжившие: @alice, @bob
//! Приз: +20
//! ```
//!
//! Every listed winner gets the prize; every listed survivor gets a fixed
//! per-round credit.

use crate::activity::{ActivityKind, DetectedActivity, SourceGame};

use super::{Extractor, labeled_int, labeled_value, mention_names};

const GAME_END_ANCHORS: &[&str] = &["Игра окончена", "Игра завершена"];
const SURVIVAL_ANCHORS: &[&str] = &["Раунд пройден", "Выжившие:"];

const WINNERS_LABELS: &[&str] = &["Победители:"];
const SURVIVORS_LABELS: &[&str] = &["Выжившие:"];
const PRIZE_LABELS: &[&str] = &["Приз:"];

/// Prize per winner when the announcement carries no number.
const DEFAULT_PRIZE: i64 = 10;
/// Credit per survivor per round.
const SURVIVAL_POINTS: i64 = 2;

/// Extractor for bunker game announcements.
#[derive(Debug, Default)]
pub struct BunkerExtractor;

impl BunkerExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn any_anchor(text: &str, anchors: &[&str]) -> bool {
    anchors.iter().any(|a| text.contains(a))
}

impl Extractor for BunkerExtractor {
    fn game(&self) -> SourceGame {
        SourceGame::Bunker
    }

    fn detect(&self, text: &str) -> bool {
        text.contains("🏚")
            || any_anchor(text, GAME_END_ANCHORS)
            || any_anchor(text, SURVIVAL_ANCHORS)
    }

    fn extract(&self, text: &str, _chat_id: &str) -> Vec<DetectedActivity> {
        if any_anchor(text, GAME_END_ANCHORS) {
            let Some(winners) = labeled_value(text, WINNERS_LABELS) else {
                return Vec::new();
            };
            let prize = labeled_int(text, PRIZE_LABELS).unwrap_or(DEFAULT_PRIZE);
            return mention_names(&winners)
                .into_iter()
                .map(|name| {
                    DetectedActivity::new(
                        name,
                        ActivityKind::GameWin,
                        prize,
                        SourceGame::Bunker,
                        text,
                    )
                })
                .collect();
        }

        if any_anchor(text, SURVIVAL_ANCHORS) {
            let Some(survivors) = labeled_value(text, SURVIVORS_LABELS) else {
                return Vec::new();
            };
            return mention_names(&survivors)
                .into_iter()
                .map(|name| {
                    DetectedActivity::new(
                        name,
                        ActivityKind::SurvivalRound,
                        SURVIVAL_POINTS,
                        SourceGame::Bunker,
                        text,
                    )
                })
                .collect();
        }

        Vec::new()
    }
}
