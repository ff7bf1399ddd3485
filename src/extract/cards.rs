//! Card-collection bot extractor.
//!
//! The card bot announces several message kinds; all are dispatched off
//! fixed header anchors:
//!
//! ```text
//! 🎴 Новая карта!          ⚔️ Битва окончена!      🎁 Ежедневный бонус
//! Игрок: @bob              Победитель: @bob        Игрок: @bob
//! Карта: Дракон            Очки: +4                Очки: +2
//! Редкость: Эпическая
//! Коллекция: Мифы
//! Лимит: 2/5
//! Очки: +3
//! ```
//!
//! plus level-up announcements and profile dumps. Profile dumps are
//! non-reward: the reported balance feeds reconciliation logging only.

use crate::activity::{ActivityKind, CardRarity, DetectedActivity, SourceGame};

use super::{Extractor, clean_name, labeled_int, labeled_value};

const DROP_ANCHORS: &[&str] = &["🎴", "Новая карта"];
const BATTLE_ANCHORS: &[&str] = &["⚔", "Битва окончена"];
const BONUS_ANCHORS: &[&str] = &["Ежедневный бонус"];
const LEVEL_ANCHORS: &[&str] = &["Новый уровень"];
const PROFILE_ANCHORS: &[&str] = &["Профиль игрока", "👤 Профиль"];

const ACTOR_LABELS: &[&str] = &["Игрок:"];
const WINNER_LABELS: &[&str] = &["Победитель:"];
const POINTS_LABELS: &[&str] = &["Очки:"];
const BALANCE_LABELS: &[&str] = &["Баланс:"];
const RARITY_LABELS: &[&str] = &["Редкость:"];
const CARD_LABELS: &[&str] = &["Карта:"];
const COLLECTION_LABELS: &[&str] = &["Коллекция:"];
const DESCRIPTION_LABELS: &[&str] = &["Описание:"];
const LIMIT_LABELS: &[&str] = &["Лимит:"];
const LEVEL_LABELS: &[&str] = &["Уровень:"];

/// Extractor for all card-bot message kinds.
#[derive(Debug, Default)]
pub struct CardGameExtractor;

impl CardGameExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_drop(&self, text: &str) -> Vec<DetectedActivity> {
        let Some(actor) = required_actor(text, ACTOR_LABELS) else {
            return Vec::new();
        };
        let Some(points) = labeled_int(text, POINTS_LABELS) else {
            return Vec::new();
        };

        // Unlabelled or unrecognized rarity defaults to common.
        let rarity = labeled_value(text, RARITY_LABELS)
            .and_then(|v| CardRarity::from_announcement(&v))
            .unwrap_or(CardRarity::Common);

        let mut activity = DetectedActivity::new(
            actor,
            ActivityKind::CardDrop { rarity },
            points,
            SourceGame::Cards,
            text,
        );
        for (key, labels) in [
            ("card", CARD_LABELS),
            ("collection", COLLECTION_LABELS),
            ("description", DESCRIPTION_LABELS),
            ("limit", LIMIT_LABELS),
        ] {
            if let Some(v) = labeled_value(text, labels) {
                activity = activity.with_meta(key, v);
            }
        }
        vec![activity]
    }

    fn extract_simple(
        &self,
        text: &str,
        kind: ActivityKind,
        actor_labels: &[&str],
    ) -> Vec<DetectedActivity> {
        let Some(actor) = required_actor(text, actor_labels) else {
            return Vec::new();
        };
        let Some(points) = labeled_int(text, POINTS_LABELS) else {
            return Vec::new();
        };
        vec![DetectedActivity::new(
            actor,
            kind,
            points,
            SourceGame::Cards,
            text,
        )]
    }

    fn extract_profile(&self, text: &str) -> Vec<DetectedActivity> {
        let Some(actor) = required_actor(text, ACTOR_LABELS) else {
            return Vec::new();
        };
        let Some(balance) = labeled_int(text, BALANCE_LABELS) else {
            return Vec::new();
        };
        vec![DetectedActivity::new(
            actor,
            ActivityKind::ProfileSnapshot,
            balance,
            SourceGame::Cards,
            text,
        )]
    }
}

fn required_actor(text: &str, labels: &[&str]) -> Option<String> {
    let name = clean_name(&labeled_value(text, labels)?);
    if name.is_empty() { None } else { Some(name) }
}

fn any_anchor(text: &str, anchors: &[&str]) -> bool {
    anchors.iter().any(|a| text.contains(a))
}

impl Extractor for CardGameExtractor {
    fn game(&self) -> SourceGame {
        SourceGame::Cards
    }

    fn detect(&self, text: &str) -> bool {
        any_anchor(text, DROP_ANCHORS)
            || any_anchor(text, BATTLE_ANCHORS)
            || any_anchor(text, BONUS_ANCHORS)
            || any_anchor(text, LEVEL_ANCHORS)
            || any_anchor(text, PROFILE_ANCHORS)
    }

    fn extract(&self, text: &str, _chat_id: &str) -> Vec<DetectedActivity> {
        // Profile first: its header must not be mistaken for a reward.
        if any_anchor(text, PROFILE_ANCHORS) {
            return self.extract_profile(text);
        }
        if any_anchor(text, DROP_ANCHORS) {
            return self.extract_drop(text);
        }
        if any_anchor(text, BATTLE_ANCHORS) {
            return self.extract_simple(text, ActivityKind::BattleWin, WINNER_LABELS);
        }
        if any_anchor(text, BONUS_ANCHORS) {
            return self.extract_simple(text, ActivityKind::DailyBonus, ACTOR_LABELS);
        }
        if any_anchor(text, LEVEL_ANCHORS) {
            let mut acts = self.extract_simple(text, ActivityKind::LevelUp, ACTOR_LABELS);
            if let (Some(level), Some(act)) = (labeled_int(text, LEVEL_LABELS), acts.first_mut()) {
                act.metadata
                    .insert("level".into(), serde_json::Value::from(level));
            }
            return acts;
        }
        Vec::new()
    }
}
