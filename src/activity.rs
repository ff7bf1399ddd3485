//! Core activity types shared by extractors, router, converter, and ledger.

use serde::{Deserialize, Serialize};

/// Actor sentinel emitted when an announcement names nobody recognizable.
/// Activities carrying it are dropped before the ledger writer.
pub const UNKNOWN_ACTOR: &str = "unknown";

/// Maximum characters of raw announcement text kept on an activity.
pub const EXCERPT_MAX_CHARS: usize = 200;

// ── Source game ─────────────────────────────────────────────────────

/// The external game bot whose announcement produced an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceGame {
    /// Fishing simulator bot.
    Fishing,
    /// Card-collection bot (drops, battles, bonuses, levels, profiles).
    Cards,
    /// Word-guessing social game ("crocodile"), session-based.
    Crocodile,
    /// Survival social game, session-based.
    Bunker,
}

impl SourceGame {
    /// Stable label used in transaction rows and rate-table keys.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fishing => "fishing",
            Self::Cards => "cards",
            Self::Crocodile => "crocodile",
            Self::Bunker => "bunker",
        }
    }

    /// Parse a `source_hint` into a known game, if it names one.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "fishing" => Some(Self::Fishing),
            "cards" => Some(Self::Cards),
            "crocodile" => Some(Self::Crocodile),
            "bunker" => Some(Self::Bunker),
            _ => None,
        }
    }
}

// ── Card rarity ─────────────────────────────────────────────────────

/// Rarity tier of a dropped card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl CardRarity {
    /// Stable label used in rate-table keys.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    /// Match the card bot's rarity wording. Prefix match tolerates the
    /// grammatical endings the bot varies ("Эпическая" / "Эпический").
    pub fn from_announcement(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.starts_with("Легендарн") {
            Some(Self::Legendary)
        } else if v.starts_with("Эпическ") {
            Some(Self::Epic)
        } else if v.starts_with("Редк") {
            Some(Self::Rare)
        } else if v.starts_with("Обычн") {
            Some(Self::Common)
        } else {
            None
        }
    }
}

// ── Activity kind ───────────────────────────────────────────────────

/// What the activity rewards. Closed set — the fields that move money
/// (kind and rarity) are typed; free-form details live in activity metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityKind {
    /// Fishing catch reward.
    Fishing,
    /// Card drop; rarity drives the rarity multiplier.
    CardDrop { rarity: CardRarity },
    /// Card-game battle victory.
    BattleWin,
    /// Card-game daily login bonus.
    DailyBonus,
    /// Card-game level-up reward.
    LevelUp,
    /// Winner of a finished bunker game.
    GameWin,
    /// Survived a bunker elimination round.
    SurvivalRound,
    /// Submitted a word in a crocodile round.
    Participate,
    /// Guessed the word in a crocodile round.
    CorrectGuess,
    /// Won a crocodile round (last correct guesser).
    CrocodileWin,
    /// Card-game profile dump. Non-reward: `raw_points` is the balance the
    /// game bot reports, used only for reconciliation logging.
    ProfileSnapshot,
}

impl ActivityKind {
    /// Stable label stored on transaction rows and used as the
    /// event-multiplier key in the rate table.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fishing => "fishing",
            Self::CardDrop {
                rarity: CardRarity::Common,
            } => "card_common",
            Self::CardDrop {
                rarity: CardRarity::Rare,
            } => "card_rare",
            Self::CardDrop {
                rarity: CardRarity::Epic,
            } => "card_epic",
            Self::CardDrop {
                rarity: CardRarity::Legendary,
            } => "card_legendary",
            Self::BattleWin => "battle_win",
            Self::DailyBonus => "daily_bonus",
            Self::LevelUp => "level_up",
            Self::GameWin => "game_win",
            Self::SurvivalRound => "survival_round",
            Self::Participate => "participate",
            Self::CorrectGuess => "correct_guess",
            Self::CrocodileWin => "crocodile_win",
            Self::ProfileSnapshot => "profile_snapshot",
        }
    }

    /// The rarity tier this kind encodes, if any.
    pub fn rarity(&self) -> Option<CardRarity> {
        match self {
            Self::CardDrop { rarity } => Some(*rarity),
            _ => None,
        }
    }

    /// Whether this kind moves money. Profile snapshots never reach the ledger.
    pub fn is_reward(&self) -> bool {
        !matches!(self, Self::ProfileSnapshot)
    }
}

// ── Detected activity ───────────────────────────────────────────────

/// One detected unit of in-game reward extracted from a message.
///
/// Transient: never persisted directly. The ledger writer turns it into a
/// transaction row after resolution and conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedActivity {
    /// Free-text actor identifier as the announcement spelled it.
    pub actor: String,
    /// Typed reward kind.
    pub kind: ActivityKind,
    /// Raw in-game points, always >= 0.
    pub raw_points: i64,
    /// Which bot announced it.
    pub source_game: SourceGame,
    /// Free-form extraction details (fish name, collection, limit, ...).
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Bounded excerpt of the announcement for logs and manual replay.
    pub excerpt: String,
}

impl DetectedActivity {
    /// Build an activity from an announcement. Negative point values are
    /// clamped to zero; the excerpt is bounded to [`EXCERPT_MAX_CHARS`].
    pub fn new(
        actor: impl Into<String>,
        kind: ActivityKind,
        raw_points: i64,
        source_game: SourceGame,
        text: &str,
    ) -> Self {
        Self {
            actor: actor.into(),
            kind,
            raw_points: raw_points.max(0),
            source_game,
            metadata: serde_json::Map::new(),
            excerpt: excerpt(text),
        }
    }

    /// Attach a free-form metadata field.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// True when the actor is the "unknown" sentinel (or blank).
    pub fn is_unknown_actor(&self) -> bool {
        let a = self.actor.trim();
        a.is_empty() || a == UNKNOWN_ACTOR
    }
}

/// Bounded excerpt of raw announcement text.
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ActivityKind::Fishing.label(), "fishing");
        assert_eq!(
            ActivityKind::CardDrop {
                rarity: CardRarity::Epic
            }
            .label(),
            "card_epic"
        );
        assert_eq!(ActivityKind::CrocodileWin.label(), "crocodile_win");
        assert_eq!(ActivityKind::GameWin.label(), "game_win");
    }

    #[test]
    fn rarity_from_announcement_tolerates_endings() {
        assert_eq!(
            CardRarity::from_announcement("Эпическая"),
            Some(CardRarity::Epic)
        );
        assert_eq!(
            CardRarity::from_announcement("Эпический"),
            Some(CardRarity::Epic)
        );
        assert_eq!(
            CardRarity::from_announcement("Легендарная"),
            Some(CardRarity::Legendary)
        );
        assert_eq!(CardRarity::from_announcement("???"), None);
    }

    #[test]
    fn profile_snapshot_is_not_a_reward() {
        assert!(!ActivityKind::ProfileSnapshot.is_reward());
        assert!(ActivityKind::Participate.is_reward());
    }

    #[test]
    fn negative_points_clamped() {
        let a = DetectedActivity::new("alice", ActivityKind::Fishing, -3, SourceGame::Fishing, "x");
        assert_eq!(a.raw_points, 0);
    }

    #[test]
    fn excerpt_is_bounded() {
        let long = "я".repeat(500);
        let a = DetectedActivity::new("a", ActivityKind::Fishing, 1, SourceGame::Fishing, &long);
        assert_eq!(a.excerpt.chars().count(), EXCERPT_MAX_CHARS);
    }

    #[test]
    fn unknown_actor_sentinel() {
        let a = DetectedActivity::new("unknown", ActivityKind::Fishing, 1, SourceGame::Fishing, "");
        assert!(a.is_unknown_actor());
        let b = DetectedActivity::new("  ", ActivityKind::Fishing, 1, SourceGame::Fishing, "");
        assert!(b.is_unknown_actor());
        let c = DetectedActivity::new("alice", ActivityKind::Fishing, 1, SourceGame::Fishing, "");
        assert!(!c.is_unknown_actor());
    }

    #[test]
    fn source_game_from_hint() {
        assert_eq!(SourceGame::from_hint("Crocodile"), Some(SourceGame::Crocodile));
        assert_eq!(SourceGame::from_hint(" fishing "), Some(SourceGame::Fishing));
        assert_eq!(SourceGame::from_hint("chess"), None);
    }

    #[test]
    fn kind_serialization_is_tagged() {
        let json = serde_json::to_value(ActivityKind::CardDrop {
            rarity: CardRarity::Epic,
        })
        .unwrap();
        assert_eq!(json["kind"], "card_drop");
        assert_eq!(json["rarity"], "epic");
    }
}
