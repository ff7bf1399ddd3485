//! Currency conversion — per-game rules turning raw points into unified
//! bank currency.
//!
//! Each multiplication truncates independently (`floor(floor(p * base) *
//! mult)`), never as one combined factor. Administrators tune rates at
//! runtime, so historical reproducibility of that exact ordering matters.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

use crate::activity::{ActivityKind, CardRarity, SourceGame};

/// Conversion rates for one game.
#[derive(Debug, Clone)]
pub struct GameRates {
    /// Base multiplier applied to every reward from this game.
    pub base_rate: Decimal,
    /// Extra multipliers keyed by kind label (e.g. `"battle_win"`).
    pub event_multipliers: HashMap<String, Decimal>,
    /// Extra multipliers for card rarity tiers.
    pub rarity_multipliers: HashMap<CardRarity, Decimal>,
}

impl GameRates {
    /// 1:1 conversion with no multipliers.
    pub fn flat() -> Self {
        Self::with_base(dec!(1.0))
    }

    pub fn with_base(base_rate: Decimal) -> Self {
        Self {
            base_rate,
            event_multipliers: HashMap::new(),
            rarity_multipliers: HashMap::new(),
        }
    }

    pub fn event_multiplier(mut self, kind_label: &str, multiplier: Decimal) -> Self {
        self.event_multipliers
            .insert(kind_label.to_string(), multiplier);
        self
    }

    pub fn rarity_multiplier(mut self, rarity: CardRarity, multiplier: Decimal) -> Self {
        self.rarity_multipliers.insert(rarity, multiplier);
        self
    }
}

/// Process-wide rate table, editable at runtime by the admin interface.
///
/// Games without an entry convert 1:1.
pub struct RateTable {
    rates: RwLock<HashMap<SourceGame, GameRates>>,
}

impl RateTable {
    /// Empty table: every game converts 1:1.
    pub fn empty() -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
        }
    }

    /// The rates the community launched with.
    pub fn with_defaults() -> Self {
        let table = Self::empty();
        table.set(SourceGame::Fishing, GameRates::flat());
        table.set(
            SourceGame::Cards,
            GameRates::with_base(dec!(2.0))
                .rarity_multiplier(CardRarity::Rare, dec!(1.5))
                .rarity_multiplier(CardRarity::Epic, dec!(2.0))
                .rarity_multiplier(CardRarity::Legendary, dec!(3.0)),
        );
        table.set(SourceGame::Crocodile, GameRates::flat());
        table.set(SourceGame::Bunker, GameRates::flat());
        table
    }

    /// Replace a game's rates. Takes effect for the next conversion.
    pub fn set(&self, game: SourceGame, rates: GameRates) {
        self.write_guard().insert(game, rates);
    }

    /// Remove a game's rates, reverting it to 1:1.
    pub fn clear(&self, game: SourceGame) {
        self.write_guard().remove(&game);
    }

    /// Current rates for a game, if configured.
    pub fn get(&self, game: SourceGame) -> Option<GameRates> {
        self.read_guard().get(&game).cloned()
    }

    /// Convert raw in-game points into unified currency.
    ///
    /// Zero stays zero; any positive input converts to at least 1 so no
    /// detected reward silently vanishes.
    pub fn convert(&self, raw_points: i64, game: SourceGame, kind: &ActivityKind) -> i64 {
        if raw_points <= 0 {
            return 0;
        }
        let Some(rates) = self.get(game) else {
            // Unconfigured game: pass through 1:1.
            return raw_points;
        };

        let mut amount = (Decimal::from(raw_points) * rates.base_rate).floor();
        if let Some(multiplier) = rates.event_multipliers.get(kind.label()) {
            amount = (amount * multiplier).floor();
        }
        if let Some(multiplier) = kind
            .rarity()
            .and_then(|r| rates.rarity_multipliers.get(&r))
        {
            amount = (amount * multiplier).floor();
        }

        amount.to_i64().unwrap_or(i64::MAX).max(1)
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SourceGame, GameRates>> {
        match self.rates.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SourceGame, GameRates>> {
        match self.rates.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
