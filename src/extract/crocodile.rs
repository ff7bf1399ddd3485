//! Crocodile (word-guessing) bot extractor — the only stateful one.
//!
//! A round spans multiple messages, relayed by the game bot:
//!
//! ```text
//! 🐊 Крокодил: раунд начался!
//! Участники: @alice, @bob
//! ```
//! then word submissions (`Alice: банан`), correct guesses
//! (`Alice угадала слово!`) and finally `🐊 Раунд окончен! Приз: +10`.
//!
//! Session state is keyed per chat id: the host may interleave messages
//! from different chats, and one chat's round must never leak into
//! another's. Within one chat, delivery is assumed serialized.
//!
//! The round winner is the *last* correct guesser at round end. That is a
//! heuristic carried over from the original bots, not a guaranteed game
//! semantic.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::activity::{ActivityKind, DetectedActivity, SourceGame};

use super::{Extractor, clean_name, labeled_int, labeled_value, mention_names};

const START_ANCHORS: &[&str] = &["раунд начался", "Раунд начался", "round started"];
const END_ANCHORS: &[&str] = &["Раунд окончен", "раунд окончен", "round ended"];
const GUESS_ANCHORS: &[&str] = &["угадал слово", "угадала слово", "guessed the word"];
const PARTICIPANTS_LABELS: &[&str] = &["Участники:", "Participants:"];
const PRIZE_LABELS: &[&str] = &["Приз", "prize"];

/// Points for submitting a word in a round.
const PARTICIPATE_POINTS: i64 = 1;
/// Points for guessing the word.
const CORRECT_GUESS_POINTS: i64 = 5;
/// Win prize when the round-end marker carries no number.
const DEFAULT_PRIZE: i64 = 10;

/// Per-chat round state. Not persisted across restarts.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Everyone seen in this round (listed or submitting).
    pub participants: HashSet<String>,
    /// Latest word per participant.
    pub submitted_words: HashMap<String, SubmittedWord>,
    /// Correct guessers, most recent last.
    pub correct_guessers: Vec<String>,
    /// Set by the round-start marker; `None` means no round in progress.
    pub started_at: Option<DateTime<Utc>>,
}

/// One recorded word submission.
#[derive(Debug, Clone)]
pub struct SubmittedWord {
    pub word: String,
    pub submitted_at: DateTime<Utc>,
}

impl SessionState {
    fn started(now: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(now),
            ..Self::default()
        }
    }

    fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Append a correct guesser, moving repeat guessers to the end so the
    /// vector stays ordered by recency.
    fn record_guess(&mut self, name: &str) {
        if let Some(pos) = self.correct_guessers.iter().position(|n| n == name) {
            self.correct_guessers.remove(pos);
        }
        self.correct_guessers.push(name.to_string());
        self.participants.insert(name.to_string());
    }
}

/// Extractor for the crocodile word-guessing game.
pub struct CrocodileExtractor {
    sessions: Mutex<HashMap<String, SessionState>>,
    word_line: Regex,
    guess_line: Regex,
}

impl CrocodileExtractor {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            // "Alice: банан" — single-token name, then the submitted word.
            word_line: Regex::new(r"^\s*@?([\w.]+):\s+(\S.*)$").expect("static regex"),
            // "🎉 Alice угадала слово!" / "Alice guessed the word!"
            guess_line: Regex::new(
                r"^[^\w@]*(@?[\w.]+)\s+(?:угадала?\s+слово|guessed\s+the\s+word)",
            )
            .expect("static regex"),
        }
    }

    /// Whether a round is in progress for `chat_id`. The router uses this to
    /// keep feeding anchor-less mid-round lines to this extractor.
    pub fn has_active_round(&self, chat_id: &str) -> bool {
        self.lock_sessions()
            .get(chat_id)
            .is_some_and(SessionState::is_active)
    }

    /// Snapshot of a chat's session state, for inspection and tests.
    pub fn session(&self, chat_id: &str) -> Option<SessionState> {
        self.lock_sessions().get(chat_id).cloned()
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionState>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            // State is advisory; a poisoned map is still usable.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for CrocodileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_any(text: &str, anchors: &[&str]) -> bool {
    anchors.iter().any(|a| text.contains(a))
}

impl Extractor for CrocodileExtractor {
    fn game(&self) -> SourceGame {
        SourceGame::Crocodile
    }

    fn detect(&self, text: &str) -> bool {
        text.contains("🐊")
            || contains_any(text, START_ANCHORS)
            || contains_any(text, END_ANCHORS)
            || contains_any(text, GUESS_ANCHORS)
    }

    fn extract(&self, text: &str, chat_id: &str) -> Vec<DetectedActivity> {
        let mut sessions = self.lock_sessions();
        let mut out = Vec::new();

        // Round start always resets, even mid-round (missed end marker).
        if contains_any(text, START_ANCHORS) {
            debug!(chat_id, "crocodile round started");
            sessions.insert(chat_id.to_string(), SessionState::started(Utc::now()));
        }

        for line in text.lines() {
            if contains_any(line, START_ANCHORS) {
                continue;
            }

            if let Some(list) = labeled_value(line, PARTICIPANTS_LABELS) {
                if let Some(session) = sessions.get_mut(chat_id).filter(|s| s.is_active()) {
                    session.participants.extend(mention_names(&list));
                }
                continue;
            }

            if let Some(caps) = self.guess_line.captures(line) {
                let name = clean_name(&caps[1]);
                if name.is_empty() {
                    continue;
                }
                match sessions.get_mut(chat_id).filter(|s| s.is_active()) {
                    Some(session) => {
                        session.record_guess(&name);
                        out.push(DetectedActivity::new(
                            name,
                            ActivityKind::CorrectGuess,
                            CORRECT_GUESS_POINTS,
                            SourceGame::Crocodile,
                            text,
                        ));
                    }
                    None => debug!(chat_id, guesser = %name, "guess outside a round, ignored"),
                }
                continue;
            }

            if contains_any(line, END_ANCHORS) {
                let prize = labeled_int(line, PRIZE_LABELS).unwrap_or(DEFAULT_PRIZE);
                if let Some(session) = sessions.get_mut(chat_id).filter(|s| s.is_active()) {
                    // Winner heuristic: the most recent correct guesser.
                    if let Some(winner) = session.correct_guessers.last().cloned() {
                        out.push(
                            DetectedActivity::new(
                                winner,
                                ActivityKind::CrocodileWin,
                                prize,
                                SourceGame::Crocodile,
                                text,
                            )
                            .with_meta("prize", prize),
                        );
                    }
                }
                // Unconditional reset, win or not. The entry is removed so
                // the map holds only chats with a round in progress.
                sessions.remove(chat_id);
                continue;
            }

            if let Some(caps) = self.word_line.captures(line) {
                let Some(session) = sessions.get_mut(chat_id).filter(|s| s.is_active()) else {
                    continue;
                };
                let name = clean_name(&caps[1]);
                let word = caps[2].trim().to_string();
                if name.is_empty() || word.is_empty() {
                    continue;
                }
                let first_submission = !session.submitted_words.contains_key(&name);
                session.submitted_words.insert(
                    name.clone(),
                    SubmittedWord {
                        word,
                        submitted_at: Utc::now(),
                    },
                );
                session.participants.insert(name.clone());
                // One participate credit per name per round.
                if first_submission {
                    out.push(DetectedActivity::new(
                        name,
                        ActivityKind::Participate,
                        PARTICIPATE_POINTS,
                        SourceGame::Crocodile,
                        text,
                    ));
                }
            }
        }

        out
    }
}
