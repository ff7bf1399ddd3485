//! Game Bank — ingestion/accounting core for game-bot announcements.
//!
//! Turns free-text chat announcements from independent game bots into
//! idempotent ledger transactions: route → extract → resolve → convert → write.

pub mod activity;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod pipeline;
pub mod resolve;
pub mod router;
pub mod store;
