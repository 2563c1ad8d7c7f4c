//! Trivia quiz over Telegram, one persisted quiz session per chat.

pub mod config;
pub mod error;
pub mod quiz;
pub mod schedule;
pub mod view;
