//! # LINE Vocabulary Bot
//!
//! A LINE bot that extracts English vocabulary with Traditional Chinese
//! translations from chat messages, asks the user to confirm, and uploads the
//! confirmed words to a vocabulary app. Images of quiz questions are analyzed
//! and archived to a JSON file.

pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod events;
pub mod line;
pub mod localization;
pub mod server;
pub mod services;
pub mod session;
pub mod text_processing;
