//! # Echo Dialog Telegram Bot
//!
//! A Telegram bot built around a suspend/resume dialog engine: it echoes
//! messages with a running count, confirms before resetting that count, and
//! serves a persistent menu of sample attachments.

#![deny(rustdoc::broken_intra_doc_links)]

pub mod attachment;
pub mod bot;
pub mod dialog_config;
pub mod dialog_errors;
pub mod dialogue;
pub mod dispatcher;
pub mod localization;
pub mod prompt;
pub mod recognizer;
