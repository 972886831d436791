//! # Dialog Configuration Module
//!
//! This module defines configuration structures for the dialog engine and the
//! attachment resolver, including prompt retry budgets and resource locations.

use anyhow::{Context, Result};
use std::path::PathBuf;

// Constants for dialog configuration
pub const DEFAULT_CHOICE_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RESOURCE_DIR: &str = "./images";
pub const INLINE_IMAGE_FILE: &str = "small-image.png";
pub const UPLOADED_IMAGE_FILE: &str = "big-image.png";
pub const MAX_INLINE_BYTES: u64 = 256 * 1024; // data URIs stay small
pub const DEFAULT_INTERNET_URL: &str =
    "https://docs.microsoft.com/en-us/bot-framework/media/how-it-works/architecture-resize.png";
pub const DEFAULT_INTERNET_NAME: &str = "BotFrameworkOverview.png";

/// Retry budgets for prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Maximum invalid answers for a confirm prompt (`None` keeps asking forever)
    pub confirm_max_retries: Option<u32>,
    /// Maximum invalid answers for a choice prompt
    pub choice_max_retries: u32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            confirm_max_retries: None,
            choice_max_retries: DEFAULT_CHOICE_MAX_RETRIES,
        }
    }
}

/// Where attachment resources come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentConfig {
    /// Directory holding the local image resources
    pub resource_dir: PathBuf,
    /// File sent inline as a data URI
    pub inline_file: String,
    /// File handed to the upload store
    pub uploaded_file: String,
    /// Size cap for inline payloads in bytes
    pub max_inline_bytes: u64,
    /// External image URL
    pub internet_url: String,
    /// Display name of the external image
    pub internet_name: String,
    /// Issue a HEAD request before handing out the external URL
    pub probe_internet: bool,
    /// Timeout for the HEAD probe in seconds
    pub probe_timeout_secs: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from(DEFAULT_RESOURCE_DIR),
            inline_file: INLINE_IMAGE_FILE.to_string(),
            uploaded_file: UPLOADED_IMAGE_FILE.to_string(),
            max_inline_bytes: MAX_INLINE_BYTES,
            internet_url: DEFAULT_INTERNET_URL.to_string(),
            internet_name: DEFAULT_INTERNET_NAME.to_string(),
            probe_internet: false,
            probe_timeout_secs: 10,
        }
    }
}

/// Top-level configuration for the bot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogConfig {
    pub prompts: PromptConfig,
    pub attachments: AttachmentConfig,
    /// Directory overriding the embedded Fluent resources
    pub locales_dir: Option<PathBuf>,
    /// Chat receiving uploads for the upload store
    pub upload_chat_id: Option<i64>,
}

impl DialogConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("CONFIRM_MAX_RETRIES") {
            config.prompts.confirm_max_retries = parse_retry_ceiling(&value)
                .with_context(|| format!("Invalid CONFIRM_MAX_RETRIES: {value}"))?;
        }
        if let Some(value) = lookup("CHOICE_MAX_RETRIES") {
            config.prompts.choice_max_retries = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid CHOICE_MAX_RETRIES: {value}"))?;
        }
        if let Some(dir) = lookup("BOT_RESOURCE_DIR") {
            config.attachments.resource_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("INTERNET_ATTACHMENT_URL") {
            config.attachments.internet_url = url;
        }
        if let Some(value) = lookup("PROBE_INTERNET_ATTACHMENT") {
            config.attachments.probe_internet = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid PROBE_INTERNET_ATTACHMENT: {value}"))?;
        }
        if let Some(value) = lookup("PROBE_TIMEOUT_SECS") {
            config.attachments.probe_timeout_secs = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid PROBE_TIMEOUT_SECS: {value}"))?;
        }
        if let Some(dir) = lookup("BOT_LOCALES_DIR") {
            config.locales_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup("UPLOAD_CHAT_ID") {
            config.upload_chat_id = Some(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid UPLOAD_CHAT_ID: {value}"))?,
            );
        }

        Ok(config)
    }
}

/// Parse a retry ceiling where `unbounded` (or an empty value) means no cap
fn parse_retry_ceiling(value: &str) -> Result<Option<u32>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("unbounded") {
        return Ok(None);
    }
    Ok(Some(value.parse()?))
}
