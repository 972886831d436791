//! Prompt types: single-question units that validate a reply and retry.
//!
//! Prompts are plain data so they can sit inside a suspended [`Frame`]
//! between turns. All user-facing text is rendered before the prompt is
//! built; resuming a prompt never needs the localization layer.
//!
//! [`Frame`]: crate::dialogue::Frame

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::attachment::AttachmentKind;
use crate::dialog_errors::DialogError;
use crate::recognizer::{ConfirmRecognizer, KeyMatcher};

/// What happens when a confirm prompt is accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmAction {
    ResetCount,
}

/// What happens when a choice is selected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceAction {
    ShowAttachment(AttachmentKind),
}

/// One selectable option
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    pub label: String,
    pub action: ChoiceAction,
}

impl Choice {
    pub fn new(key: impl Into<String>, label: impl Into<String>, action: ChoiceAction) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            action,
        }
    }
}

/// Yes/no question with accept and decline responses
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPrompt {
    pub question: String,
    pub invalid_message: String,
    pub accepted_message: String,
    pub declined_message: String,
    pub action: ConfirmAction,
    /// `None` re-asks until a valid answer arrives
    pub max_retries: Option<u32>,
    attempts: u32,
}

impl ConfirmPrompt {
    pub fn new(
        question: impl Into<String>,
        invalid_message: impl Into<String>,
        accepted_message: impl Into<String>,
        declined_message: impl Into<String>,
        action: ConfirmAction,
    ) -> Self {
        Self {
            question: question.into(),
            invalid_message: invalid_message.into(),
            accepted_message: accepted_message.into(),
            declined_message: declined_message.into(),
            action,
            max_retries: None,
            attempts: 0,
        }
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Invalid answers received so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn render(&self) -> String {
        self.question.clone()
    }

    /// Interpret a reply. `ValidationFailed` means ask again,
    /// `PromptExhausted` means give up.
    pub fn resume(
        &mut self,
        input: &str,
        recognizer: &dyn ConfirmRecognizer,
    ) -> Result<bool, DialogError> {
        if let Some(answer) = recognizer.recognize(input) {
            return Ok(answer);
        }

        self.attempts += 1;
        match self.max_retries {
            Some(max) if self.attempts >= max => Err(DialogError::PromptExhausted {
                attempts: self.attempts,
            }),
            _ => Err(DialogError::ValidationFailed {
                input: input.to_string(),
            }),
        }
    }
}

/// Closed-set question answered by an option key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePrompt {
    pub question: String,
    pub invalid_message: String,
    pub max_retries: u32,
    options: Vec<Choice>,
    attempts: u32,
}

impl ChoicePrompt {
    /// Build a choice prompt. Options keep their order; a repeated key keeps
    /// its first occurrence.
    pub fn new(
        question: impl Into<String>,
        invalid_message: impl Into<String>,
        options: Vec<Choice>,
        max_retries: u32,
    ) -> Self {
        let mut seen = HashSet::new();
        let options = options
            .into_iter()
            .filter(|option| {
                let fresh = seen.insert(option.key.clone());
                if !fresh {
                    warn!(key = %option.key, "Dropping duplicate choice key");
                }
                fresh
            })
            .collect();

        Self {
            question: question.into(),
            invalid_message: invalid_message.into(),
            max_retries,
            options,
            attempts: 0,
        }
    }

    pub fn options(&self) -> &[Choice] {
        &self.options
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|option| option.key.as_str())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Invalid answers still tolerated before the prompt gives up
    pub fn remaining(&self) -> u32 {
        self.max_retries.saturating_sub(self.attempts)
    }

    /// Same prompt with a fresh retry budget
    pub fn restarted(&self) -> Self {
        Self {
            attempts: 0,
            ..self.clone()
        }
    }

    /// Question followed by one `key: label` line per option
    pub fn render(&self) -> String {
        let mut text = self.question.clone();
        for option in &self.options {
            text.push('\n');
            text.push_str(&format!("{}: {}", option.key, option.label));
        }
        text
    }

    pub fn resume(&mut self, input: &str, matcher: &dyn KeyMatcher) -> Result<Choice, DialogError> {
        if let Some(option) = self
            .options
            .iter()
            .find(|option| matcher.matches(input, &option.key))
        {
            return Ok(option.clone());
        }

        self.attempts += 1;
        if self.attempts >= self.max_retries {
            Err(DialogError::PromptExhausted {
                attempts: self.attempts,
            })
        } else {
            Err(DialogError::ValidationFailed {
                input: input.to_string(),
            })
        }
    }
}
