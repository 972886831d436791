//! # Dialog Error Types Module
//!
//! This module defines the error taxonomy of the dialog engine. Only
//! `StackUnderflow` is fatal; every other variant is handled by the prompt or
//! dispatcher layer within the same turn.

use thiserror::Error;

use crate::attachment::AttachmentKind;

/// Errors raised while driving a conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogError {
    /// The reply did not match what the active prompt expects
    #[error("Validation failed: {input:?} is not an accepted answer")]
    ValidationFailed { input: String },
    /// The prompt's retry budget ran out
    #[error("Prompt exhausted after {attempts} invalid answers")]
    PromptExhausted { attempts: u32 },
    /// A frame was popped without a replacement
    #[error("Dialog stack underflow: the idle frame cannot be popped")]
    StackUnderflow,
    /// The attachment collaborator could not produce a descriptor
    #[error("Could not resolve {kind} attachment: {reason}")]
    ResolutionFailed { kind: AttachmentKind, reason: String },
}

impl DialogError {
    /// Whether the dispatcher can keep the session alive after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DialogError::StackUnderflow)
    }

    pub(crate) fn resolution(kind: AttachmentKind, reason: impl Into<String>) -> Self {
        DialogError::ResolutionFailed {
            kind,
            reason: reason.into(),
        }
    }
}
