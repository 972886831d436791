//! Conversation session: the frame stack and the echo counter.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::dialog_errors::DialogError;
use crate::prompt::{ChoicePrompt, ConfirmPrompt};

/// One pending continuation: what to do with the next inbound message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    #[default]
    AwaitFreeText,
    AwaitConfirm(ConfirmPrompt),
    AwaitChoice(ChoicePrompt),
}

/// Coarse conversation state derived from the top frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogState {
    Idle,
    AwaitingConfirm,
    AwaitingChoice,
}

impl Frame {
    pub fn state(&self) -> DialogState {
        match self {
            Frame::AwaitFreeText => DialogState::Idle,
            Frame::AwaitConfirm(_) => DialogState::AwaitingConfirm,
            Frame::AwaitChoice(_) => DialogState::AwaitingChoice,
        }
    }
}

/// Per-conversation state persisted between turns
///
/// The stack's last element is the top. The bottom frame is always
/// `AwaitFreeText`, so the stack is never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    count: u32,
    stack: Vec<Frame>,
    /// Language of the conversation, taken from the first message
    pub language_code: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            count: 1,
            stack: vec![Frame::AwaitFreeText],
            language_code: None,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Return the current count and advance it
    pub(crate) fn next_count(&mut self) -> u32 {
        let current = self.count;
        self.count = self.count.saturating_add(1);
        current
    }

    /// Only a confirmed reset may call this
    pub(crate) fn reset_count(&mut self) {
        self.count = 1;
    }

    pub fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    /// Remove the top frame; the last frame can never be removed
    pub fn pop(&mut self) -> Result<Frame, DialogError> {
        if self.stack.len() <= 1 {
            return Err(DialogError::StackUnderflow);
        }
        self.stack.pop().ok_or(DialogError::StackUnderflow)
    }

    /// Pop the top frame and push its successor
    pub fn replace(&mut self, frame: Frame) -> Result<Frame, DialogError> {
        let previous = self.pop()?;
        self.push(frame);
        Ok(previous)
    }

    pub fn top(&self) -> &Frame {
        self.stack.last().unwrap_or(&Frame::AwaitFreeText)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn state(&self) -> DialogState {
        self.top().state()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == DialogState::Idle
    }
}

/// Type alias for the per-chat dialogue holding a [`Session`]
pub type EchoDialogue = Dialogue<Session, InMemStorage<Session>>;
