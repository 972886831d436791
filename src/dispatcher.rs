//! # Turn Dispatcher Module
//!
//! Single entry point per inbound message. The dispatcher looks at the top
//! frame of the [`Session`], intercepts reserved commands while idle, and
//! otherwise resumes the suspended prompt with the raw text.
//!
//! ## State machine
//!
//! - **Idle** (`AwaitFreeText`): echoes text, or starts a prompt on
//!   `attachment` / `reset`
//! - **AwaitingConfirm**: resolves the reset question, then back to Idle
//! - **AwaitingChoice**: shows the picked attachment and re-displays the menu;
//!   an exhausted menu or a failed attachment returns to Idle
//!
//! A suspended frame is resumed from a copy of the top of the stack and then
//! either replaced by its successor or popped back to the idle floor.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attachment::{AttachmentDescriptor, AttachmentKind, AttachmentResolver};
use crate::dialog_config::PromptConfig;
use crate::dialog_errors::DialogError;
use crate::dialogue::{Frame, Session};
use crate::localization::LocalizationManager;
use crate::prompt::{Choice, ChoiceAction, ChoicePrompt, ConfirmAction, ConfirmPrompt};
use crate::recognizer::{ConfirmRecognizer, ExactKeyMatcher, KeyMatcher, YesNoRecognizer};

pub const ATTACHMENT_COMMAND: &str = "attachment";
pub const RESET_COMMAND: &str = "reset";

/// Commands recognized only while the session is idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedCommand {
    Attachment,
    Reset,
}

impl ReservedCommand {
    /// Exact, case-sensitive match
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            ATTACHMENT_COMMAND => Some(ReservedCommand::Attachment),
            RESET_COMMAND => Some(ReservedCommand::Reset),
            _ => None,
        }
    }
}

/// One outbound message, optionally carrying an attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: Option<String>,
    pub attachment: Option<AttachmentDescriptor>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attachment: None,
        }
    }

    pub fn attachment(attachment: AttachmentDescriptor) -> Self {
        Self {
            text: None,
            attachment: Some(attachment),
        }
    }
}

/// Everything a turn produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutput {
    pub replies: Vec<OutboundMessage>,
    /// Recoverable error handled during the turn, if any
    pub handled_error: Option<DialogError>,
}

impl TurnOutput {
    fn say(&mut self, text: impl Into<String>) {
        self.replies.push(OutboundMessage::text(text));
    }

    /// Text of every reply, attachments skipped
    pub fn texts(&self) -> Vec<&str> {
        self.replies
            .iter()
            .filter_map(|reply| reply.text.as_deref())
            .collect()
    }

    pub fn attachments(&self) -> Vec<&AttachmentDescriptor> {
        self.replies
            .iter()
            .filter_map(|reply| reply.attachment.as_ref())
            .collect()
    }
}

/// Drives one conversation turn at a time
pub struct TurnDispatcher {
    messages: Arc<LocalizationManager>,
    resolver: Arc<dyn AttachmentResolver>,
    recognizer: Box<dyn ConfirmRecognizer>,
    matcher: Box<dyn KeyMatcher>,
    prompts: PromptConfig,
}

impl TurnDispatcher {
    pub fn new(
        messages: Arc<LocalizationManager>,
        resolver: Arc<dyn AttachmentResolver>,
        prompts: PromptConfig,
    ) -> Self {
        Self {
            messages,
            resolver,
            recognizer: Box::new(YesNoRecognizer),
            matcher: Box::new(ExactKeyMatcher),
            prompts,
        }
    }

    pub fn with_recognizer(mut self, recognizer: impl ConfirmRecognizer + 'static) -> Self {
        self.recognizer = Box::new(recognizer);
        self
    }

    pub fn with_key_matcher(mut self, matcher: impl KeyMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Process one inbound message against the session
    ///
    /// Only `StackUnderflow` is returned as an error; recoverable errors are
    /// answered in the replies and reported in `handled_error`.
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<TurnOutput, DialogError> {
        let mut turn = TurnOutput::default();
        let language = session.language_code.clone();
        let language = language.as_deref();

        debug!(state = ?session.state(), depth = session.depth(), "Dispatching turn");

        let frame = session.top().clone();
        match frame {
            Frame::AwaitFreeText => self.handle_idle(session, text, language, &mut turn),
            Frame::AwaitConfirm(prompt) => {
                self.resume_confirm(session, prompt, text, &mut turn)?;
            }
            Frame::AwaitChoice(prompt) => {
                self.resume_choice(session, prompt, text, language, &mut turn)
                    .await?;
            }
        }

        if let Some(error) = &turn.handled_error {
            debug!(error = %error, "Recovered within turn");
        }
        Ok(turn)
    }

    /// Cancellation hook: discard the session and say goodbye
    pub fn close(&self, session: Session) -> OutboundMessage {
        info!(
            count = session.count(),
            depth = session.depth(),
            "Closing conversation"
        );
        self.notice("session-closed", session.language_code.as_deref())
    }

    /// Plain localized notice
    pub fn notice(&self, key: &str, language_code: Option<&str>) -> OutboundMessage {
        OutboundMessage::text(self.messages.text(key, language_code))
    }

    fn handle_idle(
        &self,
        session: &mut Session,
        text: &str,
        language: Option<&str>,
        turn: &mut TurnOutput,
    ) {
        match ReservedCommand::parse(text) {
            Some(ReservedCommand::Attachment) => {
                turn.say(self.messages.text("attachment-welcome", language));
                let menu = self.attachment_menu(language);
                turn.say(menu.render());
                session.push(Frame::AwaitChoice(menu));
            }
            Some(ReservedCommand::Reset) => {
                let prompt = self.reset_prompt(language);
                turn.say(prompt.render());
                session.push(Frame::AwaitConfirm(prompt));
            }
            None => {
                let count = session.next_count().to_string();
                turn.say(self.messages.text_args(
                    "echo-reply",
                    &[("count", count.as_str()), ("text", text)],
                    language,
                ));
            }
        }
    }

    fn resume_confirm(
        &self,
        session: &mut Session,
        mut prompt: ConfirmPrompt,
        text: &str,
        turn: &mut TurnOutput,
    ) -> Result<(), DialogError> {
        match prompt.resume(text, self.recognizer.as_ref()) {
            Ok(true) => {
                match prompt.action {
                    ConfirmAction::ResetCount => session.reset_count(),
                }
                info!("Count reset confirmed");
                turn.say(prompt.accepted_message);
                session.pop()?;
            }
            Ok(false) => {
                turn.say(prompt.declined_message);
                session.pop()?;
            }
            Err(error @ DialogError::ValidationFailed { .. }) => {
                turn.say(prompt.invalid_message.clone());
                turn.say(prompt.render());
                session.replace(Frame::AwaitConfirm(prompt))?;
                turn.handled_error = Some(error);
            }
            Err(error @ DialogError::PromptExhausted { .. }) => {
                warn!(error = %error, "Confirm prompt gave up");
                turn.say(
                    self.messages
                        .text("prompt-exhausted", session.language_code.as_deref()),
                );
                session.pop()?;
                turn.handled_error = Some(error);
            }
            Err(error) => return Err(error),
        }
        Ok(())
    }

    async fn resume_choice(
        &self,
        session: &mut Session,
        mut prompt: ChoicePrompt,
        text: &str,
        language: Option<&str>,
        turn: &mut TurnOutput,
    ) -> Result<(), DialogError> {
        match prompt.resume(text, self.matcher.as_ref()) {
            Ok(choice) => {
                turn.say(self.messages.text_args(
                    "attachment-selected",
                    &[("key", choice.key.as_str())],
                    language,
                ));
                let shown = match choice.action {
                    ChoiceAction::ShowAttachment(kind) => {
                        self.show_attachment(kind, language, turn).await
                    }
                };

                if shown {
                    let menu = prompt.restarted();
                    turn.say(menu.render());
                    session.replace(Frame::AwaitChoice(menu))?;
                } else {
                    session.pop()?;
                }
            }
            Err(error @ DialogError::ValidationFailed { .. }) => {
                turn.say(prompt.invalid_message.clone());
                turn.say(prompt.render());
                session.replace(Frame::AwaitChoice(prompt))?;
                turn.handled_error = Some(error);
            }
            Err(error @ DialogError::PromptExhausted { .. }) => {
                warn!(error = %error, "Choice prompt gave up");
                turn.say(self.messages.text("prompt-exhausted", language));
                session.pop()?;
                turn.handled_error = Some(error);
            }
            Err(error) => return Err(error),
        }
        Ok(())
    }

    /// Resolve and queue an attachment; a failure is reported and returns `false`
    async fn show_attachment(
        &self,
        kind: AttachmentKind,
        language: Option<&str>,
        turn: &mut TurnOutput,
    ) -> bool {
        match self.resolver.resolve(kind).await {
            Ok(attachment) => {
                debug!(kind = %kind, name = %attachment.name, "Attachment resolved");
                turn.replies.push(OutboundMessage::attachment(attachment));
                true
            }
            Err(error) => {
                warn!(kind = %kind, error = %error, "Attachment resolution failed");
                let kind_name = kind.to_string();
                turn.say(self.messages.text_args(
                    "attachment-failed",
                    &[("kind", kind_name.as_str())],
                    language,
                ));
                turn.handled_error = Some(error);
                false
            }
        }
    }

    fn attachment_menu(&self, language: Option<&str>) -> ChoicePrompt {
        let options = [
            ("1", "attachment-option-inline", AttachmentKind::Inline),
            ("2", "attachment-option-uploaded", AttachmentKind::Uploaded),
            ("3", "attachment-option-internet", AttachmentKind::Internet),
        ]
        .into_iter()
        .map(|(key, label, kind)| {
            Choice::new(
                key,
                self.messages.text(label, language),
                ChoiceAction::ShowAttachment(kind),
            )
        })
        .collect();

        ChoicePrompt::new(
            self.messages.text("attachment-menu-question", language),
            self.messages.text("attachment-menu-invalid", language),
            options,
            self.prompts.choice_max_retries,
        )
    }

    fn reset_prompt(&self, language: Option<&str>) -> ConfirmPrompt {
        ConfirmPrompt::new(
            self.messages.text("reset-question", language),
            self.messages.text("reset-invalid", language),
            self.messages.text("reset-accepted", language),
            self.messages.text("reset-declined", language),
            ConfirmAction::ResetCount,
        )
        .with_max_retries(self.prompts.confirm_max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_commands_are_exact() {
        assert_eq!(ReservedCommand::parse("attachment"), Some(ReservedCommand::Attachment));
        assert_eq!(ReservedCommand::parse("reset"), Some(ReservedCommand::Reset));
        assert_eq!(ReservedCommand::parse("Reset"), None);
        assert_eq!(ReservedCommand::parse(" attachment"), None);
        assert_eq!(ReservedCommand::parse("hello"), None);
    }
}
