//! # Dispatcher Tests
//!
//! End-to-end conversation scenarios driven through the turn dispatcher with
//! a recording attachment resolver in place of the real one.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use echo_dialog::attachment::{
    AttachmentDescriptor, AttachmentKind, AttachmentResolver, ContentRef,
};
use echo_dialog::dialog_config::PromptConfig;
use echo_dialog::dialog_errors::DialogError;
use echo_dialog::dialogue::{DialogState, Session};
use echo_dialog::dispatcher::TurnDispatcher;
use echo_dialog::localization::LocalizationManager;
use echo_dialog::recognizer::RelaxedKeyMatcher;

const MENU: &str = "What sample option would you like to see?\n\
                    1: (1) Show inline attachment\n\
                    2: (2) Show uploaded attachment\n\
                    3: (3) Show Internet attachment";
const INVALID_OPTION: &str = "Ooops, what you wrote is not a valid option, please try again";
const RESET_QUESTION: &str = "Are you sure you want to reset the count?";

/// Resolver that records requested kinds and fails for selected ones
#[derive(Default)]
struct RecordingResolver {
    calls: Mutex<Vec<AttachmentKind>>,
    failing: Vec<AttachmentKind>,
}

impl RecordingResolver {
    fn failing(kinds: &[AttachmentKind]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: kinds.to_vec(),
        }
    }

    fn calls(&self) -> Vec<AttachmentKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttachmentResolver for RecordingResolver {
    async fn resolve(&self, kind: AttachmentKind) -> Result<AttachmentDescriptor, DialogError> {
        self.calls.lock().unwrap().push(kind);
        if self.failing.contains(&kind) {
            return Err(DialogError::ResolutionFailed {
                kind,
                reason: "resource missing".to_string(),
            });
        }
        Ok(AttachmentDescriptor {
            name: format!("{kind}.png"),
            content_type: "image/png".to_string(),
            content: ContentRef::External {
                url: format!("https://example.com/{kind}.png"),
            },
        })
    }
}

fn dispatcher(resolver: Arc<RecordingResolver>, prompts: PromptConfig) -> TurnDispatcher {
    let messages = Arc::new(LocalizationManager::new().expect("Failed to create localization manager"));
    TurnDispatcher::new(messages, resolver, prompts)
}

fn default_dispatcher() -> (TurnDispatcher, Arc<RecordingResolver>) {
    let resolver = Arc::new(RecordingResolver::default());
    (dispatcher(resolver.clone(), PromptConfig::default()), resolver)
}

#[tokio::test]
async fn test_echo_counts_up() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();

    let turn = dispatcher.handle_turn(&mut session, "hello").await?;
    assert_eq!(turn.texts(), ["1: owend said hello"]);
    assert_eq!(session.count(), 2);

    let turn = dispatcher.handle_turn(&mut session, "hello").await?;
    assert_eq!(turn.texts(), ["2: owend said hello"]);
    assert_eq!(session.count(), 3);
    assert!(session.is_idle());

    Ok(())
}

#[tokio::test]
async fn test_commands_are_case_sensitive() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();

    let turn = dispatcher.handle_turn(&mut session, "Reset").await?;
    assert_eq!(turn.texts(), ["1: owend said Reset"]);
    let turn = dispatcher.handle_turn(&mut session, "attachment ").await?;
    assert_eq!(turn.texts(), ["2: owend said attachment "]);
    assert!(session.is_idle());

    Ok(())
}

#[tokio::test]
async fn test_reset_declined_keeps_count() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "hello").await?;

    let turn = dispatcher.handle_turn(&mut session, "reset").await?;
    assert_eq!(turn.texts(), [RESET_QUESTION]);
    assert_eq!(session.state(), DialogState::AwaitingConfirm);

    let turn = dispatcher.handle_turn(&mut session, "no").await?;
    assert_eq!(turn.texts(), ["Did not reset count."]);
    assert_eq!(session.count(), 2);
    assert!(session.is_idle());
    assert_eq!(session.depth(), 1);

    Ok(())
}

#[tokio::test]
async fn test_reset_accepted_restarts_count() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "a").await?;
    dispatcher.handle_turn(&mut session, "b").await?;

    dispatcher.handle_turn(&mut session, "reset").await?;
    let turn = dispatcher.handle_turn(&mut session, "yes").await?;
    assert_eq!(turn.texts(), ["Reset count."]);
    assert_eq!(session.count(), 1);

    let turn = dispatcher.handle_turn(&mut session, "hello").await?;
    assert_eq!(turn.texts(), ["1: owend said hello"]);

    Ok(())
}

#[tokio::test]
async fn test_confirm_reasks_same_question() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "hello").await?;
    dispatcher.handle_turn(&mut session, "reset").await?;

    for _ in 0..10 {
        let turn = dispatcher.handle_turn(&mut session, "perhaps").await?;
        assert_eq!(turn.texts(), ["Didn't get that!", RESET_QUESTION]);
        assert!(matches!(
            turn.handled_error,
            Some(DialogError::ValidationFailed { .. })
        ));
        assert_eq!(session.state(), DialogState::AwaitingConfirm);
        assert_eq!(session.count(), 2);
    }

    let turn = dispatcher.handle_turn(&mut session, "y").await?;
    assert_eq!(turn.texts(), ["Reset count."]);
    assert_eq!(session.count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_count_reset_iff_final_answer_affirmative() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let sequences: Vec<(Vec<&str>, bool)> = vec![
        (vec!["yes"], true),
        (vec!["no"], false),
        (vec!["huh", "?", "yes"], true),
        (vec!["later", "nope"], false),
        (vec!["", "OK"], true),
    ];

    for (answers, affirmative) in sequences {
        let mut session = Session::new();
        for _ in 0..4 {
            dispatcher.handle_turn(&mut session, "ping").await?;
        }
        dispatcher.handle_turn(&mut session, "reset").await?;
        for answer in &answers {
            dispatcher.handle_turn(&mut session, answer).await?;
        }

        assert!(session.is_idle(), "{answers:?}");
        let expected = if affirmative { 1 } else { 5 };
        assert_eq!(session.count(), expected, "{answers:?}");
    }

    Ok(())
}

#[tokio::test]
async fn test_bounded_confirm_exhausts() -> Result<()> {
    let resolver = Arc::new(RecordingResolver::default());
    let dispatcher = dispatcher(
        resolver,
        PromptConfig {
            confirm_max_retries: Some(2),
            ..Default::default()
        },
    );
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "hello").await?;
    dispatcher.handle_turn(&mut session, "reset").await?;

    dispatcher.handle_turn(&mut session, "what").await?;
    let turn = dispatcher.handle_turn(&mut session, "what").await?;
    assert_eq!(
        turn.texts(),
        ["Too many invalid answers. Let's go back to chatting."]
    );
    assert_eq!(
        turn.handled_error,
        Some(DialogError::PromptExhausted { attempts: 2 })
    );
    assert!(session.is_idle());
    assert_eq!(session.count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_attachment_command_shows_menu() -> Result<()> {
    let (dispatcher, resolver) = default_dispatcher();
    let mut session = Session::new();

    let turn = dispatcher.handle_turn(&mut session, "attachment").await?;
    assert_eq!(
        turn.texts(),
        ["Welcome, here you can see attachment alternatives:", MENU]
    );
    assert_eq!(session.state(), DialogState::AwaitingChoice);
    assert_eq!(session.depth(), 2);
    assert!(resolver.calls().is_empty());
    assert_eq!(session.count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_selecting_uploaded_sends_attachment_and_menu() -> Result<()> {
    let (dispatcher, resolver) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "attachment").await?;

    let turn = dispatcher.handle_turn(&mut session, "2").await?;
    assert_eq!(resolver.calls(), [AttachmentKind::Uploaded]);
    assert_eq!(turn.replies.len(), 3);
    assert_eq!(turn.texts(), ["message said 2", MENU]);
    let attachments = turn.attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].name, "uploaded.png");
    assert!(turn.handled_error.is_none());

    assert_eq!(session.state(), DialogState::AwaitingChoice);
    assert_eq!(session.depth(), 2);

    Ok(())
}

#[tokio::test]
async fn test_menu_persists_across_selections() -> Result<()> {
    let (dispatcher, resolver) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "attachment").await?;

    for _ in 0..4 {
        let turn = dispatcher.handle_turn(&mut session, "1").await?;
        assert_eq!(turn.texts().last(), Some(&MENU));
        assert_eq!(session.depth(), 2);
    }
    assert_eq!(resolver.calls(), [AttachmentKind::Inline; 4]);

    Ok(())
}

#[tokio::test]
async fn test_invalid_keys_exhaust_menu() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "hello").await?;
    dispatcher.handle_turn(&mut session, "attachment").await?;

    for _ in 0..2 {
        let turn = dispatcher.handle_turn(&mut session, "4").await?;
        assert_eq!(turn.texts(), [INVALID_OPTION, MENU]);
        assert_eq!(session.count(), 2);
        assert_eq!(session.state(), DialogState::AwaitingChoice);
    }

    let turn = dispatcher.handle_turn(&mut session, "4").await?;
    assert_eq!(
        turn.handled_error,
        Some(DialogError::PromptExhausted { attempts: 3 })
    );
    assert!(!turn.texts().contains(&MENU));
    assert!(session.is_idle());
    assert_eq!(session.depth(), 1);
    assert_eq!(session.count(), 2);

    let turn = dispatcher.handle_turn(&mut session, "hello").await?;
    assert_eq!(turn.texts(), ["2: owend said hello"]);

    Ok(())
}

#[tokio::test]
async fn test_valid_pick_restores_retry_budget() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "attachment").await?;

    for input in ["x", "y", "3", "x", "y"] {
        dispatcher.handle_turn(&mut session, input).await?;
        assert_eq!(session.state(), DialogState::AwaitingChoice, "{input}");
    }

    Ok(())
}

#[tokio::test]
async fn test_commands_ignored_outside_idle() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();

    dispatcher.handle_turn(&mut session, "attachment").await?;
    let turn = dispatcher.handle_turn(&mut session, "reset").await?;
    assert_eq!(turn.texts(), [INVALID_OPTION, MENU]);
    assert_eq!(session.state(), DialogState::AwaitingChoice);

    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "reset").await?;
    let turn = dispatcher.handle_turn(&mut session, "attachment").await?;
    assert_eq!(turn.texts(), ["Didn't get that!", RESET_QUESTION]);
    assert_eq!(session.state(), DialogState::AwaitingConfirm);

    Ok(())
}

#[tokio::test]
async fn test_resolution_failure_is_reported() -> Result<()> {
    let resolver = Arc::new(RecordingResolver::failing(&[AttachmentKind::Uploaded]));
    let dispatcher = dispatcher(resolver.clone(), PromptConfig::default());
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "attachment").await?;

    let turn = dispatcher.handle_turn(&mut session, "2").await?;
    assert_eq!(
        turn.texts(),
        [
            "message said 2",
            "Sorry, I could not load the uploaded attachment."
        ]
    );
    assert!(!turn.texts().contains(&MENU));
    assert!(turn.attachments().is_empty());
    assert!(matches!(
        turn.handled_error,
        Some(DialogError::ResolutionFailed {
            kind: AttachmentKind::Uploaded,
            ..
        })
    ));
    assert!(session.is_idle());
    assert_eq!(session.depth(), 1);
    assert_eq!(session.count(), 1);

    // Back to chatting: the next message is echoed, not matched against the menu
    let turn = dispatcher.handle_turn(&mut session, "hello").await?;
    assert_eq!(turn.texts(), ["1: owend said hello"]);
    assert_eq!(session.count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_relaxed_key_matcher() -> Result<()> {
    let resolver = Arc::new(RecordingResolver::default());
    let dispatcher = dispatcher(resolver.clone(), PromptConfig::default())
        .with_key_matcher(RelaxedKeyMatcher);
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "attachment").await?;

    dispatcher.handle_turn(&mut session, " 3 ").await?;
    assert_eq!(resolver.calls(), [AttachmentKind::Internet]);

    Ok(())
}

#[tokio::test]
async fn test_french_conversation() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    session.language_code = Some("fr-FR".to_string());

    let turn = dispatcher.handle_turn(&mut session, "salut").await?;
    assert_eq!(turn.texts(), ["1 : owend a dit salut"]);

    Ok(())
}

#[tokio::test]
async fn test_close_discards_session() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "attachment").await?;

    let goodbye = dispatcher.close(session);
    assert_eq!(
        goodbye.text.as_deref(),
        Some("Conversation closed. Send any message to start over.")
    );

    Ok(())
}

#[tokio::test]
async fn test_corrupt_stack_underflows() -> Result<()> {
    let (dispatcher, _) = default_dispatcher();
    let mut session = Session::new();
    dispatcher.handle_turn(&mut session, "attachment").await?;

    // Drop the idle frame from the stored shape, leaving only the menu
    let mut stored = serde_json::to_value(&session)?;
    stored["stack"].as_array_mut().unwrap().remove(0);
    let mut corrupt: Session = serde_json::from_value(stored)?;

    let result = dispatcher.handle_turn(&mut corrupt, "1").await;
    assert_eq!(result, Err(DialogError::StackUnderflow));

    Ok(())
}
