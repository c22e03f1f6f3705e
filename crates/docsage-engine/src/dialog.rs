//! Dialog state machine.
//!
//! The session state is an explicit per-user enum transitioned by pure
//! functions of (current state, event) — nothing here touches the store or
//! the network. Session freshness stays an isolated predicate over the two
//! persisted Session Markers so it can be audited and tested on its own.

use docsage_store::records::SessionMarkers;

pub use docsage_store::records::DialogState;

use crate::phrases;

/// A session is fresh when no conversation is open: the user has never
/// greeted, or the last greeting was already closed by feedback. An open
/// conversation (greeting marker with no newer end marker) is not fresh.
pub fn session_is_fresh(markers: &SessionMarkers) -> bool {
    match (markers.greeted_at, markers.ended_at) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(greeted), Some(ended)) => ended >= greeted,
    }
}

/// Tagged action carried in the `id` field of every menu row and button,
/// so structured-reply dispatch never depends on translated prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SelectLanguage(String),
    SelectDocument(String),
    OpenFaq(String),
    ContinueAsking,
    ChangePolicy,
    EndConversation,
    FeedbackYes,
    FeedbackNo,
}

impl Action {
    /// Encode as an opaque menu row id.
    pub fn id(&self) -> String {
        match self {
            Action::SelectLanguage(id) => format!("lang:{id}"),
            Action::SelectDocument(id) => format!("doc:{id}"),
            Action::OpenFaq(id) => format!("faq:{id}"),
            Action::ContinueAsking => "act:continue".into(),
            Action::ChangePolicy => "act:change".into(),
            Action::EndConversation => "act:end".into(),
            Action::FeedbackYes => "act:yes".into(),
            Action::FeedbackNo => "act:no".into(),
        }
    }

    /// Decode a menu row id.
    pub fn from_id(id: &str) -> Option<Action> {
        if let Some(rest) = id.strip_prefix("lang:") {
            return Some(Action::SelectLanguage(rest.to_string()));
        }
        if let Some(rest) = id.strip_prefix("doc:") {
            return Some(Action::SelectDocument(rest.to_string()));
        }
        if let Some(rest) = id.strip_prefix("faq:") {
            return Some(Action::OpenFaq(rest.to_string()));
        }
        match id {
            "act:continue" => Some(Action::ContinueAsking),
            "act:change" => Some(Action::ChangePolicy),
            "act:end" => Some(Action::EndConversation),
            "act:yes" => Some(Action::FeedbackYes),
            "act:no" => Some(Action::FeedbackNo),
            _ => None,
        }
    }

    /// Structural fallback for replies without a recognized id: exact
    /// match against the canonical English menu labels. Checked before
    /// localized reverse lookup so English and localized speakers reach
    /// the same branch.
    pub fn from_canonical_label(label: &str) -> Option<Action> {
        match label {
            phrases::CHANGE_POLICY => Some(Action::ChangePolicy),
            phrases::END_CONVERSATION => Some(Action::EndConversation),
            phrases::CONTINUE_ASKING => Some(Action::ContinueAsking),
            phrases::YES => Some(Action::FeedbackYes),
            phrases::NO => Some(Action::FeedbackNo),
            _ => None,
        }
    }
}

/// A conversation event derived from one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Fresh free text classified as a greeting.
    Greeting(String),
    /// Free text to answer against the active document set.
    Question(String),
    /// A structured-reply action.
    Act(Action),
    /// Anything the engine cannot interpret.
    Unrecognized,
}

/// What the turn driver must do for this event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    ShowLanguageMenu,
    ShowDocumentMenu,
    AnswerQuestion(String),
    SetLanguage(String),
    ActivateDocument(String),
    SendFaqAnswer(String),
    PromptContinue,
    AskHelpfulness,
    RecordFeedback(bool),
    Fallback,
}

/// Result of one transition: the intended next state and the work to do.
/// The driver keeps the previous state when the step's side effect fails
/// its own validation (e.g. selecting a document the user does not own).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: DialogState,
    pub step: Step,
}

/// Pure transition function. `has_languages` selects whether a greeting
/// opens with the language catalog or goes straight to document choice.
pub fn transition(state: DialogState, event: &Event, has_languages: bool) -> Transition {
    match event {
        Event::Greeting(_) => {
            if has_languages {
                Transition { next: DialogState::AwaitingLanguage, step: Step::ShowLanguageMenu }
            } else {
                Transition {
                    next: DialogState::AwaitingDocumentChoice,
                    step: Step::ShowDocumentMenu,
                }
            }
        }
        Event::Question(q) => Transition {
            next: DialogState::AwaitingFollowUp,
            step: Step::AnswerQuestion(q.clone()),
        },
        Event::Act(action) => match action {
            Action::SelectLanguage(id) => Transition {
                next: DialogState::AwaitingDocumentChoice,
                step: Step::SetLanguage(id.clone()),
            },
            Action::SelectDocument(id) => Transition {
                next: DialogState::AnsweringQuestions,
                step: Step::ActivateDocument(id.clone()),
            },
            Action::OpenFaq(id) => Transition {
                next: DialogState::AwaitingFollowUp,
                step: Step::SendFaqAnswer(id.clone()),
            },
            Action::ContinueAsking => Transition {
                next: DialogState::AnsweringQuestions,
                step: Step::PromptContinue,
            },
            Action::ChangePolicy => Transition {
                next: DialogState::AwaitingDocumentChoice,
                step: Step::ShowDocumentMenu,
            },
            Action::EndConversation => Transition {
                next: DialogState::AwaitingFeedback,
                step: Step::AskHelpfulness,
            },
            Action::FeedbackYes => Transition {
                next: DialogState::Idle,
                step: Step::RecordFeedback(true),
            },
            Action::FeedbackNo => Transition {
                next: DialogState::Idle,
                step: Step::RecordFeedback(false),
            },
        },
        Event::Unrecognized => Transition { next: state, step: Step::Fallback },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn markers(
        greeted: Option<chrono::DateTime<Utc>>,
        ended: Option<chrono::DateTime<Utc>>,
    ) -> SessionMarkers {
        SessionMarkers { greeted_at: greeted, ended_at: ended }
    }

    #[test]
    fn test_no_greeting_marker_is_fresh() {
        let now = Utc::now();
        assert!(session_is_fresh(&markers(None, None)));
        assert!(session_is_fresh(&markers(None, Some(now))));
    }

    #[test]
    fn test_open_conversation_is_not_fresh() {
        let now = Utc::now();
        assert!(!session_is_fresh(&markers(Some(now), None)));
        // Re-greeted after the last feedback: the new conversation is open.
        assert!(!session_is_fresh(&markers(
            Some(now),
            Some(now - Duration::seconds(60))
        )));
    }

    #[test]
    fn test_closed_conversation_is_fresh_again() {
        let now = Utc::now();
        // Feedback given after (or at) the last greeting closes the loop.
        assert!(session_is_fresh(&markers(
            Some(now - Duration::seconds(60)),
            Some(now)
        )));
        assert!(session_is_fresh(&markers(Some(now), Some(now))));
    }

    #[test]
    fn test_action_id_roundtrip() {
        let actions = [
            Action::SelectLanguage("l1".into()),
            Action::SelectDocument("d1".into()),
            Action::OpenFaq("f1".into()),
            Action::ContinueAsking,
            Action::ChangePolicy,
            Action::EndConversation,
            Action::FeedbackYes,
            Action::FeedbackNo,
        ];
        for action in actions {
            assert_eq!(Action::from_id(&action.id()), Some(action));
        }
        assert_eq!(Action::from_id("something-else"), None);
    }

    #[test]
    fn test_canonical_label_fallback() {
        assert_eq!(Action::from_canonical_label("Change Policy"), Some(Action::ChangePolicy));
        assert_eq!(Action::from_canonical_label("End Conversation"), Some(Action::EndConversation));
        assert_eq!(Action::from_canonical_label("No"), Some(Action::FeedbackNo));
        assert_eq!(Action::from_canonical_label("changer la police"), None);
    }

    #[test]
    fn test_greeting_routes_to_language_menu() {
        let t = transition(DialogState::Idle, &Event::Greeting("Hi".into()), true);
        assert_eq!(t.next, DialogState::AwaitingLanguage);
        assert_eq!(t.step, Step::ShowLanguageMenu);
    }

    #[test]
    fn test_greeting_skips_languages_when_catalog_empty() {
        let t = transition(DialogState::Idle, &Event::Greeting("Hi".into()), false);
        assert_eq!(t.next, DialogState::AwaitingDocumentChoice);
        assert_eq!(t.step, Step::ShowDocumentMenu);
    }

    #[test]
    fn test_question_leads_to_follow_up() {
        let t = transition(
            DialogState::AnsweringQuestions,
            &Event::Question("What is my deductible?".into()),
            true,
        );
        assert_eq!(t.next, DialogState::AwaitingFollowUp);
        assert_eq!(t.step, Step::AnswerQuestion("What is my deductible?".into()));
    }

    #[test]
    fn test_feedback_closes_the_loop() {
        let t = transition(
            DialogState::AwaitingFeedback,
            &Event::Act(Action::FeedbackNo),
            true,
        );
        assert_eq!(t.next, DialogState::Idle);
        assert_eq!(t.step, Step::RecordFeedback(false));
    }

    #[test]
    fn test_unrecognized_keeps_state() {
        for state in [
            DialogState::Idle,
            DialogState::AwaitingLanguage,
            DialogState::AwaitingFollowUp,
        ] {
            let t = transition(state, &Event::Unrecognized, true);
            assert_eq!(t.next, state);
            assert_eq!(t.step, Step::Fallback);
        }
    }

    #[test]
    fn test_full_happy_path_state_sequence() {
        let mut state = DialogState::Idle;
        let script: Vec<Event> = vec![
            Event::Greeting("Hi".into()),
            Event::Act(Action::SelectLanguage("l1".into())),
            Event::Act(Action::SelectDocument("d1".into())),
            Event::Question("What is covered?".into()),
            Event::Act(Action::ChangePolicy),
            Event::Act(Action::SelectDocument("d2".into())),
            Event::Question("And here?".into()),
            Event::Act(Action::EndConversation),
            Event::Act(Action::FeedbackYes),
        ];
        let expected = [
            DialogState::AwaitingLanguage,
            DialogState::AwaitingDocumentChoice,
            DialogState::AnsweringQuestions,
            DialogState::AwaitingFollowUp,
            DialogState::AwaitingDocumentChoice,
            DialogState::AnsweringQuestions,
            DialogState::AwaitingFollowUp,
            DialogState::AwaitingFeedback,
            DialogState::Idle,
        ];
        for (event, want) in script.iter().zip(expected) {
            state = transition(state, event, true).next;
            assert_eq!(state, want);
        }
    }
}
