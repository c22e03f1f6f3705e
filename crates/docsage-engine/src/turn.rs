//! Per-turn conversation driver.
//!
//! One inbound webhook payload in, at most a handful of store writes and
//! outbound sends out. No state lives in the engine between turns; every
//! cross-turn fact is read from and written to the store, which is what
//! lets horizontally-scaled instances share a conversation.

use std::sync::Arc;

use serde_json::Value;

use docsage_channels::parse_webhook;
use docsage_core::config::DocSageConfig;
use docsage_core::error::{DocSageError, Result};
use docsage_core::traits::{CompletionOracle, EmbeddingOracle, OutboundMessenger, PassageIndex};
use docsage_core::types::{ButtonMenu, InboundKind, InboundMessage, ListMenu, MenuRow};
use docsage_store::records::{DialogState, FeedbackReply, PointerStatus, User};
use docsage_store::Store;

use crate::answer::AnswerService;
use crate::dialog::{self, Action, Event, Step, Transition};
use crate::intent::{self, Intent};
use crate::localize::Localizer;
use crate::phrases;

/// Outcome of one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Processed,
    /// Payload outside the recognized shape; ignored silently and reported
    /// as not-found to the caller.
    Ignored,
}

/// WhatsApp caps list row titles at 24 characters.
fn menu_title(s: &str) -> String {
    const MAX: usize = 24;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(MAX - 1).collect();
        out.push('…');
        out
    }
}

pub struct Engine {
    store: Arc<Store>,
    completer: Arc<dyn CompletionOracle>,
    messenger: Arc<dyn OutboundMessenger>,
    answers: AnswerService,
    bot_name: String,
    base_language: String,
}

impl Engine {
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingOracle>,
        completer: Arc<dyn CompletionOracle>,
        index: Arc<dyn PassageIndex>,
        messenger: Arc<dyn OutboundMessenger>,
        config: &DocSageConfig,
    ) -> Self {
        let answers = AnswerService::new(
            store.clone(),
            embedder,
            completer.clone(),
            index,
            config.conversation.base_language.clone(),
            config.index.top_k,
        );
        Self {
            store,
            completer,
            messenger,
            answers,
            bot_name: config.conversation.bot_name.clone(),
            base_language: config.conversation.base_language.clone(),
        }
    }

    /// The document-question API entry point.
    pub fn answers(&self) -> &AnswerService {
        &self.answers
    }

    /// Process one webhook delivery payload.
    pub async fn process_turn(&self, payload: &Value) -> Result<TurnStatus> {
        let Some(msg) = parse_webhook(payload) else {
            tracing::debug!("ignoring unrecognized webhook payload");
            return Ok(TurnStatus::Ignored);
        };
        self.handle_message(&msg).await?;
        Ok(TurnStatus::Processed)
    }

    /// Process one normalized inbound message. Data errors become the
    /// generic localized fallback reply; everything else propagates.
    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<()> {
        match self.run_turn(msg).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_data_error() => {
                tracing::warn!("turn for {} fell back: {e}", msg.wa_id);
                let language_id = self
                    .store
                    .user_by_mobile(&msg.wa_id)
                    .ok()
                    .flatten()
                    .and_then(|u| u.language_id);
                let localizer = Localizer::new(self.store.clone(), language_id);
                self.messenger
                    .send_text(&msg.from, &localizer.text(phrases::FALLBACK))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn run_turn(&self, msg: &InboundMessage) -> Result<()> {
        // No self-registration here: the sender must already exist.
        let user = self
            .store
            .user_by_mobile(&msg.wa_id)?
            .ok_or_else(|| DocSageError::UnknownUser(msg.wa_id.clone()))?;
        let localizer = Localizer::new(self.store.clone(), user.language_id.clone());

        let state = self.store.dialog_state(&user.id)?;
        let markers = self.store.session_markers(&user.id)?;
        let fresh = state == DialogState::Idle || dialog::session_is_fresh(&markers);

        let event = self.derive_event(&msg.kind, fresh, &localizer).await?;
        tracing::debug!("turn for {}: state={:?} fresh={} event={:?}", user.id, state, fresh, event);

        if let Event::Greeting(text) = &event {
            self.store.record_greeting(&user.id, text)?;
        }

        let has_languages = !self.store.enabled_languages()?.is_empty();
        let t = dialog::transition(state, &event, has_languages);
        self.perform(&t, &user, &localizer, msg).await
    }

    /// Derive the conversation event from the message's structural type.
    /// Fresh free text goes through intent classification; mid-conversation
    /// free text is a question. Structured replies dispatch on the tagged
    /// action id, then canonical label, then localized reverse lookup,
    /// then entity-name matching.
    async fn derive_event(
        &self,
        kind: &InboundKind,
        fresh: bool,
        localizer: &Localizer,
    ) -> Result<Event> {
        match kind {
            InboundKind::Text { body } => {
                let text = body.trim();
                if text.eq_ignore_ascii_case("start") || text.eq_ignore_ascii_case("change") {
                    return Ok(Event::Act(Action::ChangePolicy));
                }
                if fresh {
                    Ok(match intent::classify(self.completer.as_ref(), text).await? {
                        Intent::Greeting => Event::Greeting(text.to_string()),
                        Intent::Question => Event::Question(text.to_string()),
                        Intent::Other => Event::Unrecognized,
                    })
                } else {
                    Ok(Event::Question(text.to_string()))
                }
            }
            InboundKind::ListReply { id, title } | InboundKind::ButtonReply { id, title } => {
                Ok(self.resolve_reply(id, title, localizer))
            }
        }
    }

    fn resolve_reply(&self, id: &str, title: &str, localizer: &Localizer) -> Event {
        if let Some(action) = Action::from_id(id) {
            return Event::Act(action);
        }
        if let Some(action) = Action::from_canonical_label(title) {
            return Event::Act(action);
        }
        if let Some(canonical) = localizer.canonical_for(title) {
            if let Some(action) = Action::from_canonical_label(&canonical) {
                return Event::Act(action);
            }
            // A localized document set name resolves to its stored name.
            if let Ok(Some(set)) = self.store.document_set_by_name(&canonical) {
                return Event::Act(Action::SelectDocument(set.id));
            }
        }
        // Legacy menus titled rows by entity name.
        if let Ok(Some(set)) = self.store.document_set_by_name(title) {
            return Event::Act(Action::SelectDocument(set.id));
        }
        if let Ok(Some(lang)) = self.store.language_by_name(title) {
            return Event::Act(Action::SelectLanguage(lang.id));
        }
        Event::Unrecognized
    }

    async fn perform(
        &self,
        t: &Transition,
        user: &User,
        localizer: &Localizer,
        msg: &InboundMessage,
    ) -> Result<()> {
        let to = msg.from.as_str();
        match &t.step {
            Step::ShowLanguageMenu => {
                let languages = self.store.enabled_languages()?;
                let rows = languages
                    .iter()
                    .map(|l| MenuRow::new(Action::SelectLanguage(l.id.clone()).id(), menu_title(&l.name)))
                    .collect();
                let menu = ListMenu {
                    header: localizer.bot_name(phrases::CHOOSE_LANGUAGE_BODY, &self.bot_name),
                    body: localizer.text(phrases::CHOOSE_LANGUAGE_BODY),
                    footer: None,
                    button: localizer
                        .button_label(phrases::CHOOSE_LANGUAGE_BODY, phrases::CHOOSE_LANGUAGE_BUTTON),
                    rows,
                };
                self.messenger.send_list(to, &menu).await?;
                self.store.set_dialog_state(&user.id, t.next)
            }

            Step::ShowDocumentMenu => self.show_document_menu(user, localizer, to, t.next).await,

            Step::SetLanguage(language_id) => {
                let lang = self
                    .store
                    .language(language_id)?
                    .ok_or_else(|| DocSageError::NotFound(format!("language {language_id}")))?;
                self.store.set_user_language(&user.id, &lang.id)?;
                // Re-resolve every label in the newly chosen language.
                let localizer = Localizer::new(self.store.clone(), Some(lang.id));
                self.show_document_menu(user, &localizer, to, t.next).await
            }

            Step::AnswerQuestion(question) => {
                let pointer = self
                    .store
                    .latest_active_pointer(&user.id)?
                    .ok_or_else(|| DocSageError::NoActiveDocument(user.id.clone()))?;
                let language_name = self.language_name(user)?;
                let answer = match self
                    .answers
                    .answer(&pointer.document_set_id, question, &user.id, &language_name)
                    .await
                {
                    Ok(answer) => answer,
                    Err(DocSageError::NotAuthorized(_)) => localizer.text(phrases::NOT_AUTHORIZED),
                    Err(e) => return Err(e),
                };
                self.messenger.send_text(to, &answer).await?;
                self.send_follow_up_menu(localizer, to).await?;
                self.store.set_dialog_state(&user.id, t.next)
            }

            Step::ActivateDocument(set_id) => {
                let set = self
                    .store
                    .document_set(set_id)?
                    .ok_or_else(|| DocSageError::NotFound(format!("document set {set_id}")))?;
                if !self.store.user_owns(&user.id, &set.id)? {
                    let text = localizer.text(phrases::INVALID_DOCUMENT);
                    self.store
                        .upsert_pointer(&user.id, &set.id, PointerStatus::Failure, &text)?;
                    return self.messenger.send_text(to, &text).await;
                }

                // Document set names localize like any other phrase, with
                // the stored name as fallback.
                let prompt = format!(
                    "{} {}",
                    localizer.text(phrases::ASK_QUESTION_PROMPT),
                    localizer.text(&set.name)
                );
                self.store
                    .upsert_pointer(&user.id, &set.id, PointerStatus::Success, &prompt)?;

                let faqs = self.store.active_faqs(&set.id, user.language_id.as_deref())?;
                if faqs.is_empty() {
                    self.messenger.send_text(to, &prompt).await?;
                } else {
                    let mut rows: Vec<MenuRow> = faqs
                        .iter()
                        .map(|f| MenuRow::new(Action::OpenFaq(f.id.clone()).id(), menu_title(&f.question)))
                        .collect();
                    rows.push(MenuRow::new(
                        Action::ContinueAsking.id(),
                        menu_title(&localizer.text(phrases::CONTINUE_ASKING)),
                    ));
                    let menu = ListMenu {
                        header: localizer.bot_name(phrases::ASK_QUESTION_PROMPT, &self.bot_name),
                        body: prompt,
                        footer: None,
                        button: localizer
                            .button_label(phrases::ASK_QUESTION_PROMPT, phrases::FAQ_BUTTON),
                        rows,
                    };
                    self.messenger.send_list(to, &menu).await?;
                }
                self.store.set_dialog_state(&user.id, t.next)
            }

            Step::SendFaqAnswer(faq_id) => {
                let faq = self
                    .store
                    .faq(faq_id)?
                    .ok_or_else(|| DocSageError::NotFound(format!("faq {faq_id}")))?;
                self.store.upsert_pointer(
                    &user.id,
                    &faq.document_set_id,
                    PointerStatus::Success,
                    &faq.question,
                )?;
                self.messenger.send_text(to, &faq.answer).await?;
                self.send_follow_up_menu(localizer, to).await?;
                self.store.set_dialog_state(&user.id, t.next)
            }

            Step::PromptContinue => {
                let pointer = self
                    .store
                    .latest_active_pointer(&user.id)?
                    .ok_or_else(|| DocSageError::NoActiveDocument(user.id.clone()))?;
                let set = self
                    .store
                    .document_set(&pointer.document_set_id)?
                    .ok_or_else(|| {
                        DocSageError::NotFound(format!("document set {}", pointer.document_set_id))
                    })?;
                let prompt = format!(
                    "{} {}",
                    localizer.text(phrases::ASK_QUESTION_PROMPT),
                    localizer.text(&set.name)
                );
                self.store
                    .upsert_pointer(&user.id, &set.id, PointerStatus::Success, &prompt)?;
                self.messenger.send_text(to, &prompt).await?;
                self.store.set_dialog_state(&user.id, t.next)
            }

            Step::AskHelpfulness => {
                let menu = ButtonMenu {
                    body: localizer.text(phrases::WAS_THIS_HELPFUL),
                    buttons: vec![
                        MenuRow::new(Action::FeedbackYes.id(), localizer.text(phrases::YES)),
                        MenuRow::new(Action::FeedbackNo.id(), localizer.text(phrases::NO)),
                    ],
                };
                self.messenger.send_buttons(to, &menu).await?;
                self.store.set_dialog_state(&user.id, t.next)
            }

            Step::RecordFeedback(helpful) => {
                let reply = if *helpful { FeedbackReply::Yes } else { FeedbackReply::No };
                self.store.record_feedback(&user.id, reply)?;
                self.messenger
                    .send_text(to, &localizer.text(phrases::THANKS_FEEDBACK))
                    .await?;
                self.store.set_dialog_state(&user.id, t.next)
            }

            // No state is recorded for unrecognized input.
            Step::Fallback => self.messenger.send_text(to, &localizer.text(phrases::FALLBACK)).await,
        }
    }

    async fn show_document_menu(
        &self,
        user: &User,
        localizer: &Localizer,
        to: &str,
        next: DialogState,
    ) -> Result<()> {
        let docs = self.store.user_documents(&user.id)?;
        if docs.is_empty() {
            return self.messenger.send_text(to, &localizer.text(phrases::NO_DOCUMENTS)).await;
        }
        let rows = docs
            .iter()
            .map(|d| {
                MenuRow::new(
                    Action::SelectDocument(d.id.clone()).id(),
                    menu_title(&localizer.text(&d.name)),
                )
            })
            .collect();
        let menu = ListMenu {
            header: localizer.bot_name(phrases::CHOOSE_DOCUMENT_BODY, &self.bot_name),
            body: localizer.text(phrases::CHOOSE_DOCUMENT_BODY),
            footer: Some(localizer.text(phrases::CHOOSE_DOCUMENT_FOOTER)),
            button: localizer
                .button_label(phrases::CHOOSE_DOCUMENT_BODY, phrases::CHOOSE_DOCUMENT_BUTTON),
            rows,
        };
        self.messenger.send_list(to, &menu).await?;
        self.store.set_dialog_state(&user.id, next)
    }

    async fn send_follow_up_menu(&self, localizer: &Localizer, to: &str) -> Result<()> {
        let menu = ButtonMenu {
            body: localizer.text(phrases::FOLLOW_UP_BODY),
            buttons: vec![
                MenuRow::new(Action::ChangePolicy.id(), localizer.text(phrases::CHANGE_POLICY)),
                MenuRow::new(
                    Action::EndConversation.id(),
                    localizer.text(phrases::END_CONVERSATION),
                ),
            ],
        };
        self.messenger.send_buttons(to, &menu).await
    }

    fn language_name(&self, user: &User) -> Result<String> {
        if let Some(id) = &user.language_id {
            if let Some(lang) = self.store.language(id)? {
                return Ok(lang.name);
            }
        }
        Ok(self.base_language.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docsage_core::types::{ChatMessage, CompletionResponse, PassageMatch, PassageVector};
    use std::sync::Mutex;

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingOracle for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1f32; 4]).collect())
        }
    }

    /// Classification returns the programmed token; translation echoes with
    /// a prefix; anything else gets the canned answer.
    struct FakeCompleter {
        intent_token: Mutex<String>,
    }

    #[async_trait]
    impl CompletionOracle for FakeCompleter {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse> {
            let system = &messages[0].content;
            let content = if system.starts_with("Classify") {
                self.intent_token.lock().unwrap().clone()
            } else if system.starts_with("Translate") {
                format!("[en] {}", messages[1].content)
            } else {
                "Your deductible is $500.".to_string()
            };
            Ok(CompletionResponse {
                content: content.clone(),
                raw: serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }),
            })
        }
    }

    struct FakeIndex {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PassageIndex for FakeIndex {
        async fn upsert(&self, _vectors: &[PassageVector]) -> Result<()> {
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            document_set_id: &str,
            _top_k: usize,
        ) -> Result<Vec<PassageMatch>> {
            self.queries.lock().unwrap().push(document_set_id.to_string());
            Ok(vec![PassageMatch {
                id: "c1".into(),
                score: 0.9,
                text: "Deductible: $500.".into(),
                document_set_id: document_set_id.to_string(),
            }])
        }

        async fn delete_document_set(&self, _document_set_id: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_all(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(String),
        List(ListMenu),
        Buttons(ButtonMenu),
    }

    #[derive(Default)]
    struct FakeMessenger {
        sent: Mutex<Vec<Sent>>,
    }

    #[async_trait]
    impl OutboundMessenger for FakeMessenger {
        async fn send_text(&self, _to: &str, body: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Text(body.to_string()));
            Ok(())
        }

        async fn send_list(&self, _to: &str, menu: &ListMenu) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::List(menu.clone()));
            Ok(())
        }

        async fn send_buttons(&self, _to: &str, menu: &ButtonMenu) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Buttons(menu.clone()));
            Ok(())
        }
    }

    struct Rig {
        store: Arc<Store>,
        completer: Arc<FakeCompleter>,
        index: Arc<FakeIndex>,
        messenger: Arc<FakeMessenger>,
        engine: Engine,
        user: User,
    }

    impl Rig {
        fn sent(&self) -> Vec<Sent> {
            self.messenger.sent.lock().unwrap().clone()
        }

        fn clear_sent(&self) {
            self.messenger.sent.lock().unwrap().clear();
        }

        async fn text(&self, body: &str) {
            self.engine
                .handle_message(&InboundMessage {
                    from: self.user.mobile.clone(),
                    wa_id: self.user.mobile.clone(),
                    kind: InboundKind::Text { body: body.to_string() },
                })
                .await
                .unwrap();
        }

        async fn list_reply(&self, id: &str, title: &str) {
            self.engine
                .handle_message(&InboundMessage {
                    from: self.user.mobile.clone(),
                    wa_id: self.user.mobile.clone(),
                    kind: InboundKind::ListReply { id: id.to_string(), title: title.to_string() },
                })
                .await
                .unwrap();
        }

        async fn button_reply(&self, id: &str, title: &str) {
            self.engine
                .handle_message(&InboundMessage {
                    from: self.user.mobile.clone(),
                    wa_id: self.user.mobile.clone(),
                    kind: InboundKind::ButtonReply { id: id.to_string(), title: title.to_string() },
                })
                .await
                .unwrap();
        }
    }

    fn setup(with_languages: bool) -> Rig {
        let store = Arc::new(Store::open_in_memory().unwrap());
        if with_languages {
            store.add_language("English").unwrap();
            store.add_language("Hindi").unwrap();
        }
        let user = store.create_user("Asha", "15550001111", "asha@example.com").unwrap();

        let completer = Arc::new(FakeCompleter { intent_token: Mutex::new("Greeting".into()) });
        let index = Arc::new(FakeIndex { queries: Mutex::new(Vec::new()) });
        let messenger = Arc::new(FakeMessenger::default());
        let engine = Engine::new(
            store.clone(),
            Arc::new(FakeEmbedder),
            completer.clone(),
            index.clone(),
            messenger.clone(),
            &DocSageConfig::default(),
        );
        Rig { store, completer, index, messenger, engine, user }
    }

    /// Add an owned, indexed document set named `name`.
    fn owned_set(rig: &Rig, name: &str) -> String {
        let set = rig.store.create_document_set(name, &rig.user.id).unwrap();
        rig.store.append_user_document(&rig.user.id, &set.id).unwrap();
        set.id
    }

    #[tokio::test]
    async fn test_fresh_greeting_sends_language_menu_and_marker() {
        let rig = setup(true);
        rig.text("Hi").await;

        let markers = rig.store.session_markers(&rig.user.id).unwrap();
        assert!(markers.greeted_at.is_some());
        assert_eq!(rig.store.dialog_state(&rig.user.id).unwrap(), DialogState::AwaitingLanguage);

        match &rig.sent()[..] {
            [Sent::List(menu)] => {
                assert_eq!(menu.body, phrases::CHOOSE_LANGUAGE_BODY);
                assert_eq!(menu.rows.len(), 2);
                assert!(menu.rows.iter().all(|r| r.id.starts_with("lang:")));
            }
            other => panic!("unexpected sends: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_greeting_without_language_catalog_goes_to_documents() {
        let rig = setup(false);
        owned_set(&rig, "AutoPolicy");
        rig.text("Hello").await;

        assert_eq!(
            rig.store.dialog_state(&rig.user.id).unwrap(),
            DialogState::AwaitingDocumentChoice
        );
        match &rig.sent()[..] {
            [Sent::List(menu)] => {
                assert_eq!(menu.body, phrases::CHOOSE_DOCUMENT_BODY);
                assert!(menu.rows[0].id.starts_with("doc:"));
            }
            other => panic!("unexpected sends: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_question_answers_against_active_set_then_follow_up() {
        let rig = setup(true);
        let set_id = owned_set(&rig, "AutoPolicy");
        rig.store
            .upsert_pointer(&rig.user.id, &set_id, PointerStatus::Success, "")
            .unwrap();
        *rig.completer.intent_token.lock().unwrap() = "Question".into();

        rig.text("What is my deductible?").await;

        // Retrieval was scoped to the active set.
        assert_eq!(rig.index.queries.lock().unwrap().as_slice(), &[set_id.clone()]);

        // Answer text, then the two-option follow-up menu.
        match &rig.sent()[..] {
            [Sent::Text(answer), Sent::Buttons(menu)] => {
                assert_eq!(answer, "Your deductible is $500.");
                let labels: Vec<&str> = menu.buttons.iter().map(|b| b.title.as_str()).collect();
                assert_eq!(labels, vec![phrases::CHANGE_POLICY, phrases::END_CONVERSATION]);
                assert_eq!(menu.buttons[0].id, "act:change");
                assert_eq!(menu.buttons[1].id, "act:end");
            }
            other => panic!("unexpected sends: {other:?}"),
        }

        // The Q&A log captured question and answer.
        let logs = rig.store.qna_logs_for_user(&rig.user.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].question, "What is my deductible?");
        assert_eq!(logs[0].answer.as_deref(), Some("Your deductible is $500."));
        assert_eq!(rig.store.dialog_state(&rig.user.id).unwrap(), DialogState::AwaitingFollowUp);
    }

    #[tokio::test]
    async fn test_question_without_active_set_falls_back() {
        let rig = setup(true);
        *rig.completer.intent_token.lock().unwrap() = "Question".into();
        rig.text("What is covered?").await;
        assert_eq!(rig.sent(), vec![Sent::Text(phrases::FALLBACK.to_string())]);
    }

    #[tokio::test]
    async fn test_select_document_upserts_pointer_and_sends_faq_menu() {
        let rig = setup(true);
        let set_id = owned_set(&rig, "AutoPolicy");
        rig.store
            .add_faq(&set_id, None, "What is covered?", "Collision and theft.")
            .unwrap();

        rig.list_reply(&format!("doc:{set_id}"), "AutoPolicy").await;

        let pointer = rig.store.pointer(&rig.user.id, &set_id).unwrap().unwrap();
        assert_eq!(pointer.status, PointerStatus::Success);
        assert_eq!(
            rig.store.dialog_state(&rig.user.id).unwrap(),
            DialogState::AnsweringQuestions
        );

        match &rig.sent()[..] {
            [Sent::List(menu)] => {
                assert!(menu.body.contains("AutoPolicy"));
                assert!(menu.rows[0].id.starts_with("faq:"));
                assert_eq!(menu.rows.last().unwrap().id, "act:continue");
            }
            other => panic!("unexpected sends: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_select_unowned_document_records_failure_pointer() {
        let rig = setup(true);
        let other = rig.store.create_user("Noor", "15550002222", "noor@example.com").unwrap();
        let foreign = rig.store.create_document_set("TheirPolicy", &other.id).unwrap();
        rig.store.append_user_document(&other.id, &foreign.id).unwrap();

        rig.list_reply(&format!("doc:{}", foreign.id), "TheirPolicy").await;

        let pointer = rig.store.pointer(&rig.user.id, &foreign.id).unwrap().unwrap();
        assert_eq!(pointer.status, PointerStatus::Failure);
        assert_eq!(rig.sent(), vec![Sent::Text(phrases::INVALID_DOCUMENT.to_string())]);
        // State untouched by the failed selection.
        assert_eq!(rig.store.dialog_state(&rig.user.id).unwrap(), DialogState::Idle);
    }

    #[tokio::test]
    async fn test_faq_selection_sends_stored_answer() {
        let rig = setup(true);
        let set_id = owned_set(&rig, "AutoPolicy");
        let faq_id = rig
            .store
            .add_faq(&set_id, None, "What is covered?", "Collision and theft.")
            .unwrap();

        rig.list_reply(&format!("faq:{faq_id}"), "What is covered?").await;

        match &rig.sent()[..] {
            [Sent::Text(answer), Sent::Buttons(_)] => {
                assert_eq!(answer, "Collision and theft.");
            }
            other => panic!("unexpected sends: {other:?}"),
        }
        assert!(rig.store.pointer(&rig.user.id, &set_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_feedback_no_closes_session_and_next_turn_is_fresh() {
        let rig = setup(true);
        rig.store.record_greeting(&rig.user.id, "Hi").unwrap();
        rig.store
            .set_dialog_state(&rig.user.id, DialogState::AwaitingFeedback)
            .unwrap();

        rig.button_reply("act:no", "No").await;

        let markers = rig.store.session_markers(&rig.user.id).unwrap();
        assert!(markers.ended_at.is_some());
        assert_eq!(rig.store.dialog_state(&rig.user.id).unwrap(), DialogState::Idle);
        assert_eq!(rig.sent(), vec![Sent::Text(phrases::THANKS_FEEDBACK.to_string())]);

        // Session closed: the next free text goes through classification
        // again and greets.
        rig.clear_sent();
        *rig.completer.intent_token.lock().unwrap() = "Greeting".into();
        rig.text("Hi again").await;
        assert!(matches!(&rig.sent()[..], [Sent::List(_)]));
        assert_eq!(
            rig.store.dialog_state(&rig.user.id).unwrap(),
            DialogState::AwaitingLanguage
        );
    }

    #[tokio::test]
    async fn test_unclassifiable_text_gets_generic_fallback_and_no_state() {
        let rig = setup(true);
        *rig.completer.intent_token.lock().unwrap() = "Gibberish".into();
        rig.text("asdfgh").await;

        assert_eq!(rig.sent(), vec![Sent::Text(phrases::FALLBACK.to_string())]);
        assert!(rig.store.session_markers(&rig.user.id).unwrap().greeted_at.is_none());
        assert_eq!(rig.store.dialog_state(&rig.user.id).unwrap(), DialogState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_user_gets_canonical_fallback() {
        let rig = setup(true);
        rig.engine
            .handle_message(&InboundMessage {
                from: "19990000000".into(),
                wa_id: "19990000000".into(),
                kind: InboundKind::Text { body: "Hi".into() },
            })
            .await
            .unwrap();
        assert_eq!(rig.sent(), vec![Sent::Text(phrases::FALLBACK.to_string())]);
    }

    #[tokio::test]
    async fn test_pointer_stays_single_through_repeated_dispatch() {
        let rig = setup(true);
        let set_id = owned_set(&rig, "AutoPolicy");
        rig.list_reply(&format!("doc:{set_id}"), "AutoPolicy").await;
        rig.button_reply("act:change", "Change Policy").await;
        rig.button_reply("act:continue", "Continue Asking").await;
        rig.button_reply("act:continue", "Continue Asking").await;

        assert_eq!(rig.store.pointer_count(&rig.user.id, &set_id).unwrap(), 1);
        assert_eq!(
            rig.store.dialog_state(&rig.user.id).unwrap(),
            DialogState::AnsweringQuestions
        );
    }

    #[tokio::test]
    async fn test_reverse_label_dispatch_without_action_id() {
        let rig = setup(true);
        let hindi = rig.store.language_by_name("Hindi").unwrap().unwrap();
        rig.store.set_user_language(&rig.user.id, &hindi.id).unwrap();
        rig.store
            .add_localized_reply(&hindi.id, phrases::END_CONVERSATION, "बातचीत समाप्त करें", "", "")
            .unwrap();
        let user = rig.store.user_by_id(&rig.user.id).unwrap().unwrap();
        assert_eq!(user.language_id.as_deref(), Some(hindi.id.as_str()));

        // Canonical English label without a tagged id.
        rig.button_reply("legacy-1", "End Conversation").await;
        assert!(matches!(&rig.sent()[..], [Sent::Buttons(_)]));
        assert_eq!(
            rig.store.dialog_state(&rig.user.id).unwrap(),
            DialogState::AwaitingFeedback
        );

        // Localized label reverse-resolves to the same branch.
        rig.clear_sent();
        rig.store.set_dialog_state(&rig.user.id, DialogState::AwaitingFollowUp).unwrap();
        rig.button_reply("legacy-2", "बातचीत समाप्त करें").await;
        assert!(matches!(&rig.sent()[..], [Sent::Buttons(_)]));
        assert_eq!(
            rig.store.dialog_state(&rig.user.id).unwrap(),
            DialogState::AwaitingFeedback
        );
    }

    #[tokio::test]
    async fn test_select_language_localizes_document_menu() {
        let rig = setup(true);
        owned_set(&rig, "AutoPolicy");
        let hindi = rig.store.language_by_name("Hindi").unwrap().unwrap();
        rig.store
            .add_localized_reply(
                &hindi.id,
                phrases::CHOOSE_DOCUMENT_BODY,
                "कृपया दस्तावेज़ चुनें।",
                "डॉकसेज",
                "दस्तावेज़ चुनें",
            )
            .unwrap();
        // Document set names carry per-language variants the same way.
        rig.store
            .add_localized_reply(&hindi.id, "AutoPolicy", "ऑटो पॉलिसी", "", "")
            .unwrap();

        rig.list_reply(&format!("lang:{}", hindi.id), "Hindi").await;

        let user = rig.store.user_by_id(&rig.user.id).unwrap().unwrap();
        assert_eq!(user.language_id.as_deref(), Some(hindi.id.as_str()));
        match &rig.sent()[..] {
            [Sent::List(menu)] => {
                assert_eq!(menu.body, "कृपया दस्तावेज़ चुनें।");
                assert_eq!(menu.header, "डॉकसेज");
                assert_eq!(menu.button, "दस्तावेज़ चुनें");
                assert_eq!(menu.rows[0].title, "ऑटो पॉलिसी");
            }
            other => panic!("unexpected sends: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_change_keyword_reshows_document_menu_mid_conversation() {
        let rig = setup(true);
        owned_set(&rig, "AutoPolicy");
        rig.store.record_greeting(&rig.user.id, "Hi").unwrap();
        rig.store
            .set_dialog_state(&rig.user.id, DialogState::AnsweringQuestions)
            .unwrap();

        rig.text("change").await;
        assert!(matches!(&rig.sent()[..], [Sent::List(_)]));
        assert_eq!(
            rig.store.dialog_state(&rig.user.id).unwrap(),
            DialogState::AwaitingDocumentChoice
        );
    }

    #[tokio::test]
    async fn test_process_turn_ignores_unrecognized_payload() {
        let rig = setup(true);
        let status = rig
            .engine
            .process_turn(&serde_json::json!({"unexpected": true}))
            .await
            .unwrap();
        assert_eq!(status, TurnStatus::Ignored);
        assert!(rig.sent().is_empty());
    }
}
