//! Submission flow: validate, append, translate, send, append-or-await-stream

use chatflow_api::{Language, Message, PredictionRequest, PredictionResponse};

use crate::{
    events::WidgetEvent,
    language::detect_language,
    locale::Locale,
    store::MessagePatch,
    widget::ChatWidget,
};

/// How a submission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing happened
    Ignored,
    /// Another submission is in flight; nothing happened
    Busy,
    /// The answer was appended from the response body
    Answered,
    /// The backend accepted the question; the answer streams over the channel
    Streaming,
    /// The backend failed; an error notice was appended
    Failed,
    /// The conversation was reset while waiting; the result was dropped
    Discarded,
}

/// Snapshot taken when a submission starts
struct Prepared {
    history: Vec<Message>,
    chat_id: String,
    user_index: usize,
    generation: u64,
    language: Option<Language>,
}

impl ChatWidget {
    /// Submit user input.
    ///
    /// The user message is appended before any network call. The busy flag
    /// is cleared on every path that set it, unless a reset or shutdown
    /// already cleared it for a newer conversation.
    pub async fn submit(&self, raw: &str) -> SubmitOutcome {
        let Some(prepared) = self.begin_submission(raw) else {
            return if raw.trim().is_empty() {
                SubmitOutcome::Ignored
            } else {
                SubmitOutcome::Busy
            };
        };

        let question = match self.translate_question(raw, &prepared).await {
            Some(question) => question,
            None => return self.finish_discarded(),
        };

        let request = {
            let state = self.state.lock();
            PredictionRequest {
                question,
                history: prepared.history.clone(),
                chat_id: prepared.chat_id.clone(),
                override_config: self.config.chatflow_config.clone(),
                socket_io_client_id: if state.streaming_enabled {
                    state.channel.client_id().map(str::to_string)
                } else {
                    None
                },
            }
        };

        // Only a request carrying the client id gets its answer streamed
        let awaits_stream = request.socket_io_client_id.is_some();
        let result = self
            .backend
            .send_message(&self.config.chatflow_id, &request)
            .await;

        self.finish_submission(&prepared, result, awaits_stream)
    }

    /// Submit a starter prompt
    pub async fn prompt_click(&self, prompt: &str) -> SubmitOutcome {
        self.submit(prompt).await
    }

    /// Validate, set busy, and append the user message.
    ///
    /// Returns `None` when the input is blank or a submission is in flight.
    fn begin_submission(&self, raw: &str) -> Option<Prepared> {
        let (prepared, appended) = {
            let mut state = self.state.lock();
            if raw.trim().is_empty() {
                return None;
            }
            if state.busy {
                tracing::debug!("Submission ignored: another one is in flight");
                return None;
            }
            state.busy = true;
            state.pending_input = raw.to_string();

            let language =
                detect_language(raw).filter(|lang| *lang != self.config.backend_language);
            if let Some(lang) = language {
                state.locale = Locale::from(lang);
            }

            let history = state.store.history(self.config.welcome_text());
            let user_index = state.store.append(Message::user(raw));
            let appended = WidgetEvent::MessageAppended {
                index: user_index,
                message: state.store.messages()[user_index].clone(),
            };

            (
                Prepared {
                    history,
                    chat_id: state.store.conversation_id().to_string(),
                    user_index,
                    generation: state.generation,
                    language,
                },
                appended,
            )
        };

        self.emit(WidgetEvent::BusyChanged { busy: true });
        self.emit(appended);
        Some(prepared)
    }

    /// Work out the question text to send.
    ///
    /// Input in a non-default language is translated when a translator is
    /// configured; a failed translation falls back to the original text.
    /// Returns `None` if the conversation was reset meanwhile.
    async fn translate_question(&self, raw: &str, prepared: &Prepared) -> Option<String> {
        let Some(from) = prepared.language else {
            return Some(raw.to_string());
        };
        let Some(translator) = self.translator.as_ref() else {
            tracing::debug!("{} input detected but no translator configured", from.name());
            return Some(raw.to_string());
        };

        let to = self.config.backend_language;
        let result = translator.translate(from, to, raw).await;

        let mut state = self.state.lock();
        if state.generation != prepared.generation {
            return None;
        }

        let (question, recorded) = match result {
            Ok(translated) => {
                tracing::debug!("Translated question: {}", translated);
                (translated.clone(), translated)
            }
            Err(e) => {
                tracing::warn!("Translation failed, sending original text: {}", e);
                let notice = match e {
                    chatflow_api::Error::EmptyTranslation => state.locale.translation_unavailable(),
                    _ => state.locale.translation_failed(),
                };
                (raw.to_string(), notice.to_string())
            }
        };

        let event = if state.store.len() == prepared.user_index + 1 {
            state
                .store
                .mutate_last(MessagePatch::TranslatedText(recorded))
                .and_then(|index| state.change_event(crate::stream::StoreChange::Updated(index)))
        } else {
            tracing::debug!("User message is no longer last; translation not recorded");
            None
        };
        drop(state);

        if let Some(event) = event {
            self.emit(event);
        }
        Some(question)
    }

    fn finish_submission(
        &self,
        prepared: &Prepared,
        result: chatflow_api::Result<PredictionResponse>,
        awaits_stream: bool,
    ) -> SubmitOutcome {
        let mut events = Vec::new();
        let outcome = {
            let mut state = self.state.lock();
            if state.generation != prepared.generation {
                tracing::debug!("Conversation reset during submission; dropping result");
                return SubmitOutcome::Discarded;
            }
            let outcome = match result {
                Ok(_) if awaits_stream => SubmitOutcome::Streaming,
                Ok(response) => {
                    let message = Message::assistant(response.display_text())
                        .with_source_documents(response.source_documents)
                        .with_file_annotations(response.file_annotations);
                    let index = state.store.append(message);
                    events.extend(
                        state.change_event(crate::stream::StoreChange::Appended(index)),
                    );
                    SubmitOutcome::Answered
                }
                Err(e) => {
                    tracing::error!("Submission failed: {}", e);
                    let notice = state.locale.generic_error();
                    let index = state.store.append(Message::assistant(notice));
                    events.extend(
                        state.change_event(crate::stream::StoreChange::Appended(index)),
                    );
                    SubmitOutcome::Failed
                }
            };
            state.busy = false;
            state.pending_input.clear();
            outcome
        };

        self.emit_all(events);
        self.emit(WidgetEvent::BusyChanged { busy: false });
        outcome
    }

    /// Busy and pending input were already cleared by the reset
    fn finish_discarded(&self) -> SubmitOutcome {
        tracing::debug!("Conversation reset during translation; dropping submission");
        SubmitOutcome::Discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, SessionStorage};
    use crate::test_support::{MockBackend, MockTranslator, Reply, WELCOME, test_config};
    use crate::widget::WidgetDeps;
    use async_trait::async_trait;
    use chatflow_api::{
        Backend, ChannelEvent, ChatbotConfig, Role, StreamCapability, Translator,
    };
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::{Arc, OnceLock};
    use tokio::sync::{Notify, oneshot};
    use tokio::task::JoinHandle;

    fn make_widget(backend: MockBackend) -> (ChatWidget, Arc<MockBackend>, Arc<MemoryStorage>) {
        let backend = Arc::new(backend);
        let storage = Arc::new(MemoryStorage::new());
        let deps = WidgetDeps::new(backend.clone(), storage.clone());
        (ChatWidget::new(test_config(), deps), backend, storage)
    }

    fn make_translating_widget(
        backend: MockBackend,
        translator: MockTranslator,
    ) -> (ChatWidget, Arc<MockBackend>, Arc<MockTranslator>) {
        let backend = Arc::new(backend);
        let translator = Arc::new(translator);
        let deps = WidgetDeps::new(backend.clone(), Arc::new(MemoryStorage::new()))
            .with_translator(translator.clone());
        (ChatWidget::new(test_config(), deps), backend, translator)
    }

    /// Records the widget's messages at the moment each network call starts
    struct Observer {
        widget: OnceLock<ChatWidget>,
        seen: Mutex<Vec<(&'static str, Vec<Message>)>>,
    }

    impl Observer {
        fn record(&self, call: &'static str) {
            let messages = self.widget.get().map(|w| w.messages()).unwrap_or_default();
            self.seen.lock().push((call, messages));
        }
    }

    #[async_trait]
    impl Backend for Observer {
        async fn send_message(
            &self,
            _chatflow_id: &str,
            _request: &PredictionRequest,
        ) -> chatflow_api::Result<PredictionResponse> {
            self.record("send");
            Ok(PredictionResponse {
                text: Some("ok".into()),
                ..Default::default()
            })
        }

        async fn stream_capability(
            &self,
            _chatflow_id: &str,
        ) -> chatflow_api::Result<StreamCapability> {
            Ok(StreamCapability::default())
        }

        async fn chatbot_config(&self, _chatflow_id: &str) -> chatflow_api::Result<ChatbotConfig> {
            Ok(ChatbotConfig::default())
        }
    }

    #[async_trait]
    impl Translator for Observer {
        async fn translate(
            &self,
            _from: Language,
            _to: Language,
            _text: &str,
        ) -> chatflow_api::Result<String> {
            self.record("translate");
            Ok("Hello".into())
        }
    }

    #[tokio::test]
    async fn test_user_message_appended_before_any_network_call() {
        let observer = Arc::new(Observer {
            widget: OnceLock::new(),
            seen: Mutex::new(Vec::new()),
        });
        let deps = WidgetDeps::new(observer.clone(), Arc::new(MemoryStorage::new()))
            .with_translator(observer.clone());
        let widget = ChatWidget::new(test_config(), deps);
        let _ = observer.widget.set(widget.clone());

        for input in ["안녕하세요", "hello"] {
            observer.seen.lock().clear();
            let before = widget.messages().len();
            widget.submit(input).await;

            let seen = observer.seen.lock().clone();
            assert!(!seen.is_empty());
            for (call, messages) in seen {
                assert_eq!(messages.len(), before + 1, "{} saw wrong length", call);
                let last = messages.last().unwrap();
                assert_eq!(last.role, Role::User);
                assert_eq!(last.text, input);
            }
        }
    }

    #[tokio::test]
    async fn test_answer_appended_from_response_body() {
        let (widget, backend, storage) =
            make_widget(MockBackend::new().reply(Reply::Text("Paris".into())));
        let outcome = widget.submit("Capital of France?").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        let messages = widget.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].text, "Capital of France?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].text, "Paris");
        assert!(!widget.is_busy());
        assert!(widget.pending_input().is_empty());

        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].question, "Capital of France?");
        assert_eq!(sent[0].chat_id, widget.conversation_id());
        assert!(sent[0].socket_io_client_id.is_none());

        let record = storage
            .load(&test_config().storage_key())
            .unwrap()
            .unwrap();
        assert_eq!(record.chat_history, messages);
    }

    #[tokio::test]
    async fn test_history_excludes_welcome_and_new_question() {
        let (widget, backend, _) = make_widget(
            MockBackend::new()
                .reply(Reply::Text("a1".into()))
                .reply(Reply::Text("a2".into())),
        );
        widget.submit("q1").await;
        widget.submit("q2").await;

        let sent = backend.sent();
        assert!(sent[0].history.is_empty());
        let texts: Vec<&str> = sent[1].history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "a1"]);
        assert!(sent[1].history.iter().all(|m| m.text != WELCOME));
    }

    #[tokio::test]
    async fn test_blank_input_changes_nothing() {
        let (widget, backend, storage) = make_widget(MockBackend::new());
        let before = widget.messages();

        assert_eq!(widget.submit("   ").await, SubmitOutcome::Ignored);
        assert_eq!(widget.submit("").await, SubmitOutcome::Ignored);

        assert_eq!(widget.messages(), before);
        assert!(backend.sent().is_empty());
        assert!(!widget.is_busy());
        assert!(!storage.contains(&test_config().storage_key()));
    }

    #[tokio::test]
    async fn test_backend_error_appends_generic_notice() {
        let (widget, _, _) =
            make_widget(MockBackend::new().reply(Reply::Fail(500, "Internal Error".into())));
        let outcome = widget.submit("hello").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        let last = widget.messages().pop().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text, Locale::English.generic_error());
        assert!(!widget.is_busy());
    }

    #[tokio::test]
    async fn test_busy_rejects_second_submission() {
        let (widget, backend, _) = make_widget(MockBackend::new());
        widget.state.lock().busy = true;
        assert_eq!(widget.submit("hello").await, SubmitOutcome::Busy);
        assert_eq!(widget.messages().len(), 1);
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn test_korean_input_is_translated_before_sending() {
        let (widget, backend, translator) = make_translating_widget(
            MockBackend::new().reply(Reply::Text("Hi!".into())),
            MockTranslator::answering("Hello"),
        );
        widget.submit("안녕하세요").await;

        let calls = translator.calls.lock().clone();
        assert_eq!(
            calls,
            vec![(Language::Korean, Language::English, "안녕하세요".to_string())]
        );
        assert_eq!(backend.sent()[0].question, "Hello");

        let user = &widget.messages()[1];
        assert_eq!(user.text, "안녕하세요");
        assert_eq!(user.translated_text.as_deref(), Some("Hello"));
        assert_eq!(widget.locale(), Locale::Korean);
    }

    #[tokio::test]
    async fn test_english_input_is_not_translated() {
        let (widget, backend, translator) =
            make_translating_widget(MockBackend::new(), MockTranslator::answering("unused"));
        widget.submit("hello").await;

        assert_eq!(translator.call_count(), 0);
        assert_eq!(backend.sent()[0].question, "hello");
        assert!(widget.messages()[1].translated_text.is_none());
        assert_eq!(widget.locale(), Locale::English);
    }

    #[tokio::test]
    async fn test_translation_failure_does_not_abort() {
        let (widget, backend, translator) = make_translating_widget(
            MockBackend::new().reply(Reply::Text("answer".into())),
            MockTranslator::failing(),
        );
        let outcome = widget.submit("안녕하세요").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        assert_eq!(translator.call_count(), 1);
        assert_eq!(backend.sent()[0].question, "안녕하세요");
        assert_eq!(
            widget.messages()[1].translated_text.as_deref(),
            Some(Locale::Korean.translation_failed())
        );
    }

    #[tokio::test]
    async fn test_korean_session_gets_korean_error() {
        let (widget, _, _) = make_translating_widget(
            MockBackend::new().reply(Reply::Fail(500, "Internal Error".into())),
            MockTranslator::answering("Hello"),
        );
        widget.submit("안녕하세요").await;
        let last = widget.messages().pop().unwrap();
        assert_eq!(last.text, "잠시 후 다시 시도 해주시기 바랍니다.");
    }

    #[tokio::test]
    async fn test_streaming_response_waits_for_channel() {
        let (widget, backend, _) = make_widget(MockBackend::new().reply(Reply::Text("ignored".into())));
        widget.state.lock().streaming_enabled = true;
        widget.handle_channel_event(ChannelEvent::Connected {
            client_id: "sock-7".into(),
        });

        let outcome = widget.submit("stream please").await;
        assert_eq!(outcome, SubmitOutcome::Streaming);
        assert_eq!(widget.messages().len(), 2);
        assert_eq!(backend.sent()[0].socket_io_client_id.as_deref(), Some("sock-7"));

        widget.handle_channel_event(ChannelEvent::Start);
        for token in ["str", "eam", "ed"] {
            widget.handle_channel_event(ChannelEvent::token(token));
        }
        let messages = widget.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text, "streamed");
    }

    #[tokio::test]
    async fn test_client_id_omitted_when_streaming_disabled() {
        let (widget, backend, _) = make_widget(MockBackend::new());
        widget.handle_channel_event(ChannelEvent::Connected {
            client_id: "sock-7".into(),
        });
        widget.submit("hello").await;
        assert!(backend.sent()[0].socket_io_client_id.is_none());
    }

    #[tokio::test]
    async fn test_override_config_forwarded() {
        let backend = Arc::new(MockBackend::new());
        let mut overrides = serde_json::Map::new();
        overrides.insert("temperature".into(), serde_json::json!(0.2));
        let config = test_config().with_chatflow_config(overrides.clone());
        let widget = ChatWidget::new(
            config,
            WidgetDeps::new(backend.clone(), Arc::new(MemoryStorage::new())),
        );
        widget.submit("hello").await;
        assert_eq!(backend.sent()[0].override_config, Some(overrides));
    }

    #[tokio::test]
    async fn test_busy_events_bracket_submission() {
        let (widget, _, _) = make_widget(MockBackend::new());
        let mut rx = widget.subscribe();
        widget.submit("hello").await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(WidgetEvent::BusyChanged { busy: true })));
        assert!(matches!(events.last(), Some(WidgetEvent::BusyChanged { busy: false })));
        let appended = events
            .iter()
            .filter(|e| matches!(e, WidgetEvent::MessageAppended { .. }))
            .count();
        assert_eq!(appended, 2);
    }

    /// Backend that resets the conversation while the request is in flight
    struct ResettingBackend {
        widget: OnceLock<ChatWidget>,
    }

    #[async_trait]
    impl Backend for ResettingBackend {
        async fn send_message(
            &self,
            _chatflow_id: &str,
            _request: &PredictionRequest,
        ) -> chatflow_api::Result<PredictionResponse> {
            if let Some(widget) = self.widget.get() {
                widget.clear();
            }
            Ok(PredictionResponse {
                text: Some("late answer".into()),
                ..Default::default()
            })
        }

        async fn stream_capability(
            &self,
            _chatflow_id: &str,
        ) -> chatflow_api::Result<StreamCapability> {
            Ok(StreamCapability::default())
        }

        async fn chatbot_config(&self, _chatflow_id: &str) -> chatflow_api::Result<ChatbotConfig> {
            Ok(ChatbotConfig::default())
        }
    }

    #[tokio::test]
    async fn test_result_after_reset_is_discarded() {
        let backend = Arc::new(ResettingBackend {
            widget: OnceLock::new(),
        });
        let widget = ChatWidget::new(
            test_config(),
            WidgetDeps::new(backend.clone(), Arc::new(MemoryStorage::new())),
        );
        let _ = backend.widget.set(widget.clone());

        let outcome = widget.submit("hello").await;

        assert_eq!(outcome, SubmitOutcome::Discarded);
        let messages = widget.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, WELCOME);
        assert!(!widget.is_busy());
    }

    #[tokio::test]
    async fn test_streaming_without_connected_channel_appends_body() {
        let (widget, backend, _) =
            make_widget(MockBackend::new().reply(Reply::Text("Paris".into())));
        widget.state.lock().streaming_enabled = true;

        let outcome = widget.submit("Capital of France?").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        assert!(backend.sent()[0].socket_io_client_id.is_none());
        let messages = widget.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text, "Paris");
    }

    #[tokio::test]
    async fn test_streaming_after_disconnect_appends_body() {
        let (widget, backend, _) =
            make_widget(MockBackend::new().reply(Reply::Text("Paris".into())));
        widget.state.lock().streaming_enabled = true;
        widget.handle_channel_event(ChannelEvent::Connected {
            client_id: "sock-1".into(),
        });
        widget.handle_channel_event(ChannelEvent::Disconnected);

        let outcome = widget.submit("Capital of France?").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        assert!(backend.sent()[0].socket_io_client_id.is_none());
        assert_eq!(widget.messages().last().unwrap().text, "Paris");
    }

    /// Backend whose requests each wait for the test to release them
    struct GatedBackend {
        gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
        started: Notify,
        questions: Mutex<Vec<String>>,
    }

    impl GatedBackend {
        fn new(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<()>>) {
            let (senders, receivers): (Vec<_>, VecDeque<_>) =
                (0..count).map(|_| oneshot::channel()).unzip();
            let backend = Arc::new(Self {
                gates: Mutex::new(receivers),
                started: Notify::new(),
                questions: Mutex::new(Vec::new()),
            });
            (backend, senders)
        }
    }

    #[async_trait]
    impl Backend for GatedBackend {
        async fn send_message(
            &self,
            _chatflow_id: &str,
            request: &PredictionRequest,
        ) -> chatflow_api::Result<PredictionResponse> {
            self.questions.lock().push(request.question.clone());
            let gate = self.gates.lock().pop_front();
            self.started.notify_one();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(PredictionResponse {
                text: Some(format!("answer to {}", request.question)),
                ..Default::default()
            })
        }

        async fn stream_capability(
            &self,
            _chatflow_id: &str,
        ) -> chatflow_api::Result<StreamCapability> {
            Ok(StreamCapability::default())
        }

        async fn chatbot_config(&self, _chatflow_id: &str) -> chatflow_api::Result<ChatbotConfig> {
            Ok(ChatbotConfig::default())
        }
    }

    fn spawn_submit(widget: &ChatWidget, input: &'static str) -> JoinHandle<SubmitOutcome> {
        let widget = widget.clone();
        tokio::spawn(async move { widget.submit(input).await })
    }

    async fn check_stale_result_leaves_newer_submission_busy(reset: impl Fn(&ChatWidget)) {
        let (backend, mut gates) = GatedBackend::new(2);
        let widget = ChatWidget::new(
            test_config(),
            WidgetDeps::new(backend.clone(), Arc::new(MemoryStorage::new())),
        );

        let first = spawn_submit(&widget, "first");
        backend.started.notified().await;

        reset(&widget);
        assert!(!widget.is_busy());

        let second = spawn_submit(&widget, "second");
        backend.started.notified().await;
        assert!(widget.is_busy());

        let release_second = gates.pop().unwrap();
        let release_first = gates.pop().unwrap();
        release_first.send(()).unwrap();
        assert_eq!(first.await.unwrap(), SubmitOutcome::Discarded);

        assert!(widget.is_busy());
        assert_eq!(widget.pending_input(), "second");
        assert_eq!(widget.submit("third").await, SubmitOutcome::Busy);

        release_second.send(()).unwrap();
        assert_eq!(second.await.unwrap(), SubmitOutcome::Answered);
        assert!(!widget.is_busy());

        let texts: Vec<String> = widget.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec![WELCOME, "second", "answer to second"]);
        assert_eq!(*backend.questions.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_stale_result_after_shutdown_keeps_newer_submission_busy() {
        check_stale_result_leaves_newer_submission_busy(ChatWidget::shutdown).await;
    }

    #[tokio::test]
    async fn test_stale_result_after_clear_keeps_newer_submission_busy() {
        check_stale_result_leaves_newer_submission_busy(ChatWidget::clear).await;
    }
}
