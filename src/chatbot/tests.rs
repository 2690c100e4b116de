//! Engine scenarios with fake search, model and chat output.
//!
//! Run with: cargo test chatbot

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;

use super::engine::{annotate_with_search, needs_search, RESET_CONFIRMATION};
use super::*;

// =============================================================================
// FAKES
// =============================================================================

struct FakeSearch {
    result: String,
    queries: StdMutex<Vec<String>>,
}

impl FakeSearch {
    fn new(result: &str) -> Arc<Self> {
        Arc::new(Self {
            result: result.to_string(),
            queries: StdMutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str) -> String {
        self.queries.lock().unwrap().push(query.to_string());
        self.result.clone()
    }
}

/// Records each call as (prompt, history).
struct FakeGenerator {
    reply: String,
    calls: StdMutex<Vec<(String, Vec<Turn>)>>,
    started: Arc<Notify>,
    gate: Option<Arc<Notify>>,
}

impl FakeGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: StdMutex::new(Vec::new()),
            started: Arc::new(Notify::new()),
            gate: None,
        })
    }

    /// A generator that blocks until `gate` is notified.
    fn gated(reply: &str, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: StdMutex::new(Vec::new()),
            started: Arc::new(Notify::new()),
            gate: Some(gate),
        })
    }

    fn calls(&self) -> Vec<(String, Vec<Turn>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str, history: &[Turn]) -> String {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), history.to_vec()));
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.clone()
    }
}

#[derive(Default)]
struct RecordingOutput {
    sent: StdMutex<Vec<(i64, String)>>,
    typing: StdMutex<Vec<i64>>,
}

impl RecordingOutput {
    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn typing_count(&self) -> usize {
        self.typing.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatOutput for RecordingOutput {
    async fn send_typing(&self, chat_id: i64) {
        self.typing.lock().unwrap().push(chat_id);
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

struct Harness {
    engine: Arc<ChatbotEngine>,
    search: Arc<FakeSearch>,
    generator: Arc<FakeGenerator>,
    output: Arc<RecordingOutput>,
}

fn persona() -> Persona {
    Persona::new("Anime Boy", "Aayushman", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
}

fn harness_with(generator: Arc<FakeGenerator>, history_policy: HistoryPolicy) -> Harness {
    let search = FakeSearch::new("Some president.");
    let output = Arc::new(RecordingOutput::default());
    let config = ChatbotConfig {
        persona: persona(),
        history_policy,
    };
    let engine = Arc::new(ChatbotEngine::new(
        config,
        search.clone(),
        generator.clone(),
        output.clone(),
    ));
    Harness {
        engine,
        search,
        generator,
        output,
    }
}

fn harness() -> Harness {
    harness_with(FakeGenerator::new("  sup  "), HistoryPolicy::Annotated)
}

const CHAT: i64 = 555;

fn alice() -> UserId {
    UserId::from(1001u64)
}

fn bob() -> UserId {
    UserId::from(2002u64)
}

fn message(user_id: UserId, text: &str) -> ChatMessage {
    ChatMessage {
        chat_id: CHAT,
        user_id,
        username: "alice".to_string(),
        text: text.to_string(),
        from_bot: false,
    }
}

// =============================================================================
// SEARCH TRIGGER TESTS
// =============================================================================

mod search_trigger {
    use super::*;

    #[test]
    fn test_question_words_match() {
        assert!(needs_search("what is the time"));
        assert!(needs_search("Who is the president?"));
        assert!(needs_search("any NEWS today"));
        assert!(needs_search("tell me the latest"));
        assert!(needs_search("how?"));
    }

    #[test]
    fn test_whole_words_only() {
        assert!(!needs_search("whatever"));
        assert!(!needs_search("somehow it worked"));
        assert!(!needs_search("researching stuff"));
        assert!(!needs_search("hello there"));
    }

    #[test]
    fn test_annotation_format() {
        assert_eq!(
            annotate_with_search("who won?", "Team A."),
            "who won?\n\nHere’s some info I found online: Team A."
        );
    }
}

// =============================================================================
// OPT-IN AND RESET TESTS
// =============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn test_start_activates_and_greets() {
        let h = harness();

        h.engine.handle_start(CHAT, &alice()).await;

        assert!(h.engine.is_active(&alice()).await);
        assert!(h.engine.transcript(&alice()).await.unwrap().is_empty());
        assert_eq!(
            h.output.sent(),
            vec![(CHAT, "Yo! 😎 Anime Boy here. What’s up? Start typing...".to_string())]
        );
    }

    #[tokio::test]
    async fn test_start_twice_keeps_transcript() {
        let h = harness();
        h.engine.handle_start(CHAT, &alice()).await;
        h.engine.handle_message(message(alice(), "hello")).await;

        h.engine.handle_start(CHAT, &alice()).await;

        assert!(h.engine.is_active(&alice()).await);
        assert_eq!(h.engine.transcript(&alice()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_only_caller() {
        let h = harness();
        h.engine.handle_start(CHAT, &alice()).await;
        h.engine.handle_start(CHAT, &bob()).await;
        h.engine.handle_message(message(alice(), "hello")).await;
        h.engine.handle_message(message(bob(), "hello")).await;

        h.engine.handle_reset(CHAT, &alice()).await;

        assert!(h.engine.transcript(&alice()).await.unwrap().is_empty());
        assert_eq!(h.engine.transcript(&bob()).await.unwrap().len(), 1);
        assert_eq!(h.output.sent().last().unwrap().1, RESET_CONFIRMATION);
    }

    #[tokio::test]
    async fn test_reset_works_for_inactive_user() {
        let h = harness();

        h.engine.handle_reset(CHAT, &bob()).await;

        assert!(!h.engine.is_active(&bob()).await);
        assert!(h.engine.transcript(&bob()).await.unwrap().is_empty());
        assert_eq!(h.output.sent(), vec![(CHAT, RESET_CONFIRMATION.to_string())]);
    }
}

// =============================================================================
// MESSAGE ROUTING TESTS
// =============================================================================

mod routing {
    use super::*;

    #[tokio::test]
    async fn test_inactive_user_is_ignored() {
        let h = harness();

        h.engine.handle_message(message(alice(), "what is up")).await;

        assert!(h.output.sent().is_empty());
        assert_eq!(h.output.typing_count(), 0);
        assert!(h.search.queries().is_empty());
        assert!(h.generator.calls().is_empty());
        assert!(h.engine.transcript(&alice()).await.is_none());
    }

    #[tokio::test]
    async fn test_bot_messages_are_ignored() {
        let h = harness();
        h.engine.handle_start(CHAT, &alice()).await;

        let mut msg = message(alice(), "hello");
        msg.from_bot = true;
        h.engine.handle_message(msg).await;

        assert!(h.generator.calls().is_empty());
        assert!(h.engine.transcript(&alice()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plain_message_skips_search() {
        let h = harness();
        h.engine.handle_start(CHAT, &alice()).await;

        h.engine.handle_message(message(alice(), "hello")).await;

        assert!(h.search.queries().is_empty());
        let calls = h.generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "hello");
        assert!(calls[0].1.is_empty());
        assert_eq!(h.output.typing_count(), 1);
    }

    #[tokio::test]
    async fn test_who_question_end_to_end() {
        let h = harness();
        h.engine.handle_start(CHAT, &alice()).await;
        let sent_before = h.output.sent().len();

        h.engine
            .handle_message(message(alice(), "who is the president?"))
            .await;

        assert_eq!(h.search.queries(), vec!["who is the president?".to_string()]);

        let calls = h.generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            "who is the president?\n\nHere’s some info I found online: Some president."
        );

        let transcript = h.engine.transcript(&alice()).await.unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.turns()[0].user_text(), calls[0].0);

        let sent = h.output.sent();
        assert_eq!(sent.len(), sent_before + 1);
        // The fake does not trim; the engine relays what the generator returned.
        assert_eq!(sent.last().unwrap(), &(CHAT, "  sup  ".to_string()));
    }

    #[tokio::test]
    async fn test_history_is_passed_in_order() {
        let h = harness();
        h.engine.handle_start(CHAT, &alice()).await;

        h.engine.handle_message(message(alice(), "one")).await;
        h.engine.handle_message(message(alice(), "two")).await;
        h.engine.handle_message(message(alice(), "three")).await;

        let calls = h.generator.calls();
        let last_history: Vec<&str> = calls[2].1.iter().map(Turn::user_text).collect();
        assert_eq!(last_history, vec!["one", "two"]);
        assert_eq!(h.engine.transcript(&alice()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_raw_policy_stores_unannotated_text() {
        let h = harness_with(FakeGenerator::new("ok"), HistoryPolicy::Raw);
        h.engine.handle_start(CHAT, &alice()).await;

        h.engine.handle_message(message(alice(), "what is rust")).await;

        let calls = h.generator.calls();
        assert!(calls[0].0.contains("Here’s some info I found online"));
        let transcript = h.engine.transcript(&alice()).await.unwrap();
        assert_eq!(transcript.turns()[0].user_text(), "what is rust");
        assert_eq!(transcript.turns()[0].bot_text(), "ok");
    }

    #[tokio::test]
    async fn test_users_have_separate_histories() {
        let h = harness();
        h.engine.handle_start(CHAT, &alice()).await;
        h.engine.handle_start(CHAT, &bob()).await;

        h.engine.handle_message(message(alice(), "alice says hi")).await;
        h.engine.handle_message(message(bob(), "bob says hi")).await;

        let calls = h.generator.calls();
        assert!(calls[1].1.is_empty(), "bob must not see alice's turns");
    }

    #[tokio::test]
    async fn test_upstream_failures_still_reply_and_record() {
        use mockito::Matcher;

        use super::search::QUIET_INTERNET;
        use super::inference::BRAIN_SHORT_CIRCUITED;

        let mut server = mockito::Server::new_async().await;
        let search_mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let inference_mock = server
            .mock("POST", "/models/test")
            .match_body(Matcher::Regex(
                r#"I found online: The internet seems quiet right now! \[/INST\]""#.to_string(),
            ))
            .with_status(500)
            .with_body("overloaded")
            .create_async()
            .await;

        let output = Arc::new(RecordingOutput::default());
        let engine = ChatbotEngine::new(
            ChatbotConfig {
                persona: persona(),
                history_policy: HistoryPolicy::Annotated,
            },
            Arc::new(SearchClient::new(server.url(), Duration::from_secs(5))),
            Arc::new(InferenceClient::new(
                format!("{}/models/test", server.url()),
                "hf",
                persona(),
                Duration::from_secs(5),
            )),
            output.clone(),
        );
        engine.handle_start(CHAT, &alice()).await;
        let sent_before = output.sent().len();

        engine
            .handle_message(message(alice(), "who is the president?"))
            .await;

        search_mock.assert_async().await;
        inference_mock.assert_async().await;

        let sent = output.sent();
        assert_eq!(sent[sent_before..], [(CHAT, BRAIN_SHORT_CIRCUITED.to_string())]);

        let transcript = engine.transcript(&alice()).await.unwrap();
        assert_eq!(transcript.len(), 1);
        let turn = &transcript.turns()[0];
        assert_eq!(
            turn.user_text(),
            annotate_with_search("who is the president?", QUIET_INTERNET)
        );
        assert_eq!(turn.bot_text(), BRAIN_SHORT_CIRCUITED);
    }
}

// =============================================================================
// CONCURRENCY TESTS
// =============================================================================

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn test_reset_waits_for_inflight_reply() {
        let gate = Arc::new(Notify::new());
        let h = harness_with(FakeGenerator::gated("late", gate.clone()), HistoryPolicy::Annotated);
        h.engine.handle_start(CHAT, &alice()).await;

        let engine = h.engine.clone();
        let inflight = tokio::spawn(async move {
            engine.handle_message(message(alice(), "hello")).await;
        });
        h.generator.started.notified().await;

        let engine = h.engine.clone();
        let reset = tokio::spawn(async move {
            engine.handle_reset(CHAT, &alice()).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reset.is_finished(), "reset should wait for the reply");

        gate.notify_one();
        inflight.await.unwrap();
        reset.await.unwrap();

        assert!(h.engine.transcript(&alice()).await.unwrap().is_empty());
        let texts: Vec<String> = h.output.sent().into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts[1..], ["late".to_string(), RESET_CONFIRMATION.to_string()]);
    }

    #[tokio::test]
    async fn test_other_users_are_not_blocked() {
        let gate = Arc::new(Notify::new());
        let h = harness_with(FakeGenerator::gated("late", gate.clone()), HistoryPolicy::Annotated);
        h.engine.handle_start(CHAT, &alice()).await;

        let engine = h.engine.clone();
        let inflight = tokio::spawn(async move {
            engine.handle_message(message(alice(), "hello")).await;
        });
        h.generator.started.notified().await;

        let reset = tokio::time::timeout(
            Duration::from_millis(200),
            h.engine.handle_reset(CHAT, &bob()),
        )
        .await;
        assert!(reset.is_ok());

        gate.notify_one();
        inflight.await.unwrap();
    }
}
