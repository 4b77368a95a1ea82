use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use copilot_core::actions::{ActionDispatcher, DispatchOutcome, Navigator};
use copilot_core::agent::{
    AGENT_FAILURE_PHRASE, AgentBackend, AgentBackendFuture, AgentContext, AgentGateway,
    AgentGatewayError, AgentWireRequest,
};
use copilot_core::controller::{
    HistorySync, SendOutcome, SendRejection, SessionController, SessionPhase,
};
use copilot_core::history::{
    HISTORY_FAILURE_MESSAGE, HistoryError, HistoryFuture, HistoryLoader, HistoryRecord,
    HistoryService,
};
use copilot_core::session::{
    COPILOT_SESSION_KEY, MemorySessionStore, MessageRole, SessionIdentity, SessionStore,
    StorageError,
};
use serde_json::{Value, json};

type ScriptedReply = (Duration, Result<Value, AgentGatewayError>);
type ScriptedHistory = (Duration, Result<Vec<HistoryRecord>, HistoryError>);

#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    seen_requests: Mutex<Vec<(AgentWireRequest, Option<String>)>>,
}

impl ScriptedBackend {
    fn with_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            seen_requests: Mutex::new(Vec::new()),
        }
    }

    fn seen_requests(&self) -> Vec<(AgentWireRequest, Option<String>)> {
        self.seen_requests.lock().expect("lock").clone()
    }
}

impl AgentBackend for ScriptedBackend {
    fn send<'a>(
        &'a self,
        request: &'a AgentWireRequest,
        session_id: Option<&'a str>,
    ) -> AgentBackendFuture<'a> {
        self.seen_requests
            .lock()
            .expect("lock")
            .push((request.clone(), session_id.map(ToString::to_string)));
        let (delay, reply) = self.replies.lock().expect("lock").pop_front().unwrap_or((
            Duration::ZERO,
            Err(AgentGatewayError::Transport("no scripted reply".to_string())),
        ));

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            reply
        })
    }
}

#[derive(Default)]
struct ScriptedHistoryService {
    loads: Mutex<VecDeque<ScriptedHistory>>,
    seen_session_ids: Mutex<Vec<String>>,
}

impl ScriptedHistoryService {
    fn with_loads(loads: Vec<ScriptedHistory>) -> Self {
        Self {
            loads: Mutex::new(VecDeque::from(loads)),
            seen_session_ids: Mutex::new(Vec::new()),
        }
    }

    fn seen_session_ids(&self) -> Vec<String> {
        self.seen_session_ids.lock().expect("lock").clone()
    }
}

impl HistoryService for ScriptedHistoryService {
    fn fetch<'a>(&'a self, session_id: &'a str, _limit: usize) -> HistoryFuture<'a> {
        self.seen_session_ids
            .lock()
            .expect("lock")
            .push(session_id.to_string());
        let (delay, load) = self
            .loads
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or((Duration::ZERO, Ok(Vec::new())));

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            load
        })
    }
}

#[derive(Default)]
struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn visited(&self) -> Vec<String> {
        self.visited.lock().expect("lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.visited.lock().expect("lock").push(path.to_string());
    }
}

struct Harness {
    controller: SessionController,
    backend: Arc<ScriptedBackend>,
    history: Arc<ScriptedHistoryService>,
    navigator: Arc<RecordingNavigator>,
    store: MemorySessionStore,
}

fn harness(backend: ScriptedBackend, history: ScriptedHistoryService) -> Harness {
    harness_with_store(backend, history, MemorySessionStore::new())
}

fn harness_with_store(
    backend: ScriptedBackend,
    history: ScriptedHistoryService,
    store: MemorySessionStore,
) -> Harness {
    let backend = Arc::new(backend);
    let history = Arc::new(history);
    let navigator = Arc::new(RecordingNavigator::default());

    let controller = SessionController::new(
        AgentGateway::new(backend.clone()),
        HistoryLoader::new(history.clone()),
        ActionDispatcher::new(navigator.clone()),
        SessionIdentity::new(Arc::new(store.clone())),
    );

    Harness {
        controller,
        backend,
        history,
        navigator,
        store,
    }
}

fn reply(body: Value) -> ScriptedReply {
    (Duration::ZERO, Ok(body))
}

fn record(role: MessageRole, content: &str, order: i64) -> HistoryRecord {
    HistoryRecord {
        role,
        content: Some(content.to_string()),
        tool_call_id: None,
        name: None,
        order,
    }
}

#[tokio::test]
async fn establish_reuses_the_stored_session_and_hydrates_it() {
    let store = MemorySessionStore::new();
    store
        .write(COPILOT_SESSION_KEY, "existing-session")
        .expect("seed write");
    let h = harness_with_store(
        ScriptedBackend::default(),
        ScriptedHistoryService::with_loads(vec![(
            Duration::ZERO,
            Ok(vec![
                record(MessageRole::Assistant, "Welcome back.", 2),
                record(MessageRole::User, "Hi", 1),
            ]),
        )]),
        store,
    );

    let sync = h.controller.establish().await;

    assert!(matches!(sync, HistorySync::Loaded { messages: 2 }));
    assert_eq!(h.controller.session_id().as_deref(), Some("existing-session"));
    assert_eq!(h.history.seen_session_ids(), vec!["existing-session".to_string()]);

    let texts = h
        .controller
        .messages()
        .iter()
        .map(|m| m.text().to_string())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["Hi", "Welcome back."]);
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn empty_history_leaves_an_empty_transcript_and_is_loaded_once() {
    let h = harness(ScriptedBackend::default(), ScriptedHistoryService::default());

    assert!(matches!(
        h.controller.establish().await,
        HistorySync::Loaded { messages: 0 }
    ));
    assert!(h.controller.messages().is_empty());
    assert!(!h.controller.is_loading());

    let session_id = h.controller.session_id().expect("session should exist");
    assert_eq!(
        h.store.read(COPILOT_SESSION_KEY).expect("read"),
        Some(session_id)
    );

    assert!(matches!(h.controller.establish().await, HistorySync::Unchanged));
    assert_eq!(h.history.seen_session_ids().len(), 1);
}

#[tokio::test]
async fn failed_history_load_shows_exactly_one_error_turn() {
    let h = harness(
        ScriptedBackend::default(),
        ScriptedHistoryService::with_loads(vec![(
            Duration::ZERO,
            Err(HistoryError::Status { status: 503 }),
        )]),
    );

    let sync = h.controller.establish().await;

    assert!(matches!(
        sync,
        HistorySync::Failed(HistoryError::Status { status: 503 })
    ));
    let messages = h.controller.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::Assistant);
    assert_eq!(messages[0].text(), HISTORY_FAILURE_MESSAGE);
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn blank_messages_are_rejected_without_a_request() {
    let h = harness(ScriptedBackend::default(), ScriptedHistoryService::default());
    h.controller.establish().await;

    let outcome = h.controller.send_message("  \n\t", AgentContext::default()).await;

    assert!(matches!(
        outcome,
        SendOutcome::Rejected(SendRejection::EmptyMessage)
    ));
    assert!(h.controller.messages().is_empty());
    assert!(h.backend.seen_requests().is_empty());
}

#[tokio::test]
async fn concurrent_sends_are_single_flight() {
    let h = harness(
        ScriptedBackend::with_replies(vec![(
            Duration::from_millis(50),
            Ok(json!({ "response": "Here you go." })),
        )]),
        ScriptedHistoryService::default(),
    );
    h.controller.establish().await;

    let (first, second) = tokio::join!(
        h.controller.send_message("first", AgentContext::default()),
        h.controller.send_message("second", AgentContext::default()),
    );

    assert!(matches!(first, SendOutcome::Completed { .. }));
    assert!(matches!(
        second,
        SendOutcome::Rejected(SendRejection::Busy)
    ));
    assert_eq!(h.backend.seen_requests().len(), 1);

    let turns = h
        .controller
        .messages()
        .iter()
        .map(|m| (m.role, m.text().to_string()))
        .collect::<Vec<_>>();
    assert_eq!(
        turns,
        vec![
            (MessageRole::User, "first".to_string()),
            (MessageRole::Assistant, "Here you go.".to_string()),
        ]
    );
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn send_while_history_is_loading_is_a_no_op() {
    let h = harness(
        ScriptedBackend::with_replies(vec![reply(json!({ "response": "unused" }))]),
        ScriptedHistoryService::with_loads(vec![(
            Duration::from_millis(60),
            Ok(vec![record(MessageRole::User, "earlier", 1)]),
        )]),
    );

    let (sync, sent) = tokio::join!(h.controller.establish(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.controller.is_loading());
        h.controller
            .send_message("too early", AgentContext::default())
            .await
    });

    assert!(matches!(sent, SendOutcome::Rejected(SendRejection::Busy)));
    assert!(matches!(sync, HistorySync::Loaded { messages: 1 }));
    assert!(h.backend.seen_requests().is_empty());

    let texts = h
        .controller
        .messages()
        .iter()
        .map(|m| m.text().to_string())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["earlier"]);
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn unwritable_storage_keeps_the_session_across_establish_calls() {
    struct ReadOnlyStore;

    impl SessionStore for ReadOnlyStore {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only data dir".to_string()))
        }
    }

    let backend = Arc::new(ScriptedBackend::with_replies(vec![reply(
        json!({ "response": "hello" }),
    )]));
    let history = Arc::new(ScriptedHistoryService::default());
    let controller = SessionController::new(
        AgentGateway::new(backend.clone()),
        HistoryLoader::new(history.clone()),
        ActionDispatcher::new(Arc::new(RecordingNavigator::default())),
        SessionIdentity::new(Arc::new(ReadOnlyStore)),
    );

    controller.establish().await;
    let first = controller.session_id();
    controller.send_message("hi", AgentContext::default()).await;
    assert_eq!(controller.messages().len(), 2);

    let sync = controller.establish().await;

    assert!(matches!(sync, HistorySync::Unchanged));
    assert_eq!(controller.session_id(), first);
    assert_eq!(controller.messages().len(), 2);
    assert_eq!(history.seen_session_ids().len(), 1);
}

#[tokio::test]
async fn send_carries_session_header_and_page_context() {
    let h = harness(
        ScriptedBackend::with_replies(vec![reply(json!({ "response": "ok" }))]),
        ScriptedHistoryService::default(),
    );

    // No explicit establish: sending establishes the session first.
    h.controller
        .send_message("Where am I?", AgentContext::new("/settings/billing"))
        .await;

    let session_id = h.controller.session_id().expect("session should exist");
    let seen = h.backend.seen_requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1.as_deref(), Some(session_id.as_str()));
    assert_eq!(seen[0].0.message, "Where am I?");
    assert_eq!(seen[0].0.context.path, "/settings/billing");
    assert_eq!(h.history.seen_session_ids(), vec![session_id]);
}

#[tokio::test]
async fn unreachable_backend_appends_error_turn_and_recovers() {
    let h = harness(
        ScriptedBackend::with_replies(vec![
            (
                Duration::ZERO,
                Err(AgentGatewayError::Transport("backend unreachable".to_string())),
            ),
            reply(json!({ "response": "Back online." })),
        ]),
        ScriptedHistoryService::default(),
    );
    h.controller.establish().await;

    let outcome = h.controller.send_message("hello", AgentContext::default()).await;
    let agent_outcome = outcome.agent_outcome().expect("send should complete");
    assert!(agent_outcome.is_failure());
    assert!(h.navigator.visited().is_empty());

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert!(messages[1].text().contains(AGENT_FAILURE_PHRASE));
    assert!(!h.controller.is_loading());

    let retry = h.controller.send_message("hello again", AgentContext::default()).await;
    assert!(matches!(retry, SendOutcome::Completed { .. }));
    assert_eq!(h.controller.messages().len(), 4);
}

#[tokio::test]
async fn navigate_action_moves_the_client_once_and_is_remembered() {
    let h = harness(
        ScriptedBackend::with_replies(vec![
            reply(json!({
                "response": "Taking you to campaigns.",
                "action": { "type": "navigate", "payload": { "path": "/campaigns" } }
            })),
            reply(json!({ "response": "These are your campaigns." })),
        ]),
        ScriptedHistoryService::default(),
    );
    h.controller.establish().await;

    let outcome = h
        .controller
        .send_message("Show my campaigns", AgentContext::new("/dashboard"))
        .await;

    match outcome {
        SendOutcome::Completed { dispatch, .. } => {
            assert_eq!(
                dispatch,
                Some(DispatchOutcome::Navigated("/campaigns".to_string()))
            );
        }
        other => panic!("expected completed send, got {other:?}"),
    }
    assert_eq!(h.navigator.visited(), vec!["/campaigns".to_string()]);

    let expected_context = json!({ "type": "navigate", "payload": { "path": "/campaigns" } });
    assert_eq!(h.controller.last_action_context(), Some(expected_context.clone()));

    h.controller
        .send_message("What's here?", AgentContext::new("/campaigns"))
        .await;

    let seen = h.backend.seen_requests();
    assert_eq!(seen[0].0.last_action_context, None);
    assert_eq!(seen[1].0.last_action_context, Some(expected_context));
    assert_eq!(h.navigator.visited().len(), 1);
}

#[tokio::test]
async fn rapid_new_conversations_settle_on_the_latest_session() {
    let h = harness(
        ScriptedBackend::default(),
        ScriptedHistoryService::with_loads(vec![
            (Duration::ZERO, Ok(Vec::new())),
            (
                Duration::from_millis(60),
                Ok(vec![record(MessageRole::User, "stale turn", 1)]),
            ),
            (Duration::ZERO, Ok(Vec::new())),
        ]),
    );
    h.controller.establish().await;
    let original = h.controller.session_id().expect("session should exist");

    let (first, second) = tokio::join!(
        h.controller.start_new_conversation(),
        h.controller.start_new_conversation(),
    );

    assert!(matches!(first, HistorySync::Superseded));
    assert!(matches!(second, HistorySync::Loaded { messages: 0 }));

    let latest = h.controller.session_id().expect("session should exist");
    let requested = h.history.seen_session_ids();
    assert_eq!(requested.len(), 3);
    assert_eq!(requested[2], latest);
    assert_ne!(latest, original);
    assert_ne!(requested[1], latest);

    assert!(h.controller.messages().is_empty());
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
    assert_eq!(
        h.store.read(COPILOT_SESSION_KEY).expect("read"),
        Some(latest)
    );
}

#[tokio::test]
async fn reply_arriving_after_a_new_conversation_is_discarded() {
    let h = harness(
        ScriptedBackend::with_replies(vec![(
            Duration::from_millis(60),
            Ok(json!({
                "response": "Late reply.",
                "action": { "type": "navigate", "payload": { "path": "/late" } }
            })),
        )]),
        ScriptedHistoryService::default(),
    );
    h.controller.establish().await;

    let (sent, _) = tokio::join!(
        h.controller.send_message("slow question", AgentContext::default()),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.controller.start_new_conversation().await
        },
    );

    assert!(matches!(sent, SendOutcome::Superseded(_)));
    assert!(h.controller.messages().is_empty());
    assert!(h.navigator.visited().is_empty());
    assert_eq!(h.controller.last_action_context(), None);
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn new_conversation_forgets_the_last_action() {
    let h = harness(
        ScriptedBackend::with_replies(vec![reply(json!({
            "response": "Done.",
            "action": { "type": "navigate", "payload": { "path": "/alerts" } }
        }))]),
        ScriptedHistoryService::default(),
    );
    h.controller.establish().await;
    h.controller.send_message("Show alerts", AgentContext::default()).await;
    assert!(h.controller.last_action_context().is_some());

    h.controller.start_new_conversation().await;

    assert_eq!(h.controller.last_action_context(), None);
    assert!(h.controller.messages().is_empty());
}

#[tokio::test]
async fn panel_visibility_is_independent_of_the_conversation() {
    let h = harness(ScriptedBackend::default(), ScriptedHistoryService::default());

    assert!(!h.controller.is_panel_open());
    h.controller.open_panel();
    assert!(h.controller.is_panel_open());
    assert!(!h.controller.toggle_panel());
    assert!(h.controller.toggle_panel());
    h.controller.close_panel();
    assert!(!h.controller.is_panel_open());

    h.controller.save_conversation("weekly");
    h.controller.load_conversation("weekly");
    h.controller.delete_conversation("weekly");

    let snapshot = h.controller.snapshot();
    assert!(!snapshot.panel_open);
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.session_id, None);
}
