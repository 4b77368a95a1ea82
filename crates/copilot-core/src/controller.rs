use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::actions::{ActionDispatcher, DispatchOutcome};
use crate::agent::{AgentContext, AgentGateway, AgentOutcome, AgentRequest};
use crate::config::DEFAULT_TEMPERATURE;
use crate::history::{HistoryError, HistoryLoader};
use crate::session::{Message, MessageLog, SessionIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingHistory,
    Sending,
}

impl SessionPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingHistory => "awaiting_history",
            Self::Sending => "sending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyMessage,
    Busy,
}

#[derive(Debug)]
pub enum SendOutcome {
    Rejected(SendRejection),
    Completed {
        outcome: AgentOutcome,
        dispatch: Option<DispatchOutcome>,
    },
    /// The conversation changed while the request was in flight; the reply
    /// was not added to the transcript.
    Superseded(AgentOutcome),
}

impl SendOutcome {
    pub fn agent_outcome(&self) -> Option<&AgentOutcome> {
        match self {
            Self::Rejected(_) => None,
            Self::Completed { outcome, .. } | Self::Superseded(outcome) => Some(outcome),
        }
    }
}

#[derive(Debug)]
pub enum HistorySync {
    /// History for the current session id was already loaded or requested.
    Unchanged,
    Loaded { messages: usize },
    Failed(HistoryError),
    /// A newer session change replaced this load before it finished.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub messages: Vec<Message>,
    pub phase: SessionPhase,
    pub is_loading: bool,
    pub panel_open: bool,
}

struct ControllerState {
    identity: SessionIdentity,
    session_id: Option<String>,
    loaded_session_id: Option<String>,
    log: MessageLog,
    phase: SessionPhase,
    panel_open: bool,
    // Bumped on every session change; in-flight work from an older epoch is dropped.
    epoch: u64,
    last_action_context: Option<Value>,
}

/// Owns the single active conversation of a client.
///
/// All methods take `&self` so several futures can drive one controller; the
/// state lock is never held across an `.await`.
pub struct SessionController {
    gateway: AgentGateway,
    history: HistoryLoader,
    dispatcher: ActionDispatcher,
    temperature: f64,
    state: Mutex<ControllerState>,
}

impl SessionController {
    pub fn new(
        gateway: AgentGateway,
        history: HistoryLoader,
        dispatcher: ActionDispatcher,
        identity: SessionIdentity,
    ) -> Self {
        Self {
            gateway,
            history,
            dispatcher,
            temperature: DEFAULT_TEMPERATURE,
            state: Mutex::new(ControllerState {
                identity,
                session_id: None,
                loaded_session_id: None,
                log: MessageLog::new(),
                phase: SessionPhase::Idle,
                panel_open: false,
                epoch: 0,
                last_action_context: None,
            }),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the durable session id and hydrates the transcript for it.
    pub async fn establish(&self) -> HistorySync {
        {
            let mut state = self.state();
            let session_id = state.identity.acquire();
            info!(session_id = %session_id, "session established");
            state.session_id = Some(session_id);
        }
        self.sync_history().await
    }

    /// Loads history when the session id differs from the last one loaded.
    pub async fn sync_history(&self) -> HistorySync {
        let (session_id, epoch) = {
            let mut state = self.state();
            let Some(session_id) = state.session_id.clone() else {
                return HistorySync::Unchanged;
            };
            if state.loaded_session_id.as_deref() == Some(session_id.as_str()) {
                return HistorySync::Unchanged;
            }

            state.epoch += 1;
            state.phase = SessionPhase::AwaitingHistory;
            state.loaded_session_id = Some(session_id.clone());
            (session_id, state.epoch)
        };

        let load = self.history.load(&session_id).await;

        let mut state = self.state();
        if state.epoch != epoch {
            debug!(session_id = %session_id, "discarding history for a superseded session");
            return HistorySync::Superseded;
        }

        let messages = load.messages.len();
        state.log.replace_all(load.messages);
        state.phase = SessionPhase::Idle;

        match load.error {
            Some(err) => HistorySync::Failed(err),
            None => HistorySync::Loaded { messages },
        }
    }

    pub async fn send_message(&self, text: &str, context: AgentContext) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Rejected(SendRejection::EmptyMessage);
        }

        if self.session_id().is_none() {
            self.establish().await;
        }

        let (session_id, epoch, last_action_context) = {
            let mut state = self.state();
            if state.phase != SessionPhase::Idle {
                debug!(phase = state.phase.as_str(), "send ignored while busy");
                return SendOutcome::Rejected(SendRejection::Busy);
            }

            state.log.append(Message::user(text));
            state.phase = SessionPhase::Sending;
            (
                state.session_id.clone(),
                state.epoch,
                state.last_action_context.clone(),
            )
        };

        let request = AgentRequest::new(text)
            .with_context(context)
            .with_temperature(self.temperature)
            .with_last_action_context(last_action_context);
        let outcome = self.gateway.invoke(request, session_id.as_deref()).await;

        {
            let mut state = self.state();
            if state.epoch != epoch {
                debug!("discarding agent reply for a superseded conversation");
                return SendOutcome::Superseded(outcome);
            }

            state.log.append(Message::assistant(outcome.text_response.clone()));
            if let Some(action) = &outcome.action {
                state.last_action_context = Some(action.to_context_value());
            }
        }

        let dispatch = outcome
            .action
            .as_ref()
            .map(|action| self.dispatcher.dispatch(action));

        let mut state = self.state();
        if state.epoch == epoch {
            state.phase = SessionPhase::Idle;
        }
        drop(state);

        SendOutcome::Completed { outcome, dispatch }
    }

    /// Rotates the session id, clears the transcript, then hydrates the new session.
    pub async fn start_new_conversation(&self) -> HistorySync {
        {
            let mut state = self.state();
            let session_id = state.identity.rotate();
            info!(session_id = %session_id, "started new conversation");
            state.session_id = Some(session_id);
            state.log.clear();
            state.last_action_context = None;
            state.epoch += 1;
            state.phase = SessionPhase::Idle;
        }
        self.sync_history().await
    }

    pub fn open_panel(&self) {
        self.state().panel_open = true;
    }

    pub fn close_panel(&self) {
        self.state().panel_open = false;
    }

    pub fn toggle_panel(&self) -> bool {
        let mut state = self.state();
        state.panel_open = !state.panel_open;
        state.panel_open
    }

    pub fn is_panel_open(&self) -> bool {
        self.state().panel_open
    }

    pub fn save_conversation(&self, name: &str) {
        warn!(name = %name, "saving conversations by name is not supported");
    }

    pub fn load_conversation(&self, name: &str) {
        warn!(name = %name, "loading conversations by name is not supported");
    }

    pub fn delete_conversation(&self, name: &str) {
        warn!(name = %name, "deleting conversations by name is not supported");
    }

    pub fn session_id(&self) -> Option<String> {
        self.state().session_id.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase() != SessionPhase::Idle
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().log.to_vec()
    }

    pub fn last_action_context(&self) -> Option<Value> {
        self.state().last_action_context.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            session_id: state.session_id.clone(),
            messages: state.log.to_vec(),
            phase: state.phase,
            is_loading: state.phase != SessionPhase::Idle,
            panel_open: state.panel_open,
        }
    }
}
