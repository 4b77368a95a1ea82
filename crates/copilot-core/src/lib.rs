pub mod actions;
pub mod agent;
pub mod config;
mod config_env;
pub mod controller;
pub mod history;
pub mod session;

pub use actions::{ActionDispatcher, DispatchOutcome, Navigator};
pub use agent::{
    AGENT_FAILURE_PHRASE, AgentAction, AgentBackend, AgentContext, AgentGateway,
    AgentGatewayError, AgentOutcome, AgentRequest, HttpAgentBackend,
};
pub use config::{ClientConfig, ConfigError, SessionStorageMode};
pub use controller::{
    HistorySync, SendOutcome, SendRejection, SessionController, SessionPhase, SessionSnapshot,
};
pub use history::{
    HISTORY_FAILURE_MESSAGE, HistoryError, HistoryLoad, HistoryLoader, HistoryRecord,
    HistoryService, HttpHistoryService,
};
pub use session::{
    DisabledSessionStore, FileSessionStore, MemorySessionStore, Message, MessageLog, MessageRole,
    SessionIdentity, SessionStore, StorageError,
};
