pub mod contracts;
pub mod gateway;
pub mod http;
pub mod prompts;
pub mod validation;

pub use contracts::{
    AgentAction, AgentContext, AgentReplyEnvelope, AgentRequest, AgentWireRequest, ContractKind,
    NAVIGATE_ACTION, RawAgentAction, contract_schema,
};
pub use gateway::{
    AGENT_FAILURE_PHRASE, AgentBackend, AgentBackendFuture, AgentGateway, AgentGatewayError,
    AgentOutcome,
};
pub use http::HttpAgentBackend;
pub use prompts::build_agent_message;
pub use validation::{
    ContractValidationError, validate_action_value, validate_reply_value, validate_request_value,
};
