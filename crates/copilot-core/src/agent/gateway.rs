use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::contracts::{AgentAction, AgentRequest, AgentWireRequest, ContractKind};
use super::prompts::build_agent_message;
use super::validation::{
    ContractValidationError, validate_action_value, validate_reply_value, validate_request_value,
};

pub const AGENT_FAILURE_PHRASE: &str = "Sorry, I couldn't get a response from the assistant.";

pub type AgentBackendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Value, AgentGatewayError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum AgentGatewayError {
    #[error("agent request is invalid: {0}")]
    InvalidRequest(#[source] ContractValidationError),
    #[error("agent backend request failed: {0}")]
    Transport(String),
    #[error("agent backend responded with status {status}")]
    Status { status: u16 },
    #[error("agent backend returned an invalid reply: {0}")]
    InvalidReply(String),
}

impl AgentGatewayError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::InvalidReply(_) => "invalid_reply",
        }
    }
}

/// Transport to the remote agent. Returns the raw JSON reply; shape checks
/// belong to [`AgentGateway`].
pub trait AgentBackend: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a AgentWireRequest,
        session_id: Option<&'a str>,
    ) -> AgentBackendFuture<'a>;
}

/// What the caller gets back from the gateway. Always well formed: on failure
/// `text_response` carries a readable error and `failure` says what went wrong.
#[derive(Debug)]
pub struct AgentOutcome {
    pub text_response: String,
    pub json_response: Option<Value>,
    pub action: Option<AgentAction>,
    pub failure: Option<AgentGatewayError>,
}

impl AgentOutcome {
    fn failed(err: AgentGatewayError) -> Self {
        Self {
            text_response: format!("{AGENT_FAILURE_PHRASE} Please try again. ({err})"),
            json_response: None,
            action: None,
            failure: Some(err),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Clone)]
pub struct AgentGateway {
    backend: Arc<dyn AgentBackend>,
}

impl AgentGateway {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self { backend }
    }

    pub async fn invoke(&self, request: AgentRequest, session_id: Option<&str>) -> AgentOutcome {
        // Non-finite numbers serialize to null and are caught by the schema.
        match serde_json::to_value(&request) {
            Ok(payload) => self.invoke_value(payload, session_id).await,
            Err(err) => AgentOutcome::failed(AgentGatewayError::InvalidRequest(
                ContractValidationError::Deserialize {
                    contract: ContractKind::AgentRequest,
                    source: err,
                },
            )),
        }
    }

    /// Entry point for loosely typed input; the payload is validated before
    /// anything is sent.
    pub async fn invoke_value(&self, payload: Value, session_id: Option<&str>) -> AgentOutcome {
        match self.try_invoke(&payload, session_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(kind = err.kind(), "agent request failed: {err}");
                AgentOutcome::failed(err)
            }
        }
    }

    async fn try_invoke(
        &self,
        payload: &Value,
        session_id: Option<&str>,
    ) -> Result<AgentOutcome, AgentGatewayError> {
        let request = validate_request_value(payload).map_err(AgentGatewayError::InvalidRequest)?;
        let wants_json = request.response_json_schema.is_some();

        let wire_request = AgentWireRequest {
            message: build_agent_message(&request.prompt, request.response_json_schema.as_ref()),
            context: request.context,
            last_action_context: request.last_action_context,
            response_json_schema: request.response_json_schema,
        };

        debug!(
            prompt_chars = request.prompt.chars().count(),
            temperature = request.temperature,
            max_tokens = ?request.max_tokens,
            wants_json,
            "sending agent request"
        );

        let raw_reply = self.backend.send(&wire_request, session_id).await?;
        let envelope = validate_reply_value(&raw_reply)
            .map_err(|err| AgentGatewayError::InvalidReply(err.to_string()))?;

        let action = envelope.action.as_ref().and_then(extract_action);
        let json_response = if wants_json {
            parse_json_response(&envelope.response)
        } else {
            None
        };

        Ok(AgentOutcome {
            text_response: envelope.response,
            json_response,
            action,
            failure: None,
        })
    }
}

fn extract_action(raw_action: &Value) -> Option<AgentAction> {
    if raw_action.is_null() {
        return None;
    }

    if let Err(err) = validate_action_value(raw_action) {
        warn!("dropping malformed agent action: {err}");
        return None;
    }

    AgentAction::from_value(raw_action)
}

fn parse_json_response(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("agent reply is not valid json despite a response schema: {err}");
            None
        }
    }
}
