use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{DEFAULT_CONTEXT_PATH, DEFAULT_TEMPERATURE};

pub const NAVIGATE_ACTION: &str = "navigate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    AgentRequest,
    AgentReply,
    AgentAction,
}

impl ContractKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AgentRequest => "agent_request",
            Self::AgentReply => "agent_reply",
            Self::AgentAction => "agent_action",
        }
    }
}

/// Where the user currently is in the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AgentContext {
    #[serde(default = "default_context_path")]
    pub path: String,
}

impl AgentContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for AgentContext {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_PATH)
    }
}

/// Caller-facing request accepted by the gateway before it is shaped for the wire.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentRequest {
    pub prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(
        default,
        rename = "maxTokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<Value>,
    #[serde(default)]
    pub context: AgentContext,
    #[serde(
        default,
        rename = "lastActionContext",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_action_context: Option<Value>,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            response_json_schema: None,
            context: AgentContext::default(),
            last_action_context: None,
        }
    }

    pub fn with_context(mut self, context: AgentContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_response_json_schema(mut self, schema: Value) -> Self {
        self.response_json_schema = Some(schema);
        self
    }

    pub fn with_last_action_context(mut self, last_action_context: Option<Value>) -> Self {
        self.last_action_context = last_action_context;
        self
    }
}

/// Body posted to the agent backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentWireRequest {
    pub message: String,
    pub context: AgentContext,
    #[serde(
        default,
        rename = "lastActionContext",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_action_context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<Value>,
}

/// Reply envelope. The action stays untyped here and is checked on its own so
/// that a bad action never costs the caller the text response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentReplyEnvelope {
    pub response: String,
    #[serde(default)]
    pub action: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawAgentAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    /// `path` is set only when the payload carried a non-empty string path.
    Navigate { path: Option<String> },
    Unknown { kind: String, payload: Option<Value> },
}

impl AgentAction {
    /// Accepts an action only when it is an object whose `type` is a string.
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        let payload = value.get("payload").filter(|payload| !payload.is_null());

        if kind == NAVIGATE_ACTION {
            let path = payload
                .and_then(|payload| payload.get("path"))
                .and_then(Value::as_str)
                .filter(|path| !path.trim().is_empty())
                .map(ToString::to_string);
            return Some(Self::Navigate { path });
        }

        Some(Self::Unknown {
            kind: kind.to_string(),
            payload: payload.cloned(),
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Navigate { .. } => NAVIGATE_ACTION,
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Shape sent back to the backend as `lastActionContext`.
    pub fn to_context_value(&self) -> Value {
        match self {
            Self::Navigate { path: Some(path) } => {
                json!({ "type": NAVIGATE_ACTION, "payload": { "path": path } })
            }
            Self::Navigate { path: None } => json!({ "type": NAVIGATE_ACTION }),
            Self::Unknown {
                kind,
                payload: Some(payload),
            } => json!({ "type": kind, "payload": payload }),
            Self::Unknown {
                kind,
                payload: None,
            } => json!({ "type": kind }),
        }
    }
}

pub fn contract_schema(kind: ContractKind) -> Value {
    let schema = match kind {
        ContractKind::AgentRequest => schema_for!(AgentRequest),
        ContractKind::AgentReply => schema_for!(AgentReplyEnvelope),
        ContractKind::AgentAction => schema_for!(RawAgentAction),
    };
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

fn default_context_path() -> String {
    DEFAULT_CONTEXT_PATH.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
