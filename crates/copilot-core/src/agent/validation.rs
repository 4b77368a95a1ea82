use std::sync::LazyLock;

use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::contracts::{
    AgentReplyEnvelope, AgentRequest, ContractKind, RawAgentAction, contract_schema,
};

#[derive(Debug, Error)]
pub enum ContractValidationError {
    #[error("{} schema failed to compile: {message}", .contract.as_str())]
    SchemaCompile {
        contract: ContractKind,
        message: String,
    },
    #[error("payload failed {} schema validation: {}", .contract.as_str(), .errors.join("; "))]
    SchemaViolation {
        contract: ContractKind,
        errors: Vec<String>,
    },
    #[error("payload does not match {} contract: {source}", .contract.as_str())]
    Deserialize {
        contract: ContractKind,
        source: serde_json::Error,
    },
}

impl ContractValidationError {
    pub fn contract(&self) -> ContractKind {
        match self {
            Self::SchemaCompile { contract, .. }
            | Self::SchemaViolation { contract, .. }
            | Self::Deserialize { contract, .. } => *contract,
        }
    }
}

pub fn validate_request_value(payload: &Value) -> Result<AgentRequest, ContractValidationError> {
    validate_contract(ContractKind::AgentRequest, payload)
}

pub fn validate_reply_value(
    payload: &Value,
) -> Result<AgentReplyEnvelope, ContractValidationError> {
    validate_contract(ContractKind::AgentReply, payload)
}

pub fn validate_action_value(payload: &Value) -> Result<RawAgentAction, ContractValidationError> {
    validate_contract(ContractKind::AgentAction, payload)
}

fn validate_contract<T: DeserializeOwned>(
    contract: ContractKind,
    payload: &Value,
) -> Result<T, ContractValidationError> {
    let validator = validator_for_contract(contract)?;

    if let Err(validation_errors) = validator.validate(payload) {
        let errors = validation_errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(ContractValidationError::SchemaViolation { contract, errors });
    }

    serde_json::from_value(payload.clone())
        .map_err(|source| ContractValidationError::Deserialize { contract, source })
}

static AGENT_REQUEST_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&contract_schema(ContractKind::AgentRequest)).map_err(|err| err.to_string())
});

static AGENT_REPLY_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&contract_schema(ContractKind::AgentReply)).map_err(|err| err.to_string())
});

static AGENT_ACTION_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&contract_schema(ContractKind::AgentAction)).map_err(|err| err.to_string())
});

fn validator_for_contract(
    contract: ContractKind,
) -> Result<&'static JSONSchema, ContractValidationError> {
    let validator_result = match contract {
        ContractKind::AgentRequest => &*AGENT_REQUEST_VALIDATOR,
        ContractKind::AgentReply => &*AGENT_REPLY_VALIDATOR,
        ContractKind::AgentAction => &*AGENT_ACTION_VALIDATOR,
    };

    validator_result
        .as_ref()
        .map_err(|message| ContractValidationError::SchemaCompile {
            contract,
            message: message.clone(),
        })
}
