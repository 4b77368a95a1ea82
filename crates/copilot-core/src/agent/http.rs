use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use url::Url;

use super::contracts::AgentWireRequest;
use super::gateway::{AgentBackend, AgentBackendFuture, AgentGatewayError};
use crate::config::ConfigError;
use crate::history::SESSION_ID_HEADER;

/// Agent backend reached with a single JSON POST per request.
#[derive(Clone)]
pub struct HttpAgentBackend {
    client: reqwest::Client,
    agent_url: Url,
}

impl HttpAgentBackend {
    pub fn new(agent_url: Url, timeout: Option<Duration>) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, agent_url })
    }

    pub fn with_client(client: reqwest::Client, agent_url: Url) -> Self {
        Self { client, agent_url }
    }
}

impl AgentBackend for HttpAgentBackend {
    fn send<'a>(
        &'a self,
        request: &'a AgentWireRequest,
        session_id: Option<&'a str>,
    ) -> AgentBackendFuture<'a> {
        Box::pin(async move {
            let mut http_request = self.client.post(self.agent_url.clone()).json(request);
            if let Some(session_id) = session_id {
                http_request = http_request.header(SESSION_ID_HEADER, session_id);
            }

            let response = http_request.send().await.map_err(|err| {
                if err.is_timeout() {
                    AgentGatewayError::Transport("request timed out".to_string())
                } else {
                    AgentGatewayError::Transport("backend unreachable".to_string())
                }
            })?;

            let status = response.status();
            let body = response.text().await.map_err(|_| {
                AgentGatewayError::InvalidReply("response body could not be read".to_string())
            })?;

            if !status.is_success() {
                debug!(status = status.as_u16(), body_bytes = body.len(), "agent backend error");
                return Err(AgentGatewayError::Status {
                    status: status.as_u16(),
                });
            }

            serde_json::from_str::<Value>(&body).map_err(|_| {
                AgentGatewayError::InvalidReply("response body is not json".to_string())
            })
        })
    }
}
