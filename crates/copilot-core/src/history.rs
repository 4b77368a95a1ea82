use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::session::{Message, MessageRole};

pub const SESSION_ID_HEADER: &str = "X-Session-ID";
pub const HISTORY_PAGE_LIMIT: usize = 50;
pub const HISTORY_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't load this conversation's history. You can keep chatting or start a new conversation.";

pub type HistoryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<HistoryRecord>, HistoryError>> + Send + 'a>>;

/// One persisted turn as returned by the history service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub order: i64,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("session id must not be empty")]
    EmptySessionId,
    #[error("history request failed: {0}")]
    Transport(String),
    #[error("history service responded with status {status}")]
    Status { status: u16 },
    #[error("history service returned an invalid payload: {0}")]
    InvalidPayload(String),
}

pub trait HistoryService: Send + Sync {
    fn fetch<'a>(&'a self, session_id: &'a str, limit: usize) -> HistoryFuture<'a>;
}

#[derive(Clone)]
pub struct HttpHistoryService {
    client: reqwest::Client,
    history_url: Url,
}

impl HttpHistoryService {
    pub fn new(client: reqwest::Client, history_url: Url) -> Self {
        Self {
            client,
            history_url,
        }
    }
}

impl HistoryService for HttpHistoryService {
    fn fetch<'a>(&'a self, session_id: &'a str, limit: usize) -> HistoryFuture<'a> {
        Box::pin(async move {
            let limit = limit.to_string();
            let response = self
                .client
                .get(self.history_url.clone())
                .header(SESSION_ID_HEADER, session_id)
                .query(&[("sessionId", session_id), ("limit", limit.as_str())])
                .send()
                .await
                .map_err(|err| HistoryError::Transport(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(HistoryError::Status {
                    status: status.as_u16(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|err| HistoryError::Transport(err.to_string()))?;

            serde_json::from_str::<Vec<HistoryRecord>>(&body)
                .map_err(|err| HistoryError::InvalidPayload(err.to_string()))
        })
    }
}

/// Result of hydrating a session: the messages to install and, when the
/// fetch failed, why it failed.
#[derive(Debug)]
pub struct HistoryLoad {
    pub messages: Vec<Message>,
    pub error: Option<HistoryError>,
}

#[derive(Clone)]
pub struct HistoryLoader {
    service: Arc<dyn HistoryService>,
}

impl HistoryLoader {
    pub fn new(service: Arc<dyn HistoryService>) -> Self {
        Self { service }
    }

    pub async fn fetch_messages(&self, session_id: &str) -> Result<Vec<Message>, HistoryError> {
        if session_id.trim().is_empty() {
            return Err(HistoryError::EmptySessionId);
        }

        let records = self.service.fetch(session_id, HISTORY_PAGE_LIMIT).await?;
        debug!(
            session_id = %session_id,
            records = records.len(),
            "history fetched"
        );
        Ok(records_to_messages(records))
    }

    /// Never fails: a failed fetch becomes a single assistant turn explaining
    /// that history is unavailable.
    pub async fn load(&self, session_id: &str) -> HistoryLoad {
        match self.fetch_messages(session_id).await {
            Ok(messages) => HistoryLoad {
                messages,
                error: None,
            },
            Err(err) => {
                warn!(session_id = %session_id, "history load failed: {err}");
                HistoryLoad {
                    messages: vec![Message::assistant(HISTORY_FAILURE_MESSAGE)],
                    error: Some(err),
                }
            }
        }
    }
}

pub fn records_to_messages(mut records: Vec<HistoryRecord>) -> Vec<Message> {
    // Stable, so records sharing an order value keep the service's ordering.
    records.sort_by_key(|record| record.order);

    records
        .into_iter()
        .map(|record| {
            let content = match record.content {
                None if record.role.is_conversational() => Some(String::new()),
                content => content,
            };
            Message::new(record.role, content).with_tool_call(record.tool_call_id, record.name)
        })
        .collect()
}
