use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::AgentAction;

/// Client-side navigation seam.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Navigated(String),
    Ignored,
}

#[derive(Clone)]
pub struct ActionDispatcher {
    navigator: Arc<dyn Navigator>,
}

impl ActionDispatcher {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self { navigator }
    }

    pub fn dispatch(&self, action: &AgentAction) -> DispatchOutcome {
        match action {
            AgentAction::Navigate { path: Some(path) } => {
                info!(path = %path, "agent requested navigation");
                self.navigator.navigate(path);
                DispatchOutcome::Navigated(path.clone())
            }
            AgentAction::Navigate { path: None } => {
                debug!("navigate action without a usable path ignored");
                DispatchOutcome::Ignored
            }
            AgentAction::Unknown { kind, .. } => {
                debug!(kind = %kind, "unsupported agent action ignored");
                DispatchOutcome::Ignored
            }
        }
    }
}
