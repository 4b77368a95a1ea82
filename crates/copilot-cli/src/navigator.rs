use std::sync::{Mutex, PoisonError};

use copilot_core::actions::Navigator;

/// Tracks the page the terminal user is "on". Navigation actions move it and
/// every outgoing message reports it as `context.path`.
pub struct TerminalNavigator {
    current: Mutex<String>,
}

impl TerminalNavigator {
    pub fn new(start_path: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(start_path.into()),
        }
    }

    pub fn current_path(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_path(&self, path: impl Into<String>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = path.into();
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, path: &str) {
        self.set_path(path);
        println!("-> navigated to {path}");
    }
}
