pub mod identity;
pub mod message;
pub mod storage;

pub use identity::{COPILOT_SESSION_KEY, SessionIdentity};
pub use message::{Message, MessageLog, MessageRole};
pub use storage::{
    DisabledSessionStore, FileSessionStore, MemorySessionStore, SessionStore, StorageError,
};
