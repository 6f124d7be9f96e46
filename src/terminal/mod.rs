//! Remote terminal service integration module
//!
//! Handles the terminal REST API, the per-session WebSocket channel, the
//! session lifecycle and the manager tracking running terminals.

pub mod channel;
pub mod events;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod rest;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use channel::{ChannelEvent, TerminalChannel};
pub use events::EventBus;
pub use manager::{ManagerOptions, TerminalManager};
pub use registry::SessionRegistry;
pub use rest::TerminalRestClient;
pub use session::{PendingConnection, TerminalSession, create_session};
pub use types::*;
