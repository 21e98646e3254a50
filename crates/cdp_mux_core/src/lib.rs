//! CDP Mux Core
//!
//! Presents a single Chrome DevTools Protocol session to a front-end client while fanning
//! commands out to any number of backend execution contexts. Provides the command router,
//! breakpoint synchronization across a dynamic connection set, the attach handshake, and
//! event forwarding back to the client.

pub mod backend;
pub mod breakpoints;
pub mod config;
pub mod connections;
pub mod dispose;
pub mod error;
pub mod events;
pub mod fanout;
pub mod paths;
pub mod prelude;
pub mod router;
pub mod sink;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use backend::{BackendConnection, BackendEvent, BackendReply, ConnectionId, Connector, DeviceInfo};
pub use config::MuxConfig;
pub use error::MuxError;
pub use paths::{PathTranslator, RootTranslator};
pub use router::Router;
pub use sink::{ChannelSink, ClientSink};
pub use types::{ClientMessage, RawMessage};

/// Result type alias using MuxError
pub type Result<T> = std::result::Result<T, MuxError>;
