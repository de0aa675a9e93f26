//! OpenCode backend adapter.
//!
//! - [`client`]: request/response API ([`OpenCodeClient`])
//! - [`event_stream`]: the `GET /event` subscription with reconnect
//! - [`protocol`]: request bodies and stream line framing

pub mod client;
pub mod event_stream;
pub mod protocol;

pub use client::{OpenCodeClient, OpenCodeConnector};
pub use event_stream::{EventStreamClient, EventStreamConfig, StreamError};
