//! The CDP transport and message demultiplexer (§4.B, §4.C).
//!
//! Everything above this module (the session engine) speaks in terms of
//! [`CdpEvent`]/[`ResultItem`] and the [`TransportHandle`] it is given at
//! session creation; it never touches a raw WebSocket frame.

mod error;
mod transport;
mod types;

pub use error::CdpError;
pub use transport::{TransportCommand, TransportHandle, spawn_transport};
pub use types::{CdpCommand, CdpEvent, CdpProtocolError, ResultItem};
