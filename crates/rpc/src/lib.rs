//! Framed JSON transport and request correlation for the ENSIME protocol.
//!
//! This crate provides the protocol-level primitives the editor client is built on:
//! * [`Transport`]: a single connection to the analysis server, driven by a tokio I/O pump
//! * [`FrameCodec`]: length-prefixed framing with partial-frame buffering
//! * [`CorrelationRegistry`]: pending-request table keyed by [`CallId`]
//! * [`Request`], [`Inbound`], [`Payload`]: the JSON message model

#![warn(missing_docs)]

pub mod codec;
pub mod correlation;
pub mod error;
pub mod message;
pub mod transport;

pub use codec::{CodecError, FrameCodec, MAX_FRAME_LEN};
pub use correlation::{CallId, CallIdGen, CorrelationRegistry, PendingRequest};
pub use error::{Error, Result, ServerError};
pub use message::{Event, Inbound, Payload, Request, Response};
pub use transport::{
	Connection, DisconnectReason, Endpoint, ServerCommand, Transport, TransportEvent, connect,
};
