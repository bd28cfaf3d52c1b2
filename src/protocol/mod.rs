//! BaseX client-server wire protocol.
//!
//! This module implements the byte-level half of the client: framing, the login handshake,
//! request serialization, and the background dispatcher that hands replies back to callers.
//! The public facade ([`Connection`](crate::Connection), [`Session`](crate::Session),
//! [`Query`](crate::Query)) is a thin layer over these pieces.
//!
//! # Overview
//!
//! A connection is a single ordered TCP stream. Requests may be pipelined: the client writes
//! any number of requests without waiting, and the server answers them one after another in
//! the same order. There are no request identifiers on the wire, so correlation is purely
//! positional and handled by the [`Dispatcher`].
//!
//! # Key Components
//!
//! - [`FrameReader`]: Decodes one framed message at a time from the raw stream.
//! - [`Request`]: Serializes session and query commands into framed requests.
//! - [`Handshake`]: Runs the challenge-response login before any other traffic.
//! - [`Dispatcher`]: Owns the receive side and resolves [`Waiter`]s in FIFO order.
//!
//! # Binary Format
//!
//! Messages have no length prefix; they end at a terminator byte:
//!
//! - `0x00` ends a successful reply (and separates request fields).
//! - `0x01` ends an error reply; the body is the server's error message.
//! - `0xFF` escapes the byte that follows it, so `FF 00`, `FF 01` and `FF FF` carry the
//!   literal bytes `00`, `01` and `FF` inside a body.
//!
//! Requests start with a one-byte [`Opcode`] (plain commands have none) followed by
//! null-terminated fields. Only resource bodies are escaped; the server reads every other
//! field as plain text. Some query commands answer with an extra `0x00` after a successful
//! reply; see [`ReplyKind::DoubleTerminated`].
//!
//! # See Also
//!
//! - [`session`](crate::session): Administrative commands built on this layer.
//! - [`query`](crate::query): Commands addressing a compiled query.
pub mod auth;
mod dispatcher;
mod request;
mod response;
mod transport;

pub use auth::{Challenge, Credentials, Handshake, md5_hex};
pub use dispatcher::{Dispatcher, Phase, Waiter};
pub use request::{Opcode, ReplyKind, Request};
pub use response::{Reply, Status};
pub use transport::{Frame, FrameReader, TransportError, escape, escape_into};

/// Terminates a successful message and separates request fields.
pub const TERM_OK: u8 = 0x00;

/// Terminates an error message.
pub const TERM_ERR: u8 = 0x01;

/// Makes the following byte literal inside a message body.
pub const ESCAPE: u8 = 0xFF;
