//! MySQL connection-establishment protocol.
//!
//! This crate implements the client side of the MySQL connection phase: it
//! parses the server's v10 greeting, negotiates capability flags, derives
//! the authentication response for `mysql_native_password` and
//! `caching_sha2_password`, optionally upgrades the stream to TLS before
//! credentials are sent, and reports the outcome through a one-shot ready
//! signal.
//!
//! It is deliberately transport-agnostic. The caller owns the socket and
//! the 4-byte packet framing, exposes both through the [`PacketChannel`]
//! trait, and feeds decoded [`ServerPacket`]s into a [`ConnectionHandler`]:
//!
//! ```no_run
//! use mysql_handshake::{ConnectOptions, ConnectionHandler, ServerPacket};
//! # use mysql_handshake::{ClientPacket, TlsSettings};
//! # use mysql_handshake::error::TransportError;
//! # struct Channel;
//! # impl mysql_handshake::PacketChannel for Channel {
//! #     fn send(&mut self, _: ClientPacket) -> Result<(), TransportError> { Ok(()) }
//! #     fn begin_tls(&mut self, _: &TlsSettings) -> Result<(), TransportError> { Ok(()) }
//! #     fn is_secure(&self) -> bool { false }
//! # }
//! # fn read_payload() -> Vec<u8> { vec![] }
//! # fn main() -> Result<(), mysql_handshake::Error> {
//! let options = ConnectOptions::new("app_user").password("s3cret");
//! let (mut handler, ready) = ConnectionHandler::new(options, Channel);
//!
//! // Transport loop: read framed payloads, decode, feed the handler.
//! let greeting = ServerPacket::decode_greeting(&read_payload())?;
//! handler.handle_packet(ServerPacket::Handshake(greeting));
//! handler.handle_packet(ServerPacket::decode(&read_payload())?);
//!
//! ready.wait()?;
//! # Ok(())
//! # }
//! ```
//!
//! Everything past the handshake (queries, prepared statements, pooling)
//! is out of scope.

pub mod auth;
pub mod channel;
pub mod error;
pub mod handler;
pub mod options;
pub mod protocol;
pub mod signal;
pub mod tls;

pub use channel::{ClientPacket, PacketChannel, ServerPacket};
pub use error::{Error, Result};
pub use handler::{ConnectionHandler, ExchangePredicate};
pub use options::{ConnectOptions, Transport};
pub use protocol::{CapabilityFlags, HandshakeResponse, ServerHandshake, SslRequest};
pub use signal::Completion;
pub use tls::TlsSettings;
