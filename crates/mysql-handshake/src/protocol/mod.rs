//! MySQL connection-phase wire protocol.
//!
//! Payload-level types and codecs only: the 4-byte length/sequence frame
//! header belongs to the external transport and never appears here.

pub mod capabilities;
pub mod handshake;
pub mod reader;
pub mod writer;

pub use capabilities::CapabilityFlags;
pub use handshake::{HandshakeResponse, ServerHandshake, SslRequest};
pub use reader::PacketReader;
pub use writer::PacketWriter;

/// MySQL character set codes.
pub mod charset {
    pub const LATIN1_SWEDISH_CI: u8 = 8;
    pub const UTF8_GENERAL_CI: u8 = 33;
    pub const UTF8MB4_GENERAL_CI: u8 = 45;
    pub const BINARY: u8 = 63;
    pub const UTF8MB4_0900_AI_CI: u8 = 255;

    /// Default charset for new connections (utf8mb4).
    pub const DEFAULT_CHARSET: u8 = UTF8MB4_GENERAL_CI;
}

/// Parsed OK packet.
#[derive(Debug, Clone)]
pub struct OkPacket {
    /// Number of affected rows
    pub affected_rows: u64,
    /// Last insert ID
    pub last_insert_id: u64,
    /// Server status flags
    pub status_flags: u16,
    /// Number of warnings
    pub warnings: u16,
    /// Info string (if any)
    pub info: String,
}

/// Parsed ERR packet.
#[derive(Debug, Clone)]
pub struct ErrPacket {
    /// Server error code
    pub error_code: u16,
    /// SQL state (5 characters, may be empty on old servers)
    pub sql_state: String,
    /// Error message
    pub error_message: String,
}

/// Parsed EOF packet, used by the server as a command-completion marker.
#[derive(Debug, Clone, Copy)]
pub struct EofPacket {
    /// Number of warnings
    pub warnings: u16,
    /// Server status flags
    pub status_flags: u16,
}
