//! The boundary between the handshake state machine and the transport.
//!
//! [`PacketChannel`] is implemented by whatever owns the socket and the
//! 4-byte frame layer; the handler only ever exchanges framed payloads
//! through it. [`ServerPacket`] and [`ClientPacket`] are the closed packet
//! vocabularies for the connection phase: decoding classifies every inbound
//! payload into exactly one case, and every client payload is encodable
//! without failure.

use crate::error::{Error, Result, TransportError};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::PacketWriter;
use crate::protocol::{
    ErrPacket, EofPacket, HandshakeResponse, OkPacket, ServerHandshake, SslRequest,
};
use crate::tls::TlsSettings;

/// Status byte values that classify a server payload.
mod marker {
    pub const OK: u8 = 0x00;
    pub const AUTH_MORE_DATA: u8 = 0x01;
    pub const EOF: u8 = 0xFE;
    pub const ERR: u8 = 0xFF;
    /// AuthMoreData sub-status: switch to full authentication.
    pub const FULL_AUTH: u8 = 0x04;
}

/// Transport collaborator owned by the caller.
///
/// `send` frames and writes one payload and returns only once the write has
/// been handed off; `begin_tls` performs the in-place TLS upgrade on the
/// underlying stream.
pub trait PacketChannel {
    /// Encode, frame, and write one packet.
    fn send(&mut self, packet: ClientPacket) -> std::result::Result<(), TransportError>;

    /// Upgrade the underlying stream to TLS. Called at most once, after an
    /// SSLRequest payload was sent and before the handshake response.
    fn begin_tls(&mut self, settings: &TlsSettings) -> std::result::Result<(), TransportError>;

    /// Whether the stream currently runs over TLS.
    fn is_secure(&self) -> bool;
}

/// Every server payload the connection phase can see.
#[derive(Debug, Clone)]
pub enum ServerPacket {
    /// HandshakeV10 greeting
    Handshake(ServerHandshake),
    /// OK packet
    Ok(OkPacket),
    /// ERR packet
    Err(ErrPacket),
    /// AuthMoreData asking to switch to full authentication
    FullAuthRequested,
    /// EOF packet
    Eof(EofPacket),
    /// Anything else, carried verbatim (result-set rows, other
    /// AuthMoreData payloads)
    Data(Vec<u8>),
}

impl ServerPacket {
    /// Decode the very first server payload, which is always a greeting.
    pub fn decode_greeting(payload: &[u8]) -> Result<ServerHandshake> {
        ServerHandshake::parse(payload)
    }

    /// Classify a post-greeting server payload.
    ///
    /// EOF detection follows the wire rule: first byte `0xFE` and a total
    /// payload under 9 bytes, since `0xFE` also begins 8-byte length-encoded
    /// integers.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some(&first) = payload.first() else {
            return Err(Error::protocol("Empty packet payload"));
        };
        match first {
            marker::OK if payload.len() >= 7 => {
                let mut reader = PacketReader::new(payload);
                let ok = reader
                    .parse_ok_packet()
                    .ok_or_else(|| Error::protocol("Malformed OK packet"))?;
                Ok(ServerPacket::Ok(ok))
            }
            marker::ERR => {
                let mut reader = PacketReader::new(payload);
                let err = reader
                    .parse_err_packet()
                    .ok_or_else(|| Error::protocol("Malformed ERR packet"))?;
                Ok(ServerPacket::Err(err))
            }
            marker::EOF if payload.len() < 9 => {
                let mut reader = PacketReader::new(payload);
                reader.read_u8();
                let warnings = reader.read_u16_le().unwrap_or(0);
                let status_flags = reader.read_u16_le().unwrap_or(0);
                Ok(ServerPacket::Eof(EofPacket {
                    warnings,
                    status_flags,
                }))
            }
            marker::AUTH_MORE_DATA if payload.get(1) == Some(&marker::FULL_AUTH) => {
                Ok(ServerPacket::FullAuthRequested)
            }
            _ => Ok(ServerPacket::Data(payload.to_vec())),
        }
    }
}

/// Every client payload the connection phase can send.
#[derive(Debug, Clone)]
pub enum ClientPacket {
    /// HandshakeResponse41
    HandshakeResponse(HandshakeResponse),
    /// SSLRequest, the fixed 32-byte response head
    SslRequest(SslRequest),
    /// Cleartext password for full authentication, NUL-terminated
    PlaintextPassword(String),
}

impl ClientPacket {
    /// Encode the payload. Infallible: every variant validates at
    /// construction, not here.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ClientPacket::HandshakeResponse(response) => response.encode(),
            ClientPacket::SslRequest(request) => request.encode(),
            ClientPacket::PlaintextPassword(password) => {
                let mut writer = PacketWriter::with_capacity(password.len() + 1);
                writer.write_null_string(password);
                writer.into_bytes()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ok_packet() {
        let payload = [0x00, 0x01, 0x02, 0x02, 0x00, 0x00, 0x00];
        match ServerPacket::decode(&payload).unwrap() {
            ServerPacket::Ok(ok) => {
                assert_eq!(ok.affected_rows, 1);
                assert_eq!(ok.last_insert_id, 2);
                assert_eq!(ok.status_flags, 0x02);
            }
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[test]
    fn decodes_err_packet() {
        let mut payload = vec![0xFF, 0x15, 0x04, b'#'];
        payload.extend_from_slice(b"28000");
        payload.extend_from_slice(b"Access denied");
        match ServerPacket::decode(&payload).unwrap() {
            ServerPacket::Err(err) => {
                assert_eq!(err.error_code, 1045);
                assert_eq!(err.sql_state, "28000");
                assert_eq!(err.error_message, "Access denied");
            }
            other => panic!("expected Err, got {other:?}"),
        }
    }

    #[test]
    fn short_fe_packet_is_eof_long_one_is_data() {
        let eof = [0xFE, 0x00, 0x00, 0x02, 0x00];
        assert!(matches!(
            ServerPacket::decode(&eof).unwrap(),
            ServerPacket::Eof(_)
        ));

        // 0xFE starting a 9+ byte payload is a length-encoded integer, not EOF
        let data = [0xFE, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        assert!(matches!(
            ServerPacket::decode(&data).unwrap(),
            ServerPacket::Data(_)
        ));
    }

    #[test]
    fn auth_more_data_classification() {
        assert!(matches!(
            ServerPacket::decode(&[0x01, 0x04]).unwrap(),
            ServerPacket::FullAuthRequested
        ));
        // fast-auth success stays opaque
        assert!(matches!(
            ServerPacket::decode(&[0x01, 0x03]).unwrap(),
            ServerPacket::Data(_)
        ));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            ServerPacket::decode(&[]),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn plaintext_password_is_null_terminated() {
        let bytes = ClientPacket::PlaintextPassword("hunter2".to_string()).encode();
        assert_eq!(bytes, b"hunter2\0");
    }
}
