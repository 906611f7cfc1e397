//! Connection-phase handshake payloads.
//!
//! [`ServerHandshake`] decodes the server's v10 greeting;
//! [`HandshakeResponse`] and [`SslRequest`] encode the client's replies.
//! Response construction validates every capability dependency up front, so
//! encoding is infallible and misconfiguration surfaces before any byte is
//! handed to the transport.

use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::PacketWriter;
use crate::protocol::CapabilityFlags;

/// The only handshake protocol version this client speaks.
pub const PROTOCOL_VERSION: u8 = 10;

/// Parsed HandshakeV10 greeting.
#[derive(Debug, Clone)]
pub struct ServerHandshake {
    /// Protocol version, always 10
    pub protocol_version: u8,
    /// Human-readable server version, e.g. "8.0.36"
    pub server_version: String,
    /// Server thread ID for this connection
    pub connection_id: u32,
    /// Capabilities the server offers
    pub capabilities: CapabilityFlags,
    /// Server default character set
    pub charset: u8,
    /// Server status flags
    pub status_flags: u16,
    /// Auth plugin data (nonce), both parts concatenated
    pub auth_plugin_data: Vec<u8>,
    /// Name of the auth plugin the server wants, if announced
    pub auth_plugin_name: Option<String>,
}

impl ServerHandshake {
    /// Parse a HandshakeV10 payload.
    ///
    /// Protocol versions other than 10 are rejected; v9 pre-dates the 4.1
    /// auth protocol and is not supported.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PacketReader::new(payload);

        let protocol_version = reader
            .read_u8()
            .ok_or_else(|| Error::protocol("Empty handshake packet"))?;
        if protocol_version != PROTOCOL_VERSION {
            return Err(Error::protocol(format!(
                "Unsupported handshake protocol version: {protocol_version}"
            )));
        }

        let server_version = reader
            .read_null_string()
            .ok_or_else(|| Error::protocol("Handshake missing server version"))?;
        let connection_id = reader
            .read_u32_le()
            .ok_or_else(|| Error::protocol("Handshake missing connection ID"))?;

        // auth-plugin-data-part-1: 8 bytes, then one filler byte
        let mut auth_plugin_data = reader
            .read_bytes(8)
            .ok_or_else(|| Error::protocol("Handshake missing auth plugin data"))?
            .to_vec();
        if !reader.skip(1) {
            return Err(Error::protocol("Handshake truncated at filler byte"));
        }

        let capability_lower = reader
            .read_u16_le()
            .ok_or_else(|| Error::protocol("Handshake missing capability flags"))?;

        // Everything past the lower capability bytes is optional on ancient
        // servers; treat absence as zero.
        let charset = reader.read_u8().unwrap_or(0);
        let status_flags = reader.read_u16_le().unwrap_or(0);
        let capability_upper = reader.read_u16_le().unwrap_or(0);

        let capabilities = CapabilityFlags::from_lower_upper(capability_lower, capability_upper);

        let auth_plugin_data_len = reader.read_u8().unwrap_or(0);
        reader.skip(10); // reserved

        if capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
            // auth-plugin-data-part-2: max(13, len - 8) bytes, often with a
            // trailing NUL that is not part of the nonce
            let part2_len = std::cmp::max(13, auth_plugin_data_len.saturating_sub(8) as usize);
            let part2 = reader
                .read_bytes(part2_len)
                .ok_or_else(|| Error::protocol("Handshake truncated in auth plugin data"))?;
            let part2 = match part2.last() {
                Some(0) => &part2[..part2.len() - 1],
                _ => part2,
            };
            auth_plugin_data.extend_from_slice(part2);
        }

        let auth_plugin_name = if capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            let name = reader
                .read_null_string()
                .ok_or_else(|| Error::protocol("Handshake missing auth plugin name"))?;
            Some(name)
        } else {
            None
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            capabilities,
            charset,
            status_flags,
            auth_plugin_data,
            auth_plugin_name,
        })
    }
}

/// Client HandshakeResponse41 payload.
///
/// Construct with [`HandshakeResponse::new`], which checks every capability
/// dependency; [`HandshakeResponse::encode`] cannot fail afterwards.
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    capabilities: CapabilityFlags,
    max_packet_size: u32,
    charset: u8,
    username: String,
    auth_response: Vec<u8>,
    database: Option<String>,
    auth_plugin_name: Option<String>,
}

impl HandshakeResponse {
    /// Build a response, validating field/capability consistency.
    ///
    /// Rules enforced here rather than at encode time:
    /// - `PLUGIN_AUTH_LENENC_CLIENT_DATA` and `CONNECT_ATTRS` are not
    ///   implemented and must not be requested
    /// - a database name requires `CONNECT_WITH_DB`
    /// - a plugin name requires `PLUGIN_AUTH`
    /// - with `SECURE_CONNECTION` the auth response carries a 1-byte length
    ///   prefix and is capped at 255 bytes; the raw NUL-terminated framing
    ///   has no cap
    pub fn new(
        capabilities: CapabilityFlags,
        max_packet_size: u32,
        charset: u8,
        username: impl Into<String>,
        auth_response: Vec<u8>,
        database: Option<String>,
        auth_plugin_name: Option<String>,
    ) -> Result<Self> {
        if capabilities.contains(CapabilityFlags::PLUGIN_AUTH_LENENC_CLIENT_DATA) {
            return Err(Error::config(
                "Length-encoded auth responses are not implemented",
            ));
        }
        if capabilities.contains(CapabilityFlags::CONNECT_ATTRS) {
            return Err(Error::config("Connection attributes are not implemented"));
        }
        if capabilities.contains(CapabilityFlags::SECURE_CONNECTION) && auth_response.len() > 255 {
            return Err(Error::protocol(
                "Auth response longer than 255 bytes requires length-encoded client data",
            ));
        }
        match &database {
            Some(db) if !db.is_empty() && !capabilities.contains(CapabilityFlags::CONNECT_WITH_DB) => {
                return Err(Error::config(
                    "Database name set without CLIENT_CONNECT_WITH_DB",
                ));
            }
            _ => {}
        }
        match &auth_plugin_name {
            Some(name) if !name.is_empty() && !capabilities.contains(CapabilityFlags::PLUGIN_AUTH) => {
                return Err(Error::config(
                    "Auth plugin name set without CLIENT_PLUGIN_AUTH",
                ));
            }
            _ => {}
        }

        Ok(Self {
            capabilities,
            max_packet_size,
            charset,
            username: username.into(),
            auth_response,
            database,
            auth_plugin_name,
        })
    }

    /// Capabilities this response advertises.
    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    /// Encode the payload. Infallible: all validation happened in `new`.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_capacity(64);
        writer.write_capabilities(self.capabilities);
        writer.write_u32_le(self.max_packet_size);
        writer.write_u8(self.charset);
        writer.write_zeros(23);
        writer.write_null_string(&self.username);

        if self.capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
            // length checked at construction
            #[allow(clippy::cast_possible_truncation)]
            writer.write_u8(self.auth_response.len() as u8);
            writer.write_bytes(&self.auth_response);
        } else {
            writer.write_bytes(&self.auth_response);
            writer.write_u8(0);
        }

        if self.capabilities.contains(CapabilityFlags::CONNECT_WITH_DB) {
            if let Some(db) = &self.database {
                writer.write_null_string(db);
            }
        }
        if self.capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            if let Some(name) = &self.auth_plugin_name {
                writer.write_null_string(name);
            }
        }

        writer.into_bytes()
    }
}

/// SSLRequest payload: the fixed 32-byte head of a HandshakeResponse41,
/// sent before the TLS upgrade. The advertised capabilities must include
/// `SSL` and must match the full response sent after the upgrade.
#[derive(Debug, Clone, Copy)]
pub struct SslRequest {
    capabilities: CapabilityFlags,
    max_packet_size: u32,
    charset: u8,
}

impl SslRequest {
    pub fn new(capabilities: CapabilityFlags, max_packet_size: u32, charset: u8) -> Self {
        Self {
            capabilities: capabilities | CapabilityFlags::SSL,
            max_packet_size,
            charset,
        }
    }

    /// Encode the fixed 32-byte payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_capacity(32);
        writer.write_capabilities(self.capabilities);
        writer.write_u32_le(self.max_packet_size);
        writer.write_u8(self.charset);
        writer.write_zeros(23);
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::charset;

    fn greeting_v10(caps: CapabilityFlags, plugin: Option<&str>) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_u8(10);
        writer.write_null_string("8.0.36");
        writer.write_u32_le(42);
        writer.write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]); // part 1
        writer.write_u8(0); // filler
        let lower = caps.lower();
        writer.write_u8((lower & 0xFF) as u8);
        writer.write_u8((lower >> 8) as u8);
        writer.write_u8(charset::UTF8MB4_GENERAL_CI);
        writer.write_u8(0x02); // status lower (autocommit)
        writer.write_u8(0);
        let upper = caps.upper();
        writer.write_u8((upper & 0xFF) as u8);
        writer.write_u8((upper >> 8) as u8);
        writer.write_u8(21); // auth data length
        writer.write_zeros(10);
        if caps.contains(CapabilityFlags::SECURE_CONNECTION) {
            writer.write_bytes(&[9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]);
            writer.write_u8(0); // trailing NUL, not part of nonce
        }
        if let Some(plugin) = plugin {
            writer.write_null_string(plugin);
        }
        writer.into_bytes()
    }

    #[test]
    fn parses_full_v10_greeting() {
        let caps = CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::PLUGIN_AUTH
            | CapabilityFlags::SSL;
        let payload = greeting_v10(caps, Some("mysql_native_password"));
        let handshake = ServerHandshake::parse(&payload).unwrap();

        assert_eq!(handshake.protocol_version, 10);
        assert_eq!(handshake.server_version, "8.0.36");
        assert_eq!(handshake.connection_id, 42);
        assert_eq!(handshake.capabilities, caps);
        assert_eq!(handshake.charset, charset::UTF8MB4_GENERAL_CI);
        assert_eq!(handshake.status_flags, 0x02);
        assert_eq!(
            handshake.auth_plugin_data,
            (1u8..=20).collect::<Vec<u8>>(),
            "both nonce parts concatenated, trailing NUL stripped"
        );
        assert_eq!(
            handshake.auth_plugin_name.as_deref(),
            Some("mysql_native_password")
        );
    }

    #[test]
    fn rejects_non_v10_protocol_version() {
        let err = ServerHandshake::parse(&[9, b'5', b'.', b'0', 0]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn rejects_truncated_greeting() {
        let caps = CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION;
        let mut payload = greeting_v10(caps, None);
        payload.truncate(payload.len() - 6);
        let err = ServerHandshake::parse(&payload).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn response_rejects_lenenc_capability() {
        let caps = CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::PLUGIN_AUTH_LENENC_CLIENT_DATA;
        let err = HandshakeResponse::new(caps, 1024, 45, "root", vec![], None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn response_rejects_database_without_capability() {
        let caps = CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION;
        let err = HandshakeResponse::new(
            caps,
            1024,
            45,
            "root",
            vec![1; 20],
            Some("app".to_string()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn response_rejects_plugin_name_without_capability() {
        let caps = CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION;
        let err = HandshakeResponse::new(
            caps,
            1024,
            45,
            "root",
            vec![1; 20],
            None,
            Some("mysql_native_password".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn response_rejects_oversized_auth_response() {
        let caps = CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION;
        let err =
            HandshakeResponse::new(caps, 1024, 45, "root", vec![0; 256], None, None).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn oversized_auth_response_allowed_with_raw_framing() {
        let caps = CapabilityFlags::PROTOCOL_41;
        let response =
            HandshakeResponse::new(caps, 1024, 45, "root", vec![0xCC; 300], None, None).unwrap();
        let bytes = response.encode();
        assert_eq!(&bytes[37..337], &[0xCC; 300][..]);
        assert_eq!(bytes[337], 0);
    }

    #[test]
    fn response_encoding_layout() {
        let caps = CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::PLUGIN_AUTH
            | CapabilityFlags::CONNECT_WITH_DB;
        let response = HandshakeResponse::new(
            caps,
            1024,
            45,
            "root",
            vec![0xAA; 20],
            Some("app".to_string()),
            Some("mysql_native_password".to_string()),
        )
        .unwrap();
        let bytes = response.encode();

        assert_eq!(&bytes[0..4], caps.bits().to_le_bytes());
        assert_eq!(&bytes[4..8], 1024u32.to_le_bytes());
        assert_eq!(bytes[8], 45);
        assert!(bytes[9..32].iter().all(|&b| b == 0));
        assert_eq!(&bytes[32..37], b"root\0");
        assert_eq!(bytes[37], 20); // length-prefixed auth response
        assert_eq!(&bytes[38..58], &[0xAA; 20]);
        assert_eq!(&bytes[58..62], b"app\0");
        assert_eq!(&bytes[62..], b"mysql_native_password\0");
    }

    #[test]
    fn response_without_secure_connection_uses_null_terminator() {
        let caps = CapabilityFlags::PROTOCOL_41;
        let response =
            HandshakeResponse::new(caps, 1024, 45, "root", vec![0xBB; 8], None, None).unwrap();
        let bytes = response.encode();
        assert_eq!(&bytes[32..37], b"root\0");
        assert_eq!(&bytes[37..45], &[0xBB; 8]);
        assert_eq!(bytes[45], 0);
        assert_eq!(bytes.len(), 46);
    }

    #[test]
    fn ssl_request_is_32_bytes_with_ssl_flag() {
        let caps = CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION;
        let request = SslRequest::new(caps, 1024, 45);
        let bytes = request.encode();
        assert_eq!(bytes.len(), 32);
        let advertised = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_ne!(advertised & CapabilityFlags::SSL.bits(), 0);
    }

    #[test]
    fn ssl_request_head_matches_response_head() {
        let caps = CapabilityFlags::PROTOCOL_41
            | CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::SSL;
        let request = SslRequest::new(caps, 1024, 45).encode();
        let response = HandshakeResponse::new(caps, 1024, 45, "u", vec![0; 20], None, None)
            .unwrap()
            .encode();
        assert_eq!(request, &response[..32]);
    }
}
