//! MySQL capability flags.
//!
//! Capabilities are a 32-bit bitmask negotiated between client and server.
//! The server announces its set in the initial handshake (split into a lower
//! and an upper 16-bit half); the client sends its desired set back in the
//! handshake response. Field framing in the response packet is keyed off
//! these flags.

use std::fmt;

bitflags::bitflags! {
    /// Client/server capability flags.
    ///
    /// <https://dev.mysql.com/doc/dev/mysql-server/latest/group__group__cs__capabilities__flags.html>
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct CapabilityFlags: u32 {
        const LONG_PASSWORD = 1;
        const FOUND_ROWS = 1 << 1;
        const LONG_FLAG = 1 << 2;
        const CONNECT_WITH_DB = 1 << 3;
        const NO_SCHEMA = 1 << 4;
        const COMPRESS = 1 << 5;
        const ODBC = 1 << 6;
        const LOCAL_FILES = 1 << 7;
        const IGNORE_SPACE = 1 << 8;
        const PROTOCOL_41 = 1 << 9;
        const INTERACTIVE = 1 << 10;
        const SSL = 1 << 11;
        const IGNORE_SIGPIPE = 1 << 12;
        const TRANSACTIONS = 1 << 13;
        const RESERVED = 1 << 14;
        const SECURE_CONNECTION = 1 << 15;
        const MULTI_STATEMENTS = 1 << 16;
        const MULTI_RESULTS = 1 << 17;
        const PS_MULTI_RESULTS = 1 << 18;
        const PLUGIN_AUTH = 1 << 19;
        const CONNECT_ATTRS = 1 << 20;
        const PLUGIN_AUTH_LENENC_CLIENT_DATA = 1 << 21;
        const CAN_HANDLE_EXPIRED_PASSWORDS = 1 << 22;
        const SESSION_TRACK = 1 << 23;
        const DEPRECATE_EOF = 1 << 24;
        const OPTIONAL_RESULTSET_METADATA = 1 << 25;
        const ZSTD_COMPRESSION_ALGORITHM = 1 << 26;
        const QUERY_ATTRIBUTES = 1 << 27;
    }
}

impl CapabilityFlags {
    /// Reassemble flags from the two 16-bit halves of the v10 handshake.
    ///
    /// Unknown server bits are retained so the full mask round-trips.
    pub fn from_lower_upper(lower: u16, upper: u16) -> Self {
        Self::from_bits_retain(u32::from(lower) | (u32::from(upper) << 16))
    }

    /// Lower 16 bits, as they appear first in the handshake packet.
    pub fn lower(self) -> u16 {
        (self.bits() & 0xFFFF) as u16
    }

    /// Upper 16 bits.
    pub fn upper(self) -> u16 {
        (self.bits() >> 16) as u16
    }
}

impl fmt::Debug for CapabilityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityFlags({:#010x})", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_lower_upper_reassembles() {
        let flags = CapabilityFlags::from_lower_upper(0x820D, 0x0008);
        assert!(flags.contains(CapabilityFlags::LONG_PASSWORD));
        assert!(flags.contains(CapabilityFlags::CONNECT_WITH_DB));
        assert!(flags.contains(CapabilityFlags::PROTOCOL_41));
        assert!(flags.contains(CapabilityFlags::SECURE_CONNECTION));
        assert!(flags.contains(CapabilityFlags::PLUGIN_AUTH));
        assert!(!flags.contains(CapabilityFlags::SSL));
    }

    #[test]
    fn lower_upper_round_trip() {
        let flags = CapabilityFlags::SECURE_CONNECTION
            | CapabilityFlags::PLUGIN_AUTH
            | CapabilityFlags::DEPRECATE_EOF;
        let round = CapabilityFlags::from_lower_upper(flags.lower(), flags.upper());
        assert_eq!(flags, round);
    }

    #[test]
    fn unknown_bits_are_retained() {
        let flags = CapabilityFlags::from_lower_upper(0, 0x8000);
        assert_eq!(flags.bits(), 0x8000_0000);
    }

    #[test]
    fn insert_and_union() {
        let mut flags = CapabilityFlags::PROTOCOL_41;
        flags.insert(CapabilityFlags::SSL);
        assert!(flags.contains(CapabilityFlags::SSL));

        let both = flags | CapabilityFlags::CONNECT_WITH_DB;
        assert!(both.contains(CapabilityFlags::PROTOCOL_41));
        assert!(both.contains(CapabilityFlags::CONNECT_WITH_DB));
    }
}
