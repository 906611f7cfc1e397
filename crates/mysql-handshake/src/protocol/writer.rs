//! Packet payload writing utilities.
//!
//! Builds the payload bytes of outbound packets. Frame headers (3-byte
//! length plus sequence number) are the external transport's job; nothing
//! here writes them.

use crate::protocol::capabilities::CapabilityFlags;

/// A writer for MySQL protocol data.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new writer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current payload length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the payload as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write a u32 (little-endian).
    pub fn write_u32_le(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write the capability bitmask (4 bytes, little-endian).
    pub fn write_capabilities(&mut self, flags: CapabilityFlags) {
        self.write_u32_le(flags.bits());
    }

    /// Write a NUL-terminated string.
    pub fn write_null_string(&mut self, s: &str) {
        self.buffer.extend_from_slice(s.as_bytes());
        self.buffer.push(0);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write zeros (padding).
    pub fn write_zeros(&mut self, count: usize) {
        self.buffer.resize(self.buffer.len() + count, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_u32_le_byte_order() {
        let mut writer = PacketWriter::new();
        writer.write_u32_le(0x1234_5678);
        assert_eq!(writer.as_bytes(), &[0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn write_null_string_appends_nul() {
        let mut writer = PacketWriter::new();
        writer.write_null_string("hello");
        assert_eq!(writer.as_bytes(), b"hello\0");
    }

    #[test]
    fn write_zeros_pads() {
        let mut writer = PacketWriter::new();
        writer.write_u8(0xAB);
        writer.write_zeros(3);
        assert_eq!(writer.as_bytes(), &[0xAB, 0, 0, 0]);
    }

    #[test]
    fn write_capabilities_little_endian() {
        let mut writer = PacketWriter::new();
        writer.write_capabilities(CapabilityFlags::SSL | CapabilityFlags::PROTOCOL_41);
        // 1<<11 | 1<<9 = 0x0A00
        assert_eq!(writer.as_bytes(), &[0x00, 0x0A, 0x00, 0x00]);
    }
}
