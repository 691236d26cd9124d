//! Scalar read/write primitives shared by the envelope codec and every
//! command payload.
//!
//! All multi-byte integers are big-endian. Strings are a `u32` byte length
//! followed by UTF-8; string lists are a `u32` count followed by strings.

use crate::protocol::codec::ProtocolError;

/// Appends protocol scalars to a growable buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(if value { 0x01 } else { 0x00 });
    }

    /// Writes a `u32` length prefix followed by the UTF-8 bytes.
    pub fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(u32::MAX as usize);
        self.write_u32(len as u32);
        self.buf.extend_from_slice(&bytes[..len]);
    }

    /// Writes a `u32` element count followed by each string.
    pub fn write_strings(&mut self, values: &[String]) {
        self.write_u32(values.len() as u32);
        for value in values {
            self.write_string(value);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads protocol scalars from a borrowed byte slice, tracking the cursor.
///
/// Every read is bounds-checked; a short buffer yields
/// [`ProtocolError::Truncated`] rather than a panic.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.take_array::<4>().map(i32::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.take_array::<4>().map(u32::from_be_bytes)
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        match self.take(1)?[0] {
            0x00 => Ok(false),
            0x01 => Ok(true),
            other => Err(ProtocolError::MalformedPayload(format!(
                "invalid bool byte 0x{other:02X} at offset {}",
                self.pos - 1
            ))),
        }
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u32()? as usize;
        let start = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8 at offset {start}: {e}")))
    }

    pub fn read_strings(&mut self) -> Result<Vec<String>, ProtocolError> {
        let count = self.read_u32()? as usize;
        // Each element carries at least its 4-byte length prefix; reject
        // counts the remaining bytes cannot possibly hold before allocating.
        if count > self.remaining() / 4 {
            return Err(ProtocolError::MalformedPayload(format!(
                "string list claims {count} elements but only {} bytes remain",
                self.remaining()
            )));
        }
        (0..count).map(|_| self.read_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_big_endian() {
        let mut w = WireWriter::new();
        w.write_i32(2);
        w.write_u32(0x0102_0304);
        assert_eq!(w.into_bytes(), vec![0, 0, 0, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut w = WireWriter::new();
        w.write_string("ab");
        assert_eq!(w.into_bytes(), vec![0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_reader_reads_back_mixed_values() {
        // Arrange
        let mut w = WireWriter::new();
        w.write_i32(-7);
        w.write_bool(true);
        w.write_string("file.php:42");
        w.write_strings(&["a".to_string(), String::new()]);
        let bytes = w.into_bytes();

        // Act
        let mut r = WireReader::new(&bytes);

        // Assert
        assert_eq!(r.read_i32().unwrap(), -7);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_string().unwrap(), "file.php:42");
        assert_eq!(r.read_strings().unwrap(), vec!["a".to_string(), String::new()]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_buffer_is_truncated_error() {
        let mut r = WireReader::new(&[0, 0, 1]);
        assert_eq!(
            r.read_i32(),
            Err(ProtocolError::Truncated {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_string_longer_than_buffer_is_truncated_error() {
        let mut r = WireReader::new(&[0, 0, 0, 10, b'x']);
        assert!(matches!(r.read_string(), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut r = WireReader::new(&[0, 0, 0, 1, 0xFF]);
        assert!(matches!(r.read_string(), Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_invalid_bool_byte_is_malformed() {
        let mut r = WireReader::new(&[0x02]);
        assert!(matches!(r.read_bool(), Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_absurd_list_count_is_rejected_before_allocation() {
        let mut r = WireReader::new(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(r.read_strings(), Err(ProtocolError::MalformedPayload(_))));
    }
}
