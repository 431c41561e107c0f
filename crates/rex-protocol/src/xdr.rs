//! XDR (RFC 4506) primitives.
//!
//! Only the subset the rexd exchange needs: unsigned/signed 32-bit integers,
//! variable-length opaque data, strings and variable-length arrays of strings.
//! Every item occupies a multiple of four bytes on the wire.

use crate::DecodeError;

/// Size of one XDR unit in bytes.
pub const UNIT: usize = 4;

/// Number of zero bytes needed to pad `len` to a four-byte boundary.
fn padding(len: usize) -> usize {
    (UNIT - len % UNIT) % UNIT
}

/// A type that can be written in XDR form.
pub trait XdrEncode {
    /// Append the XDR representation of `self` to `enc`.
    fn encode(&self, enc: &mut XdrEncoder);
}

/// A type that can be read from XDR form.
pub trait XdrDecode: Sized {
    /// Read one value from `dec`.
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError>;
}

/// XDR `void`: encodes to nothing.
impl XdrEncode for () {
    fn encode(&self, _enc: &mut XdrEncoder) {}
}

impl XdrDecode for () {
    fn decode(_dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl XdrEncode for u32 {
    fn encode(&self, enc: &mut XdrEncoder) {
        enc.put_u32(*self);
    }
}

impl XdrDecode for u32 {
    fn decode(dec: &mut XdrDecoder<'_>) -> Result<Self, DecodeError> {
        dec.get_u32()
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Growable XDR output buffer.
#[derive(Debug, Default)]
pub struct XdrEncoder {
    buf: Vec<u8>,
}

impl XdrEncoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an unsigned 32-bit integer.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a signed 32-bit integer.
    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write an `unsigned short`. XDR has no 16-bit type, so it takes a full unit.
    pub fn put_u16(&mut self, value: u16) {
        self.put_u32(u32::from(value));
    }

    /// Write variable-length opaque data (length, bytes, padding).
    pub fn put_opaque(&mut self, data: &[u8]) {
        self.put_u32(data.len() as u32);
        self.buf.extend_from_slice(data);
        self.buf.resize(self.buf.len() + padding(data.len()), 0);
    }

    /// Write a string.
    pub fn put_string(&mut self, s: &str) {
        self.put_opaque(s.as_bytes());
    }

    /// Write a variable-length array of strings.
    ///
    /// XDR strings are bytes, so anything byte-like is accepted.
    pub fn put_string_array<S: AsRef<[u8]>>(&mut self, items: &[S]) {
        self.put_u32(items.len() as u32);
        for item in items {
            self.put_opaque(item.as_ref());
        }
    }

    /// Write a value implementing [`XdrEncode`].
    pub fn put<T: XdrEncode + ?Sized>(&mut self, value: &T) {
        value.encode(self);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Cursor over an XDR input buffer.
#[derive(Debug)]
pub struct XdrDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> XdrDecoder<'a> {
    /// Start decoding at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(DecodeError::Truncated {
                needed: len,
                available: remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read an unsigned 32-bit integer.
    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(UNIT)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a signed 32-bit integer.
    pub fn get_i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(UNIT)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read an `unsigned short` carried in a full unit.
    pub fn get_u16(&mut self) -> Result<u16, DecodeError> {
        let value = self.get_u32()?;
        u16::try_from(value).map_err(|_| DecodeError::OutOfRange {
            field: "u_short",
            value,
        })
    }

    /// Read variable-length opaque data of at most `max` bytes.
    pub fn get_opaque(&mut self, max: usize) -> Result<&'a [u8], DecodeError> {
        let len = self.get_u32()? as usize;
        if len > max {
            return Err(DecodeError::TooLarge(len));
        }
        let data = self.take(len)?;
        self.take(padding(len))?;
        Ok(data)
    }

    /// Read a string of at most `max` bytes.
    pub fn get_string(&mut self, max: usize) -> Result<String, DecodeError> {
        let bytes = self.get_opaque(max)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Read a string of at most `max` bytes, replacing invalid UTF-8.
    ///
    /// For free-form text from the peer, which may be in any 8-bit encoding.
    pub fn get_string_lossy(&mut self, max: usize) -> Result<String, DecodeError> {
        let bytes = self.get_opaque(max)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a variable-length array of strings as raw bytes.
    pub fn get_opaque_array(
        &mut self,
        max_items: usize,
        max_len: usize,
    ) -> Result<Vec<Vec<u8>>, DecodeError> {
        let count = self.get_u32()? as usize;
        if count > max_items {
            return Err(DecodeError::TooLarge(count));
        }
        (0..count)
            .map(|_| self.get_opaque(max_len).map(<[u8]>::to_vec))
            .collect()
    }

    /// Read a variable-length array of strings.
    pub fn get_string_array(
        &mut self,
        max_items: usize,
        max_len: usize,
    ) -> Result<Vec<String>, DecodeError> {
        let count = self.get_u32()? as usize;
        if count > max_items {
            return Err(DecodeError::TooLarge(count));
        }
        (0..count).map(|_| self.get_string(max_len)).collect()
    }

    /// Read a value implementing [`XdrDecode`].
    pub fn get<T: XdrDecode>(&mut self) -> Result<T, DecodeError> {
        T::decode(self)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The unconsumed tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// Decode a complete value from `data`.
pub fn from_bytes<T: XdrDecode>(data: &[u8]) -> Result<T, DecodeError> {
    XdrDecoder::new(data).get()
}

/// Encode a value into a fresh buffer.
pub fn to_bytes<T: XdrEncode + ?Sized>(value: &T) -> Vec<u8> {
    let mut enc = XdrEncoder::new();
    enc.put(value);
    enc.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_is_padded_to_unit() {
        let mut enc = XdrEncoder::new();
        enc.put_string("abcde");
        let bytes = enc.into_bytes();
        assert_eq!(bytes.len(), 4 + 8);
        assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
        assert_eq!(&bytes[4..9], b"abcde");
        assert_eq!(&bytes[9..], &[0, 0, 0]);
    }

    #[test]
    fn test_empty_string_is_length_only() {
        let mut enc = XdrEncoder::new();
        enc.put_string("");
        assert_eq!(enc.into_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_u16_takes_full_unit() {
        let mut enc = XdrEncoder::new();
        enc.put_u16(0x1234);
        assert_eq!(enc.into_bytes(), vec![0, 0, 0x12, 0x34]);
    }

    #[test]
    fn test_negative_i32_is_twos_complement() {
        let mut enc = XdrEncoder::new();
        enc.put_i32(-1);
        let bytes = enc.into_bytes();
        assert_eq!(bytes, vec![0xff; 4]);
        assert_eq!(XdrDecoder::new(&bytes).get_i32().unwrap(), -1);
    }

    #[test]
    fn test_string_array_keeps_embedded_spaces() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "echo a  b".to_string()];
        let mut enc = XdrEncoder::new();
        enc.put_string_array(&argv);
        let bytes = enc.into_bytes();

        let decoded = XdrDecoder::new(&bytes).get_string_array(16, 64).unwrap();
        assert_eq!(decoded, argv);
    }

    #[test]
    fn test_string_array_carries_raw_bytes() {
        let argv: Vec<Vec<u8>> = vec![b"echo".to_vec(), vec![0xe9, 0xff, b'x']];
        let mut enc = XdrEncoder::new();
        enc.put_string_array(&argv);
        let bytes = enc.into_bytes();

        let decoded = XdrDecoder::new(&bytes).get_opaque_array(16, 64).unwrap();
        assert_eq!(decoded, argv);
        assert!(matches!(
            XdrDecoder::new(&bytes).get_string_array(16, 64),
            Err(DecodeError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_lossy_string_keeps_valid_text() {
        let data = [0, 0, 0, 4, b'c', b'a', b'f', 0xe9];
        let text = XdrDecoder::new(&data).get_string_lossy(64).unwrap();
        assert_eq!(text, "caf\u{fffd}");
    }

    #[test]
    fn test_truncated_input() {
        let mut dec = XdrDecoder::new(&[0, 0, 0, 8, b'a', b'b']);
        let err = dec.get_opaque(64).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                needed: 8,
                available: 2
            }
        ));
    }

    #[test]
    fn test_opaque_over_limit_rejected() {
        let mut dec = XdrDecoder::new(&[0, 0, 1, 0]);
        assert!(matches!(dec.get_opaque(255), Err(DecodeError::TooLarge(256))));
    }

    #[test]
    fn test_u16_out_of_range() {
        let mut dec = XdrDecoder::new(&[0, 1, 0, 0]);
        assert!(matches!(
            dec.get_u16(),
            Err(DecodeError::OutOfRange { value: 65536, .. })
        ));
    }
}
