//! ONC RPC record marking for stream transports (RFC 5531 section 11).
//!
//! ```text
//! +-+------------------------+---------------------+
//! |L| Fragment length (31)   | Fragment bytes      |
//! +-+------------------------+---------------------+
//! ```
//!
//! `L` is set on the last fragment of a record.

use std::io::{self, Read, Write};

/// Bit marking the last fragment of a record.
pub const LAST_FRAGMENT: u32 = 0x8000_0000;

/// Largest record this client will reassemble (1 MiB).
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Frame `payload` as a single last fragment.
pub fn encode_record(payload: &[u8]) -> Vec<u8> {
    let header = LAST_FRAGMENT | payload.len() as u32;
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&header.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Write `payload` as one record and flush.
pub fn write_record<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    writer.write_all(&encode_record(payload))?;
    writer.flush()
}

/// Read one complete record, reassembling fragments.
///
/// A connection closed before the first header byte yields `UnexpectedEof`,
/// as does one closed mid-record.
pub fn read_record<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut record = Vec::new();
    loop {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header)?;
        let header = u32::from_be_bytes(header);
        let len = (header & !LAST_FRAGMENT) as usize;

        if record.len() + len > MAX_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "record too large: {} bytes (max: {} bytes)",
                    record.len() + len,
                    MAX_RECORD_SIZE
                ),
            ));
        }

        let start = record.len();
        record.resize(start + len, 0);
        reader.read_exact(&mut record[start..])?;

        if header & LAST_FRAGMENT != 0 {
            return Ok(record);
        }
    }
}
