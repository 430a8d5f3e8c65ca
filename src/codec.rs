//! Little-endian primitives and security buffers.
//!
//! NTLM messages consist of a fixed-size header followed by a data block. Variable-length fields
//! live in the data block and are referenced from the header by security buffers, 8-byte
//! descriptors holding a length, a capacity (always equal to the length in messages we write) and
//! an offset relative to the start of the message.


use crate::error::{FormatError, StoringError};


/// The size of a serialized security buffer.
pub const SECURITY_BUFFER_LEN: usize = 8;


/// An NTLM security buffer, pointing to data contained later in the message.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SecurityBuffer {
    pub length: u16,
    pub capacity: u16,
    pub offset: u32,
}

impl SecurityBuffer {
    /// Creates a security buffer describing `length` bytes at `offset`.
    ///
    /// Fails if `length` does not fit into the 16-bit length field; `field` names the offending
    /// field in the error.
    pub fn new(field: &'static str, length: usize, offset: u32) -> Result<Self, StoringError> {
        let len_u16: u16 = length.try_into()
            .or(Err(StoringError::FieldTooLong { field, length }))?;
        Ok(Self {
            length: len_u16,
            capacity: len_u16,
            offset,
        })
    }

    /// Serializes the security buffer into bytes.
    pub fn to_bytes(&self) -> [u8; SECURITY_BUFFER_LEN] {
        let mut ret = [0u8; SECURITY_BUFFER_LEN];
        ret[0..2].copy_from_slice(&encode_u16_le(self.length));
        ret[2..4].copy_from_slice(&encode_u16_le(self.capacity));
        ret[4..8].copy_from_slice(&encode_u32_le(self.offset));
        ret
    }

    /// Extracts the data the security buffer points to from `message`.
    ///
    /// `message` must be the whole message, since offsets are relative to its start. The region
    /// is checked against the length of `message` before it is touched; a region that does not
    /// lie entirely within `message` is an error, even if it is empty.
    pub fn apply_to_slice<'a>(&self, message: &'a [u8]) -> Result<&'a [u8], FormatError> {
        let out_of_range = || FormatError::RegionOutOfRange {
            offset: self.offset,
            length: self.length,
            buffer_length: message.len(),
        };

        let start: usize = self.offset.try_into()
            .map_err(|_| out_of_range())?;
        let end = start.checked_add(usize::from(self.length))
            .ok_or_else(out_of_range)?;
        if end > message.len() {
            return Err(out_of_range());
        }

        Ok(&message[start..end])
    }
}


/// Encodes a 16-bit integer in little-endian byte order.
pub fn encode_u16_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Encodes a 32-bit integer in little-endian byte order.
pub fn encode_u32_le(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Encodes a security buffer of `length` bytes at `offset`, duplicating the length as capacity.
pub fn encode_security_buffer(length: u16, offset: u32) -> [u8; SECURITY_BUFFER_LEN] {
    SecurityBuffer { length, capacity: length, offset }.to_bytes()
}

/// Encodes a string as UTF-16 code units in little-endian byte order, without a Byte Order Mark.
pub fn encode_utf16_le_string(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

/// Returns `width` bytes of `bytes` starting at `offset`, or an error if they do not exist.
fn field_at(bytes: &[u8], offset: usize, width: usize) -> Result<&[u8], FormatError> {
    let out_of_bounds = FormatError::OutOfBounds { offset, width, length: bytes.len() };
    let end = offset.checked_add(width).ok_or_else(|| out_of_bounds.clone())?;
    bytes.get(offset..end).ok_or(out_of_bounds)
}

/// Decodes a little-endian 16-bit integer at `offset`.
pub fn decode_u16_le(bytes: &[u8], offset: usize) -> Result<u16, FormatError> {
    let field = field_at(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([field[0], field[1]]))
}

/// Decodes a little-endian 32-bit integer at `offset`.
pub fn decode_u32_le(bytes: &[u8], offset: usize) -> Result<u32, FormatError> {
    let field = field_at(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

/// Decodes the security buffer stored at `start`.
///
/// Only the descriptor itself is bounds-checked; whether the region it references lies within
/// the message is checked by [`SecurityBuffer::apply_to_slice`].
pub fn decode_security_buffer(bytes: &[u8], start: usize) -> Result<SecurityBuffer, FormatError> {
    let length = decode_u16_le(bytes, start)?;
    let capacity = decode_u16_le(bytes, start + 2)?;
    let offset = decode_u32_le(bytes, start + 4)?;
    Ok(SecurityBuffer {
        length,
        capacity,
        offset,
    })
}
