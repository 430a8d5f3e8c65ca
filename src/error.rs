//! Errors produced while building, parsing and sequencing handshake messages.


use std::error::Error;
use std::fmt;

use crate::handshake::HandshakeState;


/// A message received from the peer does not have the expected format.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FormatError {
    /// The message is shorter than the fixed part of its layout.
    ShortMessage { expected_min_len: usize, obtained_len: usize },

    /// The magic value does not match the expected one.
    MagicMismatch { expected: [u8; 8], obtained: Vec<u8> },

    /// The sequence number identifies a different message type.
    UnexpectedSequenceNumber { expected: u32, obtained: u32 },

    /// A fixed-width field would be read past the end of the buffer.
    OutOfBounds { offset: usize, width: usize, length: usize },

    /// A security buffer references a region that does not lie within the buffer.
    RegionOutOfRange { offset: u32, length: u16, buffer_length: usize },
}
impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortMessage { expected_min_len, obtained_len }
                => write!(f, "message too short (expected at least {} bytes, obtained {})", expected_min_len, obtained_len),
            Self::MagicMismatch { expected, obtained }
                => write!(f, "mismatched magic (expected {:?}, obtained {:?})", expected, obtained),
            Self::UnexpectedSequenceNumber { expected, obtained }
                => write!(f, "unexpected sequence number (expected {}, obtained {})", expected, obtained),
            Self::OutOfBounds { offset, width, length }
                => write!(f, "{}-byte field at offset {} out of range (buffer has {} bytes)", width, offset, length),
            Self::RegionOutOfRange { offset, length, buffer_length }
                => write!(f, "region of {} bytes at offset {} out of range (buffer has {} bytes)", length, offset, buffer_length),
        }
    }
}
impl Error for FormatError {
}

/// An error that may occur while writing a handshake message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum StoringError {
    /// A variable-length field does not fit into a security buffer.
    FieldTooLong { field: &'static str, length: usize },
}
impl fmt::Display for StoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldTooLong { field, length }
                => write!(f, "{} is {} bytes long, which does not fit into a security buffer", field, length),
        }
    }
}
impl Error for StoringError {
}

/// The handshake was driven in a way its current state does not allow.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProtocolStateError {
    /// Input was supplied when none was expected.
    UnexpectedInput { state: HandshakeState },

    /// No input was supplied when a Challenge message was expected.
    MissingInput { state: HandshakeState },

    /// The handshake has already produced its final message.
    AlreadyComplete,

    /// An earlier step of the handshake failed.
    Failed,

    /// The context has been released.
    Released,
}
impl fmt::Display for ProtocolStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedInput { state }
                => write!(f, "input supplied in state {:?}, where none is expected", state),
            Self::MissingInput { state }
                => write!(f, "no input supplied in state {:?}, where a challenge is expected", state),
            Self::AlreadyComplete
                => write!(f, "the handshake is already complete"),
            Self::Failed
                => write!(f, "the handshake has failed and cannot continue"),
            Self::Released
                => write!(f, "the handshake context has been released"),
        }
    }
}
impl Error for ProtocolStateError {
}

/// An error reported by a challenge responder.
///
/// The handshake does not interpret it; it is passed upward as-is.
#[derive(Debug)]
pub struct DelegateError {
    source: Box<dyn Error + Send + Sync + 'static>,
}
impl DelegateError {
    /// Wraps an arbitrary error raised while computing a response.
    pub fn new<E: Into<Box<dyn Error + Send + Sync + 'static>>>(source: E) -> Self {
        Self { source: source.into() }
    }
}
impl fmt::Display for DelegateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to compute challenge response: {}", self.source)
    }
}
impl Error for DelegateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Any error that aborts a handshake attempt.
#[derive(Debug)]
pub enum HandshakeError {
    Format(FormatError),
    Storing(StoringError),
    ProtocolState(ProtocolStateError),
    Delegate(DelegateError),
}
impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "malformed peer message: {}", e),
            Self::Storing(e) => write!(f, "failed to encode message: {}", e),
            Self::ProtocolState(e) => write!(f, "protocol state violation: {}", e),
            Self::Delegate(e) => write!(f, "{}", e),
        }
    }
}
impl Error for HandshakeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(e) => Some(e),
            Self::Storing(e) => Some(e),
            Self::ProtocolState(e) => Some(e),
            Self::Delegate(e) => Some(e),
        }
    }
}
impl From<FormatError> for HandshakeError {
    fn from(e: FormatError) -> Self { Self::Format(e) }
}
impl From<StoringError> for HandshakeError {
    fn from(e: StoringError) -> Self { Self::Storing(e) }
}
impl From<ProtocolStateError> for HandshakeError {
    fn from(e: ProtocolStateError) -> Self { Self::ProtocolState(e) }
}
impl From<DelegateError> for HandshakeError {
    fn from(e: DelegateError) -> Self { Self::Delegate(e) }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegate_error_exposes_source() {
        let err = HandshakeError::from(DelegateError::new("key schedule rejected"));
        let delegate = err.source().expect("handshake error has no source");
        let inner = delegate.source().expect("delegate error has no source");
        assert_eq!(inner.to_string(), "key schedule rejected");
    }

    #[test]
    fn region_error_mentions_all_numbers() {
        let err = FormatError::RegionOutOfRange { offset: 60, length: 12, buffer_length: 64 };
        let text = err.to_string();
        assert!(text.contains("60"));
        assert!(text.contains("12"));
        assert!(text.contains("64"));
    }
}
