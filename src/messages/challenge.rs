//! The Challenge message, sent by the server in response to the Negotiate message.
//!
//! Everything in this message is under the peer's control. Every field is read through the
//! bounds-checked accessors of the codec, and the target information is only extracted after its
//! security buffer has been checked against the length of the message.


use crate::{Flags, NTLMSSP_MAGIC};
use crate::codec::{decode_security_buffer, decode_u32_le, SECURITY_BUFFER_LEN};
use crate::error::FormatError;
use crate::messages::MessageType;
use crate::responses::SERVER_NONCE_LEN;


const SEQUENCE_NUMBER_OFFSET: usize = 8;
const FLAGS_OFFSET: usize = 20;
const SERVER_NONCE_OFFSET: usize = 24;
const TARGET_INFO_SECBUF_OFFSET: usize = 40;

/// The smallest Challenge message that holds every field we read.
pub const CHALLENGE_MIN_LEN: usize = TARGET_INFO_SECBUF_OFFSET + SECURITY_BUFFER_LEN;


/// The contents of a Challenge message.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChallengeMessage {
    /// The flags accepted by the server. Informational only.
    pub flags: Flags,

    /// The server's challenge nonce.
    pub server_nonce: [u8; SERVER_NONCE_LEN],

    /// The raw target information; empty if the server sent none.
    pub target_info: Vec<u8>,
}
impl TryFrom<&[u8]> for ChallengeMessage {
    type Error = FormatError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        parse_challenge(value)
    }
}


/// Parses and validates a Challenge message.
pub fn parse_challenge(bytes: &[u8]) -> Result<ChallengeMessage, FormatError> {
    if bytes.len() < CHALLENGE_MIN_LEN {
        return Err(FormatError::ShortMessage { expected_min_len: CHALLENGE_MIN_LEN, obtained_len: bytes.len() });
    }

    let obtained_magic = &bytes[0..NTLMSSP_MAGIC.len()];
    if obtained_magic != NTLMSSP_MAGIC {
        return Err(FormatError::MagicMismatch { expected: NTLMSSP_MAGIC, obtained: Vec::from(obtained_magic) });
    }

    let sequence_number = decode_u32_le(bytes, SEQUENCE_NUMBER_OFFSET)?;
    let expected_sequence_number = MessageType::Challenge.sequence_number();
    if sequence_number != expected_sequence_number {
        return Err(FormatError::UnexpectedSequenceNumber { expected: expected_sequence_number, obtained: sequence_number });
    }

    // servers may set bits we have no name for
    let flags = Flags::from_bits_retain(decode_u32_le(bytes, FLAGS_OFFSET)?);

    let mut server_nonce = [0u8; SERVER_NONCE_LEN];
    server_nonce.copy_from_slice(&bytes[SERVER_NONCE_OFFSET..SERVER_NONCE_OFFSET + SERVER_NONCE_LEN]);

    let target_info_secbuf = decode_security_buffer(bytes, TARGET_INFO_SECBUF_OFFSET)?;
    let target_info = Vec::from(target_info_secbuf.apply_to_slice(bytes)?);

    Ok(ChallengeMessage {
        flags,
        server_nonce,
        target_info,
    })
}
