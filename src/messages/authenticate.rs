//! The Authenticate message, sent by the client in response to the server's challenge.


use crate::{Flags, NTLMSSP_MAGIC};
use crate::codec::{encode_u32_le, encode_utf16_le_string, SecurityBuffer};
use crate::config::{HandshakeConfig, ProtocolMode};
use crate::error::{HandshakeError, StoringError};
use crate::messages::MessageType;
use crate::responses::{compute_responses, ChallengeResponder, ResponsePair, SERVER_NONCE_LEN};


/// The offset of the data block.
const DATA_OFFSET: u32
    = 8 // magic
    + 4 // message type
    + 8 // LM response secbuffer
    + 8 // NTLM response secbuffer
    + 8 // domain name secbuffer
    + 8 // user name secbuffer
    + 8 // workstation name secbuffer
    + 8 // session key secbuffer
    + 4 // flags
    ;


/// The contents of an Authenticate message.
///
/// The data block holds the domain, the username, the legacy response and the extended response,
/// in this order. The workstation name and the session key are always empty.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AuthenticateMessage {
    pub responses: ResponsePair,
    pub domain: String,
    pub username: String,
    pub flags: Flags,
}
impl AuthenticateMessage {
    /// Serializes the Authenticate message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let domain_bytes = encode_utf16_le_string(&self.domain);
        let user_bytes = encode_utf16_le_string(&self.username);
        let legacy = &self.responses.legacy;
        let extended = &self.responses.extended;

        // each field's offset is the previous field's end; checked so that oversized fields are
        // reported instead of wrapping
        let next_offset = |field: &'static str, sb: &SecurityBuffer| -> Result<u32, StoringError> {
            sb.offset.checked_add(u32::from(sb.length))
                .ok_or(StoringError::FieldTooLong { field, length: usize::from(sb.length) })
        };
        let domain_secbuf = SecurityBuffer::new("domain", domain_bytes.len(), DATA_OFFSET)?;
        let user_secbuf = SecurityBuffer::new("username", user_bytes.len(), next_offset("domain", &domain_secbuf)?)?;
        let responses_offset = next_offset("username", &user_secbuf)?;
        let legacy_secbuf = SecurityBuffer::new("legacy response", legacy.len(), responses_offset)?;
        let extended_secbuf = SecurityBuffer::new("extended response", extended.len(), next_offset("legacy response", &legacy_secbuf)?)?;

        // nothing is stored for these; they point to where the responses begin
        let workstation_secbuf = SecurityBuffer::new("workstation", 0, responses_offset)?;
        let session_key_secbuf = SecurityBuffer::new("session key", 0, responses_offset)?;

        let total_len
            = DATA_OFFSET as usize
            + domain_bytes.len()
            + user_bytes.len()
            + legacy.len()
            + extended.len()
            ;
        let mut ret = Vec::with_capacity(total_len);
        ret.extend_from_slice(&NTLMSSP_MAGIC);
        ret.extend_from_slice(&encode_u32_le(MessageType::Authenticate.sequence_number()));
        ret.extend_from_slice(&legacy_secbuf.to_bytes());
        ret.extend_from_slice(&extended_secbuf.to_bytes());
        ret.extend_from_slice(&domain_secbuf.to_bytes());
        ret.extend_from_slice(&user_secbuf.to_bytes());
        ret.extend_from_slice(&workstation_secbuf.to_bytes());
        ret.extend_from_slice(&session_key_secbuf.to_bytes());
        ret.extend_from_slice(&encode_u32_le(self.flags.bits()));
        ret.extend_from_slice(&domain_bytes);
        ret.extend_from_slice(&user_bytes);
        ret.extend_from_slice(legacy);
        ret.extend_from_slice(extended);
        Ok(ret)
    }
}


/// The flags announced in the Authenticate message for the given mode.
pub fn authenticate_flags(mode: ProtocolMode) -> Flags {
    let common
        = Flags::NEGOTIATE_UNICODE
        | Flags::NEGOTIATE_NTLM
        | Flags::NEGOTIATE_ALWAYS_SIGN
        ;
    match mode {
        ProtocolMode::Legacy => common,
        ProtocolMode::Extended => common | Flags::NEGOTIATE_NTLM2_KEY,
    }
}

/// Computes the responses to the server's challenge and builds the serialized Authenticate
/// message.
pub fn build_authenticate<R: ChallengeResponder + ?Sized>(
    config: &HandshakeConfig,
    responder: &R,
    server_nonce: &[u8; SERVER_NONCE_LEN],
    target_info: &[u8],
) -> Result<Vec<u8>, HandshakeError> {
    let responses = compute_responses(responder, config, server_nonce, target_info)?;
    let message = AuthenticateMessage {
        responses,
        domain: config.domain().to_owned(),
        username: config.username().to_owned(),
        flags: authenticate_flags(config.mode()),
    };
    Ok(message.to_bytes()?)
}
