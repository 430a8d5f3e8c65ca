//! The Negotiate message, sent by the client to open the handshake.


use crate::{Flags, NTLMSSP_MAGIC};
use crate::codec::{encode_u32_le, SecurityBuffer};
use crate::config::{HandshakeConfig, ProtocolMode};
use crate::error::StoringError;
use crate::messages::MessageType;


/// The offset of the data block; the fixed part ends after the two domain security buffers.
const DATA_OFFSET: u32
    = 8 // magic
    + 4 // message type
    + 4 // flags
    + 8 // supplied domain secbuffer
    + 8 // requested domain secbuffer
    ;


/// The contents of a Negotiate message.
///
/// The domain is sent as UTF-8 and referenced twice, as the supplied domain and as the domain in
/// which authentication is requested. The client's workstation name is never sent.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct NegotiateMessage {
    pub flags: Flags,
    pub domain: String,
}
impl NegotiateMessage {
    /// Serializes the Negotiate message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let domain_bytes = self.domain.as_bytes();
        let domain_secbuf = SecurityBuffer::new("domain", domain_bytes.len(), DATA_OFFSET)?;

        let mut ret = Vec::with_capacity(DATA_OFFSET as usize + domain_bytes.len());
        ret.extend_from_slice(&NTLMSSP_MAGIC);
        ret.extend_from_slice(&encode_u32_le(MessageType::Negotiate.sequence_number()));
        ret.extend_from_slice(&encode_u32_le(self.flags.bits()));
        ret.extend_from_slice(&domain_secbuf.to_bytes());
        ret.extend_from_slice(&domain_secbuf.to_bytes());
        ret.extend_from_slice(domain_bytes);
        Ok(ret)
    }
}


/// The flags announced in the Negotiate message for the given mode.
pub fn negotiate_flags(mode: ProtocolMode) -> Flags {
    let common
        = Flags::NEGOTIATE_UNICODE
        | Flags::NEGOTIATE_NTLM
        | Flags::NEGOTIATE_DOMAIN_SUPPLIED
        | Flags::NEGOTIATE_WORKSTATION_SUPPLIED
        | Flags::NEGOTIATE_ALWAYS_SIGN
        ;
    match mode {
        ProtocolMode::Legacy => common,
        ProtocolMode::Extended => common | Flags::REQUEST_TARGET | Flags::NEGOTIATE_NTLM2_KEY,
    }
}

/// Builds the serialized Negotiate message for `config`.
pub fn build_negotiate(config: &HandshakeConfig) -> Result<Vec<u8>, StoringError> {
    NegotiateMessage {
        flags: negotiate_flags(config.mode()),
        domain: config.domain().to_owned(),
    }.to_bytes()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_security_buffer, decode_u32_le};

    #[test]
    fn flag_values() {
        assert_eq!(negotiate_flags(ProtocolMode::Legacy).bits(), 0x0000_B201);
        assert_eq!(negotiate_flags(ProtocolMode::Extended).bits(), 0x0008_B205);
    }

    #[test]
    fn legacy_layout() {
        let config = HandshakeConfig::new("corp", "alice", "p@ss", ProtocolMode::Legacy);
        let bytes = build_negotiate(&config).unwrap();

        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[0..8], b"NTLMSSP\0");
        assert_eq!(decode_u32_le(&bytes, 8), Ok(1));
        assert_eq!(decode_u32_le(&bytes, 12), Ok(0xB201));

        let supplied = decode_security_buffer(&bytes, 16).unwrap();
        let requested = decode_security_buffer(&bytes, 24).unwrap();
        assert_eq!(supplied, requested);
        assert_eq!(supplied.length, 4);
        assert_eq!(supplied.capacity, 4);
        assert_eq!(supplied.offset, 32);
        assert_eq!(supplied.apply_to_slice(&bytes), Ok(&b"CORP"[..]));
    }

    #[test]
    fn domain_length_counts_utf8_bytes() {
        let config = HandshakeConfig::new("straße", "alice", "p@ss", ProtocolMode::Extended);
        let bytes = build_negotiate(&config).unwrap();

        // "STRASSE" after uppercasing, all ASCII
        assert_eq!(bytes.len(), 32 + 7);
        assert_eq!(&bytes[32..], b"STRASSE");

        let config = HandshakeConfig::new("höhe", "alice", "p@ss", ProtocolMode::Extended);
        let bytes = build_negotiate(&config).unwrap();
        assert_eq!(bytes.len(), 32 + "HÖHE".len());
        assert_eq!(decode_security_buffer(&bytes, 16).unwrap().length, 5);
    }

    #[test]
    fn empty_domain() {
        let config = HandshakeConfig::new("", "alice", "p@ss", ProtocolMode::Extended);
        let bytes = build_negotiate(&config).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(decode_security_buffer(&bytes, 16).unwrap().offset, 32);
    }

    #[test]
    fn oversized_domain_is_rejected() {
        let domain = "a".repeat(70_000);
        let config = HandshakeConfig::new(&domain, "alice", "p@ss", ProtocolMode::Legacy);
        assert_eq!(
            build_negotiate(&config),
            Err(StoringError::FieldTooLong { field: "domain", length: 70_000 }),
        );
    }
}
