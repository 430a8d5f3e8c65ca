use std::sync::{Arc, Once};

use base64::prelude::{BASE64_STANDARD, Engine};
use proptest::prelude::*;

use ntlmhandshake::{
    AuthenticationContext, ChallengeResponder, FixedNonceSource, FormatError, HandshakeConfig,
    HandshakeError, HandshakeState, NtlmHandshake, NtlmResponder, ProtocolMode, ProtocolStateError,
    parse_challenge,
};
use ntlmhandshake::codec::{decode_security_buffer, decode_u32_le, encode_security_buffer};


const SERVER_NONCE: [u8; 8] = [0x53, 0x52, 0x56, 0x4e, 0x4f, 0x4e, 0x43, 0x45];
const TIMESTAMP: i64 = 0x01D9_5F4B_C3A0_0000;


fn setup_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}

/// Builds a Challenge message the way a server would: fixed part, then target name and target
/// info in the data block.
fn server_challenge(target_info: &[u8]) -> Vec<u8> {
    let target_name: Vec<u8> = "CORP".encode_utf16().flat_map(|w| w.to_le_bytes()).collect();
    let data_offset = 56u32;
    let target_info_offset = data_offset + target_name.len() as u32;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"NTLMSSP\0");
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&encode_security_buffer(target_name.len() as u16, data_offset));
    bytes.extend_from_slice(&0x0281_8205u32.to_le_bytes());
    bytes.extend_from_slice(&SERVER_NONCE);
    bytes.extend_from_slice(&[0; 8]);
    bytes.extend_from_slice(&encode_security_buffer(target_info.len() as u16, target_info_offset));
    bytes.extend_from_slice(&[0x0a, 0x00, 0x63, 0x45, 0x00, 0x00, 0x00, 0x0f]);
    bytes.extend_from_slice(&target_name);
    bytes.extend_from_slice(target_info);
    bytes
}

fn target_info() -> Vec<u8> {
    let mut ti = Vec::new();
    for (kind, value) in [(2u16, "CORP"), (1u16, "SQL01")] {
        let data: Vec<u8> = value.encode_utf16().flat_map(|w| w.to_le_bytes()).collect();
        ti.extend_from_slice(&kind.to_le_bytes());
        ti.extend_from_slice(&(data.len() as u16).to_le_bytes());
        ti.extend_from_slice(&data);
    }
    ti.extend_from_slice(&[0; 4]);
    ti
}

fn field<'a>(message: &'a [u8], secbuf_offset: usize) -> &'a [u8] {
    decode_security_buffer(message, secbuf_offset)
        .unwrap()
        .apply_to_slice(message)
        .unwrap()
}

fn utf16_le_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).unwrap()
}


#[test]
fn legacy_exchange_over_base64() {
    setup_tracing();

    let config = HandshakeConfig::new("corp", "alice", "p@ss", ProtocolMode::Legacy);
    let mut handshake = NtlmHandshake::new(config);

    let negotiate = handshake.generate_client_context(&[]).unwrap();
    assert!(!negotiate.complete);
    assert_eq!(negotiate.token.len(), 32 + 4);
    let header = format!("NTLM {}", BASE64_STANDARD.encode(&negotiate.token));
    assert!(header.starts_with("NTLM TlRMTVNTUAAB"));

    let challenge_b64 = BASE64_STANDARD.encode(server_challenge(&[]));
    let challenge = BASE64_STANDARD.decode(challenge_b64).unwrap();
    let authenticate = handshake.generate_client_context(&challenge).unwrap();
    assert!(authenticate.complete);
    assert_eq!(handshake.state(), HandshakeState::Complete);

    let token = &authenticate.token;
    assert_eq!(decode_u32_le(token, 8).unwrap(), 3);
    assert_eq!(utf16_le_to_string(field(token, 28)), "CORP");
    assert_eq!(utf16_le_to_string(field(token, 36)), "alice");
    assert!(field(token, 44).is_empty());

    // the server verifies using the same algorithms
    let reference = NtlmResponder::new();
    assert_eq!(field(token, 12), reference.lm_response("p@ss", &SERVER_NONCE).unwrap().as_slice());
    assert_eq!(field(token, 20), reference.nt_response("p@ss", &SERVER_NONCE).unwrap().as_slice());
    assert_eq!(field(token, 12).len(), 24);
    assert_eq!(field(token, 20).len(), 24);

    let err = handshake.generate_client_context(&challenge).unwrap_err();
    assert!(matches!(err, HandshakeError::ProtocolState(ProtocolStateError::AlreadyComplete)));
}

#[test]
fn extended_exchange_verifies_on_server() {
    setup_tracing();

    let client_nonce = [0x43, 0x4c, 0x49, 0x4e, 0x4f, 0x4e, 0x43, 0x45];
    let config = HandshakeConfig::new("corp", "alice", "p@ss", ProtocolMode::Extended)
        .with_nonce_source(Arc::new(FixedNonceSource::new(vec![client_nonce])));
    let mut handshake = NtlmHandshake::with_responder(config, NtlmResponder::with_timestamp(TIMESTAMP));

    let negotiate = handshake.generate_client_context(&[]).unwrap();
    assert_eq!(decode_u32_le(&negotiate.token, 12).unwrap(), 0x0008_B205);

    let ti = target_info();
    let challenge = server_challenge(&ti);
    assert_eq!(parse_challenge(&challenge).unwrap().target_info, ti);

    let authenticate = handshake.generate_client_context(&challenge).unwrap();
    let token = &authenticate.token;
    assert_eq!(decode_u32_le(token, 60).unwrap(), 0x0008_8201);

    let reference = NtlmResponder::with_timestamp(TIMESTAMP);
    let expected_lm = reference.lmv2_response("CORP", "alice", "p@ss", &SERVER_NONCE, &client_nonce).unwrap();
    let expected_nt = reference.ntlmv2_response("CORP", "alice", "p@ss", &SERVER_NONCE, &ti, &client_nonce).unwrap();
    assert_eq!(field(token, 12), expected_lm.as_slice());
    assert_eq!(field(token, 20), expected_nt.as_slice());
}

#[test]
fn extended_attempts_never_repeat() {
    setup_tracing();

    let run = || {
        let config = HandshakeConfig::new("CORP", "alice", "p@ss", ProtocolMode::Extended);
        let mut handshake = NtlmHandshake::with_responder(config, NtlmResponder::with_timestamp(TIMESTAMP));
        handshake.generate_client_context(&[]).unwrap();
        handshake.generate_client_context(&server_challenge(&target_info())).unwrap().token
    };
    assert_ne!(run(), run());
}

#[test]
fn hostile_target_info_is_rejected() {
    setup_tracing();

    let config = HandshakeConfig::new("CORP", "alice", "p@ss", ProtocolMode::Extended);
    let mut handshake = NtlmHandshake::new(config);
    handshake.generate_client_context(&[]).unwrap();

    let mut challenge = server_challenge(&target_info());
    // claim far more target info than was sent
    challenge[40..42].copy_from_slice(&0x4000u16.to_le_bytes());
    let err = handshake.generate_client_context(&challenge).unwrap_err();
    assert!(matches!(err, HandshakeError::Format(FormatError::RegionOutOfRange { length: 0x4000, .. })));
    assert_eq!(handshake.state(), HandshakeState::Failed);
}


fn minimal_challenge(len: usize, sequence_number: u32, ti_length: u16, ti_offset: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; len.max(48)];
    bytes[0..8].copy_from_slice(b"NTLMSSP\0");
    bytes[8..12].copy_from_slice(&sequence_number.to_le_bytes());
    bytes[40..48].copy_from_slice(&encode_security_buffer(ti_length, ti_offset));
    bytes
}

proptest! {
    #[test]
    fn prop_out_of_range_target_info_is_rejected(
        len in 48usize..256,
        ti_length in any::<u16>(),
        ti_offset in any::<u32>(),
    ) {
        let bytes = minimal_challenge(len, 2, ti_length, ti_offset);
        let end = u64::from(ti_offset) + u64::from(ti_length);
        let result = parse_challenge(&bytes);
        if end > bytes.len() as u64 {
            let is_range_error = matches!(result, Err(FormatError::RegionOutOfRange { .. }));
            prop_assert!(is_range_error);
        } else {
            let message = result.unwrap();
            prop_assert_eq!(message.target_info.as_slice(), &bytes[ti_offset as usize..end as usize]);
        }
    }

    #[test]
    fn prop_in_range_target_info_is_extracted(
        len in 48usize..256,
        start_frac in 0.0f64..1.0,
        len_frac in 0.0f64..1.0,
    ) {
        let offset = (start_frac * len as f64) as usize;
        let length = (len_frac * (len - offset) as f64) as usize;
        let mut bytes = minimal_challenge(len, 2, length as u16, offset as u32);
        for (i, b) in bytes.iter_mut().enumerate().skip(48) {
            *b = i as u8;
        }
        let message = parse_challenge(&bytes).unwrap();
        prop_assert_eq!(message.target_info.as_slice(), &bytes[offset..offset + length]);
        prop_assert_eq!(&message.server_nonce[..], &bytes[24..32]);
    }

    #[test]
    fn prop_wrong_sequence_number_is_rejected(
        sequence_number in any::<u32>().prop_filter("not a challenge", |s| *s != 2),
        ti_length in any::<u16>(),
        ti_offset in any::<u32>(),
    ) {
        let bytes = minimal_challenge(64, sequence_number, ti_length, ti_offset);
        prop_assert_eq!(
            parse_challenge(&bytes),
            Err(FormatError::UnexpectedSequenceNumber { expected: 2, obtained: sequence_number }),
        );
    }

    #[test]
    fn prop_negotiate_length_follows_domain(domain in "[a-zA-Z0-9.\\-]{0,40}") {
        let config = HandshakeConfig::new(&domain, "alice", "p@ss", ProtocolMode::Legacy);
        let mut handshake = NtlmHandshake::new(config);
        let negotiate = handshake.generate_client_context(&[]).unwrap();
        prop_assert_eq!(&negotiate.token[0..8], b"NTLMSSP\0");
        prop_assert_eq!(decode_u32_le(&negotiate.token, 8).unwrap(), 1);
        prop_assert_eq!(negotiate.token.len(), 32 + domain.to_uppercase().len());
    }
}
