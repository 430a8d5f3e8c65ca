//! Computation of the responses to a server challenge.
//!
//! The handshake only relies on the [`ChallengeResponder`] trait. [`NtlmResponder`] implements it
//! with the standard LM, NTLM, LMv2 and NTLMv2 algorithms.


use chrono::{NaiveDate, Utc};
use cipher::{BlockEncrypt, KeyInit};
use cipher::generic_array::GenericArray;
use cipher::generic_array::typenum::U8;
use des::Des;
use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;
use zeroize::Zeroize;

use crate::codec::encode_utf16_le_string;
use crate::config::{HandshakeConfig, ProtocolMode};
use crate::error::DelegateError;
use crate::nonce::CLIENT_NONCE_LEN;


/// The length of the server's challenge nonce.
pub const SERVER_NONCE_LEN: usize = 8;


/// The pair of responses carried by the Authenticate message.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResponsePair {
    /// The LM response (legacy scheme) or the LMv2 response (extended scheme).
    pub legacy: Vec<u8>,

    /// The NTLM response (legacy scheme) or the NTLMv2 response (extended scheme).
    pub extended: Vec<u8>,
}


/// Turns a password and the challenge nonces into response digests.
///
/// Implementations must be pure functions of their inputs (apart from any timestamp the NTLMv2
/// response embeds).
pub trait ChallengeResponder {
    /// Calculates the LM response of the legacy scheme.
    fn lm_response(&self, password: &str, server_nonce: &[u8; SERVER_NONCE_LEN]) -> Result<Vec<u8>, DelegateError>;

    /// Calculates the NTLM response of the legacy scheme.
    fn nt_response(&self, password: &str, server_nonce: &[u8; SERVER_NONCE_LEN]) -> Result<Vec<u8>, DelegateError>;

    /// Calculates the LMv2 response of the extended scheme.
    fn lmv2_response(
        &self,
        domain: &str,
        username: &str,
        password: &str,
        server_nonce: &[u8; SERVER_NONCE_LEN],
        client_nonce: &[u8; CLIENT_NONCE_LEN],
    ) -> Result<Vec<u8>, DelegateError>;

    /// Calculates the NTLMv2 response of the extended scheme.
    fn ntlmv2_response(
        &self,
        domain: &str,
        username: &str,
        password: &str,
        server_nonce: &[u8; SERVER_NONCE_LEN],
        target_info: &[u8],
        client_nonce: &[u8; CLIENT_NONCE_LEN],
    ) -> Result<Vec<u8>, DelegateError>;
}


/// Calculates both responses for the scheme selected in `config`.
///
/// A client nonce is drawn from the configured source only for the extended scheme.
pub fn compute_responses<R: ChallengeResponder + ?Sized>(
    responder: &R,
    config: &HandshakeConfig,
    server_nonce: &[u8; SERVER_NONCE_LEN],
    target_info: &[u8],
) -> Result<ResponsePair, DelegateError> {
    match config.mode() {
        ProtocolMode::Legacy => {
            let legacy = responder.lm_response(config.password(), server_nonce)?;
            let extended = responder.nt_response(config.password(), server_nonce)?;
            Ok(ResponsePair { legacy, extended })
        },
        ProtocolMode::Extended => {
            let mut client_nonce = config.nonce_source().client_nonce();
            let result = (|| -> Result<ResponsePair, DelegateError> {
                let legacy = responder.lmv2_response(
                    config.domain(), config.username(), config.password(),
                    server_nonce, &client_nonce,
                )?;
                let extended = responder.ntlmv2_response(
                    config.domain(), config.username(), config.password(),
                    server_nonce, target_info, &client_nonce,
                )?;
                Ok(ResponsePair { legacy, extended })
            })();
            client_nonce.zeroize();
            result
        },
    }
}


/// Obtains the current NTLM timestamp: tenths of a microsecond since 1601-01-01T00:00:00Z.
pub fn get_ntlm_time() -> Result<i64, DelegateError> {
    let windows_epoch = NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DelegateError::new("the NTLM epoch is not representable"))?
        .and_utc();
    let delta = Utc::now() - windows_epoch;
    let micros = delta.num_microseconds()
        .ok_or_else(|| DelegateError::new("the current time is too far from the NTLM epoch"))?;
    micros.checked_mul(10)
        .ok_or_else(|| DelegateError::new("the current time is too far from the NTLM epoch"))
}


/// Performs the three-key DES encryption that turns a 16-byte key into a 24-byte response.
pub fn des_long(key: &[u8; 16], data: &[u8; 8]) -> [u8; 24] {
    let keys: [[u8; 7]; 3] = [
        [key[0], key[1], key[2], key[3], key[4], key[5], key[6]],
        [key[7], key[8], key[9], key[10], key[11], key[12], key[13]],
        [key[14], key[15], 0, 0, 0, 0, 0],
    ];

    let mut ret = [0u8; 24];
    for (des_key, out) in keys.iter().zip(ret.chunks_exact_mut(8)) {
        out.copy_from_slice(&des_encrypt(des_key, data));
    }
    ret
}

/// Spreads 56 key bits over the upper seven bits of each of eight bytes, as DES expects.
fn expand_des_key(key7: &[u8; 7]) -> [u8; 8] {
    let mut bits = [0u8; 8];
    bits[1..8].copy_from_slice(key7);
    let bits = u64::from_be_bytes(bits);

    let mut key8 = [0u8; 8];
    for (i, b) in key8.iter_mut().enumerate() {
        // 7 bits per byte, most significant first; the parity bit stays clear
        let chunk = (bits >> (49 - 7 * i)) & 0x7F;
        *b = (chunk as u8) << 1;
    }
    key8
}

/// Encrypts a single block using a 56-bit DES key.
fn des_encrypt(key7: &[u8; 7], data: &[u8; 8]) -> [u8; 8] {
    let mut key8 = expand_des_key(key7);
    let des = Des::new(GenericArray::from_slice(&key8));
    key8.zeroize();

    let mut block: GenericArray<u8, U8> = GenericArray::clone_from_slice(data);
    des.encrypt_block(&mut block);
    block.into()
}

/// Derives the LM key: the uppercase password, padded or truncated to 14 bytes, is split into two
/// DES keys that each encrypt the constant `KGS!@#$%`.
pub fn lm_password_key(password: &str) -> [u8; 16] {
    const LM_MAGIC: [u8; 8] = *b"KGS!@#$%";

    let mut password_bytes = password.to_uppercase().into_bytes();
    password_bytes.resize(14, 0x00);
    let mut halves = [[0u8; 7]; 2];
    halves[0].copy_from_slice(&password_bytes[0..7]);
    halves[1].copy_from_slice(&password_bytes[7..14]);
    password_bytes.zeroize();

    let mut output = [0u8; 16];
    output[0..8].copy_from_slice(&des_encrypt(&halves[0], &LM_MAGIC));
    output[8..16].copy_from_slice(&des_encrypt(&halves[1], &LM_MAGIC));
    halves.zeroize();
    output
}

/// Derives the NT key: MD4 of the password encoded as UTF-16LE.
pub fn nt_password_key(password: &str) -> [u8; 16] {
    let mut password_bytes = encode_utf16_le_string(password);
    let digest = <Md4 as Digest>::digest(&password_bytes);
    password_bytes.zeroize();

    let mut ret = [0u8; 16];
    ret.copy_from_slice(digest.as_slice());
    ret
}

/// Derives the NTLMv2 key: HMAC-MD5 keyed with the NT key over the uppercase username followed by
/// the domain, both encoded as UTF-16LE.
pub fn ntlmv2_password_key(domain: &str, username: &str, password: &str) -> Result<[u8; 16], DelegateError> {
    let mut nt_key = nt_password_key(password);
    let mut identity = encode_utf16_le_string(&username.to_uppercase());
    identity.extend_from_slice(&encode_utf16_le_string(domain));
    let result = hmac_md5(&nt_key, &[&identity[..]]);
    nt_key.zeroize();
    result
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16], DelegateError> {
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key)
        .map_err(|_| DelegateError::new("invalid HMAC-MD5 key length"))?;
    for part in parts {
        mac.update(part);
    }
    let mut ret = [0u8; 16];
    ret.copy_from_slice(mac.finalize().into_bytes().as_slice());
    Ok(ret)
}

/// Assembles the NTLMv2 client blob.
fn ntlmv2_blob(timestamp: i64, client_nonce: &[u8; CLIENT_NONCE_LEN], target_info: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(28 + target_info.len() + 4);
    blob.push(0x01); // response version
    blob.push(0x01); // highest response version
    blob.extend_from_slice(&[0x00; 6]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(client_nonce);
    blob.extend_from_slice(&[0x00; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0x00; 4]);
    blob
}


/// The standard response algorithms.
///
/// NTLMv2 responses embed the current time unless a fixed timestamp has been configured.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct NtlmResponder {
    timestamp: Option<i64>,
}
impl NtlmResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a responder embedding `timestamp` in every NTLMv2 response instead of the current
    /// time.
    pub fn with_timestamp(timestamp: i64) -> Self {
        Self { timestamp: Some(timestamp) }
    }

    fn timestamp(&self) -> Result<i64, DelegateError> {
        match self.timestamp {
            Some(t) => Ok(t),
            None => get_ntlm_time(),
        }
    }
}
impl ChallengeResponder for NtlmResponder {
    fn lm_response(&self, password: &str, server_nonce: &[u8; SERVER_NONCE_LEN]) -> Result<Vec<u8>, DelegateError> {
        let mut key = lm_password_key(password);
        let response = des_long(&key, server_nonce);
        key.zeroize();
        Ok(Vec::from(response))
    }

    fn nt_response(&self, password: &str, server_nonce: &[u8; SERVER_NONCE_LEN]) -> Result<Vec<u8>, DelegateError> {
        let mut key = nt_password_key(password);
        let response = des_long(&key, server_nonce);
        key.zeroize();
        Ok(Vec::from(response))
    }

    fn lmv2_response(
        &self,
        domain: &str,
        username: &str,
        password: &str,
        server_nonce: &[u8; SERVER_NONCE_LEN],
        client_nonce: &[u8; CLIENT_NONCE_LEN],
    ) -> Result<Vec<u8>, DelegateError> {
        let mut key = ntlmv2_password_key(domain, username, password)?;
        let proof = hmac_md5(&key, &[&server_nonce[..], &client_nonce[..]]);
        key.zeroize();

        let mut response = Vec::with_capacity(16 + CLIENT_NONCE_LEN);
        response.extend_from_slice(&proof?);
        response.extend_from_slice(client_nonce);
        Ok(response)
    }

    fn ntlmv2_response(
        &self,
        domain: &str,
        username: &str,
        password: &str,
        server_nonce: &[u8; SERVER_NONCE_LEN],
        target_info: &[u8],
        client_nonce: &[u8; CLIENT_NONCE_LEN],
    ) -> Result<Vec<u8>, DelegateError> {
        let blob = ntlmv2_blob(self.timestamp()?, client_nonce, target_info);

        let mut key = ntlmv2_password_key(domain, username, password)?;
        let proof = hmac_md5(&key, &[&server_nonce[..], &blob[..]]);
        key.zeroize();

        let mut response = Vec::with_capacity(16 + blob.len());
        response.extend_from_slice(&proof?);
        response.extend_from_slice(&blob);
        Ok(response)
    }
}
