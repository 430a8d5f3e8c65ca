//! The client side of the NTLM challenge-response handshake.
//!
//! The handshake proves knowledge of a password to a server without sending the password itself.
//! It takes two round trips:
//!
//! 1. The client sends a Negotiate message announcing its capabilities and domain.
//! 2. The server answers with a Challenge message carrying a nonce and, optionally, target
//!    information.
//! 3. The client sends an Authenticate message carrying responses computed from the password and
//!    the nonces.
//!
//! Transporting the messages is up to the caller. Sample usage:
//! ```
//! use ntlmhandshake::{AuthenticationContext, HandshakeConfig, NtlmHandshake, ProtocolMode};
//!
//! fn authenticate(exchange: impl Fn(&[u8]) -> Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HandshakeConfig::new("corp", "alice", "p@ss", ProtocolMode::Extended);
//!     let mut handshake = NtlmHandshake::new(config);
//!
//!     let negotiate = handshake.generate_client_context(&[])?;
//!     let challenge = exchange(&negotiate.token);
//!
//!     let authenticate = handshake.generate_client_context(&challenge)?;
//!     assert!(authenticate.complete);
//!     exchange(&authenticate.token);
//!
//!     handshake.release_client_context();
//!     Ok(())
//! }
//! ```


pub mod codec;
pub mod config;
pub mod error;
pub mod handshake;
pub mod messages;
pub mod nonce;
pub mod responses;


use bitflags::bitflags;

pub use crate::config::{ConfigError, HandshakeConfig, ProtocolMode};
pub use crate::error::{DelegateError, FormatError, HandshakeError, ProtocolStateError, StoringError};
pub use crate::handshake::{AuthenticationContext, ContextOutput, HandshakeState, NtlmHandshake};
pub use crate::messages::authenticate::{build_authenticate, AuthenticateMessage};
pub use crate::messages::challenge::{parse_challenge, ChallengeMessage};
pub use crate::messages::negotiate::{build_negotiate, NegotiateMessage};
pub use crate::nonce::{FixedNonceSource, NonceSource, OsNonceSource};
pub use crate::responses::{ChallengeResponder, NtlmResponder, ResponsePair};


/// The magic value at the start of every NTLMSSP data packet.
pub const NTLMSSP_MAGIC: [u8; 8] = *b"NTLMSSP\0";


bitflags! {
    /// NTLM operation flags.
    #[derive(Clone, Copy, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct Flags: u32 {
        const NEGOTIATE_UNICODE = 0x0000_0001;
        const NEGOTIATE_OEM = 0x0000_0002;
        const REQUEST_TARGET = 0x0000_0004;
        const NEGOTIATE_SIGN = 0x0000_0010;
        const NEGOTIATE_SEAL = 0x0000_0020;
        const NEGOTIATE_DATAGRAM = 0x0000_0040;
        const NEGOTIATE_LANMAN_KEY = 0x0000_0080;
        const NEGOTIATE_NTLM = 0x0000_0200;
        const NEGOTIATE_ANONYMOUS = 0x0000_0800;
        const NEGOTIATE_DOMAIN_SUPPLIED = 0x0000_1000;
        const NEGOTIATE_WORKSTATION_SUPPLIED = 0x0000_2000;
        const NEGOTIATE_LOCAL_CALL = 0x0000_4000;
        const NEGOTIATE_ALWAYS_SIGN = 0x0000_8000;
        const TARGET_TYPE_DOMAIN = 0x0001_0000;
        const TARGET_TYPE_SERVER = 0x0002_0000;
        const TARGET_TYPE_SHARE = 0x0004_0000;
        const NEGOTIATE_NTLM2_KEY = 0x0008_0000;
        const REQUEST_INIT_RESPONSE = 0x0010_0000;
        const REQUEST_ACCEPT_RESPONSE = 0x0020_0000;
        const REQUEST_NON_NT_SESSION_KEY = 0x0040_0000;
        const NEGOTIATE_TARGET_INFO = 0x0080_0000;
        const NEGOTIATE_VERSION = 0x0200_0000;
        const NEGOTIATE_128BIT = 0x2000_0000;
        const NEGOTIATE_KEY_EXCHANGE = 0x4000_0000;
        const NEGOTIATE_56BIT = 0x8000_0000;
    }
}
