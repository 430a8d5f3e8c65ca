//! The three messages of the handshake.


pub mod authenticate;
pub mod challenge;
pub mod negotiate;


/// The type of an NTLM message, identified by the 32-bit sequence number following the magic.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MessageType {
    Negotiate,
    Challenge,
    Authenticate,
}
impl MessageType {
    /// Returns the sequence number identifying this message type.
    pub fn sequence_number(&self) -> u32 {
        match self {
            Self::Negotiate => 0x0000_0001,
            Self::Challenge => 0x0000_0002,
            Self::Authenticate => 0x0000_0003,
        }
    }
}
