//! Sources of client nonces.


use std::fmt;
use std::sync::Mutex;

use rand::RngCore;
use rand::rngs::OsRng;


/// The length of a client nonce.
pub const CLIENT_NONCE_LEN: usize = 8;


/// Produces the random client nonces used by the extended response scheme.
///
/// A single source may be shared between handshakes running on different threads.
pub trait NonceSource: Send + Sync {
    /// Returns a fresh nonce. Must never return the same value twice in practice.
    fn client_nonce(&self) -> [u8; CLIENT_NONCE_LEN];
}


/// Draws nonces from the operating system's random number generator.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct OsNonceSource;
impl NonceSource for OsNonceSource {
    fn client_nonce(&self) -> [u8; CLIENT_NONCE_LEN] {
        let mut nonce = [0u8; CLIENT_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}


/// Hands out a predetermined sequence of nonces; useful for reproducible tests.
///
/// Once the sequence is exhausted, the last nonce is incremented (as a little-endian integer) for
/// every further request, so consecutive nonces still differ.
pub struct FixedNonceSource {
    state: Mutex<(Vec<[u8; CLIENT_NONCE_LEN]>, u64)>,
}
impl FixedNonceSource {
    /// Creates a source returning `nonces` in order.
    pub fn new(nonces: Vec<[u8; CLIENT_NONCE_LEN]>) -> Self {
        let mut queue = nonces;
        queue.reverse();
        Self {
            state: Mutex::new((queue, 0)),
        }
    }

    /// Creates a source counting upwards from `first`.
    pub fn counting_from(first: [u8; CLIENT_NONCE_LEN]) -> Self {
        Self {
            state: Mutex::new((Vec::new(), u64::from_le_bytes(first))),
        }
    }
}
impl NonceSource for FixedNonceSource {
    fn client_nonce(&self) -> [u8; CLIENT_NONCE_LEN] {
        // a poisoned lock only means another test thread panicked; the counter is still usable
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (queue, counter) = &mut *guard;
        let nonce = match queue.pop() {
            Some(n) => n,
            None => {
                let n = counter.to_le_bytes();
                *counter = counter.wrapping_add(1);
                return n;
            },
        };
        *counter = u64::from_le_bytes(nonce).wrapping_add(1);
        nonce
    }
}
impl fmt::Debug for FixedNonceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedNonceSource").finish_non_exhaustive()
    }
}
