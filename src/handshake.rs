//! The client side of the handshake as a state machine.
//!
//! ```plain
//!   Start ──(no input)──▶ AwaitingChallenge ──(Challenge)──▶ Complete
//!                                │
//!                                └──(malformed Challenge, responder error)──▶ Failed
//! ```
//!
//! Every call that is not allowed in the current state is rejected with a
//! [`ProtocolStateError`]; nothing is retried.


use tracing::{debug, instrument, trace};

use crate::config::HandshakeConfig;
use crate::error::{HandshakeError, ProtocolStateError};
use crate::messages::authenticate::build_authenticate;
use crate::messages::challenge::parse_challenge;
use crate::messages::negotiate::build_negotiate;
use crate::responses::{ChallengeResponder, NtlmResponder};


/// The state of a handshake.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HandshakeState {
    /// Nothing has been sent yet.
    Start,

    /// The Negotiate message has been produced; the server's Challenge is expected next.
    AwaitingChallenge,

    /// The Authenticate message has been produced.
    Complete,

    /// A step of the handshake failed; the attempt cannot continue.
    Failed,
}


/// A token to be sent to the server.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ContextOutput {
    /// The message, to be sent verbatim.
    pub token: Vec<u8>,

    /// Whether this was the last message of the handshake.
    pub complete: bool,
}


/// An authentication mechanism driven by exchanging opaque tokens with the server.
pub trait AuthenticationContext {
    /// Consumes the server's latest token (empty on the first call) and produces the next token
    /// to send.
    fn generate_client_context(&mut self, input: &[u8]) -> Result<ContextOutput, HandshakeError>;

    /// Drops any state held for the handshake. May be called any number of times.
    fn release_client_context(&mut self);
}


/// An NTLM handshake for a single connection attempt.
pub struct NtlmHandshake<R = NtlmResponder> {
    config: Option<HandshakeConfig>,
    responder: R,
    state: HandshakeState,
}
impl NtlmHandshake<NtlmResponder> {
    /// Creates a handshake computing responses with the standard algorithms.
    pub fn new(config: HandshakeConfig) -> Self {
        Self::with_responder(config, NtlmResponder::new())
    }
}
impl<R: ChallengeResponder> NtlmHandshake<R> {
    /// Creates a handshake computing responses using `responder`.
    pub fn with_responder(config: HandshakeConfig, responder: R) -> Self {
        Self {
            config: Some(config),
            responder,
            state: HandshakeState::Start,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == HandshakeState::Complete
    }

    fn negotiate(&mut self, config: &HandshakeConfig) -> Result<ContextOutput, HandshakeError> {
        let token = build_negotiate(config)
            .map_err(|e| self.fail(e.into()))?;
        trace!(len = token.len(), "built Negotiate message");

        self.transition(HandshakeState::AwaitingChallenge);
        Ok(ContextOutput { token, complete: false })
    }

    fn authenticate(&mut self, config: &HandshakeConfig, input: &[u8]) -> Result<ContextOutput, HandshakeError> {
        // the instrument attribute on generate_client_context reports the error
        let challenge = parse_challenge(input)
            .map_err(|e| self.fail(e.into()))?;
        trace!(len = input.len(), target_info_len = challenge.target_info.len(), "parsed Challenge message");

        let token = build_authenticate(config, &self.responder, &challenge.server_nonce, &challenge.target_info)
            .map_err(|e| self.fail(e))?;
        trace!(len = token.len(), "built Authenticate message");

        self.transition(HandshakeState::Complete);
        Ok(ContextOutput { token, complete: true })
    }

    fn transition(&mut self, next: HandshakeState) {
        debug!(from = ?self.state, to = ?next, "handshake state transition");
        self.state = next;
    }

    fn fail(&mut self, error: HandshakeError) -> HandshakeError {
        self.transition(HandshakeState::Failed);
        error
    }
}
impl<R: ChallengeResponder> AuthenticationContext for NtlmHandshake<R> {
    #[instrument(level = "debug", err, fields(state = ?self.state), skip_all)]
    fn generate_client_context(&mut self, input: &[u8]) -> Result<ContextOutput, HandshakeError> {
        // taken out for the duration of the step, so that it can be borrowed alongside self
        let config = self.config.take()
            .ok_or(ProtocolStateError::Released)?;

        let result = match (self.state, input.is_empty()) {
            (HandshakeState::Start, true) => self.negotiate(&config),
            (HandshakeState::Start, false)
                => Err(ProtocolStateError::UnexpectedInput { state: self.state }.into()),
            (HandshakeState::AwaitingChallenge, false) => self.authenticate(&config, input),
            (HandshakeState::AwaitingChallenge, true)
                => Err(ProtocolStateError::MissingInput { state: self.state }.into()),
            (HandshakeState::Complete, _)
                => Err(ProtocolStateError::AlreadyComplete.into()),
            (HandshakeState::Failed, _)
                => Err(ProtocolStateError::Failed.into()),
        };

        self.config = Some(config);
        result
    }

    #[instrument(level = "debug", fields(state = ?self.state), skip_all)]
    fn release_client_context(&mut self) {
        if self.config.take().is_some() {
            debug!("released handshake context");
        }
    }
}
