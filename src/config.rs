//! Handshake configuration.


use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

use crate::nonce::{NonceSource, OsNonceSource};


/// Property key holding the domain.
pub const PROPERTY_DOMAIN: &str = "domain";

/// Property key holding the username.
pub const PROPERTY_USER: &str = "user";

/// Property key holding the password.
pub const PROPERTY_PASSWORD: &str = "password";

/// Property key selecting the response scheme: `1` for legacy, `2` for extended.
pub const PROPERTY_NTLM: &str = "ntlm";


/// The scheme used to compute responses to the server's challenge.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ProtocolMode {
    /// LM and NTLM (version 1) responses.
    Legacy,

    /// LMv2 and NTLMv2 responses, which involve a client nonce and the server's target info.
    Extended,
}
impl Default for ProtocolMode {
    fn default() -> Self {
        Self::Extended
    }
}


/// An error in the key/value configuration.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ConfigError {
    /// A required property has not been set.
    MissingProperty { key: &'static str },

    /// The protocol mode property has a value other than `1` or `2`.
    InvalidProtocolMode { value: String },
}
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingProperty { key }
                => write!(f, "required property {:?} is not set", key),
            Self::InvalidProtocolMode { value }
                => write!(f, "invalid NTLM protocol mode {:?} (expected 1 or 2)", value),
        }
    }
}
impl Error for ConfigError {
}


/// Everything a handshake needs to know about the client.
///
/// The domain is stored in uppercase. The password is wiped from memory when the configuration is
/// dropped and is never printed by the `Debug` implementation.
#[derive(Clone)]
pub struct HandshakeConfig {
    domain: String,
    username: String,
    password: String,
    mode: ProtocolMode,
    nonce_source: Arc<dyn NonceSource>,
}
impl HandshakeConfig {
    /// Creates a configuration drawing client nonces from the operating system.
    pub fn new(domain: &str, username: &str, password: &str, mode: ProtocolMode) -> Self {
        Self {
            domain: domain.to_uppercase(),
            username: username.to_owned(),
            password: password.to_owned(),
            mode,
            nonce_source: Arc::new(OsNonceSource),
        }
    }

    /// Reads the configuration from connection properties.
    ///
    /// `domain`, `user` and `password` are required; `ntlm` defaults to the extended scheme.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            properties.get(key)
                .ok_or(ConfigError::MissingProperty { key })
        };

        let domain = required(PROPERTY_DOMAIN)?;
        let username = required(PROPERTY_USER)?;
        let password = required(PROPERTY_PASSWORD)?;
        let mode = match properties.get(PROPERTY_NTLM).map(|v| v.trim()) {
            None => ProtocolMode::default(),
            Some("1") => ProtocolMode::Legacy,
            Some("2") => ProtocolMode::Extended,
            Some(other) => return Err(ConfigError::InvalidProtocolMode { value: other.to_owned() }),
        };

        Ok(Self::new(domain, username, password, mode))
    }

    /// Replaces the source of client nonces.
    pub fn with_nonce_source(mut self, nonce_source: Arc<dyn NonceSource>) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// The domain, in uppercase.
    pub fn domain(&self) -> &str { &self.domain }

    pub fn username(&self) -> &str { &self.username }

    pub(crate) fn password(&self) -> &str { &self.password }

    pub fn mode(&self) -> ProtocolMode { self.mode }

    pub fn nonce_source(&self) -> &dyn NonceSource { self.nonce_source.as_ref() }
}
impl fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
impl Drop for HandshakeConfig {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}
