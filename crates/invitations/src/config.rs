//! Invitation configuration.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! INVITATIONS_RESOURCES_PATH=/plugins/invitations/   # prefix of view paths
//! INVITATIONS_TOKEN_BYTES=32                         # random bytes per token, >= 16
//! INVITATIONS_REGISTER_PATH=/registerUser.html       # where anonymous visitors go
//! INVITATIONS_CLAIM_TIMEOUT_SECS=300                 # abandoned single-use claims expire
//! ```

use std::env;

use invitations_storage::DEFAULT_CLAIM_TIMEOUT_SECS;
use thiserror::Error;

pub const MIN_TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationsConfig {
    /// Prefix under which the presentation layer serves this module's views.
    pub resources_path: String,
    /// Random bytes in a minted token.
    pub token_bytes: usize,
    /// Registration page anonymous visitors are redirected to.
    pub register_path: String,
    /// Seconds before an uncompleted single-use claim is treated as abandoned.
    /// Passed to the store backend when it is built.
    pub claim_timeout_secs: i64,
}

impl Default for InvitationsConfig {
    fn default() -> Self {
        Self {
            resources_path: "/plugins/invitations/".to_string(),
            token_bytes: 32,
            register_path: "/registerUser.html".to_string(),
            claim_timeout_secs: DEFAULT_CLAIM_TIMEOUT_SECS,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid INVITATIONS_TOKEN_BYTES value '{0}': expected a number")]
    InvalidTokenBytes(String),

    #[error("INVITATIONS_TOKEN_BYTES must be at least 16, got {0}")]
    TokenTooShort(usize),
    #[error("Invalid INVITATIONS_CLAIM_TIMEOUT_SECS value '{0}': expected a positive number")]
    InvalidClaimTimeout(String),
}

impl InvitationsConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let resources_path = lookup("INVITATIONS_RESOURCES_PATH")
            .map(|p| if p.ends_with('/') { p } else { format!("{p}/") })
            .unwrap_or(defaults.resources_path);

        let token_bytes = match lookup("INVITATIONS_TOKEN_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidTokenBytes(v.clone()))?,
            None => defaults.token_bytes,
        };
        if token_bytes < MIN_TOKEN_BYTES {
            return Err(ConfigError::TokenTooShort(token_bytes));
        }

        let register_path =
            lookup("INVITATIONS_REGISTER_PATH").unwrap_or(defaults.register_path);

        let claim_timeout_secs = match lookup("INVITATIONS_CLAIM_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidClaimTimeout(v.clone()))?,
            None => defaults.claim_timeout_secs,
        };

        Ok(Self {
            resources_path,
            token_bytes,
            register_path,
            claim_timeout_secs,
        })
    }

    /// Path of a view file shipped with this module.
    pub fn resource(&self, file: &str) -> String {
        format!("{}{}", self.resources_path, file)
    }
}
