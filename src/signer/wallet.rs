//! Platform wallet key handling.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::signer::{SignerError, SignerResult};

/// The platform's signing key.
#[derive(Clone)]
pub struct PlatformWallet {
    signer: PrivateKeySigner,
}

impl PlatformWallet {
    /// Parse a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> SignerResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| SignerError::InvalidKey(format!("{}", e)))?;

        tracing::info!(address = %signer.address(), "Platform wallet loaded");
        Ok(Self { signer })
    }

    /// Load the key from the named environment variable. An unset or empty
    /// variable yields [`SignerError::NotConfigured`].
    pub fn from_env(var: &str) -> SignerResult<Self> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Self::from_private_key(&key),
            _ => Err(SignerError::NotConfigured),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub(crate) fn signer(&self) -> PrivateKeySigner {
        self.signer.clone()
    }
}

impl std::fmt::Debug for PlatformWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformWallet").field("address", &self.address()).finish()
    }
}
