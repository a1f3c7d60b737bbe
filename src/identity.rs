//! Account identities for consumers, providers and payment hubs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of an account address in bytes.
const ADDRESS_LEN: usize = 20;

/// An account identity, keyed by its hex address.
///
/// Addresses are stored lowercase so that identities compare equal regardless
/// of the checksum casing they were received in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity {
    address: String,
}

impl Identity {
    /// Create an identity from an address without validating it.
    ///
    /// The address is lowercased and given a `0x` prefix if it lacks one. An
    /// empty address stays empty.
    #[must_use]
    pub fn from_address(address: &str) -> Self {
        let lower = address.to_lowercase();
        let address = if lower.is_empty() || lower.starts_with("0x") {
            lower
        } else {
            format!("0x{lower}")
        };
        Self { address }
    }

    /// Parse a `0x`-prefixed, 20-byte hex address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not valid hex of the expected length.
    pub fn parse(address: &str) -> Result<Self> {
        let digits = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .unwrap_or(address);

        let bytes = hex::decode(digits)
            .map_err(|e| Error::InvalidIdentity(format!("{address}: {e}")))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(Error::InvalidIdentity(format!(
                "{address}: expected {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self {
            address: format!("0x{}", hex::encode(bytes)),
        })
    }

    /// The normalized address string.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns true for the zero value (no address).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
