use crate::{Result, constants::MAX_ADDRESS, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gate address on the RS-485 bus (0-254).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Address(u8);

impl Address {
    /// Create a new address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` if the address is 255, which collides
    /// with the start-of-message sentinel.
    pub fn new(address: u8) -> Result<Self> {
        if address > MAX_ADDRESS {
            return Err(Error::invalid_request(format!(
                "Address must be 0-{MAX_ADDRESS}, got {address}"
            )));
        }
        Ok(Address(address))
    }

    /// Get the raw address as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Address(crate::constants::DEFAULT_ADDRESS)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let address: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::invalid_request(format!("Invalid address: {s}")))?;
        Address::new(address)
    }
}

impl TryFrom<u8> for Address {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Address::new(value)
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address.0
    }
}
