//! 32-byte account address

use primitive_types::U256;
use std::fmt;
use thiserror::Error;

/// Address parsing error
#[derive(Debug, Error)]
pub enum AddressError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid address length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Account address.
///
/// Addresses fill a whole 256-bit word, so values popped off the stack map
/// directly onto accounts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Size of address in bytes
    pub const LEN: usize = 32;

    /// Zero address
    pub const ZERO: Address = Address([0u8; 32]);

    /// Create address from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }

    /// Create address from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        if slice.len() != Self::LEN {
            return Err(AddressError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Address(bytes))
    }

    /// Parse address from hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Short-hand for an address whose low 8 bytes hold `n`.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Address(bytes)
    }

    /// Interpret a stack word as an address
    pub fn from_u256(word: U256) -> Self {
        let mut bytes = [0u8; 32];
        word.to_big_endian(&mut bytes);
        Address(bytes)
    }

    /// Convert to a stack word
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Get as byte array
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }
}

impl From<U256> for Address {
    fn from(word: U256) -> Self {
        Address::from_u256(word)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0xa0f1c2d3e4b5a69788796a5b4c3d2e1f00112233445566778899aabbccddeeff";

    #[test]
    fn test_address_from_hex() {
        let addr = Address::from_hex(SAMPLE).unwrap();
        assert!(!addr.is_zero());

        let addr2 = Address::from_hex(SAMPLE.trim_start_matches("0x")).unwrap();
        assert_eq!(addr, addr2);
    }

    #[test]
    fn test_zero_address() {
        let zero = Address::ZERO;
        assert!(zero.is_zero());
        assert_eq!(zero.to_hex(), format!("0x{}", "0".repeat(64)));
    }

    #[test]
    fn test_address_display_is_lowercase() {
        let addr = Address::from_hex(&SAMPLE.to_uppercase().replace("0X", "0x")).unwrap();
        assert_eq!(format!("{}", addr), SAMPLE);
    }

    #[test]
    fn test_address_from_hex_invalid_chars() {
        let bad = format!("0x{}zz", "00".repeat(31));
        match Address::from_hex(&bad) {
            Err(AddressError::InvalidHex(_)) => {}
            other => panic!("expected InvalidHex, got {:?}", other),
        }
    }

    #[test]
    fn test_address_twenty_bytes_rejected() {
        let result = Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d");
        assert!(matches!(result, Err(AddressError::InvalidLength(20))));
    }

    #[test]
    fn test_from_low_u64() {
        let addr = Address::from_low_u64(0x1234);
        assert_eq!(addr.to_u256(), U256::from(0x1234));
        assert_eq!(addr.as_bytes()[30..], [0x12, 0x34]);
    }

    #[test]
    fn test_u256_roundtrip_high_bits() {
        let word = U256::MAX - U256::from(7);
        assert_eq!(Address::from(word).to_u256(), word);
    }

    #[test]
    fn test_from_str() {
        let addr: Address = SAMPLE.parse().unwrap();
        assert_eq!(addr.to_hex(), SAMPLE);
    }
}
