//! # fvm-primitives
//!
//! Primitive types shared by the FastVM crates.
//!
//! Accounts are identified by 32-byte addresses, so an address and a stack
//! word convert into each other without loss.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;
mod keccak;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{HashError, H256};
pub use keccak::{keccak256, KECCAK_EMPTY};

// Re-export primitive-types for U256
pub use primitive_types::U256;

/// Block number type
pub type BlockNumber = u64;

/// Account nonce type
pub type Nonce = u64;

/// Gas type
pub type Gas = u64;

/// Balance and call value type
pub type Balance = u128;
