//! Repository error types

use fvm_primitives::{Address, Balance};
use thiserror::Error;

/// Repository errors.
///
/// The engine treats every one of these as an internal fault of the whole
/// invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Transfer source cannot cover the value
    #[error("insufficient balance in {address}: have {available}, need {required}")]
    InsufficientBalance {
        /// Source account
        address: Address,
        /// Balance held
        available: Balance,
        /// Value requested
        required: Balance,
    },

    /// Balance would exceed the representable range
    #[error("balance overflow in {0}")]
    BalanceOverflow(Address),

    /// Nonce would wrap
    #[error("nonce overflow in {0}")]
    NonceOverflow(Address),

    /// Snapshot id was never issued or was already reverted past
    #[error("unknown snapshot: {0}")]
    UnknownSnapshot(usize),

    /// Failure in an external storage backend
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;
