//! Repository trait used by the engine

use crate::error::RepositoryResult;
use bytes::Bytes;
use fvm_primitives::{keccak256, Address, Balance, BlockNumber, Nonce, H256};

/// Handle returned by [`Repository::snapshot`]
pub type SnapshotId = usize;

/// Account data
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Account nonce
    pub nonce: Nonce,
    /// Account balance
    pub balance: Balance,
    /// Deployed code
    pub code: Bytes,
}

impl Account {
    /// Create an account holding `balance`
    pub fn with_balance(balance: Balance) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// Builder-style code setter
    pub fn with_code(mut self, code: impl Into<Bytes>) -> Self {
        self.code = code.into();
        self
    }

    /// Check if account is empty (no nonce, balance or code)
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance == 0 && self.code.is_empty()
    }

    /// Check if account has code
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }
}

/// Code and state access for contract execution.
///
/// Writes must be undoable: the engine takes a [`snapshot`](Repository::snapshot)
/// on entry to every call frame and calls [`revert_to`](Repository::revert_to)
/// when the frame reverts or halts exceptionally.
pub trait Repository {
    /// Check if account exists
    fn account_exists(&self, address: &Address) -> RepositoryResult<bool>;

    /// Create an empty account if none exists
    fn create_account(&mut self, address: &Address) -> RepositoryResult<()>;

    /// Remove an account and its storage
    fn delete_account(&mut self, address: &Address) -> RepositoryResult<()>;

    /// Get deployed code (empty for accounts without code)
    fn get_code(&self, address: &Address) -> RepositoryResult<Bytes>;

    /// Replace the code of an account, creating it if needed
    fn set_code(&mut self, address: &Address, code: Bytes) -> RepositoryResult<()>;

    /// Get storage value (zero when unset)
    fn get_storage(&self, address: &Address, key: &H256) -> RepositoryResult<H256>;

    /// Set storage value
    fn set_storage(&mut self, address: &Address, key: H256, value: H256) -> RepositoryResult<()>;

    /// Get account balance (zero for missing accounts)
    fn get_balance(&self, address: &Address) -> RepositoryResult<Balance>;

    /// Move `value` between accounts, creating the recipient if needed
    fn transfer(&mut self, from: &Address, to: &Address, value: Balance) -> RepositoryResult<()>;

    /// Get account nonce
    fn get_nonce(&self, address: &Address) -> RepositoryResult<Nonce>;

    /// Increment the nonce, returning the value before the increment
    fn increment_nonce(&mut self, address: &Address) -> RepositoryResult<Nonce>;

    /// Hash of a historical block, zero if unknown
    fn get_block_hash(&self, number: BlockNumber) -> RepositoryResult<H256>;

    /// Mark the current state so it can be restored later
    fn snapshot(&mut self) -> SnapshotId;

    /// Undo every write made since `id` was issued
    fn revert_to(&mut self, id: SnapshotId) -> RepositoryResult<()>;

    /// Keccak hash of the account code; zero for missing accounts
    fn get_code_hash(&self, address: &Address) -> RepositoryResult<H256> {
        if !self.account_exists(address)? {
            return Ok(H256::ZERO);
        }
        Ok(keccak256(&self.get_code(address)?))
    }
}
