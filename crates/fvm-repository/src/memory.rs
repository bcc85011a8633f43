//! In-memory repository with an undo journal

use crate::error::{RepositoryError, RepositoryResult};
use crate::traits::{Account, Repository, SnapshotId};
use bytes::Bytes;
use fvm_primitives::{Address, Balance, BlockNumber, Nonce, H256};
use std::collections::HashMap;

/// One undoable write
#[derive(Debug, Clone)]
enum JournalEntry {
    /// Account replaced; `None` means it did not exist
    Account {
        address: Address,
        prev: Option<Account>,
    },
    /// Storage slot replaced; `None` means it was unset
    Storage {
        address: Address,
        key: H256,
        prev: Option<H256>,
    },
    /// Account removed together with its storage
    Deleted {
        address: Address,
        prev: Option<Account>,
        slots: Vec<(H256, H256)>,
    },
}

/// Hash-map backed [`Repository`].
///
/// Every write pushes a [`JournalEntry`]; a snapshot is just the current
/// journal length and reverting pops entries back to it.
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    accounts: HashMap<Address, Account>,
    storage: HashMap<(Address, H256), H256>,
    block_hashes: HashMap<BlockNumber, H256>,
    journal: Vec<JournalEntry>,
}

impl MemoryRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account without journaling
    pub fn insert_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    /// Seed a storage slot without journaling
    pub fn insert_storage(&mut self, address: Address, key: H256, value: H256) {
        self.storage.insert((address, key), value);
    }

    /// Register a historical block hash
    pub fn insert_block_hash(&mut self, number: BlockNumber, hash: H256) {
        self.block_hashes.insert(number, hash);
    }

    /// Look up an account
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Non-zero storage slots of an account, sorted by key
    pub fn storage_of(&self, address: &Address) -> Vec<(H256, H256)> {
        let mut slots: Vec<_> = self
            .storage
            .iter()
            .filter(|((a, _), v)| a == address && !v.is_zero())
            .map(|((_, k), v)| (*k, *v))
            .collect();
        slots.sort();
        slots
    }

    /// Drop the journal, making all writes so far permanent
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Number of journaled writes
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    fn update_account<F>(&mut self, address: &Address, f: F) -> RepositoryResult<()>
    where
        F: FnOnce(&mut Account) -> RepositoryResult<()>,
    {
        let prev = self.accounts.get(address).cloned();
        let mut account = prev.clone().unwrap_or_default();
        f(&mut account)?;
        self.journal.push(JournalEntry::Account {
            address: *address,
            prev,
        });
        self.accounts.insert(*address, account);
        Ok(())
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Account { address, prev } => match prev {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            },
            JournalEntry::Storage { address, key, prev } => match prev {
                Some(value) => {
                    self.storage.insert((address, key), value);
                }
                None => {
                    self.storage.remove(&(address, key));
                }
            },
            JournalEntry::Deleted {
                address,
                prev,
                slots,
            } => {
                if let Some(account) = prev {
                    self.accounts.insert(address, account);
                }
                for (key, value) in slots {
                    self.storage.insert((address, key), value);
                }
            }
        }
    }
}

impl Repository for MemoryRepository {
    fn account_exists(&self, address: &Address) -> RepositoryResult<bool> {
        Ok(self.accounts.contains_key(address))
    }

    fn create_account(&mut self, address: &Address) -> RepositoryResult<()> {
        if self.accounts.contains_key(address) {
            return Ok(());
        }
        self.update_account(address, |_| Ok(()))
    }

    fn delete_account(&mut self, address: &Address) -> RepositoryResult<()> {
        let prev = self.accounts.remove(address);
        let keys: Vec<H256> = self
            .storage
            .keys()
            .filter(|(a, _)| a == address)
            .map(|(_, k)| *k)
            .collect();
        let mut slots = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.storage.remove(&(*address, key)) {
                slots.push((key, value));
            }
        }
        self.journal.push(JournalEntry::Deleted {
            address: *address,
            prev,
            slots,
        });
        Ok(())
    }

    fn get_code(&self, address: &Address) -> RepositoryResult<Bytes> {
        Ok(self
            .accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_default())
    }

    fn set_code(&mut self, address: &Address, code: Bytes) -> RepositoryResult<()> {
        self.update_account(address, |account| {
            account.code = code;
            Ok(())
        })
    }

    fn get_storage(&self, address: &Address, key: &H256) -> RepositoryResult<H256> {
        Ok(self
            .storage
            .get(&(*address, *key))
            .copied()
            .unwrap_or(H256::ZERO))
    }

    fn set_storage(&mut self, address: &Address, key: H256, value: H256) -> RepositoryResult<()> {
        let prev = self.storage.insert((*address, key), value);
        self.journal.push(JournalEntry::Storage {
            address: *address,
            key,
            prev,
        });
        Ok(())
    }

    fn get_balance(&self, address: &Address) -> RepositoryResult<Balance> {
        Ok(self.accounts.get(address).map(|a| a.balance).unwrap_or(0))
    }

    fn transfer(&mut self, from: &Address, to: &Address, value: Balance) -> RepositoryResult<()> {
        let available = self.get_balance(from)?;
        if available < value {
            return Err(RepositoryError::InsufficientBalance {
                address: *from,
                available,
                required: value,
            });
        }
        if from == to {
            return self.create_account(to);
        }
        if self.get_balance(to)?.checked_add(value).is_none() {
            return Err(RepositoryError::BalanceOverflow(*to));
        }
        self.update_account(from, |account| {
            account.balance -= value;
            Ok(())
        })?;
        let to_addr = *to;
        self.update_account(to, |account| {
            account.balance = account
                .balance
                .checked_add(value)
                .ok_or(RepositoryError::BalanceOverflow(to_addr))?;
            Ok(())
        })
    }

    fn get_nonce(&self, address: &Address) -> RepositoryResult<Nonce> {
        Ok(self.accounts.get(address).map(|a| a.nonce).unwrap_or(0))
    }

    fn increment_nonce(&mut self, address: &Address) -> RepositoryResult<Nonce> {
        let old = self.get_nonce(address)?;
        let addr = *address;
        self.update_account(address, |account| {
            account.nonce = account
                .nonce
                .checked_add(1)
                .ok_or(RepositoryError::NonceOverflow(addr))?;
            Ok(())
        })?;
        Ok(old)
    }

    fn get_block_hash(&self, number: BlockNumber) -> RepositoryResult<H256> {
        Ok(self.block_hashes.get(&number).copied().unwrap_or(H256::ZERO))
    }

    fn snapshot(&mut self) -> SnapshotId {
        self.journal.len()
    }

    fn revert_to(&mut self, id: SnapshotId) -> RepositoryResult<()> {
        if id > self.journal.len() {
            return Err(RepositoryError::UnknownSnapshot(id));
        }
        let undone = self.journal.len() - id;
        while self.journal.len() > id {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        tracing::trace!(snapshot = id, undone, "repository reverted");
        Ok(())
    }
}
