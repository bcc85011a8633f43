//! # fvm-repository
//!
//! The account and storage collaborator the VM executes against.
//!
//! The engine never owns state. Everything it reads or writes goes through
//! the [`Repository`] trait, including snapshots used to discard the effects
//! of reverted or failed call frames.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod memory;
mod traits;

pub use error::{RepositoryError, RepositoryResult};
pub use memory::MemoryRepository;
pub use traits::{Account, Repository, SnapshotId};
