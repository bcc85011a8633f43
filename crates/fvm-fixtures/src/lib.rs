//! # fvm-fixtures
//!
//! JSON fixtures for the FastVM engine.
//!
//! A fixture file maps case names to a pre-state, an execution context and
//! the expected outcome:
//!
//! ```json
//! {
//!   "add": {
//!     "exec": { "address": "0xa11ce", "caller": "0xe0a", "code": "0x6001600201", "gas": "0x3e8" },
//!     "pre": {},
//!     "expect": { "status": "SUCCESS", "gasLeft": "0x3df" }
//!   }
//! }
//! ```
//!
//! Every case runs through [`Vm::execute`](fvm_engine::Vm::execute) on a
//! fresh [`MemoryRepository`](fvm_repository::MemoryRepository).

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod runner;
mod types;

pub use error::{FixtureError, FixtureResult};
pub use runner::{FixtureReport, FixtureRunner};
pub use types::*;
