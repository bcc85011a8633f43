//! Execution outcome

use crate::error::{EvmError, StatusCode};
use bytes::Bytes;
use fvm_primitives::{Address, H256};

/// Log entry emitted by LOG opcodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    /// Contract address that emitted the log
    pub address: Address,
    /// Log topics (0-4)
    pub topics: Vec<H256>,
    /// Log data
    pub data: Bytes,
}

/// Outcome of one call, built once when the frame ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Terminal status
    pub status: StatusCode,
    /// Gas left for the caller
    pub gas_remaining: u64,
    /// Return data (RETURN) or revert reason (REVERT)
    pub output: Bytes,
    /// Logs emitted by this call and its successful children
    pub logs: Vec<Log>,
    /// Accumulated refund; at the root, the amount actually credited
    pub refund: u64,
    /// Accounts scheduled for deletion, in first-seen order
    pub selfdestructs: Vec<Address>,
}

impl ExecutionResult {
    /// Successful completion
    pub fn success(gas_remaining: u64, output: Bytes) -> Self {
        Self {
            status: StatusCode::Success,
            gas_remaining,
            output,
            logs: Vec::new(),
            refund: 0,
            selfdestructs: Vec::new(),
        }
    }

    /// REVERT keeps its gas and data
    pub fn revert(gas_remaining: u64, output: Bytes) -> Self {
        Self {
            status: StatusCode::Revert,
            ..Self::success(gas_remaining, output)
        }
    }

    /// Fatal halt: no gas, no data
    pub fn fatal(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::success(0, Bytes::new())
        }
    }

    /// Result for a frame that stopped with `error`
    pub fn from_error(error: EvmError, gas_remaining: u64) -> Self {
        match error {
            EvmError::Revert(data) => Self::revert(gas_remaining, data),
            other => Self::fatal(other.status()),
        }
    }

    /// Call never started because the depth limit was reached.
    ///
    /// The forwarded gas is untouched and goes back to the caller.
    pub fn depth_exceeded(gas_remaining: u64) -> Self {
        Self {
            status: StatusCode::CallDepthExceeded,
            ..Self::success(gas_remaining, Bytes::new())
        }
    }

    /// Check for SUCCESS
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check for REVERT
    pub fn is_revert(&self) -> bool {
        self.status == StatusCode::Revert
    }

    /// Gas consumed out of `gas_limit`
    pub fn gas_used(&self, gas_limit: u64) -> u64 {
        gas_limit.saturating_sub(self.gas_remaining)
    }
}
