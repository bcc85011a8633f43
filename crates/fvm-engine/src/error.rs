//! Halt reasons and status codes

use bytes::Bytes;
use fvm_repository::RepositoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reason a call frame stopped early
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    /// Out of gas
    #[error("out of gas")]
    OutOfGas,

    /// Stack underflow
    #[error("stack underflow")]
    StackUnderflow,

    /// Stack overflow
    #[error("stack overflow")]
    StackOverflow,

    /// Jump target is not a JUMPDEST
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Undefined or designated-invalid opcode
    #[error("invalid instruction: 0x{0:02x}")]
    InvalidInstruction(u8),

    /// State modification attempted in a static frame
    #[error("state modification in static context")]
    StaticCallViolation,

    /// RETURNDATACOPY past the end of the return buffer
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,

    /// Explicit REVERT with data
    #[error("execution reverted")]
    Revert(Bytes),

    /// Repository fault
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Fault raised by a nested frame or by the engine itself
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for in-frame operations
pub type EvmResult<T> = Result<T, EvmError>;

impl EvmError {
    /// Status reported for a frame that halted with this error
    pub fn status(&self) -> StatusCode {
        match self {
            EvmError::OutOfGas => StatusCode::OutOfGas,
            EvmError::StackUnderflow => StatusCode::StackUnderflow,
            EvmError::StackOverflow => StatusCode::StackOverflow,
            EvmError::InvalidJump(_) => StatusCode::InvalidJumpDestination,
            EvmError::InvalidInstruction(_) => StatusCode::InvalidInstruction,
            EvmError::StaticCallViolation | EvmError::ReturnDataOutOfBounds => {
                StatusCode::Failure
            }
            EvmError::Revert(_) => StatusCode::Revert,
            EvmError::Repository(_) | EvmError::Internal(_) => StatusCode::InternalError,
        }
    }
}

/// Terminal status of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Completed normally
    Success,
    /// Generic failure (static violation, bad return-data access, create failure)
    Failure,
    /// Gas exhausted
    OutOfGas,
    /// Undefined opcode
    InvalidInstruction,
    /// Jump to a non-JUMPDEST position
    InvalidJumpDestination,
    /// Stack grew past its limit
    StackOverflow,
    /// Stack had too few operands
    StackUnderflow,
    /// Explicit REVERT
    Revert,
    /// Nested call would exceed the depth limit
    CallDepthExceeded,
    /// Repository fault; fatal for the whole invocation
    InternalError,
}

impl StatusCode {
    /// Numeric code used by hosts
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Success => 0,
            StatusCode::Failure => 1,
            StatusCode::OutOfGas => 2,
            StatusCode::InvalidInstruction => 3,
            StatusCode::InvalidJumpDestination => 4,
            StatusCode::StackOverflow => 5,
            StatusCode::StackUnderflow => 6,
            StatusCode::Revert => 7,
            StatusCode::CallDepthExceeded => 8,
            StatusCode::InternalError => -1,
        }
    }

    /// Inverse of [`code`](Self::code)
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => StatusCode::Success,
            1 => StatusCode::Failure,
            2 => StatusCode::OutOfGas,
            3 => StatusCode::InvalidInstruction,
            4 => StatusCode::InvalidJumpDestination,
            5 => StatusCode::StackOverflow,
            6 => StatusCode::StackUnderflow,
            7 => StatusCode::Revert,
            8 => StatusCode::CallDepthExceeded,
            -1 => StatusCode::InternalError,
            _ => return None,
        })
    }

    /// Check for SUCCESS
    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }

    /// Fatal halts forfeit all remaining gas and return no data.
    ///
    /// A call rejected by the depth limit never ran, so it is not fatal.
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            StatusCode::Success | StatusCode::Revert | StatusCode::CallDepthExceeded
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::Failure => "FAILURE",
            StatusCode::OutOfGas => "OUT_OF_GAS",
            StatusCode::InvalidInstruction => "INVALID_INSTRUCTION",
            StatusCode::InvalidJumpDestination => "INVALID_JUMP_DESTINATION",
            StatusCode::StackOverflow => "STACK_OVERFLOW",
            StatusCode::StackUnderflow => "STACK_UNDERFLOW",
            StatusCode::Revert => "REVERT",
            StatusCode::CallDepthExceeded => "CALL_DEPTH_EXCEEDED",
            StatusCode::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(name)
    }
}
