//! Execution context for a call frame

use bytes::Bytes;
use fvm_primitives::{Address, Balance, H256, U256};

/// How a frame was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallKind {
    /// Contract creation; the code is init code
    Create,
    /// Plain message call
    #[default]
    Call,
    /// Foreign code on the caller's storage, caller becomes the sender
    CallCode,
    /// Foreign code on the caller's storage, sender and value preserved
    DelegateCall,
}

/// Frame flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallFlags(u32);

impl CallFlags {
    /// No flags
    pub const NONE: CallFlags = CallFlags(0);
    /// State modifications are forbidden
    pub const STATIC: CallFlags = CallFlags(1);

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Build from raw bits, dropping unknown ones
    pub const fn from_bits_truncate(bits: u32) -> Self {
        CallFlags(bits & Self::STATIC.0)
    }

    /// Check whether all of `other` is set
    pub const fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets
    pub const fn union(self, other: CallFlags) -> Self {
        CallFlags(self.0 | other.0)
    }
}

/// Block environment information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEnv {
    /// Block coinbase
    pub coinbase: Address,
    /// Block number
    pub number: u64,
    /// Block timestamp
    pub timestamp: u64,
    /// Block gas limit
    pub gas_limit: u64,
    /// Block difficulty
    pub difficulty: U256,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self {
            coinbase: Address::ZERO,
            number: 0,
            timestamp: 0,
            gas_limit: 5_000_000,
            difficulty: U256::zero(),
        }
    }
}

/// Immutable input bundle of one call frame.
///
/// Nested calls derive a fresh context; a context is never modified once a
/// frame starts executing it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Hash of the enclosing transaction
    pub tx_hash: H256,
    /// Account whose storage the code runs against
    pub address: Address,
    /// Transaction sender
    pub origin: Address,
    /// Immediate caller
    pub caller: Address,
    /// Gas price
    pub gas_price: Balance,
    /// Gas available to this frame
    pub gas_limit: u64,
    /// Value sent with the call
    pub value: Balance,
    /// Call data
    pub data: Bytes,
    /// Nesting depth, 0 for the outermost call
    pub depth: usize,
    /// How the frame was entered
    pub kind: CallKind,
    /// Frame flags
    pub flags: CallFlags,
    /// Block environment
    pub block: BlockEnv,
}

impl ExecutionContext {
    /// Create an outermost call context
    pub fn new(address: Address, caller: Address, value: Balance, data: Bytes, gas_limit: u64) -> Self {
        Self {
            address,
            origin: caller,
            caller,
            value,
            data,
            gas_limit,
            ..Default::default()
        }
    }

    /// Check the STATIC flag
    pub fn is_static(&self) -> bool {
        self.flags.contains(CallFlags::STATIC)
    }

    /// Context for a nested frame one level deeper.
    ///
    /// Transaction and block data are inherited; the STATIC flag is sticky.
    pub(crate) fn child(&self, params: ChildParams) -> ExecutionContext {
        let flags = if params.is_static {
            self.flags.union(CallFlags::STATIC)
        } else {
            self.flags
        };
        ExecutionContext {
            tx_hash: self.tx_hash,
            address: params.address,
            origin: self.origin,
            caller: params.caller,
            gas_price: self.gas_price,
            gas_limit: params.gas_limit,
            value: params.value,
            data: params.data,
            depth: self.depth + 1,
            kind: params.kind,
            flags,
            block: self.block.clone(),
        }
    }
}

/// Per-call fields of a derived context
#[derive(Debug, Clone)]
pub(crate) struct ChildParams {
    pub kind: CallKind,
    pub address: Address,
    pub caller: Address,
    pub value: Balance,
    pub data: Bytes,
    pub gas_limit: u64,
    pub is_static: bool,
}
