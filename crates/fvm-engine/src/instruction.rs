//! Instruction descriptors and the opcode table.
//!
//! Every defined opcode has one [`InstructionInfo`]: its mnemonic, fixed
//! [`Tier`], stack effect and an optional function computing the variable
//! part of its cost. The table is built once per [`Vm`](crate::Vm) and only
//! read afterwards.

use crate::arith;
use crate::context::ExecutionContext;
use crate::error::EvmResult;
use crate::gas::{GasSchedule, Tier};
use crate::memory::{Memory, Region};
use crate::opcode::*;
use crate::stack::Stack;
use fvm_primitives::{Address, H256, U256};
use fvm_repository::Repository;
use std::fmt;

/// Frame state visible to a dynamic-cost function.
///
/// The stack is guaranteed to hold the instruction's inputs.
pub struct CostInput<'a> {
    /// Opcode being charged
    pub opcode: u8,
    /// Operand stack, inputs still in place
    pub stack: &'a Stack,
    /// Frame memory before the instruction runs
    pub memory: &'a Memory,
    /// Active gas constants
    pub schedule: &'a GasSchedule,
    /// State access
    pub repo: &'a dyn Repository,
    /// Current frame context
    pub ctx: &'a ExecutionContext,
}

impl CostInput<'_> {
    fn arg(&self, depth: usize) -> EvmResult<U256> {
        self.stack.peek_at(depth).copied()
    }

    fn region(&self, offset_depth: usize, len_depth: usize) -> EvmResult<Option<Region>> {
        Region::from_words(self.arg(offset_depth)?, self.arg(len_depth)?)
    }

    fn memory_cost(&self, regions: &[Option<Region>]) -> u64 {
        self.memory.expansion_cost(self.schedule, regions)
    }
}

/// Variable part of an instruction's cost
pub type DynamicCost = fn(&CostInput<'_>) -> EvmResult<u64>;

/// Static description of one opcode
#[derive(Clone, Copy)]
pub struct InstructionInfo {
    /// Opcode byte
    pub opcode: u8,
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Fixed cost class
    pub tier: Tier,
    /// Variable cost, charged together with the tier cost
    pub dynamic: Option<DynamicCost>,
    /// Items popped
    pub stack_in: usize,
    /// Items pushed
    pub stack_out: usize,
}

impl fmt::Debug for InstructionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionInfo")
            .field("opcode", &format_args!("0x{:02x}", self.opcode))
            .field("mnemonic", &self.mnemonic)
            .field("tier", &self.tier)
            .field("dynamic", &self.dynamic.is_some())
            .field("stack_in", &self.stack_in)
            .field("stack_out", &self.stack_out)
            .finish()
    }
}

/// Dense opcode-indexed table
#[derive(Clone)]
pub struct InstructionTable {
    entries: [Option<InstructionInfo>; 256],
}

const PUSH_NAMES: [&str; 32] = [
    "PUSH1", "PUSH2", "PUSH3", "PUSH4", "PUSH5", "PUSH6", "PUSH7", "PUSH8", "PUSH9", "PUSH10",
    "PUSH11", "PUSH12", "PUSH13", "PUSH14", "PUSH15", "PUSH16", "PUSH17", "PUSH18", "PUSH19",
    "PUSH20", "PUSH21", "PUSH22", "PUSH23", "PUSH24", "PUSH25", "PUSH26", "PUSH27", "PUSH28",
    "PUSH29", "PUSH30", "PUSH31", "PUSH32",
];

const DUP_NAMES: [&str; 16] = [
    "DUP1", "DUP2", "DUP3", "DUP4", "DUP5", "DUP6", "DUP7", "DUP8", "DUP9", "DUP10", "DUP11",
    "DUP12", "DUP13", "DUP14", "DUP15", "DUP16",
];

const SWAP_NAMES: [&str; 16] = [
    "SWAP1", "SWAP2", "SWAP3", "SWAP4", "SWAP5", "SWAP6", "SWAP7", "SWAP8", "SWAP9", "SWAP10",
    "SWAP11", "SWAP12", "SWAP13", "SWAP14", "SWAP15", "SWAP16",
];

const LOG_NAMES: [&str; 5] = ["LOG0", "LOG1", "LOG2", "LOG3", "LOG4"];

impl InstructionTable {
    /// Build the table
    pub fn new() -> Self {
        let mut t = InstructionTable {
            entries: [None; 256],
        };

        use Tier::*;

        t.set(STOP, "STOP", Zero, None, 0, 0);
        t.set(ADD, "ADD", VeryLow, None, 2, 1);
        t.set(MUL, "MUL", Low, None, 2, 1);
        t.set(SUB, "SUB", VeryLow, None, 2, 1);
        t.set(DIV, "DIV", Low, None, 2, 1);
        t.set(SDIV, "SDIV", Low, None, 2, 1);
        t.set(MOD, "MOD", Low, None, 2, 1);
        t.set(SMOD, "SMOD", Low, None, 2, 1);
        t.set(ADDMOD, "ADDMOD", Mid, None, 3, 1);
        t.set(MULMOD, "MULMOD", Mid, None, 3, 1);
        t.set(EXP, "EXP", High, Some(exp_cost), 2, 1);
        t.set(SIGNEXTEND, "SIGNEXTEND", Low, None, 2, 1);

        t.set(LT, "LT", VeryLow, None, 2, 1);
        t.set(GT, "GT", VeryLow, None, 2, 1);
        t.set(SLT, "SLT", VeryLow, None, 2, 1);
        t.set(SGT, "SGT", VeryLow, None, 2, 1);
        t.set(EQ, "EQ", VeryLow, None, 2, 1);
        t.set(ISZERO, "ISZERO", VeryLow, None, 1, 1);
        t.set(AND, "AND", VeryLow, None, 2, 1);
        t.set(OR, "OR", VeryLow, None, 2, 1);
        t.set(XOR, "XOR", VeryLow, None, 2, 1);
        t.set(NOT, "NOT", VeryLow, None, 1, 1);
        t.set(BYTE, "BYTE", VeryLow, None, 2, 1);
        t.set(SHL, "SHL", VeryLow, None, 2, 1);
        t.set(SHR, "SHR", VeryLow, None, 2, 1);
        t.set(SAR, "SAR", VeryLow, None, 2, 1);

        t.set(SHA3, "SHA3", Special, Some(sha3_cost), 2, 1);

        t.set(ADDRESS, "ADDRESS", Base, None, 0, 1);
        t.set(BALANCE, "BALANCE", Special, Some(balance_cost), 1, 1);
        t.set(ORIGIN, "ORIGIN", Base, None, 0, 1);
        t.set(CALLER, "CALLER", Base, None, 0, 1);
        t.set(CALLVALUE, "CALLVALUE", Base, None, 0, 1);
        t.set(CALLDATALOAD, "CALLDATALOAD", VeryLow, None, 1, 1);
        t.set(CALLDATASIZE, "CALLDATASIZE", Base, None, 0, 1);
        t.set(CALLDATACOPY, "CALLDATACOPY", VeryLow, Some(copy_cost), 3, 0);
        t.set(CODESIZE, "CODESIZE", Base, None, 0, 1);
        t.set(CODECOPY, "CODECOPY", VeryLow, Some(copy_cost), 3, 0);
        t.set(GASPRICE, "GASPRICE", Base, None, 0, 1);
        t.set(EXTCODESIZE, "EXTCODESIZE", Special, Some(extcode_cost), 1, 1);
        t.set(EXTCODECOPY, "EXTCODECOPY", Special, Some(extcodecopy_cost), 4, 0);
        t.set(RETURNDATASIZE, "RETURNDATASIZE", Base, None, 0, 1);
        t.set(RETURNDATACOPY, "RETURNDATACOPY", VeryLow, Some(copy_cost), 3, 0);
        t.set(EXTCODEHASH, "EXTCODEHASH", Special, Some(extcodehash_cost), 1, 1);

        t.set(BLOCKHASH, "BLOCKHASH", Ext, None, 1, 1);
        t.set(COINBASE, "COINBASE", Base, None, 0, 1);
        t.set(TIMESTAMP, "TIMESTAMP", Base, None, 0, 1);
        t.set(NUMBER, "NUMBER", Base, None, 0, 1);
        t.set(DIFFICULTY, "DIFFICULTY", Base, None, 0, 1);
        t.set(GASLIMIT, "GASLIMIT", Base, None, 0, 1);

        t.set(POP, "POP", Base, None, 1, 0);
        t.set(MLOAD, "MLOAD", VeryLow, Some(word_memory_cost), 1, 1);
        t.set(MSTORE, "MSTORE", VeryLow, Some(word_memory_cost), 2, 0);
        t.set(MSTORE8, "MSTORE8", VeryLow, Some(byte_memory_cost), 2, 0);
        t.set(SLOAD, "SLOAD", Special, Some(sload_cost), 1, 1);
        t.set(SSTORE, "SSTORE", Special, Some(sstore_cost), 2, 0);
        t.set(JUMP, "JUMP", Mid, None, 1, 0);
        t.set(JUMPI, "JUMPI", High, None, 2, 0);
        t.set(PC, "PC", Base, None, 0, 1);
        t.set(MSIZE, "MSIZE", Base, None, 0, 1);
        t.set(GAS, "GAS", Base, None, 0, 1);
        t.set(JUMPDEST, "JUMPDEST", Special, Some(jumpdest_cost), 0, 0);

        for (i, name) in PUSH_NAMES.iter().enumerate() {
            t.set(PUSH1 + i as u8, name, VeryLow, None, 0, 1);
        }
        for (i, name) in DUP_NAMES.iter().enumerate() {
            t.set(DUP1 + i as u8, name, VeryLow, None, i + 1, i + 2);
        }
        for (i, name) in SWAP_NAMES.iter().enumerate() {
            t.set(SWAP1 + i as u8, name, VeryLow, None, i + 2, i + 2);
        }
        for (i, name) in LOG_NAMES.iter().enumerate() {
            t.set(LOG0 + i as u8, name, Special, Some(log_cost), i + 2, 0);
        }

        t.set(CREATE, "CREATE", Special, Some(create_cost), 3, 1);
        t.set(CALL, "CALL", Special, Some(call_cost), 7, 1);
        t.set(CALLCODE, "CALLCODE", Special, Some(call_cost), 7, 1);
        t.set(RETURN, "RETURN", Zero, Some(return_cost), 2, 0);
        t.set(DELEGATECALL, "DELEGATECALL", Special, Some(call_cost), 6, 1);
        t.set(STATICCALL, "STATICCALL", Special, Some(call_cost), 6, 1);
        t.set(REVERT, "REVERT", Zero, Some(return_cost), 2, 0);
        t.set(INVALID, "INVALID", Zero, None, 0, 0);
        t.set(SELFDESTRUCT, "SELFDESTRUCT", Special, Some(selfdestruct_cost), 1, 0);

        t
    }

    fn set(
        &mut self,
        opcode: u8,
        mnemonic: &'static str,
        tier: Tier,
        dynamic: Option<DynamicCost>,
        stack_in: usize,
        stack_out: usize,
    ) {
        self.entries[opcode as usize] = Some(InstructionInfo {
            opcode,
            mnemonic,
            tier,
            dynamic,
            stack_in,
            stack_out,
        });
    }

    /// Descriptor for `opcode`, `None` if undefined
    pub fn lookup(&self, opcode: u8) -> Option<&InstructionInfo> {
        self.entries[opcode as usize].as_ref()
    }

    /// All defined instructions in opcode order
    pub fn iter(&self) -> impl Iterator<Item = &InstructionInfo> {
        self.entries.iter().flatten()
    }
}

impl Default for InstructionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstructionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionTable")
            .field("defined", &self.iter().count())
            .finish()
    }
}

// ==================== Dynamic costs ====================

fn jumpdest_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    Ok(input.schedule.jumpdest)
}

fn exp_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let exponent = input.arg(1)?;
    Ok(input.schedule.exp_cost(arith::byte_len(&exponent)))
}

fn sha3_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = input.region(0, 1)?;
    let len = region.map_or(0, |r| r.len);
    Ok(input
        .schedule
        .sha3_cost(len)
        .saturating_add(input.memory_cost(&[region])))
}

fn word_memory_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = Region::from_words(input.arg(0)?, U256::from(32))?;
    Ok(input.memory_cost(&[region]))
}

fn byte_memory_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = Region::from_words(input.arg(0)?, U256::one())?;
    Ok(input.memory_cost(&[region]))
}

/// CALLDATACOPY, CODECOPY, RETURNDATACOPY: (dest, offset, len)
fn copy_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = input.region(0, 2)?;
    let len = region.map_or(0, |r| r.len);
    Ok(input
        .schedule
        .copy_cost(len)
        .saturating_add(input.memory_cost(&[region])))
}

fn balance_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    Ok(input.schedule.balance)
}

fn extcode_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    Ok(input.schedule.extcode)
}

fn extcodehash_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    Ok(input.schedule.extcodehash)
}

/// EXTCODECOPY: (address, dest, offset, len)
fn extcodecopy_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = input.region(1, 3)?;
    let len = region.map_or(0, |r| r.len);
    Ok(input
        .schedule
        .extcode
        .saturating_add(input.schedule.copy_cost(len))
        .saturating_add(input.memory_cost(&[region])))
}

fn sload_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    Ok(input.schedule.sload)
}

fn sstore_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let key = H256::from_u256(input.arg(0)?);
    let value = input.arg(1)?;
    let current = input.repo.get_storage(&input.ctx.address, &key)?;
    if current.is_zero() && !value.is_zero() {
        Ok(input.schedule.sstore_set)
    } else {
        Ok(input.schedule.sstore_reset)
    }
}

fn log_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = input.region(0, 1)?;
    let len = region.map_or(0, |r| r.len);
    let topics = log_topics(input.opcode).unwrap_or(0);
    Ok(input
        .schedule
        .log_cost(topics, len)
        .saturating_add(input.memory_cost(&[region])))
}

/// CREATE: (value, offset, len)
fn create_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = input.region(1, 2)?;
    Ok(input
        .schedule
        .create
        .saturating_add(input.memory_cost(&[region])))
}

/// Fixed part of a CALL-family instruction: base, value surcharges and
/// memory for both the argument and the return regions. The forwarded gas
/// is taken separately once this has been paid.
fn call_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let has_value = matches!(input.opcode, CALL | CALLCODE);
    let first_region = if has_value { 3 } else { 2 };
    let args = input.region(first_region, first_region + 1)?;
    let ret = input.region(first_region + 2, first_region + 3)?;

    let mut cost = input
        .schedule
        .call
        .saturating_add(input.memory_cost(&[args, ret]));

    if has_value && !input.arg(2)?.is_zero() {
        cost = cost.saturating_add(input.schedule.call_value);
        let target = Address::from_u256(input.arg(1)?);
        if input.opcode == CALL && !input.repo.account_exists(&target)? {
            cost = cost.saturating_add(input.schedule.new_account);
        }
    }
    Ok(cost)
}

fn return_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let region = input.region(0, 1)?;
    Ok(input.memory_cost(&[region]))
}

fn selfdestruct_cost(input: &CostInput<'_>) -> EvmResult<u64> {
    let beneficiary = Address::from_u256(input.arg(0)?);
    let mut cost = input.schedule.selfdestruct;
    if input.repo.get_balance(&input.ctx.address)? > 0
        && !input.repo.account_exists(&beneficiary)?
    {
        cost = cost.saturating_add(input.schedule.new_account);
    }
    Ok(cost)
}
