//! # fvm-engine
//!
//! Gas-metered bytecode execution engine for FastVM.
//!
//! This crate provides:
//! - The opcode table with per-instruction tiers and dynamic costs
//! - Stack, memory and gas metering
//! - The interpreter loop
//! - Nested call and contract creation dispatch
//!
//! A [`Vm`] is built once and shared; each [`Vm::execute`] call runs one
//! invocation against a [`Repository`](fvm_repository::Repository).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arith;
mod call;
mod config;
mod context;
mod error;
mod gas;
mod instruction;
mod interpreter;
mod memory;
pub mod opcode;
mod result;
mod stack;

pub use call::create_address;
pub use config::{ConfigError, VmConfig};
pub use context::{BlockEnv, CallFlags, CallKind, ExecutionContext};
pub use error::{EvmError, EvmResult, StatusCode};
pub use gas::{GasMeter, GasSchedule, Tier, MAX_MEMORY_SIZE};
pub use instruction::{CostInput, DynamicCost, InstructionInfo, InstructionTable};
pub use memory::{Memory, Region};
pub use result::{ExecutionResult, Log};
pub use stack::{Stack, DEFAULT_STACK_LIMIT};

use fvm_repository::Repository;
use interpreter::Interpreter;
use tracing::debug;

/// Execution engine: opcode table plus configuration.
///
/// Immutable once built, so one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Vm {
    table: InstructionTable,
    config: VmConfig,
}

impl Vm {
    /// Create an engine with `config`
    pub fn new(config: VmConfig) -> Self {
        Self {
            table: InstructionTable::new(),
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Opcode table
    pub fn table(&self) -> &InstructionTable {
        &self.table
    }

    /// Run `code` as the outermost frame of an invocation.
    ///
    /// Any call value is expected to have been moved by the host already.
    /// State written by a frame that does not succeed is rolled back. On
    /// success the storage and self-destruct refunds are credited, capped at
    /// half of the gas used, and `refund` reports the amount credited.
    pub fn execute(
        &self,
        code: &[u8],
        ctx: &ExecutionContext,
        repo: &mut dyn Repository,
    ) -> ExecutionResult {
        if ctx.depth > self.config.max_call_depth {
            debug!(depth = ctx.depth, max = self.config.max_call_depth, "call depth exceeded");
            return ExecutionResult::depth_exceeded(ctx.gas_limit);
        }

        let mut result = call::isolated(repo, |repo| {
            Ok(Interpreter::new(self, ctx, code, repo).run())
        });

        if result.is_success() {
            let schedule = &self.config.schedule;
            let destructed = schedule
                .selfdestruct_refund
                .saturating_mul(result.selfdestructs.len() as u64);
            let earned = result.refund.saturating_add(destructed);
            let refund = earned.min(result.gas_used(ctx.gas_limit) / 2);
            result.gas_remaining += refund;
            result.refund = refund;
        } else {
            result.refund = 0;
        }
        result
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}
