//! Bytecode interpreter

use crate::arith;
use crate::context::ExecutionContext;
use crate::error::{EvmError, EvmResult, StatusCode};
use crate::gas::GasMeter;
use crate::instruction::CostInput;
use crate::memory::{Memory, Region};
use crate::opcode::*;
use crate::result::{ExecutionResult, Log};
use crate::stack::Stack;
use crate::Vm;
use bytes::Bytes;
use fvm_primitives::{keccak256, Address, H256, U256};
use fvm_repository::Repository;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// What the loop does after an instruction
enum Control {
    /// Fall through to the next instruction
    Continue,
    /// Continue at a validated JUMPDEST
    Jump(usize),
    /// Frame completed successfully
    Stop,
}

/// State of one call frame
pub(crate) struct Interpreter<'a> {
    pub(crate) vm: &'a Vm,
    pub(crate) ctx: &'a ExecutionContext,
    pub(crate) repo: &'a mut dyn Repository,
    /// Bytecode being executed
    code: &'a [u8],
    /// Program counter
    pc: usize,
    pub(crate) stack: Stack,
    pub(crate) memory: Memory,
    pub(crate) gas: GasMeter,
    /// Valid jump destinations
    jump_dests: HashSet<usize>,
    /// Output of the last nested call
    pub(crate) return_data: Bytes,
    /// RETURN data
    output: Bytes,
    stopped: bool,
    pub(crate) logs: Vec<Log>,
    /// Storage refunds earned by this frame and its successful children
    pub(crate) refund: u64,
    pub(crate) selfdestructs: Vec<Address>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        vm: &'a Vm,
        ctx: &'a ExecutionContext,
        code: &'a [u8],
        repo: &'a mut dyn Repository,
    ) -> Self {
        Self {
            vm,
            ctx,
            repo,
            code,
            pc: 0,
            stack: Stack::with_limit(vm.config().max_stack_size),
            memory: Memory::new(),
            gas: GasMeter::new(ctx.gas_limit),
            jump_dests: analyze_jump_dests(code),
            return_data: Bytes::new(),
            output: Bytes::new(),
            stopped: false,
            logs: Vec::new(),
            refund: 0,
            selfdestructs: Vec::new(),
        }
    }

    /// Execute until a terminal condition
    pub(crate) fn run(mut self) -> ExecutionResult {
        debug!(
            depth = self.ctx.depth,
            address = %self.ctx.address,
            gas = self.ctx.gas_limit,
            code_len = self.code.len(),
            "frame start"
        );

        let outcome = loop {
            if self.stopped {
                break Ok(());
            }
            if let Err(err) = self.step() {
                break Err(err);
            }
        };

        let result = match outcome {
            Ok(()) => ExecutionResult {
                status: StatusCode::Success,
                gas_remaining: self.gas.remaining(),
                output: self.output,
                logs: self.logs,
                refund: self.refund,
                selfdestructs: self.selfdestructs,
            },
            Err(err) => {
                if err.status() == StatusCode::InternalError {
                    warn!(depth = self.ctx.depth, pc = self.pc, error = %err, "frame aborted");
                }
                ExecutionResult::from_error(err, self.gas.remaining())
            }
        };

        debug!(
            depth = self.ctx.depth,
            status = %result.status,
            gas_left = result.gas_remaining,
            "frame end"
        );
        result
    }

    /// Execute a single instruction
    fn step(&mut self) -> EvmResult<()> {
        if self.pc >= self.code.len() {
            self.stopped = true;
            return Ok(());
        }

        let opcode = self.code[self.pc];
        let info = self
            .vm
            .table()
            .lookup(opcode)
            .ok_or(EvmError::InvalidInstruction(opcode))?;

        self.stack.require(info.stack_in, info.stack_out)?;
        if self.ctx.is_static() && self.modifies_state(opcode)? {
            return Err(EvmError::StaticCallViolation);
        }

        let mut cost = info.tier.cost();
        if let Some(dynamic) = info.dynamic {
            let input = CostInput {
                opcode,
                stack: &self.stack,
                memory: &self.memory,
                schedule: &self.vm.config().schedule,
                repo: &*self.repo,
                ctx: self.ctx,
            };
            cost = cost.saturating_add(dynamic(&input)?);
        }

        trace!(
            pc = self.pc,
            op = info.mnemonic,
            cost,
            gas = self.gas.remaining(),
            "step"
        );
        self.gas.charge(cost)?;

        match self.execute(opcode)? {
            Control::Continue => self.pc += 1 + push_size(opcode),
            Control::Jump(dest) => self.pc = dest,
            Control::Stop => self.stopped = true,
        }
        Ok(())
    }

    fn modifies_state(&self, opcode: u8) -> EvmResult<bool> {
        Ok(match opcode {
            SSTORE | CREATE | SELFDESTRUCT => true,
            CALL => !self.stack.peek_at(2)?.is_zero(),
            op => log_topics(op).is_some(),
        })
    }

    fn jump_target(&self, dest: U256) -> EvmResult<usize> {
        if dest > U256::from(usize::MAX) {
            return Err(EvmError::InvalidJump(usize::MAX));
        }
        let dest = dest.low_u64() as usize;
        if self.jump_dests.contains(&dest) {
            Ok(dest)
        } else {
            Err(EvmError::InvalidJump(dest))
        }
    }

    fn binary(&mut self, f: impl FnOnce(U256, U256) -> U256) -> EvmResult<Control> {
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        self.stack.push(f(a, b))?;
        Ok(Control::Continue)
    }

    fn compare(&mut self, f: impl FnOnce(&U256, &U256) -> bool) -> EvmResult<Control> {
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        self.stack.push_bool(f(&a, &b))?;
        Ok(Control::Continue)
    }

    fn push_word(&mut self, value: U256) -> EvmResult<Control> {
        self.stack.push(value)?;
        Ok(Control::Continue)
    }

    fn pop_address(&mut self) -> EvmResult<Address> {
        Ok(Address::from_u256(self.stack.pop()?))
    }

    fn pop_region(&mut self) -> EvmResult<Option<Region>> {
        let offset = self.stack.pop()?;
        let len = self.stack.pop()?;
        Region::from_words(offset, len)
    }

    /// CALLDATACOPY / CODECOPY / EXTCODECOPY body: (dest, offset, len)
    fn copy_to_memory(&mut self, source: &[u8]) -> EvmResult<Control> {
        let dest = self.stack.pop()?;
        let offset = self.stack.pop()?;
        let len = self.stack.pop()?;
        let region = Region::from_words(dest, len)?;
        self.memory.copy_padded(region, source, offset);
        Ok(Control::Continue)
    }

    fn execute(&mut self, opcode: u8) -> EvmResult<Control> {
        match opcode {
            STOP => Ok(Control::Stop),

            // Arithmetic
            ADD => self.binary(|a, b| a.overflowing_add(b).0),
            MUL => self.binary(|a, b| a.overflowing_mul(b).0),
            SUB => self.binary(|a, b| a.overflowing_sub(b).0),
            DIV => self.binary(arith::div),
            SDIV => self.binary(arith::sdiv),
            MOD => self.binary(arith::rem),
            SMOD => self.binary(arith::smod),
            ADDMOD | MULMOD => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let value = if opcode == ADDMOD {
                    arith::addmod(a, b, n)
                } else {
                    arith::mulmod(a, b, n)
                };
                self.push_word(value)
            }
            EXP => self.binary(arith::exp),
            SIGNEXTEND => self.binary(arith::signextend),

            // Comparison and bitwise
            LT => self.compare(|a, b| a < b),
            GT => self.compare(|a, b| a > b),
            SLT => self.compare(arith::slt),
            SGT => self.compare(arith::sgt),
            EQ => self.compare(|a, b| a == b),
            ISZERO => {
                let a = self.stack.pop()?;
                self.stack.push_bool(a.is_zero())?;
                Ok(Control::Continue)
            }
            AND => self.binary(|a, b| a & b),
            OR => self.binary(|a, b| a | b),
            XOR => self.binary(|a, b| a ^ b),
            NOT => {
                let a = self.stack.pop()?;
                self.push_word(!a)
            }
            BYTE => self.binary(arith::byte),
            SHL => self.binary(arith::shl),
            SHR => self.binary(arith::shr),
            SAR => self.binary(arith::sar),

            SHA3 => {
                let region = self.pop_region()?;
                let data = self.memory.read(region);
                self.push_word(keccak256(&data).to_u256())
            }

            // Environment
            ADDRESS => self.push_word(self.ctx.address.to_u256()),
            BALANCE => {
                let address = self.pop_address()?;
                let balance = self.repo.get_balance(&address)?;
                self.push_word(U256::from(balance))
            }
            ORIGIN => self.push_word(self.ctx.origin.to_u256()),
            CALLER => self.push_word(self.ctx.caller.to_u256()),
            CALLVALUE => self.push_word(U256::from(self.ctx.value)),
            CALLDATALOAD => {
                let offset = self.stack.pop()?;
                self.push_word(load_padded(&self.ctx.data, offset))
            }
            CALLDATASIZE => self.push_word(U256::from(self.ctx.data.len())),
            CALLDATACOPY => {
                let data = self.ctx.data.clone();
                self.copy_to_memory(&data)
            }
            CODESIZE => self.push_word(U256::from(self.code.len())),
            CODECOPY => {
                let code = self.code;
                self.copy_to_memory(code)
            }
            GASPRICE => self.push_word(U256::from(self.ctx.gas_price)),
            EXTCODESIZE => {
                let address = self.pop_address()?;
                let size = self.repo.get_code(&address)?.len();
                self.push_word(U256::from(size))
            }
            EXTCODECOPY => {
                let address = self.pop_address()?;
                let code = self.repo.get_code(&address)?;
                self.copy_to_memory(&code)
            }
            RETURNDATASIZE => self.push_word(U256::from(self.return_data.len())),
            RETURNDATACOPY => {
                let dest = self.stack.pop()?;
                let offset = self.stack.pop()?;
                let len = self.stack.pop()?;
                let end = offset
                    .checked_add(len)
                    .ok_or(EvmError::ReturnDataOutOfBounds)?;
                if end > U256::from(self.return_data.len()) {
                    return Err(EvmError::ReturnDataOutOfBounds);
                }
                let region = Region::from_words(dest, len)?;
                let data = self.return_data.clone();
                self.memory.copy_padded(region, &data, offset);
                Ok(Control::Continue)
            }
            EXTCODEHASH => {
                let address = self.pop_address()?;
                let hash = self.repo.get_code_hash(&address)?;
                self.push_word(hash.to_u256())
            }

            // Block
            BLOCKHASH => {
                let number = self.stack.pop()?;
                let current = self.ctx.block.number;
                let hash = if number < U256::from(current)
                    && U256::from(current) - number <= U256::from(256)
                {
                    self.repo.get_block_hash(number.low_u64())?
                } else {
                    H256::ZERO
                };
                self.push_word(hash.to_u256())
            }
            COINBASE => self.push_word(self.ctx.block.coinbase.to_u256()),
            TIMESTAMP => self.push_word(U256::from(self.ctx.block.timestamp)),
            NUMBER => self.push_word(U256::from(self.ctx.block.number)),
            DIFFICULTY => self.push_word(self.ctx.block.difficulty),
            GASLIMIT => self.push_word(U256::from(self.ctx.block.gas_limit)),

            // Stack, memory, storage and flow
            POP => {
                self.stack.pop()?;
                Ok(Control::Continue)
            }
            MLOAD => {
                let offset = word_offset(self.stack.pop()?, 32)?;
                let value = self.memory.load_word(offset);
                self.push_word(value)
            }
            MSTORE => {
                let offset = word_offset(self.stack.pop()?, 32)?;
                let value = self.stack.pop()?;
                self.memory.store_word(offset, value);
                Ok(Control::Continue)
            }
            MSTORE8 => {
                let offset = word_offset(self.stack.pop()?, 1)?;
                let value = self.stack.pop()?;
                self.memory.store_byte(offset, value.byte(0));
                Ok(Control::Continue)
            }
            SLOAD => {
                let key = H256::from_u256(self.stack.pop()?);
                let value = self.repo.get_storage(&self.ctx.address, &key)?;
                self.push_word(value.to_u256())
            }
            SSTORE => {
                let key = H256::from_u256(self.stack.pop()?);
                let value = H256::from_u256(self.stack.pop()?);
                let current = self.repo.get_storage(&self.ctx.address, &key)?;
                if !current.is_zero() && value.is_zero() {
                    self.refund = self
                        .refund
                        .saturating_add(self.vm.config().schedule.sstore_clear_refund);
                }
                self.repo.set_storage(&self.ctx.address, key, value)?;
                Ok(Control::Continue)
            }
            JUMP => {
                let dest = self.stack.pop()?;
                Ok(Control::Jump(self.jump_target(dest)?))
            }
            JUMPI => {
                let dest = self.stack.pop()?;
                let condition = self.stack.pop()?;
                if condition.is_zero() {
                    Ok(Control::Continue)
                } else {
                    Ok(Control::Jump(self.jump_target(dest)?))
                }
            }
            PC => self.push_word(U256::from(self.pc)),
            MSIZE => self.push_word(U256::from(self.memory.size())),
            GAS => self.push_word(U256::from(self.gas.remaining())),
            JUMPDEST => Ok(Control::Continue),

            op if push_size(op) > 0 => {
                let value = read_immediate(self.code, self.pc + 1, push_size(op));
                self.push_word(value)
            }
            op if dup_depth(op) > 0 => {
                self.stack.dup(dup_depth(op))?;
                Ok(Control::Continue)
            }
            op if swap_depth(op) > 0 => {
                self.stack.swap(swap_depth(op))?;
                Ok(Control::Continue)
            }
            op if log_topics(op).is_some() => {
                let region = self.pop_region()?;
                let count = log_topics(op).unwrap_or(0);
                let mut topics = Vec::with_capacity(count);
                for _ in 0..count {
                    topics.push(H256::from_u256(self.stack.pop()?));
                }
                let data = self.memory.read(region);
                self.logs.push(Log {
                    address: self.ctx.address,
                    topics,
                    data: Bytes::from(data),
                });
                Ok(Control::Continue)
            }

            // System
            CREATE => {
                self.create()?;
                Ok(Control::Continue)
            }
            CALL | CALLCODE | DELEGATECALL | STATICCALL => {
                self.call(opcode)?;
                Ok(Control::Continue)
            }
            RETURN => {
                let region = self.pop_region()?;
                self.output = Bytes::from(self.memory.read(region));
                Ok(Control::Stop)
            }
            REVERT => {
                let region = self.pop_region()?;
                Err(EvmError::Revert(Bytes::from(self.memory.read(region))))
            }
            SELFDESTRUCT => {
                let beneficiary = self.pop_address()?;
                let address = self.ctx.address;
                let balance = self.repo.get_balance(&address)?;
                if balance > 0 {
                    self.repo.transfer(&address, &beneficiary, balance)?;
                }
                if !self.selfdestructs.contains(&address) {
                    self.selfdestructs.push(address);
                }
                Ok(Control::Stop)
            }

            op => Err(EvmError::InvalidInstruction(op)),
        }
    }
}

/// Positions of JUMPDEST bytes that are not PUSH immediates
fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;

    while i < code.len() {
        let opcode = code[i];
        if opcode == JUMPDEST {
            dests.insert(i);
        }
        i += 1 + push_size(opcode);
    }

    dests
}

/// PUSH immediate starting at `start`; bytes past the end of code read as zero
fn read_immediate(code: &[u8], start: usize, size: usize) -> U256 {
    let mut word = [0u8; 32];
    if start < code.len() {
        let available = (code.len() - start).min(size);
        let at = 32 - size;
        word[at..at + available].copy_from_slice(&code[start..start + available]);
    }
    U256::from_big_endian(&word)
}

/// 32 bytes of `data` at `offset`, zero-padded
fn load_padded(data: &[u8], offset: U256) -> U256 {
    let mut word = [0u8; 32];
    if offset < U256::from(data.len()) {
        let start = offset.low_u64() as usize;
        let n = (data.len() - start).min(32);
        word[..n].copy_from_slice(&data[start..start + n]);
    }
    U256::from_big_endian(&word)
}

fn word_offset(offset: U256, len: usize) -> EvmResult<usize> {
    Region::from_words(offset, U256::from(len))?
        .map(|r| r.offset)
        .ok_or(EvmError::OutOfGas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallFlags;
    use fvm_repository::{Account, MemoryRepository};

    fn contract() -> Address {
        Address::from_low_u64(0x1000)
    }

    fn run_with(code: &[u8], ctx: ExecutionContext, repo: &mut MemoryRepository) -> ExecutionResult {
        Vm::default().execute(code, &ctx, repo)
    }

    fn run_code(code: &[u8], gas: u64) -> ExecutionResult {
        let mut repo = MemoryRepository::new();
        let ctx = ExecutionContext::new(contract(), Address::from_low_u64(0x2000), 0, Bytes::new(), gas);
        run_with(code, ctx, &mut repo)
    }

    /// Runs `code` followed by `PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN`
    fn eval(code: &[u8]) -> U256 {
        let mut full = code.to_vec();
        full.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]);
        let result = run_code(&full, 1_000_000);
        assert_eq!(result.status, StatusCode::Success, "{:?}", result);
        U256::from_big_endian(&result.output)
    }

    #[test]
    fn test_stop() {
        let result = run_code(&[0x00], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_remaining, 1000);
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_empty_code_succeeds() {
        let result = run_code(&[], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_remaining, 1000);
    }

    #[test]
    fn test_push_add_gas() {
        // PUSH1 1, PUSH1 2, ADD, STOP
        let result = run_code(&[0x60, 0x01, 0x60, 0x02, 0x01, 0x00], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_remaining, 991);
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_arithmetic() {
        // PUSH1 3, PUSH1 5, ADD
        assert_eq!(eval(&[0x60, 0x03, 0x60, 0x05, 0x01]), U256::from(8));
        // PUSH1 3, PUSH1 10, SUB -> 10 - 3
        assert_eq!(eval(&[0x60, 0x03, 0x60, 0x0a, 0x03]), U256::from(7));
        // PUSH1 10, PUSH1 3, SUB wraps
        assert_eq!(eval(&[0x60, 0x0a, 0x60, 0x03, 0x03]), U256::MAX - U256::from(6));
        // PUSH1 6, PUSH1 7, MUL
        assert_eq!(eval(&[0x60, 0x06, 0x60, 0x07, 0x02]), U256::from(42));
        // PUSH1 3, PUSH1 10, DIV
        assert_eq!(eval(&[0x60, 0x03, 0x60, 0x0a, 0x04]), U256::from(3));
        // PUSH1 0, PUSH1 10, DIV
        assert_eq!(eval(&[0x60, 0x00, 0x60, 0x0a, 0x04]), U256::zero());
        // PUSH1 3, PUSH1 10, MOD
        assert_eq!(eval(&[0x60, 0x03, 0x60, 0x0a, 0x06]), U256::from(1));
        // PUSH1 5, PUSH1 4, PUSH1 3, ADDMOD -> (3 + 4) % 5
        assert_eq!(eval(&[0x60, 0x05, 0x60, 0x04, 0x60, 0x03, 0x08]), U256::from(2));
        // PUSH1 10, PUSH1 2, EXP
        assert_eq!(eval(&[0x60, 0x0a, 0x60, 0x02, 0x0a]), U256::from(1024));
    }

    #[test]
    fn test_comparison_and_bitwise() {
        // PUSH1 2, PUSH1 1, LT -> 1 < 2
        assert_eq!(eval(&[0x60, 0x02, 0x60, 0x01, 0x10]), U256::one());
        // PUSH1 2, PUSH1 1, GT
        assert_eq!(eval(&[0x60, 0x02, 0x60, 0x01, 0x11]), U256::zero());
        // PUSH1 5, PUSH1 5, EQ
        assert_eq!(eval(&[0x60, 0x05, 0x60, 0x05, 0x14]), U256::one());
        // PUSH1 0, ISZERO
        assert_eq!(eval(&[0x60, 0x00, 0x15]), U256::one());
        // PUSH1 0x0f, PUSH1 0xf0, OR
        assert_eq!(eval(&[0x60, 0x0f, 0x60, 0xf0, 0x17]), U256::from(0xff));
        // PUSH1 0x0f, PUSH1 0xff, AND
        assert_eq!(eval(&[0x60, 0x0f, 0x60, 0xff, 0x16]), U256::from(0x0f));
        // PUSH1 0, NOT
        assert_eq!(eval(&[0x60, 0x00, 0x19]), U256::MAX);
        // PUSH1 1, PUSH1 4, SHL -> 1 << 4
        assert_eq!(eval(&[0x60, 0x01, 0x60, 0x04, 0x1b]), U256::from(16));
        // PUSH1 0xab, PUSH1 31, BYTE
        assert_eq!(eval(&[0x60, 0xab, 0x60, 0x1f, 0x1a]), U256::from(0xab));
    }

    #[test]
    fn test_jump() {
        // PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
        let result = run_code(&[0x60, 0x04, 0x56, 0xfe, 0x5b, 0x00], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_remaining, 1000 - 3 - 8 - 1);
    }

    #[test]
    fn test_jumpi() {
        // PUSH1 1, PUSH1 6, JUMPI, INVALID, INVALID, INVALID, JUMPDEST, STOP
        let taken = run_code(&[0x60, 0x01, 0x60, 0x06, 0x57, 0xfe, 0x5b, 0x00], 1000);
        assert!(taken.is_success());
        // condition 0 falls through into INVALID
        let not_taken = run_code(&[0x60, 0x00, 0x60, 0x06, 0x57, 0xfe, 0x5b, 0x00], 1000);
        assert_eq!(not_taken.status, StatusCode::InvalidInstruction);
    }

    #[test]
    fn test_jump_into_push_data() {
        // PUSH1 0x5b, PUSH1 1, JUMP: offset 1 is a PUSH immediate
        let result = run_code(&[0x60, 0x5b, 0x60, 0x01, 0x56], 1000);
        assert_eq!(result.status, StatusCode::InvalidJumpDestination);
        assert_eq!(result.gas_remaining, 0);
    }

    #[test]
    fn test_jump_far_out_of_range() {
        // PUSH32 0xff..ff, JUMP
        let mut code = vec![0x7f];
        code.extend_from_slice(&[0xff; 32]);
        code.push(0x56);
        let result = run_code(&code, 1000);
        assert_eq!(result.status, StatusCode::InvalidJumpDestination);
    }

    #[test]
    fn test_simple_loop() {
        // Counter loop: count from 0 to 5
        let code = [
            0x60, 0x00, // PUSH1 0 (counter)
            0x5b, // JUMPDEST (offset 2)
            0x60, 0x01, // PUSH1 1
            0x01, // ADD
            0x80, // DUP1
            0x60, 0x05, // PUSH1 5
            0x11, // GT
            0x60, 0x02, // PUSH1 2 (jump target)
            0x57, // JUMPI
        ];
        assert_eq!(eval(&code), U256::from(5));
    }

    #[test]
    fn test_mstore_mload() {
        // PUSH1 0x42, PUSH1 0, MSTORE, PUSH1 0, MLOAD
        assert_eq!(eval(&[0x60, 0x42, 0x60, 0x00, 0x52, 0x60, 0x00, 0x51]), U256::from(0x42));
    }

    #[test]
    fn test_memory_expansion_gas() {
        // PUSH1 1, PUSH1 0, MSTORE, STOP: 3 + 3 + 3 + 3 memory
        let result = run_code(&[0x60, 0x01, 0x60, 0x00, 0x52, 0x00], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_remaining, 1000 - 12);
    }

    #[test]
    fn test_msize_rounds_to_word() {
        // PUSH1 0xff, PUSH1 33, MSTORE8, MSIZE
        assert_eq!(eval(&[0x60, 0xff, 0x60, 0x21, 0x53, 0x59]), U256::from(64));
    }

    #[test]
    fn test_huge_memory_offset_is_out_of_gas() {
        // PUSH1 1, PUSH32 max, MSTORE
        let mut code = vec![0x60, 0x01, 0x7f];
        code.extend_from_slice(&[0xff; 32]);
        code.push(0x52);
        let result = run_code(&code, 1_000_000);
        assert_eq!(result.status, StatusCode::OutOfGas);
        assert_eq!(result.gas_remaining, 0);
    }

    #[test]
    fn test_dup_swap() {
        // PUSH1 1, PUSH1 2, SWAP1, POP -> 2 remains
        assert_eq!(eval(&[0x60, 0x01, 0x60, 0x02, 0x90, 0x50]), U256::from(2));
        // PUSH1 7, DUP1, ADD
        assert_eq!(eval(&[0x60, 0x07, 0x80, 0x01]), U256::from(14));
    }

    #[test]
    fn test_dup16_needs_sixteen_items() {
        let mut code = Vec::new();
        for i in 0..15u8 {
            code.extend_from_slice(&[0x60, i]);
        }
        code.push(0x8f);
        let result = run_code(&code, 10_000);
        assert_eq!(result.status, StatusCode::StackUnderflow);

        let mut code = Vec::new();
        for i in 1..=16u8 {
            code.extend_from_slice(&[0x60, i]);
        }
        code.push(0x8f);
        assert_eq!(eval(&code), U256::from(1));
    }

    #[test]
    fn test_truncated_push_is_right_padded() {
        // PUSH2 with a single immediate byte: 0x12 -> 0x1200
        let result = run_code(&[0x61, 0x12], 1000);
        assert!(result.is_success());
        assert_eq!(read_immediate(&[0x61, 0x12], 1, 2), U256::from(0x1200));
        assert_eq!(read_immediate(&[0x61], 1, 2), U256::zero());
    }

    #[test]
    fn test_return_with_data() {
        let code = [
            0x63, 0xde, 0xad, 0xbe, 0xef, // PUSH4 0xDEADBEEF
            0x60, 0x00, // PUSH1 0
            0x52, // MSTORE
            0x60, 0x20, // PUSH1 32
            0x60, 0x00, // PUSH1 0
            0xf3, // RETURN
        ];
        let result = run_code(&code, 100_000);
        assert!(result.is_success());
        assert_eq!(result.output.len(), 32);
        assert_eq!(&result.output[28..32], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_revert_keeps_gas_and_data() {
        // PUSH1 0xaa, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
        let result = run_code(&[0x60, 0xaa, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xfd], 1000);
        assert_eq!(result.status, StatusCode::Revert);
        assert_eq!(&result.output[..], &[0xaa]);
        assert_eq!(result.gas_remaining, 1000 - 3 - 3 - 3 - 3 - 3 - 3);
    }

    #[test]
    fn test_out_of_gas() {
        // PUSH1 1, PUSH1 2, ADD with 8 gas
        let result = run_code(&[0x60, 0x01, 0x60, 0x02, 0x01], 8);
        assert_eq!(result.status, StatusCode::OutOfGas);
        assert_eq!(result.gas_remaining, 0);
    }

    #[test]
    fn test_stack_underflow() {
        let result = run_code(&[0x50], 1000);
        assert_eq!(result.status, StatusCode::StackUnderflow);
        assert_eq!(result.gas_remaining, 0);
    }

    #[test]
    fn test_stack_overflow() {
        let mut code = Vec::new();
        for _ in 0..1025 {
            code.extend_from_slice(&[0x60, 0x01]);
        }
        let result = run_code(&code, 100_000);
        assert_eq!(result.status, StatusCode::StackOverflow);
    }

    #[test]
    fn test_invalid_and_undefined_opcodes() {
        assert_eq!(run_code(&[0xfe], 1000).status, StatusCode::InvalidInstruction);
        assert_eq!(run_code(&[0x0c], 1000).status, StatusCode::InvalidInstruction);
        assert_eq!(run_code(&[0xef], 1000).status, StatusCode::InvalidInstruction);
    }

    #[test]
    fn test_environment() {
        let mut repo = MemoryRepository::new();
        let mut ctx = ExecutionContext::new(contract(), Address::from_low_u64(0x2000), 77, Bytes::from_static(&[1, 2, 3]), 100_000);
        ctx.origin = Address::from_low_u64(0x3000);
        ctx.gas_price = 9;
        ctx.block.number = 12;
        ctx.block.timestamp = 1_700_000_000;
        ctx.block.coinbase = Address::from_low_u64(0xc0);

        let cases: &[(u8, U256)] = &[
            (ADDRESS, U256::from(0x1000)),
            (CALLER, U256::from(0x2000)),
            (ORIGIN, U256::from(0x3000)),
            (CALLVALUE, U256::from(77)),
            (CALLDATASIZE, U256::from(3)),
            (GASPRICE, U256::from(9)),
            (NUMBER, U256::from(12)),
            (TIMESTAMP, U256::from(1_700_000_000u64)),
            (COINBASE, U256::from(0xc0)),
            (GASLIMIT, U256::from(5_000_000)),
        ];
        for (op, expected) in cases {
            // <op>, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
            let code = [*op, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
            let result = run_with(&code, ctx.clone(), &mut repo);
            assert_eq!(U256::from_big_endian(&result.output), *expected, "opcode 0x{:02x}", op);
        }
    }

    #[test]
    fn test_calldataload_pads() {
        let mut repo = MemoryRepository::new();
        let ctx = ExecutionContext::new(contract(), Address::ZERO, 0, Bytes::from_static(&[0xab, 0xcd]), 100_000);
        // PUSH1 1, CALLDATALOAD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [0x60, 0x01, 0x35, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
        let result = run_with(&code, ctx, &mut repo);
        assert_eq!(result.output[0], 0xcd);
        assert!(result.output[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_codecopy() {
        // PUSH1 4, PUSH1 0, PUSH1 0, CODECOPY, PUSH1 4, PUSH1 0, RETURN
        let code = [0x60, 0x04, 0x60, 0x00, 0x60, 0x00, 0x39, 0x60, 0x04, 0x60, 0x00, 0xf3];
        let result = run_code(&code, 10_000);
        assert_eq!(&result.output[..], &code[..4]);
    }

    #[test]
    fn test_sha3_of_empty_input() {
        // PUSH1 0, PUSH1 0, SHA3
        assert_eq!(eval(&[0x60, 0x00, 0x60, 0x00, 0x20]), fvm_primitives::KECCAK_EMPTY.to_u256());
    }

    #[test]
    fn test_sstore_sload_and_refund() {
        let mut repo = MemoryRepository::new();
        let ctx = ExecutionContext::new(contract(), Address::ZERO, 0, Bytes::new(), 100_000);
        // PUSH1 0x2a, PUSH1 1, SSTORE
        let result = run_with(&[0x60, 0x2a, 0x60, 0x01, 0x55], ctx.clone(), &mut repo);
        assert!(result.is_success());
        assert_eq!(result.gas_remaining, 100_000 - 6 - 20_000);
        let key = H256::from_u256(U256::one());
        assert_eq!(repo.get_storage(&contract(), &key).unwrap().to_u256(), U256::from(0x2a));

        // PUSH1 0, PUSH1 1, SSTORE clears the slot and earns a capped refund
        let result = run_with(&[0x60, 0x00, 0x60, 0x01, 0x55], ctx, &mut repo);
        assert!(result.is_success());
        let used = 6 + 5000;
        assert_eq!(result.refund, used / 2);
        assert_eq!(result.gas_remaining, 100_000 - used + used / 2);
        assert!(repo.get_storage(&contract(), &key).unwrap().is_zero());
    }

    #[test]
    fn test_log() {
        // PUSH1 0xaa, PUSH1 0, MSTORE8, PUSH1 7 (topic), PUSH1 1, PUSH1 0, LOG1
        let code = [0x60, 0xaa, 0x60, 0x00, 0x53, 0x60, 0x07, 0x60, 0x01, 0x60, 0x00, 0xa1];
        let result = run_code(&code, 10_000);
        assert!(result.is_success());
        assert_eq!(result.logs.len(), 1);
        let log = &result.logs[0];
        assert_eq!(log.address, contract());
        assert_eq!(log.topics, vec![H256::from_u256(U256::from(7))]);
        assert_eq!(&log.data[..], &[0xaa]);
    }

    #[test]
    fn test_static_frame_rejects_writes() {
        let mut repo = MemoryRepository::new();
        let mut ctx = ExecutionContext::new(contract(), Address::ZERO, 0, Bytes::new(), 100_000);
        ctx.flags = CallFlags::STATIC;

        for code in [
            vec![0x60, 0x01, 0x60, 0x01, 0x55],       // SSTORE
            vec![0x60, 0x00, 0x60, 0x00, 0xa0],       // LOG0
            vec![0x60, 0x00, 0xff],                   // SELFDESTRUCT
            vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0xf0], // CREATE
        ] {
            let result = run_with(&code, ctx.clone(), &mut repo);
            assert_eq!(result.status, StatusCode::Failure);
            assert_eq!(result.gas_remaining, 0);
        }

        // SLOAD is fine
        let result = run_with(&[0x60, 0x01, 0x54], ctx, &mut repo);
        assert!(result.is_success());
    }

    #[test]
    fn test_blockhash_window() {
        let mut repo = MemoryRepository::new();
        let hash = H256::from_u256(U256::from(0xbeef));
        repo.insert_block_hash(10, hash);
        repo.insert_block_hash(300, hash);
        let mut ctx = ExecutionContext::new(contract(), Address::ZERO, 0, Bytes::new(), 100_000);
        ctx.block.number = 300;

        let query = |n: u16, repo: &mut MemoryRepository| {
            let [hi, lo] = n.to_be_bytes();
            // PUSH2 n, BLOCKHASH, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
            let code = [0x61, hi, lo, 0x40, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
            let result = run_with(&code, ctx.clone(), repo);
            U256::from_big_endian(&result.output)
        };
        // current block and blocks older than 256 are not visible
        assert_eq!(query(300, &mut repo), U256::zero());
        assert_eq!(query(10, &mut repo), U256::zero());
        repo.insert_block_hash(44, hash);
        assert_eq!(query(44, &mut repo), U256::from(0xbeef));
    }

    #[test]
    fn test_balance_and_extcode() {
        let mut repo = MemoryRepository::new();
        let other = Address::from_low_u64(0x77);
        repo.insert_account(other, Account::with_balance(500).with_code(vec![0x60, 0x00]));
        let ctx = ExecutionContext::new(contract(), Address::ZERO, 0, Bytes::new(), 100_000);

        // PUSH1 0x77, BALANCE, ...
        let code = [0x60, 0x77, 0x31, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
        let result = run_with(&code, ctx.clone(), &mut repo);
        assert_eq!(U256::from_big_endian(&result.output), U256::from(500));
        assert_eq!(result.gas_remaining, 100_000 - 3 - 400 - 3 - 3 - 3 - 3 - 3);

        // PUSH1 0x77, EXTCODESIZE, ...
        let code = [0x60, 0x77, 0x3b, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
        let result = run_with(&code, ctx.clone(), &mut repo);
        assert_eq!(U256::from_big_endian(&result.output), U256::from(2));

        // PUSH1 0x77, EXTCODEHASH, ...
        let code = [0x60, 0x77, 0x3f, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
        let result = run_with(&code, ctx, &mut repo);
        assert_eq!(U256::from_big_endian(&result.output), keccak256(&[0x60, 0x00]).to_u256());
    }

    #[test]
    fn test_returndatacopy_out_of_bounds() {
        // PUSH1 1, PUSH1 0, PUSH1 0, RETURNDATACOPY with an empty buffer
        let result = run_code(&[0x60, 0x01, 0x60, 0x00, 0x60, 0x00, 0x3e], 1000);
        assert_eq!(result.status, StatusCode::Failure);
        // zero-length copy at offset 0 is fine
        let result = run_code(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x3e], 1000);
        assert!(result.is_success());
    }

    #[test]
    fn test_selfdestruct() {
        let mut repo = MemoryRepository::new();
        let beneficiary = Address::from_low_u64(0xbb);
        repo.insert_account(contract(), Account::with_balance(1000));
        repo.insert_account(beneficiary, Account::default());
        let ctx = ExecutionContext::new(contract(), Address::ZERO, 0, Bytes::new(), 100_000);

        // PUSH1 0xbb, SELFDESTRUCT, INVALID (never reached)
        let result = run_with(&[0x60, 0xbb, 0xff, 0xfe], ctx, &mut repo);
        assert!(result.is_success());
        assert_eq!(result.selfdestructs, vec![contract()]);
        assert_eq!(repo.get_balance(&beneficiary).unwrap(), 1000);
        assert_eq!(repo.get_balance(&contract()).unwrap(), 0);
        // refund capped at half of 5003
        assert_eq!(result.refund, 5003 / 2);
    }

    #[test]
    fn test_failure_discards_state() {
        let mut repo = MemoryRepository::new();
        let ctx = ExecutionContext::new(contract(), Address::ZERO, 0, Bytes::new(), 100_000);
        // PUSH1 1, PUSH1 1, SSTORE, INVALID
        let result = run_with(&[0x60, 0x01, 0x60, 0x01, 0x55, 0xfe], ctx, &mut repo);
        assert_eq!(result.status, StatusCode::InvalidInstruction);
        assert!(repo.storage_of(&contract()).is_empty());
    }

    #[test]
    fn test_analyze_jump_dests_skips_immediates() {
        // JUMPDEST, PUSH2 0x5b 0x5b, JUMPDEST
        let dests = analyze_jump_dests(&[0x5b, 0x61, 0x5b, 0x5b, 0x5b]);
        assert!(dests.contains(&0));
        assert!(!dests.contains(&2));
        assert!(!dests.contains(&3));
        assert!(dests.contains(&4));
    }
}
