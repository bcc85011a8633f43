//! Shared helpers for the engine integration tests

#![allow(dead_code)]

use bytes::Bytes;
use fvm_engine::opcode::*;
use fvm_engine::{ExecutionContext, ExecutionResult, Vm};
use fvm_primitives::{Address, H256, U256};
use fvm_repository::{Account, MemoryRepository, Repository};
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber; `RUST_LOG=fvm_engine=trace` shows every step
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const SENDER: u64 = 0xe0a;
pub const CONTRACT: u64 = 0xa11ce;
pub const CALLEE: u64 = 0xb0b;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

pub fn slot(n: u64) -> H256 {
    H256::from_u256(U256::from(n))
}

/// Outermost context for `address` with `gas`
pub fn ctx(address: u64, gas: u64) -> ExecutionContext {
    ExecutionContext::new(addr(address), addr(SENDER), 0, Bytes::new(), gas)
}

pub fn deploy(repo: &mut MemoryRepository, address: u64, code: Vec<u8>, balance: u128) {
    repo.insert_account(addr(address), Account::with_balance(balance).with_code(code));
}

/// Execute the code stored at `address`
pub fn run(vm: &Vm, repo: &mut MemoryRepository, address: u64, gas: u64) -> ExecutionResult {
    init_tracing();
    let code = repo.get_code(&addr(address)).unwrap();
    vm.execute(&code, &ctx(address, gas), repo)
}

/// 32-byte output word at `index`
pub fn word(result: &ExecutionResult, index: usize) -> U256 {
    U256::from_big_endian(&result.output[index * 32..(index + 1) * 32])
}

/// Minimal bytecode assembler
#[derive(Default, Clone)]
pub struct Asm(Vec<u8>);

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, op: u8) -> Self {
        self.0.push(op);
        self
    }

    /// PUSHn with the shortest immediate that holds `value`
    pub fn push(self, value: impl Into<U256>) -> Self {
        let mut buf = [0u8; 32];
        value.into().to_big_endian(&mut buf);
        let start = buf.iter().position(|b| *b != 0).unwrap_or(31);
        self.push_bytes(&buf[start..])
    }

    pub fn push_bytes(mut self, bytes: &[u8]) -> Self {
        assert!(!bytes.is_empty() && bytes.len() <= 32);
        self.0.push(PUSH1 + bytes.len() as u8 - 1);
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn push_addr(self, address: u64) -> Self {
        self.push(addr(address).to_u256())
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    /// CALL-family instruction with its arguments
    #[allow(clippy::too_many_arguments)]
    pub fn call(self, op: u8, gas: u64, to: u64, value: u64, in_off: u64, in_len: u64, out_off: u64, out_len: u64) -> Self {
        let asm = self.push(out_len).push(out_off).push(in_len).push(in_off);
        let asm = if op == CALL || op == CALLCODE { asm.push(value) } else { asm };
        asm.push_addr(to).push(gas).op(op)
    }

    /// MSTORE the top of the stack at 0 and return that word
    pub fn return_top(self) -> Self {
        self.push(0u64).op(MSTORE).push(32u64).push(0u64).op(RETURN)
    }

    /// Store the top of the stack into storage slot `key`
    pub fn store_top(self, key: u64) -> Self {
        self.push(key).op(SSTORE)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}
