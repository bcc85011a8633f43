//! Gas tiers, schedule and metering

use crate::error::{EvmError, EvmResult};
use serde::{Deserialize, Serialize};

/// Largest memory size (in bytes) a frame may grow to.
///
/// Expansion beyond this is reported as out of gas.
pub const MAX_MEMORY_SIZE: usize = u32::MAX as usize;

/// Fixed cost class of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// 0
    Zero,
    /// 2
    Base,
    /// 3
    VeryLow,
    /// 5
    Low,
    /// 8
    Mid,
    /// 10
    High,
    /// 20
    Ext,
    /// Cost is computed entirely by the dynamic-cost function
    Special,
}

impl Tier {
    /// Fixed cost of the tier
    pub const fn cost(self) -> u64 {
        match self {
            Tier::Zero => 0,
            Tier::Base => 2,
            Tier::VeryLow => 3,
            Tier::Low => 5,
            Tier::Mid => 8,
            Tier::High => 10,
            Tier::Ext => 20,
            Tier::Special => 0,
        }
    }
}

/// Dynamic gas constants.
///
/// Every field can be overridden from configuration; missing fields keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// JUMPDEST
    pub jumpdest: u64,
    /// SHA3 base
    pub sha3: u64,
    /// SHA3 per hashed word
    pub sha3_word: u64,
    /// EXP per exponent byte
    pub exp_byte: u64,
    /// Per copied word (CALLDATACOPY, CODECOPY, EXTCODECOPY, RETURNDATACOPY)
    pub copy: u64,
    /// Memory expansion per word (linear term)
    pub memory: u64,
    /// Divisor of the quadratic memory term
    pub memory_quad_divisor: u64,
    /// SLOAD
    pub sload: u64,
    /// BALANCE
    pub balance: u64,
    /// EXTCODESIZE and EXTCODECOPY base
    pub extcode: u64,
    /// EXTCODEHASH
    pub extcodehash: u64,
    /// SSTORE zero to non-zero
    pub sstore_set: u64,
    /// SSTORE any other write
    pub sstore_reset: u64,
    /// Refund for clearing a slot
    pub sstore_clear_refund: u64,
    /// LOG base
    pub log: u64,
    /// LOG per topic
    pub log_topic: u64,
    /// LOG per data byte
    pub log_data: u64,
    /// CALL-family base
    pub call: u64,
    /// Surcharge for transferring value
    pub call_value: u64,
    /// Surcharge for sending value to a non-existent account
    pub new_account: u64,
    /// Free gas added to value-carrying calls
    pub call_stipend: u64,
    /// CREATE base
    pub create: u64,
    /// Per byte of deployed code
    pub code_deposit: u64,
    /// SELFDESTRUCT base
    pub selfdestruct: u64,
    /// Refund for the first SELFDESTRUCT of an account
    pub selfdestruct_refund: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            jumpdest: 1,
            sha3: 30,
            sha3_word: 6,
            exp_byte: 50,
            copy: 3,
            memory: 3,
            memory_quad_divisor: 512,
            sload: 200,
            balance: 400,
            extcode: 700,
            extcodehash: 400,
            sstore_set: 20000,
            sstore_reset: 5000,
            sstore_clear_refund: 15000,
            log: 375,
            log_topic: 375,
            log_data: 8,
            call: 700,
            call_value: 9000,
            new_account: 25000,
            call_stipend: 2300,
            create: 32000,
            code_deposit: 200,
            selfdestruct: 5000,
            selfdestruct_refund: 24000,
        }
    }
}

/// Number of 32-byte words covering `len` bytes
pub fn words(len: usize) -> u64 {
    len.div_ceil(32) as u64
}

impl GasSchedule {
    /// Total cost of a memory of `words` words
    pub fn memory_cost(&self, words: u64) -> u64 {
        let linear = self.memory.saturating_mul(words);
        let quadratic = words.saturating_mul(words) / self.memory_quad_divisor.max(1);
        linear.saturating_add(quadratic)
    }

    /// Cost of growing memory from `current_size` to `new_size` bytes
    pub fn memory_expansion(&self, current_size: usize, new_size: usize) -> u64 {
        if new_size <= current_size {
            return 0;
        }
        self.memory_cost(words(new_size))
            .saturating_sub(self.memory_cost(words(current_size)))
    }

    /// Per-word copy cost
    pub fn copy_cost(&self, len: usize) -> u64 {
        self.copy.saturating_mul(words(len))
    }

    /// SHA3 cost for `len` input bytes
    pub fn sha3_cost(&self, len: usize) -> u64 {
        self.sha3
            .saturating_add(self.sha3_word.saturating_mul(words(len)))
    }

    /// EXP surcharge for an exponent of `byte_len` significant bytes
    pub fn exp_cost(&self, byte_len: usize) -> u64 {
        self.exp_byte.saturating_mul(byte_len as u64)
    }

    /// LOG cost
    pub fn log_cost(&self, topics: usize, data_len: usize) -> u64 {
        self.log
            .saturating_add(self.log_topic.saturating_mul(topics as u64))
            .saturating_add(self.log_data.saturating_mul(data_len as u64))
    }

    /// Deposit cost for `len` bytes of created code
    pub fn code_deposit_cost(&self, len: usize) -> u64 {
        self.code_deposit.saturating_mul(len as u64)
    }
}

/// Per-frame gas budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    remaining: u64,
}

impl GasMeter {
    /// Create a meter holding `limit` gas
    pub fn new(limit: u64) -> Self {
        Self { remaining: limit }
    }

    /// Deduct `amount`.
    ///
    /// On exhaustion the remaining gas drops to zero and the frame must halt.
    pub fn charge(&mut self, amount: u64) -> EvmResult<()> {
        match self.remaining.checked_sub(amount) {
            Some(left) => {
                self.remaining = left;
                Ok(())
            }
            None => {
                self.remaining = 0;
                Err(EvmError::OutOfGas)
            }
        }
    }

    /// Give back gas a child frame did not use
    pub fn reimburse(&mut self, amount: u64) {
        self.remaining = self.remaining.saturating_add(amount);
    }

    /// Gas left
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// All but one 64th of what is left
    pub fn all_but_one_64th(&self) -> u64 {
        self.remaining - self.remaining / 64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_costs() {
        assert_eq!(Tier::Zero.cost(), 0);
        assert_eq!(Tier::Base.cost(), 2);
        assert_eq!(Tier::VeryLow.cost(), 3);
        assert_eq!(Tier::Low.cost(), 5);
        assert_eq!(Tier::Mid.cost(), 8);
        assert_eq!(Tier::High.cost(), 10);
        assert_eq!(Tier::Ext.cost(), 20);
        assert_eq!(Tier::Special.cost(), 0);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Zero < Tier::Base);
        assert!(Tier::High < Tier::Ext);
    }

    #[test]
    fn test_memory_expansion() {
        let s = GasSchedule::default();
        assert_eq!(s.memory_expansion(32, 32), 0);
        assert_eq!(s.memory_expansion(64, 32), 0);
        assert_eq!(s.memory_expansion(0, 32), 3);
        assert_eq!(s.memory_expansion(0, 1), 3);
        assert_eq!(s.memory_expansion(0, 64), 6);
        assert_eq!(s.memory_expansion(32, 64), 3);
        // 1024 words: 3*1024 + 1024*1024/512
        assert_eq!(s.memory_expansion(0, 32 * 1024), 3072 + 2048);
    }

    #[test]
    fn test_memory_cost_saturates() {
        let s = GasSchedule::default();
        assert_eq!(s.memory_cost(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_copy_cost() {
        let s = GasSchedule::default();
        assert_eq!(s.copy_cost(0), 0);
        assert_eq!(s.copy_cost(1), 3);
        assert_eq!(s.copy_cost(32), 3);
        assert_eq!(s.copy_cost(33), 6);
    }

    #[test]
    fn test_sha3_cost() {
        let s = GasSchedule::default();
        assert_eq!(s.sha3_cost(0), 30);
        assert_eq!(s.sha3_cost(1), 36);
        assert_eq!(s.sha3_cost(32), 36);
        assert_eq!(s.sha3_cost(33), 42);
    }

    #[test]
    fn test_exp_and_log_cost() {
        let s = GasSchedule::default();
        assert_eq!(s.exp_cost(0), 0);
        assert_eq!(s.exp_cost(32), 1600);
        assert_eq!(s.log_cost(0, 0), 375);
        assert_eq!(s.log_cost(2, 10), 375 + 750 + 80);
    }

    #[test]
    fn test_meter_charge() {
        let mut meter = GasMeter::new(100);
        meter.charge(30).unwrap();
        assert_eq!(meter.remaining(), 70);
        meter.charge(70).unwrap();
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn test_meter_exhaustion_clamps_to_zero() {
        let mut meter = GasMeter::new(10);
        assert_eq!(meter.charge(11), Err(EvmError::OutOfGas));
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn test_meter_reimburse() {
        let mut meter = GasMeter::new(1000);
        meter.charge(600).unwrap();
        meter.reimburse(250);
        assert_eq!(meter.remaining(), 650);
    }

    #[test]
    fn test_all_but_one_64th() {
        let meter = GasMeter::new(6400);
        assert_eq!(meter.all_but_one_64th(), 6300);
        assert_eq!(GasMeter::new(63).all_but_one_64th(), 63);
    }

    #[test]
    fn test_schedule_partial_override() {
        let s: GasSchedule = serde_json::from_str(r#"{"sload": 50}"#).unwrap();
        assert_eq!(s.sload, 50);
        assert_eq!(s.sstore_set, 20000);
    }
}
