//! Type definitions for the fixture JSON format

use fvm_engine::{BlockEnv, CallFlags, CallKind, StatusCode};
use fvm_primitives::{Address, H256, U256};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

fn strip(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Hex-encoded bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let s = strip(&s);
        if s.is_empty() {
            return Ok(HexBytes(Vec::new()));
        }
        hex::decode(s).map(HexBytes).map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded 256-bit word, left-padded.
///
/// Used for values, storage keys and addresses alike, since all three are
/// one stack word wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HexWord(pub U256);

impl HexWord {
    /// As an account address
    pub fn address(&self) -> Address {
        Address::from_u256(self.0)
    }

    /// As a storage key or value
    pub fn h256(&self) -> H256 {
        H256::from_u256(self.0)
    }
}

impl std::str::FromStr for HexWord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = strip(s);
        if s.is_empty() {
            return Ok(HexWord(U256::zero()));
        }
        if s.len() > 64 {
            return Err(format!("word wider than 32 bytes: {} digits", s.len()));
        }
        U256::from_str_radix(s, 16)
            .map(HexWord)
            .map_err(|e| format!("invalid hex word {:?}: {:?}", s, e))
    }
}

impl<'de> Deserialize<'de> for HexWord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded u64
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HexU64(pub u64);

impl<'de> Deserialize<'de> for HexU64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let s = strip(&s);
        if s.is_empty() {
            return Ok(HexU64(0));
        }
        u64::from_str_radix(s, 16)
            .map(HexU64)
            .map_err(serde::de::Error::custom)
    }
}

/// Storage keyed by hex word.
///
/// JSON object keys go through the same string parser as values.
pub type StorageMap = BTreeMap<HexWord, HexWord>;

// =============================================================================
// Fixture Types
// =============================================================================

/// Fixture file structure (map of case name -> case)
pub type FixtureFile = BTreeMap<String, FixtureCase>;

/// Single fixture case
#[derive(Debug, Deserialize)]
pub struct FixtureCase {
    /// Block environment
    #[serde(default)]
    pub env: FixtureEnv,
    /// Execution parameters
    pub exec: FixtureExec,
    /// Accounts present before execution
    #[serde(default)]
    pub pre: BTreeMap<HexWord, AccountState>,
    /// Expected outcome
    pub expect: Expectation,
}

/// Block environment
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixtureEnv {
    /// Block coinbase
    pub coinbase: HexWord,
    /// Block number
    pub number: HexU64,
    /// Block timestamp
    pub timestamp: HexU64,
    /// Block gas limit; the engine default when absent
    pub gas_limit: Option<HexU64>,
    /// Block difficulty
    pub difficulty: HexWord,
    /// Hashes of earlier blocks, keyed by decimal block number
    pub block_hashes: BTreeMap<u64, HexWord>,
}

impl FixtureEnv {
    /// Engine view of the block
    pub fn block(&self) -> BlockEnv {
        let default = BlockEnv::default();
        BlockEnv {
            coinbase: self.coinbase.address(),
            number: self.number.0,
            timestamp: self.timestamp.0,
            gas_limit: self.gas_limit.map_or(default.gas_limit, |g| g.0),
            difficulty: self.difficulty.0,
        }
    }
}

/// How the fixture enters the code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureKind {
    /// Plain message call
    #[default]
    Call,
    /// CALLCODE frame
    Callcode,
    /// DELEGATECALL frame
    Delegatecall,
    /// Init code of a contract creation
    Create,
}

impl From<FixtureKind> for CallKind {
    fn from(kind: FixtureKind) -> Self {
        match kind {
            FixtureKind::Call => CallKind::Call,
            FixtureKind::Callcode => CallKind::CallCode,
            FixtureKind::Delegatecall => CallKind::DelegateCall,
            FixtureKind::Create => CallKind::Create,
        }
    }
}

/// Execution parameters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureExec {
    /// Account the code runs as
    pub address: HexWord,
    /// Immediate caller
    pub caller: HexWord,
    /// Transaction sender; the caller when absent
    #[serde(default)]
    pub origin: Option<HexWord>,
    /// Call value
    #[serde(default)]
    pub value: HexWord,
    /// Call data
    #[serde(default)]
    pub data: HexBytes,
    /// Code to run; the code stored at `address` when absent
    #[serde(default)]
    pub code: Option<HexBytes>,
    /// Gas limit
    pub gas: HexU64,
    /// Gas price
    #[serde(default)]
    pub gas_price: HexWord,
    /// Frame kind
    #[serde(default)]
    pub kind: FixtureKind,
    /// Raw frame flags, 1 = static
    #[serde(default)]
    pub flags: u32,
    /// Nesting depth of the frame
    #[serde(default)]
    pub depth: usize,
}

impl FixtureExec {
    /// Frame flags understood by the engine
    pub fn call_flags(&self) -> CallFlags {
        CallFlags::from_bits_truncate(self.flags)
    }
}

/// Account state
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountState {
    /// Balance
    pub balance: HexWord,
    /// Code
    pub code: HexBytes,
    /// Nonce
    pub nonce: HexU64,
    /// Storage
    pub storage: StorageMap,
}

/// Expected outcome; absent fields are not checked
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// Terminal status
    pub status: StatusCode,
    /// Gas left after execution, refunds included
    #[serde(default)]
    pub gas_left: Option<HexU64>,
    /// Return or revert data
    #[serde(default)]
    pub output: Option<HexBytes>,
    /// Storage slots after execution, per account
    #[serde(default)]
    pub storage: Option<BTreeMap<HexWord, StorageMap>>,
    /// Number of logs emitted
    #[serde(default)]
    pub logs: Option<usize>,
}
