//! Linear frame memory

use crate::error::{EvmError, EvmResult};
use crate::gas::{GasSchedule, MAX_MEMORY_SIZE};
use primitive_types::U256;

/// Byte range `[offset, offset + len)` touched by an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First byte
    pub offset: usize,
    /// Length in bytes (never zero)
    pub len: usize,
}

impl Region {
    /// Resolve stack operands into a region.
    ///
    /// Zero-length accesses touch nothing regardless of offset. Anything
    /// reaching past [`MAX_MEMORY_SIZE`] could never be paid for and is
    /// reported as out of gas.
    pub fn from_words(offset: U256, len: U256) -> EvmResult<Option<Region>> {
        if len.is_zero() {
            return Ok(None);
        }
        let limit = U256::from(MAX_MEMORY_SIZE);
        if offset > limit || len > limit {
            return Err(EvmError::OutOfGas);
        }
        let offset = offset.low_u64() as usize;
        let len = len.low_u64() as usize;
        if offset + len > MAX_MEMORY_SIZE {
            return Err(EvmError::OutOfGas);
        }
        Ok(Some(Region { offset, len }))
    }

    /// One past the last byte
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Frame memory; grows in whole words and never shrinks
#[derive(Clone, Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create new empty memory
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Get current memory size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Gas needed before `regions` can be touched
    pub fn expansion_cost(&self, schedule: &GasSchedule, regions: &[Option<Region>]) -> u64 {
        let end = regions.iter().flatten().map(Region::end).max().unwrap_or(0);
        schedule.memory_expansion(self.data.len(), end)
    }

    /// Grow to cover `region`, rounded up to a word boundary.
    ///
    /// The expansion must already have been charged.
    pub fn ensure(&mut self, region: Option<Region>) {
        if let Some(region) = region {
            let end = region.end();
            if end > self.data.len() {
                self.data.resize(end.div_ceil(32) * 32, 0);
            }
        }
    }

    /// Load a 32-byte word
    pub fn load_word(&mut self, offset: usize) -> U256 {
        self.ensure(Some(Region { offset, len: 32 }));
        U256::from_big_endian(&self.data[offset..offset + 32])
    }

    /// Store a 32-byte word
    pub fn store_word(&mut self, offset: usize, value: U256) {
        self.ensure(Some(Region { offset, len: 32 }));
        value.to_big_endian(&mut self.data[offset..offset + 32]);
    }

    /// Store a single byte
    pub fn store_byte(&mut self, offset: usize, value: u8) {
        self.ensure(Some(Region { offset, len: 1 }));
        self.data[offset] = value;
    }

    /// Copy out a region; `None` yields an empty vector
    pub fn read(&mut self, region: Option<Region>) -> Vec<u8> {
        match region {
            Some(r) => {
                self.ensure(Some(r));
                self.data[r.offset..r.end()].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Write `source[src_offset..]` into `dest`, zero-filling past the end of `source`
    pub fn copy_padded(&mut self, dest: Option<Region>, source: &[u8], src_offset: U256) {
        let Some(dest) = dest else { return };
        self.ensure(Some(dest));
        let target = &mut self.data[dest.offset..dest.end()];
        target.fill(0);
        if src_offset >= U256::from(source.len()) {
            return;
        }
        let start = src_offset.low_u64() as usize;
        let available = (source.len() - start).min(dest.len);
        target[..available].copy_from_slice(&source[start..start + available]);
    }

    /// Write as much of `source` as fits in `dest`
    pub fn write_truncated(&mut self, dest: Option<Region>, source: &[u8]) {
        let Some(dest) = dest else { return };
        self.ensure(Some(dest));
        let n = dest.len.min(source.len());
        self.data[dest.offset..dest.offset + n].copy_from_slice(&source[..n]);
    }
}
