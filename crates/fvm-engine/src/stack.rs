//! Operand stack

use crate::error::{EvmError, EvmResult};
use primitive_types::U256;

/// Default maximum stack depth
pub const DEFAULT_STACK_LIMIT: usize = 1024;

/// Bounded stack of 256-bit words
#[derive(Clone, Debug)]
pub struct Stack {
    data: Vec<U256>,
    limit: usize,
}

impl Stack {
    /// Create an empty stack with the default limit
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_STACK_LIMIT)
    }

    /// Create an empty stack holding at most `limit` items
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::with_capacity(limit.min(DEFAULT_STACK_LIMIT)),
            limit,
        }
    }

    /// Check that an instruction popping `inputs` and pushing `outputs` fits
    pub fn require(&self, inputs: usize, outputs: usize) -> EvmResult<()> {
        if self.data.len() < inputs {
            return Err(EvmError::StackUnderflow);
        }
        if self.data.len() - inputs + outputs > self.limit {
            return Err(EvmError::StackOverflow);
        }
        Ok(())
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: U256) -> EvmResult<()> {
        if self.data.len() >= self.limit {
            return Err(EvmError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Push a boolean as 0 or 1
    pub fn push_bool(&mut self, value: bool) -> EvmResult<()> {
        self.push(if value { U256::one() } else { U256::zero() })
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> EvmResult<U256> {
        self.data.pop().ok_or(EvmError::StackUnderflow)
    }

    /// Peek at the top of the stack
    pub fn peek(&self) -> EvmResult<&U256> {
        self.data.last().ok_or(EvmError::StackUnderflow)
    }

    /// Peek at a specific depth (0 = top)
    pub fn peek_at(&self, depth: usize) -> EvmResult<&U256> {
        if depth >= self.data.len() {
            return Err(EvmError::StackUnderflow);
        }
        Ok(&self.data[self.data.len() - 1 - depth])
    }

    /// Swap top with item at depth (1 = swap with second item)
    pub fn swap(&mut self, depth: usize) -> EvmResult<()> {
        let len = self.data.len();
        if depth == 0 || depth >= len {
            return Err(EvmError::StackUnderflow);
        }
        self.data.swap(len - 1, len - 1 - depth);
        Ok(())
    }

    /// Duplicate item at depth to top (1 = dup top)
    pub fn dup(&mut self, depth: usize) -> EvmResult<()> {
        if depth == 0 || depth > self.data.len() {
            return Err(EvmError::StackUnderflow);
        }
        let value = self.data[self.data.len() - depth];
        self.push(value)
    }

    /// Get current stack size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if stack is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
