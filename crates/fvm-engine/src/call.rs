//! Nested call and contract creation dispatch.
//!
//! Every frame runs inside a repository snapshot. A frame that does not end
//! with SUCCESS is rolled back to it; a successful child hands its logs,
//! refunds and self-destruct list to the parent.

use crate::context::{CallKind, ChildParams, ExecutionContext};
use crate::error::{EvmError, EvmResult, StatusCode};
use crate::interpreter::Interpreter;
use crate::memory::Region;
use crate::opcode::{CALL, CALLCODE, DELEGATECALL};
use crate::result::ExecutionResult;
use crate::Vm;
use bytes::Bytes;
use fvm_primitives::{keccak256, Address, Balance, Nonce, U256};
use fvm_repository::Repository;
use tracing::{debug, warn};

/// Address of a contract created by `sender` at `nonce`.
///
/// keccak256 of the sender followed by the big-endian nonce, with the first
/// byte replaced by `0xA0`.
pub fn create_address(sender: &Address, nonce: Nonce) -> Address {
    let mut preimage = [0u8; 40];
    preimage[..32].copy_from_slice(sender.as_bytes());
    preimage[32..].copy_from_slice(&nonce.to_be_bytes());
    let mut bytes = *keccak256(&preimage).as_bytes();
    bytes[0] = 0xA0;
    Address::from_bytes(bytes)
}

/// Call value as a balance; `None` if no account could hold it
fn to_balance(value: U256) -> Option<Balance> {
    if value > U256::from(Balance::MAX) {
        None
    } else {
        Some(value.low_u128())
    }
}

/// Run `frame` inside a snapshot and roll back unless it succeeds
pub(crate) fn isolated<F>(repo: &mut dyn Repository, frame: F) -> ExecutionResult
where
    F: FnOnce(&mut dyn Repository) -> EvmResult<ExecutionResult>,
{
    let snapshot = repo.snapshot();
    let result = frame(&mut *repo).unwrap_or_else(|err| {
        warn!(error = %err, "frame setup failed");
        ExecutionResult::from_error(err, 0)
    });
    if !result.is_success() {
        if let Err(err) = repo.revert_to(snapshot) {
            warn!(error = %err, snapshot, "rollback failed");
            return ExecutionResult::fatal(StatusCode::InternalError);
        }
    }
    result
}

impl Vm {
    /// Message call frame; `value` moves from caller to callee inside the snapshot
    fn call_frame(
        &self,
        code: &[u8],
        ctx: &ExecutionContext,
        repo: &mut dyn Repository,
        transfer: bool,
    ) -> ExecutionResult {
        isolated(repo, |repo| {
            if transfer {
                repo.transfer(&ctx.caller, &ctx.address, ctx.value)?;
            }
            Ok(Interpreter::new(self, ctx, code, repo).run())
        })
    }

    /// Creation frame: run init code, then deposit what it returns
    fn create_frame(
        &self,
        init_code: &[u8],
        ctx: &ExecutionContext,
        repo: &mut dyn Repository,
    ) -> ExecutionResult {
        isolated(repo, |repo| {
            repo.create_account(&ctx.address)?;
            if ctx.value > 0 {
                repo.transfer(&ctx.caller, &ctx.address, ctx.value)?;
            }

            let mut result = Interpreter::new(self, ctx, init_code, &mut *repo).run();
            if !result.is_success() {
                return Ok(result);
            }

            let code = std::mem::take(&mut result.output);
            if code.len() > self.config().max_code_size {
                debug!(size = code.len(), "created code too large");
                return Ok(ExecutionResult::fatal(StatusCode::Failure));
            }
            let deposit = self.config().schedule.code_deposit_cost(code.len());
            if deposit > result.gas_remaining {
                debug!(deposit, gas = result.gas_remaining, "cannot pay code deposit");
                return Ok(ExecutionResult::fatal(StatusCode::Failure));
            }
            result.gas_remaining -= deposit;
            repo.set_code(&ctx.address, code)?;
            Ok(result)
        })
    }
}

impl Interpreter<'_> {
    fn depth_exceeded(&self) -> bool {
        self.ctx.depth >= self.vm.config().max_call_depth
    }

    fn can_afford(&self, value: Option<Balance>) -> EvmResult<bool> {
        match value {
            None => Ok(false),
            Some(0) => Ok(true),
            Some(v) => Ok(self.repo.get_balance(&self.ctx.address)? >= v),
        }
    }

    /// Whether `to` can take `value` without its balance overflowing
    fn can_receive(&self, to: &Address, value: Balance) -> EvmResult<bool> {
        if value == 0 {
            return Ok(true);
        }
        Ok(self.repo.get_balance(to)?.checked_add(value).is_some())
    }

    /// Fold a finished child into this frame and push its success flag
    fn absorb(&mut self, mut child: ExecutionResult) -> EvmResult<bool> {
        if child.status == StatusCode::InternalError {
            return Err(EvmError::Internal(format!(
                "nested frame at depth {} failed",
                self.ctx.depth + 1
            )));
        }
        self.gas.reimburse(child.gas_remaining);
        let success = child.is_success();
        if success {
            self.logs.append(&mut child.logs);
            self.refund = self.refund.saturating_add(child.refund);
            for address in child.selfdestructs {
                if !self.selfdestructs.contains(&address) {
                    self.selfdestructs.push(address);
                }
            }
        }
        Ok(success)
    }

    /// CALL, CALLCODE, DELEGATECALL, STATICCALL
    pub(crate) fn call(&mut self, opcode: u8) -> EvmResult<()> {
        let requested = self.stack.pop()?;
        let target = Address::from_u256(self.stack.pop()?);
        let value = if matches!(opcode, CALL | CALLCODE) {
            self.stack.pop()?
        } else {
            U256::zero()
        };
        let args = Region::from_words(self.stack.pop()?, self.stack.pop()?)?;
        let ret = Region::from_words(self.stack.pop()?, self.stack.pop()?)?;
        self.memory.ensure(args);
        self.memory.ensure(ret);
        let input = Bytes::from(self.memory.read(args));
        self.return_data = Bytes::new();

        if self.depth_exceeded() {
            debug!(depth = self.ctx.depth, "call depth exceeded");
            return self.stack.push(U256::zero());
        }
        let amount = to_balance(value);
        if !self.can_afford(amount)? {
            debug!(value = %value, "insufficient balance for call");
            return self.stack.push(U256::zero());
        }
        let value = amount.unwrap_or(0);
        if opcode == CALL && !self.can_receive(&target, value)? {
            debug!(target = %target, value, "recipient balance would overflow");
            return self.stack.push(U256::zero());
        }

        let cap = self.gas.all_but_one_64th();
        let gas = if requested > U256::from(cap) {
            cap
        } else {
            requested.low_u64()
        };
        self.gas.charge(gas)?;
        let stipend = if value > 0 {
            self.vm.config().schedule.call_stipend
        } else {
            0
        };
        let gas_limit = gas.saturating_add(stipend);

        let params = match opcode {
            CALL => ChildParams {
                kind: CallKind::Call,
                address: target,
                caller: self.ctx.address,
                value,
                data: input,
                gas_limit,
                is_static: false,
            },
            CALLCODE => ChildParams {
                kind: CallKind::CallCode,
                address: self.ctx.address,
                caller: self.ctx.address,
                value,
                data: input,
                gas_limit,
                is_static: false,
            },
            DELEGATECALL => ChildParams {
                kind: CallKind::DelegateCall,
                address: self.ctx.address,
                caller: self.ctx.caller,
                value: self.ctx.value,
                data: input,
                gas_limit,
                is_static: false,
            },
            _ => ChildParams {
                kind: CallKind::Call,
                address: target,
                caller: self.ctx.address,
                value: 0,
                data: input,
                gas_limit,
                is_static: true,
            },
        };
        let child_ctx = self.ctx.child(params);
        let code = self.repo.get_code(&target)?;
        let transfer = opcode == CALL && value > 0;

        debug!(
            depth = child_ctx.depth,
            target = %target,
            kind = ?child_ctx.kind,
            gas = gas_limit,
            "dispatch call"
        );
        let result = self.vm.call_frame(&code, &child_ctx, &mut *self.repo, transfer);

        let output = result.output.clone();
        let success = self.absorb(result)?;
        self.memory.write_truncated(ret, &output);
        self.return_data = output;
        self.stack.push_bool(success)
    }

    /// CREATE
    pub(crate) fn create(&mut self) -> EvmResult<()> {
        let value = self.stack.pop()?;
        let region = Region::from_words(self.stack.pop()?, self.stack.pop()?)?;
        self.memory.ensure(region);
        let init_code = self.memory.read(region);
        self.return_data = Bytes::new();

        if self.depth_exceeded() {
            debug!(depth = self.ctx.depth, "create depth exceeded");
            return self.stack.push(U256::zero());
        }
        let amount = to_balance(value);
        if !self.can_afford(amount)? {
            debug!(value = %value, "insufficient balance for create");
            return self.stack.push(U256::zero());
        }
        let value = amount.unwrap_or(0);

        let nonce = self.repo.increment_nonce(&self.ctx.address)?;
        let address = create_address(&self.ctx.address, nonce);
        let gas = self.gas.all_but_one_64th();
        self.gas.charge(gas)?;

        if self.repo.get_nonce(&address)? > 0 || !self.repo.get_code(&address)?.is_empty() {
            debug!(address = %address, "create collision");
            return self.stack.push(U256::zero());
        }
        if !self.can_receive(&address, value)? {
            debug!(address = %address, value, "created account balance would overflow");
            self.gas.reimburse(gas);
            return self.stack.push(U256::zero());
        }

        let child_ctx = self.ctx.child(ChildParams {
            kind: CallKind::Create,
            address,
            caller: self.ctx.address,
            value,
            data: Bytes::new(),
            gas_limit: gas,
            is_static: false,
        });
        debug!(depth = child_ctx.depth, address = %address, gas, "dispatch create");
        let result = self.vm.create_frame(&init_code, &child_ctx, &mut *self.repo);

        let reverted = result.is_revert();
        let output = result.output.clone();
        if self.absorb(result)? {
            self.stack.push(address.to_u256())
        } else {
            if reverted {
                self.return_data = output;
            }
            self.stack.push(U256::zero())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_address_prefix() {
        let sender = Address::from_low_u64(1);
        let a = create_address(&sender, 0);
        let b = create_address(&sender, 1);
        assert_eq!(a.as_bytes()[0], 0xA0);
        assert_eq!(b.as_bytes()[0], 0xA0);
        assert_ne!(a, b);
        assert_eq!(a, create_address(&sender, 0));
    }

    #[test]
    fn test_create_address_matches_hash() {
        let sender = Address::from_low_u64(0xabc);
        let mut preimage = sender.as_bytes().to_vec();
        preimage.extend_from_slice(&7u64.to_be_bytes());
        let hash = keccak256(&preimage);
        let addr = create_address(&sender, 7);
        assert_eq!(addr.as_bytes()[1..], hash.as_bytes()[1..]);
    }

    #[test]
    fn test_to_balance() {
        assert_eq!(to_balance(U256::from(5)), Some(5));
        assert_eq!(to_balance(U256::from(Balance::MAX)), Some(Balance::MAX));
        assert_eq!(to_balance(U256::from(Balance::MAX) + 1), None);
    }
}
