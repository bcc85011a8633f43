//! Fixture runner and report

use crate::error::{FixtureError, FixtureResult};
use crate::types::*;
use bytes::Bytes;
use fvm_engine::{ExecutionContext, ExecutionResult, Vm};
use fvm_primitives::{Balance, U256};
use fvm_repository::{Account, MemoryRepository, Repository};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a batch of fixture cases
#[derive(Debug, Default)]
pub struct FixtureReport {
    /// Cases passed
    pub passed: Vec<String>,
    /// Failed cases with reasons
    pub failed: Vec<(String, String)>,
    /// Wall time spent
    pub duration: Duration,
}

impl FixtureReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of cases
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Pass rate as percentage
    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            return 100.0;
        }
        (self.passed.len() as f64 / self.total() as f64) * 100.0
    }

    /// Fold `other` into this report
    pub fn merge(&mut self, other: FixtureReport) {
        self.passed.extend(other.passed);
        self.failed.extend(other.failed);
        self.duration += other.duration;
    }
}

impl fmt::Display for FixtureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} passed, {} failed ({:.2}%) in {:.2}s",
            self.passed.len(),
            self.failed.len(),
            self.pass_rate(),
            self.duration.as_secs_f64()
        )?;
        for (name, reason) in &self.failed {
            writeln!(f, "  - {}: {}", name, reason)?;
        }
        Ok(())
    }
}

/// Runs fixture cases against one engine
#[derive(Debug, Default)]
pub struct FixtureRunner {
    vm: Vm,
}

impl FixtureRunner {
    /// Create a runner around `vm`
    pub fn new(vm: Vm) -> Self {
        Self { vm }
    }

    /// Run every case of a fixture file
    pub fn run_file(&self, path: &Path) -> FixtureResult<FixtureReport> {
        let content = std::fs::read_to_string(path)?;
        self.run_json(&content)
    }

    /// Run every case of a fixture document
    pub fn run_json(&self, json: &str) -> FixtureResult<FixtureReport> {
        let cases: FixtureFile = serde_json::from_str(json)?;
        let start = Instant::now();
        let mut report = FixtureReport::new();

        for (name, case) in cases {
            match self.run_case(&name, &case) {
                Ok(_) => {
                    debug!(case = %name, "fixture passed");
                    report.passed.push(name);
                }
                Err(e) => {
                    warn!(case = %name, error = %e, "fixture failed");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        report.duration = start.elapsed();
        Ok(report)
    }

    /// Run every `.json` file below `dir`, recursively
    pub fn run_dir(&self, dir: &Path) -> FixtureResult<FixtureReport> {
        let mut report = FixtureReport::new();
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                report.merge(self.run_dir(&path)?);
            } else if path.extension().is_some_and(|e| e == "json") {
                report.merge(self.run_file(&path)?);
            }
        }
        Ok(report)
    }

    /// Run a single case and check its expectation
    pub fn run_case(&self, name: &str, case: &FixtureCase) -> FixtureResult<ExecutionResult> {
        let mut repo = seed(case)?;
        let ctx = build_context(case)?;
        let code = match &case.exec.code {
            Some(code) => Bytes::from(code.0.clone()),
            None => repo.get_code(&ctx.address)?,
        };

        let result = self.vm.execute(&code, &ctx, &mut repo);
        debug!(case = name, status = %result.status, gas_left = result.gas_remaining, "fixture executed");

        if result.is_success() {
            for address in &result.selfdestructs {
                repo.delete_account(address)?;
            }
        }
        repo.commit();

        check(name, &case.expect, &result, &repo)?;
        Ok(result)
    }
}

fn to_balance(word: &HexWord, field: &str) -> FixtureResult<Balance> {
    if word.0 > U256::from(u128::MAX) {
        return Err(FixtureError::Parse(format!("{} does not fit 128 bits", field)));
    }
    Ok(word.0.low_u128())
}

/// Repository holding the pre-state of `case`
fn seed(case: &FixtureCase) -> FixtureResult<MemoryRepository> {
    let mut repo = MemoryRepository::new();
    for (address, state) in &case.pre {
        let address = address.address();
        repo.insert_account(
            address,
            Account {
                nonce: state.nonce.0,
                balance: to_balance(&state.balance, "balance")?,
                code: Bytes::from(state.code.0.clone()),
            },
        );
        for (key, value) in &state.storage {
            repo.insert_storage(address, key.h256(), value.h256());
        }
    }
    for (number, hash) in &case.env.block_hashes {
        repo.insert_block_hash(*number, hash.h256());
    }
    Ok(repo)
}

fn build_context(case: &FixtureCase) -> FixtureResult<ExecutionContext> {
    let exec = &case.exec;
    let caller = exec.caller.address();
    let mut ctx = ExecutionContext::new(
        exec.address.address(),
        caller,
        to_balance(&exec.value, "value")?,
        Bytes::from(exec.data.0.clone()),
        exec.gas.0,
    );
    ctx.origin = exec.origin.map_or(caller, |o| o.address());
    ctx.gas_price = to_balance(&exec.gas_price, "gasPrice")?;
    ctx.kind = exec.kind.into();
    ctx.flags = exec.call_flags();
    ctx.depth = exec.depth;
    ctx.block = case.env.block();
    Ok(ctx)
}

fn check(
    name: &str,
    expect: &Expectation,
    result: &ExecutionResult,
    repo: &MemoryRepository,
) -> FixtureResult<()> {
    if result.status != expect.status {
        return Err(FixtureError::Assertion(format!(
            "{}: status mismatch: expected {}, got {}",
            name, expect.status, result.status
        )));
    }

    if let Some(gas_left) = expect.gas_left {
        if result.gas_remaining != gas_left.0 {
            return Err(FixtureError::Assertion(format!(
                "{}: gas mismatch: expected {}, got {}",
                name, gas_left.0, result.gas_remaining
            )));
        }
    }

    if let Some(output) = &expect.output {
        if result.output[..] != output.0[..] {
            return Err(FixtureError::Assertion(format!(
                "{}: output mismatch: expected 0x{}, got 0x{}",
                name,
                hex::encode(&output.0),
                hex::encode(&result.output)
            )));
        }
    }

    if let Some(count) = expect.logs {
        if result.logs.len() != count {
            return Err(FixtureError::Assertion(format!(
                "{}: log count mismatch: expected {}, got {}",
                name,
                count,
                result.logs.len()
            )));
        }
    }

    if let Some(storage) = &expect.storage {
        for (address, slots) in storage {
            let address = address.address();
            for (key, value) in slots {
                let actual = repo.get_storage(&address, &key.h256())?;
                if actual != value.h256() {
                    return Err(FixtureError::Assertion(format!(
                        "{}: storage mismatch at {} [{}]: expected {}, got {}",
                        name,
                        address,
                        key.h256(),
                        value.h256(),
                        actual
                    )));
                }
            }
        }
    }

    Ok(())
}
