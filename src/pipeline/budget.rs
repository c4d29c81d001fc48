//! Global failure budget for a crawl.
//!
//! Every failed lookup is charged to one shared counter. Once the counter
//! exceeds the configured limit the crawl is aborted: a long run of
//! failures points at upstream rate limiting or a bad session rather than
//! transient noise.

use crate::error::{AppError, Result};

/// Result of charging a failure to the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// Still within the limit
    Healthy { failures: usize, remaining: usize },
    /// Limit exceeded - abort the crawl
    Exhausted { failures: usize, limit: usize },
}

/// Shared failure counter.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    limit: usize,
    failures: usize,
}

impl FailureBudget {
    /// Create a budget that tolerates `limit` failures.
    pub fn new(limit: usize) -> Self {
        Self { limit, failures: 0 }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current status without charging anything.
    pub fn check(&self) -> BudgetStatus {
        if self.failures > self.limit {
            BudgetStatus::Exhausted {
                failures: self.failures,
                limit: self.limit,
            }
        } else {
            BudgetStatus::Healthy {
                failures: self.failures,
                remaining: self.limit - self.failures,
            }
        }
    }

    /// Charge one failure and report the new status.
    pub fn record(&mut self) -> BudgetStatus {
        self.failures += 1;
        self.check()
    }

    /// Charge one failure; Err once the budget is exhausted.
    pub fn charge(&mut self) -> Result<()> {
        match self.record() {
            BudgetStatus::Healthy { failures, remaining } => {
                log::debug!(
                    "Failure budget: {} failure(s), {} remaining",
                    failures,
                    remaining
                );
                Ok(())
            }
            BudgetStatus::Exhausted { failures, limit } => {
                log::error!(
                    "Failure budget: EXHAUSTED ({} failures > {} allowed); aborting",
                    failures,
                    limit
                );
                Err(AppError::BudgetExceeded { failures, limit })
            }
        }
    }
}

impl Default for FailureBudget {
    fn default() -> Self {
        Self::new(20)
    }
}
