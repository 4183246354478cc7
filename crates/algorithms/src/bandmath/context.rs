//! Per-worker evaluation state and clamp diagnostics

use super::engine::PassPlan;
use super::neighborhood::NeighborhoodCache;
use rastermath_expr::{Program, Value};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Counters accumulated while writing one expression's output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Components clamped to the lower bound of the output type
    pub underflow: u64,
    /// Components clamped to the upper bound of the output type
    pub overflow: u64,
    /// Positions whose evaluation failed and were written as NaN
    pub runtime_errors: u64,
    /// NaN components written to an integer output, stored as 0
    pub nan_to_integer: u64,
}

impl Diagnostics {
    /// Total number of clamped components
    pub fn clamped(&self) -> u64 {
        self.underflow + self.overflow
    }

    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for Diagnostics {
    fn add_assign(&mut self, rhs: Self) {
        self.underflow += rhs.underflow;
        self.overflow += rhs.overflow;
        self.runtime_errors += rhs.runtime_errors;
        self.nan_to_integer += rhs.nan_to_integer;
    }
}

/// Mutable interpreter state owned by exactly one worker.
///
/// Holds its own copy of the variable slots, its own neighborhood cache and
/// its own clones of the compiled programs; nothing in it is shared.
#[derive(Debug)]
pub struct EvaluationContext {
    pub(crate) slots: Vec<Value>,
    pub(crate) cache: NeighborhoodCache,
    pub(crate) programs: Vec<Program>,
    pub(crate) diagnostics: Vec<Diagnostics>,
}

impl EvaluationContext {
    pub fn new(plan: &PassPlan<'_, '_>) -> Self {
        Self {
            slots: plan.template.clone(),
            cache: NeighborhoodCache::new(),
            programs: plan.programs.clone(),
            diagnostics: vec![Diagnostics::default(); plan.programs.len()],
        }
    }

    /// Counters per expression, in compilation order
    pub fn diagnostics(&self) -> &[Diagnostics] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostics> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_add_assign() {
        let mut total = Diagnostics::default();
        assert!(total.is_clean());
        total += Diagnostics {
            underflow: 2,
            overflow: 1,
            runtime_errors: 0,
            nan_to_integer: 1,
        };
        total += Diagnostics {
            underflow: 0,
            overflow: 4,
            runtime_errors: 3,
            nan_to_integer: 0,
        };
        assert_eq!(total.underflow, 2);
        assert_eq!(total.overflow, 5);
        assert_eq!(total.runtime_errors, 3);
        assert_eq!(total.nan_to_integer, 1);
        assert_eq!(total.clamped(), 7);
        assert!(!total.is_clean());
    }
}
