// Boolean filter expressions over field checks.

use crate::comparator::FilterCheck;
use crate::error::Result;
use crate::event::JsonEvent;

/// A rule condition: field checks combined with AND, OR and NOT.
///
/// Evaluation short-circuits. A fatal error from any evaluated check stops
/// evaluation and is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Always matches
    Always,

    /// Compare a field value
    Check(FilterCheck),

    /// All sub-expressions must match
    And(Vec<FilterExpr>),

    /// At least one sub-expression must match
    Or(Vec<FilterExpr>),

    /// Inverts the result
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Evaluates the expression against `event`.
    pub fn evaluate(&self, event: &JsonEvent) -> Result<bool> {
        match self {
            FilterExpr::Always => Ok(true),
            FilterExpr::Check(check) => check.compare(event),
            FilterExpr::And(exprs) => {
                for expr in exprs {
                    if !expr.evaluate(event)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterExpr::Or(exprs) => {
                for expr in exprs {
                    if expr.evaluate(event)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FilterExpr::Not(expr) => Ok(!expr.evaluate(event)?),
        }
    }

    /// Number of field checks in the expression.
    pub fn check_count(&self) -> usize {
        match self {
            FilterExpr::Always => 0,
            FilterExpr::Check(_) => 1,
            FilterExpr::And(exprs) | FilterExpr::Or(exprs) => {
                exprs.iter().map(FilterExpr::check_count).sum()
            }
            FilterExpr::Not(expr) => expr.check_count(),
        }
    }
}

impl From<FilterCheck> for FilterExpr {
    fn from(check: FilterCheck) -> Self {
        FilterExpr::Check(check)
    }
}
