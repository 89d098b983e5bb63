// Comparison of extracted field text against literal operands.
//
// A `FilterCheck` is the leaf of a rule condition: a bound field, an
// operator and the operands written in the rule. Extraction always yields
// text, so every operator works on strings; the ordering operators parse
// both sides as integers first.

use crate::error::{EngineError, Result};
use crate::event::{JsonEvent, NOT_AVAILABLE};
use crate::factory::FilterFactory;
use crate::field_check::BoundField;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// Comparison operators for field checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Contains,   // Operand is a substring
    StartsWith, // Operand is a prefix
    In,         // Equal to any operand
    Lt,
    Le,
    Gt,
    Ge,
    Exists, // Field present and non-empty
}

impl ComparisonOp {
    /// The operator as written in rule conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Contains => "contains",
            ComparisonOp::StartsWith => "startswith",
            ComparisonOp::In => "in",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Exists => "exists",
        }
    }

    /// Returns true if the operator compares against exactly one operand.
    pub fn needs_operand(&self) -> bool {
        !matches!(self, ComparisonOp::In | ComparisonOp::Exists)
    }
}

impl FromStr for ComparisonOp {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "==" => Ok(ComparisonOp::Eq),
            "!=" => Ok(ComparisonOp::Ne),
            "contains" => Ok(ComparisonOp::Contains),
            "startswith" => Ok(ComparisonOp::StartsWith),
            "in" => Ok(ComparisonOp::In),
            "<" => Ok(ComparisonOp::Lt),
            "<=" => Ok(ComparisonOp::Le),
            ">" => Ok(ComparisonOp::Gt),
            ">=" => Ok(ComparisonOp::Ge),
            "exists" => Ok(ComparisonOp::Exists),
            other => Err(EngineError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compares extracted field text against the operands of `op`.
///
/// Fails only when a single-operand operator is given no operand. The
/// ordering operators return false when either side is not an integer.
pub fn compare(op: ComparisonOp, extracted: &str, operands: &[String]) -> Result<bool> {
    let operand = || {
        operands
            .first()
            .map(String::as_str)
            .ok_or_else(|| EngineError::MissingOperand(op.to_string()))
    };

    let matched = match op {
        ComparisonOp::Eq => extracted == operand()?,
        ComparisonOp::Ne => extracted != operand()?,
        ComparisonOp::Contains => extracted.contains(operand()?),
        ComparisonOp::StartsWith => extracted.starts_with(operand()?),
        ComparisonOp::In => operands.iter().any(|v| v == extracted),
        ComparisonOp::Lt => numeric(extracted, operand()?, |a, b| a < b),
        ComparisonOp::Le => numeric(extracted, operand()?, |a, b| a <= b),
        ComparisonOp::Gt => numeric(extracted, operand()?, |a, b| a > b),
        ComparisonOp::Ge => numeric(extracted, operand()?, |a, b| a >= b),
        ComparisonOp::Exists => !extracted.is_empty() && extracted != NOT_AVAILABLE,
    };

    Ok(matched)
}

fn numeric(lhs: &str, rhs: &str, cmp: impl Fn(i64, i64) -> bool) -> bool {
    match (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        (Ok(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

// ============================================================================
// FILTER CHECK
// ============================================================================

/// A bound field compared against literal operands.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCheck {
    field: BoundField,
    op: ComparisonOp,
    values: Vec<String>,
}

impl FilterCheck {
    /// Resolves `field_text` through `factory` and builds the check.
    ///
    /// The whole of `field_text` (ignoring surrounding whitespace) must be
    /// one field reference.
    pub fn new(
        factory: &FilterFactory,
        field_text: &str,
        op: ComparisonOp,
        values: Vec<String>,
    ) -> Result<Self> {
        let text = field_text.trim();

        let (field, consumed) = factory
            .new_filtercheck(text)?
            .ok_or_else(|| EngineError::UnknownField(text.to_string()))?;

        if consumed < text.len() {
            return Err(EngineError::TrailingFieldText {
                field: field.field().to_string(),
                rest: text[consumed..].to_string(),
            });
        }

        Self::from_field(field, op, values)
    }

    /// Builds a check from an already bound field.
    pub fn from_field(field: BoundField, op: ComparisonOp, values: Vec<String>) -> Result<Self> {
        if op.needs_operand() && values.is_empty() {
            return Err(EngineError::MissingOperand(op.to_string()));
        }

        Ok(FilterCheck { field, op, values })
    }

    pub fn field(&self) -> &BoundField {
        &self.field
    }

    pub fn op(&self) -> ComparisonOp {
        self.op
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Extracts the field from `event` and compares it.
    pub fn compare(&self, event: &JsonEvent) -> Result<bool> {
        let extracted = self.field.extract(event);
        compare(self.op, &extracted, &self.values)
    }
}
