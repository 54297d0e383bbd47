//! Comparison operators and stat conditions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operator used by block conditions, choice requirements and
/// dynamic routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    /// `>=`
    #[default]
    #[serde(rename = ">=")]
    AtLeast,
    /// `<=`
    #[serde(rename = "<=")]
    AtMost,
    /// `=`
    #[serde(rename = "=")]
    Equal,
    /// `>`
    #[serde(rename = ">")]
    Greater,
    /// `<`
    #[serde(rename = "<")]
    Less,
}

impl Operator {
    /// Parses an authored operator symbol. Unknown symbols fall back to `>=`.
    #[must_use]
    pub fn parse(symbol: &str) -> Self {
        match symbol.trim() {
            "<=" => Self::AtMost,
            "=" | "==" => Self::Equal,
            ">" => Self::Greater,
            "<" => Self::Less,
            _ => Self::AtLeast,
        }
    }

    /// Evaluates `lhs <op> rhs`.
    #[must_use]
    pub fn compare(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::AtLeast => lhs >= rhs,
            Self::AtMost => lhs <= rhs,
            Self::Equal => lhs == rhs,
            Self::Greater => lhs > rhs,
            Self::Less => lhs < rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::AtLeast => ">=",
            Self::AtMost => "<=",
            Self::Equal => "=",
            Self::Greater => ">",
            Self::Less => "<",
        };
        f.write_str(symbol)
    }
}

/// A single `stat <op> value` check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Stat or relation key. Missing keys read as zero.
    pub key: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Right-hand side of the comparison.
    pub value: i64,
}

impl Condition {
    /// Checks the condition against a value lookup.
    pub fn holds(&self, lookup: impl Fn(&str) -> i64) -> bool {
        self.operator.compare(lookup(&self.key), self.value)
    }
}

/// Checks that every condition holds (logical AND). An empty list holds.
pub fn all_hold(conditions: &[Condition], lookup: impl Fn(&str) -> i64) -> bool {
    conditions.iter().all(|condition| condition.holds(&lookup))
}
