//! Diagnostic taxonomy shared by the scanner, the execution tiers and the UI.
//!
//! `ErrorCategory` serializes to stable snake_case names; those names are the
//! lookup key for educational content and category colouring, so variants
//! must never be renamed.

use serde::{Deserialize, Serialize};

/// Closed error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Arithmetic past `Integer.MAX_VALUE` / literal out of `int` range
    IntegerOverflow,
    /// Member access through a reference known to be null
    NullDereference,
    /// Array, string or list index outside its bounds
    OutOfBounds,
    /// Infinite loops and recursion without a base case
    UnboundedRecursion,
    /// Inclusive bound where an exclusive one was meant
    OffByOne,
    /// Division or remainder by literal zero
    DivisionByZero,
    /// `==` between strings instead of `.equals`
    StringIdentityComparison,
    /// Everything else
    OtherLogical,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        Self::IntegerOverflow,
        Self::NullDereference,
        Self::OutOfBounds,
        Self::UnboundedRecursion,
        Self::OffByOne,
        Self::DivisionByZero,
        Self::StringIdentityComparison,
        Self::OtherLogical,
    ];

    /// Stable key, identical to the serde name.
    pub fn key(&self) -> &'static str {
        match self {
            Self::IntegerOverflow => "integer_overflow",
            Self::NullDereference => "null_dereference",
            Self::OutOfBounds => "out_of_bounds",
            Self::UnboundedRecursion => "unbounded_recursion",
            Self::OffByOne => "off_by_one",
            Self::DivisionByZero => "division_by_zero",
            Self::StringIdentityComparison => "string_identity_comparison",
            Self::OtherLogical => "other_logical",
        }
    }

    /// Parse a key as produced by [`ErrorCategory::key`]. Unknown keys map to
    /// `OtherLogical`.
    pub fn from_key(key: &str) -> Self {
        let normalized = key.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|c| c.key() == normalized)
            .unwrap_or(Self::OtherLogical)
    }

    /// Short human title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::IntegerOverflow => "Integer overflow",
            Self::NullDereference => "Null dereference",
            Self::OutOfBounds => "Index out of bounds",
            Self::UnboundedRecursion => "Infinite loop or recursion",
            Self::OffByOne => "Off-by-one error",
            Self::DivisionByZero => "Division by zero",
            Self::StringIdentityComparison => "String compared with ==",
            Self::OtherLogical => "Logic error",
        }
    }

    /// Learner-facing explanation of the bug class.
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::IntegerOverflow => {
                "An int holds values from -2147483648 to 2147483647. Results outside \
                 that range silently wrap around. Use long, or check the range before \
                 the arithmetic."
            }
            Self::NullDereference => {
                "Calling a method or reading a field through a null reference throws \
                 NullPointerException. Initialise the object or check for null first."
            }
            Self::OutOfBounds => {
                "Valid indexes run from 0 to length - 1. Any other index throws \
                 ArrayIndexOutOfBoundsException or StringIndexOutOfBoundsException."
            }
            Self::UnboundedRecursion => {
                "A loop with no reachable exit, or a recursive method with no base \
                 case, never finishes. Recursion ends in StackOverflowError."
            }
            Self::OffByOne => {
                "Loops over an array of size n should use i < n. Using i <= n visits \
                 one element too many."
            }
            Self::DivisionByZero => {
                "Integer division or remainder by zero throws ArithmeticException."
            }
            Self::StringIdentityComparison => {
                "== compares object identity, not content. Use a.equals(b) to compare \
                 the characters of two strings."
            }
            Self::OtherLogical => {
                "The code compiles but probably does not do what was intended."
            }
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single finding, addressed to a 1-indexed line (0 = unknown).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
    pub severity: Severity,
    pub category: ErrorCategory,
    /// Id of the pattern rule that fired; empty for tier or compiler sourced
    /// diagnostics.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rule: String,
}

impl Diagnostic {
    pub fn new(
        line: usize,
        message: impl Into<String>,
        severity: Severity,
        category: ErrorCategory,
    ) -> Self {
        Self {
            line,
            message: message.into(),
            severity,
            category,
            rule: String::new(),
        }
    }

    pub fn error(line: usize, message: impl Into<String>, category: ErrorCategory) -> Self {
        Self::new(line, message, Severity::Error, category)
    }

    pub fn warning(line: usize, message: impl Into<String>, category: ErrorCategory) -> Self {
        Self::new(line, message, Severity::Warning, category)
    }

    /// Tag with the id of the producing rule.
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{} [{}]: {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "line {}: {} [{}]: {}",
                self.line, self.severity, self.category, self.message
            )
        }
    }
}

/// Sort diagnostics by line, keeping insertion order within a line.
pub fn sort_by_line(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.line);
}
