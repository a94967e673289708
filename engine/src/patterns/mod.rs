//! Pattern library: the catalog of known learner bug signatures.
//!
//! Each [`PatternRule`] pairs a text matcher with a category, a severity and
//! a message template. Rules know nothing about Java grammar; they match
//! masked source text (string contents and comments blanked out) and are
//! allowed to produce false positives.
//!
//! # Rule scopes
//!
//! ```text
//! Matcher::Line      one line in isolation
//! Matcher::Window    one line plus a bounded neighbourhood
//! Matcher::Document  the whole document, reporting any number of lines
//! ```
//!
//! Templates interpolate `{key}` placeholders from the bindings a matcher
//! returns, e.g. `"Index {index} is out of bounds for length {size}"`.

mod contextual;
mod local;
pub mod text;

use crate::diagnostic::{ErrorCategory, Severity};
use crate::source::SourceDocument;

/// Values captured by a matcher, substituted into the rule's template.
pub type Bindings = Vec<(&'static str, String)>;

/// Source prepared for matching: raw lines plus masked code lines.
pub struct ScanInput<'a> {
    raw: &'a SourceDocument,
    code: Vec<String>,
}

impl<'a> ScanInput<'a> {
    pub fn new(raw: &'a SourceDocument) -> Self {
        Self {
            raw,
            code: text::mask_lines(raw.lines()),
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Masked code of a 1-indexed line; empty when out of range.
    pub fn code(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|idx| self.code.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Raw text of a 1-indexed line; empty when out of range.
    pub fn raw(&self, line: usize) -> &str {
        self.raw.line(line).unwrap_or("")
    }

    /// `(line_number, masked_code)` pairs.
    pub fn code_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.code
            .iter()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.as_str()))
    }
}

/// How a rule inspects the source.
#[derive(Clone, Copy)]
pub enum Matcher {
    /// `(masked_code, raw_line)` of a single line.
    Line(fn(&str, &str) -> Option<Bindings>),
    /// A 1-indexed line with access to its neighbours.
    Window(fn(&ScanInput<'_>, usize) -> Option<Bindings>),
    /// The whole document; returns `(line, bindings)` for each hit.
    Document(fn(&ScanInput<'_>) -> Vec<(usize, Bindings)>),
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(_) => write!(f, "Line"),
            Self::Window(_) => write!(f, "Window"),
            Self::Document(_) => write!(f, "Document"),
        }
    }
}

/// A single signature rule.
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    /// Stable rule id (e.g., "division-by-literal-zero").
    pub id: &'static str,
    /// What the rule catches.
    pub description: &'static str,
    pub category: ErrorCategory,
    pub severity: Severity,
    /// Message with `{key}` placeholders.
    pub template: &'static str,
    pub matcher: Matcher,
}

impl PatternRule {
    /// Render this rule's template with the given bindings.
    pub fn message(&self, bindings: &Bindings) -> String {
        render(self.template, bindings)
    }

    /// Whether the rule looks beyond a single line.
    pub fn is_contextual(&self) -> bool {
        !matches!(self.matcher, Matcher::Line(_))
    }
}

/// Substitute `{key}` placeholders. Unknown placeholders are left as-is.
pub fn render(template: &str, bindings: &Bindings) -> String {
    bindings
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
}

/// Look up a rule in the default catalog by id.
pub fn rule(id: &str) -> Option<&'static PatternRule> {
    DEFAULT_RULES.iter().find(|r| r.id == id)
}

/// The default catalog, in evaluation order.
pub static DEFAULT_RULES: &[PatternRule] = &[
    PatternRule {
        id: "division-by-literal-zero",
        description: "Integer division or remainder by the literal 0",
        category: ErrorCategory::DivisionByZero,
        severity: Severity::Error,
        template: "Division by zero: `{expr}` throws ArithmeticException at runtime.",
        matcher: Matcher::Line(local::division_by_literal_zero),
    },
    PatternRule {
        id: "empty-loop-body",
        description: "Semicolon directly after a for/while header",
        category: ErrorCategory::OtherLogical,
        severity: Severity::Warning,
        template: "`{keyword}` header ends with `;`, so the loop body is empty and the block below runs once.",
        matcher: Matcher::Window(local::empty_loop_body),
    },
    PatternRule {
        id: "empty-if-body",
        description: "Semicolon directly after an if condition",
        category: ErrorCategory::OtherLogical,
        severity: Severity::Warning,
        template: "`if` condition is followed by `;`, so the block below always runs.",
        matcher: Matcher::Line(local::empty_if_body),
    },
    PatternRule {
        id: "assignment-in-condition",
        description: "Single `=` inside an if/while condition",
        category: ErrorCategory::OtherLogical,
        severity: Severity::Warning,
        template: "`{target} =` assigns inside a condition; use `==` to compare.",
        matcher: Matcher::Line(local::assignment_in_condition),
    },
    PatternRule {
        id: "string-literal-identity",
        description: "String literal compared with == or !=",
        category: ErrorCategory::StringIdentityComparison,
        severity: Severity::Warning,
        template: "String compared with `{op}` against a literal; use `.equals()` to compare contents.",
        matcher: Matcher::Line(local::string_literal_identity),
    },
    PatternRule {
        id: "string-variable-identity",
        description: "Two String variables compared with == or !=",
        category: ErrorCategory::StringIdentityComparison,
        severity: Severity::Warning,
        template: "Strings `{left}` and `{right}` compared with `{op}`; use `{left}.equals({right})`.",
        matcher: Matcher::Document(contextual::string_variable_identity),
    },
    PatternRule {
        id: "int-literal-overflow",
        description: "Integer literal outside the int range",
        category: ErrorCategory::IntegerOverflow,
        severity: Severity::Error,
        template: "`{value}` does not fit in an int (range -2147483648..2147483647); declare `{name}` as long.",
        matcher: Matcher::Line(local::int_literal_overflow),
    },
    PatternRule {
        id: "int-product-overflow",
        description: "Product of int literals past Integer.MAX_VALUE",
        category: ErrorCategory::IntegerOverflow,
        severity: Severity::Warning,
        template: "`{left} * {right}` = {product} overflows int; `{name}` receives a wrapped value.",
        matcher: Matcher::Line(local::int_product_overflow),
    },
    PatternRule {
        id: "max-value-arithmetic",
        description: "Arithmetic pushing Integer.MAX_VALUE/MIN_VALUE past its range",
        category: ErrorCategory::IntegerOverflow,
        severity: Severity::Warning,
        template: "`{expr}` overflows and wraps around to the other end of the int range.",
        matcher: Matcher::Line(local::max_value_arithmetic),
    },
    PatternRule {
        id: "integer-division-to-double",
        description: "Integer division assigned to a floating point variable",
        category: ErrorCategory::OtherLogical,
        severity: Severity::Warning,
        template: "`{left} / {right}` is integer division and yields {quotient} before `{name}` becomes a double; write `{left}.0 / {right}`.",
        matcher: Matcher::Line(local::integer_division_to_double),
    },
    PatternRule {
        id: "length-inclusive-bound",
        description: "Loop bound `<=` against a length or size",
        category: ErrorCategory::OffByOne,
        severity: Severity::Error,
        template: "Bound `<= {bound}` reaches one past the last index; use `< {bound}`.",
        matcher: Matcher::Line(local::length_inclusive_bound),
    },
    PatternRule {
        id: "array-size-inclusive-loop",
        description: "Loop bound `<=` against the size used to allocate an array",
        category: ErrorCategory::OffByOne,
        severity: Severity::Error,
        template: "Loop runs while `{var} <= {bound}` but `{array}` holds {bound} elements (last index {last}); use `<`.",
        matcher: Matcher::Document(contextual::array_size_inclusive_loop),
    },
    PatternRule {
        id: "array-literal-out-of-bounds",
        description: "Literal index at or past an array's declared size",
        category: ErrorCategory::OutOfBounds,
        severity: Severity::Error,
        template: "Index {index} is out of bounds for `{array}` of length {size}.",
        matcher: Matcher::Document(contextual::array_literal_out_of_bounds),
    },
    PatternRule {
        id: "negative-literal-index",
        description: "Negative literal used as an index",
        category: ErrorCategory::OutOfBounds,
        severity: Severity::Error,
        template: "Index -{index} on `{name}` is always out of bounds.",
        matcher: Matcher::Line(local::negative_literal_index),
    },
    PatternRule {
        id: "char-at-length",
        description: "charAt/get with the collection's own length",
        category: ErrorCategory::OutOfBounds,
        severity: Severity::Error,
        template: "`{call}` reads one past the end; the last valid index is length - 1.",
        matcher: Matcher::Line(local::char_at_length),
    },
    PatternRule {
        id: "null-then-dereference",
        description: "Member access on a variable last assigned null",
        category: ErrorCategory::NullDereference,
        severity: Severity::Error,
        template: "`{name}` is still null here (assigned on line {assigned}); `{name}.` throws NullPointerException.",
        matcher: Matcher::Document(contextual::null_then_dereference),
    },
    PatternRule {
        id: "unbounded-loop",
        description: "while(true)/for(;;) whose body has no break, return or exit",
        category: ErrorCategory::UnboundedRecursion,
        severity: Severity::Warning,
        template: "`{header}` has no `break`, `return` or `System.exit` after it, so it never ends.",
        matcher: Matcher::Document(contextual::unbounded_loop),
    },
    PatternRule {
        id: "recursion-without-base-case",
        description: "Method calling itself with no conditional in its body",
        category: ErrorCategory::UnboundedRecursion,
        severity: Severity::Error,
        template: "`{name}` calls itself unconditionally; add a base case or it ends in StackOverflowError.",
        matcher: Matcher::Document(contextual::recursion_without_base_case),
    },
    PatternRule {
        id: "swap-without-temporary",
        description: "Two consecutive assignments attempting a swap without a temporary",
        category: ErrorCategory::OtherLogical,
        severity: Severity::Warning,
        template: "`{left} = {right};` then `{right} = {left};` loses the old value of `{left}`; swap through a temporary.",
        matcher: Matcher::Window(local::swap_without_temporary),
    },
];
