//! Single-line and small-window rules.

use regex::Regex;
use std::sync::LazyLock;

use super::text::header_followed_by_semicolon;
use super::{Bindings, ScanInput};

static DIV_ZERO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<expr>[\w.\])]+\s*(?:/=|%=|/|%)\s*0)(?:[^.\w]|$)").unwrap()
});

static ASSIGN_IN_CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|while)\s*\(\s*(?P<target>[A-Za-z_]\w*)\s*=[^=]").unwrap()
});

static STRING_LITERAL_IDENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?P<op>[!=]=)\s*"|"\s*(?P<op2>[!=]=)"#).unwrap());

static INT_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bint\s+(?P<name>[A-Za-z_]\w*)\s*=\s*(?P<value>-?\s*\d+)\s*[;,]").unwrap()
});

static INT_PRODUCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bint\s+(?P<name>[A-Za-z_]\w*)\s*=\s*(?P<left>\d+)\s*\*\s*(?P<right>\d+)\s*;")
        .unwrap()
});

static MAX_VALUE_ARITHMETIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<expr>Integer\.MAX_VALUE\s*[+*]\s*\w+|Integer\.MIN_VALUE\s*-\s*\w+)").unwrap()
});

static INT_DIV_TO_DOUBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:double|float)\s+(?P<name>[A-Za-z_]\w*)\s*=\s*(?P<left>\d+)\s*/\s*(?P<right>\d+)\s*;",
    )
    .unwrap()
});

static LENGTH_INCLUSIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<=\s*(?P<bound>[A-Za-z_][\w.]*\.(?:length\b(?:\s*\(\s*\))?|size\s*\(\s*\)))")
        .unwrap()
});

static NEGATIVE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<name>[A-Za-z_]\w*)\s*\[\s*-\s*(?P<index>\d+)\s*\]").unwrap()
});

static CHAR_AT_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<call>[A-Za-z_]\w*\.(?:charAt|get)\(\s*[A-Za-z_]\w*\.(?:length|size)\(\)\s*\))",
    )
    .unwrap()
});

static SIMPLE_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<left>[A-Za-z_][\w.\[\]]*)\s*=\s*(?P<right>[A-Za-z_][\w.\[\]]*)\s*;\s*$")
        .unwrap()
});

pub(super) fn division_by_literal_zero(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = DIV_ZERO.captures(code)?;
    Some(vec![("expr", squash(&caps["expr"]))])
}

/// `for (...);` or `while (...);`. A `while` closing a do-block is skipped.
pub(super) fn empty_loop_body(input: &ScanInput<'_>, line: usize) -> Option<Bindings> {
    let code = input.code(line);

    if header_followed_by_semicolon(code, "for").is_some() {
        return Some(vec![("keyword", "for".to_string())]);
    }

    let start = header_followed_by_semicolon(code, "while")?;
    if code[..start].trim_end().ends_with('}') {
        return None;
    }
    let previous = (1..line)
        .rev()
        .map(|n| input.code(n).trim())
        .find(|l| !l.is_empty());
    if previous.is_some_and(|p| p.ends_with('}')) {
        return None;
    }
    Some(vec![("keyword", "while".to_string())])
}

pub(super) fn empty_if_body(code: &str, _raw: &str) -> Option<Bindings> {
    header_followed_by_semicolon(code, "if").map(|_| Vec::new())
}

pub(super) fn assignment_in_condition(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = ASSIGN_IN_CONDITION.captures(code)?;
    Some(vec![("target", caps["target"].to_string())])
}

pub(super) fn string_literal_identity(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = STRING_LITERAL_IDENTITY.captures(code)?;
    let op = caps.name("op").or_else(|| caps.name("op2"))?;
    Some(vec![("op", op.as_str().to_string())])
}

pub(super) fn int_literal_overflow(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = INT_LITERAL.captures(code)?;
    let value: String = caps["value"].chars().filter(|c| !c.is_whitespace()).collect();
    let digits = value.trim_start_matches('-');

    // More than 10 digits can never fit; shorter values are checked exactly.
    let fits = digits.len() <= 10
        && value
            .parse::<i64>()
            .is_ok_and(|v| i32::try_from(v).is_ok());
    if fits {
        return None;
    }
    Some(vec![("value", value), ("name", caps["name"].to_string())])
}

pub(super) fn int_product_overflow(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = INT_PRODUCT.captures(code)?;
    let left: i128 = caps["left"].parse().ok()?;
    let right: i128 = caps["right"].parse().ok()?;
    let product = left.checked_mul(right)?;
    if product <= i128::from(i32::MAX) {
        return None;
    }
    Some(vec![
        ("name", caps["name"].to_string()),
        ("left", caps["left"].to_string()),
        ("right", caps["right"].to_string()),
        ("product", product.to_string()),
    ])
}

pub(super) fn max_value_arithmetic(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = MAX_VALUE_ARITHMETIC.captures(code)?;
    Some(vec![("expr", squash(&caps["expr"]))])
}

pub(super) fn integer_division_to_double(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = INT_DIV_TO_DOUBLE.captures(code)?;
    let left: u64 = caps["left"].parse().ok()?;
    let right: u64 = caps["right"].parse().ok()?;
    // exact quotients lose nothing; x / 0 is reported by the zero rule
    if right == 0 || left % right == 0 {
        return None;
    }
    Some(vec![
        ("name", caps["name"].to_string()),
        ("left", caps["left"].to_string()),
        ("right", caps["right"].to_string()),
        ("quotient", (left / right).to_string()),
    ])
}

pub(super) fn length_inclusive_bound(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = LENGTH_INCLUSIVE.captures(code)?;
    Some(vec![("bound", squash(&caps["bound"]))])
}

pub(super) fn negative_literal_index(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = NEGATIVE_INDEX.captures(code)?;
    Some(vec![
        ("name", caps["name"].to_string()),
        ("index", caps["index"].to_string()),
    ])
}

pub(super) fn char_at_length(code: &str, _raw: &str) -> Option<Bindings> {
    let caps = CHAR_AT_LENGTH.captures(code)?;
    Some(vec![("call", squash(&caps["call"]))])
}

/// `a = b;` immediately followed by `b = a;`.
pub(super) fn swap_without_temporary(input: &ScanInput<'_>, line: usize) -> Option<Bindings> {
    let first = SIMPLE_ASSIGN.captures(input.code(line))?;
    let second = SIMPLE_ASSIGN.captures(input.code(line + 1))?;

    let (left, right) = (&first["left"], &first["right"]);
    if left == right || &second["left"] != right || &second["right"] != left {
        return None;
    }
    Some(vec![("left", left.to_string()), ("right", right.to_string())])
}

/// Collapse runs of whitespace so messages quote code compactly.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
