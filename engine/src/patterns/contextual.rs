//! Whole-document rules: forward scans from an allocation, assignment or loop
//! header, and per-method body checks.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::text::block_from;
use super::{Bindings, ScanInput};

static STRING_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bString\s+(?P<name>[A-Za-z_]\w*)\s*[=;,)]").unwrap());

static IDENTITY_COMPARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<left>[A-Za-z_]\w*)\s*(?P<op>[!=]=)\s*(?P<right>[A-Za-z_]\w*)").unwrap()
});

static ARRAY_NEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<name>[A-Za-z_]\w*)\s*(?:\[\s*\]\s*)?=\s*new\s+\w+\s*\[\s*(?P<size>\w+)\s*\]")
        .unwrap()
});

static ARRAY_INIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<name>[A-Za-z_]\w*)\s*(?:\[\s*\]\s*)?=\s*(?:new\s+\w+\s*\[\s*\]\s*)?\{(?P<items>[^{}]*)\}",
    )
    .unwrap()
});

static INCLUSIVE_BOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<var>[A-Za-z_]\w*)\s*<=\s*(?P<bound>\w+)(?:[^\w.(]|$)").unwrap()
});

static LOOP_KEYWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:for|while)\b").unwrap());

static NULL_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<name>[A-Za-z_]\w*)\s*=\s*null\s*;").unwrap()
});

static INFINITE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<header>\bwhile\s*\(\s*true\s*\)|\bfor\s*\(\s*;\s*;\s*\))").unwrap()
});

static LOOP_EXIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:break|return)\b|System\s*\.\s*exit").unwrap());

static METHOD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:void|int|long|double|float|boolean|char|short|byte|String|[A-Z]\w*)(?:\s*\[\s*\])*\s+(?P<name>[a-z_]\w*)\s*\([^()]*\)\s*(?:throws\s+[\w.,\s]+)?(?:\{|$)",
    )
    .unwrap()
});

static CONDITIONAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:if|switch|while|for)\b|\?|&&|\|\|").unwrap());

const NOT_METHODS: &[&str] = &["if", "while", "for", "switch", "catch", "return", "new"];

/// A fixed-size array allocation, e.g. `int[] a = new int[5]` or `a = {1, 2}`.
struct Allocation {
    name: String,
    /// Literal size, or the identifier used as the size.
    size: String,
    line: usize,
    /// Byte offset just past the allocation on its line.
    end: usize,
}

impl Allocation {
    fn literal_size(&self) -> Option<u64> {
        self.size.parse().ok()
    }
}

fn allocations(input: &ScanInput<'_>) -> Vec<Allocation> {
    let mut found = Vec::new();
    for (line, code) in input.code_lines() {
        for caps in ARRAY_NEW.captures_iter(code) {
            let Some(whole) = caps.get(0) else { continue };
            found.push(Allocation {
                name: caps["name"].to_string(),
                size: caps["size"].to_string(),
                line,
                end: whole.end(),
            });
        }
        for caps in ARRAY_INIT.captures_iter(code) {
            let Some(whole) = caps.get(0) else { continue };
            let items = caps["items"].trim();
            let count = if items.is_empty() {
                0
            } else {
                items.split(',').filter(|s| !s.trim().is_empty()).count()
            };
            found.push(Allocation {
                name: caps["name"].to_string(),
                size: count.to_string(),
                line,
                end: whole.end(),
            });
        }
    }
    found.sort_by_key(|a| (a.line, a.end));
    found
}

/// Lines (with the slice of code to inspect) from just after `alloc` up to the
/// next allocation of the same name.
fn forward_region<'i>(
    input: &'i ScanInput<'_>,
    alloc: &Allocation,
    all: &[Allocation],
) -> Vec<(usize, &'i str)> {
    let stop = all
        .iter()
        .filter(|a| a.name == alloc.name && (a.line, a.end) > (alloc.line, alloc.end))
        .map(|a| a.line)
        .min()
        .unwrap_or(input.len() + 1);

    let mut region = Vec::new();
    for line in alloc.line..=input.len() {
        if line >= stop && line != alloc.line {
            break;
        }
        let code = input.code(line);
        let slice = if line == alloc.line {
            code.get(alloc.end..).unwrap_or("")
        } else {
            code
        };
        region.push((line, slice));
    }
    region
}

/// `for (...; i <= n; ...)` where `n` sized an array declared earlier.
pub(super) fn array_size_inclusive_loop(input: &ScanInput<'_>) -> Vec<(usize, Bindings)> {
    let all = allocations(input);
    let mut hits = Vec::new();

    for alloc in &all {
        for (line, slice) in forward_region(input, alloc, &all) {
            if !LOOP_KEYWORD.is_match(slice) {
                continue;
            }
            for caps in INCLUSIVE_BOUND.captures_iter(slice) {
                if caps["bound"] != alloc.size {
                    continue;
                }
                let last = match alloc.literal_size() {
                    Some(0) | None => format!("{} - 1", alloc.size),
                    Some(n) => (n - 1).to_string(),
                };
                hits.push((
                    line,
                    vec![
                        ("var", caps["var"].to_string()),
                        ("bound", alloc.size.clone()),
                        ("array", alloc.name.clone()),
                        ("last", last),
                    ],
                ));
            }
        }
    }
    hits
}

/// `arr[K]` with a literal `K` at or past the declared size of `arr`.
pub(super) fn array_literal_out_of_bounds(input: &ScanInput<'_>) -> Vec<(usize, Bindings)> {
    let all = allocations(input);
    let mut hits = Vec::new();

    for alloc in &all {
        let Some(size) = alloc.literal_size() else {
            continue;
        };
        let pattern = format!(r"\b{}\s*\[\s*(\d+)\s*\]", regex::escape(&alloc.name));
        let Ok(index_re) = Regex::new(&pattern) else {
            continue;
        };

        for (line, slice) in forward_region(input, alloc, &all) {
            for caps in index_re.captures_iter(slice) {
                let Ok(index) = caps[1].parse::<u64>() else {
                    continue;
                };
                if index >= size {
                    hits.push((
                        line,
                        vec![
                            ("index", index.to_string()),
                            ("array", alloc.name.clone()),
                            ("size", size.to_string()),
                        ],
                    ));
                }
            }
        }
    }
    hits
}

/// `a == b` where both sides were declared as `String`.
pub(super) fn string_variable_identity(input: &ScanInput<'_>) -> Vec<(usize, Bindings)> {
    let strings: HashSet<String> = input
        .code_lines()
        .flat_map(|(_, code)| STRING_DECL.captures_iter(code))
        .map(|caps| caps["name"].to_string())
        .collect();
    if strings.len() < 2 {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for (line, code) in input.code_lines() {
        for caps in IDENTITY_COMPARE.captures_iter(code) {
            let (left, right) = (&caps["left"], &caps["right"]);
            if left != right && strings.contains(left) && strings.contains(right) {
                hits.push((
                    line,
                    vec![
                        ("left", left.to_string()),
                        ("op", caps["op"].to_string()),
                        ("right", right.to_string()),
                    ],
                ));
            }
        }
    }
    hits
}

/// `x = null;` followed by `x.member` before any null check or reassignment.
pub(super) fn null_then_dereference(input: &ScanInput<'_>) -> Vec<(usize, Bindings)> {
    let mut hits = Vec::new();

    for (assigned, code) in input.code_lines() {
        for caps in NULL_ASSIGN.captures_iter(code) {
            let name = &caps["name"];
            let escaped = regex::escape(name);
            let (Ok(deref), Ok(guard), Ok(reassign)) = (
                Regex::new(&format!(r"\b{escaped}\s*\.\s*[A-Za-z_]")),
                Regex::new(&format!(
                    r"\b{escaped}\s*[!=]=\s*null\b|\bnull\s*[!=]=\s*{escaped}\b"
                )),
                Regex::new(&format!(r"\b{escaped}\s*=[^=]")),
            ) else {
                continue;
            };

            for line in assigned + 1..=input.len() {
                let later = input.code(line);
                if guard.is_match(later) {
                    break;
                }
                if deref.is_match(later) {
                    hits.push((
                        line,
                        vec![
                            ("name", name.to_string()),
                            ("assigned", assigned.to_string()),
                        ],
                    ));
                    break;
                }
                if reassign.is_match(later) {
                    break;
                }
            }
        }
    }
    hits
}

/// `while (true)` / `for (;;)` with no exit anywhere after the header.
pub(super) fn unbounded_loop(input: &ScanInput<'_>) -> Vec<(usize, Bindings)> {
    let mut hits = Vec::new();

    for (line, code) in input.code_lines() {
        let Some(caps) = INFINITE_HEADER.captures(code) else {
            continue;
        };
        let Some(header) = caps.name("header") else {
            continue;
        };

        let exits = match loop_body(input, line, header.end()) {
            Some(body) => LOOP_EXIT.is_match(&body),
            // Unbalanced braces: anything after the header may belong to the loop.
            None => {
                LOOP_EXIT.is_match(&code[header.end()..])
                    || (line + 1..=input.len()).any(|n| LOOP_EXIT.is_match(input.code(n)))
            }
        };
        if !exits {
            let header = header.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            hits.push((line, vec![("header", header)]));
        }
    }
    hits
}

/// Masked text of the statement a loop header on `line` controls: the
/// braced block, or the single statement after the header.
fn loop_body(input: &ScanInput<'_>, line: usize, after_header: usize) -> Option<String> {
    let code: Vec<&str> = input.code_lines().map(|(_, c)| c).collect();
    let rest = input.code(line).get(after_header..)?;
    if !rest.trim().is_empty() {
        if rest.trim_start().starts_with('{') {
            return block_from(&code, line, after_header);
        }
        return Some(rest.to_string());
    }

    let next = (line + 1..=input.len()).find(|&n| !input.code(n).trim().is_empty())?;
    let statement = input.code(next);
    if statement.trim_start().starts_with('{') {
        block_from(&code, next, 0)
    } else {
        Some(statement.to_string())
    }
}

/// A method whose body calls itself and contains no conditional at all.
pub(super) fn recursion_without_base_case(input: &ScanInput<'_>) -> Vec<(usize, Bindings)> {
    let code: Vec<&str> = input.code_lines().map(|(_, c)| c).collect();
    let mut hits = Vec::new();

    for (line, text) in input.code_lines() {
        let Some(caps) = METHOD_HEADER.captures(text) else {
            continue;
        };
        let name = &caps["name"];
        if NOT_METHODS.contains(&name) {
            continue;
        }
        let Some(whole) = caps.get(0) else { continue };
        let Some(body) = block_from(&code, line, whole.start()) else {
            continue;
        };

        let Ok(self_call) = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))) else {
            continue;
        };
        if self_call.is_match(&body) && !CONDITIONAL.is_match(&body) {
            hits.push((line, vec![("name", name.to_string())]));
        }
    }
    hits
}
