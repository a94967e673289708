//! Diagnostic merge.
//!
//! Combines scanner findings with what the execution tier reported. When the
//! tier gave a definitive error but no structured diagnostics, line-addressed
//! diagnostics are recovered from the raw compiler or runtime output.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostic::{Diagnostic, ErrorCategory};
use crate::execution::CompilationResult;

/// `Main.java:12: error: ';' expected` and gcc's `main.c:5:10: error: ...`.
static COMPILER_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[^\s:]*:(\d+):(?:\d+:)?\s*(?:fatal\s+)?error:\s*(.*?)\s*$").unwrap()
});

/// `Exception in thread "main" java.lang.ArithmeticException: / by zero`
static EXCEPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Exception in thread "[^"]*" (?:[\w$]+\.)*([\w$]+)(?::\s*(.*))?"#).unwrap()
});

/// `at Main.main(Main.java:12)`
static STACK_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\w+\.java:(\d+)\)").unwrap());

static OVERFLOW_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(integer number too large|overflow)").unwrap());

static ZERO_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)division by zero").unwrap());

/// Category for a Java exception or error class name.
pub fn classify_exception(name: &str) -> ErrorCategory {
    match name {
        "ArithmeticException" => ErrorCategory::DivisionByZero,
        "NullPointerException" => ErrorCategory::NullDereference,
        "ArrayIndexOutOfBoundsException"
        | "StringIndexOutOfBoundsException"
        | "IndexOutOfBoundsException"
        | "NegativeArraySizeException" => ErrorCategory::OutOfBounds,
        "StackOverflowError" => ErrorCategory::UnboundedRecursion,
        _ => ErrorCategory::OtherLogical,
    }
}

fn classify_compiler_message(message: &str) -> ErrorCategory {
    if OVERFLOW_MESSAGE.is_match(message) {
        ErrorCategory::IntegerOverflow
    } else if ZERO_MESSAGE.is_match(message) {
        ErrorCategory::DivisionByZero
    } else {
        ErrorCategory::OtherLogical
    }
}

/// Recover line-addressed error diagnostics from raw output text.
pub fn extract_line_diagnostics(output: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut seen = HashSet::new();

    for caps in COMPILER_ERROR.captures_iter(output) {
        let Ok(line) = caps[1].parse::<usize>() else {
            continue;
        };
        let message = caps[2].to_string();
        if seen.insert((line, message.clone())) {
            let category = classify_compiler_message(&message);
            diagnostics.push(Diagnostic::error(line, message, category));
        }
    }

    if let Some(caps) = EXCEPTION.captures(output) {
        let name = caps[1].to_string();
        let detail = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        // The first frame is where the exception was thrown.
        let line = STACK_FRAME
            .captures(output)
            .and_then(|c| c[1].parse::<usize>().ok())
            .unwrap_or(0);
        let message = if detail.is_empty() {
            name.clone()
        } else {
            format!("{name}: {detail}")
        };
        if seen.insert((line, message.clone())) {
            diagnostics.push(Diagnostic::error(line, message, classify_exception(&name)));
        }
    }

    diagnostics
}

/// Merge scanner output with the tier's diagnostics.
///
/// `None` for foreign-language results: no diagnostics apply to them.
pub fn merge(result: &CompilationResult, scanned: Vec<Diagnostic>) -> Option<Vec<Diagnostic>> {
    if result.is_foreign_language() {
        return None;
    }
    let mut merged = scanned;
    if !result.diagnostics().is_empty() {
        merged.extend(result.diagnostics().iter().cloned());
    } else if result.is_error() {
        merged.extend(extract_line_diagnostics(result.output_text()));
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::execution::Language;

    #[test]
    fn test_javac_output() {
        let out = "Main.java:3: error: ';' expected\n        int x = 5\n                 ^\nMain.java:7: error: integer number too large\n2 errors";
        let diags = extract_line_diagnostics(out);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].line, 3);
        assert_eq!(diags[0].message, "';' expected");
        assert_eq!(diags[1].category, ErrorCategory::IntegerOverflow);
    }

    #[test]
    fn test_gcc_output() {
        let out = "main.c: In function 'main':\nmain.c:5:14: error: expected ';' before 'return'";
        let diags = extract_line_diagnostics(out);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 5);
    }

    #[test]
    fn test_runtime_exception_with_frame() {
        let out = "Exception in thread \"main\" java.lang.ArithmeticException: / by zero\n\tat Main.divide(Main.java:9)\n\tat Main.main(Main.java:4)";
        let diags = extract_line_diagnostics(out);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 9);
        assert_eq!(diags[0].category, ErrorCategory::DivisionByZero);
        assert_eq!(diags[0].message, "ArithmeticException: / by zero");
    }

    #[test]
    fn test_exception_classification() {
        assert_eq!(
            classify_exception("ArrayIndexOutOfBoundsException"),
            ErrorCategory::OutOfBounds
        );
        assert_eq!(classify_exception("StackOverflowError"), ErrorCategory::UnboundedRecursion);
        assert_eq!(classify_exception("InputMismatchException"), ErrorCategory::OtherLogical);
    }

    #[test]
    fn test_merge_concatenates_without_dedup() {
        let scanned = vec![Diagnostic::error(2, "x / 0", ErrorCategory::DivisionByZero)];
        let tier = vec![Diagnostic::error(2, "x / 0", ErrorCategory::DivisionByZero)];
        let result = CompilationResult::error("boom", 1).with_diagnostics(tier);
        let merged = merge(&result, scanned).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_extracts_only_for_definitive_errors() {
        let text = "Main.java:3: error: ';' expected";
        let err = merge(&CompilationResult::error(text, 1), vec![]).unwrap();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].severity, Severity::Error);

        let ok = merge(&CompilationResult::success(text), vec![]).unwrap();
        assert!(ok.is_empty());
    }

    #[test]
    fn test_foreign_language_blocks_merge() {
        let result = CompilationResult::foreign_language("Python", Language::Java);
        let scanned = vec![Diagnostic::warning(1, "w", ErrorCategory::OtherLogical)];
        assert!(merge(&result, scanned).is_none());
    }
}
