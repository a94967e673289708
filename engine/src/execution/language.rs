//! Cheap foreign-language pre-check.
//!
//! Scores characteristic tokens of a handful of languages. A foreign
//! language is only reported when it scores at least [`MIN_SCORE`] and
//! strictly more than the target's own markers; anything less is left for
//! the model to decide.

use std::sync::LazyLock;

use regex::Regex;

use super::Language;

const MIN_SCORE: usize = 2;

struct Signals {
    name: &'static str,
    patterns: Vec<Regex>,
}

fn compile(name: &'static str, patterns: &[&str]) -> Signals {
    Signals {
        name,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(p).expect("valid language signal"))
            .collect(),
    }
}

static JAVA: LazyLock<Signals> = LazyLock::new(|| {
    compile(
        "Java",
        &[
            r"\bSystem\.out\.print",
            r"\bpublic\s+static\s+void\s+main\s*\(\s*String",
            r"\bpublic\s+class\s+\w+",
            r"\bimport\s+java\.",
            r"\bString\[\]\s+\w+",
        ],
    )
});

static C: LazyLock<Signals> = LazyLock::new(|| {
    compile(
        "C",
        &[
            r"#include\s*<(stdio|stdlib|string|math)\.h>",
            r"\bprintf\s*\(",
            r"\bint\s+main\s*\(",
            r"\bscanf\s*\(",
            r"\bmalloc\s*\(",
        ],
    )
});

static FOREIGN: LazyLock<Vec<Signals>> = LazyLock::new(|| {
    vec![
        compile(
            "Python",
            &[
                r"(?m)^\s*def\s+\w+\s*\(.*\)\s*:\s*$",
                r"(?m)^\s*print\s*\(",
                r"(?m)^\s*(el)?if\s+[^(].*:\s*$",
                r"(?m)^\s*for\s+\w+\s+in\s+.*:\s*$",
                r"(?m)^\s*import\s+\w+\s*$",
                r"(?m)^\s*from\s+\w+\s+import\s+",
                r"\bself\.",
            ],
        ),
        compile(
            "JavaScript",
            &[
                r"\bconsole\.log\s*\(",
                r"\bfunction\s+\w+\s*\(",
                r"(?m)^\s*(let|const|var)\s+\w+\s*=",
                r"=>",
                r"===|!==",
                r"\bdocument\.",
            ],
        ),
        compile(
            "C++",
            &[
                r"#include\s*<iostream>",
                r"\bstd::",
                r"\bcout\s*<<",
                r"\bcin\s*>>",
                r"\busing\s+namespace\s+std\b",
            ],
        ),
        compile(
            "C#",
            &[
                r"\bConsole\.Write(Line)?\s*\(",
                r"\busing\s+System\s*;",
                r"\bnamespace\s+\w+",
                r"\bstatic\s+void\s+Main\s*\(",
            ],
        ),
        compile(
            "Java",
            &[
                r"\bSystem\.out\.print",
                r"\bpublic\s+static\s+void\s+main\s*\(\s*String",
                r"\bimport\s+java\.",
            ],
        ),
        compile(
            "C",
            &[
                r"#include\s*<(stdio|stdlib|string)\.h>",
                r"\bprintf\s*\(",
                r"\bscanf\s*\(",
            ],
        ),
    ]
});

fn score(signals: &Signals, source: &str) -> usize {
    signals.patterns.iter().filter(|p| p.is_match(source)).count()
}

fn own_signals(target: Language) -> &'static Signals {
    match target {
        Language::Java => &JAVA,
        Language::C => &C,
    }
}

/// Name of the foreign language `source` is clearly written in, if any.
pub fn detect_foreign(source: &str, target: Language) -> Option<&'static str> {
    let own = score(own_signals(target), source);
    FOREIGN
        .iter()
        .filter(|s| !target.matches_name(s.name))
        .map(|s| (s.name, score(s, source)))
        .filter(|(_, n)| *n >= MIN_SCORE && *n > own)
        .max_by_key(|(_, n)| *n)
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_detected() {
        let src = "def add(a, b):\n    return a + b\n\nprint(add(1, 2))";
        assert_eq!(detect_foreign(src, Language::Java), Some("Python"));
    }

    #[test]
    fn test_javascript_detected() {
        let src = "const x = 5;\nconsole.log(x === 5);";
        assert_eq!(detect_foreign(src, Language::Java), Some("JavaScript"));
    }

    #[test]
    fn test_java_is_not_foreign() {
        let src = "public class Main {\n  public static void main(String[] args) {\n    System.out.println(1);\n  }\n}";
        assert_eq!(detect_foreign(src, Language::Java), None);
    }

    #[test]
    fn test_fragment_is_left_to_model() {
        assert_eq!(detect_foreign("int x = 5;\nx++;", Language::Java), None);
        assert_eq!(detect_foreign("", Language::Java), None);
    }

    #[test]
    fn test_java_is_foreign_for_c_target() {
        let src = "public class Main {\n  public static void main(String[] args) {\n    System.out.println(1);\n  }\n}";
        assert_eq!(detect_foreign(src, Language::C), Some("Java"));
    }

    #[test]
    fn test_cpp_detected() {
        let src = "#include <iostream>\nusing namespace std;\nint main() { cout << 1; }";
        assert_eq!(detect_foreign(src, Language::Java), Some("C++"));
    }

    #[test]
    fn test_cpp_outscores_shared_c_markers() {
        let src = "#include <iostream>\nusing namespace std;\nint main() {\n  std::cout << 1;\n  return 0;\n}";
        assert_eq!(detect_foreign(src, Language::C), Some("C++"));

        let c = "#include <stdio.h>\nint main() {\n  printf(\"%d\\n\", 1);\n  return 0;\n}";
        assert_eq!(detect_foreign(c, Language::C), None);
    }

    #[test]
    fn test_foreign_must_outscore_target() {
        let src = "import java.util.List;\nconst x = 1;\nconsole.log(x);";
        assert_eq!(detect_foreign(src, Language::Java), Some("JavaScript"));
        let src = "import java.util.List;\npublic class Main {\nconst x = 1;\nconsole.log(x);";
        assert_eq!(detect_foreign(src, Language::Java), None);
    }
}
