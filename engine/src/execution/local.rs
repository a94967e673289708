//! Local heuristic simulation tier.
//!
//! A deliberately tiny interpreter for straight-line `main` code: primitive
//! and `String` declarations, literal assignment, increments and compound
//! assignment, and printing. Anything it does not understand is skipped,
//! including the bodies of control-flow blocks and of methods other than
//! `main`. It never fails and every result it produces is `degraded`.

use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CompilationResult, ExecutionTier, RunRequest, TierError};

/// Output used when the simulated program printed nothing.
pub const NO_OUTPUT_MESSAGE: &str = "Program executed (local simulation, no output captured).";

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:final\s+)?(int|long|short|byte|double|float|String|boolean)\s+([A-Za-z_]\w*)\s*(?:=\s*(.+))?$")
        .expect("valid regex")
});

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*=\s*([^=].*)$").expect("valid regex"));

static COMPOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*([+\-*/%])=\s*(.+)$").expect("valid regex"));

static STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([A-Za-z_]\w*)\s*(\+\+|--)|(\+\+|--)\s*([A-Za-z_]\w*))$").expect("valid regex")
});

static JAVA_PRINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^System\.out\.(println|print)\s*\((.*)\)$").expect("valid regex")
});

static C_PRINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(printf|puts)\s*\(\s*"((?:[^"\\]|\\.)*)"\s*\)$"#).expect("valid regex")
});

static MAIN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmain\s*\(").expect("valid regex"));

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "try", "catch", "finally",
];

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    fn render(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Long(n) => n.to_string(),
            Self::Double(d) => {
                if d.is_finite() && d.fract() == 0.0 && d.abs() < 1e7 {
                    format!("{d:.1}")
                } else {
                    d.to_string()
                }
            }
            Self::Str(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Long(n) => Some(*n as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(i64::from(*n)),
            Self::Long(n) => Some(*n),
            _ => None,
        }
    }
}

fn coerce(ty: &str, value: Value) -> Option<Value> {
    match (ty, value) {
        ("int", v @ Value::Int(_)) => Some(v),
        ("short", Value::Int(n)) => Some(Value::Int(i32::from(n as i16))),
        ("byte", Value::Int(n)) => Some(Value::Int(i32::from(n as i8))),
        ("long", v) => v.as_i64().map(Value::Long),
        ("double" | "float", v) => v.as_f64().map(Value::Double),
        ("String", v @ Value::Str(_)) => Some(v),
        ("boolean", v @ Value::Bool(_)) => Some(v),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '"' => {
                let mut j = i + 1;
                let mut body = String::new();
                while j < chars.len() && chars[j] != '"' {
                    if chars[j] == '\\' && j + 1 < chars.len() {
                        body.push(chars[j]);
                        j += 1;
                    }
                    body.push(chars[j]);
                    j += 1;
                }
                if j >= chars.len() {
                    return None;
                }
                tokens.push(Token::Str(unescape(&body)));
                i = j + 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                // Literal suffixes: 10L, 2.5d, 1f
                let suffix = chars
                    .get(i)
                    .copied()
                    .filter(|c| matches!(c, 'L' | 'l' | 'd' | 'D' | 'f' | 'F'));
                if suffix.is_some() {
                    i += 1;
                }
                match suffix {
                    Some('L' | 'l') => tokens.push(Token::Long(text.parse().ok()?)),
                    Some(_) => tokens.push(Token::Double(text.parse().ok()?)),
                    None if text.contains('.') => tokens.push(Token::Double(text.parse().ok()?)),
                    // An int literal past i32::MAX does not compile.
                    None => tokens.push(Token::Int(text.parse().ok()?)),
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return None,
        }
    }
    Some(tokens)
}

/// Recursive-descent evaluator with Java precedence; `+` and `-` (and `*`,
/// `/`, `%`) associate left to right, which gives Java's string
/// concatenation order for free.
struct Evaluator<'a> {
    tokens: Vec<Token>,
    pos: usize,
    state: &'a mut State,
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> Option<Value> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn term(&mut self) -> Option<Value> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<Value> {
        if self.peek() == Some(&Token::Op('-')) {
            self.pos += 1;
            return match self.unary()? {
                Value::Int(n) => Some(Value::Int(n.wrapping_neg())),
                Value::Long(n) => Some(Value::Long(n.wrapping_neg())),
                Value::Double(d) => Some(Value::Double(-d)),
                _ => None,
            };
        }
        self.primary()
    }

    fn primary(&mut self) -> Option<Value> {
        match self.next()? {
            Token::Str(s) => Some(Value::Str(s)),
            Token::Int(n) => Some(Value::Int(n)),
            Token::Long(n) => Some(Value::Long(n)),
            Token::Double(d) => Some(Value::Double(d)),
            Token::Open => {
                let inner = self.expr()?;
                (self.next()? == Token::Close).then_some(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ if self.peek() == Some(&Token::Open) => {
                    self.pos += 1;
                    (self.next()? == Token::Close).then_some(())?;
                    self.state.read_input(&name)
                }
                _ => self.state.vars.get(&name).map(|(_, v)| v.clone()),
            },
            _ => None,
        }
    }
}

fn binary(op: char, lhs: Value, rhs: Value) -> Option<Value> {
    use Value::*;
    match (op, lhs, rhs) {
        ('+', Str(a), b) => Some(Str(a + &b.render())),
        ('+', a, Str(b)) => Some(Str(a.render() + &b)),
        // int op int stays 32-bit and wraps; division by zero throws.
        (_, Int(a), Int(b)) => match op {
            '+' => Some(Int(a.wrapping_add(b))),
            '-' => Some(Int(a.wrapping_sub(b))),
            '*' => Some(Int(a.wrapping_mul(b))),
            '/' if b != 0 => Some(Int(a.wrapping_div(b))),
            '%' if b != 0 => Some(Int(a.wrapping_rem(b))),
            _ => None,
        },
        (_, a @ (Int(_) | Long(_)), b @ (Int(_) | Long(_))) => {
            let (a, b) = (a.as_i64()?, b.as_i64()?);
            match op {
                '+' => Some(Long(a.wrapping_add(b))),
                '-' => Some(Long(a.wrapping_sub(b))),
                '*' => Some(Long(a.wrapping_mul(b))),
                '/' if b != 0 => Some(Long(a.wrapping_div(b))),
                '%' if b != 0 => Some(Long(a.wrapping_rem(b))),
                _ => None,
            }
        }
        (_, a, b) => {
            let (a, b) = (a.as_f64()?, b.as_f64()?);
            match op {
                '+' => Some(Double(a + b)),
                '-' => Some(Double(a - b)),
                '*' => Some(Double(a * b)),
                '/' => Some(Double(a / b)),
                '%' => Some(Double(a % b)),
                _ => None,
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    vars: HashMap<String, (String, Value)>,
    stdin: VecDeque<String>,
    output: String,
}

impl State {
    /// `Scanner` style reads; each call consumes one input line.
    fn read_input(&mut self, call: &str) -> Option<Value> {
        let method = call.rsplit('.').next()?;
        match method {
            "nextInt" => {
                let line = self.stdin.pop_front()?;
                line.trim().parse().ok().map(Value::Int)
            }
            "nextLong" => {
                let line = self.stdin.pop_front()?;
                line.trim().parse().ok().map(Value::Long)
            }
            "nextDouble" => {
                let line = self.stdin.pop_front()?;
                line.trim().parse().ok().map(Value::Double)
            }
            "nextLine" | "next" => self.stdin.pop_front().map(Value::Str),
            _ => None,
        }
    }

    fn eval(&mut self, expr: &str) -> Option<Value> {
        let tokens = tokenize(expr)?;
        let mut eval = Evaluator {
            tokens,
            pos: 0,
            state: self,
        };
        let value = eval.expr()?;
        (eval.pos == eval.tokens.len()).then_some(value)
    }

    fn assign(&mut self, name: &str, value: Value) -> Option<()> {
        let ty = self.vars.get(name)?.0.clone();
        let value = coerce(&ty, value)?;
        self.vars.insert(name.to_string(), (ty, value));
        Some(())
    }

    /// Execute one statement; `None` means it was not understood.
    fn execute(&mut self, stmt: &str) -> Option<()> {
        if let Some(caps) = JAVA_PRINT.captures(stmt) {
            let args = caps[2].trim();
            let text = if args.is_empty() {
                String::new()
            } else {
                self.eval(args)?.render()
            };
            self.output.push_str(&text);
            if &caps[1] == "println" {
                self.output.push('\n');
            }
            return Some(());
        }
        if let Some(caps) = C_PRINT.captures(stmt) {
            let text = unescape(&caps[2]);
            // A format string with conversions needs arguments we don't track.
            if &caps[1] == "printf" && text.contains('%') {
                return None;
            }
            self.output.push_str(&text);
            if &caps[1] == "puts" {
                self.output.push('\n');
            }
            return Some(());
        }
        if let Some(caps) = DECLARATION.captures(stmt) {
            let ty = caps[1].to_string();
            let value = match caps.get(3) {
                Some(init) => coerce(&ty, self.eval(init.as_str())?)?,
                None => default_value(&ty),
            };
            self.vars.insert(caps[2].to_string(), (ty, value));
            return Some(());
        }
        if let Some(caps) = STEP.captures(stmt) {
            let (name, op) = match caps.get(1) {
                Some(name) => (name.as_str(), &caps[2]),
                None => (&caps[4], &caps[3]),
            };
            let delta = if op == "++" { 1 } else { -1 };
            let current = self.vars.get(name)?.1.clone();
            let next = binary('+', current, Value::Int(delta))?;
            return self.assign(name, next);
        }
        if let Some(caps) = COMPOUND.captures(stmt) {
            let op = caps[2].chars().next()?;
            let current = self.vars.get(&caps[1])?.1.clone();
            let rhs = self.eval(&caps[3])?;
            let next = binary(op, current, rhs)?;
            return self.assign(&caps[1], next);
        }
        if let Some(caps) = ASSIGNMENT.captures(stmt) {
            let value = self.eval(&caps[2])?;
            return self.assign(&caps[1], value);
        }
        None
    }
}

fn default_value(ty: &str) -> Value {
    match ty {
        "double" | "float" => Value::Double(0.0),
        "String" => Value::Str(String::new()),
        "boolean" => Value::Bool(false),
        "long" => Value::Long(0),
        _ => Value::Int(0),
    }
}

#[derive(Debug, PartialEq)]
enum Piece {
    Statement(String),
    Open(String),
    Close,
}

/// Split source into statements and block delimiters, respecting string
/// literals, comments and parentheses (so `for` headers stay whole).
fn split(source: &str) -> Vec<Piece> {
    let chars: Vec<char> = source.chars().collect();
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                continue;
            }
            '"' | '\'' => {
                current.push(c);
                i += 1;
                while i < chars.len() && chars[i] != c && chars[i] != '\n' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        current.push(chars[i]);
                        i += 1;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() && chars[i] == c {
                    current.push(c);
                }
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ';' if depth == 0 => {
                pieces.push(Piece::Statement(std::mem::take(&mut current)));
            }
            '{' if depth == 0 => {
                pieces.push(Piece::Open(std::mem::take(&mut current)));
            }
            '}' if depth == 0 => {
                if !current.trim().is_empty() {
                    pieces.push(Piece::Statement(std::mem::take(&mut current)));
                }
                current.clear();
                pieces.push(Piece::Close);
            }
            '\n' | '\r' | '\t' => current.push(' '),
            _ => current.push(c),
        }
        i += 1;
    }
    if !current.trim().is_empty() {
        pieces.push(Piece::Statement(current));
    }
    pieces
}

/// Whether the block opened after `header` should be skipped.
fn skips_block(header: &str) -> bool {
    let header = header.trim();
    let first = header
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or("");
    if CONTROL_KEYWORDS.contains(&first) {
        return true;
    }
    header.contains('(') && !MAIN_HEADER.is_match(header)
}

/// Simulate `request` and return its captured output.
fn simulate(request: &RunRequest) -> (String, usize, usize) {
    let mut state = State {
        stdin: request.stdin.iter().cloned().collect(),
        ..State::default()
    };
    let mut skipping: Vec<bool> = Vec::new();
    let (mut executed, mut skipped) = (0, 0);

    for piece in split(&request.source) {
        let inside_skipped = skipping.last().copied().unwrap_or(false);
        match piece {
            Piece::Open(header) => skipping.push(inside_skipped || skips_block(&header)),
            Piece::Close => {
                skipping.pop();
            }
            Piece::Statement(stmt) => {
                let stmt = stmt.trim();
                if stmt.is_empty() {
                    continue;
                }
                if !inside_skipped && state.execute(stmt).is_some() {
                    executed += 1;
                } else {
                    skipped += 1;
                }
            }
        }
    }
    (state.output, executed, skipped)
}

/// Last tier: never fails, always `degraded`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSimulationTier;

impl LocalSimulationTier {
    pub fn new() -> Self {
        Self
    }

    /// Run the interpreter synchronously.
    pub fn simulate(&self, request: &RunRequest) -> CompilationResult {
        let (output, executed, skipped) = simulate(request);
        debug!(executed, skipped, "Local simulation finished");
        if output.is_empty() {
            CompilationResult::degraded(NO_OUTPUT_MESSAGE)
        } else {
            CompilationResult::degraded(output)
        }
    }
}

#[async_trait]
impl ExecutionTier for LocalSimulationTier {
    fn name(&self) -> &str {
        "local_simulation"
    }

    fn confidence(&self) -> f64 {
        0.3
    }

    async fn attempt(
        &self,
        request: &RunRequest,
        _cancel: &CancellationToken,
    ) -> Result<CompilationResult, TierError> {
        Ok(self.simulate(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Classification;

    fn run(src: &str) -> String {
        LocalSimulationTier::new()
            .simulate(&RunRequest::new(src))
            .output_text()
            .to_string()
    }

    #[test]
    fn test_concatenation_left_to_right() {
        let src = r#"int a = 1; int b = 2;
System.out.println("sum " + a + b);
System.out.println(a + b + " sum");"#;
        assert_eq!(run(src), "sum 12\n3 sum\n");
    }

    #[test]
    fn test_full_program_with_class_wrapper() {
        let src = r#"public class Main {
    public static void main(String[] args) {
        int x = 5;
        x++;
        x += 10;
        String name = "Ada";
        System.out.print("Hi " + name);
        System.out.println(", x=" + x);
    }
}"#;
        assert_eq!(run(src), "Hi Ada, x=16\n");
    }

    #[test]
    fn test_control_flow_and_helper_bodies_are_skipped() {
        let src = r#"static int twice(int n) {
    System.out.println("helper");
    return n * 2;
}
int i = 0;
for (int k = 0; k < 3; k++) {
    System.out.println("loop");
}
if (i == 0) { System.out.println("branch"); }
System.out.println("done " + i);"#;
        assert_eq!(run(src), "done 0\n");
    }

    #[test]
    fn test_arithmetic_types() {
        let src = "int a = 7; int b = 2; double d = 7;\nSystem.out.println(a / b);\nSystem.out.println(d / b);\nSystem.out.println(a % b * 3);";
        assert_eq!(run(src), "3\n3.5\n3\n");
    }

    #[test]
    fn test_int_wraps_like_java() {
        let src = "int big = 2147483647; big++; System.out.println(big);";
        assert_eq!(run(src), "-2147483648\n");
    }

    #[test]
    fn test_int_expressions_wrap_before_widening() {
        let src = "int a = 2147483647; System.out.println(a + 1);\nlong big = 2147483647 * 2; System.out.println(big);";
        assert_eq!(run(src), "-2147483648\n-2\n");
    }

    #[test]
    fn test_long_arithmetic_stays_64_bit() {
        let src = "long a = 2147483647L * 2; int b = 3; long c = a + b; System.out.println(c);\nSystem.out.println(2147483647L + 1);";
        assert_eq!(run(src), "4294967297\n2147483648\n");
    }

    #[test]
    fn test_narrowing_and_division_by_zero() {
        // long into int needs a cast, and int division by zero throws: both skipped.
        let src = "long l = 5; int i = l; int z = 0; System.out.println(1 / z);\nshort s = 7; s += 32767; System.out.println(s);";
        assert_eq!(run(src), "-32762\n");
    }

    #[test]
    fn test_stdin_reads() {
        let req = RunRequest::new(
            "Scanner sc = new Scanner(System.in);\nint n = sc.nextInt();\nString s = sc.nextLine();\nSystem.out.println(s + n * 2);",
        )
        .with_stdin(vec!["21".into(), "answer=".into()]);
        let result = LocalSimulationTier::new().simulate(&req);
        assert_eq!(result.output_text(), "answer=42\n");
    }

    #[test]
    fn test_c_printing() {
        let req = RunRequest::new(
            "#include <stdio.h>\nint main() {\n  printf(\"hi\\n\");\n  puts(\"there\");\n  printf(\"%d\", 3);\n  return 0;\n}",
        )
        .with_language(crate::execution::Language::C);
        let result = LocalSimulationTier::new().simulate(&req);
        assert_eq!(result.output_text(), "hi\nthere\n");
    }

    #[test]
    fn test_comments_and_strings_with_delimiters() {
        let src = "// System.out.println(\"no\");\n/* x; { */ System.out.println(\"a;b{c}\");";
        assert_eq!(run(src), "a;b{c}\n");
    }

    #[test]
    fn test_nothing_printed_and_garbage() {
        let tier = LocalSimulationTier::new();
        for src in ["int x = 1;", "", "}}}{{{ ;;; \"unterminated", "x = = 3;"] {
            let result = tier.simulate(&RunRequest::new(src));
            assert_eq!(result.classification(), Classification::Degraded);
        }
        assert_eq!(run("int x = 1;"), NO_OUTPUT_MESSAGE);
    }

    #[test]
    fn test_unknown_variable_skips_statement() {
        assert_eq!(run("System.out.println(y + 1);\nSystem.out.println(2);"), "2\n");
    }

    #[tokio::test]
    async fn test_tier_never_fails() {
        let tier = LocalSimulationTier::new();
        let result = tier
            .attempt(&RunRequest::new("while (true) {}"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.classification(), Classification::Degraded);
    }
}
