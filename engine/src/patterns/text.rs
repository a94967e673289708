//! Text helpers shared by the rules.

/// Blank out string/char literal contents and comments, line by line.
///
/// Quotes are kept so rules can still see that a literal was present. Block
/// comments may span lines. `//` comments are dropped. Every masked character
/// becomes as many spaces as it has UTF-8 bytes, so byte offsets found in the
/// masked line are valid in the original.
pub fn mask_lines(lines: &[String]) -> Vec<String> {
    let mut in_block = false;
    lines
        .iter()
        .map(|line| mask_line(line, &mut in_block))
        .collect()
}

fn mask_line(line: &str, in_block: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if *in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_block = false;
                out.push_str("  ");
            } else {
                blank(&mut out, c);
            }
            continue;
        }

        match c {
            '/' if chars.peek() == Some(&'/') => break,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                *in_block = true;
                out.push_str("  ");
            }
            '"' | '\'' => {
                out.push(c);
                let mut escaped = false;
                for inner in chars.by_ref() {
                    if escaped {
                        escaped = false;
                        blank(&mut out, inner);
                    } else if inner == '\\' {
                        escaped = true;
                        out.push(' ');
                    } else if inner == c {
                        out.push(c);
                        break;
                    } else {
                        blank(&mut out, inner);
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn blank(out: &mut String, c: char) {
    out.extend(std::iter::repeat(' ').take(c.len_utf8()));
}

/// If `code` contains `keyword (` ... `)` followed only by `;`, return the
/// byte offset of the keyword.
///
/// Parentheses are balanced, so `if (a(b)) foo();` does not count.
pub fn header_followed_by_semicolon(code: &str, keyword: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(rel) = code[search_from..].find(keyword) {
        let start = search_from + rel;
        search_from = start + keyword.len();

        let before_ok = code[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c));
        let rest = &code[search_from..];
        let trimmed = rest.trim_start();
        if !before_ok || !trimmed.starts_with('(') {
            continue;
        }

        let open = search_from + (rest.len() - trimmed.len());
        if let Some(close) = matching_paren(code, open) {
            if code[close + 1..].trim() == ";" {
                return Some(start);
            }
        }
    }
    None
}

/// Byte offset of the `)` matching the `(` at `open`.
pub fn matching_paren(code: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in code[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// The brace-delimited block starting at the first `{` at or after
/// `(line, column)` (1-indexed line, byte column). Returns the block's inner
/// text joined with newlines, or `None` when braces never balance.
pub fn block_from(code: &[&str], line: usize, column: usize) -> Option<String> {
    let mut depth = 0usize;
    let mut started = false;
    let mut body = String::new();

    for (idx, text) in code.iter().enumerate().skip(line.checked_sub(1)?) {
        let slice = if idx + 1 == line {
            text.get(column..).unwrap_or("")
        } else {
            *text
        };

        for c in slice.chars() {
            match c {
                '{' => {
                    if started {
                        body.push(c);
                    }
                    started = true;
                    depth += 1;
                }
                '}' if started => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(body);
                    }
                    body.push(c);
                }
                _ if started => body.push(c),
                _ => {}
            }
        }
        if started {
            body.push('\n');
        }
    }
    None
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
