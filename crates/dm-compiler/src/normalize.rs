use std::sync::OnceLock;

use regex::Regex;

/// Rewrites JavaScript surface forms users commonly type into the script
/// dialect. String literals and comments are left untouched except that
/// single-quoted strings become double-quoted.
pub fn normalize_fragment(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut code = String::new();
    let chars = source.chars().collect::<Vec<_>>();
    let mut index = 0usize;

    while index < chars.len() {
        let ch = chars[index];
        let next = chars.get(index + 1).copied();
        match (ch, next) {
            ('/', Some('/')) => {
                flush_code(&mut code, &mut out);
                let end = find_from(&chars, index, |c| c == '\n').unwrap_or(chars.len());
                out.extend(&chars[index..end]);
                index = end;
            }
            ('/', Some('*')) => {
                flush_code(&mut code, &mut out);
                let end = find_block_comment_end(&chars, index + 2);
                out.extend(&chars[index..end]);
                index = end;
            }
            ('"', _) | ('`', _) => {
                flush_code(&mut code, &mut out);
                let (end, _) = find_quoted_end(&chars, index, ch);
                out.extend(&chars[index..end]);
                index = end;
            }
            ('\'', _) => {
                flush_code(&mut code, &mut out);
                let (end, closed) = find_quoted_end(&chars, index, '\'');
                let body_end = if closed { end - 1 } else { end };
                out.push_str(&requote(&chars[index + 1..body_end]));
                index = end;
            }
            _ => {
                code.push(ch);
                index += 1;
            }
        }
    }
    flush_code(&mut code, &mut out);
    out
}

fn flush_code(code: &mut String, out: &mut String) {
    if code.is_empty() {
        return;
    }
    let rewritten = strict_equality_regex().replace_all(code, |captures: &regex::Captures| {
        if &captures[0] == "===" {
            "==".to_string()
        } else {
            "!=".to_string()
        }
    });
    let rewritten = nullish_regex().replace_all(&rewritten, "${lead}()");
    out.push_str(&rewritten);
    code.clear();
}

fn find_from(chars: &[char], start: usize, predicate: impl Fn(char) -> bool) -> Option<usize> {
    chars[start..]
        .iter()
        .position(|c| predicate(*c))
        .map(|offset| start + offset)
}

fn find_block_comment_end(chars: &[char], start: usize) -> usize {
    let mut index = start;
    while index + 1 < chars.len() {
        if chars[index] == '*' && chars[index + 1] == '/' {
            return index + 2;
        }
        index += 1;
    }
    chars.len()
}

/// Index just past the closing quote and whether the literal was closed.
fn find_quoted_end(chars: &[char], start: usize, quote: char) -> (usize, bool) {
    let mut index = start + 1;
    while index < chars.len() {
        match chars[index] {
            '\\' => index += 2,
            c if c == quote => return (index + 1, true),
            _ => index += 1,
        }
    }
    (chars.len(), false)
}

fn requote(body: &[char]) -> String {
    let mut out = String::with_capacity(body.len() + 2);
    out.push('"');
    let mut index = 0usize;
    while index < body.len() {
        match body[index] {
            '\\' if body.get(index + 1) == Some(&'\'') => {
                out.push('\'');
                index += 2;
            }
            '\\' => {
                out.push('\\');
                if let Some(next) = body.get(index + 1) {
                    out.push(*next);
                }
                index += 2;
            }
            '"' => {
                out.push_str("\\\"");
                index += 1;
            }
            other => {
                out.push(other);
                index += 1;
            }
        }
    }
    out.push('"');
    out
}

fn strict_equality_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"===|!==").expect("strict equality regex"))
}

fn nullish_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?P<lead>^|[^A-Za-z0-9_$.])(?:null|undefined)\b").expect("nullish regex")
    })
}
