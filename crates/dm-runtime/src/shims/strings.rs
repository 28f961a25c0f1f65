use rhai::{Dynamic, Engine, ImmutableString, FLOAT, INT};

use super::numeric::float_from_dynamic;
use crate::bridge::dynamic_to_text;

const DEFAULT_PRECISION: usize = 6;

fn as_float(value: Option<&Dynamic>) -> FLOAT {
    value.and_then(float_from_dynamic).unwrap_or(0.0)
}

fn as_integer(value: Option<&Dynamic>) -> INT {
    match value {
        Some(value) if value.is::<INT>() => value.clone().cast::<INT>(),
        other => as_float(other).trunc() as INT,
    }
}

/// printf-style formatting: `%s`, `%d`, `%f`, `%.Nf`, `%%` and `%n`.
/// Unknown directives are copied through.
pub fn format_printf(format: &str, args: &[Dynamic]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();
    while let Some(current) = chars.next() {
        if current != '%' {
            out.push(current);
            continue;
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            let mut lookahead = chars.clone();
            lookahead.next();
            let digits = lookahead
                .clone()
                .take_while(char::is_ascii_digit)
                .collect::<String>();
            let after = lookahead.clone().nth(digits.len());
            if !digits.is_empty() && after == Some('f') {
                precision = digits.parse::<usize>().ok();
                chars = lookahead;
                for _ in 0..digits.len() {
                    chars.next();
                }
            }
        }
        match chars.next() {
            Some('f') => {
                let precision = precision.unwrap_or(DEFAULT_PRECISION);
                out.push_str(&format!("{:.*}", precision, as_float(args.next())));
            }
            Some('s') => {
                if let Some(value) = args.next() {
                    out.push_str(&dynamic_to_text(value));
                }
            }
            Some('d') => out.push_str(&as_integer(args.next()).to_string()),
            Some('%') => out.push('%'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_fn("sprintf", |format: ImmutableString| format_printf(&format, &[]))
        .register_fn("sprintf", |format: ImmutableString, a: Dynamic| {
            format_printf(&format, &[a])
        })
        .register_fn("sprintf", |format: ImmutableString, a: Dynamic, b: Dynamic| {
            format_printf(&format, &[a, b])
        })
        .register_fn(
            "sprintf",
            |format: ImmutableString, a: Dynamic, b: Dynamic, c: Dynamic| {
                format_printf(&format, &[a, b, c])
            },
        )
        .register_fn(
            "sprintf",
            |format: ImmutableString, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
                format_printf(&format, &[a, b, c, d])
            },
        )
        .register_fn(
            "sprintf",
            |format: ImmutableString, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic, e: Dynamic| {
                format_printf(&format, &[a, b, c, d, e])
            },
        )
        .register_fn(
            "sprintf",
            |format: ImmutableString,
             a: Dynamic,
             b: Dynamic,
             c: Dynamic,
             d: Dynamic,
             e: Dynamic,
             f: Dynamic| { format_printf(&format, &[a, b, c, d, e, f]) },
        );
}
