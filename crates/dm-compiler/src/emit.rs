use crate::ast::Stmt;

const INDENT: &str = "    ";

pub fn emit_program(statements: &[Stmt]) -> String {
    let mut out = String::new();
    emit_block(statements, 0, &mut out);
    out
}

fn emit_block(statements: &[Stmt], depth: usize, out: &mut String) {
    for statement in statements {
        emit_statement(statement, depth, out);
    }
}

fn emit_statement(statement: &Stmt, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    match statement {
        Stmt::Comment(text) => {
            for line in text.lines() {
                push_line(out, &indent, &format!("// {}", line.trim_end()));
            }
        }
        Stmt::Raw(code) => emit_raw(code, &indent, out),
        Stmt::Let { name, value } => push_line(out, &indent, &format!("let {} = {};", name, value)),
        Stmt::Assign {
            place,
            value,
            comment,
        } => {
            let mut line = format!("{} = {};", place.render(), value);
            if let Some(comment) = comment {
                // A trailing comment must stay on the statement's line.
                let flat = comment
                    .split(['\n', '\r'])
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                line.push_str(" // ");
                line.push_str(&flat);
            }
            push_line(out, &indent, &line);
        }
        Stmt::EnsureMap(place) => {
            let target = place.render();
            push_line(
                out,
                &indent,
                &format!("if type_of({0}) != \"map\" {{ {0} = #{{}}; }}", target),
            );
        }
        Stmt::EnsureArray(place) => {
            let target = place.render();
            push_line(
                out,
                &indent,
                &format!("if type_of({0}) != \"array\" {{ {0} = []; }}", target),
            );
        }
        Stmt::If { condition, body } => {
            push_line(out, &indent, &format!("if {} {{", condition));
            emit_block(body, depth + 1, out);
            push_line(out, &indent, "}");
        }
        Stmt::ForEach {
            iterator,
            iterable,
            body,
        } => {
            push_line(out, &indent, &format!("for {} in {} {{", iterator, iterable));
            emit_block(body, depth + 1, out);
            push_line(out, &indent, "}");
        }
        Stmt::NewItem(name) => push_line(out, &indent, &format!("let {} = #{{}};", name)),
        Stmt::ConditionalPush { array, item } => push_line(
            out,
            &indent,
            &format!("if {0}.len() > 0 {{ {1}.push({0}); }}", item, array.render()),
        ),
        Stmt::Push { array, value } => {
            push_line(out, &indent, &format!("{}.push({});", array.render(), value))
        }
        Stmt::Return(value) => push_line(out, &indent, &format!("return {};", value)),
    }
}

fn push_line(out: &mut String, indent: &str, line: &str) {
    out.push_str(indent);
    out.push_str(line);
    out.push('\n');
}

/// Re-indents a user fragment and terminates a trailing bare expression.
fn emit_raw(code: &str, indent: &str, out: &mut String) {
    let lines = code
        .trim_matches('\n')
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>();
    let margin = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let last_code_line = lines.iter().rposition(|line| !line.trim().is_empty());
    for (position, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            out.push('\n');
            continue;
        }
        let text = &line[margin.min(line.len())..];
        if Some(position) == last_code_line && needs_terminator(text) {
            push_line(out, indent, &format!("{};", text));
        } else {
            push_line(out, indent, text);
        }
    }
}

fn needs_terminator(line: &str) -> bool {
    let trimmed = line.trim();
    !(trimmed.ends_with(';')
        || trimmed.ends_with('}')
        || trimmed.ends_with('{')
        || trimmed.starts_with("//")
        || trimmed.ends_with("*/"))
}
