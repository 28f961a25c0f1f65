/// Script definitions of the bindings that need no host support. Prepended
/// to a script they make it runnable on a bare engine; on a full engine they
/// shadow the native versions with the same results.
pub const PORTABLE_SHIMS: &str = r#"fn asArray(value) {
    switch type_of(value) {
        "()" => [],
        "array" => value,
        _ => [value]
    }
}

fn isEmpty(value) {
    switch type_of(value) {
        "()" => true,
        "string" => value.len() == 0,
        "array" => value.len() == 0,
        "map" => value.len() == 0,
        _ => false
    }
}

fn chunk(items, size) {
    if size <= 0 {
        return [items];
    }
    let chunks = [];
    let current = [];
    for item in items {
        current.push(item);
        if current.len() == size {
            chunks.push(current);
            current = [];
        }
    }
    if current.len() > 0 {
        chunks.push(current);
    }
    chunks
}

fn sum(items) {
    let total = 0;
    for item in items {
        total += switch type_of(item) {
            "i64" => item,
            "f64" => item,
            "BigDecimal" => item.toNumber(),
            "string" => {
                let parsed = 0.0;
                try { parsed = parse_float(item); } catch { }
                parsed
            },
            _ => 0.0
        };
    }
    total
}

fn sum(items, selector) {
    sum(items.map(selector))
}

fn findFirst(items, transform) {
    for item in items {
        let result = transform.call(item);
        let kind = type_of(result);
        if kind != "()" && !(kind == "bool" && !result) {
            return result;
        }
    }
}
"#;

#[cfg(test)]
mod tests {
    use rhai::{Dynamic, Engine, Scope};

    use super::PORTABLE_SHIMS;
    use crate::bridge::dynamic_to_text;
    use crate::shims::test_support::eval_text;

    fn eval_portable(expression: &str) -> String {
        let engine = Engine::new();
        let script = format!("{}\n{}", PORTABLE_SHIMS, expression);
        let value = engine
            .eval_with_scope::<Dynamic>(&mut Scope::new(), &script)
            .unwrap_or_else(|error| panic!("portable script failed: {}\n{}", error, expression));
        dynamic_to_text(&value)
    }

    #[test]
    fn portable_definitions_match_native_bindings() {
        let expressions = [
            "asArray(())",
            "asArray(5)",
            "asArray([1, 2])",
            r#"[isEmpty(()), isEmpty(""), isEmpty(#{}), isEmpty([0]), isEmpty(0)]"#,
            "chunk([1, 2, 3, 4, 5], 2)",
            "chunk([1, 2], 0)",
            "chunk([], 3)",
            "sum([1, 2, 3])",
            r#"sum([1, 2.5, "1.5"])"#,
            r#"sum([1, "x"])"#,
            "sum([#{price: 2}, #{price: 3}], |p| p.price)",
            r#"findFirst([#{id: 1, n: "a"}, #{id: 2, n: "b"}], |item| if item.id > 1 { item.n })"#,
            "findFirst([1, 2], |x| x > 5)",
        ];
        for expression in expressions {
            assert_eq!(
                eval_portable(expression),
                eval_text(expression),
                "{}",
                expression
            );
        }
    }
}
