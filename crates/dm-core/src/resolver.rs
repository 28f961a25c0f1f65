use crate::index::{IndexedNode, TreeIndex};
use crate::path::PathSegment;
use crate::types::NodeType;

pub const SOURCE_DATA_ROOT: &str = "sourceData";

const SCRIPT_KEYWORDS: &[&str] = &[
    "true", "false", "let", "const", "if", "else", "switch", "do", "while", "until", "loop",
    "for", "in", "continue", "break", "return", "throw", "try", "catch", "import", "export",
    "as", "global", "private", "fn", "Fn", "call", "curry", "this", "type", "type_of", "print", "debug",
    "eval", "is", "is_def_fn", "is_def_var", "is_shared", "var", "static", "shared", "goto",
    "exit", "match", "case", "public", "protected", "new", "use", "with", "module", "package",
    "super", "spawn", "thread", "go", "sync", "async", "await", "yield", "default", "void",
    "null", "nil",
];

/// Names the generated script binds itself.
const RESERVED_NAMES: &[&str] = &[SOURCE_DATA_ROOT, "output", "input"];

/// An active loop during emission: its iterator is bound to one element of
/// the source array found at `item_prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopBinding {
    pub loop_id: String,
    pub iterator: String,
    pub item_prefix: Vec<PathSegment>,
}

impl LoopBinding {
    pub fn new(loop_id: impl Into<String>, iterator: impl Into<String>, source: &IndexedNode) -> Self {
        let mut item_prefix = source.segments.clone();
        if source.node_type != NodeType::ArrayChild {
            item_prefix.push(PathSegment::Items);
        }
        Self {
            loop_id: loop_id.into(),
            iterator: iterator.into(),
            item_prefix,
        }
    }

    /// Path of the iterated array itself.
    pub fn array_segments(&self) -> &[PathSegment] {
        match self.item_prefix.split_last() {
            Some((PathSegment::Items, rest)) => rest,
            _ => &self.item_prefix,
        }
    }

    pub fn covers(&self, segments: &[PathSegment]) -> bool {
        segments.starts_with(&self.item_prefix)
    }
}

pub fn full_path(node_id: &str, index: &TreeIndex) -> Option<String> {
    index.full_path(node_id)
}

pub fn access_expression(
    node_id: &str,
    index: &TreeIndex,
    bindings: &[LoopBinding],
    preferred_loop: Option<&str>,
) -> Option<String> {
    let node = index.get(node_id)?;
    Some(access_expression_for_segments(
        &node.segments,
        bindings,
        preferred_loop,
    ))
}

pub fn access_expression_for_segments(
    segments: &[PathSegment],
    bindings: &[LoopBinding],
    preferred_loop: Option<&str>,
) -> String {
    let preferred = preferred_loop.and_then(|loop_id| {
        bindings
            .iter()
            .rev()
            .find(|binding| binding.loop_id == loop_id && binding.covers(segments))
    });
    let binding = preferred.or_else(|| bindings.iter().rev().find(|binding| binding.covers(segments)));

    match binding {
        Some(binding) => render_access(&binding.iterator, &segments[binding.item_prefix.len()..]),
        None => render_access(SOURCE_DATA_ROOT, segments),
    }
}

pub fn render_access(root: &str, segments: &[PathSegment]) -> String {
    let mut out = root.to_string();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => out.push_str(&render_key_access(key)),
            PathSegment::Items => out.push_str("[0]"),
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

fn render_key_access(key: &str) -> String {
    if is_plain_identifier(key) {
        format!(".{}", key)
    } else {
        format!("[{}]", quote_string(key))
    }
}

pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && name.chars().any(|ch| ch.is_ascii_alphabetic())
        && !SCRIPT_KEYWORDS.contains(&name)
}

pub fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Turns an arbitrary label into a name that can be declared with `let`.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if !out.chars().any(|ch| ch.is_ascii_alphabetic()) {
        out.insert(0, 'v');
    }
    if SCRIPT_KEYWORDS.contains(&out.as_str()) || RESERVED_NAMES.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_path;
    use crate::types::TreeNode;

    fn index() -> TreeIndex {
        let tree = TreeNode::new("root", "root", NodeType::Element).with_children(vec![
            TreeNode::new("orders", "orders", NodeType::Array).with_children(vec![
                TreeNode::new("order", "[0]", NodeType::ArrayChild).with_children(vec![
                    TreeNode::new("order-id", "id", NodeType::Element),
                    TreeNode::new("lines", "lines", NodeType::Array).with_children(vec![
                        TreeNode::new("line", "[0]", NodeType::ArrayChild).with_children(vec![
                            TreeNode::new("sku", "sku-code", NodeType::Element),
                        ]),
                    ]),
                ]),
            ]),
            TreeNode::new("type", "type", NodeType::Element),
        ]);
        TreeIndex::build(&tree).expect("index should build")
    }

    #[test]
    fn access_roots_at_source_data_without_loops() {
        let index = index();
        assert_eq!(
            access_expression("order-id", &index, &[], None).as_deref(),
            Some("sourceData.orders[0].id")
        );
        assert_eq!(
            access_expression("type", &index, &[], None).as_deref(),
            Some("sourceData[\"type\"]")
        );
        assert!(access_expression("missing", &index, &[], None).is_none());
    }

    #[test]
    fn access_roots_at_innermost_covering_iterator() {
        let index = index();
        let outer = LoopBinding::new("l1", "order", index.get("orders").expect("orders"));
        let inner = LoopBinding::new("l2", "line", index.get("line").expect("line"));
        assert_eq!(outer.array_segments(), parse_path("orders").as_slice());
        assert_eq!(inner.array_segments(), parse_path("orders[].lines").as_slice());

        let bindings = vec![outer, inner];
        assert_eq!(
            access_expression("sku", &index, &bindings, None).as_deref(),
            Some("line[\"sku-code\"]")
        );
        assert_eq!(
            access_expression("order-id", &index, &bindings, None).as_deref(),
            Some("order.id")
        );
        assert_eq!(
            access_expression_for_segments(inner_array(&bindings), &bindings[..1], None),
            "order.lines"
        );
    }

    fn inner_array(bindings: &[LoopBinding]) -> &[PathSegment] {
        bindings[1].array_segments()
    }

    #[test]
    fn preferred_loop_wins_when_it_covers_the_node() {
        let index = index();
        let first = LoopBinding::new("l1", "a", index.get("orders").expect("orders"));
        let second = LoopBinding::new("l2", "b", index.get("orders").expect("orders"));
        let bindings = vec![first, second];
        assert_eq!(
            access_expression("order-id", &index, &bindings, Some("l1")).as_deref(),
            Some("a.id")
        );
        assert_eq!(
            access_expression("order-id", &index, &bindings, None).as_deref(),
            Some("b.id")
        );
        assert_eq!(
            access_expression("order-id", &index, &bindings, Some("unknown")).as_deref(),
            Some("b.id")
        );
    }

    #[test]
    fn identifier_helpers_cover_keywords_and_symbols() {
        assert!(is_plain_identifier("productId"));
        assert!(is_plain_identifier("_name"));
        assert!(!is_plain_identifier("_"));
        assert!(!is_plain_identifier("for"));
        assert!(!is_plain_identifier("@id"));
        assert!(!is_plain_identifier("1st"));
        assert_eq!(sanitize_identifier("first name"), "first_name");
        assert_eq!(sanitize_identifier("1st"), "_1st");
        assert_eq!(sanitize_identifier("__"), "v__");
        assert_eq!(sanitize_identifier("let"), "let_");
        assert_eq!(sanitize_identifier("output"), "output_");
        assert_eq!(sanitize_identifier("sourceData"), "sourceData_");
        assert_eq!(sanitize_identifier(" input "), "input_");
        assert_eq!(sanitize_identifier("outputs"), "outputs");
        assert_eq!(quote_string("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(render_access("x", &parse_path("a[2].#text")), "x.a[2][\"#text\"]");
    }
}
