use rhai::{
    Array, Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString, Map, NativeCallContext, INT,
};

use dm_parser::{ATTRIBUTE_PREFIX, TEXT_KEY};

use crate::bridge::{dynamic_to_text, is_truthy};

const DOCUMENT_NAME: &str = "#document";
const DESCENDANT_PREFIX: &str = "..";

/// Concatenated text content of a parsed XML value.
pub fn text_of(value: &Dynamic) -> String {
    if value.is_unit() {
        return String::new();
    }
    if let Some(map) = value.read_lock::<Map>() {
        let mut out = map.get(TEXT_KEY).map(text_of).unwrap_or_default();
        for (key, child) in map.iter() {
            if is_element_key(key) {
                out.push_str(&text_of(child));
            }
        }
        return out;
    }
    if let Some(items) = value.read_lock::<Array>() {
        return items.iter().map(text_of).collect();
    }
    if let Some(node) = value.read_lock::<XmlNode>() {
        return node.text();
    }
    if let Some(list) = value.read_lock::<XmlNodeList>() {
        return list.text();
    }
    dynamic_to_text(value)
}

fn is_element_key(key: &str) -> bool {
    key != TEXT_KEY && !key.starts_with(ATTRIBUTE_PREFIX)
}

fn attribute_of(value: &Dynamic, name: &str) -> Dynamic {
    value
        .read_lock::<Map>()
        .and_then(|map| map.get(format!("{}{}", ATTRIBUTE_PREFIX, name).as_str()).cloned())
        .unwrap_or(Dynamic::UNIT)
}

fn children_of(value: &Dynamic) -> Vec<XmlNode> {
    let mut out = Vec::new();
    if let Some(map) = value.read_lock::<Map>() {
        for (key, child) in map.iter() {
            if !is_element_key(key) {
                continue;
            }
            match child.read_lock::<Array>() {
                Some(items) => out.extend(items.iter().map(|item| XmlNode::new(key, item.clone()))),
                None => out.push(XmlNode::new(key, child.clone())),
            }
        }
    } else if let Some(items) = value.read_lock::<Array>() {
        for item in items.iter() {
            out.extend(children_of(item));
        }
    }
    out
}

fn descendants_named(value: &Dynamic, name: &str, out: &mut Vec<XmlNode>) {
    for child in children_of(value) {
        if child.name == name {
            out.push(child.clone());
        }
        descendants_named(&child.value, name, out);
    }
}

/// One element of a parsed document with DOM-style navigation.
#[derive(Debug, Clone)]
pub struct XmlNode {
    name: String,
    value: Dynamic,
}

impl XmlNode {
    pub fn new(name: &str, value: Dynamic) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }

    pub fn text(&self) -> String {
        text_of(&self.value)
    }

    pub fn children(&self) -> XmlNodeList {
        XmlNodeList(children_of(&self.value))
    }

    /// `@attr` reads an attribute, `..name` searches all descendants,
    /// anything else selects direct children by name.
    pub fn select(&self, key: &str) -> Dynamic {
        if let Some(attribute) = key.strip_prefix(ATTRIBUTE_PREFIX) {
            return attribute_of(&self.value, attribute);
        }
        if let Some(name) = key.strip_prefix(DESCENDANT_PREFIX) {
            let mut found = Vec::new();
            descendants_named(&self.value, name, &mut found);
            return Dynamic::from(XmlNodeList(found));
        }
        let children = children_of(&self.value)
            .into_iter()
            .filter(|child| child.name == key)
            .collect();
        Dynamic::from(XmlNodeList(children))
    }
}

#[derive(Debug, Clone, Default)]
pub struct XmlNodeList(Vec<XmlNode>);

impl XmlNodeList {
    pub fn text(&self) -> String {
        self.0.iter().map(XmlNode::text).collect()
    }

    fn get(&self, index: INT) -> Dynamic {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.0.get(index))
            .map(|node| Dynamic::from(node.clone()))
            .unwrap_or(Dynamic::UNIT)
    }

    fn select(&self, key: &str) -> Dynamic {
        if key.starts_with(ATTRIBUTE_PREFIX) {
            return self
                .0
                .first()
                .map(|node| node.select(key))
                .unwrap_or(Dynamic::UNIT);
        }
        let mut nodes = Vec::new();
        for node in &self.0 {
            if let Some(list) = node.select(key).try_cast::<XmlNodeList>() {
                nodes.extend(list.0);
            }
        }
        Dynamic::from(XmlNodeList(nodes))
    }
}

impl IntoIterator for XmlNodeList {
    type Item = XmlNode;
    type IntoIter = std::vec::IntoIter<XmlNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn deep_search(
    context: NativeCallContext,
    tree: Dynamic,
    predicate: FnPtr,
) -> Result<Array, Box<EvalAltResult>> {
    let mut found = Array::new();
    let mut pending = vec![tree];
    while let Some(value) = pending.pop() {
        match predicate.call_within_context::<Dynamic>(&context, (value.clone(),)) {
            Ok(verdict) if is_truthy(&verdict) => found.push(value.clone()),
            Ok(_) => {}
            Err(error) if matches!(*error, EvalAltResult::ErrorTerminated(..)) => {
                return Err(error)
            }
            // Predicates written for maps may fail on scalars; that is a miss.
            Err(_) => {}
        }
        let mut children = Vec::new();
        if let Some(map) = value.read_lock::<Map>() {
            children.extend(map.values().cloned());
        } else if let Some(items) = value.read_lock::<Array>() {
            children.extend(items.iter().cloned());
        }
        pending.extend(children.into_iter().rev());
    }
    Ok(found)
}

pub(super) fn register(engine: &mut Engine) {
    engine.register_fn("getText", |value: Dynamic| text_of(&value));
    engine.register_fn("deepSearch", deep_search);
    engine.register_fn("xmlProxy", |value: Dynamic| {
        XmlNode::new(DOCUMENT_NAME, value)
    });

    engine
        .register_type_with_name::<XmlNode>("XmlNode")
        .register_fn("text", |node: XmlNode| node.text())
        .register_fn("name", |node: XmlNode| node.name)
        .register_fn("attr", |node: XmlNode, name: ImmutableString| {
            attribute_of(&node.value, &name)
        })
        .register_fn("children", |node: XmlNode| node.children())
        .register_indexer_get(|node: &mut XmlNode, key: ImmutableString| node.select(&key))
        .register_fn("to_string", |node: &mut XmlNode| node.text())
        .register_fn("to_debug", |node: &mut XmlNode| format!("<{}>", node.name));

    engine
        .register_type_with_name::<XmlNodeList>("XmlNodeList")
        .register_iterator::<XmlNodeList>()
        .register_fn("len", |list: XmlNodeList| list.0.len() as INT)
        .register_fn("text", |list: XmlNodeList| list.text())
        .register_fn("first", |list: XmlNodeList| list.get(0))
        .register_fn("name", |list: XmlNodeList| {
            list.0
                .first()
                .map(|node| Dynamic::from(node.name.clone()))
                .unwrap_or(Dynamic::UNIT)
        })
        .register_fn("attr", |list: XmlNodeList, name: ImmutableString| {
            list.0
                .first()
                .map(|node| attribute_of(&node.value, &name))
                .unwrap_or(Dynamic::UNIT)
        })
        .register_indexer_get(|list: &mut XmlNodeList, index: INT| list.get(index))
        .register_indexer_get(|list: &mut XmlNodeList, key: ImmutableString| list.select(&key))
        .register_fn("to_string", |list: &mut XmlNodeList| list.text());
}

#[cfg(test)]
mod tests {
    use crate::shims::test_support::{eval, eval_text};

    const ORDER: &str = r#"let doc = parseXML("<order id=\"7\"><customer><name>Ann</name></customer><line sku=\"A\"><qty>2</qty></line><line sku=\"B\"><qty>5</qty></line></order>");"#;

    fn with_order(body: &str) -> String {
        format!("{}\n{}", ORDER, body)
    }

    #[test]
    fn get_text_concatenates_nested_text() {
        assert_eq!(eval_text(&with_order("getText(doc.order.customer)")), "Ann");
        assert_eq!(eval_text(&with_order("getText(doc.order.line)")), "25");
        assert_eq!(eval_text(r##"getText(#{"#text": "a", "b": "c"})"##), "ac");
    }

    #[test]
    fn proxy_navigates_children_attributes_and_descendants() {
        let script = with_order(
            r#"let root = xmlProxy(doc).order[0];
               let lines = root.line;
               root["@id"] + "|" + root.name() + "|" + lines.len() + "|" + lines[1]["@sku"] + "|"
                 + lines[1].qty.text() + "|" + root["..name"].text() + "|" + root.children().len()"#,
        );
        assert_eq!(eval_text(&script), "7|order|2|B|5|Ann|3");
    }

    #[test]
    fn node_lists_answer_for_their_first_node() {
        let script = with_order(
            r#"let order = xmlProxy(doc).order;
               order.name() + "|" + order.line.name() + "|" + order.attr("id")"#,
        );
        assert_eq!(eval_text(&script), "order|line|7");
        assert!(eval(&with_order("xmlProxy(doc).order.missing.name()")).is_unit());
    }

    #[test]
    fn node_lists_iterate() {
        let script = with_order(
            r#"let skus = [];
               for line in xmlProxy(doc)["..line"] { skus.push(line.attr("sku")); }
               skus"#,
        );
        assert_eq!(eval_text(&script).replace([' ', '\n'], ""), r#"["A","B"]"#);
    }

    #[test]
    fn deep_search_collects_matches_depth_first() {
        let script = r#"
            let tree = #{a: #{id: 1, b: [#{id: 2}, #{id: 3, c: #{id: 4}}]}};
            deepSearch(tree, |n| type_of(n) == "map" && n.id != () && n.id % 2 == 0).len()
        "#;
        assert_eq!(eval(script).as_int(), Ok(2));
        let ids = r#"
            let tree = #{a: #{id: 1, b: [#{id: 2}, #{id: 3}]}};
            deepSearch(tree, |n| n.id > 0).map(|n| n.id)
        "#;
        assert_eq!(eval_text(ids).replace([' ', '\n'], ""), "[1,2,3]");
    }
}
