use std::collections::HashSet;

use dm_core::{
    access_expression, access_expression_for_segments, parse_path, quote_string,
    sanitize_identifier, InputType, LoopBinding, MapperError, MapperState, NodeType, PathSegment,
    SourceReference, TreeIndex, TreeNode, SOURCE_DATA_ROOT,
};

use crate::ast::{Place, Stmt};
use crate::key_order::render_key_order;
use crate::normalize::normalize_fragment;
use crate::scope::ScopeStack;
use crate::GeneratorOptions;

pub const MAX_TREE_DEPTH: usize = 512;

const OUTPUT_ROOT: &str = "output";
const ITEM_PREFIX: &str = "__item_";
const DEFAULT_ITERATOR: &str = "item";
const KEY_ORDER: &str = "__keyOrder";

/// Lowers a mapper state into the statement tree of a complete script.
pub fn lower_program(
    state: &MapperState,
    options: &GeneratorOptions,
) -> Result<Vec<Stmt>, MapperError> {
    let source = match &state.source_tree_node {
        Some(tree) => TreeIndex::build(tree)?,
        None => TreeIndex::default(),
    };
    if let Some(target) = &state.target_tree_node {
        TreeIndex::build(target)?;
    }

    let mut lowering = Lowering {
        state,
        options,
        source,
        scopes: ScopeStack::default(),
        bindings: Vec::new(),
        iterators: Vec::new(),
        next_item: 0,
    };

    let mut program = vec![Stmt::Let {
        name: SOURCE_DATA_ROOT.to_string(),
        value: format!("{}(input)", parser_function(options.source_format)),
    }];
    lowering.lower_context(&mut program);
    program.push(Stmt::Let {
        name: OUTPUT_ROOT.to_string(),
        value: "#{}".to_string(),
    });

    if let Some(target) = &state.target_tree_node {
        let root = Place::root(OUTPUT_ROOT);
        for child in target.children() {
            lowering.lower_node(child, &root, 1, &mut program)?;
        }
    }

    if let Some(epilog) = non_blank(&state.local_context.epilog_script) {
        program.push(Stmt::Raw(normalize_fragment(epilog)));
    }
    let serializer = serializer_function(options.target_format);
    let key_order = state.target_tree_node.as_ref().and_then(render_key_order);
    match key_order {
        Some(order) => {
            program.push(Stmt::Let {
                name: KEY_ORDER.to_string(),
                value: order,
            });
            program.push(Stmt::Return(format!(
                "{}({}, {})",
                serializer, OUTPUT_ROOT, KEY_ORDER
            )));
        }
        None => program.push(Stmt::Return(format!("{}({})", serializer, OUTPUT_ROOT))),
    }
    Ok(program)
}

fn parser_function(format: InputType) -> &'static str {
    match format {
        InputType::Json => "parseJSON",
        InputType::Xml => "parseXML",
    }
}

fn serializer_function(format: InputType) -> &'static str {
    match format {
        InputType::Json => "toJSON",
        InputType::Xml => "toXML",
    }
}

struct Lowering<'a> {
    state: &'a MapperState,
    options: &'a GeneratorOptions,
    source: TreeIndex,
    scopes: ScopeStack,
    bindings: Vec<LoopBinding>,
    iterators: Vec<String>,
    next_item: usize,
}

struct ResolvedLoop {
    loop_id: Option<String>,
    iterator: String,
    iterable: String,
    binding: Option<LoopBinding>,
}

impl<'a> Lowering<'a> {
    fn lower_context(&mut self, out: &mut Vec<Stmt>) {
        let context = &self.state.local_context;
        for variable in &context.global_variables {
            if variable.name.trim().is_empty() {
                continue;
            }
            out.push(Stmt::Let {
                name: sanitize_identifier(&variable.name),
                value: literal_or_expression(&variable.value, variable.plain_text_value),
            });
        }

        for table in &context.lookup_tables {
            if table.name.trim().is_empty() {
                continue;
            }
            let entries = table
                .entries
                .iter()
                .map(|entry| {
                    format!(
                        "{}: {}",
                        quote_string(&entry.key),
                        literal_or_expression(&entry.value, entry.plain_text_value)
                    )
                })
                .collect::<Vec<_>>();
            out.push(Stmt::Let {
                name: sanitize_identifier(&table.name),
                value: format!("#{{{}}}", entries.join(", ")),
            });
        }

        for function in &context.functions {
            if !function.body.trim().is_empty() {
                out.push(Stmt::Raw(normalize_fragment(&function.body)));
            }
        }

        if let Some(prolog) = non_blank(&context.prolog_script) {
            out.push(Stmt::Raw(normalize_fragment(prolog)));
        }
    }

    fn lower_node(
        &mut self,
        node: &TreeNode,
        parent: &Place,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        check_depth(node, depth)?;
        if !node.has_mapping() {
            return Ok(());
        }
        if let Some(comment) = non_blank(&node.comment) {
            out.push(Stmt::Comment(comment.to_string()));
        }

        let Some(condition) = node_condition(node) else {
            return self.lower_body(node, parent, depth, out);
        };
        self.declare_condition_references(node, condition, out);
        let body = self.in_block(|this, body| this.lower_body(node, parent, depth, body))?;
        out.push(Stmt::If {
            condition: wrap_condition(condition),
            body,
        });
        Ok(())
    }

    fn lower_body(
        &mut self,
        node: &TreeNode,
        parent: &Place,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        match node.node_type {
            NodeType::Code => {
                if let Some(code) = node.non_empty_value() {
                    out.push(Stmt::Raw(normalize_fragment(code)));
                }
                Ok(())
            }
            NodeType::Array => {
                let place = parent.child(target_key(node));
                self.ensure_parents(&place, out);
                let key = format!("[]{}", place.render());
                if !self.scopes.is_ensured(&key) {
                    out.push(Stmt::EnsureArray(place.clone()));
                    self.scopes.mark_ensured(key);
                }
                self.lower_array_into(node, &place, depth, out)
            }
            _ if node.is_leaf() => {
                let place = parent.child(target_key(node));
                self.lower_leaf(node, &place, out)
            }
            _ => {
                let place = parent.child(target_key(node));
                for child in node.children() {
                    self.lower_node(child, &place, depth + 1, out)?;
                }
                Ok(())
            }
        }
    }

    fn lower_leaf(
        &mut self,
        node: &TreeNode,
        place: &Place,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        let variables = self.declare_references(&node.source_references, out);
        if let Some(code) = non_blank(&node.custom_code) {
            out.push(Stmt::Raw(normalize_fragment(code)));
        }
        let Some(value) = leaf_expression(node, &variables) else {
            return Ok(());
        };

        let assign = Stmt::Assign {
            place: place.clone(),
            value: value.clone(),
            comment: self.debug_comment(node, &variables),
        };
        if !node.non_empty {
            self.ensure_parents(place, out);
            out.push(assign);
            return Ok(());
        }

        let body = self.in_block(|this, body| {
            this.ensure_parents(place, body);
            body.push(assign);
            Ok(())
        })?;
        out.push(Stmt::If {
            condition: format!("!isEmpty({})", value),
            body,
        });
        Ok(())
    }

    /// Emits the loop (or the single pass of an unlooped array) that fills
    /// the array at `place`.
    fn lower_array_into(
        &mut self,
        node: &TreeNode,
        place: &Place,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        let Some(resolved) = self.resolve_loop(node, out) else {
            return self.lower_filtered_groups(node, place, None, depth, out);
        };

        self.scopes.push();
        self.iterators.push(resolved.iterator.clone());
        let pushed_binding = resolved.binding.is_some();
        if let Some(binding) = resolved.binding {
            self.bindings.push(binding);
        }

        let mut body = Vec::new();
        let result = self.lower_loop_body(node, place, resolved.loop_id.as_deref(), depth, &mut body);

        if pushed_binding {
            self.bindings.pop();
        }
        self.iterators.pop();
        self.scopes.pop();
        result?;

        out.push(Stmt::ForEach {
            iterator: resolved.iterator,
            iterable: resolved.iterable,
            body,
        });
        Ok(())
    }

    fn lower_loop_body(
        &mut self,
        node: &TreeNode,
        place: &Place,
        loop_id: Option<&str>,
        depth: usize,
        body: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        if let Some(loop_id) = loop_id {
            self.declare_loop_references(node, loop_id, body);
        }
        self.lower_filtered_groups(node, place, loop_id, depth, body)
    }

    fn lower_filtered_groups(
        &mut self,
        node: &TreeNode,
        place: &Place,
        loop_id: Option<&str>,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        let Some(condition) = self.loop_condition_expression(node, loop_id) else {
            return self.lower_item_groups(node, place, depth, out);
        };
        for reference in self.flat_references_in(&condition) {
            self.declare_reference(reference, false, out);
        }
        let body = self.in_block(|this, body| this.lower_item_groups(node, place, depth, body))?;
        out.push(Stmt::If { condition, body });
        Ok(())
    }

    /// Every arrayChild is its own item; the remaining direct children share one.
    fn lower_item_groups(
        &mut self,
        node: &TreeNode,
        place: &Place,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        let loose = node
            .children()
            .iter()
            .filter(|child| !is_positional_item(child))
            .collect::<Vec<_>>();
        let mut loose_pending = loose.iter().any(|child| child.has_mapping());

        for child in node.children() {
            match child.node_type {
                NodeType::ArrayChild => self.lower_array_child(child, place, depth + 1, out)?,
                NodeType::Array if is_positional_item(child) => {
                    self.lower_nested_list(child, place, depth + 1, out)?
                }
                _ if loose_pending && !is_positional_item(child) => {
                    loose_pending = false;
                    self.lower_item(&loose, None, place, depth + 1, out)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn lower_array_child(
        &mut self,
        child: &TreeNode,
        array: &Place,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        check_depth(child, depth)?;
        if !child.has_mapping() {
            return Ok(());
        }
        if let Some(comment) = non_blank(&child.comment) {
            out.push(Stmt::Comment(comment.to_string()));
        }
        if !child.is_leaf() {
            let children = child.children().iter().collect::<Vec<_>>();
            return self.lower_item(&children, Some(child), array, depth, out);
        }

        let Some(condition) = node_condition(child) else {
            return self.push_leaf_value(child, array, out);
        };
        self.declare_condition_references(child, condition, out);
        let body = self.in_block(|this, body| this.push_leaf_value(child, array, body))?;
        out.push(Stmt::If {
            condition: wrap_condition(condition),
            body,
        });
        Ok(())
    }

    fn push_leaf_value(
        &mut self,
        child: &TreeNode,
        array: &Place,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        let variables = self.declare_references(&child.source_references, out);
        if let Some(code) = non_blank(&child.custom_code) {
            out.push(Stmt::Raw(normalize_fragment(code)));
        }
        let Some(value) = leaf_expression(child, &variables) else {
            return Ok(());
        };
        let push = Stmt::Push {
            array: array.clone(),
            value: value.clone(),
        };
        if child.non_empty {
            out.push(Stmt::If {
                condition: format!("!isEmpty({})", value),
                body: vec![push],
            });
        } else {
            out.push(push);
        }
        Ok(())
    }

    /// An array directly inside an array becomes a list-valued item.
    fn lower_nested_list(
        &mut self,
        child: &TreeNode,
        array: &Place,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        check_depth(child, depth)?;
        if !child.has_mapping() {
            return Ok(());
        }
        if let Some(comment) = non_blank(&child.comment) {
            out.push(Stmt::Comment(comment.to_string()));
        }
        let list = self.next_item_name();
        out.push(Stmt::Let {
            name: list.clone(),
            value: "[]".to_string(),
        });
        let list_place = Place::root(list.clone());
        match node_condition(child) {
            None => self.lower_array_into(child, &list_place, depth, out)?,
            Some(condition) => {
                self.declare_condition_references(child, condition, out);
                let body = self
                    .in_block(|this, body| this.lower_array_into(child, &list_place, depth, body))?;
                out.push(Stmt::If {
                    condition: wrap_condition(condition),
                    body,
                });
            }
        }
        out.push(Stmt::ConditionalPush {
            array: array.clone(),
            item: list,
        });
        Ok(())
    }

    fn lower_item(
        &mut self,
        children: &[&TreeNode],
        owner: Option<&TreeNode>,
        array: &Place,
        depth: usize,
        out: &mut Vec<Stmt>,
    ) -> Result<(), MapperError> {
        if !children.iter().any(|child| child.has_mapping()) {
            return Ok(());
        }
        let item = self.next_item_name();
        out.push(Stmt::NewItem(item.clone()));
        let item_place = Place::root(item.clone());

        match owner.and_then(|owner| node_condition(owner).map(|condition| (owner, condition))) {
            None => {
                for child in children {
                    self.lower_node(child, &item_place, depth + 1, out)?;
                }
            }
            Some((owner, condition)) => {
                self.declare_condition_references(owner, condition, out);
                let body = self.in_block(|this, body| {
                    for child in children {
                        this.lower_node(child, &item_place, depth + 1, body)?;
                    }
                    Ok(())
                })?;
                out.push(Stmt::If {
                    condition: wrap_condition(condition),
                    body,
                });
            }
        }

        out.push(Stmt::ConditionalPush {
            array: array.clone(),
            item,
        });
        Ok(())
    }

    fn resolve_loop(&self, node: &TreeNode, out: &mut Vec<Stmt>) -> Option<ResolvedLoop> {
        let statement = non_blank(&node.loop_statement);
        let reference = node.loop_reference.as_ref();
        let source = reference.and_then(|reference| self.source.get(&reference.source_node_id));

        if let (Some(reference), None) = (reference, source) {
            tracing::warn!(
                loop_id = %reference.id,
                source_node_id = %reference.source_node_id,
                "loop reference does not resolve; array is emitted without a loop"
            );
            out.push(Stmt::Comment(format!(
                "broken loop reference: {} ({})",
                reference.variable_name, reference.source_node_id
            )));
            if statement.is_none() {
                return None;
            }
        }
        if reference.is_none() && statement.is_none() {
            return None;
        }

        let base = non_blank(&node.loop_iterator)
            .or_else(|| {
                reference
                    .map(|reference| reference.variable_name.trim())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or(DEFAULT_ITERATOR);
        let iterator = self.unique_iterator(&sanitize_identifier(base));

        let binding = match (reference, source) {
            (Some(reference), Some(source)) => {
                Some(LoopBinding::new(reference.id.clone(), iterator.clone(), source))
            }
            _ => None,
        };
        let iterable = match (statement, &binding) {
            (Some(statement), _) => normalize_fragment(statement),
            (None, Some(binding)) => format!(
                "asArray({})",
                access_expression_for_segments(binding.array_segments(), &self.bindings, None)
            ),
            (None, None) => return None,
        };

        Some(ResolvedLoop {
            loop_id: reference.map(|reference| reference.id.clone()),
            iterator,
            iterable,
            binding,
        })
    }

    fn unique_iterator(&self, base: &str) -> String {
        if !self.iterators.iter().any(|name| name == base) {
            return base.to_string();
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{}_{}", base, suffix);
            if !self.iterators.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn loop_condition_expression(&self, node: &TreeNode, loop_id: Option<&str>) -> Option<String> {
        let parts = node
            .loop_conditions
            .iter()
            .filter(|condition| {
                !condition.condition.trim().is_empty() || !condition.source_node_path.trim().is_empty()
            })
            .map(|condition| {
                let suffix = normalize_fragment(condition.condition.trim());
                match self.condition_subject(&condition.source_node_path, loop_id) {
                    Some(subject) if suffix.is_empty() => format!("({})", subject),
                    Some(subject) => format!("({} {})", subject, suffix),
                    None => format!("({})", suffix),
                }
            })
            .collect::<Vec<_>>();
        if parts.is_empty() {
            return None;
        }
        let joiner = format!(" {} ", node.loop_conditions_connective.operator());
        Some(parts.join(&joiner))
    }

    /// Resolves a condition's source path (or source node id) to an access
    /// expression; a leading root name is dropped when it does not resolve.
    fn condition_subject(&self, path: &str, loop_id: Option<&str>) -> Option<String> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        let segments = if let Some(node) = self.source.get(path) {
            node.segments.clone()
        } else {
            let parsed = parse_path(path);
            let resolves = |segments: &[PathSegment]| self.source.find_by_segments(segments).is_some();
            if !resolves(&parsed) && parsed.len() > 1 && resolves(&parsed[1..]) {
                parsed[1..].to_vec()
            } else {
                parsed
            }
        };
        Some(access_expression_for_segments(&segments, &self.bindings, loop_id))
    }

    fn declare_references(
        &mut self,
        references: &[SourceReference],
        out: &mut Vec<Stmt>,
    ) -> Vec<String> {
        let mut names = Vec::new();
        for reference in references {
            if let Some(name) = self.declare_reference(reference, false, out) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Declares the variable for `reference` unless the same binding is
    /// already visible. `fresh` forces a declaration in the current block.
    fn declare_reference(
        &mut self,
        reference: &SourceReference,
        fresh: bool,
        out: &mut Vec<Stmt>,
    ) -> Option<String> {
        let Some(expression) = access_expression(
            &reference.source_node_id,
            &self.source,
            &self.bindings,
            reference.loop_over_id.as_deref(),
        ) else {
            tracing::warn!(
                reference_id = %reference.id,
                source_node_id = %reference.source_node_id,
                "skipping broken reference"
            );
            out.push(Stmt::Comment(format!(
                "broken reference: {} ({})",
                reference.variable_name, reference.source_node_id
            )));
            return None;
        };

        let name = self.reference_name(reference);
        let visible = self.scopes.lookup(&name) == Some(expression.as_str());
        if !visible || (fresh && !self.scopes.declared_here(&name)) {
            out.push(Stmt::Let {
                name: name.clone(),
                value: expression.clone(),
            });
            self.scopes.declare(&name, &expression);
        }
        Some(name)
    }

    fn reference_name(&self, reference: &SourceReference) -> String {
        let name = reference.variable_name.trim();
        if !name.is_empty() {
            return sanitize_identifier(name);
        }
        let fallback = self
            .source
            .get(&reference.source_node_id)
            .map(|node| format!("_{}", node.name))
            .unwrap_or_else(|| format!("_{}", reference.id));
        sanitize_identifier(&fallback)
    }

    /// Loop bodies re-declare every reference bound to the loop, found in
    /// the subtree first and then in the flat reference list.
    fn declare_loop_references(&mut self, node: &TreeNode, loop_id: &str, out: &mut Vec<Stmt>) {
        let state = self.state;
        let mut bound: Vec<&SourceReference> = Vec::new();
        node.walk(&mut |visited| {
            bound.extend(
                visited
                    .source_references
                    .iter()
                    .filter(|reference| reference.loop_over_id.as_deref() == Some(loop_id)),
            );
        });
        bound.extend(
            state
                .references
                .iter()
                .filter(|reference| reference.loop_over_id.as_deref() == Some(loop_id)),
        );

        let mut seen = HashSet::new();
        for reference in bound {
            if seen.insert(self.reference_name(reference)) {
                self.declare_reference(reference, true, out);
            }
        }
    }

    /// Before a node condition: declare the subtree's references that belong
    /// to the current block, plus flat references the condition mentions.
    fn declare_condition_references(
        &mut self,
        node: &TreeNode,
        condition: &str,
        out: &mut Vec<Stmt>,
    ) {
        let mut inner_loops: Vec<String> = Vec::new();
        let mut inner_prefixes: Vec<Vec<PathSegment>> = Vec::new();
        let mut references: Vec<&SourceReference> = Vec::new();
        node.walk(&mut |visited| {
            if let Some(reference) = &visited.loop_reference {
                inner_loops.push(reference.id.clone());
                if let Some(source) = self.source.get(&reference.source_node_id) {
                    inner_prefixes.push(LoopBinding::new("", "", source).item_prefix);
                }
            }
            references.extend(visited.source_references.iter());
        });

        let owned = references
            .into_iter()
            .filter(|reference| {
                if let Some(loop_id) = reference.loop_over_id.as_deref() {
                    if inner_loops.iter().any(|inner| inner == loop_id) {
                        return false;
                    }
                }
                match self.source.get(&reference.source_node_id) {
                    Some(source) => !inner_prefixes
                        .iter()
                        .any(|prefix| source.segments.starts_with(prefix)),
                    None => true,
                }
            })
            .collect::<Vec<_>>();

        let mut seen = HashSet::new();
        for reference in owned {
            if seen.insert(reference.id.clone()) {
                self.declare_reference(reference, false, out);
            }
        }
        for reference in self.flat_references_in(condition) {
            if seen.insert(reference.id.clone()) {
                self.declare_reference(reference, false, out);
            }
        }
    }

    /// Flat references whose variable name appears in `text`.
    fn flat_references_in(&self, text: &str) -> Vec<&'a SourceReference> {
        let state = self.state;
        state
            .references
            .iter()
            .filter(|reference| {
                let name = self.reference_name(reference);
                contains_identifier(text, &name)
            })
            .collect()
    }

    fn debug_comment(&self, node: &TreeNode, variables: &[String]) -> Option<String> {
        if !self.options.debug_comment {
            return None;
        }
        non_blank(&node.debug_comment)
            .map(str::to_string)
            .or_else(|| variables.first().cloned())
    }

    fn ensure_parents(&mut self, place: &Place, out: &mut Vec<Stmt>) {
        for ancestor in place.ancestors() {
            let key = ancestor.render();
            if !self.scopes.is_ensured(&key) {
                self.scopes.mark_ensured(key);
                out.push(Stmt::EnsureMap(ancestor));
            }
        }
    }

    fn in_block(
        &mut self,
        build: impl FnOnce(&mut Self, &mut Vec<Stmt>) -> Result<(), MapperError>,
    ) -> Result<Vec<Stmt>, MapperError> {
        self.scopes.push();
        let mut body = Vec::new();
        let result = build(self, &mut body);
        self.scopes.pop();
        result.map(|()| body)
    }

    fn next_item_name(&mut self) -> String {
        self.next_item += 1;
        format!("{}{}", ITEM_PREFIX, self.next_item)
    }
}

fn check_depth(node: &TreeNode, depth: usize) -> Result<(), MapperError> {
    if depth > MAX_TREE_DEPTH {
        return Err(MapperError::with_node(
            "GEN_TREE_TOO_DEEP",
            format!("Target tree is deeper than {} levels.", MAX_TREE_DEPTH),
            node.id.clone(),
        ));
    }
    Ok(())
}

/// Array children that stand for one element: arrayChild nodes and
/// list-valued items named like `[0]`.
pub(crate) fn is_positional_item(node: &TreeNode) -> bool {
    match node.node_type {
        NodeType::ArrayChild => true,
        NodeType::Array => node.name.starts_with('[') && node.name.ends_with(']'),
        _ => false,
    }
}

pub(crate) fn target_key(node: &TreeNode) -> String {
    if node.node_type == NodeType::Attribute && !node.name.starts_with('@') {
        format!("@{}", node.name)
    } else {
        node.name.clone()
    }
}

fn node_condition(node: &TreeNode) -> Option<&str> {
    node.node_condition
        .as_ref()
        .map(|condition| condition.condition.trim())
        .filter(|condition| !condition.is_empty())
}

fn wrap_condition(condition: &str) -> String {
    format!("({})", normalize_fragment(condition))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn literal_or_expression(value: &str, plain_text: bool) -> String {
    if plain_text {
        return quote_string(value);
    }
    let value = value.trim();
    if value.is_empty() {
        "()".to_string()
    } else {
        normalize_fragment(value)
    }
}

/// A non-empty `value` wins over references; references alone assign the
/// single variable or the interpolation of all of them.
fn leaf_expression(node: &TreeNode, variables: &[String]) -> Option<String> {
    let expression = match node.non_empty_value() {
        Some(value) if node.plain_text_value => quote_string(value),
        Some(value) => normalize_fragment(value.trim()),
        None => match variables {
            [] => return None,
            [single] => single.clone(),
            many => format!(
                "`{}`",
                many.iter()
                    .map(|name| format!("${{{}}}", name))
                    .collect::<String>()
            ),
        },
    };
    if node.quote && !expression.starts_with('"') && !expression.starts_with('`') {
        return Some(format!("`${{{}}}`", expression));
    }
    Some(expression)
}

fn contains_identifier(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let is_word = |ch: char| ch.is_ascii_alphanumeric() || ch == '_';
    let mut offset = 0usize;
    while let Some(found) = text[offset..].find(name) {
        let start = offset + found;
        let end = start + name.len();
        let left = text[..start].chars().next_back();
        let right = text[end..].chars().next();
        if !left.is_some_and(|ch| is_word(ch) || ch == '.') && !right.is_some_and(is_word) {
            return true;
        }
        offset = end;
    }
    false
}
