use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct Block {
    variables: HashMap<String, String>,
    ensured: HashSet<String>,
}

/// Lexical blocks of the script being generated, innermost last.
#[derive(Debug)]
pub struct ScopeStack {
    blocks: Vec<Block>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self {
            blocks: vec![Block::default()],
        }
    }
}

impl ScopeStack {
    pub fn push(&mut self) {
        self.blocks.push(Block::default());
    }

    pub fn pop(&mut self) {
        if self.blocks.len() > 1 {
            self.blocks.pop();
        }
    }

    /// The expression a visible variable was declared with.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.blocks
            .iter()
            .rev()
            .find_map(|block| block.variables.get(name).map(String::as_str))
    }

    pub fn declared_here(&self, name: &str) -> bool {
        self.blocks
            .last()
            .is_some_and(|block| block.variables.contains_key(name))
    }

    pub fn declare(&mut self, name: &str, expression: &str) {
        if let Some(block) = self.blocks.last_mut() {
            block
                .variables
                .insert(name.to_string(), expression.to_string());
        }
    }

    pub fn is_ensured(&self, key: &str) -> bool {
        self.blocks.iter().any(|block| block.ensured.contains(key))
    }

    pub fn mark_ensured(&mut self, key: String) {
        if let Some(block) = self.blocks.last_mut() {
            block.ensured.insert(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_blocks_shadow_and_release_on_pop() {
        let mut scopes = ScopeStack::default();
        scopes.declare("_name", "sourceData.name");
        scopes.mark_ensured("output.order".to_string());

        scopes.push();
        assert_eq!(scopes.lookup("_name"), Some("sourceData.name"));
        assert!(!scopes.declared_here("_name"));
        scopes.declare("_name", "product.name");
        scopes.mark_ensured("__item_1.meta".to_string());
        assert_eq!(scopes.lookup("_name"), Some("product.name"));
        assert!(scopes.is_ensured("output.order"));

        scopes.pop();
        assert_eq!(scopes.lookup("_name"), Some("sourceData.name"));
        assert!(!scopes.is_ensured("__item_1.meta"));
        scopes.pop();
        assert!(scopes.is_ensured("output.order"));
    }
}
