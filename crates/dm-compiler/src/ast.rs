use dm_core::{is_plain_identifier, quote_string};

/// A writable location: a root variable followed by map keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub root: String,
    pub keys: Vec<String>,
}

impl Place {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            root: name.into(),
            keys: Vec::new(),
        }
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key.into());
        Self {
            root: self.root.clone(),
            keys,
        }
    }

    /// Every proper ancestor below the root, outermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = Place> + '_ {
        (1..self.keys.len()).map(|len| Place {
            root: self.root.clone(),
            keys: self.keys[..len].to_vec(),
        })
    }

    pub fn render(&self) -> String {
        let mut out = self.root.clone();
        for key in &self.keys {
            if is_plain_identifier(key) {
                out.push('.');
                out.push_str(key);
            } else {
                out.push('[');
                out.push_str(&quote_string(key));
                out.push(']');
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Comment(String),
    /// User code injected as-is.
    Raw(String),
    Let {
        name: String,
        value: String,
    },
    Assign {
        place: Place,
        value: String,
        comment: Option<String>,
    },
    EnsureMap(Place),
    EnsureArray(Place),
    If {
        condition: String,
        body: Vec<Stmt>,
    },
    ForEach {
        iterator: String,
        iterable: String,
        body: Vec<Stmt>,
    },
    NewItem(String),
    /// Appends `item` to `array` only when at least one key was written.
    ConditionalPush {
        array: Place,
        item: String,
    },
    Push {
        array: Place,
        value: String,
    },
    Return(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_renders_keys_and_lists_ancestors() {
        let place = Place::root("output").child("order").child("@id").child("for");
        assert_eq!(place.render(), "output.order[\"@id\"][\"for\"]");
        let ancestors = place.ancestors().map(|p| p.render()).collect::<Vec<_>>();
        assert_eq!(ancestors, vec!["output.order", "output.order[\"@id\"]"]);
        assert_eq!(Place::root("output").ancestors().count(), 0);
    }
}
