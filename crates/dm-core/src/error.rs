use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct MapperError {
    pub code: String,
    pub message: String,
    pub node_id: Option<String>,
}

impl MapperError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            node_id: None,
        }
    }

    pub fn with_node(
        code: impl Into<String>,
        message: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            node_id: Some(node_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_code_and_message() {
        let error = MapperError::new("GEN_FAILED", "boom");
        assert_eq!(error.to_string(), "GEN_FAILED: boom");
        assert!(error.node_id.is_none());
    }

    #[test]
    fn with_node_keeps_node_id() {
        let error = MapperError::with_node("TREE_DUPLICATE_NODE_ID", "dup", "n1");
        assert_eq!(error.node_id.as_deref(), Some("n1"));
    }
}
