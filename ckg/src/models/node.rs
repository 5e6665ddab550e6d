use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{generate_id, Metadata};

/// Kinds of vertices in the code knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Function,
    Method,
    Class,
    Variable,
    Type,
    Interface,
    Module,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Function => write!(f, "function"),
            Self::Method => write!(f, "method"),
            Self::Class => write!(f, "class"),
            Self::Variable => write!(f, "variable"),
            Self::Type => write!(f, "type"),
            Self::Interface => write!(f, "interface"),
            Self::Module => write!(f, "module"),
        }
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "class" => Ok(Self::Class),
            "variable" => Ok(Self::Variable),
            "type" => Ok(Self::Type),
            "interface" => Ok(Self::Interface),
            "module" => Ok(Self::Module),
            _ => Err(format!("Unknown node type: {s}")),
        }
    }
}

/// A file or code symbol in a project's graph.
///
/// Within a project, (path, name, node_type) identifies a logical symbol;
/// re-indexing a file removes all prior nodes for that path before
/// inserting new ones, so no duplicate live definitions exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub path: String,
    pub language: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GraphNode {
    pub fn new(project_id: &str, node_type: NodeType, name: &str, path: &str) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            project_id: project_id.to_string(),
            node_type,
            name: name.to_string(),
            path: path.to_string(),
            language: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Signature string from metadata, when the extractor recorded one.
    pub fn signature(&self) -> Option<&str> {
        self.metadata.get("signature").and_then(|v| v.as_str())
    }

    /// Dedup key when a node id is not available: name + type + path.
    pub fn identity_key(&self) -> String {
        format!("{}|{}|{}", self.name, self.node_type, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_node_type_round_trip() {
        for ty in [
            NodeType::File,
            NodeType::Function,
            NodeType::Class,
            NodeType::Interface,
        ] {
            assert_eq!(NodeType::from_str(&ty.to_string()).unwrap(), ty);
        }
    }

    #[test]
    fn test_node_serializes_type_field() {
        let node = GraphNode::new("p1", NodeType::Function, "parse", "src/parser.rs");
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"function\""));
    }

    #[test]
    fn test_identity_key_distinguishes_paths() {
        let a = GraphNode::new("p1", NodeType::Function, "foo", "a.ts");
        let b = GraphNode::new("p1", NodeType::Function, "foo", "b.ts");
        assert_ne!(a.identity_key(), b.identity_key());
    }
}
