use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{generate_id, Metadata};

/// Typed, directed relationship kinds between graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Imports,
    Exports,
    Calls,
    References,
    Extends,
    Implements,
    Contains,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imports => write!(f, "imports"),
            Self::Exports => write!(f, "exports"),
            Self::Calls => write!(f, "calls"),
            Self::References => write!(f, "references"),
            Self::Extends => write!(f, "extends"),
            Self::Implements => write!(f, "implements"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

impl std::str::FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "imports" => Ok(Self::Imports),
            "exports" => Ok(Self::Exports),
            "calls" => Ok(Self::Calls),
            "references" => Ok(Self::References),
            "extends" => Ok(Self::Extends),
            "implements" => Ok(Self::Implements),
            "contains" => Ok(Self::Contains),
            _ => Err(format!("Unknown relationship: {s}")),
        }
    }
}

/// A directed edge between two nodes. Both endpoints must exist; deleting
/// a node cascades edge deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub project_id: String,
    pub source_id: String,
    pub target_id: String,
    pub relationship: Relationship,
    pub strength: Option<f32>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl GraphEdge {
    pub fn new(
        project_id: &str,
        source_id: &str,
        target_id: &str,
        relationship: Relationship,
    ) -> Self {
        Self {
            id: generate_id(),
            project_id: project_id.to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            relationship,
            strength: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_relationship_round_trip() {
        for rel in [
            Relationship::Imports,
            Relationship::Exports,
            Relationship::Calls,
            Relationship::Extends,
        ] {
            assert_eq!(Relationship::from_str(&rel.to_string()).unwrap(), rel);
        }
    }

    #[test]
    fn test_edge_serialization() {
        let edge = GraphEdge::new("p1", "n1", "n2", Relationship::Imports);
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"source_id\":\"n1\""));
        assert!(json.contains("\"relationship\":\"imports\""));
    }
}
