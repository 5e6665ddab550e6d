use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Usage,
    Call,
    Reference,
    Import,
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage => write!(f, "usage"),
            Self::Call => write!(f, "call"),
            Self::Reference => write!(f, "reference"),
            Self::Import => write!(f, "import"),
        }
    }
}

impl std::str::FromStr for ReferenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "usage" => Ok(Self::Usage),
            "call" => Ok(Self::Call),
            "reference" => Ok(Self::Reference),
            "import" => Ok(Self::Import),
            _ => Err(format!("Unknown reference type: {s}")),
        }
    }
}

/// Links a reference site (e.g. a call expression node) to the symbol node
/// it references. Drives unused-export and missing-import detection and
/// impact analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolReference {
    pub id: String,
    pub project_id: String,
    pub reference_node_id: String,
    pub symbol_node_id: String,
    pub reference_type: ReferenceType,
    pub created_at: DateTime<Utc>,
}

impl SymbolReference {
    pub fn new(
        project_id: &str,
        reference_node_id: &str,
        symbol_node_id: &str,
        reference_type: ReferenceType,
    ) -> Self {
        Self {
            id: generate_id(),
            project_id: project_id.to_string(),
            reference_node_id: reference_node_id.to_string(),
            symbol_node_id: symbol_node_id.to_string(),
            reference_type,
            created_at: Utc::now(),
        }
    }
}
