use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            _ => Err(format!("Unknown severity: {s}")),
        }
    }
}

/// A problem attached to a node, reported by an external analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: String,
    pub node_id: String,
    pub severity: Severity,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub source: Option<String>,
    pub rule: Option<String>,
    pub suggestion: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Diagnostic {
    pub fn new(node_id: &str, severity: Severity, message: &str) -> Self {
        Self {
            id: generate_id(),
            node_id: node_id.to_string(),
            severity,
            message: message.to_string(),
            line: None,
            column: None,
            source: None,
            rule: None,
            suggestion: None,
            created_at: Utc::now(),
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}
