//! Error types with fix suggestions
//!
//! Only the edges of the crate can fail (reading files, parsing documents,
//! loading config). Graph construction itself never errors: bad input
//! degrades to fewer nodes or fewer edges, see [`crate::event::MalformedEvent`].

use thiserror::Error;

use crate::event::EventId;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, GraphError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("WFG-001: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WFG-002: JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("WFG-003: YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ─────────────────────────────────────────────────────────────
    // Input shape (WFG-010 to WFG-012)
    // ─────────────────────────────────────────────────────────────
    #[error("WFG-010: Invalid history document: {reason}")]
    InvalidHistory { reason: String },

    #[error("WFG-011: Event {id} not found in graph")]
    NodeNotFound { id: EventId },

    #[error("WFG-012: Unknown layout direction '{value}' (expected tb or lr)")]
    InvalidDirection { value: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration (WFG-020)
    // ─────────────────────────────────────────────────────────────
    #[error("WFG-020: Config error: {reason}")]
    ConfigError { reason: String },
}

impl GraphError {
    /// Stable error code (the prefix of the display message)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "WFG-001",
            Self::JsonParse(_) => "WFG-002",
            Self::YamlParse(_) => "WFG-003",
            Self::InvalidHistory { .. } => "WFG-010",
            Self::NodeNotFound { .. } => "WFG-011",
            Self::InvalidDirection { .. } => "WFG-012",
            Self::ConfigError { .. } => "WFG-020",
        }
    }
}

impl FixSuggestion for GraphError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            GraphError::Io(_) => Some("Check file path and permissions"),
            GraphError::JsonParse(_) => Some("Check JSON syntax (try parsing with jq)"),
            GraphError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            GraphError::InvalidHistory { .. } => Some(
                "Provide an array of events or an object with history.events / events",
            ),
            GraphError::NodeNotFound { .. } => {
                Some("Run `wfgraph inspect` to list the event ids present in the history")
            }
            GraphError::InvalidDirection { .. } => Some("Use tb (top-to-bottom) or lr (left-to-right)"),
            GraphError::ConfigError { .. } => {
                Some("Check ~/.config/wfgraph/config.toml or the file passed with --config")
            }
        }
    }
}
