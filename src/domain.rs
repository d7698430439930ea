//! Domain archival view helpers
//!
//! Read-only helpers over a domain description snapshot.

use serde::{Deserialize, Serialize};

/// Entry of a status filter list (e.g. `{ value: "-1", label: "All" }`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOption {
    pub value: String,
    #[serde(default)]
    pub label: String,
}

impl StatusOption {
    pub fn new(value: &str, label: &str) -> Self {
        Self { value: value.to_string(), label: label.to_string() }
    }
}

/// Entry matching `status_value`, else the first (default) entry
pub fn get_status<'a>(status_list: &'a [StatusOption], status_value: Option<&str>) -> Option<&'a StatusOption> {
    status_value
        .and_then(|value| status_list.iter().find(|option| option.value == value))
        .or_else(|| status_list.first())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchivalStatus {
    Enabled,
    Disabled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfiguration {
    #[serde(default)]
    pub history_archival_status: Option<ArchivalStatus>,
    #[serde(default, rename = "historyArchivalURI")]
    pub history_archival_uri: Option<String>,
    #[serde(default)]
    pub visibility_archival_status: Option<ArchivalStatus>,
    #[serde(default, rename = "visibilityArchivalURI")]
    pub visibility_archival_uri: Option<String>,
    #[serde(default)]
    pub workflow_execution_retention_period_in_days: Option<u32>,
}

/// Domain description as returned by the backend (only what we read)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainSettings {
    #[serde(default)]
    pub configuration: Option<DomainConfiguration>,
}

pub fn is_history_archival_enabled(settings: Option<&DomainSettings>) -> bool {
    settings
        .and_then(|s| s.configuration.as_ref())
        .and_then(|c| c.history_archival_status)
        == Some(ArchivalStatus::Enabled)
}

pub fn is_visibility_archival_enabled(settings: Option<&DomainSettings>) -> bool {
    settings
        .and_then(|s| s.configuration.as_ref())
        .and_then(|c| c.visibility_archival_status)
        == Some(ArchivalStatus::Enabled)
}
