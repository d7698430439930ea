//! Cluster visibility view
//!
//! Computed on demand from an immutable cluster snapshot; there is no
//! shared mutable store behind it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feature key reporting whether advanced visibility is on
pub const ADVANCED_VISIBILITY_ENABLED_KEY: &str = "advancedVisibilityEnabled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityFeature {
    pub key: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibilityStore {
    #[serde(default)]
    pub features: Option<Vec<VisibilityFeature>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceInfo {
    #[serde(default)]
    pub visibility_store: Option<VisibilityStore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterData {
    #[serde(default)]
    pub persistence_info: Option<PersistenceInfo>,
}

/// Last known cluster fetch state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub data: Option<ClusterData>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub expiry_date_time: Option<DateTime<Utc>>,
}

/// Read-only view over a [`ClusterSnapshot`]
#[derive(Debug, Clone, Copy)]
pub struct ClusterView<'a> {
    snapshot: &'a ClusterSnapshot,
}

impl<'a> ClusterView<'a> {
    pub fn from_snapshot(snapshot: &'a ClusterSnapshot) -> Self {
        Self { snapshot }
    }

    /// Visibility store features; empty when the snapshot has none
    pub fn visibility_features(&self) -> &'a [VisibilityFeature] {
        self.snapshot
            .data
            .as_ref()
            .and_then(|d| d.persistence_info.as_ref())
            .and_then(|p| p.visibility_store.as_ref())
            .and_then(|v| v.features.as_deref())
            .unwrap_or(&[])
    }

    pub fn advanced_visibility_enabled(&self) -> bool {
        self.visibility_features()
            .iter()
            .find(|f| f.key == ADVANCED_VISIBILITY_ENABLED_KEY)
            .is_some_and(|f| f.enabled)
    }

    pub fn fetch_error(&self) -> Option<&'a str> {
        self.snapshot.error.as_deref()
    }

    pub fn fetch_expiry(&self) -> Option<DateTime<Utc>> {
        self.snapshot.expiry_date_time
    }

    /// True once the expiry has passed, or when there is none
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.snapshot.expiry_date_time.is_none_or(|expiry| expiry <= now)
    }
}
