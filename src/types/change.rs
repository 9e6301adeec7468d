//! Change notifications delivered by a lead store subscription

use serde::{Deserialize, Serialize};

use super::Lead;

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "insert"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// A single change notification. For deletes only `record.id` is
/// meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: Lead,
}

impl ChangeEvent {
    pub fn insert(record: Lead) -> Self {
        Self { kind: ChangeKind::Insert, record }
    }

    pub fn update(record: Lead) -> Self {
        Self { kind: ChangeKind::Update, record }
    }

    pub fn delete(record: Lead) -> Self {
        Self { kind: ChangeKind::Delete, record }
    }
}
