#![forbid(unsafe_code)]

use super::{UndoField, UndoMode, UndoOperation};
use serde::{Deserialize, Serialize};

/// Persisted form of one journal entry:
/// `{"mode": ..., "undo": ..., "fields": [[name, value, oldValue?], ...]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackInfo {
    pub mode: UndoMode,
    pub undo: UndoOperation,
    #[serde(default)]
    pub fields: Vec<UndoField>,
}

impl RollbackInfo {
    pub fn to_json_string(&self) -> Result<String, RollbackInfoError> {
        serde_json::to_string(self).map_err(RollbackInfoError)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, RollbackInfoError> {
        serde_json::from_str(raw).map_err(RollbackInfoError)
    }
}

#[derive(Debug)]
pub struct RollbackInfoError(pub serde_json::Error);

impl std::fmt::Display for RollbackInfoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid rollback info: {}", self.0)
    }
}

impl std::error::Error for RollbackInfoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
