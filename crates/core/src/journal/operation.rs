#![forbid(unsafe_code)]

use crate::record::{Record, RecordMode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The statement that restores a pre-image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UndoAction {
    Insert,
    Update,
    Delete,
}

impl UndoAction {
    pub fn as_str(self) -> &'static str {
        match self {
            UndoAction::Insert => "Insert",
            UndoAction::Update => "Update",
            UndoAction::Delete => "Delete",
        }
    }
}

/// Where a journal entry stands. Entries start `Uncommitted`, are checked
/// against the cache exactly once, and end in `Done(_)` after reversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UndoOperation {
    Uncommitted,
    Pending(UndoAction),
    Ignore,
    Done(UndoAction),
}

impl UndoOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            UndoOperation::Uncommitted => "Uncommitted",
            UndoOperation::Pending(action) => action.as_str(),
            UndoOperation::Ignore => "Ignore",
            UndoOperation::Done(UndoAction::Insert) => "DoneInsert",
            UndoOperation::Done(UndoAction::Update) => "DoneUpdate",
            UndoOperation::Done(UndoAction::Delete) => "DoneDelete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "Uncommitted" => UndoOperation::Uncommitted,
            "Insert" => UndoOperation::Pending(UndoAction::Insert),
            "Update" => UndoOperation::Pending(UndoAction::Update),
            "Delete" => UndoOperation::Pending(UndoAction::Delete),
            "Ignore" => UndoOperation::Ignore,
            "DoneInsert" => UndoOperation::Done(UndoAction::Insert),
            "DoneUpdate" => UndoOperation::Done(UndoAction::Update),
            "DoneDelete" => UndoOperation::Done(UndoAction::Delete),
            _ => return None,
        })
    }

    pub fn is_done(self) -> bool {
        matches!(self, UndoOperation::Done(_))
    }

    /// Columns may only be added while no pre-image has been captured.
    pub fn edited(self) -> Result<Self, UndoTransitionError> {
        match self {
            UndoOperation::Uncommitted => Ok(self),
            from => Err(UndoTransitionError { from, to: "edited" }),
        }
    }

    /// Result of comparing the entry with the cache before the write.
    pub fn checked(self, action: Option<UndoAction>) -> Result<Self, UndoTransitionError> {
        match self {
            UndoOperation::Uncommitted => Ok(match action {
                Some(action) => UndoOperation::Pending(action),
                None => UndoOperation::Ignore,
            }),
            from => Err(UndoTransitionError { from, to: "checked" }),
        }
    }

    /// A row created by the protected write exists now and must be removed on undo.
    pub fn materialized(self) -> Result<Self, UndoTransitionError> {
        match self {
            UndoOperation::Uncommitted
            | UndoOperation::Ignore
            | UndoOperation::Pending(UndoAction::Delete) => {
                Ok(UndoOperation::Pending(UndoAction::Delete))
            }
            from => Err(UndoTransitionError {
                from,
                to: "materialized",
            }),
        }
    }

    pub fn completed(self) -> Result<Self, UndoTransitionError> {
        match self {
            UndoOperation::Pending(action) => Ok(UndoOperation::Done(action)),
            from => Err(UndoTransitionError {
                from,
                to: "completed",
            }),
        }
    }
}

impl std::fmt::Display for UndoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UndoOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UndoOperation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown undo operation: {raw}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UndoTransitionError {
    pub from: UndoOperation,
    pub to: &'static str,
}

impl std::fmt::Display for UndoTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal undo transition ({} -> {})", self.from, self.to)
    }
}

impl std::error::Error for UndoTransitionError {}

/// The journal's view of a record's mode, including the two outcomes only a
/// cache check can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UndoMode {
    New,
    Update,
    UpdateNew,
    Delete,
    DeleteIgnore,
    Sync,
}

impl UndoMode {
    pub fn for_record(record: &Record) -> Self {
        if record.mode() == Some(RecordMode::Delete) || record.is_deleted() {
            return UndoMode::Delete;
        }
        match record.mode() {
            Some(RecordMode::Sync) => UndoMode::Sync,
            _ if record.identification().is_none() => UndoMode::New,
            Some(mode) if mode.creates() => UndoMode::New,
            _ => UndoMode::Update,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UndoMode::New => "New",
            UndoMode::Update => "Update",
            UndoMode::UpdateNew => "UpdateNew",
            UndoMode::Delete => "Delete",
            UndoMode::DeleteIgnore => "DeleteIgnore",
            UndoMode::Sync => "Sync",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "New" => UndoMode::New,
            "Update" => UndoMode::Update,
            "UpdateNew" => UndoMode::UpdateNew,
            "Delete" => UndoMode::Delete,
            "DeleteIgnore" => UndoMode::DeleteIgnore,
            "Sync" => UndoMode::Sync,
            _ => return None,
        })
    }
}

impl std::fmt::Display for UndoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UndoMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UndoMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown undo mode: {raw}")))
    }
}
