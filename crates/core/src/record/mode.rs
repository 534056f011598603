#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The operation a pending [`Record`](super::Record) asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordMode {
    New,
    Update,
    Delete,
    Sync,
    NewOffline,
    UpdateOffline,
    ParentUpdate,
}

impl RecordMode {
    pub const ALL: [RecordMode; 7] = [
        RecordMode::New,
        RecordMode::Update,
        RecordMode::Delete,
        RecordMode::Sync,
        RecordMode::NewOffline,
        RecordMode::UpdateOffline,
        RecordMode::ParentUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordMode::New => "New",
            RecordMode::Update => "Update",
            RecordMode::Delete => "Delete",
            RecordMode::Sync => "Sync",
            RecordMode::NewOffline => "NewOffline",
            RecordMode::UpdateOffline => "UpdateOffline",
            RecordMode::ParentUpdate => "ParentUpdate",
        }
    }

    pub fn parse(value: &str) -> Result<Self, RecordModeError> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value)
            .ok_or_else(|| RecordModeError(value.to_string()))
    }

    /// Modes that only ever touch the local cache.
    pub fn is_offline_only(self) -> bool {
        matches!(self, RecordMode::NewOffline | RecordMode::UpdateOffline)
    }

    pub fn creates(self) -> bool {
        matches!(self, RecordMode::New | RecordMode::NewOffline)
    }

    pub fn updates(self) -> bool {
        matches!(
            self,
            RecordMode::Update | RecordMode::UpdateOffline | RecordMode::ParentUpdate
        )
    }
}

impl std::fmt::Display for RecordMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordMode {
    type Err = RecordModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for RecordMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordModeError(pub String);

impl std::fmt::Display for RecordModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown record mode: {}", self.0)
    }
}

impl std::error::Error for RecordModeError {}
