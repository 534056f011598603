#![forbid(unsafe_code)]

use crm_core::journal::{RollbackInfoError, UndoTransitionError};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    RollbackInfo(RollbackInfoError),
    InvalidInput(&'static str),
    UnknownField {
        info_area_id: String,
        field_id: i32,
    },
    UnknownLink {
        info_area_id: String,
        target_info_area_id: String,
        link_id: i32,
    },
    AmbiguousRecord {
        identification: String,
        rows: usize,
    },
    EmptyJournal {
        request_nr: i64,
    },
    InvalidTransition(UndoTransitionError),
    MissingRow {
        identification: String,
    },
}

impl StoreError {
    /// Non-zero status reported to callers that still speak integer codes.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Sql(_) => 1,
            Self::Io(_) => 2,
            Self::RollbackInfo(_) => 3,
            Self::InvalidInput(_) => 4,
            Self::UnknownField { .. } | Self::UnknownLink { .. } => 5,
            Self::AmbiguousRecord { .. } => 6,
            Self::EmptyJournal { .. } => 7,
            Self::InvalidTransition(_) => 8,
            Self::MissingRow { .. } => 9,
        }
    }
}

/// `0` on success, otherwise [`StoreError::status_code`].
pub fn status_of<T>(result: &Result<T, StoreError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => err.status_code(),
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::RollbackInfo(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownField {
                info_area_id,
                field_id,
            } => write!(f, "no column for field {info_area_id}.{field_id}"),
            Self::UnknownLink {
                info_area_id,
                target_info_area_id,
                link_id,
            } => write!(
                f,
                "no link column from {info_area_id} to {target_info_area_id} (link_id={link_id})"
            ),
            Self::AmbiguousRecord {
                identification,
                rows,
            } => write!(
                f,
                "record {identification} matches {rows} cached rows; refusing to capture pre-image"
            ),
            Self::EmptyJournal { request_nr } => {
                write!(f, "undo request {request_nr} has no records")
            }
            Self::InvalidTransition(err) => write!(f, "{err}"),
            Self::MissingRow { identification } => {
                write!(f, "record {identification} is no longer cached; cannot restore it")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::RollbackInfo(err) => Some(err),
            Self::InvalidTransition(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<RollbackInfoError> for StoreError {
    fn from(value: RollbackInfoError) -> Self {
        Self::RollbackInfo(value)
    }
}

impl From<UndoTransitionError> for StoreError {
    fn from(value: UndoTransitionError) -> Self {
        Self::InvalidTransition(value)
    }
}
