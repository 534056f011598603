#![forbid(unsafe_code)]

mod datetime;
pub mod journal;
mod record;

pub use datetime::*;
pub use record::*;

pub mod ids {
    /// Prefix carried by record ids that were assigned locally and never
    /// acknowledged by the server.
    pub const OFFLINE_RECORD_ID_PREFIX: &str = "new";

    /// Identifications shorter than this cannot name a record the server knows.
    pub const MIN_PERSISTED_IDENTIFICATION_LEN: usize = 10;

    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct InfoAreaId(String);

    impl InfoAreaId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, RecordIdentificationError> {
            let value = value.into();
            validate_info_area_id(&value)?;
            Ok(Self(value))
        }
    }

    impl std::fmt::Display for InfoAreaId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// `InfoAreaId.RecordId`, the key a record is journaled and merged under.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct RecordIdentification {
        info_area_id: InfoAreaId,
        record_id: String,
    }

    impl RecordIdentification {
        pub fn new(info_area_id: InfoAreaId, record_id: impl Into<String>) -> Self {
            Self {
                info_area_id,
                record_id: record_id.into(),
            }
        }

        pub fn parse(value: &str) -> Result<Self, RecordIdentificationError> {
            let value = value.trim();
            let Some((info_area, record_id)) = value.split_once('.') else {
                return Err(RecordIdentificationError::MissingSeparator);
            };
            if record_id.is_empty() {
                return Err(RecordIdentificationError::EmptyRecordId);
            }
            Ok(Self {
                info_area_id: InfoAreaId::try_new(info_area)?,
                record_id: record_id.to_string(),
            })
        }

        pub fn info_area_id(&self) -> &InfoAreaId {
            &self.info_area_id
        }

        pub fn record_id(&self) -> &str {
            &self.record_id
        }

        pub fn is_offline(&self) -> bool {
            is_offline_record_id(&self.record_id)
        }

        /// Heuristic used by the wire protocol: offline ids and short
        /// identifications were never handed out by the server.
        pub fn looks_persisted(&self) -> bool {
            !self.is_offline() && self.to_string().len() >= MIN_PERSISTED_IDENTIFICATION_LEN
        }
    }

    impl std::fmt::Display for RecordIdentification {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}.{}", self.info_area_id, self.record_id)
        }
    }

    pub fn is_offline_record_id(record_id: &str) -> bool {
        record_id.starts_with(OFFLINE_RECORD_ID_PREFIX)
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum RecordIdentificationError {
        EmptyInfoArea,
        InvalidInfoAreaChar { ch: char, index: usize },
        MissingSeparator,
        EmptyRecordId,
    }

    impl RecordIdentificationError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::EmptyInfoArea => "info area id must not be empty",
                Self::InvalidInfoAreaChar { .. } => "info area id must be alphanumeric",
                Self::MissingSeparator => "record identification must be InfoAreaId.RecordId",
                Self::EmptyRecordId => "record id must not be empty",
            }
        }
    }

    impl std::fmt::Display for RecordIdentificationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::InvalidInfoAreaChar { ch, index } => {
                    write!(f, "{} (ch={ch:?}, index={index})", self.message())
                }
                other => f.write_str(other.message()),
            }
        }
    }

    impl std::error::Error for RecordIdentificationError {}

    fn validate_info_area_id(value: &str) -> Result<(), RecordIdentificationError> {
        if value.is_empty() {
            return Err(RecordIdentificationError::EmptyInfoArea);
        }
        for (index, ch) in value.chars().enumerate() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                continue;
            }
            return Err(RecordIdentificationError::InvalidInfoAreaChar { ch, index });
        }
        Ok(())
    }
}
