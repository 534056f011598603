#![forbid(unsafe_code)]

use crate::ids::InfoAreaId;
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

/// One field's pending change: the value it should hold and the value it held
/// before the first unflushed edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldValue {
    info_area_id: InfoAreaId,
    field_id: i32,
    value: String,
    old_value: Option<String>,
    changed: bool,
    only_offline: bool,
    original_date: Option<String>,
    original_time: Option<String>,
}

impl FieldValue {
    /// A value as read from the cache, carrying no change.
    pub fn unchanged(info_area_id: InfoAreaId, field_id: i32, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            info_area_id,
            field_id,
            old_value: Some(value.clone()),
            value,
            changed: false,
            only_offline: false,
            original_date: None,
            original_time: None,
        }
    }

    pub fn set_change(
        info_area_id: InfoAreaId,
        field_id: i32,
        new_value: impl Into<String>,
        old_value: Option<String>,
        only_offline: bool,
    ) -> Self {
        Self {
            info_area_id,
            field_id,
            value: new_value.into(),
            old_value,
            changed: true,
            only_offline,
            original_date: None,
            original_time: None,
        }
    }

    /// Remembers the unconverted local date/time this value was derived from.
    pub fn with_original_date_time(mut self, date: Option<String>, time: Option<String>) -> Self {
        self.original_date = date;
        self.original_time = time;
        self
    }

    pub fn info_area_id(&self) -> &InfoAreaId {
        &self.info_area_id
    }

    pub fn field_id(&self) -> i32 {
        self.field_id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn old_value(&self) -> Option<&str> {
        self.old_value.as_deref()
    }

    pub fn only_offline(&self) -> bool {
        self.only_offline
    }

    pub fn original_date(&self) -> Option<&str> {
        self.original_date.as_deref()
    }

    pub fn original_time(&self) -> Option<&str> {
        self.original_time.as_deref()
    }

    pub fn is_change(&self) -> bool {
        self.changed
    }

    /// True when the value differs from its baseline.
    pub fn has_change(&self) -> bool {
        self.changed && self.old_value.as_deref() != Some(self.value.as_str())
    }

    /// Continues the edit chain when `old_value` is the value this field
    /// currently holds. A mismatch means the caller edited a stale copy.
    pub fn try_merge_change(
        &mut self,
        new_value: impl Into<String>,
        old_value: Option<&str>,
        only_offline: bool,
    ) -> bool {
        if old_value.unwrap_or_default() != self.value {
            return false;
        }
        if !self.changed {
            self.old_value = Some(self.value.clone());
            self.changed = true;
            self.only_offline = only_offline;
        } else {
            self.only_offline = self.only_offline && only_offline;
        }
        self.value = new_value.into();
        true
    }

    pub fn to_wire_value(&self) -> Option<WireFieldValue> {
        if self.only_offline || !self.has_change() {
            return None;
        }
        Some(WireFieldValue {
            field_id: self.field_id,
            value: self.value.clone(),
            old_value: self.old_value.clone(),
        })
    }

    /// The server accepted the change; the current value becomes the baseline.
    pub fn mark_flushed(&mut self) {
        self.old_value = Some(self.value.clone());
        self.changed = false;
        self.original_date = None;
        self.original_time = None;
    }
}

/// `[fieldId, newValue, oldValue]` on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFieldValue {
    pub field_id: i32,
    pub value: String,
    pub old_value: Option<String>,
}

impl Serialize for WireFieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.field_id)?;
        tuple.serialize_element(&self.value)?;
        tuple.serialize_element(&self.old_value)?;
        tuple.end()
    }
}

/// Raised when a change does not continue the field's current edit chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldConflict {
    pub field_id: i32,
    pub current: String,
    pub expected: Option<String>,
}

impl std::fmt::Display for FieldConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "conflicting edit on field {} (current={:?}, expected={:?})",
            self.field_id, self.current, self.expected
        )
    }
}

impl std::error::Error for FieldConflict {}
