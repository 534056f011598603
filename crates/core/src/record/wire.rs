#![forbid(unsafe_code)]

use super::{RecordMode, WireFieldValue, WireLink};
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

/// `[mode, recordIdentification, fieldValues|null, links|null, options|null]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModifyRequest {
    pub mode: RecordMode,
    pub identification: String,
    pub field_values: Option<Vec<WireFieldValue>>,
    pub links: Option<Vec<WireLink>>,
    pub options: Option<ModifyOptions>,
}

impl ModifyRequest {
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Serialize for ModifyRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&self.mode)?;
        tuple.serialize_element(&self.identification)?;
        tuple.serialize_element(&self.field_values)?;
        tuple.serialize_element(&self.links)?;
        tuple.serialize_element(&self.options)?;
        tuple.end()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_fields: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_record: Option<String>,
}

impl ModifyOptions {
    pub fn is_empty(&self) -> bool {
        self.key_fields.is_none() && self.referenced_record.is_none()
    }
}

pub(super) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}
