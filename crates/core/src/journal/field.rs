#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// One physical column's value after the tracked change and the value it
/// held before it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Option<String>>", into = "Vec<Option<String>>")]
pub struct UndoField {
    pub name: String,
    pub value: Option<String>,
    pub old_value: Option<String>,
}

impl UndoField {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            old_value: None,
        }
    }

    pub fn with_old_value(mut self, old_value: Option<String>) -> Self {
        self.old_value = old_value;
        self
    }
}

impl From<UndoField> for Vec<Option<String>> {
    fn from(field: UndoField) -> Self {
        let mut out = vec![Some(field.name), field.value];
        if field.old_value.is_some() {
            out.push(field.old_value);
        }
        out
    }
}

impl TryFrom<Vec<Option<String>>> for UndoField {
    type Error = &'static str;

    fn try_from(entry: Vec<Option<String>>) -> Result<Self, Self::Error> {
        if !(2..=3).contains(&entry.len()) {
            return Err("undo field must be [name, value] or [name, value, oldValue]");
        }
        let mut parts = entry.into_iter();
        let Some(Some(name)) = parts.next() else {
            return Err("undo field name must be a string");
        };
        let value = parts.next().flatten();
        let old_value = parts.next().flatten();
        Ok(Self {
            name,
            value,
            old_value,
        })
    }
}
