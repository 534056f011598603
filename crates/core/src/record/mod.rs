#![forbid(unsafe_code)]

mod field_value;
mod link;
mod mode;
mod wire;

pub use field_value::*;
pub use link::*;
pub use mode::*;
pub use wire::*;

use crate::ids::{InfoAreaId, RecordIdentification, is_offline_record_id};
use std::collections::BTreeMap;

/// One logical edit of one CRM record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    info_area_id: InfoAreaId,
    record_id: Option<String>,
    mode: Option<RecordMode>,
    deleted: bool,
    values: BTreeMap<i32, FieldValue>,
    links: Vec<Link>,
    key_fields: Option<Vec<i32>>,
    referenced: Option<RecordIdentification>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueMerge {
    Inserted,
    Merged,
    Replaced,
}

impl Record {
    pub fn new(info_area_id: InfoAreaId, record_id: Option<String>, mode: Option<RecordMode>) -> Self {
        Self {
            info_area_id,
            record_id,
            mode,
            deleted: false,
            values: BTreeMap::new(),
            links: Vec::new(),
            key_fields: None,
            referenced: None,
        }
    }

    pub fn create(info_area_id: InfoAreaId) -> Self {
        Self::new(info_area_id, None, Some(RecordMode::New))
    }

    pub fn update(identification: RecordIdentification) -> Self {
        Self::with_identification(identification, RecordMode::Update)
    }

    pub fn delete(identification: RecordIdentification) -> Self {
        Self::with_identification(identification, RecordMode::Delete)
    }

    pub fn with_identification(identification: RecordIdentification, mode: RecordMode) -> Self {
        Self::new(
            identification.info_area_id().clone(),
            Some(identification.record_id().to_string()),
            Some(mode),
        )
    }

    pub fn info_area_id(&self) -> &InfoAreaId {
        &self.info_area_id
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn mode(&self) -> Option<RecordMode> {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Option<RecordMode>) {
        self.mode = mode;
    }

    pub fn is_new(&self) -> bool {
        self.record_id.is_none() || self.mode == Some(RecordMode::New)
    }

    /// No server-side counterpart exists yet.
    pub fn is_unpersisted(&self) -> bool {
        self.is_new() || self.record_id.as_deref().is_some_and(is_offline_record_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub fn identification(&self) -> Option<RecordIdentification> {
        self.record_id
            .as_ref()
            .map(|id| RecordIdentification::new(self.info_area_id.clone(), id.clone()))
    }

    /// The cache assigned an id to a record created locally.
    pub fn assign_record_id(&mut self, record_id: impl Into<String>) {
        self.record_id = Some(record_id.into());
    }

    pub fn key_fields(&self) -> Option<&[i32]> {
        self.key_fields.as_deref()
    }

    pub fn set_key_fields(&mut self, key_fields: Vec<i32>) {
        self.key_fields = Some(key_fields);
    }

    pub fn referenced_record(&self) -> Option<&RecordIdentification> {
        self.referenced.as_ref()
    }

    pub fn set_referenced_record(&mut self, referenced: RecordIdentification) {
        self.referenced = Some(referenced);
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.values.values()
    }

    pub fn value(&self, field_id: i32) -> Option<&FieldValue> {
        self.values.get(&field_id)
    }

    pub fn changed_values(&self) -> impl Iterator<Item = &FieldValue> {
        self.values.values().filter(|value| value.has_change())
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn set_value(
        &mut self,
        field_id: i32,
        new_value: impl Into<String>,
        old_value: Option<String>,
    ) -> ValueMerge {
        let value = FieldValue::set_change(
            self.info_area_id.clone(),
            field_id,
            new_value,
            old_value,
            false,
        );
        self.add_value(value)
    }

    /// Adds a change, extending an existing edit chain for the same field
    /// when the new change continues it and replacing it otherwise.
    pub fn add_value(&mut self, value: FieldValue) -> ValueMerge {
        let Some(existing) = self.values.get_mut(&value.field_id()) else {
            self.values.insert(value.field_id(), value);
            return ValueMerge::Inserted;
        };
        if value.is_change()
            && existing.try_merge_change(value.value(), value.old_value(), value.only_offline())
        {
            return ValueMerge::Merged;
        }
        *existing = value;
        ValueMerge::Replaced
    }

    /// Like [`Record::add_value`] but refuses to overwrite a diverged chain.
    pub fn merge_value(&mut self, value: FieldValue) -> Result<ValueMerge, FieldConflict> {
        if let Some(existing) = self.values.get(&value.field_id())
            && existing.value() != value.old_value().unwrap_or_default()
        {
            return Err(FieldConflict {
                field_id: value.field_id(),
                current: existing.value().to_string(),
                expected: value.old_value().map(str::to_string),
            });
        }
        Ok(self.add_value(value))
    }

    pub fn add_link(&mut self, link: Link) {
        if let Some(existing) = self.links.iter_mut().find(|l| l.same_slot(&link)) {
            *existing = link;
        } else {
            self.links.push(link);
        }
    }

    /// Combines two edits of the same record queued before a flush.
    pub fn merged_with(&self, other: &Record) -> Record {
        match (self.mode, other.mode) {
            (None | Some(RecordMode::Delete), _) => return self.clone(),
            (_, Some(RecordMode::Delete)) | (Some(RecordMode::Sync), _) => return other.clone(),
            (_, Some(RecordMode::Sync)) => return self.clone(),
            _ => {}
        }

        let mut merged = Record::new(self.info_area_id.clone(), self.record_id.clone(), self.mode);
        merged.deleted = self.deleted || other.deleted;
        merged.key_fields = self.key_fields.clone().or_else(|| other.key_fields.clone());
        merged.referenced = self.referenced.clone().or_else(|| other.referenced.clone());
        for link in self.links.iter().chain(other.links.iter()) {
            merged.add_link(link.clone());
        }
        for value in self.values.values().chain(other.values.values()) {
            merged.add_value(value.clone());
        }
        merged
    }

    pub fn wire_identification(&self) -> String {
        match self.identification() {
            Some(identification) => identification.to_string(),
            None => self.info_area_id.to_string(),
        }
    }

    /// Builds the server payload, or `None` when nothing must be sent.
    pub fn to_modify_request(&self) -> Option<ModifyRequest> {
        let mode = self.mode;
        if mode.is_some_and(RecordMode::is_offline_only) {
            return None;
        }

        if mode == Some(RecordMode::Delete) {
            if !self.identification().is_some_and(|id| id.looks_persisted()) {
                return None;
            }
            return Some(self.request(RecordMode::Delete, false));
        }

        if let Some(mode) = mode
            && !matches!(mode, RecordMode::Update | RecordMode::New)
        {
            return Some(self.request(mode, true));
        }

        if self.is_unpersisted() {
            if self.deleted {
                return None;
            }
            return Some(self.request(RecordMode::New, true));
        }

        if self.deleted {
            return Some(self.request(RecordMode::Delete, false));
        }

        let request = self.request(RecordMode::Update, true);
        if request.field_values.is_none() && request.links.is_none() {
            return Some(ModifyRequest {
                mode: RecordMode::Sync,
                ..request
            });
        }
        Some(request)
    }

    fn request(&self, mode: RecordMode, with_values: bool) -> ModifyRequest {
        let field_values = if with_values {
            wire::non_empty(
                self.values
                    .values()
                    .filter_map(FieldValue::to_wire_value)
                    .collect(),
            )
        } else {
            None
        };
        let links = wire::non_empty(self.links.iter().filter_map(Link::to_wire_link).collect());
        let options = ModifyOptions {
            key_fields: self.key_fields.clone(),
            referenced_record: self.referenced.as_ref().map(ToString::to_string),
        };
        ModifyRequest {
            mode,
            identification: self.wire_identification(),
            field_values,
            links,
            options: (!options.is_empty()).then_some(options),
        }
    }

    /// The server applied this record; remaining state is the new baseline.
    pub fn mark_flushed(&mut self) {
        for value in self.values.values_mut() {
            value.mark_flushed();
        }
        self.links.clear();
        if self.mode.is_some_and(|mode| mode.creates() || mode.updates()) {
            self.mode = None;
        }
    }
}
