#![forbid(unsafe_code)]

use crate::ids::{InfoAreaId, RecordIdentification};
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

/// Link id used when the caller does not name a specific relationship.
pub const DEFAULT_LINK_ID: i32 = -1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    target: RecordIdentification,
    link_id: i32,
    only_offline: bool,
}

impl Link {
    pub fn new(target: RecordIdentification, link_id: i32) -> Self {
        Self {
            target,
            link_id,
            only_offline: false,
        }
    }

    pub fn offline(target: RecordIdentification, link_id: i32) -> Self {
        Self {
            target,
            link_id,
            only_offline: true,
        }
    }

    pub fn target(&self) -> &RecordIdentification {
        &self.target
    }

    pub fn target_info_area_id(&self) -> &InfoAreaId {
        self.target.info_area_id()
    }

    pub fn link_id(&self) -> i32 {
        self.link_id
    }

    pub fn is_default_link(&self) -> bool {
        self.link_id < 0
    }

    pub fn only_offline(&self) -> bool {
        self.only_offline
    }

    /// Two links with the same slot describe the same relationship.
    pub fn same_slot(&self, other: &Link) -> bool {
        self.target_info_area_id() == other.target_info_area_id() && self.link_id == other.link_id
    }

    pub fn to_wire_link(&self) -> Option<WireLink> {
        if self.only_offline {
            return None;
        }
        Some(WireLink {
            identification: self.target.to_string(),
            link_id: self.link_id,
        })
    }
}

/// `[recordIdentification, linkId]` on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireLink {
    pub identification: String,
    pub link_id: i32,
}

impl Serialize for WireLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.identification)?;
        tuple.serialize_element(&self.link_id)?;
        tuple.end()
    }
}
