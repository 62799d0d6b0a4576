//! Form field model and the descriptor reported to callers

use crate::forms::field_type::{FieldKind, FieldType};
use bitflags::bitflags;
use lopdf::ObjectId;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Field flags according to ISO 32000-1 Tables 221, 226, 228 and 230
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldFlags: u32 {
        const READ_ONLY = 1 << 0;
        const REQUIRED = 1 << 1;
        const NO_EXPORT = 1 << 2;
        const MULTILINE = 1 << 12;
        const PASSWORD = 1 << 13;
        const NO_TOGGLE_TO_OFF = 1 << 14;
        const RADIO = 1 << 15;
        const PUSHBUTTON = 1 << 16;
        const COMBO = 1 << 17;
        const EDIT = 1 << 18;
        const MULTI_SELECT = 1 << 21;
        const COMB = 1 << 24;
    }
}

impl FieldFlags {
    /// Build from the raw `/Ff` integer, ignoring bits this crate does not model
    pub fn from_raw(ff: i64) -> Self {
        Self::from_bits_truncate(ff as u32)
    }
}

/// A terminal field of the AcroForm field tree
#[derive(Debug, Clone)]
pub struct FormField {
    /// Object holding the field's `/T` and `/V`
    pub id: ObjectId,
    /// Fully qualified name, partial names joined with `.`
    pub name: String,
    pub field_type: FieldType,
    pub flags: FieldFlags,
    /// Human-readable stored value
    pub value: Option<String>,
    /// Inherited `/DA`, falling back to the form's default
    pub default_appearance: Option<String>,
    /// Inherited `/Q`: 0 left, 1 centered, 2 right
    pub quadding: i64,
    /// Widget annotations in document order; may be the field object itself
    pub widgets: Vec<ObjectId>,
}

impl FormField {
    pub fn kind(&self) -> FieldKind {
        self.field_type.kind()
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(FieldFlags::READ_ONLY)
    }

    pub fn is_required(&self) -> bool {
        self.flags.contains(FieldFlags::REQUIRED)
    }
}

/// Snapshot of one form field at inspection time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub value: Option<String>,
    pub options: Option<Vec<String>>,
    /// 1-based page of the first widget
    pub page: Option<u32>,
    /// `[llx, lly, urx, ury]` of the first widget
    pub rect: Option<[f32; 4]>,
    pub read_only: bool,
    pub required: bool,
}
