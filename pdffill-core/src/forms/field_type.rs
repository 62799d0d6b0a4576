//! Form field types according to ISO 32000-1 Section 12.7.4

use crate::forms::text_string::decode_text_string;
use crate::objects::resolve;
use lopdf::{Document, Object};
use serde::{Deserialize, Serialize};

/// Form type tag of a field (`/FT`)
///
/// Serialized as the PDF name with its leading slash, `Unknown` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Text field
    #[serde(rename = "/Tx")]
    Text,
    /// Button field (push button, checkbox, radio button)
    #[serde(rename = "/Btn")]
    Button,
    /// Choice field (list box, combo box)
    #[serde(rename = "/Ch")]
    Choice,
    /// Signature field
    #[serde(rename = "/Sig")]
    Signature,
    /// Missing or unrecognized `/FT`
    Unknown,
}

impl FieldKind {
    /// Get the PDF field type name
    pub fn pdf_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "Tx",
            FieldKind::Button => "Btn",
            FieldKind::Choice => "Ch",
            FieldKind::Signature => "Sig",
            FieldKind::Unknown => "Unknown",
        }
    }

    /// Map a `/FT` name to a kind
    pub fn from_pdf_name(name: &[u8]) -> Self {
        match name {
            b"Tx" => FieldKind::Text,
            b"Btn" => FieldKind::Button,
            b"Ch" => FieldKind::Choice,
            b"Sig" => FieldKind::Signature,
            _ => FieldKind::Unknown,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pdf_name())
    }
}

/// One entry of a choice field's `/Opt` array
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceOption {
    /// Plain entry: the display text doubles as the export value
    Single(Option<String>),
    /// `[export display]` pair
    Pair {
        export: Option<String>,
        display: Option<String>,
    },
}

impl ChoiceOption {
    /// Read an option entry, resolving indirect strings.
    pub fn from_object(doc: &Document, obj: &Object) -> Self {
        let text = |o: &Object| -> Option<String> {
            let o = resolve(doc, o);
            o.as_str().ok().map(decode_text_string)
        };

        match resolve(doc, obj) {
            Object::Array(items) if items.len() == 2 => ChoiceOption::Pair {
                export: text(&items[0]),
                display: text(&items[1]),
            },
            other => ChoiceOption::Single(text(other)),
        }
    }

    /// Display label, falling back to the export value and then to "".
    pub fn label(&self) -> String {
        match self {
            ChoiceOption::Single(text) => text.clone().unwrap_or_default(),
            ChoiceOption::Pair { export, display } => display
                .clone()
                .filter(|d| !d.is_empty())
                .or_else(|| export.clone())
                .unwrap_or_default(),
        }
    }
}

/// A field's type together with the data its adapter needs
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Text,
    Button,
    Choice { options: Vec<ChoiceOption> },
    Signature,
    Unknown,
}

impl FieldType {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldType::Text => FieldKind::Text,
            FieldType::Button => FieldKind::Button,
            FieldType::Choice { .. } => FieldKind::Choice,
            FieldType::Signature => FieldKind::Signature,
            FieldType::Unknown => FieldKind::Unknown,
        }
    }
}
