//! Interactive form fields (ISO 32000-1 Section 12.7)
//!
//! Field tree traversal, per-kind value writes, appearance regeneration
//! and flattening.

mod acro_form;
mod adapter;
mod appearance;
mod field;
mod field_type;
mod flatten;
mod text_string;

pub use acro_form::{collect_fields, DEFAULT_APPEARANCE};
pub use adapter::{button_state, OFF_STATE, ON_STATE};
pub use appearance::{regenerate, text_content, DefaultAppearance};
pub use field::{FieldDescriptor, FieldFlags, FormField};
pub use field_type::{ChoiceOption, FieldKind, FieldType};
pub use flatten::{flatten, remaining_widgets};
pub use text_string::{decode_text_string, encode_text_string};
