//! Field inspection: a read-only snapshot of every form field

use crate::document::FormDocument;
use crate::error::Result;
use crate::forms::{collect_fields, FieldDescriptor, FormField};
use tracing::info;

impl FormDocument {
    /// Describe every field of the form, in field tree order.
    ///
    /// A document without an AcroForm has no fields.
    pub fn inspect_fields(&self) -> Vec<FieldDescriptor> {
        let descriptors: Vec<FieldDescriptor> = collect_fields(self)
            .iter()
            .map(|field| describe(self, field))
            .collect();
        info!("Inspected {} form fields", descriptors.len());
        descriptors
    }
}

fn describe(form: &FormDocument, field: &FormField) -> FieldDescriptor {
    FieldDescriptor {
        name: field.name.clone(),
        kind: field.kind(),
        value: field.value.clone(),
        options: field.fill_options(),
        page: field.page_number(form),
        rect: field.position(form),
        read_only: field.is_read_only(),
        required: field.is_required(),
    }
}

/// Open `bytes` and describe its form fields.
pub fn inspect(bytes: &[u8], password: Option<&str>) -> Result<Vec<FieldDescriptor>> {
    let form = FormDocument::open(bytes, password)?;
    Ok(form.inspect_fields())
}
