//! Field filling: write values, optionally flatten, serialize

use crate::document::FormDocument;
use crate::error::{FormError, Result};
use crate::forms::{collect_fields, flatten, FormField};
use lopdf::Object;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Values to write, by field name, plus whether to flatten afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct FillRequest {
    /// Field name and raw value pairs, in caller order
    pub values: Vec<(String, String)>,
    /// Convert the form into static content after writing
    pub flatten: bool,
}

impl Default for FillRequest {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            flatten: true,
        }
    }
}

impl FillRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for a field
    pub fn value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Set the flatten flag
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Parse a JSON object of field name to value.
    ///
    /// String values are taken as-is, booleans and numbers are rendered as
    /// text and `null` becomes the empty string. Key order is preserved.
    pub fn from_json(json: &str, flatten: bool) -> Result<Self> {
        let parsed: Value = serde_json::from_str(json)
            .map_err(|e| FormError::InvalidInput(format!("fields is not valid JSON: {e}")))?;
        let Value::Object(map) = parsed else {
            return Err(FormError::InvalidInput(
                "fields must be a JSON object of field name to value".to_string(),
            ));
        };

        let values = map
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(FormError::InvalidInput(format!(
                            "value for field '{name}' must be a string"
                        )))
                    }
                };
                Ok((name, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { values, flatten })
    }
}

/// What a fill did with each requested name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    pub applied: Vec<String>,
    /// Names not present in the document or whose write failed
    pub skipped: Vec<String>,
    pub flattened: bool,
}

/// Output of [`fill`]
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub report: FillReport,
}

impl FormDocument {
    /// Ask viewers to rebuild field appearances from the stored values.
    pub fn set_need_appearances(&mut self, need: bool) {
        if let Some(acro_form) = self.acro_form_mut() {
            acro_form.set("NeedAppearances", Object::Boolean(need));
        }
    }

    /// Apply `request` to the form. Unknown names and failed writes are skipped.
    pub fn fill_fields(&mut self, request: &FillRequest) -> Result<FillReport> {
        self.set_need_appearances(true);

        let fields = collect_fields(self);
        let by_name: HashMap<&str, &FormField> =
            fields.iter().map(|field| (field.name.as_str(), field)).collect();

        let mut report = FillReport::default();
        for (name, value) in &request.values {
            let Some(field) = by_name.get(name.as_str()) else {
                debug!("No field named '{}', skipping", name);
                report.skipped.push(name.clone());
                continue;
            };

            match field.set_new_value(self, value) {
                Ok(()) => report.applied.push(name.clone()),
                Err(e) => {
                    debug!("Could not write field '{}': {}", name, e);
                    report.skipped.push(name.clone());
                }
            }
        }

        if request.flatten {
            flatten(self, &fields)?;
            report.flattened = true;
        }

        info!(
            "Filled {} fields ({} skipped, flatten: {})",
            report.applied.len(),
            report.skipped.len(),
            report.flattened
        );
        Ok(report)
    }
}

/// Open `bytes`, apply `request` and serialize the result into a new buffer.
pub fn fill(bytes: &[u8], password: Option<&str>, request: &FillRequest) -> Result<FilledDocument> {
    let mut form = FormDocument::open(bytes, password)?;
    let report = form.fill_fields(request)?;
    let bytes = form.into_bytes()?;
    Ok(FilledDocument { bytes, report })
}
