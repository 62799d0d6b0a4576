//! Per-kind value coercion, option and placement extraction

use crate::document::FormDocument;
use crate::error::Result;
use crate::forms::appearance;
use crate::forms::field::{FieldFlags, FormField};
use crate::forms::field_type::FieldType;
use crate::forms::text_string::encode_text_string;
use crate::objects::{array_items, entry, number_array};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

/// Appearance state of a checked checkbox or radio button
pub const ON_STATE: &str = "Yes";
/// Appearance state of an unchecked checkbox or radio button
pub const OFF_STATE: &str = "Off";

/// Map a raw value to a button state: parsed `false` is off, everything else on.
pub fn button_state(raw: &str) -> &'static str {
    if raw.trim().eq_ignore_ascii_case("false") {
        OFF_STATE
    } else {
        ON_STATE
    }
}

impl FormField {
    /// Write `raw` into the field, coerced for the field's kind.
    pub fn set_new_value(&self, form: &mut FormDocument, raw: &str) -> Result<()> {
        match &self.field_type {
            FieldType::Button => {
                let state = button_state(raw);
                debug!("Setting button '{}' to {}", self.name, state);
                self.write_button_state(form.document_mut(), state)
            }
            FieldType::Text | FieldType::Choice { .. } => {
                debug!("Setting '{}' to {:?}", self.name, raw);
                self.write_value(form.document_mut(), raw)?;
                appearance::regenerate(form, self, raw)
            }
            FieldType::Signature | FieldType::Unknown => {
                debug!("Setting {} field '{}' verbatim", self.kind(), self.name);
                self.write_value(form.document_mut(), raw)
            }
        }
    }

    fn write_value(&self, doc: &mut Document, raw: &str) -> Result<()> {
        let dict = doc.get_object_mut(self.id)?.as_dict_mut()?;
        dict.set("V", encode_text_string(raw));
        Ok(())
    }

    fn write_button_state(&self, doc: &mut Document, state: &str) -> Result<()> {
        doc.get_object_mut(self.id)?
            .as_dict_mut()?
            .set("V", Object::Name(state.as_bytes().to_vec()));

        let radio = self.flags.contains(FieldFlags::RADIO);
        for &widget in &self.widgets {
            let shown = if state == OFF_STATE || has_appearance_state(doc, widget, state) {
                state
            } else if !radio && appearance::add_on_state(doc, widget)? {
                state
            } else {
                OFF_STATE
            };
            if let Ok(dict) = doc.get_object_mut(widget).and_then(Object::as_dict_mut) {
                dict.set("AS", Object::Name(shown.as_bytes().to_vec()));
            }
        }
        Ok(())
    }

    /// Display labels of a choice field, in stored order.
    ///
    /// `None` for other kinds and for choice fields without options.
    pub fn fill_options(&self) -> Option<Vec<String>> {
        match &self.field_type {
            FieldType::Choice { options } if !options.is_empty() => {
                Some(options.iter().map(|option| option.label()).collect())
            }
            _ => None,
        }
    }

    /// 1-based page of the first widget.
    pub fn page_number(&self, form: &FormDocument) -> Option<u32> {
        let widget = *self.widgets.first()?;
        let doc = form.document();
        let dict = doc.get_object(widget).and_then(Object::as_dict).ok()?;

        if let Ok(Object::Reference(page_id)) = dict.get(b"P") {
            if let Some(number) = form.page_number(*page_id) {
                return Some(number);
            }
        }

        // No usable /P: find the page listing the widget among its annotations
        form.page_ids().into_iter().find_map(|page_id| {
            let page = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
            let annots = page.get(b"Annots").ok()?;
            array_items(doc, annots)
                .iter()
                .any(|annot| matches!(annot, Object::Reference(id) if *id == widget))
                .then(|| form.page_number(page_id))
                .flatten()
        })
    }

    /// `[llx, lly, urx, ury]` of the first widget.
    pub fn position(&self, form: &FormDocument) -> Option<[f32; 4]> {
        let widget = *self.widgets.first()?;
        let rect = widget_rect(form.document(), widget);
        if rect.is_none() {
            warn!("Field '{}' has no usable widget rectangle", self.name);
        }
        rect
    }
}

/// Rectangle of a widget annotation, when it decodes to exactly four numbers.
pub(crate) fn widget_rect(doc: &Document, widget: ObjectId) -> Option<[f32; 4]> {
    let dict = doc.get_object(widget).and_then(Object::as_dict).ok()?;
    number_array::<4>(doc, dict.get(b"Rect").ok()?)
}

/// Whether the widget has no normal appearance dictionary, or one with `state`.
fn has_appearance_state(doc: &Document, widget: ObjectId, state: &str) -> bool {
    let Ok(dict) = doc.get_object(widget).and_then(Object::as_dict) else {
        return false;
    };
    let Some(Object::Dictionary(ap)) = entry(doc, dict, b"AP") else {
        return true;
    };
    match entry(doc, ap, b"N") {
        Some(Object::Dictionary(states)) => states.has(state.as_bytes()),
        _ => true,
    }
}
