//! AcroForm field tree traversal (ISO 32000-1 Section 12.7.3)

use crate::document::FormDocument;
use crate::forms::field::{FieldFlags, FormField};
use crate::forms::field_type::{ChoiceOption, FieldType};
use crate::forms::text_string::decode_text_string;
use crate::objects::{array_items, entry, resolve};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Field trees deeper than this are treated as malformed
const MAX_DEPTH: usize = 32;

/// Default appearance used when neither the field nor the form define one
pub const DEFAULT_APPEARANCE: &str = "/Helv 0 Tf 0 g";

/// Attributes a field inherits from its ancestors
#[derive(Debug, Clone, Default)]
struct Inherited {
    field_type: Option<Vec<u8>>,
    flags: Option<i64>,
    value: Option<Object>,
    default_appearance: Option<String>,
    quadding: Option<i64>,
    options: Option<Vec<Object>>,
}

impl Inherited {
    fn merge(&self, doc: &Document, dict: &Dictionary) -> Self {
        let mut next = self.clone();
        if let Some(Object::Name(name)) = entry(doc, dict, b"FT") {
            next.field_type = Some(name.clone());
        }
        if let Some(Object::Integer(ff)) = entry(doc, dict, b"Ff") {
            next.flags = Some(*ff);
        }
        if let Some(value) = entry(doc, dict, b"V") {
            next.value = Some(value.clone());
        }
        if let Some(Object::String(da, _)) = entry(doc, dict, b"DA") {
            next.default_appearance = Some(String::from_utf8_lossy(da).into_owned());
        }
        if let Some(Object::Integer(q)) = entry(doc, dict, b"Q") {
            next.quadding = Some(*q);
        }
        if let Some(Object::Array(options)) = entry(doc, dict, b"Opt") {
            next.options = Some(options.clone());
        }
        next
    }
}

/// Collect every terminal field of the document's form, in tree order.
///
/// Returns an empty list when the document has no AcroForm. Names are
/// unique: a second terminal field with an already seen name is ignored.
pub fn collect_fields(form: &FormDocument) -> Vec<FormField> {
    let Some(acro_form) = form.acro_form() else {
        return Vec::new();
    };
    let doc = form.document();

    let mut root = Inherited::default();
    if let Some(Object::String(da, _)) = entry(doc, acro_form, b"DA") {
        root.default_appearance = Some(String::from_utf8_lossy(da).into_owned());
    }
    if let Some(Object::Integer(q)) = entry(doc, acro_form, b"Q") {
        root.quadding = Some(*q);
    }

    let roots = acro_form
        .get(b"Fields")
        .map(|fields| array_items(doc, fields))
        .unwrap_or_default();

    let mut walker = FieldWalker {
        doc,
        visited: HashSet::new(),
        names: HashSet::new(),
        fields: Vec::new(),
    };

    for node in roots {
        match node {
            Object::Reference(id) => walker.visit(id, "", &root, 0),
            _ => debug!("Skipping direct object in /Fields"),
        }
    }

    walker.fields
}

struct FieldWalker<'a> {
    doc: &'a Document,
    visited: HashSet<ObjectId>,
    names: HashSet<String>,
    fields: Vec<FormField>,
}

impl FieldWalker<'_> {
    fn visit(&mut self, id: ObjectId, parent_name: &str, inherited: &Inherited, depth: usize) {
        if depth > MAX_DEPTH {
            warn!("Field tree deeper than {MAX_DEPTH} levels, stopping at {:?}", id);
            return;
        }
        if !self.visited.insert(id) {
            warn!("Cycle in field tree at object {:?}", id);
            return;
        }

        let Ok(dict) = self.doc.get_object(id).and_then(Object::as_dict) else {
            return;
        };

        let name = match partial_name(self.doc, dict) {
            Some(partial) if parent_name.is_empty() => partial,
            Some(partial) => format!("{parent_name}.{partial}"),
            None => parent_name.to_string(),
        };
        let inherited = inherited.merge(self.doc, dict);

        let kids: Vec<ObjectId> = dict
            .get(b"Kids")
            .map(|kids| array_items(self.doc, kids))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|kid| kid.as_reference().ok())
            .collect();

        let field_kids: Vec<ObjectId> = kids
            .iter()
            .copied()
            .filter(|kid| self.is_field_node(*kid))
            .collect();

        if !field_kids.is_empty() {
            for kid in field_kids {
                self.visit(kid, &name, &inherited, depth + 1);
            }
            return;
        }

        if name.is_empty() {
            debug!("Skipping unnamed field {:?}", id);
            return;
        }
        if !self.names.insert(name.clone()) {
            debug!("Duplicate field name '{}', keeping the first", name);
            return;
        }

        let widgets = if !kids.is_empty() {
            kids
        } else if is_widget(self.doc, dict) {
            vec![id]
        } else {
            Vec::new()
        };

        self.fields.push(FormField {
            id,
            field_type: field_type(self.doc, &inherited),
            flags: FieldFlags::from_raw(inherited.flags.unwrap_or(0)),
            value: inherited
                .value
                .as_ref()
                .and_then(|value| value_to_string(self.doc, value)),
            default_appearance: inherited.default_appearance.clone(),
            quadding: inherited.quadding.unwrap_or(0),
            widgets,
            name,
        });
    }

    /// Kids carrying a partial name are fields; the others are widgets.
    fn is_field_node(&self, id: ObjectId) -> bool {
        self.doc
            .get_object(id)
            .and_then(Object::as_dict)
            .map(|dict| dict.has(b"T"))
            .unwrap_or(false)
    }
}

fn partial_name(doc: &Document, dict: &Dictionary) -> Option<String> {
    entry(doc, dict, b"T")
        .and_then(|t| t.as_str().ok())
        .map(decode_text_string)
}

pub(crate) fn is_widget(doc: &Document, dict: &Dictionary) -> bool {
    matches!(entry(doc, dict, b"Subtype"), Some(Object::Name(name)) if name == b"Widget")
        || dict.has(b"Rect")
}

fn field_type(doc: &Document, inherited: &Inherited) -> FieldType {
    match inherited.field_type.as_deref() {
        Some(b"Tx") => FieldType::Text,
        Some(b"Btn") => FieldType::Button,
        Some(b"Ch") => FieldType::Choice {
            options: inherited
                .options
                .iter()
                .flatten()
                .map(|option| ChoiceOption::from_object(doc, option))
                .collect(),
        },
        Some(b"Sig") => FieldType::Signature,
        _ => FieldType::Unknown,
    }
}

/// Human-readable rendering of a stored `/V`.
pub(crate) fn value_to_string(doc: &Document, value: &Object) -> Option<String> {
    match resolve(doc, value) {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        Object::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| value_to_string(doc, item))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        // Rich text values may be stored as streams
        Object::Stream(stream) => {
            let content = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            Some(decode_text_string(&content))
        }
        Object::Null | Object::Dictionary(_) | Object::Reference(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureField, FormFixture};
    use crate::forms::field_type::FieldKind;
    use pretty_assertions::assert_eq;

    fn open(fixture: FormFixture) -> FormDocument {
        FormDocument::open(&fixture.to_bytes(), None).unwrap()
    }

    #[test]
    fn test_collect_fields_in_tree_order() {
        let form = open(
            FormFixture::new()
                .field(FixtureField::text("first"))
                .field(FixtureField::checkbox("second"))
                .field(FixtureField::choice("third", vec![]))
                .field(FixtureField::signature("fourth")),
        );

        let fields = collect_fields(&form);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third", "fourth"]);

        let kinds: Vec<FieldKind> = fields.iter().map(|f| f.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Text,
                FieldKind::Button,
                FieldKind::Choice,
                FieldKind::Signature
            ]
        );
    }

    #[test]
    fn test_hierarchical_names_and_inherited_type() {
        let form = open(
            FormFixture::new()
                .field(FixtureField::text("street").child_of("address"))
                .field(FixtureField::text("city").child_of("address")),
        );

        let fields = collect_fields(&form);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["address.street", "address.city"]);
        assert!(fields.iter().all(|f| f.kind() == FieldKind::Text));
    }

    #[test]
    fn test_no_acro_form_yields_no_fields() {
        let form = open(FormFixture::new().without_acro_form());
        assert!(collect_fields(&form).is_empty());
    }

    #[test]
    fn test_unknown_field_type() {
        let form = open(FormFixture::new().field(FixtureField::untyped("mystery")));
        let fields = collect_fields(&form);
        assert_eq!(fields[0].kind(), FieldKind::Unknown);
    }

    #[test]
    fn test_separate_widget_kids() {
        let form = open(FormFixture::new().field(FixtureField::text("multi").widgets(2)));
        let fields = collect_fields(&form);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].widgets.len(), 2);
        assert_ne!(fields[0].widgets[0], fields[0].id);
    }

    #[test]
    fn test_value_to_string_variants() {
        let doc = Document::new();
        assert_eq!(
            value_to_string(&doc, &Object::Name(b"Off".to_vec())),
            Some("Off".to_string())
        );
        assert_eq!(
            value_to_string(&doc, &Object::string_literal("hello")),
            Some("hello".to_string())
        );
        assert_eq!(
            value_to_string(
                &doc,
                &Object::Array(vec![
                    Object::string_literal("a"),
                    Object::string_literal("b")
                ])
            ),
            Some("a, b".to_string())
        );
        assert_eq!(value_to_string(&doc, &Object::Null), None);
    }

    #[test]
    fn test_flags_are_inherited() {
        let form = open(
            FormFixture::new().field(
                FixtureField::text("locked")
                    .child_of("group")
                    .parent_flags(FieldFlags::READ_ONLY.bits() as i64),
            ),
        );
        let fields = collect_fields(&form);
        assert!(fields[0].is_read_only());
        assert!(!fields[0].is_required());
    }
}
