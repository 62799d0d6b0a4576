//! In-memory AcroForm documents for tests
//!
//! Compiled for unit tests and, with the `test-fixtures` feature, for the
//! service and CLI test suites.

use crate::document::apply_object_cipher;
use crate::forms::FieldFlags;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

const DEFAULT_RECT: [f32; 4] = [100.0, 700.0, 300.0, 720.0];
const HIDDEN_FLAG: i64 = 1 << 1;

/// User password of [`FormFixture::encrypted`]
pub const FIXTURE_USER_PASSWORD: &str = "secret";
/// Owner password of [`FormFixture::encrypted`]
pub const FIXTURE_OWNER_PASSWORD: &str = "owner";

/// Padding string of the standard security handler
const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];
const PERMISSIONS: i64 = -4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Text,
    Checkbox,
    Radio,
    Choice,
    Signature,
    Untyped,
}

impl Kind {
    fn pdf_name(self) -> Option<&'static str> {
        match self {
            Kind::Text => Some("Tx"),
            Kind::Checkbox | Kind::Radio => Some("Btn"),
            Kind::Choice => Some("Ch"),
            Kind::Signature => Some("Sig"),
            Kind::Untyped => None,
        }
    }
}

/// One terminal field of a [`FormFixture`]
#[derive(Debug, Clone)]
pub struct FixtureField {
    name: String,
    kind: Kind,
    value: Option<String>,
    flags: i64,
    options: Vec<Object>,
    states: Vec<String>,
    parent: Option<String>,
    parent_flags: Option<i64>,
    widgets: usize,
    page: usize,
    rect: Object,
    page_ref: bool,
    appearance: bool,
    hidden: bool,
}

impl FixtureField {
    fn new(name: &str, kind: Kind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value: None,
            flags: 0,
            options: Vec::new(),
            states: Vec::new(),
            parent: None,
            parent_flags: None,
            widgets: 1,
            page: 1,
            rect: rect_object(DEFAULT_RECT),
            page_ref: true,
            appearance: false,
            hidden: false,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, Kind::Text)
    }

    /// Checkbox with `Yes` and `Off` appearance states, currently off
    pub fn checkbox(name: &str) -> Self {
        Self::new(name, Kind::Checkbox)
    }

    /// Radio group with one widget per on-state, all currently off
    pub fn radio(name: &str, states: &[&str]) -> Self {
        let mut field = Self::new(name, Kind::Radio);
        field.flags = FieldFlags::RADIO.bits() as i64;
        field.states = states.iter().map(|s| s.to_string()).collect();
        field.widgets = states.len();
        field
    }

    /// Name the checkbox's on appearance state `state` instead of `Yes`
    pub fn on_state(mut self, state: &str) -> Self {
        self.states = vec![state.to_string()];
        self
    }

    /// Choice field with raw `/Opt` entries
    pub fn choice(name: &str, options: Vec<Object>) -> Self {
        let mut field = Self::new(name, Kind::Choice);
        field.flags = FieldFlags::COMBO.bits() as i64;
        field.options = options;
        field
    }

    pub fn signature(name: &str) -> Self {
        Self::new(name, Kind::Signature)
    }

    /// Field without `/FT`
    pub fn untyped(name: &str) -> Self {
        Self::new(name, Kind::Untyped)
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Raw `/Ff` bits, merged with the kind's own flags
    pub fn flags(mut self, flags: i64) -> Self {
        self.flags |= flags;
        self
    }

    /// Nest the field under a non-terminal parent named `parent`.
    ///
    /// The parent carries the field type, so the child inherits it.
    pub fn child_of(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    /// `/Ff` of the parent created by [`FixtureField::child_of`]
    pub fn parent_flags(mut self, flags: i64) -> Self {
        self.parent_flags = Some(flags);
        self
    }

    /// Use `count` separate widget kids instead of a merged widget
    pub fn widgets(mut self, count: usize) -> Self {
        self.widgets = count;
        self
    }

    /// 1-based page the widgets are placed on
    pub fn on_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn rect(mut self, rect: [f32; 4]) -> Self {
        self.rect = rect_object(rect);
        self
    }

    /// Store an arbitrary object as `/Rect`
    pub fn raw_rect(mut self, rect: Object) -> Self {
        self.rect = rect;
        self
    }

    pub fn without_widget(mut self) -> Self {
        self.widgets = 0;
        self
    }

    /// Omit `/P` from the widgets
    pub fn without_page_ref(mut self) -> Self {
        self.page_ref = false;
        self
    }

    /// Give text and choice widgets a normal appearance stream
    pub fn with_appearance(mut self) -> Self {
        self.appearance = true;
        self
    }

    /// Set the hidden annotation flag on the widgets
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    fn is_merged(&self) -> bool {
        self.widgets == 1 && self.kind != Kind::Radio
    }
}

/// Builder for a small PDF with an AcroForm
#[derive(Debug, Clone)]
pub struct FormFixture {
    pages: usize,
    fields: Vec<FixtureField>,
    acro_form: bool,
    default_resources: bool,
    encryption: Option<(String, String)>,
    link_annotation: bool,
}

impl Default for FormFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl FormFixture {
    pub fn new() -> Self {
        Self {
            pages: 1,
            fields: Vec::new(),
            acro_form: true,
            default_resources: true,
            encryption: None,
            link_annotation: false,
        }
    }

    pub fn pages(mut self, pages: usize) -> Self {
        self.pages = pages.max(1);
        self
    }

    pub fn field(mut self, field: FixtureField) -> Self {
        self.fields.push(field);
        self
    }

    /// Encrypt with [`FIXTURE_USER_PASSWORD`] and [`FIXTURE_OWNER_PASSWORD`]
    pub fn encrypted(self) -> Self {
        self.encrypted_with(FIXTURE_USER_PASSWORD, FIXTURE_OWNER_PASSWORD)
    }

    /// Encrypt with the standard security handler, RC4 40-bit (V1, R2).
    ///
    /// An empty `user` password gives an owner-password-only file.
    pub fn encrypted_with(mut self, user: &str, owner: &str) -> Self {
        self.encryption = Some((user.to_string(), owner.to_string()));
        self
    }

    /// Leave out the AcroForm and every field
    pub fn without_acro_form(mut self) -> Self {
        self.acro_form = false;
        self
    }

    /// Leave out the form's `/DR` font resources
    pub fn without_default_resources(mut self) -> Self {
        self.default_resources = false;
        self
    }

    /// Add a link annotation to the first page
    pub fn link_annotation(mut self) -> Self {
        self.link_annotation = true;
        self
    }

    /// Serialize the fixture.
    ///
    /// # Panics
    ///
    /// Panics if lopdf fails to write or encrypt the document.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut doc = self.build();
        if let Some((user, owner)) = &self.encryption {
            encrypt(&mut doc, user, owner);
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("fixture document serializes");
        buffer
    }

    fn build(&self) -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let page_count = self
            .fields
            .iter()
            .map(|field| field.page)
            .chain(std::iter::once(self.pages))
            .max()
            .unwrap_or(1);

        let page_ids: Vec<ObjectId> = (0..page_count).map(|_| doc.new_object_id()).collect();
        let mut annots: Vec<Vec<Object>> = vec![Vec::new(); page_count];

        let mut roots = Vec::new();
        if self.acro_form {
            let mut parents: Vec<(String, ObjectId, Dictionary)> = Vec::new();

            for field in &self.fields {
                let page_id = page_ids[field.page - 1];
                let parent_id = field.parent.as_ref().map(|parent_name| {
                    if let Some((_, id, dict)) = parents.iter_mut().find(|(name, ..)| name == parent_name) {
                        if let Some(flags) = field.parent_flags {
                            dict.set("Ff", flags);
                        }
                        return *id;
                    }
                    let id = doc.new_object_id();
                    let mut dict = dictionary! {
                        "T" => Object::string_literal(parent_name.as_str()),
                        "Kids" => Vec::<Object>::new(),
                    };
                    if let Some(ft) = field.kind.pdf_name() {
                        dict.set("FT", ft);
                    }
                    if let Some(flags) = field.parent_flags {
                        dict.set("Ff", flags);
                    }
                    parents.push((parent_name.clone(), id, dict));
                    roots.push(Object::Reference(id));
                    id
                });

                let field_id = add_field(&mut doc, field, parent_id, page_id, font_id, &mut annots[field.page - 1]);

                match parent_id {
                    Some(parent_id) => {
                        if let Some((_, _, dict)) = parents.iter_mut().find(|(_, id, _)| *id == parent_id) {
                            if let Ok(Object::Array(kids)) = dict.get_mut(b"Kids") {
                                kids.push(Object::Reference(field_id));
                            }
                        }
                    }
                    None => roots.push(Object::Reference(field_id)),
                }
            }

            for (_, id, dict) in parents {
                doc.objects.insert(id, Object::Dictionary(dict));
            }
        }

        if self.link_annotation {
            let link_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => rect_object([10.0, 10.0, 60.0, 30.0]),
                "Border" => vec![0.into(), 0.into(), 0.into()],
            });
            annots[0].push(Object::Reference(link_id));
        }

        for (index, page_id) in page_ids.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 760 Td (Page {}) Tj ET", index + 1);
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
                "Contents" => content_id,
            };
            if !annots[index].is_empty() {
                page.set("Annots", std::mem::take(&mut annots[index]));
            }
            doc.objects.insert(*page_id, Object::Dictionary(page));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => page_count as i64,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if self.acro_form {
            let mut acro_form = dictionary! {
                "Fields" => roots,
                "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
            };
            if self.default_resources {
                acro_form.set(
                    "DR",
                    dictionary! { "Font" => dictionary! { "Helv" => font_id } },
                );
            }
            let acro_form_id = doc.add_object(acro_form);
            catalog.set("AcroForm", acro_form_id);
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        doc
    }
}

/// Encrypt every string and stream of `doc` in place.
fn encrypt(doc: &mut Document, user: &str, owner: &str) {
    let file_id = Object::String(b"pdffill fixture\0".to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);

    let owner_key = md5::compute(pad_password(owner));
    let owner_entry = rc4(&owner_key.0[..5], &pad_password(user));
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "O" => Object::String(owner_entry, StringFormat::Hexadecimal),
        "U" => Object::String(vec![0; 32], StringFormat::Hexadecimal),
        "P" => PERMISSIONS,
    });
    doc.trailer.set("Encrypt", encrypt_id);

    let key = lopdf::encryption::get_encryption_key(doc, user, false).expect("fixture encryption key");
    let user_entry = rc4(&key, &PASSWORD_PAD);
    doc.get_object_mut(encrypt_id)
        .and_then(Object::as_dict_mut)
        .expect("fixture encryption dictionary")
        .set("U", Object::String(user_entry, StringFormat::Hexadecimal));

    for (&id, object) in doc.objects.iter_mut() {
        if id == encrypt_id {
            continue;
        }
        apply_object_cipher(&key, id, object).expect("fixture object encrypts");
        hex_strings(object);
    }
}

fn pad_password(password: &str) -> Vec<u8> {
    let bytes = password.as_bytes();
    let len = bytes.len().min(32);
    let mut padded = bytes[..len].to_vec();
    padded.extend_from_slice(&PASSWORD_PAD[..32 - len]);
    padded
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            byte ^ state[state[i as usize].wrapping_add(state[j as usize]) as usize]
        })
        .collect()
}

/// Ciphertext may contain end-of-line bytes, which literal strings do not keep.
fn hex_strings(object: &mut Object) {
    match object {
        Object::String(_, format) => *format = StringFormat::Hexadecimal,
        Object::Array(items) => items.iter_mut().for_each(hex_strings),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, value)| hex_strings(value)),
        Object::Stream(stream) => stream.dict.iter_mut().for_each(|(_, value)| hex_strings(value)),
        _ => {}
    }
}

fn rect_object(rect: [f32; 4]) -> Object {
    Object::Array(rect.iter().map(|v| Object::Real(*v)).collect())
}

/// Add the field (and any separate widgets) and return the field's id.
fn add_field(
    doc: &mut Document,
    field: &FixtureField,
    parent_id: Option<ObjectId>,
    page_id: ObjectId,
    font_id: ObjectId,
    page_annots: &mut Vec<Object>,
) -> ObjectId {
    let field_id = doc.new_object_id();

    let mut dict = dictionary! { "T" => Object::string_literal(field.name.as_str()) };
    if let Some(parent_id) = parent_id {
        dict.set("Parent", parent_id);
    } else if let Some(ft) = field.kind.pdf_name() {
        dict.set("FT", ft);
    }
    if field.flags != 0 {
        dict.set("Ff", field.flags);
    }
    if !field.options.is_empty() || field.kind == Kind::Choice {
        dict.set("Opt", field.options.clone());
    }
    match (field.kind, &field.value) {
        (Kind::Checkbox | Kind::Radio, Some(value)) => dict.set("V", Object::Name(value.as_bytes().to_vec())),
        (Kind::Checkbox | Kind::Radio, None) => dict.set("V", "Off"),
        (_, Some(value)) => dict.set("V", Object::string_literal(value.as_str())),
        (_, None) => {}
    }

    if field.is_merged() {
        let widget = widget_dict(doc, field, 0, page_id, font_id);
        for (key, value) in widget.iter() {
            dict.set(key.clone(), value.clone());
        }
        page_annots.push(Object::Reference(field_id));
    } else if field.widgets > 0 {
        let mut kids = Vec::with_capacity(field.widgets);
        for index in 0..field.widgets {
            let mut widget = widget_dict(doc, field, index, page_id, font_id);
            widget.set("Parent", field_id);
            let widget_id = doc.add_object(widget);
            kids.push(Object::Reference(widget_id));
            page_annots.push(Object::Reference(widget_id));
        }
        dict.set("Kids", kids);
    }

    doc.objects.insert(field_id, Object::Dictionary(dict));
    field_id
}

fn widget_dict(doc: &mut Document, field: &FixtureField, index: usize, page_id: ObjectId, font_id: ObjectId) -> Dictionary {
    let mut widget = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Rect" => field.rect.clone(),
    };
    if field.page_ref {
        widget.set("P", page_id);
    }
    if field.hidden {
        widget.set("F", HIDDEN_FLAG);
    }

    match field.kind {
        Kind::Checkbox => {
            let state = field.states.first().map_or("Yes", String::as_str);
            let on = state_stream(doc, state);
            let off = state_stream(doc, "Off");
            let mut states = Dictionary::new();
            states.set(state, on);
            states.set("Off", off);
            widget.set("AP", dictionary! { "N" => states });
            widget.set("AS", "Off");
        }
        Kind::Radio => {
            let state = field.states.get(index).cloned().unwrap_or_else(|| "Yes".to_string());
            let on = state_stream(doc, &state);
            let off = state_stream(doc, "Off");
            let mut states = Dictionary::new();
            states.set(state.as_str(), on);
            states.set("Off", off);
            widget.set("AP", dictionary! { "N" => states });
            widget.set("AS", "Off");
        }
        Kind::Text | Kind::Choice if field.appearance => {
            let text = field.value.clone().unwrap_or_default();
            let content = format!("/Tx BMC BT /Helv 12 Tf 2 5 Td ({text}) Tj ET EMC");
            let stream_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 200.into(), 20.into()],
                    "Resources" => dictionary! {
                        "Font" => dictionary! { "Helv" => font_id },
                    },
                },
                content.into_bytes(),
            ));
            widget.set("AP", dictionary! { "N" => stream_id });
        }
        _ => {}
    }

    widget
}

fn state_stream(doc: &mut Document, state: &str) -> ObjectId {
    let content = if state == "Off" {
        "q 0 0 0 RG 0.5 0.5 19 19 re S Q".to_string()
    } else {
        "q 0 0 0 RG 0.5 0.5 19 19 re S 4 4 12 12 re f Q".to_string()
    };
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 20.into(), 20.into()],
        },
        content.into_bytes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_loadable() {
        let bytes = FormFixture::new()
            .pages(2)
            .field(FixtureField::text("a"))
            .field(FixtureField::checkbox("b").on_page(2))
            .to_bytes();
        assert!(bytes.starts_with(b"%PDF"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_field_on_later_page_adds_pages() {
        let bytes = FormFixture::new().field(FixtureField::text("a").on_page(3)).to_bytes();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }
}
