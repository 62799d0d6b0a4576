//! Normal appearance streams for text, choice and checkbox widgets
//!
//! Writing `/V` alone leaves the cached appearance showing the old value, and
//! flattening draws the cached appearance. After a text or choice write, each
//! widget gets a fresh single-state `/AP /N` stream built from the field's
//! default appearance string (ISO 32000-1 Section 12.7.3.3). Checkboxes whose
//! on state is not named `Yes` get a `Yes` state added.

use crate::document::FormDocument;
use crate::error::Result;
use crate::forms::acro_form::DEFAULT_APPEARANCE;
use crate::forms::adapter::{widget_rect, OFF_STATE, ON_STATE};
use crate::forms::field::{FieldFlags, FormField};
use crate::forms::text_string::{encode_winansi, escape_literal};
use crate::objects::{edit_object, entry, fmt_num};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

const DEFAULT_FONT_SIZE: f32 = 12.0;
const MIN_AUTO_FONT_SIZE: f32 = 4.0;
const PADDING: f32 = 2.0;
/// Average Helvetica glyph width as a fraction of the font size
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Parsed default appearance string (`/DA`)
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultAppearance {
    pub font: String,
    /// 0 means auto-size
    pub size: f32,
    /// Remaining operators, typically the fill colour
    pub color: String,
}

impl DefaultAppearance {
    pub fn parse(da: &str) -> Self {
        let tokens: Vec<&str> = da.split_whitespace().collect();
        let mut font = "Helv".to_string();
        let mut size = 0.0;
        let mut rest = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            if i + 2 < tokens.len() && tokens[i + 2] == "Tf" && tokens[i].starts_with('/') {
                font = tokens[i].trim_start_matches('/').to_string();
                size = tokens[i + 1].parse().unwrap_or(0.0);
                i += 3;
            } else {
                rest.push(tokens[i]);
                i += 1;
            }
        }

        Self {
            font,
            size,
            color: rest.join(" "),
        }
    }
}

/// Rebuild the normal appearance of every widget of `field` to show `value`.
pub fn regenerate(form: &mut FormDocument, field: &FormField, value: &str) -> Result<()> {
    if field.widgets.is_empty() {
        return Ok(());
    }

    let da = DefaultAppearance::parse(
        field
            .default_appearance
            .as_deref()
            .unwrap_or(DEFAULT_APPEARANCE),
    );
    let font = font_resource(form, &da.font)?;

    let shown = if field.flags.contains(FieldFlags::PASSWORD) {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let multiline = field.flags.contains(FieldFlags::MULTILINE);

    for &widget in &field.widgets {
        let Some([x1, y1, x2, y2]) = widget_rect(form.document(), widget) else {
            debug!("Widget {:?} of '{}' has no rectangle, skipping appearance", widget, field.name);
            continue;
        };
        let (width, height) = ((x2 - x1).abs(), (y2 - y1).abs());

        let content = text_content(&da, &shown, width, height, field.quadding, multiline);
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
                "Resources" => dictionary! {
                    "Font" => dictionary! { da.font.as_str() => font.clone() },
                },
            },
            content,
        );

        let doc = form.document_mut();
        let stream_id = doc.add_object(stream);
        let dict = doc.get_object_mut(widget)?.as_dict_mut()?;
        dict.set("AP", dictionary! { "N" => Object::Reference(stream_id) });
    }

    Ok(())
}

/// Give a checkbox widget a `Yes` normal appearance state.
///
/// The widget's own on-state appearance (`/On`, `/1`, ...) is reused under
/// the new name; without one a check mark is drawn in the widget rectangle.
/// Returns `false` when neither is possible.
pub(crate) fn add_on_state(doc: &mut Document, widget: ObjectId) -> Result<bool> {
    let (existing_on, existing_off) = {
        let dict = doc.get_object(widget)?.as_dict()?;
        let states = entry(doc, dict, b"AP")
            .and_then(|ap| ap.as_dict().ok())
            .and_then(|ap| entry(doc, ap, b"N"))
            .and_then(|normal| normal.as_dict().ok());
        let on = states.and_then(|states| {
            states
                .iter()
                .find(|(name, _)| name.as_slice() != OFF_STATE.as_bytes())
                .map(|(_, appearance)| appearance.clone())
        });
        let off = states.and_then(|states| states.get(OFF_STATE.as_bytes()).ok().cloned());
        (on, off)
    };

    let on = match existing_on {
        Some(on) => on,
        None => {
            let Some([x1, y1, x2, y2]) = widget_rect(doc, widget) else {
                return Ok(false);
            };
            let (width, height) = ((x2 - x1).abs(), (y2 - y1).abs());
            let stream = checkbox_stream(width, height, check_mark_content(width, height));
            Object::Reference(doc.add_object(stream))
        }
    };
    let off = match existing_off {
        Some(off) => off,
        None => {
            let (width, height) = widget_rect(doc, widget)
                .map_or((0.0, 0.0), |[x1, y1, x2, y2]| ((x2 - x1).abs(), (y2 - y1).abs()));
            Object::Reference(doc.add_object(checkbox_stream(width, height, Vec::new())))
        }
    };

    debug!("Added {} appearance state to widget {:?}", ON_STATE, widget);
    doc.get_object_mut(widget)?.as_dict_mut()?.set(
        "AP",
        dictionary! { "N" => dictionary! { ON_STATE => on, OFF_STATE => off } },
    );
    Ok(true)
}

fn checkbox_stream(width: f32, height: f32, content: Vec<u8>) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
        },
        content,
    )
}

/// Check mark stroked across a `width` x `height` box.
fn check_mark_content(width: f32, height: f32) -> Vec<u8> {
    let line_width = (width.min(height) * 0.1).max(0.5);
    format!(
        "q\n0 G\n{} w\n1 J\n1 j\n{} {} m\n{} {} l\n{} {} l\nS\nQ\n",
        fmt_num(line_width),
        fmt_num(width * 0.2),
        fmt_num(height * 0.5),
        fmt_num(width * 0.42),
        fmt_num(height * 0.25),
        fmt_num(width * 0.8),
        fmt_num(height * 0.78),
    )
    .into_bytes()
}

/// Content stream drawing `text` inside a `width` x `height` box.
pub fn text_content(
    da: &DefaultAppearance,
    text: &str,
    width: f32,
    height: f32,
    quadding: i64,
    multiline: bool,
) -> Vec<u8> {
    let lines: Vec<&str> = if multiline {
        text.lines().collect()
    } else {
        vec![text.lines().next().unwrap_or("")]
    };

    let size = if da.size > 0.0 {
        da.size
    } else if multiline {
        DEFAULT_FONT_SIZE
    } else {
        (height * 0.7).clamp(MIN_AUTO_FONT_SIZE, DEFAULT_FONT_SIZE)
    };
    let leading = size * 1.15;

    let mut out = Vec::new();
    out.extend_from_slice(b"/Tx BMC\nq\n");
    out.extend_from_slice(
        format!(
            "{} {} {} {} re W n\n",
            fmt_num(PADDING / 2.0),
            fmt_num(PADDING / 2.0),
            fmt_num((width - PADDING).max(0.0)),
            fmt_num((height - PADDING).max(0.0))
        )
        .as_bytes(),
    );
    out.extend_from_slice(b"BT\n");
    if !da.color.is_empty() {
        out.extend_from_slice(da.color.as_bytes());
        out.push(b'\n');
    }
    out.extend_from_slice(format!("/{} {} Tf\n", da.font, fmt_num(size)).as_bytes());

    for (index, line) in lines.iter().enumerate() {
        let text_width = line.chars().count() as f32 * size * AVG_GLYPH_WIDTH;
        let x = match quadding {
            1 => (width - text_width) / 2.0,
            2 => width - PADDING - text_width,
            _ => PADDING,
        }
        .max(PADDING);
        let y = if multiline {
            height - PADDING - size - index as f32 * leading
        } else {
            ((height - size) / 2.0 + 0.22 * size).max(PADDING)
        };

        out.extend_from_slice(format!("1 0 0 1 {} {} Tm\n", fmt_num(x), fmt_num(y)).as_bytes());
        out.push(b'(');
        out.extend_from_slice(&escape_literal(&encode_winansi(line)));
        out.extend_from_slice(b") Tj\n");
    }

    out.extend_from_slice(b"ET\nQ\nEMC\n");
    out
}

/// Font object for `name` from the form's default resources.
///
/// Registers a Helvetica font under `name` when the form has none.
fn font_resource(form: &mut FormDocument, name: &str) -> Result<Object> {
    if let Some(font) = existing_font(form, name) {
        return Ok(font);
    }

    debug!("Adding Helvetica as /{} to the form resources", name);
    let doc = form.document_mut();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    register_default_font(form, name, font_id)?;
    Ok(Object::Reference(font_id))
}

fn existing_font(form: &FormDocument, name: &str) -> Option<Object> {
    let doc = form.document();
    let dr = dict_entry(doc, form.acro_form()?, b"DR")?;
    let fonts = dict_entry(doc, dr, b"Font")?;
    fonts.get(name.as_bytes()).ok().cloned()
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match entry(doc, dict, key) {
        Some(Object::Dictionary(found)) => Some(found),
        _ => None,
    }
}

fn register_default_font(form: &mut FormDocument, name: &str, font_id: ObjectId) -> Result<()> {
    let Some(acro_form_id) = acro_form_id(form) else {
        // Inline AcroForm: edit it in place
        if let Some(acro_form) = form.acro_form_mut() {
            let mut dr = match acro_form.remove(b"DR") {
                Some(Object::Dictionary(dr)) => dr,
                _ => Dictionary::new(),
            };
            let mut fonts = match dr.remove(b"Font") {
                Some(Object::Dictionary(fonts)) => fonts,
                _ => Dictionary::new(),
            };
            fonts.set(name, Object::Reference(font_id));
            dr.set("Font", fonts);
            acro_form.set("DR", dr);
        }
        return Ok(());
    };

    edit_object(form.document_mut(), acro_form_id, &[b"DR", b"Font"], |fonts| {
        fonts.set(name, Object::Reference(font_id));
    })
}

fn acro_form_id(form: &FormDocument) -> Option<ObjectId> {
    let doc = form.document();
    let root = doc.trailer.get(b"Root").and_then(Object::as_reference).ok()?;
    doc.get_object(root)
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"AcroForm"))
        .and_then(Object::as_reference)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureField, FormFixture};
    use crate::forms::acro_form::collect_fields;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_default_appearance() {
        let da = DefaultAppearance::parse("/Helv 10 Tf 0 g");
        assert_eq!(
            da,
            DefaultAppearance {
                font: "Helv".to_string(),
                size: 10.0,
                color: "0 g".to_string()
            }
        );

        let da = DefaultAppearance::parse("0 0 1 rg /F1 0 Tf");
        assert_eq!(da.font, "F1");
        assert_eq!(da.size, 0.0);
        assert_eq!(da.color, "0 0 1 rg");
    }

    #[test]
    fn test_parse_default_appearance_without_font() {
        let da = DefaultAppearance::parse("");
        assert_eq!(da.font, "Helv");
        assert_eq!(da.size, 0.0);
    }

    #[test]
    fn test_text_content_single_line() {
        let da = DefaultAppearance::parse("/Helv 12 Tf 0 g");
        let content = String::from_utf8(text_content(&da, "a(b)", 100.0, 20.0, 0, false)).unwrap();

        assert!(content.starts_with("/Tx BMC\n"));
        assert!(content.contains("/Helv 12 Tf"));
        assert!(content.contains("0 g"));
        assert!(content.contains("(a\\(b\\)) Tj"));
        assert!(content.ends_with("EMC\n"));
    }

    #[test]
    fn test_text_content_auto_size_fits_height() {
        let da = DefaultAppearance::parse("/Helv 0 Tf 0 g");
        let content = String::from_utf8(text_content(&da, "x", 100.0, 10.0, 0, false)).unwrap();
        assert!(content.contains("/Helv 7 Tf"), "content was {content}");
    }

    #[test]
    fn test_text_content_multiline_draws_each_line() {
        let da = DefaultAppearance::parse("/Helv 10 Tf 0 g");
        let content = String::from_utf8(text_content(&da, "one\ntwo", 100.0, 50.0, 0, true)).unwrap();
        assert!(content.contains("(one) Tj"));
        assert!(content.contains("(two) Tj"));

        let single = String::from_utf8(text_content(&da, "one\ntwo", 100.0, 50.0, 0, false)).unwrap();
        assert!(!single.contains("(two) Tj"));
    }

    #[test]
    fn test_regenerate_registers_missing_font() {
        let fixture = FormFixture::new()
            .without_default_resources()
            .field(FixtureField::text("name"));
        let mut form = FormDocument::open(&fixture.to_bytes(), None).unwrap();
        let fields = collect_fields(&form);

        regenerate(&mut form, &fields[0], "value").unwrap();
        assert!(existing_font(&form, "Helv").is_some());
    }

    #[test]
    fn test_regenerate_masks_password_fields() {
        let fixture = FormFixture::new()
            .field(FixtureField::text("pin").flags(FieldFlags::PASSWORD.bits() as i64));
        let mut form = FormDocument::open(&fixture.to_bytes(), None).unwrap();
        let fields = collect_fields(&form);

        regenerate(&mut form, &fields[0], "1234").unwrap();

        let doc = form.document();
        let widget = doc.get_object(fields[0].widgets[0]).unwrap().as_dict().unwrap();
        let normal = widget
            .get(b"AP")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"N")
            .unwrap()
            .as_reference()
            .unwrap();
        let content = &doc.get_object(normal).unwrap().as_stream().unwrap().content;
        let content = String::from_utf8_lossy(content);
        assert!(content.contains("(****) Tj"));
        assert!(!content.contains("1234"));
    }
}
