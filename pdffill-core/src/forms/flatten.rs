//! Form flattening: widget appearances become page content
//!
//! Each widget's normal appearance is drawn into its page as a Form XObject
//! mapped onto the widget rectangle (ISO 32000-1 Section 12.5.5), the widget
//! annotation is removed from the page, and finally the AcroForm itself is
//! dropped from the catalog.

use crate::document::FormDocument;
use crate::error::Result;
use crate::forms::field::FormField;
use crate::objects::{array_items, edit_object, entry, fmt_num, number_array};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use tracing::{debug, info};

/// Annotation flags that keep a widget from being drawn
const HIDDEN: i64 = 1 << 1;
const NO_VIEW: i64 = 1 << 5;

/// A widget appearance to paint onto its page
struct Placement {
    name: String,
    stream_id: ObjectId,
    matrix: [f32; 6],
}

/// Flatten every widget on every page and remove the interactive form.
///
/// Returns the number of widget appearances drawn into page content.
pub fn flatten(form: &mut FormDocument, fields: &[FormField]) -> Result<usize> {
    let field_widgets: HashSet<ObjectId> = fields
        .iter()
        .flat_map(|field| field.widgets.iter().copied())
        .collect();

    let mut drawn = 0;
    for page_id in form.page_ids() {
        drawn += flatten_page(form.document_mut(), page_id, &field_widgets)?;
    }

    form.remove_acro_form();
    let pruned = form.document_mut().prune_objects();
    info!(
        "Flattened form: {} appearances drawn, {} objects pruned",
        drawn,
        pruned.len()
    );
    Ok(drawn)
}

fn flatten_page(doc: &mut Document, page_id: ObjectId, field_widgets: &HashSet<ObjectId>) -> Result<usize> {
    let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) else {
        return Ok(0);
    };
    let annots = page
        .get(b"Annots")
        .map(|annots| array_items(doc, annots))
        .unwrap_or_default();
    if annots.is_empty() {
        return Ok(0);
    }

    let mut kept = Vec::with_capacity(annots.len());
    let mut placements = Vec::new();

    for annot in annots {
        let Object::Reference(annot_id) = annot else {
            kept.push(annot);
            continue;
        };
        let Ok(dict) = doc.get_object(annot_id).and_then(Object::as_dict) else {
            kept.push(annot);
            continue;
        };
        if !field_widgets.contains(&annot_id) && !is_widget_annotation(doc, dict) {
            kept.push(annot);
            continue;
        }

        match placement(doc, annot_id, dict) {
            Some(placement) => placements.push(placement),
            None => debug!("Widget {:?} has no visible appearance, dropping it", annot_id),
        }
    }

    let drawn = placements.len();
    if drawn > 0 {
        draw_placements(doc, page_id, placements)?;
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    if kept.is_empty() {
        page.remove(b"Annots");
    } else {
        page.set("Annots", Object::Array(kept));
    }

    Ok(drawn)
}

fn is_widget_annotation(doc: &Document, dict: &Dictionary) -> bool {
    matches!(entry(doc, dict, b"Subtype"), Some(Object::Name(name)) if name == b"Widget")
}

/// Locate the widget's normal appearance and compute where it lands on the page.
fn placement(doc: &Document, widget_id: ObjectId, widget: &Dictionary) -> Option<Placement> {
    if let Some(Object::Integer(flags)) = entry(doc, widget, b"F") {
        if flags & (HIDDEN | NO_VIEW) != 0 {
            return None;
        }
    }

    let rect = number_array::<4>(doc, widget.get(b"Rect").ok()?)?;
    let ap = match entry(doc, widget, b"AP") {
        Some(Object::Dictionary(ap)) => ap,
        _ => return None,
    };

    let stream_id = match ap.get(b"N").ok()? {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => *id,
            // Appearance sub-dictionary keyed by state name
            Object::Dictionary(states) => state_stream(doc, widget, states)?,
            _ => return None,
        },
        Object::Dictionary(states) => state_stream(doc, widget, states)?,
        _ => return None,
    };

    let stream = doc.get_object(stream_id).and_then(Object::as_stream).ok()?;
    let bbox = number_array::<4>(doc, stream.dict.get(b"BBox").ok()?)?;
    let form_matrix = stream
        .dict
        .get(b"Matrix")
        .ok()
        .and_then(|m| number_array::<6>(doc, m))
        .unwrap_or([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    Some(Placement {
        name: format!("FlatWidget{}_{}", widget_id.0, widget_id.1),
        stream_id,
        matrix: fit_matrix(rect, bbox, form_matrix),
    })
}

fn state_stream(doc: &Document, widget: &Dictionary, states: &Dictionary) -> Option<ObjectId> {
    let Some(Object::Name(state)) = entry(doc, widget, b"AS") else {
        return None;
    };
    states.get(state).and_then(Object::as_reference).ok()
}

/// Matrix mapping the transformed appearance bounding box onto `rect`.
pub(crate) fn fit_matrix(rect: [f32; 4], bbox: [f32; 4], form_matrix: [f32; 6]) -> [f32; 6] {
    let [a, b, c, d, e, f] = form_matrix;
    let corners = [
        (bbox[0], bbox[1]),
        (bbox[2], bbox[1]),
        (bbox[0], bbox[3]),
        (bbox[2], bbox[3]),
    ]
    .map(|(x, y)| (a * x + c * y + e, b * x + d * y + f));

    let min_x = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    let min_y = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_y = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

    let (rx1, rx2) = (rect[0].min(rect[2]), rect[0].max(rect[2]));
    let (ry1, ry2) = (rect[1].min(rect[3]), rect[1].max(rect[3]));

    let scale = |target: f32, source: f32| {
        if source.abs() < f32::EPSILON {
            1.0
        } else {
            target / source
        }
    };
    let sx = scale(rx2 - rx1, max_x - min_x);
    let sy = scale(ry2 - ry1, max_y - min_y);

    [sx, 0.0, 0.0, sy, rx1 - min_x * sx, ry1 - min_y * sy]
}

fn draw_placements(doc: &mut Document, page_id: ObjectId, placements: Vec<Placement>) -> Result<()> {
    inherit_resources(doc, page_id)?;

    let mut content = b"Q\n".to_vec();
    for placement in &placements {
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(placement.stream_id) {
            stream.dict.set("Type", "XObject");
            stream.dict.set("Subtype", "Form");
        }

        let m = placement.matrix.map(fmt_num);
        content.extend_from_slice(
            format!(
                "q {} {} {} {} {} {} cm /{} Do Q\n",
                m[0], m[1], m[2], m[3], m[4], m[5], placement.name
            )
            .as_bytes(),
        );
    }

    edit_object(doc, page_id, &[b"Resources", b"XObject"], |xobjects| {
        for placement in &placements {
            xobjects.set(placement.name.as_str(), Object::Reference(placement.stream_id));
        }
    })?;

    // Wrap the existing content in q/Q so its graphics state cannot leak
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let draw_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let page = doc.get_object(page_id)?.as_dict()?;
    let existing = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(draw_id));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Copy resources inherited from the page tree onto the page itself.
fn inherit_resources(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let page = doc.get_object(page_id)?.as_dict()?;
    if page.has(b"Resources") {
        return Ok(());
    }

    let mut inherited = None;
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut guard = 0;
    while let Some(parent_id) = parent {
        guard += 1;
        if guard > 64 {
            break;
        }
        let Ok(node) = doc.get_object(parent_id).and_then(Object::as_dict) else {
            break;
        };
        if let Ok(resources) = node.get(b"Resources") {
            inherited = Some(resources.clone());
            break;
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    if let Some(resources) = inherited {
        let resources = match resources {
            Object::Reference(id) => doc.get_object(id)?.clone(),
            other => other,
        };
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", resources);
    }
    Ok(())
}

/// Count widget annotations still attached to pages.
pub fn remaining_widgets(form: &FormDocument) -> usize {
    let doc = form.document();
    form.page_ids()
        .into_iter()
        .filter_map(|page_id| doc.get_object(page_id).and_then(Object::as_dict).ok())
        .filter_map(|page| page.get(b"Annots").ok())
        .flat_map(|annots| array_items(doc, annots))
        .filter_map(|annot| annot.as_reference().ok())
        .filter_map(|id| doc.get_object(id).and_then(Object::as_dict).ok())
        .filter(|dict| is_widget_annotation(doc, dict))
        .count()
}
