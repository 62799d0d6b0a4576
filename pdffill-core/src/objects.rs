//! Helpers over the lopdf object model

use crate::error::{FormError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};

static NULL: Object = Object::Null;

/// Follow a single indirect reference; dangling references read as `null`.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(&NULL),
        other => other,
    }
}

/// Resolved dictionary entry.
pub(crate) fn entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    match dict.get(key).ok().map(|obj| resolve(doc, obj)) {
        None | Some(Object::Null) => None,
        found => found,
    }
}

pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f32> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode an array of exactly `N` numbers.
pub(crate) fn number_array<const N: usize>(doc: &Document, obj: &Object) -> Option<[f32; N]> {
    let Object::Array(items) = resolve(doc, obj) else {
        return None;
    };
    if items.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = number(doc, item)?;
    }
    Some(out)
}

/// Items of an array entry, following a reference to the array itself.
pub(crate) fn array_items(doc: &Document, obj: &Object) -> Vec<Object> {
    match resolve(doc, obj) {
        Object::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

/// Format a number for a content stream.
pub(crate) fn fmt_num(value: f32) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

enum Slot {
    Indirect(ObjectId),
    Inline,
    Missing,
}

/// Apply `edit` to the dictionary reached from object `owner` by `path`.
///
/// Each step follows an indirect reference or descends into an inline
/// dictionary; missing steps are created as inline dictionaries.
pub(crate) fn edit_object<F>(doc: &mut Document, owner: ObjectId, path: &[&[u8]], edit: F) -> Result<()>
where
    F: FnOnce(&mut Dictionary),
{
    let mut object = doc
        .objects
        .remove(&owner)
        .ok_or_else(|| FormError::InvalidStructure(format!("missing object {} {} R", owner.0, owner.1)))?;

    let result = match &mut object {
        Object::Dictionary(dict) => edit_detached(doc, dict, path, edit),
        Object::Stream(stream) => edit_detached(doc, &mut stream.dict, path, edit),
        _ => Err(FormError::InvalidStructure(format!(
            "object {} {} R is not a dictionary",
            owner.0, owner.1
        ))),
    };

    doc.objects.insert(owner, object);
    result
}

fn edit_detached<F>(doc: &mut Document, dict: &mut Dictionary, path: &[&[u8]], edit: F) -> Result<()>
where
    F: FnOnce(&mut Dictionary),
{
    let Some((key, rest)) = path.split_first() else {
        edit(dict);
        return Ok(());
    };

    let slot = match dict.get(key) {
        Ok(Object::Reference(id)) => Slot::Indirect(*id),
        Ok(Object::Dictionary(_)) => Slot::Inline,
        _ => Slot::Missing,
    };

    match slot {
        Slot::Indirect(id) => edit_object(doc, id, rest, edit),
        Slot::Inline | Slot::Missing => {
            let mut sub = match dict.remove(key) {
                Some(Object::Dictionary(sub)) => sub,
                _ => Dictionary::new(),
            };
            let result = edit_detached(doc, &mut sub, rest, edit);
            dict.set(key.to_vec(), Object::Dictionary(sub));
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(-0.0), "0");
        assert_eq!(fmt_num(1.23456), "1.2346");
    }

    #[test]
    fn test_number_array() {
        let mut doc = Document::with_version("1.7");
        let n = doc.add_object(Object::Integer(7));
        let arr = Object::Array(vec![
            Object::Integer(1),
            Object::Real(2.5),
            Object::Reference(n),
            Object::Integer(4),
        ]);
        assert_eq!(number_array::<4>(&doc, &arr), Some([1.0, 2.5, 7.0, 4.0]));
        assert_eq!(number_array::<3>(&doc, &arr), None);

        let bad = Object::Array(vec![Object::Integer(1), Object::Name(b"x".to_vec())]);
        assert_eq!(number_array::<2>(&doc, &bad), None);
    }

    #[test]
    fn test_edit_object_through_reference_and_inline() {
        let mut doc = Document::with_version("1.7");
        let font_dict = doc.add_object(dictionary! {});
        let owner = doc.add_object(dictionary! {
            "DR" => dictionary! { "Font" => Object::Reference(font_dict) },
        });

        edit_object(&mut doc, owner, &[b"DR", b"Font"], |fonts| {
            fonts.set("Helv", Object::Integer(1));
        })
        .unwrap();

        let fonts = doc.get_object(font_dict).unwrap().as_dict().unwrap();
        assert!(fonts.has(b"Helv"));
        // The owner is restored after editing
        assert!(doc.get_object(owner).is_ok());
    }

    #[test]
    fn test_edit_object_creates_missing_dicts() {
        let mut doc = Document::with_version("1.7");
        let owner = doc.add_object(dictionary! {});

        edit_object(&mut doc, owner, &[b"Resources", b"XObject"], |xobjects| {
            xobjects.set("Fm0", Object::Integer(1));
        })
        .unwrap();

        let owner_dict = doc.get_object(owner).unwrap().as_dict().unwrap();
        let resources = owner_dict.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert!(xobjects.has(b"Fm0"));
    }
}
