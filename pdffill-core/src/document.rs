//! Owned, per-operation handle on a parsed PDF

use crate::error::{FormError, Result};
use lopdf::encryption::{self, DecryptionError};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

/// Signature every PDF file starts with
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check the `%PDF` signature in the first four bytes.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// A parsed PDF owned by exactly one inspect or fill operation.
///
/// Created by [`FormDocument::open`] and consumed by
/// [`FormDocument::into_bytes`]; nothing is shared between operations.
#[derive(Debug)]
pub struct FormDocument {
    doc: Document,
    page_numbers: HashMap<ObjectId, u32>,
}

impl FormDocument {
    /// Parse `bytes`, decrypting with `password` when the file is encrypted.
    pub fn open(bytes: &[u8], password: Option<&str>) -> Result<Self> {
        if !is_pdf(bytes) {
            return Err(FormError::InvalidHeader);
        }

        let mut doc = Document::load_mem(bytes).map_err(|e| FormError::Open(e.to_string()))?;

        if doc.trailer.has(b"Encrypt") {
            decrypt(&mut doc, password)?;
            debug!("Decrypted document");
        }

        if doc.trailer.get(b"Root").is_err() {
            return Err(FormError::Open("document has no catalog".to_string()));
        }

        Ok(Self::from_document(doc))
    }

    /// Wrap an already parsed document.
    pub fn from_document(doc: Document) -> Self {
        let page_numbers = doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| (id, number))
            .collect();
        Self { doc, page_numbers }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    /// 1-based page number of a page object.
    pub fn page_number(&self, page_id: ObjectId) -> Option<u32> {
        self.page_numbers.get(&page_id).copied()
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    fn catalog_id(&self) -> Option<ObjectId> {
        self.doc.trailer.get(b"Root").and_then(Object::as_reference).ok()
    }

    pub fn has_acro_form(&self) -> bool {
        self.acro_form().is_some()
    }

    /// The interactive form dictionary, if the catalog has one.
    pub fn acro_form(&self) -> Option<&Dictionary> {
        let catalog = self.doc.get_object(self.catalog_id()?).ok()?.as_dict().ok()?;
        match catalog.get(b"AcroForm").ok()? {
            Object::Reference(id) => self.doc.get_object(*id).ok()?.as_dict().ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub(crate) fn acro_form_mut(&mut self) -> Option<&mut Dictionary> {
        let catalog_id = self.catalog_id()?;
        let indirect = match self
            .doc
            .get_object(catalog_id)
            .ok()?
            .as_dict()
            .ok()?
            .get(b"AcroForm")
            .ok()?
        {
            Object::Reference(id) => Some(*id),
            Object::Dictionary(_) => None,
            _ => return None,
        };

        match indirect {
            Some(id) => self.doc.get_object_mut(id).ok()?.as_dict_mut().ok(),
            None => self
                .doc
                .get_object_mut(catalog_id)
                .ok()?
                .as_dict_mut()
                .ok()?
                .get_mut(b"AcroForm")
                .ok()?
                .as_dict_mut()
                .ok(),
        }
    }

    /// Drop the interactive form from the catalog.
    pub(crate) fn remove_acro_form(&mut self) {
        if let Some(catalog_id) = self.catalog_id() {
            if let Ok(catalog) = self
                .doc
                .get_object_mut(catalog_id)
                .and_then(Object::as_dict_mut)
            {
                catalog.remove(b"AcroForm");
            }
        }
    }

    /// Serialize into a fresh buffer, consuming the document.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| FormError::Serialize(e.to_string()))?;
        debug!("Serialized document ({} bytes)", buffer.len());
        Ok(buffer)
    }
}

/// Decrypt every string and stream with the standard security handler.
///
/// A non-empty `password` is checked as the user password. Without one the
/// empty user password is tried, which opens owner-password-only files.
fn decrypt(doc: &mut Document, password: Option<&str>) -> Result<()> {
    let encrypt = doc
        .trailer
        .get(b"Encrypt")
        .map_err(|e| FormError::Open(e.to_string()))?
        .clone();
    // lopdf only resolves an indirect /Encrypt dictionary
    let encrypt_id = match encrypt {
        Object::Reference(id) => id,
        Object::Dictionary(dict) => {
            let id = doc.add_object(dict);
            doc.trailer.set("Encrypt", id);
            id
        }
        _ => return Err(FormError::Open("invalid /Encrypt entry".to_string())),
    };

    let handler = doc.get_dictionary(encrypt_id).map_err(|e| FormError::Open(e.to_string()))?;
    if !matches!(handler.get(b"Filter"), Ok(Object::Name(name)) if name == b"Standard") {
        return Err(FormError::Open("unsupported security handler".to_string()));
    }
    let metadata_encrypted = handler
        .get(b"EncryptMetadata")
        .and_then(Object::as_bool)
        .unwrap_or(true);

    let key = match password.filter(|password| !password.is_empty()) {
        Some(password) => encryption::get_encryption_key(doc, password, true)
            .map_err(|e| FormError::Open(format!("failed to decrypt document: {e}")))?,
        None => encryption::get_encryption_key(doc, "", true).map_err(|e| match e {
            DecryptionError::IncorrectPassword => FormError::Encrypted,
            other => FormError::Open(format!("failed to decrypt document: {other}")),
        })?,
    };

    for (&id, object) in doc.objects.iter_mut() {
        if id == encrypt_id {
            continue;
        }
        if !metadata_encrypted && object.type_name().map_or(false, |name| name == "Metadata") {
            continue;
        }
        apply_object_cipher(&key, id, object)
            .map_err(|e| FormError::Open(format!("failed to decrypt object {id:?}: {e}")))?;
    }

    doc.trailer.remove(b"Encrypt");
    doc.objects.remove(&encrypt_id);
    Ok(())
}

/// Run the RC4 object cipher over every string and stream in `object`,
/// including those nested in arrays and dictionaries.
///
/// RC4 is symmetric, so the same pass encrypts and decrypts.
pub(crate) fn apply_object_cipher(
    key: &[u8],
    id: ObjectId,
    object: &mut Object,
) -> std::result::Result<(), DecryptionError> {
    if matches!(object, Object::String(..) | Object::Stream(_)) {
        let content = encryption::decrypt_object(key, id, object)?;
        match object {
            Object::String(bytes, _) => *bytes = content,
            Object::Stream(stream) => stream.set_content(content),
            _ => {}
        }
    }

    match object {
        Object::Array(items) => {
            for item in items.iter_mut() {
                apply_object_cipher(key, id, item)?;
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                apply_object_cipher(key, id, value)?;
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                apply_object_cipher(key, id, value)?;
            }
        }
        _ => {}
    }
    Ok(())
}
