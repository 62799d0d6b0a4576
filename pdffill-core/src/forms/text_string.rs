//! PDF text string encoding (ISO 32000-1 Section 7.9.2.2)

use lopdf::{Object, StringFormat};

/// Decode a PDF text string.
///
/// Strings starting with a UTF-16BE byte order mark are decoded as UTF-16,
/// strings with a UTF-8 mark (PDF 2.0) as UTF-8. Everything else is treated
/// as PDFDocEncoding, approximated by Latin-1.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }

    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode a value as a PDF text string object.
///
/// ASCII stays a plain literal, anything else is written as UTF-16BE with a
/// byte order mark so viewers decode it unambiguously.
pub fn encode_text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = Vec::with_capacity(2 + value.len() * 2);
    bytes.extend_from_slice(&[0xFE, 0xFF]);
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Encode text for a content stream shown with a simple (WinAnsi) font.
///
/// Characters outside Latin-1 cannot be shown and are replaced by `?`.
pub fn encode_winansi(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Escape bytes for use inside a literal string `( ... )` in a content stream.
pub fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out
}
