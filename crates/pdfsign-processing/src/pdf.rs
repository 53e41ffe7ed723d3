//! Small lopdf helpers shared by the placement and annotation code.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::ProcessingError;

/// A4 portrait, used when a page carries no usable MediaBox.
pub const FALLBACK_PAGE_SIZE: (f64, f64) = (595.0, 842.0);

pub fn load(bytes: &[u8]) -> Result<Document, ProcessingError> {
    Ok(Document::load_mem(bytes)?)
}

pub fn save(mut doc: Document) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ProcessingError::Write(e.to_string()))?;
    Ok(buffer)
}

pub fn page_count(bytes: &[u8]) -> Result<usize, ProcessingError> {
    Ok(load(bytes)?.get_pages().len())
}

/// Object id of a 1-based page.
pub fn page_id(doc: &Document, page: u32) -> Result<ObjectId, ProcessingError> {
    let pages = doc.get_pages();
    pages
        .get(&page)
        .copied()
        .ok_or(ProcessingError::PageOutOfRange {
            page,
            count: pages.len(),
        })
}

/// Width and height of a 1-based page in PDF points.
pub fn page_size(bytes: &[u8], page: u32) -> Result<(f64, f64), ProcessingError> {
    let doc = load(bytes)?;
    let id = page_id(&doc, page)?;
    Ok(page_dimensions(&doc, id))
}

/// MediaBox size, following inherited attributes up the page tree.
pub fn page_dimensions(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        depth += 1;
        if depth > 32 {
            break;
        }
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            break;
        };
        if let Some(size) = extract_media_box(doc, dict) {
            return size;
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    FALLBACK_PAGE_SIZE
}

fn extract_media_box(doc: &Document, dict: &Dictionary) -> Option<(f64, f64)> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = obj_to_f64(&arr[0])?;
    let lly = obj_to_f64(&arr[1])?;
    let urx = obj_to_f64(&arr[2])?;
    let ury = obj_to_f64(&arr[3])?;
    Some(((urx - llx).abs(), (ury - lly).abs()))
}

pub(crate) fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Encode a PDF text string: plain bytes for ASCII, UTF-16BE with BOM otherwise.
pub(crate) fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::string_literal(text)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, lopdf::StringFormat::Hexadecimal)
    }
}

/// Decode a PDF text string written by [`text_string`] or by other producers.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        // PDFDocEncoding matches Latin-1 for printable characters.
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
