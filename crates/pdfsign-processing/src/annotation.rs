//! Invisible metadata annotations embedded before submission.
//!
//! Every complete annotation row becomes two FreeText annotations on the first
//! page: one a person can read in an annotation panel, and one with a fixed
//! `key=value` body for machine extraction. Both are zero-sized, white, almost
//! fully transparent and use a zero-size font, but carry the print flag so they
//! survive PDF/A flattening.

use chrono::Utc;
use lopdf::{dictionary, Document, Object, ObjectId};
use pdfsign_core::models::{AnnotationRow, SourceFile};

use crate::error::ProcessingError;
use crate::pdf::{self, decode_text, obj_to_f64, text_string};

/// Near-zero opacity. Zero is treated as "unset" by viewers and writers alike.
pub const INVISIBLE_OPACITY: f32 = 0.001;

/// Annotation flag bit 3 (Print).
pub const PRINT_FLAG: i64 = 4;

pub const MACHINE_AUTHOR: &str =
    "Automatisch angewendet, bitte nicht entfernen / Applied automatically, please do not remove";

pub const MACHINE_PREFIX: &str = "dbp_annotation_";

const DEFAULT_APPEARANCE: &str = "/Helv 0 Tf 1 1 1 rg";

/// Who applied the annotations, shown in the human-readable author field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationActor {
    pub full_name: String,
    pub hostname: String,
}

impl AnnotationActor {
    pub fn new(full_name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            hostname: hostname.into(),
        }
    }

    pub fn author(&self) -> String {
        format!("{} via \"{}\"", self.full_name, self.hostname)
    }
}

/// FreeText annotation as found in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedAnnotation {
    /// 1-based page index.
    pub page: u32,
    pub author: String,
    pub contents: String,
    pub flags: i64,
    pub opacity: Option<f64>,
    pub rect: [f64; 4],
}

impl EmbeddedAnnotation {
    /// `(type key, value)` when this is a machine-readable annotation.
    pub fn machine_value(&self) -> Option<(&str, &str)> {
        self.contents.strip_prefix(MACHINE_PREFIX)?.split_once('=')
    }

    pub fn is_invisible(&self) -> bool {
        self.rect.iter().all(|v| *v == 0.0)
            && self.opacity.is_some_and(|o| o > 0.0 && o < 0.01)
    }
}

/// Body of the human-readable annotation.
pub fn human_readable_contents(row: &AnnotationRow) -> Option<String> {
    let kind = row.kind()?;
    let value = row.effective_value();
    Some(format!(
        "{}: {}\n{}: {}",
        kind.name.de, value, kind.name.en, value
    ))
}

/// Body of the machine-readable annotation.
pub fn machine_readable_contents(row: &AnnotationRow) -> Option<String> {
    let kind = row.kind()?;
    Some(format!(
        "{}{}={}",
        MACHINE_PREFIX,
        kind.key,
        row.effective_value()
    ))
}

/// Embed the complete rows of `rows` into `file`.
///
/// Incomplete rows are skipped. When nothing is left to embed the file is
/// returned untouched.
pub fn inject(
    file: &SourceFile,
    rows: &[AnnotationRow],
    actor: &AnnotationActor,
) -> Result<SourceFile, ProcessingError> {
    let complete: Vec<&AnnotationRow> = rows.iter().filter(|r| r.is_complete()).collect();
    if complete.is_empty() {
        return Ok(file.clone());
    }

    let mut doc = pdf::load(&file.bytes)?;
    let page_id = pdf::page_id(&doc, 1)?;
    let author = actor.author();

    for row in &complete {
        let (Some(human), Some(machine)) =
            (human_readable_contents(row), machine_readable_contents(row))
        else {
            continue;
        };
        add_free_text(&mut doc, page_id, &author, &human)?;
        add_free_text(&mut doc, page_id, MACHINE_AUTHOR, &machine)?;
    }

    tracing::debug!(
        file_name = %file.name,
        rows = complete.len(),
        "Embedded annotation rows"
    );

    let bytes = pdf::save(doc)?;
    Ok(file.with_bytes(bytes))
}

fn add_free_text(
    doc: &mut Document,
    page_id: ObjectId,
    author: &str,
    contents: &str,
) -> Result<(), ProcessingError> {
    let now = Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    let annot = dictionary! {
        "Type" => "Annot",
        "Subtype" => "FreeText",
        "Rect" => vec![Object::Integer(0); 4],
        "Contents" => text_string(contents),
        "T" => text_string(author),
        "F" => PRINT_FLAG,
        "C" => vec![Object::Real(1.0), Object::Real(1.0), Object::Real(1.0)],
        "CA" => Object::Real(INVISIBLE_OPACITY),
        "DA" => Object::string_literal(DEFAULT_APPEARANCE),
        "P" => page_id,
        "M" => Object::string_literal(now.clone()),
        "CreationDate" => Object::string_literal(now),
    };
    let annot_id = doc.add_object(annot);
    add_annotation_to_page(doc, page_id, annot_id)
}

fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), ProcessingError> {
    let annots_ref = {
        let page_dict = doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|_| ProcessingError::Parse("page is not a dictionary".to_string()))?;
        match page_dict.get(b"Annots") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    // Annots may live in a separate array object
    if let Some(array_id) = annots_ref {
        if let Ok(Object::Array(arr)) = doc.get_object_mut(array_id) {
            arr.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|_| ProcessingError::Parse("page is not a dictionary".to_string()))?;
    if let Ok(Object::Array(arr)) = page_dict.get_mut(b"Annots") {
        arr.push(Object::Reference(annot_id));
    } else {
        page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
    }
    Ok(())
}

/// All FreeText annotations of a document, in page order.
pub fn read_annotations(bytes: &[u8]) -> Result<Vec<EmbeddedAnnotation>, ProcessingError> {
    let doc = pdf::load(bytes)?;
    let mut found = Vec::new();

    for (page, page_id) in doc.get_pages() {
        let Ok(page_dict) = doc.get_object(page_id).and_then(|o| o.as_dict()) else {
            continue;
        };
        let annots = match page_dict.get(b"Annots") {
            Ok(Object::Reference(id)) => doc.get_object(*id).and_then(|o| o.as_array()),
            Ok(obj) => obj.as_array(),
            Err(e) => Err(e),
        };
        let Ok(annots) = annots else {
            continue;
        };

        for entry in annots {
            let dict = match entry {
                Object::Reference(id) => doc.get_object(*id).and_then(|o| o.as_dict()),
                other => other.as_dict(),
            };
            let Ok(dict) = dict else {
                continue;
            };
            if dict.get(b"Subtype").and_then(|s| s.as_name()).ok() != Some(b"FreeText".as_slice()) {
                continue;
            }

            let text = |key: &[u8]| {
                dict.get(key)
                    .and_then(|o| o.as_str())
                    .map(decode_text)
                    .unwrap_or_default()
            };
            let mut rect = [0.0; 4];
            if let Ok(values) = dict.get(b"Rect").and_then(|r| r.as_array()) {
                for (slot, value) in rect.iter_mut().zip(values) {
                    *slot = obj_to_f64(value).unwrap_or_default();
                }
            }

            found.push(EmbeddedAnnotation {
                page,
                author: text(b"T"),
                contents: text(b"Contents"),
                flags: dict.get(b"F").and_then(|f| f.as_i64()).unwrap_or_default(),
                opacity: dict.get(b"CA").ok().and_then(obj_to_f64),
                rect,
            });
        }
    }

    Ok(found)
}
