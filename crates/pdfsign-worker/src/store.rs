//! Queue entry store.
//!
//! Entries live in a `BTreeMap` keyed by [`QueueKey`]; every per-document side
//! table is a separate map keyed by the same key. Removing a key removes exactly
//! that key from every table, so removal never shifts data between documents.

use std::collections::{BTreeMap, HashMap, HashSet};

use pdfsign_core::models::{
    AnnotationField, AnnotationRow, PlacementData, PlacementMode, QueueEntry, QueueKey,
    SourceFile,
};
use pdfsign_core::PdfSignError;

/// Everything the store knows about one document, taken out in one piece.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedDocument {
    pub key: QueueKey,
    pub file: SourceFile,
    pub placement_mode: PlacementMode,
    pub placement: Option<PlacementData>,
    pub annotations_enabled: bool,
    pub annotation_rows: Vec<AnnotationRow>,
    pub needs_placement: bool,
}

impl QueuedDocument {
    /// Whether the placement gate lets this document through.
    pub fn placement_ready(&self) -> bool {
        placement_ready(
            self.needs_placement,
            self.placement_mode,
            self.placement.as_ref(),
        )
    }
}

fn placement_ready(
    needs_placement: bool,
    mode: PlacementMode,
    placement: Option<&PlacementData>,
) -> bool {
    match mode {
        PlacementMode::Manual => placement.is_some_and(PlacementData::is_valid),
        PlacementMode::Auto => !needs_placement,
    }
}

#[derive(Debug, Default)]
pub struct QueueStore {
    next_key: u64,
    entries: BTreeMap<QueueKey, SourceFile>,
    placement_modes: HashMap<QueueKey, PlacementMode>,
    placements: HashMap<QueueKey, PlacementData>,
    annotation_rows: HashMap<QueueKey, Vec<AnnotationRow>>,
    annotations_enabled: HashSet<QueueKey>,
    needs_placement: HashSet<QueueKey>,
    block_visible: bool,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under the next counter value.
    pub fn enqueue(&mut self, file: SourceFile) -> QueueKey {
        self.next_key += 1;
        let key = QueueKey::new(self.next_key);
        self.entries.insert(key, file);
        if self.entries.len() == 1 {
            self.block_visible = true;
        }
        key
    }

    /// Remove a document with all of its side data. Absent keys yield `None`.
    pub fn dequeue(&mut self, key: QueueKey) -> Option<QueuedDocument> {
        let file = self.entries.remove(&key)?;
        Some(QueuedDocument {
            key,
            file,
            placement_mode: self.placement_modes.remove(&key).unwrap_or_default(),
            placement: self.placements.remove(&key),
            annotations_enabled: self.annotations_enabled.remove(&key),
            annotation_rows: self.annotation_rows.remove(&key).unwrap_or_default(),
            needs_placement: self.needs_placement.remove(&key),
        })
    }

    /// Put a dequeued document back under its original key, side data included.
    pub fn restore(&mut self, document: QueuedDocument) -> QueueKey {
        let key = document.key;
        self.next_key = self.next_key.max(key.value());
        self.entries.insert(key, document.file);
        self.placement_modes.insert(key, document.placement_mode);
        if let Some(placement) = document.placement {
            self.placements.insert(key, placement);
        }
        if document.annotations_enabled {
            self.annotations_enabled.insert(key);
            self.annotation_rows.insert(key, document.annotation_rows);
        }
        if document.needs_placement {
            self.needs_placement.insert(key);
        }
        if self.entries.len() == 1 {
            self.block_visible = true;
        }
        key
    }

    /// Remove every entry, or only `keys` when given. Returns the removed entries.
    pub fn clear(&mut self, keys: Option<&[QueueKey]>) -> Vec<QueueEntry> {
        let targets: Vec<QueueKey> = match keys {
            Some(keys) => keys.to_vec(),
            None => self.entries.keys().copied().collect(),
        };

        targets
            .into_iter()
            .filter_map(|key| self.dequeue(key))
            .map(|doc| QueueEntry {
                key: doc.key,
                file: doc.file,
            })
            .collect()
    }

    pub fn remove(&mut self, key: QueueKey) -> bool {
        self.dequeue(key).is_some()
    }

    pub fn contains(&self, key: QueueKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Earliest queued key.
    pub fn first_key(&self) -> Option<QueueKey> {
        self.entries.keys().next().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = QueueKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Becomes true when the queue first receives a document and stays true.
    pub fn block_visible(&self) -> bool {
        self.block_visible
    }

    pub fn set_placement_mode(&mut self, key: QueueKey, mode: PlacementMode) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.placement_modes.insert(key, mode);
        true
    }

    pub fn placement_mode(&self, key: QueueKey) -> PlacementMode {
        self.placement_modes.get(&key).copied().unwrap_or_default()
    }

    pub fn set_placement(&mut self, key: QueueKey, placement: Option<PlacementData>) -> bool {
        if !self.contains(key) {
            return false;
        }
        match placement {
            Some(p) => self.placements.insert(key, p),
            None => self.placements.remove(&key),
        };
        true
    }

    pub fn placement(&self, key: QueueKey) -> Option<&PlacementData> {
        self.placements.get(&key)
    }

    pub fn set_needs_placement(&mut self, key: QueueKey, needs: bool) -> bool {
        if !self.contains(key) {
            return false;
        }
        if needs {
            self.needs_placement.insert(key);
        } else {
            self.needs_placement.remove(&key);
        }
        true
    }

    pub fn needs_placement(&self, key: QueueKey) -> bool {
        self.needs_placement.contains(&key)
    }

    pub fn needs_placement_count(&self) -> usize {
        self.needs_placement.len()
    }

    /// Replace the rows of a document and enable annotations for it.
    pub fn set_annotation_rows(&mut self, key: QueueKey, rows: Vec<AnnotationRow>) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.annotations_enabled.insert(key);
        self.annotation_rows.insert(key, rows);
        true
    }

    pub fn annotation_rows(&self, key: QueueKey) -> &[AnnotationRow] {
        self.annotation_rows
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Disabling drops the rows; enabling starts with none.
    pub fn set_annotations_enabled(&mut self, key: QueueKey, enabled: bool) -> bool {
        if !self.contains(key) {
            return false;
        }
        if enabled {
            self.annotations_enabled.insert(key);
            self.annotation_rows.entry(key).or_default();
        } else {
            self.annotations_enabled.remove(&key);
            self.annotation_rows.remove(&key);
        }
        true
    }

    pub fn annotations_enabled(&self, key: QueueKey) -> bool {
        self.annotations_enabled.contains(&key)
    }

    /// Append an empty row. Returns its index.
    pub fn add_annotation_row(&mut self, key: QueueKey) -> Option<usize> {
        if !self.contains(key) {
            return None;
        }
        self.annotations_enabled.insert(key);
        let rows = self.annotation_rows.entry(key).or_default();
        rows.push(AnnotationRow::default());
        Some(rows.len() - 1)
    }

    pub fn update_annotation_row(
        &mut self,
        key: QueueKey,
        index: usize,
        field: AnnotationField,
        value: impl Into<String>,
    ) -> Result<(), PdfSignError> {
        let row = self
            .annotation_rows
            .get_mut(&key)
            .and_then(|rows| rows.get_mut(index))
            .ok_or_else(|| {
                PdfSignError::InvalidInput(format!(
                    "No annotation row {} for queue entry {}",
                    index, key
                ))
            })?;
        row.set(field, value);
        Ok(())
    }

    /// Remove one row; later rows move up by one.
    pub fn remove_annotation_row(&mut self, key: QueueKey, index: usize) -> Option<AnnotationRow> {
        let rows = self.annotation_rows.get_mut(&key)?;
        if index >= rows.len() {
            return None;
        }
        Some(rows.remove(index))
    }

    /// Entries the placement gate rejects: documents that need manual placement
    /// but are not in manual mode, and manual documents without a usable placement.
    pub fn placement_blockers(&self) -> Vec<(QueueKey, &SourceFile)> {
        self.entries
            .iter()
            .filter(|(key, _)| {
                !placement_ready(
                    self.needs_placement(**key),
                    self.placement_mode(**key),
                    self.placement(**key),
                )
            })
            .map(|(k, f)| (*k, f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfsign_core::models::Rotation;

    fn file(name: &str) -> SourceFile {
        SourceFile::pdf(name, b"%PDF-1.7".to_vec())
    }

    fn placement(page: u32) -> PlacementData {
        PlacementData {
            page,
            left: 10.0,
            top: 20.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: Rotation::Deg90,
            width: 50.0,
            height: 20.0,
            canvas_to_pdf_scale: 1.0,
        }
    }

    #[test]
    fn keys_increase_and_first_key_is_oldest() {
        let mut store = QueueStore::new();
        assert!(!store.block_visible());
        let a = store.enqueue(file("a.pdf"));
        let b = store.enqueue(file("b.pdf"));
        assert!(a < b);
        assert_eq!(store.first_key(), Some(a));
        assert_eq!(store.len(), 2);
        assert!(store.block_visible());

        store.dequeue(a);
        let c = store.enqueue(file("c.pdf"));
        assert!(c > b);
        assert_eq!(store.first_key(), Some(b));
    }

    #[test]
    fn dequeue_missing_key_is_none() {
        let mut store = QueueStore::new();
        let key = store.enqueue(file("a.pdf"));
        assert!(store.dequeue(key).is_some());
        assert!(store.dequeue(key).is_none());
        assert!(store.is_empty());
        assert!(store.block_visible());
    }

    #[test]
    fn removing_middle_key_keeps_other_side_data() {
        let mut store = QueueStore::new();
        let keys: Vec<_> = (1..=5)
            .map(|i| store.enqueue(file(&format!("{}.pdf", i))))
            .collect();
        for (i, key) in keys.iter().enumerate() {
            store.set_placement_mode(*key, PlacementMode::Manual);
            store.set_placement(*key, Some(placement(i as u32 + 1)));
            store.set_annotation_rows(
                *key,
                vec![AnnotationRow::new("85a4eb4c", format!("value {}", i + 1))],
            );
        }

        assert!(store.remove(keys[2]));

        for (i, key) in keys.iter().enumerate() {
            if i == 2 {
                assert!(!store.contains(*key));
                assert!(store.placement(*key).is_none());
                assert!(store.annotation_rows(*key).is_empty());
                continue;
            }
            assert_eq!(store.placement(*key).map(|p| p.page), Some(i as u32 + 1));
            assert_eq!(store.placement_mode(*key), PlacementMode::Manual);
            assert_eq!(
                store.annotation_rows(*key)[0].value,
                format!("value {}", i + 1)
            );
        }
    }

    #[test]
    fn clear_subset_and_all() {
        let mut store = QueueStore::new();
        let a = store.enqueue(file("a.pdf"));
        let b = store.enqueue(file("b.pdf"));
        let c = store.enqueue(file("c.pdf"));
        store.set_needs_placement(b, true);

        let removed = store.clear(Some(&[b, QueueKey::new(99)]));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].file.name, "b.pdf");
        assert_eq!(store.needs_placement_count(), 0);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec![a, c]);

        assert_eq!(store.clear(None).len(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn restore_brings_back_side_data_under_same_key() {
        let mut store = QueueStore::new();
        let a = store.enqueue(file("a.pdf"));
        let b = store.enqueue(file("b.pdf"));
        store.set_placement_mode(a, PlacementMode::Manual);
        store.set_placement(a, Some(placement(2)));
        store.set_needs_placement(a, true);
        store.set_annotation_rows(a, vec![AnnotationRow::new("4e7f0c2d", "AZ 1")]);

        let doc = store.dequeue(a).unwrap();
        assert_eq!(store.first_key(), Some(b));

        assert_eq!(store.restore(doc), a);
        assert_eq!(store.first_key(), Some(a));
        assert_eq!(store.placement_mode(a), PlacementMode::Manual);
        assert_eq!(store.placement(a), Some(&placement(2)));
        assert!(store.needs_placement(a));
        assert!(store.annotations_enabled(a));
        assert_eq!(store.annotation_rows(a)[0].value, "AZ 1");

        let next = store.enqueue(file("c.pdf"));
        assert!(next > b);
    }

    #[test]
    fn setters_ignore_unknown_keys() {
        let mut store = QueueStore::new();
        let ghost = QueueKey::new(7);
        assert!(!store.set_placement_mode(ghost, PlacementMode::Manual));
        assert!(!store.set_needs_placement(ghost, true));
        assert!(!store.set_annotation_rows(ghost, Vec::new()));
        assert_eq!(store.add_annotation_row(ghost), None);
        assert_eq!(store.needs_placement_count(), 0);
    }

    #[test]
    fn annotation_row_editing() {
        let mut store = QueueStore::new();
        let key = store.enqueue(file("a.pdf"));
        assert_eq!(store.add_annotation_row(key), Some(0));
        assert_eq!(store.add_annotation_row(key), Some(1));
        assert_eq!(store.add_annotation_row(key), Some(2));
        assert!(store.annotations_enabled(key));

        store
            .update_annotation_row(key, 1, AnnotationField::Value, "second")
            .unwrap();
        store
            .update_annotation_row(key, 2, AnnotationField::Value, "third")
            .unwrap();
        assert!(store
            .update_annotation_row(key, 5, AnnotationField::Value, "x")
            .is_err());

        let removed = store.remove_annotation_row(key, 1).unwrap();
        assert_eq!(removed.value, "second");
        assert_eq!(store.annotation_rows(key).len(), 2);
        assert_eq!(store.annotation_rows(key)[1].value, "third");

        store.set_annotations_enabled(key, false);
        assert!(!store.annotations_enabled(key));
        assert!(store.annotation_rows(key).is_empty());
    }

    #[test]
    fn gate_rules() {
        let mut store = QueueStore::new();
        let plain = store.enqueue(file("plain.pdf"));
        let signed = store.enqueue(file("signed.pdf"));
        store.set_needs_placement(signed, true);

        let blockers: Vec<_> = store.placement_blockers().iter().map(|(k, _)| *k).collect();
        assert_eq!(blockers, vec![signed]);

        // Manual without data still blocks
        store.set_placement_mode(signed, PlacementMode::Manual);
        assert_eq!(store.placement_blockers().len(), 1);

        store.set_placement(signed, Some(placement(1)));
        assert!(store.placement_blockers().is_empty());

        // Manual mode on an unsigned document also needs data
        store.set_placement_mode(plain, PlacementMode::Manual);
        assert_eq!(store.placement_blockers().len(), 1);
    }

    #[test]
    fn dequeued_document_reports_gate_state() {
        let mut store = QueueStore::new();
        let signed = store.enqueue(file("signed.pdf"));
        store.set_needs_placement(signed, true);
        let plain = store.enqueue(file("plain.pdf"));

        assert!(!store.dequeue(signed).unwrap().placement_ready());
        assert!(store.dequeue(plain).unwrap().placement_ready());

        let manual = store.enqueue(file("manual.pdf"));
        store.set_needs_placement(manual, true);
        store.set_placement_mode(manual, PlacementMode::Manual);
        store.set_placement(manual, Some(placement(1)));
        assert!(store.dequeue(manual).unwrap().placement_ready());
    }
}
