//! Undo/redo history using compressed snapshots
//!
//! Each recorded state is the full [`WorkflowDocument`], serialized to JSON
//! and compressed with zstd. Snapshots avoid writing an inverse for every
//! store mutation, and a workflow document compresses to a few hundred bytes.

use std::collections::VecDeque;

use crate::error::{NodeEngineError, Result};
use crate::types::WorkflowDocument;

/// Default number of snapshots kept
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Linear undo/redo stack of compressed documents
#[derive(Debug)]
pub struct UndoStack {
    /// Compressed document states (zstd)
    snapshots: VecDeque<Vec<u8>>,
    /// Index of the current state
    current: usize,
    max_snapshots: usize,
}

impl UndoStack {
    /// Create a stack keeping at most `max_snapshots` states
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            current: 0,
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Record a new state
    ///
    /// Truncates any redo history past the current position.
    pub fn push(&mut self, document: &WorkflowDocument) -> Result<()> {
        let json = serde_json::to_vec(document)?;
        let compressed = zstd::encode_all(&json[..], 3)
            .map_err(|e| NodeEngineError::Compression(e.to_string()))?;

        while self.snapshots.len() > self.current + 1 {
            self.snapshots.pop_back();
        }

        self.snapshots.push_back(compressed);
        self.current = self.snapshots.len() - 1;

        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
            self.current = self.current.saturating_sub(1);
        }

        Ok(())
    }

    /// Step back one state; `None` at the oldest state
    pub fn undo(&mut self) -> Option<Result<WorkflowDocument>> {
        if !self.can_undo() {
            return None;
        }
        self.current -= 1;
        Some(self.decompress(self.current))
    }

    /// Step forward one state; `None` at the newest state
    pub fn redo(&mut self) -> Option<Result<WorkflowDocument>> {
        if !self.can_redo() {
            return None;
        }
        self.current += 1;
        Some(self.decompress(self.current))
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    /// Number of snapshots held, including the current state
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Maximum number of snapshots kept
    pub fn capacity(&self) -> usize {
        self.max_snapshots
    }

    /// Drop every snapshot
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = 0;
    }

    /// Total compressed size of all snapshots, in bytes
    pub fn compressed_size(&self) -> usize {
        self.snapshots.iter().map(|s| s.len()).sum()
    }

    fn decompress(&self, index: usize) -> Result<WorkflowDocument> {
        let compressed = self
            .snapshots
            .get(index)
            .ok_or_else(|| NodeEngineError::Compression(format!("no snapshot at {}", index)))?;
        let json = zstd::decode_all(&compressed[..])
            .map_err(|e| NodeEngineError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GraphNode;

    fn make_document(name: &str) -> WorkflowDocument {
        let mut doc = WorkflowDocument::new(name);
        doc.nodes.push(GraphNode {
            id: "node_1".to_string(),
            node_type: "contentInput".to_string(),
            config: serde_json::json!({"content": name})
                .as_object()
                .cloned()
                .unwrap(),
            label: None,
        });
        doc
    }

    #[test]
    fn test_push_and_undo() {
        let mut stack = UndoStack::new(10);
        stack.push(&make_document("first")).unwrap();
        stack.push(&make_document("second")).unwrap();
        stack.push(&make_document("third")).unwrap();

        assert_eq!(stack.undo().unwrap().unwrap().name, "second");

        let first = stack.undo().unwrap().unwrap();
        assert_eq!(first.name, "first");
        assert_eq!(first.nodes[0].config_str("content"), Some("first"));

        assert!(stack.undo().is_none());
    }

    #[test]
    fn test_redo() {
        let mut stack = UndoStack::new(10);
        stack.push(&make_document("first")).unwrap();
        stack.push(&make_document("second")).unwrap();

        stack.undo();
        assert_eq!(stack.redo().unwrap().unwrap().name, "second");
        assert!(stack.redo().is_none());
    }

    #[test]
    fn test_push_truncates_redo() {
        let mut stack = UndoStack::new(10);
        stack.push(&make_document("first")).unwrap();
        stack.push(&make_document("second")).unwrap();
        stack.undo();

        stack.push(&make_document("third")).unwrap();
        assert!(!stack.can_redo());
        assert_eq!(stack.snapshot_count(), 2);
        assert_eq!(stack.undo().unwrap().unwrap().name, "first");
        assert_eq!(stack.redo().unwrap().unwrap().name, "third");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut stack = UndoStack::new(3);
        for i in 0..5 {
            stack.push(&make_document(&format!("doc_{}", i))).unwrap();
        }

        assert_eq!(stack.snapshot_count(), 3);
        assert_eq!(stack.undo().unwrap().unwrap().name, "doc_3");
        assert_eq!(stack.undo().unwrap().unwrap().name, "doc_2");
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut stack = UndoStack::new(0);
        stack.push(&make_document("a")).unwrap();
        stack.push(&make_document("b")).unwrap();
        assert_eq!(stack.capacity(), 1);
        assert_eq!(stack.snapshot_count(), 1);
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_clear() {
        let mut stack = UndoStack::default();
        assert_eq!(stack.capacity(), DEFAULT_HISTORY_LIMIT);
        stack.push(&make_document("a")).unwrap();
        assert!(stack.compressed_size() > 0);

        stack.clear();
        assert_eq!(stack.snapshot_count(), 0);
        assert_eq!(stack.compressed_size(), 0);
        assert!(stack.undo().is_none());
    }
}
