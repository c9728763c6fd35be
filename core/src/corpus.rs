use crate::error::{IndexError, Result};
use crate::BatchId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One corpus record. Ids are unique over the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// Yields every document of one numbered batch, or fails the batch as a whole.
pub trait BatchSource: Send + Sync {
    fn read_batch(&self, batch: BatchId) -> Result<Vec<Document>>;
}

/// Corpus-level validity predicate applied right after a batch is read.
pub trait DocumentFilter: Send + Sync {
    fn keep(&self, doc: &Document) -> bool;
}

impl<F> DocumentFilter for F
where
    F: Fn(&Document) -> bool + Send + Sync,
{
    fn keep(&self, doc: &Document) -> bool {
        self(doc)
    }
}

/// Drops records without an id or without any text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyText;

impl DocumentFilter for NonEmptyText {
    fn keep(&self, doc: &Document) -> bool {
        !doc.id.trim().is_empty() && !doc.text.trim().is_empty()
    }
}

/// Reads `wiki-NNN.jsonl` batch files, one JSON document per line.
#[derive(Debug, Clone)]
pub struct JsonlBatchReader {
    dir: PathBuf,
}

impl JsonlBatchReader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn batch_path(&self, batch: BatchId) -> PathBuf {
        self.dir.join(format!("wiki-{batch:03}.jsonl"))
    }
}

impl BatchSource for JsonlBatchReader {
    fn read_batch(&self, batch: BatchId) -> Result<Vec<Document>> {
        let path = self.batch_path(batch);
        let file = File::open(&path)
            .map_err(|e| IndexError::input(batch, format!("cannot open {}: {e}", path.display())))?;
        let mut docs = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                IndexError::input(batch, format!("read failed at line {}: {e}", lineno + 1))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let doc: Document = serde_json::from_str(&line).map_err(|e| {
                IndexError::input(batch, format!("corrupt record at line {}: {e}", lineno + 1))
            })?;
            docs.push(doc);
        }
        Ok(docs)
    }
}

/// Batches held in memory. Asking for an unknown batch is an input error,
/// same as a missing file.
#[derive(Debug, Clone, Default)]
pub struct MemoryBatches {
    batches: BTreeMap<BatchId, Vec<Document>>,
}

impl MemoryBatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(mut self, batch: BatchId, docs: Vec<Document>) -> Self {
        self.batches.insert(batch, docs);
        self
    }
}

impl BatchSource for MemoryBatches {
    fn read_batch(&self, batch: BatchId) -> Result<Vec<Document>> {
        self.batches
            .get(&batch)
            .cloned()
            .ok_or_else(|| IndexError::input(batch, "no such batch"))
    }
}
