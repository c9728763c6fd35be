use crate::error::{IndexError, Result};
use crate::BatchId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

/// Number of wiki pages left after filtering out too short articles.
pub const DEFAULT_COLLECTION_SIZE: u64 = 5_391_645;
pub const DEFAULT_NUM_SHARDS: u32 = 1_000;
pub const DEFAULT_BATCHES: Range<BatchId> = 1..110;

// Debug ranges differ between passes. Kept as-is and reported at startup.
const DEBUG_STATISTICS_BATCHES: Range<BatchId> = 1..3;
const DEBUG_NORM_BATCHES: Range<BatchId> = 108..110;
const DEBUG_NORM_DOCS_PER_BATCH: usize = 3;

/// How a term's frequency inside a document is weighted before multiplying by IDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TfVariant {
    RawCount,
    #[default]
    Relative,
}

impl TfVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            TfVariant::RawCount => "raw_count",
            TfVariant::Relative => "relative",
        }
    }
}

impl fmt::Display for TfVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TfVariant {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw_count" => Ok(TfVariant::RawCount),
            "relative" => Ok(TfVariant::Relative),
            other => Err(IndexError::Configuration(format!(
                "unknown TF weighting variant '{other}' (expected raw_count or relative)"
            ))),
        }
    }
}

/// Which pass a batch range is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Term counts, document frequencies and the inverted index.
    Statistics,
    /// Document norm mapping.
    Norms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Documents in the collection after filtering. Not recomputed from the batches.
    pub collection_size: u64,
    pub num_shards: u32,
    pub variant: TfVariant,
    /// Restricts the batch range. DF/IDF values are invalid in this mode.
    pub debug: bool,
    /// Worker threads; defaults to the number of available cores.
    pub workers: Option<usize>,
    pub first_batch: BatchId,
    pub last_batch_exclusive: BatchId,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection_size: DEFAULT_COLLECTION_SIZE,
            num_shards: DEFAULT_NUM_SHARDS,
            variant: TfVariant::default(),
            debug: false,
            workers: None,
            first_batch: DEFAULT_BATCHES.start,
            last_batch_exclusive: DEFAULT_BATCHES.end,
        }
    }
}

impl IndexConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        let config: IndexConfig = serde_json::from_str(&raw).map_err(|e| IndexError::json(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make any pass meaningless. Runs before any batch work.
    pub fn validate(&self) -> Result<()> {
        if self.collection_size == 0 {
            return Err(IndexError::Configuration("collection size must be positive".into()));
        }
        if self.num_shards == 0 {
            return Err(IndexError::Configuration("number of shards must be positive".into()));
        }
        if self.workers == Some(0) {
            return Err(IndexError::Configuration("worker count must be positive".into()));
        }
        if self.first_batch >= self.last_batch_exclusive {
            return Err(IndexError::Configuration(format!(
                "empty batch range {}..{}",
                self.first_batch, self.last_batch_exclusive
            )));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    pub fn batch_range(&self, pass: Pass) -> Range<BatchId> {
        match (self.debug, pass) {
            (true, Pass::Statistics) => DEBUG_STATISTICS_BATCHES,
            (true, Pass::Norms) => DEBUG_NORM_BATCHES,
            (false, _) => self.first_batch..self.last_batch_exclusive,
        }
    }

    /// Per-batch document cap. Only the debug norm pass is capped.
    pub fn docs_per_batch(&self, pass: Pass) -> Option<usize> {
        match (self.debug, pass) {
            (true, Pass::Norms) => Some(DEBUG_NORM_DOCS_PER_BATCH),
            _ => None,
        }
    }

    /// False whenever the processed batches cannot add up to `collection_size`.
    pub fn statistics_valid(&self) -> bool {
        !self.debug
    }
}
