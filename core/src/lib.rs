//! Indexing pipeline for TF-IDF retrieval over a batched document corpus.
//!
//! The statistics pass produces term counts, document frequencies and IDF
//! values. The index pass turns the same batches into sharded postings, and the
//! norm pass computes per-document TF-IDF norms. Both later passes read IDF
//! values from the first.

pub mod config;
pub mod corpus;
pub mod counts;
pub mod df;
pub mod error;
pub mod idf;
pub mod merge;
pub mod norms;
pub mod partial;
pub mod persist;
pub mod pipeline;
pub mod shard;
pub mod tf;
pub mod tokenizer;

pub use config::{IndexConfig, Pass, TfVariant};
pub use corpus::{BatchSource, Document, DocumentFilter, JsonlBatchReader, MemoryBatches, NonEmptyText};
pub use counts::TermCounts;
pub use df::DocumentFrequency;
pub use error::{IndexError, Result};
pub use idf::IdfTable;
pub use merge::Merge;
pub use norms::{DocumentNorms, MissingIdf};
pub use partial::{PartialIndex, Posting};
pub use pipeline::Pipeline;
pub use shard::{IndexMerger, PendingShard, Shard, ShardRouter, ShardRouting, TermIndexEntry};
pub use tf::DocumentTerms;
pub use tokenizer::{StandardTermProcessor, TermProcessor};

pub type BatchId = u32;
pub type ShardId = u32;
