//! Coordinator for the batch passes.
//!
//! Every pass maps batches to purely local results on a fixed worker pool and
//! waits for all of them before folding the results together on the calling
//! thread. Workers never share mutable state. Any failed batch fails the pass.

use crate::config::{IndexConfig, Pass, TfVariant};
use crate::corpus::{BatchSource, Document, DocumentFilter};
use crate::counts::TermCounts;
use crate::df::DocumentFrequency;
use crate::error::{IndexError, Result};
use crate::idf::{verify_vocabulary, IdfTable};
use crate::merge::Merge;
use crate::norms::{document_norm, DocumentNorms, MissingIdf};
use crate::partial::PartialIndex;
use crate::persist::{self, IndexPaths, MetaFile};
use crate::shard::{verify_shards, IndexMerger, PendingShard, Shard, ShardRouter, ShardRouting};
use crate::tf::DocumentTerms;
use crate::tokenizer::TermProcessor;
use crate::BatchId;
use rayon::prelude::*;
use std::time::Instant;

const PROGRESS_EVERY: usize = 5_000;

pub struct Pipeline<'a> {
    config: IndexConfig,
    source: &'a dyn BatchSource,
    filter: &'a dyn DocumentFilter,
    processor: &'a dyn TermProcessor,
    pool: rayon::ThreadPool,
}

impl<'a> Pipeline<'a> {
    /// Validates the configuration and sizes the worker pool. Nothing is read yet.
    pub fn new(
        config: IndexConfig,
        source: &'a dyn BatchSource,
        filter: &'a dyn DocumentFilter,
        processor: &'a dyn TermProcessor,
    ) -> Result<Self> {
        config.validate()?;
        let workers = config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("batch-worker-{i}"))
            .build()
            .map_err(|e| IndexError::Configuration(format!("cannot start {workers} workers: {e}")))?;
        tracing::info!(workers, "worker pool ready");
        if config.debug {
            tracing::warn!(
                statistics = ?config.batch_range(Pass::Statistics),
                norms = ?config.batch_range(Pass::Norms),
                collection_size = config.collection_size,
                "debug mode: DF/IDF values will not match the collection size; \
                 statistics and norm passes use different batch ranges"
            );
        }
        Ok(Self { config, source, filter, processor, pool })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn batches(&self, pass: Pass) -> Vec<BatchId> {
        self.config.batch_range(pass).collect()
    }

    fn load_batch(&self, batch: BatchId, pass: Pass) -> Result<Vec<Document>> {
        let docs = self.source.read_batch(batch)?;
        let read = docs.len();
        let mut kept: Vec<Document> = docs.into_iter().filter(|d| self.filter.keep(d)).collect();
        if let Some(limit) = self.config.docs_per_batch(pass) {
            kept.truncate(limit);
        }
        tracing::debug!(batch, read, kept = kept.len(), "filtered batch");
        Ok(kept)
    }

    /// Runs `work` once per batch on the pool and returns results in `batches` order.
    fn map_batches<T, F>(&self, batches: &[BatchId], pass: Pass, label: &str, work: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(BatchId, &[Document]) -> Result<T> + Sync,
    {
        let pass_start = Instant::now();
        let results = self.pool.install(|| {
            batches
                .par_iter()
                .map(|&batch| {
                    let _span = tracing::info_span!("batch", id = batch, pass = label).entered();
                    let start = Instant::now();
                    tracing::info!("start processing batch");
                    let docs = self.load_batch(batch, pass)?;
                    let out = work(batch, &docs)?;
                    tracing::info!(
                        docs = docs.len(),
                        secs = start.elapsed().as_secs_f64(),
                        "finished batch"
                    );
                    Ok(out)
                })
                .collect::<Result<Vec<T>>>()
        })?;
        tracing::info!(
            pass = label,
            batches = batches.len(),
            secs = pass_start.elapsed().as_secs_f64(),
            "pass complete"
        );
        Ok(results)
    }

    fn progress(batch: BatchId, index: usize, total: usize) {
        if index % PROGRESS_EVERY == 0 {
            tracing::debug!(batch, index, total, "processing document");
        }
    }

    /// Occurrences of every term, the reference vocabulary for the cross-pass check.
    pub fn term_counts(&self, batches: &[BatchId]) -> Result<TermCounts> {
        let parts = self.map_batches(batches, Pass::Statistics, "counts", |batch, docs| {
            let mut counts = TermCounts::new();
            for (i, doc) in docs.iter().enumerate() {
                Self::progress(batch, i, docs.len());
                counts.add_terms(&self.processor.terms(&doc.text));
            }
            Ok(counts)
        })?;
        tracing::info!(partials = parts.len(), "merging term counts");
        Ok(TermCounts::merge_all(parts))
    }

    pub fn document_frequencies(&self, batches: &[BatchId]) -> Result<DocumentFrequency> {
        let parts = self.map_batches(batches, Pass::Statistics, "df", |batch, docs| {
            let mut df = DocumentFrequency::new();
            for (i, doc) in docs.iter().enumerate() {
                Self::progress(batch, i, docs.len());
                df.add_document(&self.processor.terms(&doc.text));
            }
            Ok(df)
        })?;
        tracing::info!(partials = parts.len(), "merging document frequencies");
        let df = DocumentFrequency::merge_all(parts);
        tracing::info!(vocabulary = df.len(), "counted document frequencies");
        Ok(df)
    }

    pub fn idf(&self, df: &DocumentFrequency) -> Result<IdfTable> {
        IdfTable::from_document_frequency(df, self.config.collection_size)
    }

    pub fn partial_indices(&self, batches: &[BatchId]) -> Result<Vec<PartialIndex>> {
        self.map_batches(batches, Pass::Statistics, "index", |batch, docs| {
            let mut partial = PartialIndex::new();
            for (i, doc) in docs.iter().enumerate() {
                Self::progress(batch, i, docs.len());
                let terms = DocumentTerms::from_terms(self.processor.terms(&doc.text));
                partial.add_document(&doc.id, &terms);
            }
            Ok(partial)
        })
    }

    /// Folds partials into shards on the calling thread, in the given order.
    pub fn merge<R: ShardRouting>(
        &self,
        router: R,
        partials: Vec<PartialIndex>,
    ) -> Result<Vec<PendingShard>> {
        tracing::info!(
            partials = partials.len(),
            shards = router.num_shards(),
            "merging partial indices"
        );
        let mut merger = IndexMerger::new(router);
        for partial in partials {
            merger.absorb(partial)?;
        }
        Ok(merger.finish())
    }

    pub fn enrich(&self, pending: Vec<PendingShard>, idf: &IdfTable) -> Result<Vec<Shard>> {
        tracing::info!(shards = pending.len(), "attaching IDF values");
        self.pool.install(|| pending.into_par_iter().map(|shard| shard.enrich(idf)).collect())
    }

    /// Partial indices, merge, IDF enrichment and the vocabulary check, without persisting.
    pub fn build_index<R: ShardRouting>(
        &self,
        router: R,
        idf: &IdfTable,
        batches: &[BatchId],
    ) -> Result<Vec<Shard>> {
        let partials = self.partial_indices(batches)?;
        let pending = self.merge(router, partials)?;
        let shards = self.enrich(pending, idf)?;
        verify_shards(&shards, idf)?;
        Ok(shards)
    }

    pub fn document_norms(
        &self,
        idf: &IdfTable,
        variant: TfVariant,
        batches: &[BatchId],
    ) -> Result<DocumentNorms> {
        let missing = if self.config.debug { MissingIdf::Skip } else { MissingIdf::Fail };
        let parts = self.map_batches(batches, Pass::Norms, "norms", |batch, docs| {
            let mut norms = DocumentNorms::new();
            let mut skipped = 0;
            for (i, doc) in docs.iter().enumerate() {
                Self::progress(batch, i, docs.len());
                let terms = DocumentTerms::from_terms(self.processor.terms(&doc.text));
                let (norm, missed) = document_norm(&terms, idf, variant, missing)?;
                skipped += missed;
                norms.insert(doc.id.clone(), norm)?;
            }
            if skipped > 0 {
                tracing::warn!(batch, skipped, "terms without IDF left out of norms (debug run)");
            }
            Ok(norms)
        })?;
        let mut all = DocumentNorms::new();
        for part in parts {
            all.try_merge(part)?;
        }
        tracing::info!(documents = all.len(), %variant, "computed document norms");
        Ok(all)
    }

    /// Counts, DF and IDF over the statistics batch range; checks vocabulary sizes
    /// agree and persists word counts and IDF values.
    pub fn run_statistics(&self, paths: &IndexPaths) -> Result<IdfTable> {
        persist::clear_meta(paths)?;
        let batches = self.batches(Pass::Statistics);
        let counts = self.term_counts(&batches)?;
        let df = self.document_frequencies(&batches)?;
        let idf = self.idf(&df)?;
        verify_vocabulary(&counts, &df, &idf)?;
        if let Some((term, value)) = idf.iter().next() {
            tracing::info!(term, idf = value, "most frequent term");
        }
        persist::save_term_counts(paths, &counts)?;
        persist::save_idf_table(paths, &idf)?;
        if !self.config.statistics_valid() {
            tracing::warn!("IDF values written from a debug run are not valid for the full collection");
        }
        Ok(idf)
    }

    /// Builds and persists all shards.
    pub fn run_index(&self, paths: &IndexPaths, idf: &IdfTable) -> Result<Vec<Shard>> {
        persist::clear_meta(paths)?;
        let router = ShardRouter::new(self.config.num_shards)?;
        let shards = self.build_index(router, idf, &self.batches(Pass::Statistics))?;
        self.pool.install(|| persist::save_shards(paths, &shards))?;
        Ok(shards)
    }

    pub fn run_norms(&self, paths: &IndexPaths, idf: &IdfTable) -> Result<DocumentNorms> {
        persist::clear_meta(paths)?;
        let variant = self.config.variant;
        let norms = self.document_norms(idf, variant, &self.batches(Pass::Norms))?;
        persist::save_norms(paths, variant, &norms)?;
        Ok(norms)
    }

    /// Writes `meta.json`. Every `run_*` pass removes it first, so call this
    /// once, after the last pass of a run succeeded.
    pub fn commit(&self, paths: &IndexPaths, idf: &IdfTable) -> Result<MetaFile> {
        if !paths.shards_dir().exists() {
            return Err(IndexError::Consistency(format!(
                "no shards under {}; run the index pass before committing",
                paths.root.display()
            )));
        }
        let meta = MetaFile::now(
            self.config.collection_size,
            self.config.num_shards,
            ShardRouter::NAME,
            self.config.variant,
            self.config.debug,
            idf.len(),
        );
        persist::save_meta(paths, &meta)?;
        tracing::info!(vocabulary = meta.vocabulary_size, shards = meta.num_shards, "committed run");
        Ok(meta)
    }
}
