use std::collections::{BTreeMap, BTreeSet};
use wikidx_core::persist::{self, IndexPaths};
use wikidx_core::shard::verify_shards;
use wikidx_core::{
    Document, IdfTable, IndexConfig, IndexError, MemoryBatches, NonEmptyText, Pass, Pipeline, Posting, Shard,
    ShardRouter, ShardRouting, TfVariant,
};

fn split(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn corpus() -> MemoryBatches {
    MemoryBatches::new()
        .with_batch(
            1,
            vec![
                Document::new("d1", "fox dog fox cat"),
                Document::new("d2", "dog bird"),
                Document::new("d3", "   "),
            ],
        )
        .with_batch(2, vec![Document::new("d4", "fox fox fox"), Document::new("d5", "cat cat dog fish")])
        .with_batch(3, vec![Document::new("d6", "bird fox")])
}

fn config() -> IndexConfig {
    IndexConfig {
        collection_size: 1000,
        num_shards: 4,
        workers: Some(2),
        first_batch: 1,
        last_batch_exclusive: 4,
        ..IndexConfig::default()
    }
}

/// term -> set of postings, ignoring posting order.
fn posting_sets(shards: &[Shard]) -> BTreeMap<String, BTreeSet<(String, u32, u64)>> {
    let mut out = BTreeMap::new();
    for shard in shards {
        for (term, entry) in &shard.entries {
            let set = entry
                .docs
                .iter()
                .map(|p: &Posting| (p.doc_id.clone(), p.raw_count, p.relative_frequency.to_bits()))
                .collect();
            out.insert(term.clone(), set);
        }
    }
    out
}

#[test]
fn vocabulary_agrees_across_passes() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let batches = pipeline.batches(Pass::Statistics);
    let counts = pipeline.term_counts(&batches).unwrap();
    let df = pipeline.document_frequencies(&batches).unwrap();
    let idf = pipeline.idf(&df).unwrap();
    assert_eq!(counts.len(), 5);
    assert_eq!(df.len(), counts.len());
    assert_eq!(idf.len(), df.len());
}

#[test]
fn document_frequency_and_idf_values() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let df = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    assert_eq!(df.get("fox"), Some(3));
    assert_eq!(df.get("dog"), Some(3));
    assert_eq!(df.get("cat"), Some(2));
    assert_eq!(df.get("bird"), Some(2));
    assert_eq!(df.get("fish"), Some(1));
    assert!(df.iter().all(|(_, count)| count >= 1));

    let idf = pipeline.idf(&df).unwrap();
    for (term, count) in df.iter() {
        let expected = (1000.0 / count as f64).log10();
        assert!((idf.get(term).unwrap() - expected).abs() < 1e-12);
    }
    assert!((idf.get("fish").unwrap() - 3.0).abs() < 1e-12);
}

#[test]
fn document_frequency_is_idempotent_and_order_independent() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let first = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    let again = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    let shuffled = pipeline.document_frequencies(&[3, 1, 2]).unwrap();
    assert_eq!(first, again);
    assert_eq!(first, shuffled);
}

#[test]
fn merged_index_is_lossless_and_order_independent() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let df = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    let idf = pipeline.idf(&df).unwrap();

    let partials = pipeline.partial_indices(&[1, 2, 3]).unwrap();
    let emitted: usize = partials.iter().map(|p| p.posting_count()).sum();

    let forward = pipeline.build_index(ShardRouter::new(4).unwrap(), &idf, &[1, 2, 3]).unwrap();
    let backward = pipeline.build_index(ShardRouter::new(4).unwrap(), &idf, &[3, 2, 1]).unwrap();

    let stored: usize = forward.iter().map(Shard::posting_count).sum();
    assert_eq!(stored, emitted);
    assert_eq!(posting_sets(&forward), posting_sets(&backward));

    // every (term, doc) pair stored exactly once
    let mut pairs = BTreeSet::new();
    for shard in &forward {
        for (term, entry) in &shard.entries {
            for p in &entry.docs {
                assert!(pairs.insert((term.clone(), p.doc_id.clone())), "duplicate posting {term}/{}", p.doc_id);
            }
        }
    }
    assert_eq!(pairs.len(), emitted);
}

#[test]
fn postings_carry_raw_and_relative_frequency() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let df = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    let idf = pipeline.idf(&df).unwrap();
    let shards = pipeline.build_index(ShardRouter::new(4).unwrap(), &idf, &[1, 2, 3]).unwrap();

    let router = ShardRouter::new(4).unwrap();
    let fox = shards[router.shard_of("fox") as usize].get("fox").unwrap();
    assert_eq!(fox.idf, idf.get("fox").unwrap());
    let d1 = fox.docs.iter().find(|p| p.doc_id == "d1").unwrap();
    assert_eq!(d1.raw_count, 2);
    assert_eq!(d1.relative_frequency, 0.5);
    // filtered-out document never shows up
    assert!(shards.iter().flat_map(|s| s.entries.values()).all(|e| e.docs.iter().all(|p| p.doc_id != "d3")));
}

#[test]
fn sharding_is_total_disjoint_and_reproducible() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let df = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    let idf = pipeline.idf(&df).unwrap();
    let router = ShardRouter::new(3).unwrap();

    let one = pipeline.build_index(router, &idf, &[1, 2, 3]).unwrap();
    let two = pipeline.build_index(router, &idf, &[2, 3, 1]).unwrap();
    assert_eq!(one.len(), 3);
    verify_shards(&one, &idf).unwrap();
    for (a, b) in one.iter().zip(two.iter()) {
        assert_eq!(a.terms().collect::<Vec<_>>(), b.terms().collect::<Vec<_>>());
        for term in a.terms() {
            assert_eq!(router.shard_of(term), a.id);
        }
    }
}

#[test]
fn norms_follow_the_weighting_variant() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let df = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    let idf = pipeline.idf(&df).unwrap();
    let fox = idf.get("fox").unwrap();

    let relative = pipeline.document_norms(&idf, TfVariant::Relative, &[1, 2, 3]).unwrap();
    let raw = pipeline.document_norms(&idf, TfVariant::RawCount, &[1, 2, 3]).unwrap();
    assert_eq!(relative.len(), 5);
    assert!((relative.get("d4").unwrap() - fox).abs() < 1e-12);
    assert!((raw.get("d4").unwrap() - 3.0 * fox).abs() < 1e-12);

    // d1: fox 2/4, dog 1/4, cat 1/4
    let expected = ((0.5 * fox).powi(2)
        + (0.25 * idf.get("dog").unwrap()).powi(2)
        + (0.25 * idf.get("cat").unwrap()).powi(2))
    .sqrt();
    assert!((relative.get("d1").unwrap() - expected).abs() < 1e-12);
}

#[test]
fn missing_batch_fails_the_pass() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let err = pipeline.document_frequencies(&[1, 2, 9]).unwrap_err();
    assert!(matches!(err, IndexError::Input { batch: 9, .. }));
}

#[test]
fn index_term_without_idf_is_fatal() {
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let partial_idf = IdfTable::from_records(vec![("fox".to_string(), 1.0)]).unwrap();
    let err = pipeline.build_index(ShardRouter::new(2).unwrap(), &partial_idf, &[1]).unwrap_err();
    assert!(matches!(err, IndexError::Consistency(_)));
    let err = pipeline.document_norms(&partial_idf, TfVariant::Relative, &[1]).unwrap_err();
    assert!(matches!(err, IndexError::Consistency(_)));
}

#[test]
fn duplicate_document_ids_across_batches_are_rejected() {
    let source = corpus().with_batch(4, vec![Document::new("d1", "fox")]);
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let df = pipeline.document_frequencies(&[1, 2, 3]).unwrap();
    let idf = pipeline.idf(&df).unwrap();
    let err = pipeline.document_norms(&idf, TfVariant::Relative, &[1, 4]).unwrap_err();
    assert!(matches!(err, IndexError::Consistency(_)));
}

#[test]
fn invalid_configuration_is_rejected_before_work() {
    let source = MemoryBatches::new();
    let bad = IndexConfig { num_shards: 0, ..config() };
    assert!(matches!(
        Pipeline::new(bad, &source, &NonEmptyText, &split),
        Err(IndexError::Configuration(_))
    ));
}

#[test]
fn full_run_persists_readable_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();

    let idf = pipeline.run_statistics(&paths).unwrap();
    let shards = pipeline.run_index(&paths, &idf).unwrap();
    let norms = pipeline.run_norms(&paths, &idf).unwrap();
    pipeline.commit(&paths, &idf).unwrap();

    let loaded_idf = persist::load_idf_table(&paths).unwrap();
    assert_eq!(loaded_idf, idf);
    let first: Vec<&str> = loaded_idf.iter().map(|(t, _)| t).take(2).collect();
    assert_eq!(first, vec!["dog", "fox"]);

    assert_eq!(persist::load_term_counts(&paths).unwrap().get("fox"), 6);

    for shard in &shards {
        assert_eq!(&persist::load_shard(&paths, shard.id).unwrap(), shard);
    }
    let router = ShardRouter::new(4).unwrap();
    let fox = persist::load_term_entry(&paths, &router, "fox").unwrap().unwrap();
    assert_eq!(fox.docs.len(), 3);
    assert!(persist::load_term_entry(&paths, &router, "wolf").unwrap().is_none());

    let meta = persist::load_meta(&paths).unwrap();
    assert_eq!(meta.num_shards, 4);
    assert_eq!(meta.vocabulary_size, 5);
    assert_eq!(meta.router, ShardRouter::NAME);
    assert_eq!(meta.variant, TfVariant::Relative);
    assert!(meta.statistics_valid);

    assert_eq!(persist::load_norms(&paths, TfVariant::Relative).unwrap(), norms);
    assert!(!dir.path().join("shards.staging").exists());
}

#[test]
fn failed_index_run_leaves_no_shards() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let partial_idf = IdfTable::from_records(vec![("fox".to_string(), 1.0)]).unwrap();

    assert!(pipeline.run_index(&paths, &partial_idf).is_err());
    assert!(!paths.shards_dir().exists());
    assert!(!paths.meta().exists());
}

#[test]
fn debug_run_completes_and_is_flagged_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let many: Vec<Document> = (0..5).map(|i| Document::new(format!("late{i}"), "wolf fox moon")).collect();
    let source = corpus().with_batch(108, many).with_batch(109, vec![Document::new("last", "fox")]);
    let debug = IndexConfig { debug: true, ..config() };
    let pipeline = Pipeline::new(debug, &source, &NonEmptyText, &split).unwrap();

    let idf = pipeline.run_statistics(&paths).unwrap();
    assert_eq!(idf.len(), 5);
    pipeline.run_index(&paths, &idf).unwrap();
    let norms = pipeline.run_norms(&paths, &idf).unwrap();
    pipeline.commit(&paths, &idf).unwrap();

    assert!(!persist::load_meta(&paths).unwrap().statistics_valid);
    // norm pass reads 108..110, three documents per batch at most
    assert_eq!(norms.len(), 4);
    assert!(norms.get("last").is_some());
    assert!(norms.get("d1").is_none());
}

fn committed_run(paths: &IndexPaths, source: &MemoryBatches, config: IndexConfig) {
    let pipeline = Pipeline::new(config, source, &NonEmptyText, &split).unwrap();
    let idf = pipeline.run_statistics(paths).unwrap();
    pipeline.run_index(paths, &idf).unwrap();
    pipeline.run_norms(paths, &idf).unwrap();
    pipeline.commit(paths, &idf).unwrap();
    assert!(paths.meta().exists());
}

#[test]
fn statistics_rerun_invalidates_previous_index() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let source = corpus();
    committed_run(&paths, &source, IndexConfig { last_batch_exclusive: 2, ..config() });
    assert_eq!(persist::load_meta(&paths).unwrap().vocabulary_size, 4);

    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let idf = pipeline.run_statistics(&paths).unwrap();
    assert_eq!(idf.len(), 5);
    // old shards no longer match the new IDF values
    assert!(!paths.meta().exists());
}

#[test]
fn failed_norm_pass_leaves_run_uncommitted() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    committed_run(&paths, &corpus(), config());

    let source = corpus().with_batch(4, vec![Document::new("d1", "fox")]);
    let wider = IndexConfig { last_batch_exclusive: 5, ..config() };
    let pipeline = Pipeline::new(wider, &source, &NonEmptyText, &split).unwrap();
    let idf = persist::load_idf_table(&paths).unwrap();
    assert!(matches!(pipeline.run_norms(&paths, &idf), Err(IndexError::Consistency(_))));
    assert!(!paths.meta().exists());
}

#[test]
fn commit_requires_shards_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let source = corpus();
    let pipeline = Pipeline::new(config(), &source, &NonEmptyText, &split).unwrap();
    let idf = pipeline.run_statistics(&paths).unwrap();
    assert!(matches!(pipeline.commit(&paths, &idf), Err(IndexError::Consistency(_))));
    assert!(!paths.meta().exists());
}
