use crate::config::TfVariant;
use crate::counts::TermCounts;
use crate::error::{IndexError, Result};
use crate::idf::IdfTable;
use crate::norms::DocumentNorms;
use crate::shard::{Shard, ShardRouting, TermIndexEntry};
use crate::ShardId;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

/// Describes a completed index build. Written last, so a directory without it
/// holds an incomplete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub collection_size: u64,
    pub num_shards: u32,
    pub router: String,
    /// TF weighting used for the document norms of this run.
    pub variant: TfVariant,
    pub debug: bool,
    /// False when DF/IDF were computed over fewer batches than `collection_size` covers.
    pub statistics_valid: bool,
    pub vocabulary_size: usize,
}

impl MetaFile {
    pub fn now(
        collection_size: u64,
        num_shards: u32,
        router: &str,
        variant: TfVariant,
        debug: bool,
        vocabulary_size: usize,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
            collection_size,
            num_shards,
            router: router.to_string(),
            variant,
            debug,
            statistics_valid: !debug,
            vocabulary_size,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WordCountRecord {
    word: String,
    count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdfRecord {
    word: String,
    idf: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct NormRecord {
    doc_id: String,
    norm: f64,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn word_counts(&self) -> PathBuf { self.root.join("word_counts.jsonl") }
    pub fn idf_values(&self) -> PathBuf { self.root.join("idf_values.jsonl") }
    pub fn shards_dir(&self) -> PathBuf { self.root.join("shards") }
    fn staging_dir(&self) -> PathBuf { self.root.join("shards.staging") }
    pub fn shard(&self, id: ShardId) -> PathBuf { shard_file(&self.shards_dir(), id) }
    pub fn document_norms(&self, variant: TfVariant) -> PathBuf {
        self.root.join(format!("document_norms_{variant}.jsonl"))
    }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn shard_file(dir: &Path, id: ShardId) -> PathBuf {
    dir.join(format!("shard-{id:05}.json"))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes through a temporary sibling and renames, so readers never see half a file.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;
    }
    let tmp = tmp_path(path);
    let file = File::create(&tmp).map_err(|e| IndexError::io(&tmp, e))?;
    let mut out = BufWriter::new(file);
    write(&mut out)?;
    out.flush().map_err(|e| IndexError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| IndexError::io(path, e))?;
    Ok(())
}

fn write_jsonl<T, I>(path: &Path, records: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    write_atomic(path, |out| {
        for record in records {
            serde_json::to_writer(&mut *out, &record).map_err(|e| IndexError::json(path, e))?;
            out.write_all(b"\n").map_err(|e| IndexError::io(path, e))?;
        }
        Ok(())
    })
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| IndexError::io(path, e))?;
    let mut out = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| IndexError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line).map_err(|e| IndexError::json(path, e))?);
    }
    Ok(out)
}

pub fn save_term_counts(paths: &IndexPaths, counts: &TermCounts) -> Result<()> {
    let records = counts
        .most_common()
        .into_iter()
        .map(|(word, count)| WordCountRecord { word, count });
    write_jsonl(&paths.word_counts(), records)
}

pub fn load_term_counts(paths: &IndexPaths) -> Result<TermCounts> {
    let records: Vec<WordCountRecord> = read_jsonl(&paths.word_counts())?;
    Ok(records.into_iter().map(|r| (r.word, r.count)).collect())
}

/// One `{"word", "idf"}` record per term, in table order.
pub fn save_idf_table(paths: &IndexPaths, idf: &IdfTable) -> Result<()> {
    let records = idf.iter().map(|(word, idf)| IdfRecord { word: word.to_string(), idf });
    write_jsonl(&paths.idf_values(), records)
}

pub fn load_idf_table(paths: &IndexPaths) -> Result<IdfTable> {
    let records: Vec<IdfRecord> = read_jsonl(&paths.idf_values())?;
    IdfTable::from_records(records.into_iter().map(|r| (r.word, r.idf)))
}

/// Persists every shard, one writer per shard, into a staging directory and
/// swaps it in once all of them succeeded. On failure no `shards/` from this
/// run exists.
pub fn save_shards(paths: &IndexPaths, shards: &[Shard]) -> Result<()> {
    let staging = paths.staging_dir();
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| IndexError::io(&staging, e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| IndexError::io(&staging, e))?;

    shards.par_iter().try_for_each(|shard| {
        if shard.id % 100 == 0 {
            tracing::info!(shard = shard.id, "storing shard");
        }
        let path = shard_file(&staging, shard.id);
        write_atomic(&path, |out| {
            serde_json::to_writer(out, &shard.entries).map_err(|e| IndexError::json(&path, e))
        })
    })?;

    let target = paths.shards_dir();
    if target.exists() {
        fs::remove_dir_all(&target).map_err(|e| IndexError::io(&target, e))?;
    }
    fs::rename(&staging, &target).map_err(|e| IndexError::io(&target, e))?;
    tracing::info!(shards = shards.len(), dir = %target.display(), "stored shards");
    Ok(())
}

pub fn load_shard(paths: &IndexPaths, id: ShardId) -> Result<Shard> {
    let path = paths.shard(id);
    let file = File::open(&path).map_err(|e| IndexError::io(&path, e))?;
    let entries: BTreeMap<String, TermIndexEntry> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| IndexError::json(&path, e))?;
    Ok(Shard { id, entries })
}

/// Resolves a term the way any index reader has to: route, then open one shard.
pub fn load_term_entry<R: ShardRouting>(
    paths: &IndexPaths,
    router: &R,
    term: &str,
) -> Result<Option<TermIndexEntry>> {
    let mut shard = load_shard(paths, router.shard_of(term))?;
    Ok(shard.entries.remove(term))
}

pub fn save_norms(paths: &IndexPaths, variant: TfVariant, norms: &DocumentNorms) -> Result<()> {
    let records = norms.iter().map(|(doc_id, norm)| NormRecord { doc_id: doc_id.to_string(), norm });
    write_jsonl(&paths.document_norms(variant), records)
}

pub fn load_norms(paths: &IndexPaths, variant: TfVariant) -> Result<DocumentNorms> {
    let records: Vec<NormRecord> = read_jsonl(&paths.document_norms(variant))?;
    let mut norms = DocumentNorms::new();
    for r in records {
        norms.insert(r.doc_id, r.norm)?;
    }
    Ok(norms)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    write_atomic(&path, |out| {
        serde_json::to_writer_pretty(out, meta).map_err(|e| IndexError::json(&path, e))
    })
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let raw = fs::read_to_string(&path).map_err(|e| IndexError::io(&path, e))?;
    serde_json::from_str(&raw).map_err(|e| IndexError::json(&path, e))
}

/// Removes the completion marker before a new build starts writing.
pub fn clear_meta(paths: &IndexPaths) -> Result<()> {
    let path = paths.meta();
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IndexError::io(&path, e)),
    }
}
