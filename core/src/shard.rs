use crate::error::{IndexError, Result};
use crate::idf::IdfTable;
use crate::partial::{PartialIndex, Posting};
use crate::ShardId;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Maps a term to the shard holding it. Must be a pure function of the term
/// so that readers can locate a term without any routing table.
pub trait ShardRouting: Send + Sync {
    fn num_shards(&self) -> u32;
    fn shard_of(&self, term: &str) -> ShardId;
}

/// First eight bytes of SHA-1(term), big endian, modulo the shard count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRouter {
    num_shards: u32,
}

impl ShardRouter {
    /// Recorded in run metadata so readers know how to route.
    pub const NAME: &'static str = "sha1-be64-mod";

    pub fn new(num_shards: u32) -> Result<Self> {
        if num_shards == 0 {
            return Err(IndexError::Configuration("number of shards must be positive".into()));
        }
        Ok(Self { num_shards })
    }
}

impl ShardRouting for ShardRouter {
    fn num_shards(&self) -> u32 {
        self.num_shards
    }

    fn shard_of(&self, term: &str) -> ShardId {
        let digest = Sha1::digest(term.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.num_shards as u64) as ShardId
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermIndexEntry {
    pub idf: f64,
    pub docs: Vec<Posting>,
}

/// A shard after merging, before IDF values are attached.
#[derive(Debug, Clone, Default)]
pub struct PendingShard {
    pub id: ShardId,
    entries: HashMap<String, Vec<Posting>>,
}

impl PendingShard {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attaches the IDF of every term. A term the statistics pass never saw is a
    /// hard error; no default value is substituted.
    pub fn enrich(self, idf: &IdfTable) -> Result<Shard> {
        let mut entries = BTreeMap::new();
        for (term, docs) in self.entries {
            let value = idf.require(&term).map_err(|e| match e {
                IndexError::Consistency(msg) => {
                    IndexError::Consistency(format!("shard #{}: {msg}", self.id))
                }
                other => other,
            })?;
            entries.insert(term, TermIndexEntry { idf: value, docs });
        }
        Ok(Shard { id: self.id, entries })
    }
}

/// Term -> entry for the subset of the vocabulary routed to `id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shard {
    pub id: ShardId,
    pub entries: BTreeMap<String, TermIndexEntry>,
}

impl Shard {
    pub fn get(&self, term: &str) -> Option<&TermIndexEntry> {
        self.entries.get(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn posting_count(&self) -> usize {
        self.entries.values().map(|e| e.docs.len()).sum()
    }
}

/// Folds per-batch partial indices into a fixed set of shards.
///
/// Postings are only ever appended, so every posting of every absorbed partial
/// ends up in exactly one shard. Absorbing partials in a different order only
/// changes the order of postings within a term.
pub struct IndexMerger<R: ShardRouting> {
    router: R,
    shards: Vec<HashMap<String, Vec<Posting>>>,
    absorbed: usize,
}

impl<R: ShardRouting> IndexMerger<R> {
    pub fn new(router: R) -> Self {
        let shards = (0..router.num_shards()).map(|_| HashMap::new()).collect();
        Self { router, shards, absorbed: 0 }
    }

    pub fn absorb(&mut self, partial: PartialIndex) -> Result<()> {
        for (term, docs) in partial.into_entries() {
            let shard_id = self.router.shard_of(&term);
            let shard = self.shards.get_mut(shard_id as usize).ok_or_else(|| {
                IndexError::Consistency(format!(
                    "router sent '{term}' to shard #{shard_id} of {}",
                    self.router.num_shards()
                ))
            })?;
            shard.entry(term).or_default().extend(docs);
        }
        self.absorbed += 1;
        tracing::debug!(absorbed = self.absorbed, "merged partial index");
        Ok(())
    }

    /// Every shard id in `0..num_shards`, including empty ones.
    pub fn finish(self) -> Vec<PendingShard> {
        self.shards
            .into_iter()
            .enumerate()
            .map(|(id, entries)| PendingShard { id: id as ShardId, entries })
            .collect()
    }
}

/// The shards' key sets must be disjoint and together equal the IDF vocabulary.
pub fn verify_shards(shards: &[Shard], idf: &IdfTable) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(idf.len());
    for shard in shards {
        for term in shard.terms() {
            if !seen.insert(term) {
                return Err(IndexError::Consistency(format!(
                    "term '{term}' appears in more than one shard"
                )));
            }
        }
    }
    if seen.len() != idf.len() {
        return Err(IndexError::Consistency(format!(
            "index holds {} terms but the IDF table has {}",
            seen.len(),
            idf.len()
        )));
    }
    Ok(())
}
