use std::collections::BTreeMap;

use ciyu_types::{Homophones, IndexEntry};
use pinyin_key::murmur3_32;

/// Distinct keys that landed on one hash.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HashCollision {
    pub hash: u32,
    pub keys: Vec<String>,
}

/// Hash every merged group, keeping merge order.
pub fn hash_entries(homophones: Vec<Homophones>, seed: u32) -> Vec<IndexEntry> {
    homophones
        .into_iter()
        .map(|h| IndexEntry {
            hash: murmur3_32(&h.key, seed),
            key: h.key,
            candidates: h.candidates,
        })
        .collect()
}

/// Group keys sharing a hash, ordered by hash value.
pub fn audit_collisions(entries: &[IndexEntry]) -> Vec<HashCollision> {
    let mut by_hash: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for entry in entries {
        by_hash.entry(entry.hash).or_default().push(&entry.key);
    }
    by_hash
        .into_iter()
        .filter(|(_, keys)| keys.len() > 1)
        .map(|(hash, keys)| HashCollision {
            hash,
            keys: keys.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

pub fn distinct_hashes(entries: &[IndexEntry]) -> usize {
    let mut hashes: Vec<u32> = entries.iter().map(|e| e.hash).collect();
    hashes.sort_unstable();
    hashes.dedup();
    hashes.len()
}
