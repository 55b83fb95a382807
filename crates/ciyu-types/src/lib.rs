//! Shared types for compiling ciyu word lists into a pinyin lookup table.
//!
//! Word-list records borrow their text from a backing buffer (`&str`), the
//! same way the loader hands them out. Everything produced after merging
//! (homophone groups, hashed entries, the compiled table and its test
//! fixture) is owned and serializable, since it outlives the input files.
//!
//! Use [`WordRecord`] to inspect parsed lines, [`Homophones`] for merged
//! groups, and [`CompiledTable`] for the sorted artifact handed to a runtime.
//!
//! ```rust
//! use ciyu_types::{CompiledTable, IndexEntry};
//!
//! let table = CompiledTable::from_entries(
//!     vec![
//!         IndexEntry::new("ni", 7, vec!["你".into()]),
//!         IndexEntry::new("he", 3, vec!["喝".into(), "和".into()]),
//!     ],
//!     0,
//!     2,
//!     2,
//! );
//! assert_eq!(table.entries()[0].key, "he");
//! assert_eq!(table.candidates("he"), ["喝", "和"]);
//! assert!(table.candidates("hao").is_empty());
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// File and 1-based line number a record was read from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Origin<'a> {
    pub file: &'a Path,
    pub line: usize,
}

impl fmt::Display for Origin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One `script<TAB>pronunciation[<TAB>extra...]` line of a word list.
///
/// `annotations` holds the trailing fields verbatim (part of speech, glosses,
/// ...). They are carried for diagnostics only and never compiled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WordRecord<'a> {
    pub script: &'a str,
    pub pronunciation: &'a str,
    pub annotations: Vec<&'a str>,
    pub origin: Origin<'a>,
}

/// Scripts sharing one canonical key, in first-seen order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Homophones {
    pub key: String,
    pub candidates: Vec<String>,
}

impl Homophones {
    pub fn new(key: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            candidates: vec![script.into()],
        }
    }

    pub fn contains(&self, script: &str) -> bool {
        self.candidates.iter().any(|c| c == script)
    }
}

/// A canonical key with its 32-bit hash and candidate list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub hash: u32,
    pub candidates: Vec<String>,
}

impl IndexEntry {
    pub fn new(key: impl Into<String>, hash: u32, candidates: Vec<String>) -> Self {
        Self {
            key: key.into(),
            hash,
            candidates,
        }
    }
}

/// Unmerged `(key, script)` pair, one per input record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FixturePair {
    pub key: String,
    pub script: String,
}

/// Immutable lookup table, entries sorted by key.
///
/// Consumers binary-search [`entries`](Self::entries) by key. The per-entry
/// hash is a fingerprint that may be compared before the key string; it is
/// not a search order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "TableParts")]
pub struct CompiledTable {
    hash_seed: u32,
    max_candidates_per_key: usize,
    max_key_length: usize,
    entries: Vec<IndexEntry>,
}

#[derive(Deserialize)]
struct TableParts {
    hash_seed: u32,
    max_candidates_per_key: usize,
    max_key_length: usize,
    entries: Vec<IndexEntry>,
}

impl From<TableParts> for CompiledTable {
    fn from(parts: TableParts) -> Self {
        Self::from_entries(
            parts.entries,
            parts.hash_seed,
            parts.max_candidates_per_key,
            parts.max_key_length,
        )
    }
}

impl CompiledTable {
    /// Build a table, stably sorting `entries` by key.
    pub fn from_entries(
        mut entries: Vec<IndexEntry>,
        hash_seed: u32,
        max_candidates_per_key: usize,
        max_key_length: usize,
    ) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            hash_seed,
            max_candidates_per_key,
            max_key_length,
            entries,
        }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn hash_seed(&self) -> u32 {
        self.hash_seed
    }

    /// Widest candidate list in the table.
    pub fn max_candidates_per_key(&self) -> usize {
        self.max_candidates_per_key
    }

    /// Longest canonical key seen in any input record, in bytes.
    pub fn max_key_length(&self) -> usize {
        self.max_key_length
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary-search an entry by canonical key.
    pub fn find(&self, key: &str) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Candidates for `key`, or an empty slice on a miss.
    pub fn candidates(&self, key: &str) -> &[String] {
        self.find(key)
            .map(|e| e.candidates.as_slice())
            .unwrap_or(&[])
    }
}

/// Everything one compiler run emits: the table plus its verification fixture.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub table: CompiledTable,
    pub test_fixture: Vec<FixturePair>,
}
