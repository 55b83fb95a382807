use std::path::PathBuf;

use ciyu_db::DuplicateCandidate;
use tracing::{info, warn};

use crate::index::HashCollision;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub records: usize,
    pub skipped: usize,
}

/// Non-fatal findings and counts from one compile run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CompilationReport {
    pub files: Vec<FileReport>,
    pub records: usize,
    pub entries: usize,
    pub distinct_hashes: usize,
    pub max_candidates_per_key: usize,
    pub max_key_length: usize,
    pub duplicates: Vec<DuplicateCandidate>,
    pub collisions: Vec<HashCollision>,
}

impl CompilationReport {
    /// Entries whose hash is shared with an earlier entry.
    pub fn collision_count(&self) -> usize {
        self.entries - self.distinct_hashes
    }

    pub fn has_warnings(&self) -> bool {
        !self.duplicates.is_empty() || !self.collisions.is_empty()
    }

    pub fn log(&self) {
        for file in &self.files {
            info!(
                "read {} records from {} ({} lines skipped)",
                file.records,
                file.path.display(),
                file.skipped
            );
        }
        for dup in &self.duplicates {
            warn!(
                "duplicate candidate {} for {} ({}) at {}:{}",
                dup.script,
                dup.pronunciation,
                dup.key,
                dup.file.display(),
                dup.line
            );
        }
        if !self.collisions.is_empty() {
            warn!(
                "{} of {} keys share a hash with another key",
                self.collision_count(),
                self.entries
            );
            for collision in &self.collisions {
                warn!(
                    "hash 0x{:08x} shared by {}",
                    collision.hash,
                    collision.keys.join(", ")
                );
            }
        }
        info!(
            "{} records merged into {} keys ({} distinct hashes)",
            self.records, self.entries, self.distinct_hashes
        );
        info!(
            "widest candidate list: {}, longest key: {}",
            self.max_candidates_per_key, self.max_key_length
        );
    }
}
