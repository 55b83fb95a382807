use std::time::Instant;

use ciyu_db::{ReadError, WordLists, merge};
use ciyu_types::{CompiledArtifact, CompiledTable};
use pinyin_key::{CoverageError, NormalizeError};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{CompileConfig, ConfigError};
use crate::emit::QcRow;
use crate::index;
use crate::report::{CompilationReport, FileReport};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Coverage(#[from] CoverageError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Output of one compile run, not yet written anywhere.
#[derive(Clone, Debug)]
pub struct Compilation {
    pub artifact: CompiledArtifact,
    /// Per-record `script, pronunciation, key` rows in input order.
    pub qc: Vec<QcRow>,
    pub report: CompilationReport,
}

/// Read, check, merge, hash and sort. Touches no output.
///
/// The substitution table's coverage is checked against every input before
/// the first record is merged.
pub fn compile(config: &CompileConfig) -> Result<Compilation, CompileError> {
    if config.inputs.is_empty() {
        return Err(ConfigError::NoInputs.into());
    }
    let normalizer = config.normalizer()?;

    let start = Instant::now();
    let lists = WordLists::load(&config.inputs, config.load_mode)?;
    debug!(
        "loaded {} word lists in {} ms",
        lists.file_count(),
        start.elapsed().as_millis()
    );

    let observed = normalizer.observed_chars(lists.pronunciations());
    normalizer.check_coverage(&observed)?;
    info!(
        "substitution table covers all {} pronunciation characters",
        observed.len()
    );

    let merged = merge(&normalizer, lists.records())?;
    let qc = lists
        .records()
        .zip(&merged.fixture)
        .map(|(record, pair)| QcRow {
            script: record.script.to_string(),
            pronunciation: record.pronunciation.to_string(),
            key: pair.key.clone(),
        })
        .collect();

    let entries = index::hash_entries(merged.entries, config.seed);
    let collisions = index::audit_collisions(&entries);
    let distinct_hashes = index::distinct_hashes(&entries);
    let table = CompiledTable::from_entries(
        entries,
        config.seed,
        merged.max_candidates,
        merged.max_key_length,
    );

    let report = CompilationReport {
        files: lists
            .files()
            .map(|f| FileReport {
                path: f.path.to_path_buf(),
                records: f.records,
                skipped: f.skipped,
            })
            .collect(),
        records: lists.record_count(),
        entries: table.len(),
        distinct_hashes,
        max_candidates_per_key: table.max_candidates_per_key(),
        max_key_length: table.max_key_length(),
        duplicates: merged.duplicates,
        collisions,
    };
    info!("compiled {} keys in {} ms", table.len(), start.elapsed().as_millis());

    Ok(Compilation {
        artifact: CompiledArtifact {
            table,
            test_fixture: merged.fixture,
        },
        qc,
        report,
    })
}
