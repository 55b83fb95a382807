//! Serialize compiled artifacts and write them atomically.
//!
//! Every write goes to a temporary file beside the target and is renamed
//! into place only once fully written, so a failed run never leaves a
//! partial artifact behind. An existing target is only replaced when
//! [`EmitOptions::force`] is set.

use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ciyu_types::CompiledArtifact;
use serde::Deserialize;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Artifact encoding.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON for tooling and std consumers.
    #[default]
    Json,
    /// A Rust module of `const` slices for a `no_std` runtime.
    Rust,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "rust" | "rs" => Ok(OutputFormat::Rust),
            other => Err(format!("unknown output format {other:?} (expected json or rust)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Json => "json",
            OutputFormat::Rust => "rust",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EmitOptions {
    pub format: OutputFormat,
    /// Replace an existing target instead of aborting.
    pub force: bool,
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("{} already exists; pass --force to overwrite", .0.display())]
    Exists(PathBuf),
    #[error("write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("encode artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("render artifact: {0}")]
    Format(#[from] fmt::Error),
}

/// One line of the quality-check sheet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QcRow {
    pub script: String,
    pub pronunciation: String,
    pub key: String,
}

pub fn render(artifact: &CompiledArtifact, format: OutputFormat) -> Result<Vec<u8>, EmitError> {
    match format {
        OutputFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(artifact)?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        OutputFormat::Rust => Ok(render_rust(artifact)?.into_bytes()),
    }
}

pub fn emit_artifact(
    artifact: &CompiledArtifact,
    path: &Path,
    options: EmitOptions,
) -> Result<(), EmitError> {
    stage_artifact(artifact, path, options)?.commit()
}

/// Write `script<TAB>pronunciation<TAB>key` rows for hand-checking keys.
pub fn emit_qc(rows: &[QcRow], path: &Path, force: bool) -> Result<(), EmitError> {
    stage_qc(rows, path, force)?.commit()
}

/// Write the artifact and, optionally, the QC sheet as one unit.
///
/// Both files are fully staged before either target is replaced, so a
/// failure while rendering or writing leaves every existing output as it was.
pub fn emit_outputs(
    artifact: &CompiledArtifact,
    path: &Path,
    qc: Option<(&[QcRow], &Path)>,
    options: EmitOptions,
) -> Result<(), EmitError> {
    let artifact = stage_artifact(artifact, path, options)?;
    let qc = qc
        .map(|(rows, qc_path)| stage_qc(rows, qc_path, options.force))
        .transpose()?;
    artifact.commit()?;
    if let Some(qc) = qc {
        qc.commit()?;
    }
    Ok(())
}

/// A complete temporary file beside its target, not yet moved into place.
/// Dropping it removes the temporary file and leaves the target alone.
pub struct StagedWrite {
    path: PathBuf,
    temp: NamedTempFile,
    force: bool,
}

impl StagedWrite {
    /// Rename the temporary file over the target.
    pub fn commit(self) -> Result<(), EmitError> {
        let StagedWrite { path, temp, force } = self;
        let persisted = if force {
            temp.persist(&path)
        } else {
            temp.persist_noclobber(&path)
        };
        match persisted {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(EmitError::Exists(path))
            }
            Err(e) => Err(EmitError::Io {
                path,
                source: e.error,
            }),
        }
    }
}

pub fn stage_artifact(
    artifact: &CompiledArtifact,
    path: &Path,
    options: EmitOptions,
) -> Result<StagedWrite, EmitError> {
    ensure_writable(path, options.force)?;
    let bytes = render(artifact, options.format)?;
    stage(path, &bytes, options.force)
}

pub fn stage_qc(rows: &[QcRow], path: &Path, force: bool) -> Result<StagedWrite, EmitError> {
    ensure_writable(path, force)?;
    let mut out = String::new();
    for row in rows {
        writeln!(out, "{}\t{}\t{}", row.script, row.pronunciation, row.key)?;
    }
    stage(path, out.as_bytes(), force)
}

fn ensure_writable(path: &Path, force: bool) -> Result<(), EmitError> {
    if !force && path.exists() {
        return Err(EmitError::Exists(path.to_path_buf()));
    }
    Ok(())
}

fn stage(path: &Path, bytes: &[u8], force: bool) -> Result<StagedWrite, EmitError> {
    let io_err = |source| EmitError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(bytes).map_err(io_err)?;
    temp.flush().map_err(io_err)?;
    Ok(StagedWrite {
        path: path.to_path_buf(),
        temp,
        force,
    })
}

fn render_rust(artifact: &CompiledArtifact) -> Result<String, fmt::Error> {
    let table = &artifact.table;
    let mut out = String::new();

    writeln!(out, "// @generated by ciyu-compile. Do not edit by hand.")?;
    writeln!(out, "//")?;
    writeln!(
        out,
        "// Entries are sorted by key; binary-search KEYS and read the same index"
    )?;
    writeln!(out, "// of KEY_HASHES and CANDIDATES.")?;
    writeln!(out)?;
    writeln!(out, "pub const HASH_SEED: u32 = {};", table.hash_seed())?;
    writeln!(
        out,
        "pub const MAX_CANDIDATES_PER_KEY: usize = {};",
        table.max_candidates_per_key()
    )?;
    writeln!(
        out,
        "pub const MAX_KEY_LENGTH: usize = {};",
        table.max_key_length()
    )?;

    writeln!(out, "\npub const KEYS: &[&str] = &[")?;
    for entry in table.entries() {
        writeln!(out, "    {:?},", entry.key)?;
    }
    writeln!(out, "];")?;

    writeln!(out, "\npub const KEY_HASHES: &[u32] = &[")?;
    for entry in table.entries() {
        writeln!(out, "    0x{:08x},", entry.hash)?;
    }
    writeln!(out, "];")?;

    writeln!(out, "\npub const CANDIDATES: &[&[&str]] = &[")?;
    for entry in table.entries() {
        let list: Vec<String> = entry.candidates.iter().map(|c| format!("{c:?}")).collect();
        writeln!(out, "    &[{}],", list.join(", "))?;
    }
    writeln!(out, "];")?;

    writeln!(
        out,
        "\n// Unmerged (key, script) pairs in input order, for verification only."
    )?;
    writeln!(out, "pub const TEST_KEYS: &[&str] = &[")?;
    for pair in &artifact.test_fixture {
        writeln!(out, "    {:?},", pair.key)?;
    }
    writeln!(out, "];")?;
    writeln!(out, "\npub const TEST_SCRIPTS: &[&str] = &[")?;
    for pair in &artifact.test_fixture {
        writeln!(out, "    {:?},", pair.script)?;
    }
    writeln!(out, "];")?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use ciyu_types::{CompiledTable, FixturePair, IndexEntry};

    use super::*;

    fn artifact() -> CompiledArtifact {
        let table = CompiledTable::from_entries(
            vec![
                IndexEntry::new("he", 0x28ba_020d, vec!["喝".into(), "和".into()]),
                IndexEntry::new("ai", 0x0000_00ff, vec!["爱".into()]),
            ],
            0,
            2,
            2,
        );
        let test_fixture = [("he", "喝"), ("ai", "爱"), ("he", "和")]
            .into_iter()
            .map(|(key, script)| FixturePair {
                key: key.into(),
                script: script.into(),
            })
            .collect();
        CompiledArtifact {
            table,
            test_fixture,
        }
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("rs".parse::<OutputFormat>(), Ok(OutputFormat::Rust));
        assert!("toml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn renders_rust_consts_in_key_order() {
        let source = String::from_utf8(render(&artifact(), OutputFormat::Rust).unwrap()).unwrap();
        assert!(source.contains("pub const HASH_SEED: u32 = 0;"));
        assert!(source.contains("pub const MAX_CANDIDATES_PER_KEY: usize = 2;"));
        assert!(source.contains("pub const KEYS: &[&str] = &[\n    \"ai\",\n    \"he\",\n];"));
        assert!(source.contains("    0x000000ff,\n    0x28ba020d,\n"));
        assert!(source.contains("    &[\"爱\"],\n    &[\"喝\", \"和\"],\n"));
        assert!(source.contains(
            "pub const TEST_SCRIPTS: &[&str] = &[\n    \"喝\",\n    \"爱\",\n    \"和\",\n];"
        ));
    }

    #[test]
    fn json_round_trips_through_the_table_type() {
        let bytes = render(&artifact(), OutputFormat::Json).unwrap();
        let parsed: CompiledArtifact = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, artifact());
        assert_eq!(parsed.table.candidates("he"), ["喝", "和"]);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.json");
        std::fs::write(&path, "previous").unwrap();

        let err = emit_artifact(&artifact(), &path, EmitOptions::default()).unwrap_err();
        assert!(matches!(err, EmitError::Exists(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");

        let options = EmitOptions {
            format: OutputFormat::Json,
            force: true,
        };
        emit_artifact(&artifact(), &path, options).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"test_fixture\""));
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autogen_ciyu.rs");
        let options = EmitOptions {
            format: OutputFormat::Rust,
            force: false,
        };
        emit_artifact(&artifact(), &path, options).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, [std::ffi::OsString::from("autogen_ciyu.rs")]);
    }

    #[test]
    fn writes_qc_sheet_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hsk1-qc.tsv");
        let rows = [QcRow {
            script: "女儿".into(),
            pronunciation: "nǚ'ér".into(),
            key: "nver".into(),
        }];
        emit_qc(&rows, &path, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "女儿\tnǚ'ér\tnver\n");
        assert!(matches!(emit_qc(&rows, &path, false), Err(EmitError::Exists(_))));
    }

    fn qc_rows() -> [QcRow; 1] {
        [QcRow {
            script: "喝".into(),
            pronunciation: "hē".into(),
            key: "he".into(),
        }]
    }

    #[test]
    fn failed_artifact_write_keeps_previous_qc_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let qc = dir.path().join("qc.tsv");
        std::fs::write(&qc, "previous qc\n").unwrap();
        let output = dir.path().join("missing_dir").join("table.json");
        let options = EmitOptions {
            format: OutputFormat::Json,
            force: true,
        };

        let rows = qc_rows();
        let qc_out = Some((&rows[..], qc.as_path()));
        let err = emit_outputs(&artifact(), &output, qc_out, options).unwrap_err();
        assert!(matches!(err, EmitError::Io { .. }));
        assert_eq!(std::fs::read_to_string(&qc).unwrap(), "previous qc\n");
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn existing_artifact_blocks_the_qc_sheet_too() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("table.json");
        std::fs::write(&output, "previous").unwrap();
        let qc = dir.path().join("qc.tsv");

        let rows = qc_rows();
        let qc_out = Some((&rows[..], qc.as_path()));
        let err = emit_outputs(&artifact(), &output, qc_out, EmitOptions::default()).unwrap_err();
        assert!(matches!(err, EmitError::Exists(p) if p == output));
        assert!(!qc.exists());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous");
    }

    #[test]
    fn writes_both_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("table.rs");
        let qc = dir.path().join("qc.tsv");
        let options = EmitOptions {
            format: OutputFormat::Rust,
            force: false,
        };

        let rows = qc_rows();
        let qc_out = Some((&rows[..], qc.as_path()));
        emit_outputs(&artifact(), &output, qc_out, options).unwrap();
        assert!(std::fs::read_to_string(&output).unwrap().contains("pub const KEYS"));
        assert_eq!(std::fs::read_to_string(&qc).unwrap(), "喝\thē\the\n");
    }
}
