//! Load ciyu word lists with zero-copy text.
//!
//! Each input is a UTF-8 file of `script<TAB>pronunciation[<TAB>extra...]`
//! lines. Lines starting with `#` and lines without a tab are skipped; a
//! trailing `\r` is ignored. Files are parsed once on load, and
//! [`WordLists::records`] then yields borrowed [`WordRecord`] views in file
//! order, then line order. Callers choose between memory-mapped files or
//! owned buffers at runtime via [`LoadMode`].
//!
//! The [`merge`] module folds those records into homophone groups.
//!
//! # Example
//! ```no_run
//! use ciyu_db::{LoadMode, WordLists};
//!
//! # fn main() -> Result<(), ciyu_db::ReadError> {
//! let lists = WordLists::load(["vocab/hsk1.tsv", "vocab/hsk2.tsv"], LoadMode::Mmap)?;
//! for record in lists.records().take(3) {
//!     println!("{} {} ({})", record.script, record.pronunciation, record.origin);
//! }
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p ciyu-db --example stats -- <file>...`.

pub mod merge;

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use ciyu_types::{Origin, WordRecord};
use memmap2::Mmap;
use thiserror::Error;
use tracing::debug;

pub use merge::{DuplicateCandidate, HomophoneMerger, Merged, merge};

/// Strategy for loading word-list files.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each file (fast, zero-copy).
    #[default]
    Mmap,
    /// Read each file into an owned buffer (portable fallback).
    Owned,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("missing word list: {}", .0.display())]
    Missing(PathBuf),
    #[error("read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}: invalid UTF-8 at byte {offset}", .path.display())]
    Utf8 { path: PathBuf, offset: usize },
    #[error("{}:{line}: empty script or pronunciation", .path.display())]
    MalformedLine { path: PathBuf, line: usize },
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

#[derive(Clone, Copy)]
struct TextRef {
    start: usize,
    len: usize,
}

struct RecordData {
    file: usize,
    line: usize,
    script: TextRef,
    pronunciation: TextRef,
    annotations: Vec<TextRef>,
}

struct SourceFile {
    path: PathBuf,
    buffer: Buffer,
    records: usize,
    skipped: usize,
}

/// Per-file counts gathered while parsing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileStats<'a> {
    pub path: &'a Path,
    pub records: usize,
    pub skipped: usize,
}

/// Parsed word lists, in declared order, backed by mmap or owned buffers.
pub struct WordLists {
    files: Vec<SourceFile>,
    records: Vec<RecordData>,
}

impl WordLists {
    /// Load and parse every file in `paths`, keeping their order.
    ///
    /// Every path is checked for existence before any file is read.
    pub fn load<I, P>(paths: I, mode: LoadMode) -> Result<Self, ReadError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(ReadError::Missing(missing.clone()));
        }

        let mut files = Vec::with_capacity(paths.len());
        let mut records = Vec::new();
        for (file_idx, path) in paths.into_iter().enumerate() {
            let buffer = load_file(&path, mode)?;
            let (parsed, skipped) = parse_word_list(&path, file_idx, buffer.as_slice())?;
            debug!(
                "parsed {} records ({} skipped lines) from {}",
                parsed.len(),
                skipped,
                path.display()
            );
            files.push(SourceFile {
                path,
                buffer,
                records: parsed.len(),
                skipped,
            });
            records.extend(parsed);
        }

        Ok(Self { files, records })
    }

    /// Iterate records in file order, then line order.
    pub fn records(&self) -> impl Iterator<Item = WordRecord<'_>> + '_ {
        self.records.iter().map(|r| self.make_record_view(r))
    }

    /// Raw pronunciation fields, in record order.
    pub fn pronunciations(&self) -> impl Iterator<Item = &str> + '_ {
        self.records
            .iter()
            .map(|r| self.text(r.file, r.pronunciation))
    }

    pub fn files(&self) -> impl Iterator<Item = FileStats<'_>> + '_ {
        self.files.iter().map(|f| FileStats {
            path: &f.path,
            records: f.records,
            skipped: f.skipped,
        })
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    fn make_record_view<'a>(&'a self, data: &'a RecordData) -> WordRecord<'a> {
        WordRecord {
            script: self.text(data.file, data.script),
            pronunciation: self.text(data.file, data.pronunciation),
            annotations: data
                .annotations
                .iter()
                .map(|r| self.text(data.file, *r))
                .collect(),
            origin: Origin {
                file: &self.files[data.file].path,
                line: data.line,
            },
        }
    }

    fn text(&self, file: usize, r: TextRef) -> &str {
        let bytes = self.files[file].buffer.as_slice();
        let slice = &bytes[r.start..r.start + r.len];
        std::str::from_utf8(slice).expect("word list validated as utf8 on load")
    }
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer, ReadError> {
    let io_err = |source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    match mode {
        LoadMode::Mmap => {
            // zero-length maps are rejected on some platforms
            if file.metadata().map_err(io_err)?.len() == 0 {
                return Ok(Buffer::Owned(Vec::new()));
            }
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .map_err(io_err)
        }
        LoadMode::Owned => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).map_err(io_err)?;
            Ok(Buffer::Owned(buf))
        }
    }
}

fn parse_word_list(
    path: &Path,
    file: usize,
    bytes: &[u8],
) -> Result<(Vec<RecordData>, usize), ReadError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ReadError::Utf8 {
        path: path.to_path_buf(),
        offset: e.valid_up_to(),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (lineno, raw_line) in text.split('\n').enumerate() {
        let line = strip_cr(raw_line);
        if line.starts_with('#') || !line.contains('\t') {
            if !line.is_empty() {
                skipped += 1;
            }
            continue;
        }

        let mut fields = line.split('\t');
        let script = fields.next().unwrap_or("");
        let pronunciation = fields.next().unwrap_or("");
        if script.is_empty() || pronunciation.is_empty() {
            return Err(ReadError::MalformedLine {
                path: path.to_path_buf(),
                line: lineno + 1,
            });
        }

        records.push(RecordData {
            file,
            line: lineno + 1,
            script: text_ref_str(bytes, script),
            pronunciation: text_ref_str(bytes, pronunciation),
            annotations: fields.map(|f| text_ref_str(bytes, f)).collect(),
        });
    }

    Ok((records, skipped))
}

fn text_ref_str(root: &[u8], token: &str) -> TextRef {
    let start = token.as_ptr() as usize - root.as_ptr() as usize;
    TextRef {
        start,
        len: token.len(),
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}
