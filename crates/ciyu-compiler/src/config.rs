//! Compile settings from an optional JSON file plus command-line overrides.
//!
//! ```json
//! {
//!   "inputs": ["hsk1.tsv", "hsk2.tsv"],
//!   "elide": " '-",
//!   "seed": 0,
//!   "output": "../src/autogen_ciyu.rs",
//!   "format": "rust",
//!   "qc": "hsk-qc-do-not-edit.tsv"
//! }
//! ```
//!
//! Relative paths resolve against the config file's directory. Omitting
//! `substitutions` selects the shipped pinyin table; when present it maps
//! each single source character to its ASCII replacement.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ciyu_db::LoadMode;
use pinyin_key::{DEFAULT_ELIDE, Normalizer, SubstitutionTable, TableError};
use serde::Deserialize;
use thiserror::Error;

use crate::emit::{EmitOptions, OutputFormat};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no input word lists configured")]
    NoInputs,
    #[error("substitution source {0:?} must be exactly one character")]
    SubstitutionKey(String),
    #[error("invalid substitution table: {0}")]
    Table(#[from] TableError),
}

/// On-disk config; every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub inputs: Option<Vec<PathBuf>>,
    pub elide: Option<String>,
    pub substitutions: Option<BTreeMap<String, String>>,
    pub seed: Option<u32>,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub qc: Option<PathBuf>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ConfigFile =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        if let Some(inputs) = config.inputs.as_mut() {
            for input in inputs.iter_mut() {
                *input = base.join(&*input);
            }
        }
        for target in [config.output.as_mut(), config.qc.as_mut()]
            .into_iter()
            .flatten()
        {
            *target = base.join(&*target);
        }
        Ok(config)
    }
}

/// Values given on the command line; `None`/empty defers to the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub inputs: Vec<PathBuf>,
    pub seed: Option<u32>,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub qc: Option<PathBuf>,
    pub load_mode: Option<LoadMode>,
    pub force: bool,
}

/// What the pure compile step needs.
#[derive(Clone, Debug)]
pub struct CompileConfig {
    /// Word lists, earliest first; earlier files win first-seen order.
    pub inputs: Vec<PathBuf>,
    pub elide: Vec<char>,
    /// `None` selects [`SubstitutionTable::pinyin`].
    pub substitutions: Option<Vec<(char, String)>>,
    pub seed: u32,
    pub load_mode: LoadMode,
}

impl CompileConfig {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            elide: DEFAULT_ELIDE.to_vec(),
            substitutions: None,
            seed: 0,
            load_mode: LoadMode::default(),
        }
    }

    pub fn normalizer(&self) -> Result<Normalizer, ConfigError> {
        let table = match &self.substitutions {
            Some(pairs) => SubstitutionTable::new(pairs.iter().cloned())?,
            None => SubstitutionTable::pinyin(),
        };
        Ok(Normalizer::new(table, self.elide.iter().copied())?)
    }
}

/// Fully resolved settings for one CLI run.
#[derive(Clone, Debug)]
pub struct Settings {
    pub compile: CompileConfig,
    pub output: Option<PathBuf>,
    pub qc: Option<PathBuf>,
    pub emit: EmitOptions,
}

impl Settings {
    pub fn resolve(file: Option<ConfigFile>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let inputs = if overrides.inputs.is_empty() {
            file.inputs.unwrap_or_default()
        } else {
            overrides.inputs
        };
        if inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }

        let substitutions = file
            .substitutions
            .map(|map| {
                map.into_iter()
                    .map(|(from, to)| single_char(&from).map(|c| (c, to)))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let mut compile = CompileConfig::new(inputs);
        if let Some(elide) = file.elide {
            compile.elide = elide.chars().collect();
        }
        compile.substitutions = substitutions;
        compile.seed = overrides.seed.or(file.seed).unwrap_or(0);
        compile.load_mode = overrides.load_mode.unwrap_or_default();
        // surface table errors before any file is read
        compile.normalizer()?;

        Ok(Self {
            compile,
            output: overrides.output.or(file.output),
            qc: overrides.qc.or(file.qc),
            emit: EmitOptions {
                format: overrides.format.or(file.format).unwrap_or_default(),
                force: overrides.force,
            },
        })
    }
}

fn single_char(raw: &str) -> Result<char, ConfigError> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::SubstitutionKey(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("ciyu.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn resolves_relative_paths_against_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"inputs": ["hsk1.tsv", "/abs/hsk2.tsv"], "output": "out/table.rs", "format": "rust"}"#,
        );
        let file = ConfigFile::load(&path).unwrap();
        assert_eq!(
            file.inputs.as_deref(),
            Some(&[dir.path().join("hsk1.tsv"), PathBuf::from("/abs/hsk2.tsv")][..])
        );
        assert_eq!(file.output, Some(dir.path().join("out/table.rs")));
        assert_eq!(file.format, Some(OutputFormat::Rust));
    }

    #[test]
    fn command_line_overrides_the_file() {
        let file = ConfigFile {
            inputs: Some(vec!["a.tsv".into()]),
            seed: Some(7),
            format: Some(OutputFormat::Rust),
            ..ConfigFile::default()
        };
        let settings = Settings::resolve(
            Some(file),
            Overrides {
                inputs: vec!["b.tsv".into()],
                seed: Some(1),
                force: true,
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(settings.compile.inputs, [PathBuf::from("b.tsv")]);
        assert_eq!(settings.compile.seed, 1);
        assert_eq!(settings.emit.format, OutputFormat::Rust);
        assert!(settings.emit.force);
        assert_eq!(settings.compile.elide, DEFAULT_ELIDE);
    }

    #[test]
    fn defaults_without_a_file() {
        let settings = Settings::resolve(
            None,
            Overrides {
                inputs: vec!["hsk1.tsv".into()],
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(settings.compile.seed, 0);
        assert_eq!(settings.compile.load_mode, LoadMode::Mmap);
        assert_eq!(settings.emit.format, OutputFormat::Json);
        assert!(settings.compile.substitutions.is_none());
        assert!(settings.output.is_none());
    }

    #[test]
    fn requires_inputs() {
        let err = Settings::resolve(None, Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoInputs));
    }

    #[test]
    fn validates_custom_substitutions() {
        let file = ConfigFile {
            inputs: Some(vec!["a.tsv".into()]),
            substitutions: Some(BTreeMap::from([
                ("ā".into(), "a".into()),
                ("a".into(), "a".into()),
            ])),
            ..ConfigFile::default()
        };
        let settings = Settings::resolve(Some(file), Overrides::default()).unwrap();
        let norm = settings.compile.normalizer().unwrap();
        assert_eq!(norm.normalize("Ā a").unwrap(), "aa");

        let file = ConfigFile {
            inputs: Some(vec!["a.tsv".into()]),
            substitutions: Some(BTreeMap::from([("ng".into(), "n".into())])),
            ..ConfigFile::default()
        };
        let err = Settings::resolve(Some(file), Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::SubstitutionKey(k) if k == "ng"));

        let file = ConfigFile {
            inputs: Some(vec!["a.tsv".into()]),
            elide: Some("-".into()),
            substitutions: Some(BTreeMap::from([("-".into(), "x".into())])),
            ..ConfigFile::default()
        };
        let err = Settings::resolve(Some(file), Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Table(TableError::ElidedSource('-'))));
    }

    #[test]
    fn rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"inputz": []}"#);
        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
