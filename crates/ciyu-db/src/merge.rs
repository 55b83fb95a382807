//! Fold word records into homophone groups.
//!
//! Records are consumed in file-then-line order. Each canonical key keeps
//! the position it was first seen at, so the output order never depends on
//! hash-map iteration. Scripts are appended to their key's candidate list
//! unless already present, in which case the repeat is reported as a
//! [`DuplicateCandidate`] and otherwise ignored.

use std::collections::HashMap;
use std::path::PathBuf;

use ciyu_types::{FixturePair, Homophones, WordRecord};
use pinyin_key::{NormalizeError, Normalizer};

/// The same script seen twice under one key.
///
/// Usually two parts of speech sharing spelling and pronunciation; reported,
/// never fatal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DuplicateCandidate {
    pub key: String,
    pub script: String,
    pub pronunciation: String,
    pub file: PathBuf,
    pub line: usize,
}

/// Result of merging every record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Merged {
    /// Homophone groups in first-seen key order.
    pub entries: Vec<Homophones>,
    /// One `(key, script)` pair per record, in input order.
    pub fixture: Vec<FixturePair>,
    pub max_candidates: usize,
    pub max_key_length: usize,
    pub duplicates: Vec<DuplicateCandidate>,
}

/// Insertion-ordered key -> candidates accumulator.
pub struct HomophoneMerger<'n> {
    normalizer: &'n Normalizer,
    merged: Merged,
    positions: HashMap<String, usize>,
}

impl<'n> HomophoneMerger<'n> {
    pub fn new(normalizer: &'n Normalizer) -> Self {
        Self {
            normalizer,
            merged: Merged::default(),
            positions: HashMap::new(),
        }
    }

    pub fn push(&mut self, record: &WordRecord<'_>) -> Result<(), NormalizeError> {
        let key = self.normalizer.normalize(record.pronunciation)?;
        let merged = &mut self.merged;

        merged.fixture.push(FixturePair {
            key: key.clone(),
            script: record.script.to_string(),
        });
        merged.max_key_length = merged.max_key_length.max(key.len());

        match self.positions.get(&key) {
            None => {
                self.positions.insert(key.clone(), merged.entries.len());
                merged.entries.push(Homophones::new(key, record.script));
                merged.max_candidates = merged.max_candidates.max(1);
            }
            Some(&idx) => {
                let entry = &mut merged.entries[idx];
                if entry.contains(record.script) {
                    merged.duplicates.push(DuplicateCandidate {
                        key,
                        script: record.script.to_string(),
                        pronunciation: record.pronunciation.to_string(),
                        file: record.origin.file.to_path_buf(),
                        line: record.origin.line,
                    });
                } else {
                    entry.candidates.push(record.script.to_string());
                    merged.max_candidates = merged.max_candidates.max(entry.candidates.len());
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Merged {
        self.merged
    }
}

/// Merge `records` in the order given.
pub fn merge<'a, I>(normalizer: &Normalizer, records: I) -> Result<Merged, NormalizeError>
where
    I: IntoIterator<Item = WordRecord<'a>>,
{
    let mut merger = HomophoneMerger::new(normalizer);
    for record in records {
        merger.push(&record)?;
    }
    Ok(merger.finish())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use ciyu_types::Origin;

    use super::*;

    fn record<'a>(
        script: &'a str,
        pronunciation: &'a str,
        file: &'a Path,
        line: usize,
    ) -> WordRecord<'a> {
        WordRecord {
            script,
            pronunciation,
            annotations: Vec::new(),
            origin: Origin { file, line },
        }
    }

    #[test]
    fn merges_homophones_in_first_seen_order() {
        let norm = Normalizer::pinyin();
        let f = Path::new("hsk1.tsv");
        let merged = merge(
            &norm,
            [
                record("喝", "hē", f, 1),
                record("好", "hǎo", f, 2),
                record("和", "hé", f, 3),
            ],
        )
        .unwrap();

        assert_eq!(merged.entries.len(), 2);
        assert_eq!(merged.entries[0].key, "he");
        assert_eq!(merged.entries[0].candidates, ["喝", "和"]);
        assert_eq!(merged.entries[1].key, "hao");
        assert_eq!(merged.max_candidates, 2);
        assert_eq!(merged.max_key_length, 3);
        assert!(merged.duplicates.is_empty());
    }

    #[test]
    fn repeats_are_reported_once_and_not_appended() {
        let norm = Normalizer::pinyin();
        let a = Path::new("hsk1.tsv");
        let b = Path::new("hsk2.tsv");
        let merged = merge(
            &norm,
            [record("过", "guò", a, 4), record("过", "guò", b, 9)],
        )
        .unwrap();

        assert_eq!(merged.entries.len(), 1);
        assert_eq!(merged.entries[0].candidates, ["过"]);
        assert_eq!(
            merged.duplicates,
            [DuplicateCandidate {
                key: "guo".into(),
                script: "过".into(),
                pronunciation: "guò".into(),
                file: b.to_path_buf(),
                line: 9,
            }]
        );
        // the fixture keeps every record
        assert_eq!(merged.fixture.len(), 2);
    }

    #[test]
    fn same_script_under_other_keys_is_not_a_duplicate() {
        let norm = Normalizer::pinyin();
        let f = Path::new("hsk1.tsv");
        let merged = merge(
            &norm,
            [record("了", "le", f, 1), record("了", "liǎo", f, 2)],
        )
        .unwrap();
        assert_eq!(merged.entries.len(), 2);
        assert!(merged.duplicates.is_empty());
    }

    #[test]
    fn key_length_covers_every_record() {
        let norm = Normalizer::pinyin();
        let f = Path::new("hsk1.tsv");
        let merged = merge(
            &norm,
            [
                record("对不起", "duì bu qǐ", f, 1),
                record("对不起", "duìbuqǐ", f, 2),
                record("我", "wǒ", f, 3),
            ],
        )
        .unwrap();
        assert_eq!(merged.max_key_length, "duibuqi".len());
        assert_eq!(merged.duplicates.len(), 1);
        assert_eq!(
            merged
                .fixture
                .iter()
                .map(|p| p.key.as_str())
                .collect::<Vec<_>>(),
            ["duibuqi", "duibuqi", "wo"]
        );
    }

    #[test]
    fn normalization_failures_stop_the_merge() {
        let norm = Normalizer::pinyin();
        let f = Path::new("hsk1.tsv");
        let err = merge(&norm, [record("绿", "lǜ", f, 1)]).unwrap_err();
        assert!(matches!(err, NormalizeError::NonAscii { offending: 'ǜ', .. }));
    }

    #[test]
    fn empty_input_merges_to_nothing() {
        let norm = Normalizer::pinyin();
        let merged = merge(&norm, Vec::new()).unwrap();
        assert_eq!(merged, Merged::default());
    }
}
