//! Canonical pinyin keys and their hashes.
//!
//! The compiler and the runtime lookup must derive keys and hashes with
//! byte-identical code, so both live here with no dependency on how word
//! lists are loaded or tables are emitted.
//!
//! # How it works
//! 1. Lowercase the pronunciation.
//! 2. Drop elided characters (space, apostrophe, hyphen by default).
//! 3. Substitute every remaining character through a [`SubstitutionTable`];
//!    characters outside the table pass through unchanged.
//! 4. Reject the result if anything non-ASCII survived.
//!
//! Before a compile run, [`Normalizer::check_coverage`] proves that the
//! table's domain is exactly the set of characters the inputs use, so no
//! pronunciation is folded by accident.
//!
//! # Example
//! ```rust
//! use pinyin_key::{Normalizer, murmur3_32};
//!
//! let norm = Normalizer::pinyin();
//! assert_eq!(norm.normalize("hē").unwrap(), "he");
//! assert_eq!(norm.normalize("Nǚ'ér").unwrap(), "nver");
//! assert_eq!(murmur3_32("", 0), 0);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// Characters deleted before substitution unless configured otherwise.
pub const DEFAULT_ELIDE: &[char] = &[' ', '\'', '-'];

/// Plain letters pinyin spells with; `v` only appears as a folding target.
const PINYIN_PLAIN: &str = "abcdefghijklmnopqrstuwxyz";

const PINYIN_TONED: &[(char, &str)] = &[
    ('à', "a"),
    ('á', "a"),
    ('è', "e"),
    ('é', "e"),
    ('ì', "i"),
    ('í', "i"),
    ('ò', "o"),
    ('ó', "o"),
    ('ù', "u"),
    ('ú', "u"),
    ('ā', "a"),
    ('ē', "e"),
    ('ě', "e"),
    ('ī', "i"),
    ('ō', "o"),
    ('ū', "u"),
    ('ǎ', "a"),
    ('ǐ', "i"),
    ('ǒ', "o"),
    ('ǔ', "u"),
    ('ǚ', "v"),
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("{0:?} is mapped more than once")]
    DuplicateSource(char),
    #[error("substitution {from:?} -> {target:?} must be non-empty lowercase ASCII")]
    InvalidTarget { from: char, target: String },
    #[error(
        "substitution {from:?} -> {target:?} produces {produced:?}, which the table maps to {mapped:?}"
    )]
    NotFixedPoint {
        from: char,
        target: String,
        produced: char,
        mapped: String,
    },
    #[error("{0:?} is both elided and substituted")]
    ElidedSource(char),
    #[error("substitution {from:?} -> {target:?} produces elided character {elided:?}")]
    ElidedTarget {
        from: char,
        target: String,
        elided: char,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("normalize({input:?}) gave {key:?}, which contains non-ASCII {offending:?}")]
    NonAscii {
        input: String,
        key: String,
        offending: char,
    },
}

/// Mismatch between the characters the inputs use and the table's domain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "pronunciation characters do not match the substitution table\n detected: {detected:?}\n table:    {domain:?}\n missing from table: {missing:?}\n unused by inputs:   {unused:?}"
)]
pub struct CoverageError {
    pub detected: String,
    pub domain: String,
    pub missing: String,
    pub unused: String,
}

/// One-to-one mapping from a source character to its ASCII replacement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubstitutionTable {
    map: BTreeMap<char, String>,
}

impl SubstitutionTable {
    /// Build and validate a table.
    ///
    /// Targets must be lowercase ASCII, and any character a target produces
    /// that is itself a source must map to itself, which keeps
    /// normalization idempotent.
    pub fn new<I, S>(pairs: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (from, target) in pairs {
            let target = target.into();
            if target.is_empty()
                || !target
                    .chars()
                    .all(|c| c.is_ascii() && !c.is_ascii_uppercase())
            {
                return Err(TableError::InvalidTarget { from, target });
            }
            if map.insert(from, target).is_some() {
                return Err(TableError::DuplicateSource(from));
            }
        }
        let table = Self { map };
        table.check_fixed_points()?;
        Ok(table)
    }

    /// The shipped pinyin table: plain letters map to themselves and toned
    /// vowels fold to their bare vowel (`ǚ` folds to `v`).
    pub fn pinyin() -> Self {
        let map = PINYIN_PLAIN
            .chars()
            .map(|c| (c, c.to_string()))
            .chain(PINYIN_TONED.iter().map(|(c, s)| (*c, s.to_string())))
            .collect();
        Self { map }
    }

    pub fn get(&self, c: char) -> Option<&str> {
        self.map.get(&c).map(String::as_str)
    }

    /// Source characters, sorted.
    pub fn domain(&self) -> BTreeSet<char> {
        self.map.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &str)> + '_ {
        self.map.iter().map(|(c, s)| (*c, s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn check_fixed_points(&self) -> Result<(), TableError> {
        for (from, target) in &self.map {
            for produced in target.chars() {
                if let Some(mapped) = self.map.get(&produced)
                    && !mapped.chars().eq([produced])
                {
                    return Err(TableError::NotFixedPoint {
                        from: *from,
                        target: target.clone(),
                        produced,
                        mapped: mapped.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Maps raw pronunciations to canonical keys.
#[derive(Clone, Debug)]
pub struct Normalizer {
    elide: BTreeSet<char>,
    table: SubstitutionTable,
}

impl Normalizer {
    pub fn new<I>(table: SubstitutionTable, elide: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = char>,
    {
        let elide: BTreeSet<char> = elide.into_iter().collect();
        for (from, target) in table.iter() {
            if elide.contains(&from) {
                return Err(TableError::ElidedSource(from));
            }
            if let Some(elided) = target.chars().find(|c| elide.contains(c)) {
                return Err(TableError::ElidedTarget {
                    from,
                    target: target.to_string(),
                    elided,
                });
            }
        }
        Ok(Self { elide, table })
    }

    /// Shipped pinyin table with [`DEFAULT_ELIDE`].
    pub fn pinyin() -> Self {
        Self {
            elide: DEFAULT_ELIDE.iter().copied().collect(),
            table: SubstitutionTable::pinyin(),
        }
    }

    pub fn table(&self) -> &SubstitutionTable {
        &self.table
    }

    pub fn elided(&self) -> &BTreeSet<char> {
        &self.elide
    }

    pub fn normalize(&self, pronunciation: &str) -> Result<String, NormalizeError> {
        let mut key = String::with_capacity(pronunciation.len());
        for c in pronunciation.to_lowercase().chars() {
            if self.elide.contains(&c) {
                continue;
            }
            match self.table.get(c) {
                Some(target) => key.push_str(target),
                None => key.push(c),
            }
        }
        if let Some(offending) = key.chars().find(|c| !c.is_ascii()) {
            return Err(NormalizeError::NonAscii {
                input: pronunciation.to_string(),
                key,
                offending,
            });
        }
        Ok(key)
    }

    /// Distinct characters of the lowercased pronunciations, minus elided ones.
    pub fn observed_chars<'a, I>(&self, pronunciations: I) -> BTreeSet<char>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = BTreeSet::new();
        for p in pronunciations {
            seen.extend(
                p.to_lowercase()
                    .chars()
                    .filter(|c| !self.elide.contains(c)),
            );
        }
        seen
    }

    /// Require `observed` to equal the table's domain exactly.
    pub fn check_coverage(&self, observed: &BTreeSet<char>) -> Result<(), CoverageError> {
        let domain = self.table.domain();
        if *observed == domain {
            return Ok(());
        }
        Err(CoverageError {
            detected: render(observed.iter()),
            domain: render(domain.iter()),
            missing: render(observed.difference(&domain)),
            unused: render(domain.difference(observed)),
        })
    }
}

fn render<'a>(chars: impl Iterator<Item = &'a char>) -> String {
    chars.collect()
}

/// MurmurHash3 (x86, 32-bit) over Unicode code points.
///
/// Each code point is mixed as one 32-bit block instead of being split into
/// its UTF-8 bytes, and the length folded in before finalization is the
/// code-point count. The result does not depend on platform byte order.
pub fn murmur3_32(key: &str, seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h = seed;
    let mut count: u32 = 0;
    for c in key.chars() {
        let k = (c as u32)
            .wrapping_mul(C1)
            .rotate_left(15)
            .wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
        count = count.wrapping_add(1);
    }
    fmix32(h ^ count)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
