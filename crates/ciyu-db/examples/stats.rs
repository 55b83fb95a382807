use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use ciyu_db::{LoadMode, WordLists, merge};
use pinyin_key::Normalizer;

fn main() -> Result<()> {
    let paths: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        bail!("usage: cargo run -p ciyu-db --example stats -- <word-list>...");
    }

    let lists = WordLists::load(&paths, LoadMode::Mmap).context("loading word lists")?;
    for file in lists.files() {
        println!(
            "{:<24} {:>6} records {:>4} skipped",
            file.path.display(),
            file.records,
            file.skipped
        );
    }

    let norm = Normalizer::pinyin();
    let elided: String = norm.elided().iter().collect();
    println!("Elided chars : {elided:?}");
    println!("Table domain : {} chars", norm.table().len());
    let observed = norm.observed_chars(lists.pronunciations());
    let detected: String = observed.iter().collect();
    println!("Pronunciation chars: {detected}");
    if let Err(err) = norm.check_coverage(&observed) {
        println!("{err}");
        return Ok(());
    }

    let merged = merge(&norm, lists.records()).context("merging records")?;
    println!("Records      : {}", lists.record_count());
    println!("Unique keys  : {}", merged.entries.len());
    println!("Duplicates   : {}", merged.duplicates.len());
    println!("Widest list  : {}", merged.max_candidates);
    println!("Longest key  : {}", merged.max_key_length);

    // Show the most crowded keys.
    let mut crowded: Vec<_> = merged
        .entries
        .iter()
        .filter(|e| e.candidates.len() > 1)
        .collect();
    crowded.sort_by(|a, b| {
        b.candidates
            .len()
            .cmp(&a.candidates.len())
            .then_with(|| a.key.cmp(&b.key))
    });
    for entry in crowded.iter().take(5) {
        println!("  {:<10} {}", entry.key, entry.candidates.join(" "));
    }

    Ok(())
}
