use crate::models::{AlternateNameRecord, Tag};
use anyhow::{Context, Result};
use csv::Reader;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

static DISAMBIGUATOR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());

/// One titled subject and its alternate names, deduplicated in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub title: String,
    pub names: Vec<String>,
    /// Names in the page aggregate as written, duplicates included
    pub sibling_count: usize,
}

#[derive(Debug, Deserialize)]
struct IndexRow {
    title: String,
    infobox_name: String,
    alternate_name: String,
    tag: Tag,
    sibling_count: usize,
}

impl From<IndexRow> for AlternateNameRecord {
    fn from(row: IndexRow) -> Self {
        Self {
            title: row.title,
            infobox_name: row.infobox_name,
            name: row.alternate_name,
            tag: row.tag,
            sibling_count: row.sibling_count,
        }
    }
}

/// Read side of the alias CSV. Only page aggregates become entries, so a name
/// listed under several keys appears once per page.
#[derive(Debug, Default)]
pub struct AliasIndex {
    entries: Vec<AliasEntry>,
    by_title: FxHashMap<String, usize>,
    by_lower: FxHashMap<String, Vec<usize>>,
    by_base: FxHashMap<String, Vec<usize>>,
    tag_counts: FxHashMap<Tag, u64>,
}

/// Title with a trailing parenthetical disambiguator removed, lower-cased.
pub fn base_title(title: &str) -> String {
    DISAMBIGUATOR_REGEX.replace(title, "").trim().to_lowercase()
}

impl AliasIndex {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open alias CSV: {}", path.display()))?;
        let mut reader = Reader::from_reader(BufReader::new(file));

        let mut records = Vec::new();
        for (row_number, row) in reader.deserialize::<IndexRow>().enumerate() {
            let row = row.with_context(|| {
                format!("Malformed row {} in: {}", row_number + 2, path.display())
            })?;
            records.push(AlternateNameRecord::from(row));
        }

        let index = Self::from_records(records);
        info!(
            path = %path.display(),
            titles = index.len(),
            "Alias index loaded"
        );
        Ok(index)
    }

    pub fn from_records(records: impl IntoIterator<Item = AlternateNameRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            *index.tag_counts.entry(record.tag).or_insert(0) += 1;
            if record.tag == Tag::AllTags {
                index.insert(record);
            }
        }
        debug!(titles = index.entries.len(), "Alias index built");
        index
    }

    fn insert(&mut self, record: AlternateNameRecord) {
        let slot = match self.by_title.get(&record.title) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.by_title.insert(record.title.clone(), slot);
                self.by_lower
                    .entry(record.title.to_lowercase())
                    .or_default()
                    .push(slot);
                self.by_base
                    .entry(base_title(&record.title))
                    .or_default()
                    .push(slot);
                self.entries.push(AliasEntry {
                    title: record.title,
                    names: Vec::new(),
                    sibling_count: record.sibling_count,
                });
                slot
            }
        };
        let entry = &mut self.entries[slot];
        if !entry.names.contains(&record.name) {
            entry.names.push(record.name);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows seen per tag while loading, before filtering.
    pub fn tag_count(&self, tag: Tag) -> u64 {
        self.tag_counts.get(&tag).copied().unwrap_or(0)
    }

    /// Exact title first, then case-insensitive title, then titles that share
    /// the query once disambiguators are removed.
    pub fn lookup(&self, query: &str) -> Vec<&AliasEntry> {
        let query = query.trim();
        if let Some(&slot) = self.by_title.get(query) {
            return vec![&self.entries[slot]];
        }
        if let Some(slots) = self.by_lower.get(&query.to_lowercase()) {
            return self.resolve(slots);
        }
        match self.by_base.get(&base_title(query)) {
            Some(slots) => self.resolve(slots),
            None => Vec::new(),
        }
    }

    /// Free-text fallback: entries whose title or names share words with the
    /// query, best match first.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<&AliasEntry> {
        let words: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &AliasEntry)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let haystack = format!("{} {}", entry.title, entry.names.join(" ")).to_lowercase();
                let score = words
                    .iter()
                    .filter(|word| haystack.split_whitespace().any(|w| w == word.as_str()))
                    .count();
                (score > 0).then_some((score, entry))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.title.cmp(&b.1.title)));
        scored.into_iter().take(limit).map(|(_, e)| e).collect()
    }

    /// Titles whose page aggregate held exactly `count` names.
    pub fn titles_with_count(&self, count: usize) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.sibling_count == count)
            .map(|e| e.title.as_str())
            .collect()
    }

    fn resolve(&self, slots: &[usize]) -> Vec<&AliasEntry> {
        slots.iter().map(|&slot| &self.entries[slot]).collect()
    }
}
