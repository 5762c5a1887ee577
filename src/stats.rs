use crate::config::HISTOGRAM_BUCKETS;
use crate::models::Tag;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// Frequency of names-per-occurrence, bounded to `0..HISTOGRAM_BUCKETS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameHistogram {
    buckets: Vec<u64>,
}

impl Default for NameHistogram {
    fn default() -> Self {
        Self {
            buckets: vec![0; HISTOGRAM_BUCKETS],
        }
    }
}

impl NameHistogram {
    /// Counts one occurrence yielding `names` names. Out-of-range counts are
    /// ignored and reported as `false`.
    pub fn record(&mut self, names: usize) -> bool {
        match self.buckets.get_mut(names) {
            Some(bucket) => {
                *bucket += 1;
                true
            }
            None => false,
        }
    }

    pub fn count(&self, names: usize) -> u64 {
        self.buckets.get(names).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    /// Non-zero buckets in ascending order.
    pub fn non_empty(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(names, &count)| (names, count))
    }
}

/// Counters for one extraction run, owned by the run.
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    pub pages_scanned: u64,
    pub pages_with_fields: u64,
    pub reserved_pages: u64,
    pub field_occurrences: u64,
    pub fields_abandoned: u64,
    pub names_emitted: u64,
    pub aggregates_emitted: u64,
    pub records_written: u64,
    histograms: [NameHistogram; 4],
}

/// Serializable snapshot for the JSON report.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub pages_scanned: u64,
    pub pages_with_fields: u64,
    pub reserved_pages: u64,
    pub field_occurrences: u64,
    pub fields_abandoned: u64,
    pub names_emitted: u64,
    pub aggregates_emitted: u64,
    pub records_written: u64,
    pub histograms: BTreeMap<&'static str, BTreeMap<usize, u64>>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages(&mut self) {
        self.pages_scanned += 1;
    }

    pub fn inc_pages_with_fields(&mut self) {
        self.pages_with_fields += 1;
    }

    pub fn inc_reserved_pages(&mut self) {
        self.reserved_pages += 1;
    }

    pub fn inc_fields_abandoned(&mut self) {
        self.fields_abandoned += 1;
    }

    /// One matched field occurrence that produced `names` names.
    pub fn record_field(&mut self, tag: Tag, names: usize) {
        self.field_occurrences += 1;
        self.names_emitted += names as u64;
        self.record_histogram(tag, names);
    }

    /// One emitted page aggregate of `names` names.
    pub fn record_aggregate(&mut self, names: usize) {
        self.aggregates_emitted += 1;
        self.record_histogram(Tag::AllTags, names);
    }

    fn record_histogram(&mut self, tag: Tag, names: usize) {
        if !self.histograms[tag.index()].record(names) {
            trace!(tag = %tag, names, "Name count beyond histogram range");
        }
    }

    pub fn add_records(&mut self, count: u64) {
        self.records_written += count;
    }

    pub fn histogram(&self, tag: Tag) -> &NameHistogram {
        &self.histograms[tag.index()]
    }

    pub fn report(&self) -> StatsReport {
        let histograms = Tag::ALL
            .iter()
            .map(|&tag| (tag.as_str(), self.histogram(tag).non_empty().collect()))
            .collect();
        StatsReport {
            pages_scanned: self.pages_scanned,
            pages_with_fields: self.pages_with_fields,
            reserved_pages: self.reserved_pages,
            field_occurrences: self.field_occurrences,
            fields_abandoned: self.fields_abandoned,
            names_emitted: self.names_emitted,
            aggregates_emitted: self.aggregates_emitted,
            records_written: self.records_written,
            histograms,
        }
    }
}
