use crate::config::WRITER_BUFFER_SIZE;
use crate::models::{AlternateNameRecord, Tag};
use anyhow::{bail, Context, Result};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Column order of the alias CSV.
pub const CSV_HEADER: [&str; 6] = [
    "title",
    "title_lower",
    "infobox_name",
    "alternate_name",
    "tag",
    "sibling_count",
];

/// Receiver of extracted records. No deduplication is expected.
pub trait IndexSink {
    fn add_record(&mut self, record: &AlternateNameRecord) -> Result<()>;

    /// Flushes and releases the underlying handle. Must tolerate repeated calls.
    fn close(&mut self) -> Result<()>;
}

#[derive(Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    title_lower: String,
    infobox_name: &'a str,
    alternate_name: &'a str,
    tag: Tag,
    sibling_count: usize,
}

impl<'a> From<&'a AlternateNameRecord> for CsvRow<'a> {
    fn from(record: &'a AlternateNameRecord) -> Self {
        Self {
            title: &record.title,
            title_lower: record.title.to_lowercase(),
            infobox_name: &record.infobox_name,
            alternate_name: &record.name,
            tag: record.tag,
            sibling_count: record.sibling_count,
        }
    }
}

/// Writes records as CSV rows, header first.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<Writer<BufWriter<File>>>,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create alias CSV: {}", path.display()))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(WRITER_BUFFER_SIZE, file));
        writer
            .write_record(CSV_HEADER)
            .context("Failed to write alias CSV header")?;
        Ok(Self {
            path,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexSink for CsvSink {
    fn add_record(&mut self, record: &AlternateNameRecord) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            bail!("Alias CSV already closed: {}", self.path.display());
        };
        writer
            .serialize(CsvRow::from(record))
            .with_context(|| format!("Failed to write record for: {}", record.title))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("Failed to flush alias CSV: {}", self.path.display()))?;
            debug!(path = %self.path.display(), "Closed alias CSV");
        }
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<AlternateNameRecord>,
    pub closes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(&self, tag: Tag) -> impl Iterator<Item = &AlternateNameRecord> {
        self.records.iter().filter(move |r| r.tag == tag)
    }
}

impl IndexSink for MemorySink {
    fn add_record(&mut self, record: &AlternateNameRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closes += 1;
        Ok(())
    }
}

/// Counts records and discards them. Used for dry runs.
#[derive(Debug, Default)]
pub struct NullSink {
    pub records: u64,
}

impl IndexSink for NullSink {
    fn add_record(&mut self, _record: &AlternateNameRecord) -> Result<()> {
        self.records += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Owns a sink for the length of a run and releases it exactly once: through
/// [`SinkGuard::close`] on success, or on drop when the run bails out early.
pub struct SinkGuard<S: IndexSink> {
    sink: Option<S>,
}

impl<S: IndexSink> SinkGuard<S> {
    pub fn new(sink: S) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn add_record(&mut self, record: &AlternateNameRecord) -> Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.add_record(record),
            None => bail!("Index sink already released"),
        }
    }

    /// Closes the sink and hands it back for inspection.
    pub fn close(mut self) -> Result<S> {
        let mut sink = self
            .sink
            .take()
            .context("Index sink already released")?;
        sink.close()?;
        Ok(sink)
    }
}

impl<S: IndexSink> Drop for SinkGuard<S> {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                warn!(error = %e, "Failed to close index sink");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn record(title: &str, name: &str, tag: Tag, sibling_count: usize) -> AlternateNameRecord {
        AlternateNameRecord {
            title: title.to_string(),
            infobox_name: "Box".to_string(),
            name: name.to_string(),
            tag,
            sibling_count,
        }
    }

    struct CountingSink {
        closes: Rc<Cell<usize>>,
    }

    impl IndexSink for CountingSink {
        fn add_record(&mut self, _record: &AlternateNameRecord) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn csv_sink_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aliases.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.add_record(&record("Robert Smith", "Bob, Jr.", Tag::Aka, 2))
            .unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "title,title_lower,infobox_name,alternate_name,tag,sibling_count"
        );
        assert_eq!(lines[1], "Robert Smith,robert smith,Box,\"Bob, Jr.\",aka,2");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn csv_sink_empty_run_still_has_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aliases.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn csv_sink_rejects_writes_after_close() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::create(dir.path().join("aliases.csv")).unwrap();
        sink.close().unwrap();
        assert!(sink.add_record(&record("T", "N", Tag::Aka, 1)).is_err());
    }

    #[test]
    fn guard_closes_once_on_success() {
        let closes = Rc::new(Cell::new(0));
        let mut guard = SinkGuard::new(CountingSink {
            closes: closes.clone(),
        });
        guard.add_record(&record("T", "N", Tag::Aka, 1)).unwrap();
        let sink = guard.close().unwrap();
        drop(sink);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn guard_closes_once_on_drop() {
        let closes = Rc::new(Cell::new(0));
        {
            let _guard = SinkGuard::new(CountingSink {
                closes: closes.clone(),
            });
        }
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn memory_sink_filters_by_tag() {
        let mut sink = MemorySink::new();
        sink.add_record(&record("T", "A", Tag::Aka, 1)).unwrap();
        sink.add_record(&record("T", "A", Tag::AllTags, 1)).unwrap();
        assert_eq!(sink.with_tag(Tag::AllTags).count(), 1);
    }
}
