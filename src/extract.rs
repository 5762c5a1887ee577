use crate::config::{PROGRESS_INTERVAL, RESERVED_TITLE_PREFIXES};
use crate::models::{AggregateName, AlternateNameRecord, FieldMatch, PageAggregate};
use crate::names;
use crate::reader::{self, LineSource};
use crate::scanner::{PageScanner, ScanEvent};
use crate::sink::{IndexSink, SinkGuard};
use crate::stats::RunStatistics;
use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use std::mem;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this many pages, across all inputs
    pub limit: Option<u64>,
    pub show_progress: bool,
}

/// What a finished run hands back.
pub struct RunOutput<S> {
    pub stats: RunStatistics,
    pub sink: S,
}

/// True for titles in namespaces that never produce records.
pub fn is_reserved_title(title: &str) -> bool {
    RESERVED_TITLE_PREFIXES.iter().any(|prefix| {
        title
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

#[derive(Default)]
struct PageAccumulator {
    matched_field: bool,
    aggregate: PageAggregate,
}

/// Turns scanner events into records, statistics and page aggregates.
pub struct Extractor<S: IndexSink> {
    sink: SinkGuard<S>,
    stats: RunStatistics,
    limit: Option<u64>,
    progress: ProgressBar,
    page: PageAccumulator,
    events: Vec<ScanEvent>,
}

impl<S: IndexSink> Extractor<S> {
    pub fn new(sink: S, options: &RunOptions) -> Self {
        let progress = if options.show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        Self {
            sink: SinkGuard::new(sink),
            stats: RunStatistics::new(),
            limit: options.limit,
            progress,
            page: PageAccumulator::default(),
            events: Vec::new(),
        }
    }

    pub fn limit_reached(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.stats.pages_scanned >= limit)
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Scans one source to its end, or until the page limit is reached.
    pub fn process<L: LineSource>(&mut self, source: &mut L) -> Result<()> {
        let mut scanner = PageScanner::new();
        while !self.limit_reached() {
            let Some(line) = source.next_line()? else {
                break;
            };
            scanner.feed(&line, &mut self.events);
            self.drain_events()?;
        }
        if !scanner.finish() {
            self.page = PageAccumulator::default();
        }
        Ok(())
    }

    /// Closes the sink and returns the run's results.
    pub fn finish(self) -> Result<RunOutput<S>> {
        self.progress.finish_and_clear();
        let sink = self.sink.close()?;
        Ok(RunOutput {
            stats: self.stats,
            sink,
        })
    }

    fn drain_events(&mut self) -> Result<()> {
        let mut events = mem::take(&mut self.events);
        for event in events.drain(..) {
            match event {
                ScanEvent::PageStart => self.page = PageAccumulator::default(),
                ScanEvent::Field {
                    title,
                    infobox_name,
                    field,
                } => self.on_field(title, infobox_name, field)?,
                ScanEvent::FieldAbandoned { title } => self.on_field_abandoned(&title),
                ScanEvent::PageEnd { title } => self.on_page_end(title)?,
            }
        }
        self.events = events;
        Ok(())
    }

    fn on_field_abandoned(&mut self, title: &str) {
        if is_reserved_title(title) {
            return;
        }
        debug!(title = %title, "Text ended inside a multi-line field, dropping it");
        self.stats.inc_fields_abandoned();
    }

    fn on_field(&mut self, title: String, infobox_name: String, field: FieldMatch) -> Result<()> {
        if is_reserved_title(&title) {
            return Ok(());
        }
        let names = names::extract_names(&field.raw_value);
        trace!(title = %title, tag = %field.tag, names = names.len(), "Field matched");

        self.page.matched_field = true;
        self.stats.record_field(field.tag, names.len());

        let sibling_count = names.len();
        for name in names {
            let record = AlternateNameRecord {
                title: title.clone(),
                infobox_name: infobox_name.clone(),
                name,
                tag: field.tag,
                sibling_count,
            };
            self.sink.add_record(&record)?;
            self.page.aggregate.names.push(AggregateName {
                infobox_name: record.infobox_name,
                name: record.name,
            });
        }
        self.stats.add_records(sibling_count as u64);
        Ok(())
    }

    fn on_page_end(&mut self, title: String) -> Result<()> {
        let page = mem::take(&mut self.page);
        self.stats.inc_pages();
        if self.stats.pages_scanned % PROGRESS_INTERVAL == 0 {
            self.progress
                .set_message(format!("{} pages", self.stats.pages_scanned));
            self.progress.tick();
        }

        if is_reserved_title(&title) {
            debug!(title = %title, "Skipping reserved page");
            self.stats.inc_reserved_pages();
            return Ok(());
        }
        if page.matched_field {
            self.stats.inc_pages_with_fields();
        }
        if page.aggregate.is_empty() {
            return Ok(());
        }

        let aggregate = PageAggregate {
            title,
            names: page.aggregate.names,
        };
        self.stats.record_aggregate(aggregate.len());
        for record in aggregate.records() {
            self.sink.add_record(&record)?;
        }
        self.stats.add_records(aggregate.len() as u64);
        Ok(())
    }
}

/// Extracts every input in order into `sink`.
pub fn run_extraction<S: IndexSink>(
    inputs: &[String],
    sink: S,
    options: &RunOptions,
) -> Result<RunOutput<S>> {
    if inputs.is_empty() {
        bail!("No input dumps given");
    }

    let mut extractor = Extractor::new(sink, options);
    for path in inputs {
        if extractor.limit_reached() {
            info!(path = %path, "Page limit reached, skipping remaining inputs");
            break;
        }
        info!("Extracting from: {}", path);
        let mut source = reader::open_dump(path)?;
        extractor
            .process(&mut source)
            .with_context(|| format!("Failed to extract from: {}", path))?;
        info!(
            path = %path,
            lines = source.lines_read(),
            pages = extractor.stats().pages_scanned,
            "Finished input"
        );
    }
    extractor.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;
    use crate::sink::MemorySink;

    fn lines(text: &str) -> std::vec::IntoIter<String> {
        text.lines()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn run(text: &str, options: &RunOptions) -> RunOutput<MemorySink> {
        let mut extractor = Extractor::new(MemorySink::new(), options);
        extractor.process(&mut lines(text)).unwrap();
        extractor.finish().unwrap()
    }

    fn names_with_tag(sink: &MemorySink, tag: Tag) -> Vec<&str> {
        sink.with_tag(tag).map(|r| r.name.as_str()).collect()
    }

    const TWO_INFOBOXES: &str = "<page>
<title>Mercury</title>
<text>{{Infobox planet
| name = Mercury
| alt_name = {{ubl|Hermes|Stilbon}}
}}
{{Infobox deity
| name = Mercurius
| aka = Merc
}}</text>
</page>";

    #[test]
    fn reserved_titles() {
        assert!(is_reserved_title("Template:Foo"));
        assert!(is_reserved_title("WIKIPEDIA:About"));
        assert!(is_reserved_title("draft:x"));
        assert!(!is_reserved_title("Templates of doom"));
        assert!(!is_reserved_title("Drafting"));
        assert!(!is_reserved_title(""));
    }

    #[test]
    fn two_infoboxes_give_one_aggregate() {
        let out = run(TWO_INFOBOXES, &RunOptions::default());
        assert_eq!(names_with_tag(&out.sink, Tag::AltName), vec!["Hermes", "Stilbon"]);
        assert_eq!(names_with_tag(&out.sink, Tag::Aka), vec!["Merc"]);

        let all: Vec<_> = out.sink.with_tag(Tag::AllTags).collect();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|r| r.sibling_count == 3 && r.title == "Mercury"));
        assert_eq!(
            all.iter()
                .map(|r| (r.infobox_name.as_str(), r.name.as_str()))
                .collect::<Vec<_>>(),
            vec![
                ("Mercury", "Hermes"),
                ("Mercury", "Stilbon"),
                ("Mercurius", "Merc")
            ]
        );

        assert_eq!(out.stats.pages_scanned, 1);
        assert_eq!(out.stats.pages_with_fields, 1);
        assert_eq!(out.stats.field_occurrences, 2);
        assert_eq!(out.stats.names_emitted, 3);
        assert_eq!(out.stats.aggregates_emitted, 1);
        assert_eq!(out.stats.records_written, 6);
        assert_eq!(out.stats.histogram(Tag::AltName).count(2), 1);
        assert_eq!(out.stats.histogram(Tag::AllTags).count(3), 1);
        assert_eq!(out.sink.closes, 1);
    }

    #[test]
    fn field_records_carry_sibling_count() {
        let out = run(TWO_INFOBOXES, &RunOptions::default());
        let alt: Vec<_> = out.sink.with_tag(Tag::AltName).collect();
        assert!(alt.iter().all(|r| r.sibling_count == 2));
        assert!(alt.iter().all(|r| r.infobox_name == "Mercury"));
    }

    #[test]
    fn reserved_page_yields_nothing() {
        let out = run(
            "<page>
<title>Template:Foo</title>
<text>{{Infobox thing
| aka = Bar
}}</text>
</page>",
            &RunOptions::default(),
        );
        assert!(out.sink.records.is_empty());
        assert_eq!(out.stats.pages_scanned, 1);
        assert_eq!(out.stats.reserved_pages, 1);
        assert_eq!(out.stats.field_occurrences, 0);
    }

    #[test]
    fn empty_value_matches_but_emits_nothing() {
        let out = run(
            "<page>
<title>T</title>
<text>{{Infobox thing
| aka = <!-- none -->
}}</text>
</page>",
            &RunOptions::default(),
        );
        assert!(out.sink.records.is_empty());
        assert_eq!(out.stats.field_occurrences, 1);
        assert_eq!(out.stats.histogram(Tag::Aka).count(0), 1);
        assert_eq!(out.stats.aggregates_emitted, 0);
    }

    #[test]
    fn truncated_page_emits_no_aggregate() {
        let out = run(
            "<page>
<title>T</title>
<text>{{Infobox thing
| aka = Bob",
            &RunOptions::default(),
        );
        assert_eq!(names_with_tag(&out.sink, Tag::Aka), vec!["Bob"]);
        assert_eq!(out.sink.with_tag(Tag::AllTags).count(), 0);
        assert_eq!(out.stats.pages_scanned, 0);
    }

    #[test]
    fn abandoned_field_is_counted() {
        let out = run(
            "<page>
<title>T</title>
<text>{{Infobox thing
| aka = {{plainlist|
* Bob
</text>
</page>",
            &RunOptions::default(),
        );
        assert!(out.sink.records.is_empty());
        assert_eq!(out.stats.fields_abandoned, 1);
        assert_eq!(out.stats.pages_scanned, 1);
    }

    #[test]
    fn field_closed_on_text_end_line_is_kept() {
        let out = run(
            "<page>
<title>T</title>
<text>{{Infobox thing
| aka = {{plainlist|
* Bob
* Rob
}}</text>
</page>",
            &RunOptions::default(),
        );
        assert_eq!(names_with_tag(&out.sink, Tag::Aka), vec!["Bob", "Rob"]);
        assert_eq!(out.stats.fields_abandoned, 0);
    }

    #[test]
    fn abandoned_field_on_reserved_page_is_not_counted() {
        let out = run(
            "<page>
<title>Template:Thing</title>
<text>{{Infobox thing
| aka = {{plainlist|
* Bob
</text>
</page>",
            &RunOptions::default(),
        );
        assert_eq!(out.stats.fields_abandoned, 0);
        assert_eq!(out.stats.reserved_pages, 1);
    }

    #[test]
    fn limit_stops_after_pages() {
        let text = format!("{}\n{}", TWO_INFOBOXES, TWO_INFOBOXES.replace("Mercury", "Venus"));
        let options = RunOptions {
            limit: Some(1),
            show_progress: false,
        };
        let out = run(&text, &options);
        assert_eq!(out.stats.pages_scanned, 1);
        assert!(out.sink.records.iter().all(|r| r.title == "Mercury"));
    }

    #[test]
    fn run_extraction_requires_inputs() {
        let err = match run_extraction(&[], MemorySink::new(), &RunOptions::default()) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("No input dumps"));
    }
}
