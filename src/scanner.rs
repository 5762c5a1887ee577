//! Line-driven page scanner.
//!
//! [`PageScanner`] is a finite-state machine fed one dump line at a time. It never
//! reads input itself, so continuation and truncation behavior can be exercised
//! directly from a list of lines. Nesting is bounded: TEXT may contain one open
//! infobox, and an infobox may hold one pending multi-line field.

use crate::infobox::{self, FieldLine, FieldStart, PendingField};
use crate::markup;
use crate::models::FieldMatch;
use once_cell::sync::Lazy;
use regex::Regex;
use std::mem;
use tracing::{debug, trace};

static PAGE_START_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*page\s*>").unwrap());

static PAGE_END_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*/\s*page\s*>").unwrap());

static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*title\s*>([^<]*)<\s*/\s*title\s*>").unwrap());

static TEXT_START_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*text(\s[^>]*)?>(.*)$").unwrap());

static TEXT_END_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*/\s*text\s*>").unwrap());

/// Structural events produced while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    PageStart,
    Field {
        title: String,
        infobox_name: String,
        field: FieldMatch,
    },
    /// A multi-line field cut off by the end of its text block.
    FieldAbandoned { title: String },
    PageEnd { title: String },
}

#[derive(Debug, Default)]
pub struct PageContext {
    pub title: Option<String>,
    pub infoboxes_seen: usize,
}

#[derive(Debug, Default)]
pub struct InfoboxContext {
    pub infobox_name: String,
    pending: Option<PendingField>,
}

#[derive(Debug)]
enum TextState {
    Body,
    Infobox(InfoboxContext),
}

#[derive(Debug)]
enum ScanState {
    OutsidePage,
    SeekTitle,
    InPageBody,
    InText(TextState),
}

#[derive(Debug)]
pub struct PageScanner {
    state: ScanState,
    page: PageContext,
}

impl Default for PageScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PageScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::OutsidePage,
            page: PageContext::default(),
        }
    }

    /// Consumes one line, appending any resulting events.
    pub fn feed(&mut self, line: &str, events: &mut Vec<ScanEvent>) {
        let state = mem::replace(&mut self.state, ScanState::OutsidePage);
        self.state = self.step(state, line, events);
    }

    /// Ends the input. Returns false when a page was still open; its partial
    /// content is dropped.
    pub fn finish(self) -> bool {
        if matches!(self.state, ScanState::OutsidePage) {
            return true;
        }
        debug!(
            title = self.page.title.as_deref().unwrap_or(""),
            "Input ended inside a page, dropping it"
        );
        false
    }

    /// 0 outside text, 1 in text, 2 inside an infobox.
    pub fn depth(&self) -> usize {
        match &self.state {
            ScanState::InText(TextState::Body) => 1,
            ScanState::InText(TextState::Infobox(_)) => 2,
            _ => 0,
        }
    }

    pub fn in_page(&self) -> bool {
        !matches!(self.state, ScanState::OutsidePage)
    }

    pub fn is_continuing(&self) -> bool {
        is_pending(&self.state)
    }

    fn step(&mut self, state: ScanState, line: &str, events: &mut Vec<ScanEvent>) -> ScanState {
        if PAGE_START_REGEX.is_match(line) {
            if !matches!(state, ScanState::OutsidePage) {
                debug!(
                    title = self.title(),
                    "Page start inside an unfinished page, abandoning it"
                );
            }
            if is_pending(&state) {
                self.abandon_field(events);
            }
            self.page = PageContext::default();
            events.push(ScanEvent::PageStart);
            return self.seek_title(line, events);
        }

        match state {
            ScanState::OutsidePage => ScanState::OutsidePage,
            ScanState::SeekTitle => self.seek_title(line, events),
            ScanState::InPageBody => self.page_body(line, events),
            ScanState::InText(text) => self.text_line(text, line, events),
        }
    }

    fn seek_title(&mut self, line: &str, events: &mut Vec<ScanEvent>) -> ScanState {
        if self.capture_title(line) {
            return ScanState::InPageBody;
        }
        if PAGE_END_REGEX.is_match(line) {
            self.end_page(events);
            return ScanState::OutsidePage;
        }
        if let Some(next) = self.enter_text(line, events) {
            return next;
        }
        ScanState::SeekTitle
    }

    fn page_body(&mut self, line: &str, events: &mut Vec<ScanEvent>) -> ScanState {
        if PAGE_END_REGEX.is_match(line) {
            self.end_page(events);
            return ScanState::OutsidePage;
        }
        if self.page.title.is_none() && self.capture_title(line) {
            return ScanState::InPageBody;
        }
        self.enter_text(line, events)
            .unwrap_or(ScanState::InPageBody)
    }

    /// First title wins.
    fn capture_title(&mut self, line: &str) -> bool {
        match TITLE_REGEX.captures(line) {
            Some(caps) => {
                let title = markup::decode_entities(caps[1].trim()).into_owned();
                trace!(title = %title, "Page title");
                self.page.title = Some(title);
                true
            }
            None => false,
        }
    }

    /// Scans whatever follows the text tag on the same line.
    fn enter_text(&mut self, line: &str, events: &mut Vec<ScanEvent>) -> Option<ScanState> {
        let caps = TEXT_START_REGEX.captures(line)?;
        let self_closing = caps
            .get(1)
            .is_some_and(|attrs| attrs.as_str().trim_end().ends_with('/'));
        if self_closing {
            return Some(ScanState::InPageBody);
        }
        let trailing = caps.get(2).map_or("", |m| m.as_str());
        Some(self.text_line(TextState::Body, trailing, events))
    }

    fn text_line(
        &mut self,
        text: TextState,
        line: &str,
        events: &mut Vec<ScanEvent>,
    ) -> ScanState {
        match text {
            TextState::Infobox(ctx) if ctx.pending.is_some() => {
                self.continue_field(ctx, line, events)
            }
            text => self.text_content(text, line, events),
        }
    }

    fn text_content(
        &mut self,
        text: TextState,
        line: &str,
        events: &mut Vec<ScanEvent>,
    ) -> ScanState {
        let Some(text_end) = TEXT_END_REGEX.find(line) else {
            if PAGE_END_REGEX.is_match(line) {
                self.end_page(events);
                return ScanState::OutsidePage;
            }
            return ScanState::InText(self.scan_infobox_line(text, line, events));
        };

        let content = &line[..text_end.start()];
        let next = ScanState::InText(self.scan_infobox_line(text, content, events));
        if is_pending(&next) {
            self.abandon_field(events);
        }
        if PAGE_END_REGEX.is_match(&line[text_end.end()..]) {
            self.end_page(events);
            return ScanState::OutsidePage;
        }
        ScanState::InPageBody
    }

    fn scan_infobox_line(
        &mut self,
        text: TextState,
        content: &str,
        events: &mut Vec<ScanEvent>,
    ) -> TextState {
        let text = if infobox::is_infobox_start(content) {
            self.page.infoboxes_seen += 1;
            TextState::Infobox(InfoboxContext::default())
        } else {
            text
        };

        let TextState::Infobox(mut ctx) = text else {
            return TextState::Body;
        };

        match infobox::classify_field_line(content) {
            FieldLine::Name(name) => ctx.infobox_name = name,
            FieldLine::Alias(field) => match infobox::begin_field(field) {
                FieldStart::Complete(field) => self.emit_field(&ctx, field, events),
                FieldStart::Continues(pending) => ctx.pending = Some(pending),
                FieldStart::Discarded => {}
            },
            FieldLine::Other => {}
        }
        TextState::Infobox(ctx)
    }

    fn continue_field(
        &mut self,
        mut ctx: InfoboxContext,
        line: &str,
        events: &mut Vec<ScanEvent>,
    ) -> ScanState {
        let Some(mut pending) = ctx.pending.take() else {
            return self.text_content(TextState::Infobox(ctx), line, events);
        };

        let Some(text_end) = TEXT_END_REGEX.find(line) else {
            if PAGE_END_REGEX.is_match(line) {
                self.abandon_field(events);
                self.end_page(events);
                return ScanState::OutsidePage;
            }
            if pending.push_line(line) {
                self.emit_field(&ctx, pending.into_field(), events);
            } else {
                ctx.pending = Some(pending);
            }
            return ScanState::InText(TextState::Infobox(ctx));
        };

        // A closing pair in front of the text end still completes the field.
        if pending.push_line(&line[..text_end.start()]) {
            self.emit_field(&ctx, pending.into_field(), events);
        } else {
            self.abandon_field(events);
        }
        if PAGE_END_REGEX.is_match(&line[text_end.end()..]) {
            self.end_page(events);
            return ScanState::OutsidePage;
        }
        ScanState::InPageBody
    }

    fn emit_field(&self, ctx: &InfoboxContext, field: FieldMatch, events: &mut Vec<ScanEvent>) {
        events.push(ScanEvent::Field {
            title: self.title().to_string(),
            infobox_name: ctx.infobox_name.clone(),
            field,
        });
    }

    fn abandon_field(&self, events: &mut Vec<ScanEvent>) {
        events.push(ScanEvent::FieldAbandoned {
            title: self.title().to_string(),
        });
    }

    fn end_page(&mut self, events: &mut Vec<ScanEvent>) {
        let page = mem::take(&mut self.page);
        let title = page.title.unwrap_or_default();
        debug!(title = %title, infoboxes = page.infoboxes_seen, "Page end");
        events.push(ScanEvent::PageEnd { title });
    }

    fn title(&self) -> &str {
        self.page.title.as_deref().unwrap_or("")
    }
}

fn is_pending(state: &ScanState) -> bool {
    matches!(
        state,
        ScanState::InText(TextState::Infobox(InfoboxContext {
            pending: Some(_),
            ..
        }))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;

    fn scan(lines: &[&str]) -> (Vec<ScanEvent>, PageScanner) {
        let mut scanner = PageScanner::new();
        let mut events = Vec::new();
        for line in lines {
            scanner.feed(line, &mut events);
        }
        (events, scanner)
    }

    fn fields(events: &[ScanEvent]) -> Vec<(&str, &str, Tag, &str)> {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Field {
                    title,
                    infobox_name,
                    field,
                } => Some((
                    title.as_str(),
                    infobox_name.as_str(),
                    field.tag,
                    field.raw_value.as_str(),
                )),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn single_page_with_alias_field() {
        let (events, scanner) = scan(&[
            "  <page>",
            "    <title>Robert Smith</title>",
            "      <text bytes=\"100\" xml:space=\"preserve\">{{Infobox person",
            "| name = Bob Smith",
            "| aka = Bobby, Rob",
            "}}",
            "Robert Smith is a person.</text>",
            "  </page>",
        ]);
        assert_eq!(events.first(), Some(&ScanEvent::PageStart));
        assert_eq!(
            fields(&events),
            vec![("Robert Smith", "Bob Smith", Tag::Aka, "Bobby, Rob")]
        );
        assert_eq!(
            events.last(),
            Some(&ScanEvent::PageEnd {
                title: "Robert Smith".to_string()
            })
        );
        assert!(scanner.finish());
    }

    #[test]
    fn title_entities_are_decoded() {
        let (events, _) = scan(&["<page>", "<title>AT&amp;T</title>", "</page>"]);
        assert_eq!(
            events.last(),
            Some(&ScanEvent::PageEnd {
                title: "AT&T".to_string()
            })
        );
    }

    #[test]
    fn fields_outside_infobox_are_ignored() {
        let (events, _) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>",
            "| aka = Not in an infobox",
            "</text>",
            "</page>",
        ]);
        assert!(fields(&events).is_empty());
    }

    #[test]
    fn infobox_name_resets_per_infobox() {
        let (events, _) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a",
            "| name = First",
            "| aka = One",
            "}}",
            "{{Infobox b",
            "| alt_name = Two",
            "}}</text>",
            "</page>",
        ]);
        assert_eq!(
            fields(&events),
            vec![
                ("T", "First", Tag::Aka, "One"),
                ("T", "", Tag::AltName, "Two"),
            ]
        );
    }

    #[test]
    fn depth_is_bounded_to_two() {
        let mut scanner = PageScanner::new();
        let mut events = Vec::new();
        assert_eq!(scanner.depth(), 0);
        scanner.feed("<page>", &mut events);
        scanner.feed("<title>T</title>", &mut events);
        scanner.feed("<text>", &mut events);
        assert_eq!(scanner.depth(), 1);
        scanner.feed("{{Infobox a", &mut events);
        assert_eq!(scanner.depth(), 2);
        scanner.feed("{{Infobox b", &mut events);
        assert_eq!(scanner.depth(), 2);
        scanner.feed("</text>", &mut events);
        assert_eq!(scanner.depth(), 0);
        assert!(scanner.in_page());
    }

    #[test]
    fn multi_line_field_is_joined() {
        let (events, _) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a",
            "| alternate_name = {{plainlist|",
            "* Bob",
            "* Rob",
            "}}",
            "| birth_date = 1900",
            "}}</text>",
            "</page>",
        ]);
        assert_eq!(
            fields(&events),
            vec![(
                "T",
                "",
                Tag::AlternateName,
                "{{plainlist|<br>Bob<br>Rob}}"
            )]
        );
    }

    #[test]
    fn text_end_abandons_continuation() {
        let (events, scanner) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a",
            "| aka = {{ubl",
            "| Bob",
            "</text>",
            "</page>",
        ]);
        assert!(fields(&events).is_empty());
        assert!(events.contains(&ScanEvent::FieldAbandoned {
            title: "T".to_string()
        }));
        assert_eq!(
            events.last(),
            Some(&ScanEvent::PageEnd {
                title: "T".to_string()
            })
        );
        assert!(scanner.finish());
    }

    #[test]
    fn closing_pair_on_text_end_line_completes_field() {
        let (events, scanner) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a",
            "| alternate_name = {{plainlist|",
            "* Bob",
            "* Rob",
            "}}</text>",
            "</page>",
        ]);
        assert_eq!(
            fields(&events),
            vec![(
                "T",
                "",
                Tag::AlternateName,
                "{{plainlist|<br>Bob<br>Rob}}"
            )]
        );
        assert!(!events
            .iter()
            .any(|e| matches!(e, ScanEvent::FieldAbandoned { .. })));
        assert!(scanner.finish());
    }

    #[test]
    fn closing_pair_with_page_end_on_one_line() {
        let (events, scanner) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a",
            "| aka = {{ubl|Bob",
            "|Rob}}</text></page>",
        ]);
        assert_eq!(fields(&events).len(), 1);
        assert_eq!(
            events.last(),
            Some(&ScanEvent::PageEnd {
                title: "T".to_string()
            })
        );
        assert!(scanner.finish());
    }

    #[test]
    fn scanning_resumes_after_abandoned_field() {
        let (events, _) = scan(&[
            "<page>",
            "<title>A</title>",
            "<text>{{Infobox a",
            "| aka = {{ubl",
            "</text>",
            "</page>",
            "<page>",
            "<title>B</title>",
            "<text>{{Infobox b",
            "| aka = Bee",
            "}}</text>",
            "</page>",
        ]);
        assert_eq!(fields(&events), vec![("B", "", Tag::Aka, "Bee")]);
    }

    #[test]
    fn stray_closer_value_is_noise() {
        let (events, _) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a",
            "| aka = Bob}}",
            "</text>",
            "</page>",
        ]);
        assert!(fields(&events).is_empty());
    }

    #[test]
    fn truncated_input_emits_no_page_end() {
        let (events, scanner) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a",
            "| aka = {{ubl",
            "| Bob",
        ]);
        assert_eq!(events, vec![ScanEvent::PageStart]);
        assert!(scanner.is_continuing());
        assert!(!scanner.finish());
    }

    #[test]
    fn self_closing_text_is_skipped() {
        let (events, _) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text bytes=\"0\" />",
            "{{Infobox a",
            "| aka = Ignored",
            "</page>",
        ]);
        assert!(fields(&events).is_empty());
    }

    #[test]
    fn single_line_text_is_scanned() {
        let (events, _) = scan(&[
            "<page>",
            "<title>T</title>",
            "<text>{{Infobox a | aka = {{ubl|A|B}}",
            "}}</text></page>",
        ]);
        assert_eq!(fields(&events), vec![("T", "", Tag::Aka, "{{ubl|A|B}}")]);
        assert_eq!(
            events.last(),
            Some(&ScanEvent::PageEnd {
                title: "T".to_string()
            })
        );
    }

    #[test]
    fn page_start_inside_page_restarts() {
        let (events, _) = scan(&[
            "<page>",
            "<title>Broken</title>",
            "<text>{{Infobox a",
            "<page>",
            "<title>Next</title>",
            "</page>",
        ]);
        assert_eq!(
            events,
            vec![
                ScanEvent::PageStart,
                ScanEvent::PageStart,
                ScanEvent::PageEnd {
                    title: "Next".to_string()
                },
            ]
        );
    }

    #[test]
    fn page_start_during_continuation_abandons_field() {
        let (events, _) = scan(&[
            "<page>",
            "<title>Broken</title>",
            "<text>{{Infobox a",
            "| aka = {{ubl",
            "<page>",
            "<title>Next</title>",
            "</page>",
        ]);
        assert_eq!(
            events,
            vec![
                ScanEvent::PageStart,
                ScanEvent::FieldAbandoned {
                    title: "Broken".to_string()
                },
                ScanEvent::PageStart,
                ScanEvent::PageEnd {
                    title: "Next".to_string()
                },
            ]
        );
    }

    #[test]
    fn missing_title_gives_empty_title() {
        let (events, _) = scan(&["<page>", "<text>{{Infobox a", "| aka = X", "</text>", "</page>"]);
        assert_eq!(fields(&events), vec![("", "", Tag::Aka, "X")]);
    }

    #[test]
    fn first_title_wins() {
        let (events, _) = scan(&[
            "<page>",
            "<title>First</title>",
            "<title>Second</title>",
            "</page>",
        ]);
        assert_eq!(
            events.last(),
            Some(&ScanEvent::PageEnd {
                title: "First".to_string()
            })
        );
    }
}
