use crate::markup;
use crate::models::{FieldMatch, Tag};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

static INFOBOX_START_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\s*\{\s*Infobox").unwrap());

static NAME_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\|\s*name\s*=\s*(.*)").unwrap());

static ALIAS_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\|\s*(aka|alt_name|alternate_name)\s*=\s*(.*)").unwrap());

/// An opener with no closing brace anywhere after it on the line.
static UNMATCHED_OPEN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s*\{[^}]*$").unwrap());

static STRAY_CLOSE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^{]*\}\s*\}").unwrap());

static CLOSING_PAIR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\s*\}").unwrap());

static NESTED_OPEN_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\{\s*\{[^}]*$").unwrap());

/// What a line inside an infobox carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLine {
    Name(String),
    Alias(FieldMatch),
    Other,
}

/// How a freshly matched alias field proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStart {
    Complete(FieldMatch),
    Continues(PendingField),
    Discarded,
}

/// A field whose template opener is closed on a later line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingField {
    field: FieldMatch,
    nested: bool,
}

pub fn is_infobox_start(line: &str) -> bool {
    INFOBOX_START_REGEX.is_match(line)
}

/// The `name` key wins over alias keys on the same line.
pub fn classify_field_line(line: &str) -> FieldLine {
    if let Some(caps) = NAME_FIELD_REGEX.captures(line) {
        return FieldLine::Name(caps[1].trim().to_string());
    }
    match ALIAS_FIELD_REGEX.captures(line) {
        Some(caps) => match Tag::from_field_key(&caps[1]) {
            Some(tag) => FieldLine::Alias(FieldMatch {
                tag,
                raw_value: caps[2].to_string(),
            }),
            None => FieldLine::Other,
        },
        None => FieldLine::Other,
    }
}

pub fn begin_field(field: FieldMatch) -> FieldStart {
    if field.raw_value.trim().is_empty() {
        return FieldStart::Discarded;
    }
    if STRAY_CLOSE_REGEX.is_match(&field.raw_value) {
        trace!(value = %field.raw_value, "Closing braces without opener, ignoring field");
        return FieldStart::Discarded;
    }
    if UNMATCHED_OPEN_REGEX.is_match(&field.raw_value) {
        return FieldStart::Continues(PendingField {
            field,
            nested: false,
        });
    }
    FieldStart::Complete(field)
}

impl PendingField {
    pub fn tag(&self) -> Tag {
        self.field.tag
    }

    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Appends the normalized line. Returns true once the field is closed.
    pub fn push_line(&mut self, line: &str) -> bool {
        let normalized = markup::normalize(line);
        self.field.raw_value.push_str(&normalized);

        if self.nested {
            if STRAY_CLOSE_REGEX.is_match(&normalized) {
                self.nested = false;
            }
            return false;
        }
        if CLOSING_PAIR_REGEX.is_match(&normalized) {
            return true;
        }
        if NESTED_OPEN_LINE_REGEX.is_match(&normalized) {
            self.nested = true;
        }
        false
    }

    pub fn into_field(self) -> FieldMatch {
        self.field
    }
}
