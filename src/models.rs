use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance label of an emitted name: the infobox key it came from, or the
/// page-level union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Aka,
    AltName,
    AlternateName,
    AllTags,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Aka, Tag::AltName, Tag::AlternateName, Tag::AllTags];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Aka => "aka",
            Tag::AltName => "alt_name",
            Tag::AlternateName => "alternate_name",
            Tag::AllTags => "all_tags",
        }
    }

    /// Maps an infobox key (any case) to its field tag. `all_tags` is never a key.
    pub fn from_field_key(key: &str) -> Option<Tag> {
        match key.to_ascii_lowercase().as_str() {
            "aka" => Some(Tag::Aka),
            "alt_name" => Some(Tag::AltName),
            "alternate_name" => Some(Tag::AlternateName),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An AKA-like field value captured inside an infobox, possibly joined from
/// several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub tag: Tag,
    pub raw_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateNameRecord {
    pub title: String,
    pub infobox_name: String,
    pub name: String,
    pub tag: Tag,
    pub sibling_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateName {
    pub infobox_name: String,
    pub name: String,
}

/// Every name found on one page, in discovery order and without deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAggregate {
    pub title: String,
    pub names: Vec<AggregateName>,
}

impl PageAggregate {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn records(&self) -> impl Iterator<Item = AlternateNameRecord> + '_ {
        let sibling_count = self.names.len();
        self.names.iter().map(move |n| AlternateNameRecord {
            title: self.title.clone(),
            infobox_name: n.infobox_name.clone(),
            name: n.name.clone(),
            tag: Tag::AllTags,
            sibling_count,
        })
    }
}
