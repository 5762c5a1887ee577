//! wikialias: alternate-name extraction from Wikipedia infoboxes
//!
//! This crate streams a Wikipedia XML dump line by line, finds the `aka`, `alt_name`
//! and `alternate_name` fields of every infobox, and splits their values into
//! individual names that are written to an alias CSV for later lookup.
//!
//! # Pipeline
//!
//! 1. **Line source** -- [`reader::open_dump`] reads plain or bzip2-compressed dumps
//! 2. **Page scanner** -- [`scanner::PageScanner`] is a bounded state machine over
//!    page, title, text and infobox boundaries, including multi-line field values
//! 3. **Normalizer** -- [`markup::normalize`] strips references and markup, then
//!    resolves a fixed catalogue of template wrappers ([`templates`])
//! 4. **Tokenizer** -- [`names::tokenize`] splits list templates, break-separated and
//!    comma-separated values into candidate names
//! 5. **Sink** -- [`sink::IndexSink`] receives one record per name plus a per-page
//!    `all_tags` aggregate; [`index::AliasIndex`] reads the result back
//!
//! Everything runs on one thread; input files are processed in the order given.
//!
//! # Key Modules
//!
//! - [`extract`] -- Run driver tying the scanner, tokenizer, statistics and sink together
//! - [`infobox`] -- Field line classification and multi-line continuation
//! - [`stats`] -- Per-run counters and names-per-field histograms
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! wikialias extract enwiki-latest-pages-articles.xml.bz2 -o aliases.csv
//! wikialias lookup -i aliases.csv "Mercury"
//! ```

pub mod config;
pub mod extract;
pub mod index;
pub mod infobox;
pub mod markup;
pub mod models;
pub mod names;
pub mod reader;
pub mod scanner;
pub mod sink;
pub mod stats;
pub mod templates;
