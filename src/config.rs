/// Title prefixes (lower-cased) whose pages never produce records
pub const RESERVED_TITLE_PREFIXES: &[&str] = &["wikipedia:", "template:", "draft:"];

/// Histogram buckets per tag: counts `0..HISTOGRAM_BUCKETS` names per occurrence
pub const HISTOGRAM_BUCKETS: usize = 100;

/// Upper bound on template rewrite passes for a single value
pub const MAX_TEMPLATE_PASSES: usize = 64;

/// Progress update interval (tick every N pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Buffer size for the CSV sink writer
pub const WRITER_BUFFER_SIZE: usize = 128 * 1024;

/// Buffer size for the dump line reader
pub const READER_BUFFER_SIZE: usize = 256 * 1024;

/// Internal line-break marker that feeds list splitting
pub const BREAK_MARKER: &str = "<br>";
