use crate::markup;
use once_cell::sync::Lazy;
use regex::Regex;

static SIBLING_FIELD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\|[^=|]*=").unwrap());

static BREAK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").unwrap());

static BREAK_SPLIT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*<\s*br\s*/?\s*>\s*").unwrap());

static LEADING_BREAK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*<\s*br\s*/?\s*>").unwrap());

static PIPE_SPLIT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\|\s*").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemDelimiter {
    Pipe,
    Break,
}

/// List templates in detection order.
static LIST_TEMPLATES: Lazy<Vec<(Regex, ItemDelimiter)>> = Lazy::new(|| {
    [
        (r"unbulleted\s+list", ItemDelimiter::Pipe),
        (r"ubl", ItemDelimiter::Pipe),
        (r"plain\s*list", ItemDelimiter::Break),
        (r"hlist", ItemDelimiter::Pipe),
        (r"flatlist", ItemDelimiter::Break),
        (r"collapsible\s+list", ItemDelimiter::Pipe),
    ]
    .into_iter()
    .map(|(keyword, delimiter)| {
        let pattern = format!(r"(?is)^\s*\{{\s*\{{\s*{keyword}\s*\|\s*([^}}]*)\}}\s*\}}\s*(.*)$");
        (Regex::new(&pattern).unwrap(), delimiter)
    })
    .collect()
});

/// Full path from a raw field value to sanitized names.
pub fn extract_names(raw_value: &str) -> Vec<String> {
    sanitize(tokenize(&markup::normalize(raw_value)))
}

/// Splits one normalized field value into candidate names, in order.
/// Never returns blank items.
pub fn tokenize(value: &str) -> Vec<String> {
    let value = strip_sibling_field(value);
    if value.trim().is_empty() {
        return Vec::new();
    }

    let mut names = match split_list_template(value) {
        Some(items) => items,
        None => split_delimited(value),
    };
    names.retain(|name| !name.trim().is_empty());
    names
}

/// Visible text of each candidate; candidates that render to nothing are dropped.
pub fn sanitize(items: Vec<String>) -> Vec<String> {
    items
        .iter()
        .map(|item| markup::visible_text(item))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Drops a `| key = value` tail captured from the same line.
fn strip_sibling_field(value: &str) -> &str {
    match SIBLING_FIELD_REGEX.find(value) {
        Some(m) => &value[..m.start()],
        None => value,
    }
}

fn split_list_template(value: &str) -> Option<Vec<String>> {
    let (caps, delimiter) = LIST_TEMPLATES
        .iter()
        .find_map(|(regex, delimiter)| regex.captures(value).map(|caps| (caps, *delimiter)))?;

    let items = &caps[1];
    let mut names: Vec<String> = match delimiter {
        ItemDelimiter::Pipe => PIPE_SPLIT_REGEX
            .split(items)
            .map(|s| s.trim().to_string())
            .collect(),
        ItemDelimiter::Break => {
            let items = LEADING_BREAK_REGEX.replace(items, "");
            BREAK_SPLIT_REGEX
                .split(&items)
                .map(|s| s.trim().to_string())
                .collect()
        }
    };

    let trailing = caps[2].trim();
    if !trailing.is_empty() {
        names.extend(tokenize(&markup::normalize(trailing)));
    }
    Some(names)
}

fn split_delimited(value: &str) -> Vec<String> {
    if BREAK_REGEX.is_match(value) {
        return BREAK_SPLIT_REGEX
            .split(value)
            .map(|s| s.trim().to_string())
            .collect();
    }
    match split_outside_parens(value) {
        Some(pieces) => pieces.into_iter().map(str::to_string).collect(),
        None => vec![value.trim().to_string()],
    }
}

/// Splits on commas at parenthesis depth zero. `None` when there is no such comma.
fn split_outside_parens(value: &str) -> Option<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if pieces.is_empty() {
        return None;
    }
    pieces.push(value[start..].trim());
    Some(pieces)
}
