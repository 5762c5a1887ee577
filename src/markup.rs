use crate::config::BREAK_MARKER;
use crate::templates;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap()
});

static REF_PAIR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*ref[^>]*>[^<]*<\s*/\s*ref\s*>").unwrap());

static SUP_PAIR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*sup[^>]*>[^<]*<\s*/\s*sup\s*>").unwrap());

static STRAY_REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/?\s*ref[^>]*/?>").unwrap());

static EMPHASIS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"'{2,}").unwrap());

static INTERNAL_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?:[^\[\]|]*\|)*([^\[\]|]*)\]\]").unwrap());

static EXTERNAL_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:https?:)?//[^\s\]]+(?:\s+([^\]]*))?\]").unwrap());

static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static BREAK_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*<\s*/?\s*br\s*/?\s*>\s*").unwrap());

static HTML_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*/?\s*([A-Za-z][A-Za-z0-9]*)\b[^<>]*>").unwrap());

/// Normalizes one infobox field value: entities decoded, references dropped,
/// bullets turned into break markers, wiki markup flattened, tags stripped and
/// the known template wrappers resolved.
pub fn normalize(raw: &str) -> String {
    let decoded = decode_entities(raw);
    let without_refs = strip_references(&decoded);
    let bulleted = without_refs.replace('*', BREAK_MARKER);
    let rendered = render_wikitext(&bulleted);
    let flattened = strip_tags(&rendered);
    templates::resolve_templates(&flattened)
}

/// Visible text of a single candidate name: every tag removed, entities decoded,
/// whitespace collapsed.
pub fn visible_text(item: &str) -> String {
    let without_comments = COMMENT_REGEX.replace_all(item, "");
    let without_tags = HTML_TAG_REGEX.replace_all(&without_comments, " ");
    decode_entities(&without_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Single-pass entity decoding. Unknown entities are kept verbatim.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if memchr::memchr(b'&', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    ENTITY_REGEX.replace_all(text, |caps: &Captures| {
        if let Some(resolved) = html_entity(&caps[1]) {
            return resolved.to_string();
        }
        match quick_xml::escape::unescape(&caps[0]) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => caps[0].to_string(),
        }
    })
}

fn strip_references(text: &str) -> String {
    let without_refs = REF_PAIR_REGEX.replace_all(text, "");
    let without_sups = SUP_PAIR_REGEX.replace_all(&without_refs, "");
    STRAY_REF_REGEX.replace_all(&without_sups, "").into_owned()
}

/// Flattens emphasis and links. Template syntax is left alone.
fn render_wikitext(text: &str) -> String {
    let without_emphasis = EMPHASIS_REGEX.replace_all(text, "");
    let internal = INTERNAL_LINK_REGEX.replace_all(&without_emphasis, "$1");
    EXTERNAL_LINK_REGEX.replace_all(&internal, "${1}").into_owned()
}

/// Removes every tag except the break marker, which is canonicalized, and drops
/// literal newlines.
fn strip_tags(text: &str) -> String {
    let without_comments = COMMENT_REGEX.replace_all(text, "");
    let breaks = BREAK_TAG_REGEX.replace_all(&without_comments, BREAK_MARKER);
    let stripped = HTML_TAG_REGEX.replace_all(&breaks, |caps: &Captures| {
        if caps[1].eq_ignore_ascii_case("br") {
            caps[0].to_string()
        } else {
            String::new()
        }
    });
    stripped.replace(['\n', '\r'], "")
}

/// Named HTML entities seen in infobox values. XML-predefined and numeric
/// references go through quick-xml.
fn html_entity(name: &str) -> Option<&'static str> {
    let resolved = match name {
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "shy" => "\u{ad}",
        "zwj" => "\u{200d}",
        "zwnj" => "\u{200c}",
        "lrm" => "\u{200e}",
        "rlm" => "\u{200f}",
        "ndash" => "–",
        "mdash" => "—",
        "minus" => "−",
        "hellip" => "…",
        "middot" => "·",
        "bull" => "•",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "laquo" => "«",
        "raquo" => "»",
        "prime" => "′",
        "Prime" => "″",
        "times" => "×",
        "divide" => "÷",
        "deg" => "°",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "sect" => "§",
        "para" => "¶",
        "dagger" => "†",
        "Dagger" => "‡",
        "aacute" => "á",
        "Aacute" => "Á",
        "agrave" => "à",
        "acirc" => "â",
        "auml" => "ä",
        "Auml" => "Ä",
        "aring" => "å",
        "ccedil" => "ç",
        "Ccedil" => "Ç",
        "eacute" => "é",
        "Eacute" => "É",
        "egrave" => "è",
        "ecirc" => "ê",
        "euml" => "ë",
        "iacute" => "í",
        "iuml" => "ï",
        "ntilde" => "ñ",
        "Ntilde" => "Ñ",
        "oacute" => "ó",
        "ocirc" => "ô",
        "ouml" => "ö",
        "Ouml" => "Ö",
        "oslash" => "ø",
        "uacute" => "ú",
        "ugrave" => "ù",
        "uuml" => "ü",
        "Uuml" => "Ü",
        "szlig" => "ß",
        _ => return None,
    };
    Some(resolved)
}
