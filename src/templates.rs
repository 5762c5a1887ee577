//! Resolution of the template wrappers that commonly surround alternate names.
//!
//! Each pass finds the leftmost innermost template, classifies its head against
//! [`TEMPLATE_RULES`] and rewrites it. An unclassified head stops resolution for the
//! whole value, leaving the remaining template syntax inline. Templates without
//! arguments are skipped unless they are deletions.

use crate::config::MAX_TEMPLATE_PASSES;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

static TEMPLATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\s*\{\s*([^{}|]*?)\s*(?:\|([^{}]*?))?\s*\}\s*\}").unwrap()
});

static NATIVE_OPTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:paren|italics|rtl)\s*=").unwrap());

static OPENER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s*\{").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Replace the template with its last argument
    LastArgument,
    /// Like `LastArgument`, after dropping `paren=`, `italics=` and `rtl=` options
    NativeLastArgument,
    /// Rename the template to `ubl` so the tokenizer splits its arguments
    RewriteAsList,
    Delete,
}

/// Ordered `(head prefix, effect)` table. Heads are compared lower-cased with
/// whitespace and underscores removed.
pub const TEMPLATE_RULES: &[(&str, Effect)] = &[
    ("lang", Effect::LastArgument),
    ("small", Effect::LastArgument),
    ("big", Effect::LastArgument),
    ("transl", Effect::LastArgument),
    ("nobr", Effect::LastArgument),
    ("proper", Effect::LastArgument),
    ("abbr", Effect::LastArgument),
    ("noitalic", Effect::LastArgument),
    ("nastaliq", Effect::LastArgument),
    ("nq", Effect::LastArgument),
    ("native", Effect::NativeLastArgument),
    ("my", Effect::LastArgument),
    ("nowrap", Effect::LastArgument),
    ("hebrew", Effect::LastArgument),
    ("script/arabic", Effect::LastArgument),
    ("nobold", Effect::LastArgument),
    ("nihongo", Effect::RewriteAsList),
    ("csv", Effect::RewriteAsList),
    ("sfn", Effect::Delete),
    ("audio", Effect::Delete),
    ("video", Effect::Delete),
    ("cit", Effect::Delete),
    ("cn", Effect::Delete),
    ("rp", Effect::Delete),
    ("#", Effect::Delete),
    ("self", Effect::Delete),
    ("inlang", Effect::Delete),
    ("jct", Effect::Delete),
    ("refn", Effect::Delete),
    ("font", Effect::Delete),
    ("flagicon", Effect::Delete),
];

/// Outcome of resolving one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub rewrites: usize,
}

pub fn classify(head: &str) -> Option<Effect> {
    let canonical: String = head
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    TEMPLATE_RULES
        .iter()
        .find(|(prefix, _)| canonical.starts_with(prefix))
        .map(|(_, effect)| *effect)
}

pub fn resolve_templates(text: &str) -> String {
    resolve(text).text
}

pub fn resolve(text: &str) -> Resolution {
    let mut current = text.to_string();
    let mut rewrites = 0;
    while rewrites < MAX_TEMPLATE_PASSES {
        match rewrite_leftmost(&current) {
            Some(next) => {
                current = next;
                rewrites += 1;
            }
            None => return Resolution { text: current, rewrites },
        }
    }
    debug!(value = %current, "Template pass limit reached");
    Resolution {
        text: current,
        rewrites,
    }
}

/// Number of template openers (`{{`, whitespace allowed between braces).
pub fn count_openers(text: &str) -> usize {
    OPENER_REGEX.find_iter(text).count()
}

fn rewrite_leftmost(text: &str) -> Option<String> {
    let (span, head, args) = TEMPLATE_REGEX.captures_iter(text).find_map(|caps| {
        let span = caps.get(0)?.range();
        let head = caps.get(1).map_or("", |m| m.as_str());
        let args = caps.get(2).map(|m| m.as_str());
        // Bare templates other than deletions are left inline and passed over.
        if args.is_none() && classify(head) != Some(Effect::Delete) {
            return None;
        }
        Some((span, head, args))
    })?;

    let Some(effect) = classify(head) else {
        trace!(head = head, "Unknown template, stopping resolution");
        return None;
    };

    let replacement = match effect {
        Effect::LastArgument => last_argument(args, false),
        Effect::NativeLastArgument => last_argument(args, true),
        Effect::RewriteAsList => format!("{{{{ubl|{}}}}}", args?),
        Effect::Delete => String::new(),
    };

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..span.start]);
    out.push_str(&replacement);
    out.push_str(&text[span.end..]);
    Some(out)
}

fn last_argument(args: Option<&str>, strip_native_options: bool) -> String {
    let Some(args) = args else {
        return String::new();
    };
    args.split('|')
        .map(str::trim)
        .filter(|arg| !strip_native_options || !NATIVE_OPTION_REGEX.is_match(arg))
        .last()
        .unwrap_or("")
        .to_string()
}
