//! Free-form command extraction
//!
//! Used only when no grammar rule matched. A leading verb decides the command type;
//! `key: value` / `key=value` pairs (values may be quoted) become parameters, and a bare
//! `name.ext` token becomes `filename` unless a pair already set it.

use super::rules::shape_create_params;
use super::{CommandType, StructuredCommand};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static LEADING_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(create|list|analyze|search|read|delete|schedule)\b").unwrap()
});

static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b([a-z_][a-z0-9_\-]*)\s*[:=]\s*(?:"([^"]*)"|'([^']*)'|([^\s,;"']+))"#)
        .unwrap()
});

static BARE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([\w\-]+(?:\.[\w\-]+)*\.[A-Za-z][A-Za-z0-9]{0,9})\b").unwrap());

/// Extract a command from text that starts with a known verb
pub fn extract(text: &str) -> Option<StructuredCommand> {
    let verb = LEADING_VERB.captures(text)?.get(1)?.as_str();
    let command_type: CommandType = verb.parse().ok()?;

    let mut params = parse_key_values(text);

    if !params.contains_key("filename") {
        if let Some(filename) = find_bare_filename(text) {
            params.insert("filename".to_string(), filename);
        }
    }

    if command_type == CommandType::Create {
        shape_create_params(&mut params);
    }

    Some(StructuredCommand::new(command_type, None, params))
}

/// Collect `key: value` and `key=value` pairs; keys are lower-cased, first occurrence wins
pub fn parse_key_values(text: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();

    for caps in KEY_VALUE.captures_iter(text) {
        let key = caps[1].to_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        params.entry(key).or_insert(value);
    }

    params
}

fn find_bare_filename(text: &str) -> Option<String> {
    BARE_FILENAME
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|token| !token.contains("://"))
        .map(str::to_string)
}
