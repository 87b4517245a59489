//! Ordered pattern rules for the command grammar
//!
//! Each rule is a `(name, matcher, extractor)` triple evaluated against the trimmed input.
//! Evaluation order is fixed: create, list, analyze, search, schedule, read, delete.
//! Every rule is anchored on a different leading verb, so at most one can match; the
//! order is still the documented tie-break and is covered by tests.

use super::{CommandType, StructuredCommand};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

type Extractor = fn(&Captures<'_>) -> StructuredCommand;

/// A named grammar rule
pub struct PatternRule {
    pub name: &'static str,
    pub matcher: Regex,
    extractor: Extractor,
}

impl PatternRule {
    fn new(name: &'static str, pattern: &str, extractor: Extractor) -> Self {
        Self {
            name,
            matcher: Regex::new(pattern).unwrap(),
            extractor,
        }
    }

    /// Apply this rule to already-trimmed text
    pub fn apply(&self, text: &str) -> Option<StructuredCommand> {
        self.matcher
            .captures(text)
            .map(|caps| (self.extractor)(&caps))
    }
}

/// Declared evaluation order
pub const RULE_ORDER: [&str; 7] = [
    "create", "list", "analyze", "search", "schedule", "read", "delete",
];

static RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            "create",
            r"(?is)^create\s+(?:(?:a|an|the)\s+)?(?:new\s+)?(\w+)\s+(?:(?:called|named)\s+)?(\S+)(?:\s+with\s+content\s*:?\s*(.*))?$",
            extract_create,
        ),
        PatternRule::new(
            "list",
            r"(?i)^list\s+(?:(?:all|my|the)\s+)?(files|documents|scripts|agents|commands|memory)(?:\s+in\s+(.+))?$",
            extract_list,
        ),
        PatternRule::new(
            "analyze",
            r"(?is)^analyze\s+(?:(?:this|the)\s+)?(json|text|code|data|file)\b\s*:?\s*(.*)$",
            extract_analyze,
        ),
        PatternRule::new(
            "search",
            r"(?i)^search\s+(?:for\s+)?(.+?)(?:\s+in\s+(\S+))?$",
            extract_search,
        ),
        PatternRule::new(
            "schedule",
            r"(?i)^schedule\s+(?:(?:a|an)\s+)?(\w+)(?:\s+(.+))?$",
            extract_schedule,
        ),
        PatternRule::new(
            "read",
            r"(?i)^read\s+(?:the\s+)?(?:file\s+)?([\w.\-]+\.[A-Za-z0-9]+)$",
            |caps| single_filename(CommandType::Read, caps),
        ),
        PatternRule::new(
            "delete",
            r"(?i)^delete\s+(?:the\s+)?(?:file\s+)?([\w.\-]+\.[A-Za-z0-9]+)$",
            |caps| single_filename(CommandType::Delete, caps),
        ),
    ]
});

/// `for` opening the time of a schedule
static TIME_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:^|\s)for\s+").unwrap());

static FILENAME_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\-]+(?:\.[\w\-]+)*\.[A-Za-z][A-Za-z0-9]{0,9}$").unwrap());

/// Type name → default extension for `create`
const EXTENSION_TABLE: [(&str, &str); 9] = [
    ("script", ".js"),
    ("file", ".txt"),
    ("document", ".md"),
    ("json", ".json"),
    ("html", ".html"),
    ("css", ".css"),
    ("python", ".py"),
    ("typescript", ".ts"),
    ("javascript", ".js"),
];

const DEFAULT_EXTENSION: &str = ".txt";

/// Rules in evaluation order
pub fn rules() -> &'static [PatternRule] {
    &RULES
}

/// Names of the rules in evaluation order
pub fn rule_names() -> Vec<&'static str> {
    RULES.iter().map(|r| r.name).collect()
}

/// First matching rule wins
pub fn match_rules(text: &str) -> Option<StructuredCommand> {
    RULES.iter().find_map(|rule| rule.apply(text))
}

/// Whether a token looks like `name.ext`
pub fn is_filename(token: &str) -> bool {
    FILENAME_SHAPE.is_match(token)
}

/// Extension for a `create` type, defaulting to `.txt`
pub fn extension_for(kind: &str) -> &'static str {
    let kind = kind.to_lowercase();
    EXTENSION_TABLE
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, ext)| *ext)
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Type names with a known default extension
pub fn creatable_types() -> impl Iterator<Item = &'static str> {
    EXTENSION_TABLE.iter().map(|(kind, _)| *kind)
}

/// Stored name for a `create`:the name itself if it has an extension, otherwise the
/// name plus the extension for its type
pub fn filename_for(kind: &str, name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}{}", extension_for(kind))
    }
}

/// Derive `filename` for create commands that name a target but have no filename yet
pub(crate) fn shape_create_params(params: &mut BTreeMap<String, String>) {
    if params.contains_key("filename") {
        return;
    }
    if let Some(name) = params.get("name").cloned() {
        let kind = params.get("type").map(String::as_str).unwrap_or("file");
        params.insert("filename".to_string(), filename_for(kind, &name));
    }
}

fn capture(caps: &Captures<'_>, index: usize) -> Option<String> {
    caps.get(index)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_create(caps: &Captures<'_>) -> StructuredCommand {
    let mut params = BTreeMap::new();
    let kind = capture(caps, 1).unwrap_or_default();
    let name = capture(caps, 2).unwrap_or_default();

    params.insert("type".to_string(), kind.clone());
    params.insert("name".to_string(), name);
    if let Some(content) = capture(caps, 3) {
        params.insert("content".to_string(), content);
    }
    shape_create_params(&mut params);

    StructuredCommand::new(CommandType::Create, Some(kind.to_lowercase()), params)
}

fn extract_list(caps: &Captures<'_>) -> StructuredCommand {
    let mut params = BTreeMap::new();
    let target = capture(caps, 1).unwrap_or_default().to_lowercase();
    params.insert("target".to_string(), target.clone());
    if let Some(location) = capture(caps, 2) {
        params.insert("location".to_string(), location);
    }
    StructuredCommand::new(CommandType::List, Some(target), params)
}

fn extract_analyze(caps: &Captures<'_>) -> StructuredCommand {
    let mut params = BTreeMap::new();
    let kind = capture(caps, 1).unwrap_or_default().to_lowercase();
    params.insert("type".to_string(), kind.clone());

    if let Some(subject) = capture(caps, 2) {
        if is_filename(&subject) {
            params.insert("filename".to_string(), subject);
        } else {
            params.insert("content".to_string(), subject);
        }
    }

    StructuredCommand::new(CommandType::Analyze, Some(kind), params)
}

fn extract_search(caps: &Captures<'_>) -> StructuredCommand {
    let mut params = BTreeMap::new();
    if let Some(query) = capture(caps, 1) {
        params.insert("query".to_string(), query);
    }
    if let Some(source) = capture(caps, 2) {
        params.insert("source".to_string(), source);
    }
    StructuredCommand::new(CommandType::Search, None, params)
}

fn extract_schedule(caps: &Captures<'_>) -> StructuredCommand {
    let mut params = BTreeMap::new();
    let kind = capture(caps, 1).unwrap_or_default().to_lowercase();
    params.insert("type".to_string(), kind.clone());
    if let Some(rest) = capture(caps, 2) {
        let (description, time) = split_schedule_time(&rest);
        if let Some(description) = description {
            params.insert("description".to_string(), description);
        }
        if let Some(time) = time {
            params.insert("time".to_string(), time);
        }
    }
    StructuredCommand::new(CommandType::Schedule, Some(kind), params)
}

/// Split `<description> for <time>` on the last `for`, so the description may use the word
fn split_schedule_time(rest: &str) -> (Option<String>, Option<String>) {
    let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());

    let Some(marker) = TIME_MARKER.find_iter(rest).last() else {
        return (non_empty(rest), None);
    };
    match non_empty(&rest[marker.end()..]) {
        Some(time) => (non_empty(&rest[..marker.start()]), Some(time)),
        None => (non_empty(rest), None),
    }
}

fn single_filename(command_type: CommandType, caps: &Captures<'_>) -> StructuredCommand {
    let mut params = BTreeMap::new();
    if let Some(filename) = capture(caps, 1) {
        params.insert("filename".to_string(), filename);
    }
    StructuredCommand::new(command_type, None, params)
}
