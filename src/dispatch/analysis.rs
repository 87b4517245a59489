//! Content analysis for the data handler (pure functions)

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());

/// Line, word and character counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStats {
    pub lines: usize,
    pub words: usize,
    pub characters: usize,
}

impl TextStats {
    pub fn of(content: &str) -> Self {
        Self {
            lines: content.lines().count(),
            words: content.split_whitespace().count(),
            characters: content.chars().count(),
        }
    }
}

/// Code line counts plus a language guess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeStats {
    pub lines: usize,
    pub non_blank: usize,
    pub comments: usize,
    pub language: &'static str,
}

/// How a piece of content should be analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Json,
    Text,
    Code,
}

impl AnalysisKind {
    /// Resolve the requested type; `file` (or anything unknown) is inferred from the
    /// file extension, then from the content itself
    pub fn resolve(requested: &str, filename: Option<&str>, content: &str) -> Self {
        match requested.to_lowercase().as_str() {
            "json" => AnalysisKind::Json,
            "text" | "data" => AnalysisKind::Text,
            "code" => AnalysisKind::Code,
            _ => {
                if let Some(ext) = filename.and_then(crate::storage::extension_of) {
                    if ext == "json" {
                        return AnalysisKind::Json;
                    }
                    if language_for_extension(&ext).is_some() {
                        return AnalysisKind::Code;
                    }
                    return AnalysisKind::Text;
                }
                if serde_json::from_str::<Value>(content).is_ok_and(|v| v.is_object() || v.is_array()) {
                    AnalysisKind::Json
                } else {
                    AnalysisKind::Text
                }
            }
        }
    }
}

/// Analyze content and render a report
pub fn analyze(kind: AnalysisKind, content: &str, filename: Option<&str>) -> String {
    match kind {
        AnalysisKind::Json => analyze_json(content),
        AnalysisKind::Text => analyze_text(content),
        AnalysisKind::Code => analyze_code(content, filename),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn analyze_json(content: &str) -> String {
    let value: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => return format!("Invalid JSON: {e}"),
    };

    match &value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            let types: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", json_type_name(v)))
                .collect();
            format!(
                "JSON analysis:\n- Top-level keys: {}\n- Keys: {}\n- Types: {}",
                map.len(),
                keys.join(", "),
                types.join(", ")
            )
        }
        Value::Array(items) => {
            let mut element_types: Vec<&str> = items.iter().map(json_type_name).collect();
            element_types.sort_unstable();
            element_types.dedup();
            format!(
                "JSON analysis:\n- Array with {} items\n- Element types: {}",
                items.len(),
                if element_types.is_empty() {
                    "none".to_string()
                } else {
                    element_types.join(", ")
                }
            )
        }
        other => format!("JSON analysis:\n- Single {} value", json_type_name(other)),
    }
}

pub fn count_sentences(content: &str) -> usize {
    SENTENCE_END
        .split(content)
        .filter(|segment| segment.chars().any(char::is_alphanumeric))
        .count()
}

pub fn analyze_text(content: &str) -> String {
    let stats = TextStats::of(content);
    format!(
        "Text analysis:\n- Lines: {}\n- Words: {}\n- Characters: {}\n- Sentences: {}",
        stats.lines,
        stats.words,
        stats.characters,
        count_sentences(content)
    )
}

fn is_comment_line(line: &str) -> bool {
    ["//", "#", "/*", "*", "--", "<!--"]
        .iter()
        .any(|marker| line.starts_with(marker))
}

pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "js" | "mjs" | "cjs" => Some("javascript"),
        "ts" | "tsx" => Some("typescript"),
        "py" => Some("python"),
        "rs" => Some("rust"),
        "sh" | "bash" => Some("shell"),
        "html" | "htm" => Some("html"),
        "css" => Some("css"),
        "go" => Some("go"),
        "rb" => Some("ruby"),
        "java" => Some("java"),
        "c" | "h" => Some("c"),
        _ => None,
    }
}

/// Guess the language from distinctive markers in the source
pub fn detect_language(content: &str) -> &'static str {
    const MARKERS: [(&str, &[&str]); 8] = [
        ("rust", &["fn main", "let mut ", "pub fn ", "impl "]),
        ("python", &["def ", "import ", "elif ", "print("]),
        ("typescript", &["interface ", ": string", ": number"]),
        ("javascript", &["function ", "const ", "console.log", "=>"]),
        ("shell", &["#!/bin/sh", "#!/bin/bash", "echo "]),
        ("html", &["<html", "<div", "<body"]),
        ("c", &["#include", "int main"]),
        ("css", &["{ color", "margin:", "padding:"]),
    ];

    MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| content.contains(m)))
        .map(|(language, _)| *language)
        .unwrap_or("unknown")
}

pub fn code_stats(content: &str, filename: Option<&str>) -> CodeStats {
    let mut non_blank = 0;
    let mut comments = 0;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        non_blank += 1;
        if is_comment_line(trimmed) {
            comments += 1;
        }
    }

    let language = filename
        .and_then(crate::storage::extension_of)
        .and_then(|ext| language_for_extension(&ext))
        .unwrap_or_else(|| detect_language(content));

    CodeStats {
        lines: content.lines().count(),
        non_blank,
        comments,
        language,
    }
}

pub fn analyze_code(content: &str, filename: Option<&str>) -> String {
    let stats = code_stats(content, filename);
    format!(
        "Code analysis:\n- Lines: {}\n- Non-blank lines: {}\n- Comment lines: {}\n- Language: {}",
        stats.lines, stats.non_blank, stats.comments, stats.language
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object_report() {
        let report = analyze_json(r#"{"a":1,"b":2}"#);
        assert!(report.contains("Top-level keys: 2"));
        assert!(report.contains("a, b"));
        assert!(report.contains("a: number, b: number"));
    }

    #[test]
    fn test_json_mixed_types() {
        let report = analyze_json(r#"{"name":"x","tags":[],"ok":true,"meta":{},"none":null}"#);
        assert!(report.contains("Top-level keys: 5"));
        assert!(report.contains("name: string"));
        assert!(report.contains("tags: array"));
        assert!(report.contains("ok: boolean"));
        assert!(report.contains("meta: object"));
        assert!(report.contains("none: null"));
    }

    #[test]
    fn test_json_array_and_scalar() {
        assert!(analyze_json("[1, \"a\", 2]").contains("Array with 3 items"));
        assert!(analyze_json("[1, \"a\", 2]").contains("number, string"));
        assert!(analyze_json("42").contains("Single number value"));
    }

    #[test]
    fn test_json_parse_error_is_reported() {
        let report = analyze_json("{not json");
        assert!(report.starts_with("Invalid JSON: "));
        assert!(report.contains("line 1"));
    }

    #[test]
    fn test_text_stats() {
        let stats = TextStats::of("hello world\nsecond line here");
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.words, 5);
        assert_eq!(stats.characters, 28);
        assert_eq!(TextStats::of("").lines, 0);
    }

    #[test]
    fn test_sentence_count() {
        assert_eq!(count_sentences("One. Two! Three?"), 3);
        assert_eq!(count_sentences("No terminator"), 1);
        assert_eq!(count_sentences("Wait... what?!"), 2);
        assert_eq!(count_sentences(""), 0);
    }

    #[test]
    fn test_code_stats() {
        let source = "// greet\nfunction hi() {\n\n  console.log('hi');\n}\n";
        let stats = code_stats(source, None);
        assert_eq!(stats.lines, 5);
        assert_eq!(stats.non_blank, 4);
        assert_eq!(stats.comments, 1);
        assert_eq!(stats.language, "javascript");
    }

    #[test]
    fn test_language_from_extension_wins() {
        assert_eq!(code_stats("echo hi", Some("run.py")).language, "python");
        assert_eq!(detect_language("def f():\n    pass"), "python");
        assert_eq!(detect_language("plain words"), "unknown");
    }

    #[test]
    fn test_resolve_kind() {
        assert_eq!(AnalysisKind::resolve("json", None, ""), AnalysisKind::Json);
        assert_eq!(AnalysisKind::resolve("data", None, ""), AnalysisKind::Text);
        assert_eq!(AnalysisKind::resolve("CODE", None, ""), AnalysisKind::Code);
        assert_eq!(
            AnalysisKind::resolve("file", Some("data.json"), ""),
            AnalysisKind::Json
        );
        assert_eq!(
            AnalysisKind::resolve("file", Some("main.rs"), ""),
            AnalysisKind::Code
        );
        assert_eq!(
            AnalysisKind::resolve("file", Some("notes.txt"), ""),
            AnalysisKind::Text
        );
        assert_eq!(AnalysisKind::resolve("file", None, "{\"a\":1}"), AnalysisKind::Json);
        assert_eq!(AnalysisKind::resolve("file", None, "7"), AnalysisKind::Text);
    }
}
