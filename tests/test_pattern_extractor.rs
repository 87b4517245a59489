//! Property tests for command extraction
//!
//! Extraction is pure, so its guarantees can be checked over generated input instead of
//! a fixed list of phrases.

use mother_agent::command::rules::{creatable_types, extension_for, rule_names, RULE_ORDER};
use mother_agent::command::{detect, CommandType, HELP_SYNONYMS};
use proptest::prelude::*;

fn creatable_type() -> impl Strategy<Value = &'static str> {
    let types: Vec<&'static str> = creatable_types().collect();
    proptest::sample::select(types)
}

/// Randomly upper-cases characters of `text`
fn mixed_case(text: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), text.len()).prop_map(move |mask| {
        text.chars()
            .zip(mask)
            .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_detect_is_deterministic(text in "\\PC{0,80}") {
        prop_assert_eq!(detect(&text), detect(&text));
    }

    #[test]
    fn prop_surrounding_whitespace_is_ignored(
        text in "[a-z0-9 .:]{1,60}",
        left in "[ \t\n]{0,4}",
        right in "[ \t\n]{0,4}",
    ) {
        let padded = format!("{left}{text}{right}");
        prop_assert_eq!(detect(&padded), detect(&text));
    }

    #[test]
    fn prop_help_synonyms_in_any_case(
        phrase in proptest::sample::select(HELP_SYNONYMS.to_vec()).prop_flat_map(mixed_case)
    ) {
        let command = detect(&phrase);
        prop_assert!(command.map(|c| c.is_help()).unwrap_or(false), "'{}' not help", phrase);
    }

    #[test]
    fn prop_create_derives_filename_from_type(
        kind in creatable_type(),
        name in "[a-z][a-z0-9_]{0,11}",
    ) {
        let command = detect(&format!("create {kind} {name}")).unwrap();
        prop_assert_eq!(command.command_type, CommandType::Create);
        prop_assert_eq!(command.param("type"), Some(kind));
        let expected = format!("{name}{}", extension_for(kind));
        prop_assert_eq!(command.param("filename"), Some(expected.as_str()));
        prop_assert_eq!(command.param("content"), None);
    }

    #[test]
    fn prop_create_keeps_content_verbatim(
        name in "[a-z][a-z0-9]{0,8}",
        content in "[a-zA-Z0-9(){};='][a-zA-Z0-9 (){};=']{0,39}",
    ) {
        let command = detect(&format!("create script {name} with content: {content}")).unwrap();
        prop_assert_eq!(command.param("content"), Some(content.trim()));
        let expected_filename = format!("{name}.js");
        prop_assert_eq!(command.param("filename"), Some(expected_filename.as_str()));
    }

    #[test]
    fn prop_search_rule_wins_over_free_form(
        words in proptest::collection::vec("[b-h]{2,8}", 1..4),
        ext in "(txt|json|md)",
    ) {
        // A bare filename would become a `filename` param under free-form extraction
        let query = format!("{} report.{ext}", words.join(" "));
        let command = detect(&format!("search for {query}")).unwrap();
        prop_assert_eq!(command.command_type, CommandType::Search);
        prop_assert_eq!(command.param("query"), Some(query.as_str()));
        prop_assert_eq!(command.param("filename"), None);
    }

    #[test]
    fn prop_read_and_delete_take_filename(
        stem in "[a-z][a-z0-9_-]{0,10}",
        ext in "(txt|json|md|py|js)",
        verb in "(read|delete)",
    ) {
        let filename = format!("{stem}.{ext}");
        let command = detect(&format!("{verb} {filename}")).unwrap();
        let expected: CommandType = verb.parse().unwrap();
        prop_assert_eq!(command.command_type, expected);
        prop_assert_eq!(command.param("filename"), Some(filename.as_str()));
    }
}

#[test]
fn test_rule_order_matches_grammar() {
    assert_eq!(
        RULE_ORDER,
        ["create", "list", "analyze", "search", "schedule", "read", "delete"]
    );
    assert_eq!(rule_names(), RULE_ORDER.to_vec());
}

#[test]
fn test_free_form_fallback_with_key_values() {
    let command = detect("delete filename=\"old report.txt\" force: yes").unwrap();
    assert_eq!(command.command_type, CommandType::Delete);
    assert_eq!(command.param("filename"), Some("old report.txt"));
    assert_eq!(command.param("force"), Some("yes"));
}

#[test]
fn test_list_memory_and_agents() {
    let command = detect("list all agents").unwrap();
    assert_eq!(command.command_type, CommandType::List);
    assert_eq!(command.param("target"), Some("agents"));

    let command = detect("list memory").unwrap();
    assert_eq!(command.param("target"), Some("memory"));
}

#[test]
fn test_unrecognised_text_is_none() {
    for text in ["hello", "what can you do?", "please read notes.txt"] {
        assert!(detect(text).is_none(), "'{text}' should not be a command");
    }
}
