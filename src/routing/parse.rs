//! Delegation reply parsing
//!
//! Backends often wrap the JSON in prose or code fences, or produce almost-JSON. Parsing
//! degrades in tiers:
//!
//! 1. strict: the whole reply, then the outermost `{...}` span, as JSON
//! 2. permissive: field-level patterns for `agent`, `reason` and `contextInfo`
//! 3. nothing usable: `None`, the caller falls back to the coordinator

use super::schema::DelegationOutput;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static AGENT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?agent["']?\s*[:=]\s*(?:null|["']([^"']*)["']|([A-Za-z0-9._\-]+))"#)
        .unwrap()
});

static REASON_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?reason["']?\s*[:=]\s*(?:"((?:[^"\\]|\\.)*)"|'([^']*)')"#).unwrap()
});

static CONTEXT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?contextInfo["']?\s*[:=]\s*(\{[^{}]*\})"#).unwrap()
});

/// Which tier produced the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    Strict,
    Permissive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub output: DelegationOutput,
    pub tier: ParseTier,
}

/// Parse a delegation reply, `None` when no tier recognises it
pub fn parse_reply(reply: &str) -> Option<ParsedReply> {
    parse_strict(reply)
        .map(|output| ParsedReply {
            output,
            tier: ParseTier::Strict,
        })
        .or_else(|| {
            parse_permissive(reply).map(|output| ParsedReply {
                output,
                tier: ParseTier::Permissive,
            })
        })
}

/// Outermost `{...}` span, if the braces are ordered
pub fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_strict(reply: &str) -> Option<DelegationOutput> {
    let trimmed = reply.trim();
    serde_json::from_str::<DelegationOutput>(trimmed)
        .ok()
        .or_else(|| {
            outermost_object(trimmed)
                .and_then(|span| serde_json::from_str::<DelegationOutput>(span).ok())
        })
}

fn parse_permissive(reply: &str) -> Option<DelegationOutput> {
    let agent_caps = AGENT_FIELD.captures(reply);
    let reason = REASON_FIELD.captures(reply).and_then(|caps| {
        caps.get(1)
            .map(|m| unescape(m.as_str()))
            .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
    });

    if agent_caps.is_none() && reason.is_none() {
        return None;
    }

    let agent = agent_caps.and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
    });

    let context_info = CONTEXT_FIELD
        .captures(reply)
        .and_then(|caps| serde_json::from_str::<Value>(&caps[1]).ok());

    Some(DelegationOutput {
        agent,
        reason: reason.unwrap_or_default(),
        context_info,
    })
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
