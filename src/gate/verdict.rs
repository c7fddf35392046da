//! Parsing model output into an allow/block verdict.
//!
//! Model output format is not fully controllable, so parsing is an ordered
//! chain of independent strategies. Each one either recognizes the output
//! or passes. Nothing that fails every strategy is ever read as allow.

use crate::security::finding::truncate_chars;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// Summary used when a block verdict carries no reason
pub const DEFAULT_BLOCK_SUMMARY: &str = "no reason given";

/// Longest raw-output preview carried by a parse error, in characters
pub const PREVIEW_CHARS: usize = 200;

static FINAL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(
        r"(?is)<final>\s*<decision>\s*(allow|block)\s*</decision>\s*<reason>(.*?)</reason>\s*</final>",
    )
});

static LAST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"(?i)^(?:[-*•]\s*|\d+[.)]\s*)?(allow|block)\b[\s:.,;\-]*(.*)$")
});

static BARE_DECISION: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?is)<decision>\s*(allow|block)\s*</decision>"));

static BARE_REASON: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?is)<reason>(.*?)</reason>"));

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Patterns are literals; `test_patterns_compile` forces them
        Err(err) => panic!("invalid regex pattern `{pattern}`: {err}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateAction {
    Allow,
    Block,
}

impl GateAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GateAction::Allow => "allow",
            GateAction::Block => "block",
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("allow") {
            Some(GateAction::Allow)
        } else if word.eq_ignore_ascii_case("block") {
            Some(GateAction::Block)
        } else {
            None
        }
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model's decision on one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    pub action: GateAction,
    pub summary: String,
}

impl GateVerdict {
    /// Summary is trimmed; an empty block summary becomes
    /// [`DEFAULT_BLOCK_SUMMARY`]
    pub fn new(action: GateAction, summary: impl Into<String>) -> Self {
        let summary = summary.into().trim().to_string();
        let summary = if summary.is_empty() && action == GateAction::Block {
            DEFAULT_BLOCK_SUMMARY.to_string()
        } else {
            summary
        };
        Self { action, summary }
    }

    pub fn allow(summary: impl Into<String>) -> Self {
        Self::new(GateAction::Allow, summary)
    }

    pub fn block(summary: impl Into<String>) -> Self {
        Self::new(GateAction::Block, summary)
    }

    pub fn is_allow(&self) -> bool {
        self.action == GateAction::Allow
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerdictParseError {
    #[error("model returned empty output")]
    Empty,

    #[error("no verdict found in model output: {preview}")]
    Unrecognized { preview: String },
}

struct Strategy {
    name: &'static str,
    parse: fn(&str) -> Option<GateVerdict>,
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "exact-word",
        parse: exact_word,
    },
    Strategy {
        name: "final-block",
        parse: last_final_block,
    },
    Strategy {
        name: "last-line",
        parse: last_line,
    },
    Strategy {
        name: "bare-decision",
        parse: bare_decision,
    },
];

/// Recover a verdict from raw model output
pub fn parse_verdict(raw: &str) -> Result<GateVerdict, VerdictParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VerdictParseError::Empty);
    }

    for strategy in STRATEGIES {
        if let Some(verdict) = (strategy.parse)(trimmed) {
            debug!(strategy = strategy.name, action = %verdict.action, "parsed gate verdict");
            return Ok(verdict);
        }
    }

    Err(VerdictParseError::Unrecognized {
        preview: truncate_chars(trimmed, PREVIEW_CHARS),
    })
}

/// The whole output is just `allow` or `block`
fn exact_word(text: &str) -> Option<GateVerdict> {
    GateAction::from_word(text).map(|action| GateVerdict::new(action, ""))
}

/// The last well-formed `<final>` block wins
fn last_final_block(text: &str) -> Option<GateVerdict> {
    let captures = FINAL_BLOCK.captures_iter(text).last()?;
    let action = GateAction::from_word(&captures[1])?;
    Some(GateVerdict::new(action, unescape(&captures[2])))
}

/// `allow` or `block` leading the last non-empty line, optionally after a
/// bullet or list number, followed by an optional reason
fn last_line(text: &str) -> Option<GateVerdict> {
    let line = text.lines().map(str::trim).rfind(|line| !line.is_empty())?;
    let captures = LAST_LINE.captures(line)?;
    let action = GateAction::from_word(&captures[1])?;
    Some(GateVerdict::new(action, &captures[2]))
}

/// A `<decision>` tag without its `<final>` wrapper
fn bare_decision(text: &str) -> Option<GateVerdict> {
    let captures = BARE_DECISION.captures_iter(text).last()?;
    let action = GateAction::from_word(&captures[1])?;
    let reason = BARE_REASON
        .captures_iter(text)
        .last()
        .map(|c| unescape(&c[1]))
        .unwrap_or_default();
    Some(GateVerdict::new(action, reason))
}

/// Render a verdict in the grammar the model is asked to answer in
pub fn format_final_block(verdict: &GateVerdict) -> String {
    format!(
        "<final><decision>{}</decision><reason>{}</reason></final>",
        verdict.action,
        escape(&verdict.summary)
    )
}

/// One user-facing line for a block
pub fn format_block_message(verdict: &GateVerdict) -> String {
    let summary = verdict.summary.trim();
    let summary = if summary.is_empty() {
        DEFAULT_BLOCK_SUMMARY
    } else {
        summary
    };
    format!("Blocked by LLM intent gate: {}", summary)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
