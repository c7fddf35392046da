use crate::gate::verdict::{GateVerdict, format_block_message};
use serde::Serialize;
use std::fmt;

/// Why a gate run produced no verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateErrorType {
    Api,
    Timeout,
    InvalidOutput,
    Unknown,
}

impl GateErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            GateErrorType::Api => "api",
            GateErrorType::Timeout => "timeout",
            GateErrorType::InvalidOutput => "invalid_output",
            GateErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GateErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one gate run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// No high-severity finding, so the gate never engaged
    Disabled,
    Allow {
        verdict: GateVerdict,
        /// Always false; gate results are never cached
        from_cache: bool,
    },
    Block {
        verdict: GateVerdict,
        from_cache: bool,
    },
    /// Every attempt failed. Callers must treat this exactly like a block.
    Error {
        raw_error: String,
        error_type: GateErrorType,
        /// Always false; an error blocks like a block verdict
        can_fail_open: bool,
    },
}

impl GateDecision {
    pub fn allow(verdict: GateVerdict) -> Self {
        GateDecision::Allow {
            verdict,
            from_cache: false,
        }
    }

    pub fn block(verdict: GateVerdict) -> Self {
        GateDecision::Block {
            verdict,
            from_cache: false,
        }
    }

    pub fn error(error_type: GateErrorType, raw_error: impl Into<String>) -> Self {
        GateDecision::Error {
            raw_error: raw_error.into(),
            error_type,
            can_fail_open: false,
        }
    }

    /// Whether a caller may ignore this result and run the command anyway.
    /// No decision permits that.
    pub fn can_fail_open(&self) -> bool {
        false
    }

    /// True only for an explicit allow or a gate that never engaged
    pub fn permits_execution(&self) -> bool {
        matches!(self, GateDecision::Allow { .. } | GateDecision::Disabled)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GateDecision::Error { .. })
    }

    /// User-facing explanation when execution is not permitted
    pub fn rejection_message(&self) -> Option<String> {
        match self {
            GateDecision::Block { verdict, .. } => Some(format_block_message(verdict)),
            GateDecision::Error { error_type, .. } => Some(format!(
                "Blocked by LLM intent gate: safety review failed ({}), so the command was not run",
                error_type
            )),
            GateDecision::Allow { .. } | GateDecision::Disabled => None,
        }
    }
}
