pub mod decision;
pub mod orchestrator;
pub mod prompt;
pub mod verdict;

pub use decision::{GateDecision, GateErrorType};
pub use orchestrator::{
    ATTEMPT_TIERS, DEFAULT_GATE_TIMEOUT, GATE_STOP_SEQUENCE, GateSettings, SafetyGate,
};
pub use prompt::{
    CommandSource, ExecutionContext, GateRequest, SandboxStatus, build_gate_input, system_prompt,
};
pub use verdict::{
    DEFAULT_BLOCK_SUMMARY, GateAction, GateVerdict, VerdictParseError, format_block_message,
    format_final_block, parse_verdict,
};
