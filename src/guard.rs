//! End-to-end composition of the three layers: recorded permissions first,
//! then the classifier and, when it flags a high-severity risk, the gate.

use crate::gate::{GateDecision, GateRequest, SafetyGate};
use crate::permissions::{PermissionDecision, PermissionMatcher};
use crate::shell::PrefixResolver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What the caller should do with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Run it
    Proceed,
    /// Ask the user first
    NeedsApproval { message: String },
    /// Do not run it
    Rejected { message: String },
}

impl GuardOutcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, GuardOutcome::Proceed)
    }
}

pub struct CommandGuard {
    matcher: PermissionMatcher,
    resolver: Box<dyn PrefixResolver>,
    gate: SafetyGate,
}

impl CommandGuard {
    pub fn new(matcher: PermissionMatcher, resolver: Box<dyn PrefixResolver>, gate: SafetyGate) -> Self {
        Self {
            matcher,
            resolver,
            gate,
        }
    }

    pub fn matcher(&self) -> &PermissionMatcher {
        &self.matcher
    }

    /// Resolve prefixes and consult recorded rules. A resolver failure
    /// leaves nothing to match on, so the user is asked.
    pub async fn check_permission(
        &self,
        tool_name: &str,
        command: &str,
        cancel: &CancellationToken,
    ) -> PermissionDecision {
        match self.resolver.resolve(command, cancel).await {
            Ok(prefixes) => self.matcher.has_permission(tool_name, command, &prefixes),
            Err(e) => {
                warn!(error = %e, "prefix resolution failed");
                PermissionDecision::Ask {
                    message: format!(
                        "Could not analyze `{}` for {} ({}); approval is required.",
                        command.trim(),
                        tool_name,
                        e
                    ),
                }
            }
        }
    }

    /// Run the gate for a command about to execute. Only an allow or a gate
    /// that never engaged lets it proceed.
    pub async fn review_execution(
        &self,
        request: &GateRequest,
        cancel: &CancellationToken,
    ) -> GuardOutcome {
        let decision = self.gate.run_gate(request, cancel).await;
        outcome_for(&decision)
    }

    /// Permission check followed by the execution review
    pub async fn evaluate(
        &self,
        tool_name: &str,
        request: &GateRequest,
        cancel: &CancellationToken,
    ) -> GuardOutcome {
        match self.check_permission(tool_name, &request.command, cancel).await {
            PermissionDecision::Deny { message } => GuardOutcome::Rejected { message },
            PermissionDecision::Ask { message } => GuardOutcome::NeedsApproval { message },
            PermissionDecision::Allow => {
                debug!(command = %request.command, "permitted by rules, reviewing execution");
                self.review_execution(request, cancel).await
            }
        }
    }
}

fn outcome_for(decision: &GateDecision) -> GuardOutcome {
    if decision.permits_execution() {
        return GuardOutcome::Proceed;
    }
    let message = decision
        .rejection_message()
        .unwrap_or_else(|| "Blocked by LLM intent gate".to_string());
    GuardOutcome::Rejected { message }
}
