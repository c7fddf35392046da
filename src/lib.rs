pub mod audit;
pub mod config;
pub mod error;
pub mod gate;
pub mod guard;
pub mod llm;
pub mod permissions;
pub mod security;
pub mod shell;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use gate::{ExecutionContext, GateDecision, GateRequest, SafetyGate};
pub use guard::{CommandGuard, GuardOutcome};
pub use permissions::{PermissionDecision, PermissionMatcher, PermissionRules};
pub use security::{Finding, classify, should_review};
