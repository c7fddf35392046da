pub mod classifier;
pub mod finding;
pub mod git;
mod invocation;
pub mod rm;
pub mod rules;

pub use classifier::{classify, should_review};
pub use finding::{Category, Finding, MAX_EVIDENCE_CHARS, Severity};
pub use rules::{SIMPLE_RULES, SimpleRule, simple_rule_codes};

/// Codes the `rm` and `git` analyzers can emit, for auditing alongside the
/// rule table
pub const ANALYZER_CODES: &[&str] = &[
    // rm
    "FS_RM_ANY",
    "FS_RM_CRITICAL_TARGET",
    "FS_RM_FORCE_RECURSIVE",
    "FS_RM_GLOB",
    // git
    "GIT_BRANCH_FORCE_DELETE",
    "GIT_CHECKOUT_DISCARD",
    "GIT_CLEAN",
    "GIT_CLEAN_FDX",
    "GIT_HISTORY_REWRITE",
    "GIT_PUSH_DELETE",
    "GIT_PUSH_FORCE",
    "GIT_REFLOG_PRUNE",
    "GIT_RESET",
    "GIT_RESET_HARD",
    "GIT_RESTORE",
    "GIT_STASH_DROP",
];
