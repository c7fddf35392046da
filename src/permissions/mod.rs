pub mod matcher;
pub mod rule_key;
pub mod rules;

pub use matcher::{is_safe_command, PermissionDecision, PermissionMatcher, SAFE_COMMANDS};
pub use rule_key::{exact_key, parse_rule_key, prefix_key, tool_key, PermissionRuleKey, RuleQualifier};
pub use rules::{PermissionRules, RuleSet};

/// Tool name under which shell commands are recorded
pub const BASH_TOOL: &str = "Bash";
