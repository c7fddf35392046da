use crate::permissions::rule_key::{exact_key, prefix_key, tool_key};
use crate::permissions::rules::{PermissionRules, RuleSet};
use crate::shell::{split_into_subcommands, CommandSubcommandPrefixResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only commands that never need a recorded permission
pub const SAFE_COMMANDS: &[&str] = &[
    "git status",
    "git diff",
    "git log",
    "git branch",
    "pwd",
    "tree",
    "date",
    "which",
];

/// Outcome of a permission lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny { message: String },
    Ask { message: String },
}

impl PermissionDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, PermissionDecision::Allow)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            PermissionDecision::Allow => None,
            PermissionDecision::Deny { message } | PermissionDecision::Ask { message } => {
                Some(message)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleOutcome {
    Deny,
    Ask,
    Allow,
}

/// Decides whether a command may run based on recorded allow/deny/ask rules.
///
/// Precedence is fixed: deny, then ask, then allow. Anything that no rule
/// resolves becomes `Ask`.
#[derive(Debug, Clone)]
pub struct PermissionMatcher {
    rules: PermissionRules,
    cwd: PathBuf,
}

impl PermissionMatcher {
    pub fn new<P: AsRef<Path>>(rules: PermissionRules, cwd: P) -> Self {
        Self {
            rules,
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn rules(&self) -> &PermissionRules {
        &self.rules
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Decide whether `command` may run as `tool_name`
    pub fn has_permission(
        &self,
        tool_name: &str,
        command: &str,
        prefixes: &CommandSubcommandPrefixResult,
    ) -> PermissionDecision {
        let command = command.trim();

        if is_safe_command(command) {
            return PermissionDecision::Allow;
        }

        // A bare tool allow is broad; narrower prefix deny/ask rules still get a say
        if let Some(outcome) = self.lookup(tool_name, command, None)
            && (outcome != RuleOutcome::Allow
                || self.rules.allowed.contains(&exact_key(tool_name, command)))
        {
            debug!(command, ?outcome, "exact permission rule matched");
            return self.decision(outcome, tool_name, command);
        }

        if prefixes.command_injection_detected {
            debug!(command, "injection detected, prefix rules skipped");
            return self.injection_fallback(tool_name, command);
        }

        let subcommands = split_into_subcommands(command);
        let leading_cd = subcommands
            .first()
            .is_some_and(|first| self.is_cd_to_cwd(first));
        let meaningful = if leading_cd {
            &subcommands[1..]
        } else {
            &subcommands[..]
        };

        if meaningful.len() <= 1 {
            return self.single_command(tool_name, command, meaningful.first(), prefixes);
        }

        self.compound_command(tool_name, command, &subcommands, prefixes)
    }

    fn single_command(
        &self,
        tool_name: &str,
        command: &str,
        subcommand: Option<&String>,
        prefixes: &CommandSubcommandPrefixResult,
    ) -> PermissionDecision {
        let nested = subcommand.and_then(|sub| prefixes.subcommand_prefixes.get(sub));
        if nested.is_some_and(|n| n.command_injection_detected) {
            return self.injection_fallback(tool_name, command);
        }

        let prefix = prefixes
            .command_prefix
            .as_deref()
            .or_else(|| nested.and_then(|n| n.command_prefix.as_deref()));

        match self.lookup(tool_name, command, prefix) {
            Some(outcome) => self.decision(outcome, tool_name, command),
            None => Self::unresolved_ask(tool_name, command),
        }
    }

    fn compound_command(
        &self,
        tool_name: &str,
        command: &str,
        subcommands: &[String],
        prefixes: &CommandSubcommandPrefixResult,
    ) -> PermissionDecision {
        let injected = subcommands.iter().any(|sub| {
            prefixes
                .subcommand_prefixes
                .get(sub)
                .is_some_and(|nested| nested.command_injection_detected)
        });

        if injected {
            return self.injection_fallback(tool_name, command);
        }

        let mut first_asked: Option<&str> = None;
        let mut all_allowed = true;

        for sub in subcommands {
            let prefix = prefixes
                .subcommand_prefixes
                .get(sub)
                .and_then(|nested| nested.command_prefix.as_deref());

            match self.lookup(tool_name, sub, prefix) {
                Some(RuleOutcome::Deny) => {
                    debug!(command, subcommand = %sub, "subcommand denied");
                    return self.decision(RuleOutcome::Deny, tool_name, sub);
                }
                Some(RuleOutcome::Ask) => {
                    if first_asked.is_none() {
                        first_asked = Some(sub);
                    }
                }
                Some(RuleOutcome::Allow) => {}
                None if is_safe_command(sub) => {}
                None => all_allowed = false,
            }
        }

        if let Some(sub) = first_asked {
            return self.decision(RuleOutcome::Ask, tool_name, sub);
        }

        if all_allowed {
            PermissionDecision::Allow
        } else {
            Self::unresolved_ask(tool_name, command)
        }
    }

    /// Check the three rule sets in precedence order. A resolved prefix
    /// `cat secrets` is matched by prefix rules for `cat` and `cat secrets`.
    fn lookup(&self, tool_name: &str, text: &str, prefix: Option<&str>) -> Option<RuleOutcome> {
        let mut candidates = vec![tool_key(tool_name), exact_key(tool_name, text)];
        if let Some(prefix) = prefix {
            candidates.extend(
                leading_prefixes(prefix).map(|leading| prefix_key(tool_name, &leading)),
            );
        }

        let ordered: [(&RuleSet, RuleOutcome); 3] = [
            (&self.rules.denied, RuleOutcome::Deny),
            (&self.rules.asked, RuleOutcome::Ask),
            (&self.rules.allowed, RuleOutcome::Allow),
        ];

        ordered
            .into_iter()
            .find(|(set, _)| candidates.iter().any(|key| set.contains(key)))
            .map(|(_, outcome)| outcome)
    }

    fn decision(&self, outcome: RuleOutcome, tool_name: &str, cited: &str) -> PermissionDecision {
        match outcome {
            RuleOutcome::Allow => PermissionDecision::Allow,
            RuleOutcome::Deny => PermissionDecision::Deny {
                message: format!(
                    "Permission to use {} with command `{}` has been denied.",
                    tool_name, cited
                ),
            },
            RuleOutcome::Ask => PermissionDecision::Ask {
                message: format!(
                    "Running `{}` with {} requires your approval.",
                    cited, tool_name
                ),
            },
        }
    }

    fn unresolved_ask(tool_name: &str, command: &str) -> PermissionDecision {
        PermissionDecision::Ask {
            message: format!(
                "No saved permission covers `{}` for {}; approval is required.",
                command, tool_name
            ),
        }
    }

    /// Only exact rules survive an injection; the bare tool key is one of them.
    /// An exactly denied piece still denies the whole.
    fn injection_fallback(&self, tool_name: &str, command: &str) -> PermissionDecision {
        for sub in split_into_subcommands(command) {
            if self.lookup(tool_name, &sub, None) == Some(RuleOutcome::Deny) {
                return self.decision(RuleOutcome::Deny, tool_name, &sub);
            }
        }
        if self.rules.allowed.contains(&tool_key(tool_name)) {
            return PermissionDecision::Allow;
        }
        PermissionDecision::Ask {
            message: format!(
                "`{}` uses command substitution or expansion, so saved {} prefix rules do not apply; approval is required.",
                command, tool_name
            ),
        }
    }

    fn is_cd_to_cwd(&self, subcommand: &str) -> bool {
        let mut words = subcommand.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("cd"), Some(target), None) => {
                let target = target.trim_matches(|c| c == '"' || c == '\'');
                Path::new(target) == self.cwd
            }
            _ => false,
        }
    }
}

/// Every word-boundary prefix of `prefix`, shortest first
fn leading_prefixes(prefix: &str) -> impl Iterator<Item = String> + '_ {
    let words: Vec<&str> = prefix.split_whitespace().collect();
    (1..=words.len()).map(move |n| words[..n].join(" "))
}

/// Whether `command` is one of the built-in read-only commands
pub fn is_safe_command(command: &str) -> bool {
    SAFE_COMMANDS.contains(&command.trim())
}
