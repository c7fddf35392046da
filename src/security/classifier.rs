use crate::security::finding::Finding;
use crate::security::invocation::shell_scripts;
use crate::security::{git, rm, rules};
use crate::shell::tokenize;
use std::collections::BTreeMap;

/// How deep `sh -c` payloads nested in each other are unpacked
const MAX_SCRIPT_DEPTH: usize = 3;

/// Map a raw command to the risky capabilities it exercises.
///
/// The rule table and both analyzers always run against the trimmed
/// command. Findings are deduplicated by code, keeping the first one
/// produced, and returned sorted by code.
pub fn classify(command: &str) -> Vec<Finding> {
    let command = command.trim();
    if command.is_empty() {
        return Vec::new();
    }

    let produced = rules::match_simple_rules(command)
        .into_iter()
        .chain(analyze_invocations(command, 0));

    let mut by_code: BTreeMap<&'static str, Finding> = BTreeMap::new();
    for finding in produced {
        by_code.entry(finding.code).or_insert(finding);
    }
    by_code.into_values().collect()
}

/// Run the `rm` and `git` analyzers over a command line and over any
/// script it hands to a shell with `-c`
fn analyze_invocations(command: &str, depth: usize) -> Vec<Finding> {
    let tokens = tokenize(command);
    let mut findings = rm::analyze(&tokens);
    findings.extend(git::analyze(&tokens));

    if depth < MAX_SCRIPT_DEPTH {
        for script in shell_scripts(&tokens) {
            findings.extend(analyze_invocations(script, depth + 1));
        }
    }
    findings
}

/// Whether the findings warrant a second opinion from the gate
pub fn should_review(findings: &[Finding]) -> bool {
    findings.iter().any(Finding::is_high)
}
