use crate::security::finding::{Category, Finding, Severity};
use crate::security::invocation::{find_invocations, has_long_flag, short_flags};
use crate::shell::Token;

/// Directories whose removal breaks the machine, after the priority
/// targets `/`, home, `.` and `..`
const SYSTEM_DIRS: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/home", "/lib", "/lib64", "/opt", "/proc", "/root",
    "/sbin", "/sys", "/usr", "/var", "/Applications", "/Library", "/System", "/Users",
    "/private",
];

const HOME_TARGETS: &[&str] = &["~", "$HOME", "${HOME}"];

/// Analyze every `rm` invocation in the command
pub fn analyze(tokens: &[Token]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for invocation in find_invocations(tokens, "rm") {
        let args = &invocation.args;
        let rendered = invocation.render();

        findings.push(
            Finding::new("FS_RM_ANY", Severity::High, Category::FilesystemDelete, "Deletes files")
                .with_evidence(&rendered),
        );

        if is_force_recursive(args) {
            findings.push(
                Finding::new(
                    "FS_RM_FORCE_RECURSIVE",
                    Severity::High,
                    Category::FilesystemDelete,
                    "Deletes recursively without confirmation",
                )
                .with_evidence(&rendered),
            );
        }

        let targets = targets(args);

        if let Some(target) = critical_target(&targets) {
            findings.push(
                Finding::new(
                    "FS_RM_CRITICAL_TARGET",
                    Severity::High,
                    Category::FilesystemDelete,
                    "Deletes a root, home, or system directory",
                )
                .with_evidence(&target),
            );
        }

        if let Some(target) = targets
            .iter()
            .find(|t| t.contains(['*', '?', '{']))
        {
            findings.push(
                Finding::new(
                    "FS_RM_GLOB",
                    Severity::Medium,
                    Category::FilesystemDelete,
                    "Deletes paths chosen by glob or brace expansion",
                )
                .with_evidence(target),
            );
        }
    }

    findings
}

fn is_force_recursive(args: &[&str]) -> bool {
    let flags: Vec<char> = short_flags(args).collect();
    let recursive =
        flags.contains(&'r') || flags.contains(&'R') || has_long_flag(args, "--recursive");
    let force = flags.contains(&'f') || has_long_flag(args, "--force");
    recursive && force
}

/// Operands of the invocation: everything that is not an option, plus
/// everything after `--`
fn targets<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut operands = Vec::new();
    let mut options_done = false;
    for arg in args {
        if !options_done && *arg == "--" {
            options_done = true;
        } else if options_done || !arg.starts_with('-') || *arg == "-" {
            operands.push(*arg);
        }
    }
    operands
}

/// Strip trailing `*` and `/` so `/*`, `~/` and `./` compare as their
/// directory. A bare `/` stays `/`.
fn normalize(target: &str) -> &str {
    let stripped = target.trim_matches(|c| c == '"' || c == '\'');
    let stripped = stripped.trim_end_matches('*');
    let trimmed = stripped.trim_end_matches('/');
    if trimmed.is_empty() && stripped.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Position of a normalized target in the priority order
fn priority(target: &str) -> Option<usize> {
    if target == "/" {
        Some(0)
    } else if HOME_TARGETS.contains(&target) {
        Some(1)
    } else if target == "." {
        Some(2)
    } else if target == ".." {
        Some(3)
    } else if SYSTEM_DIRS.contains(&target) {
        Some(4)
    } else {
        None
    }
}

/// First critical target in priority order, not in argument order
fn critical_target(targets: &[&str]) -> Option<String> {
    targets
        .iter()
        .map(|t| normalize(t))
        .filter_map(|t| priority(t).map(|rank| (rank, t)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, t)| t.to_string())
}
