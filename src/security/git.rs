use crate::security::finding::{Category, Finding, Severity};
use crate::security::invocation::{Invocation, find_invocations, has_long_flag, short_flags};
use crate::shell::Token;

/// Global options that consume the following word
const GLOBAL_OPTIONS_WITH_VALUE: &[&str] = &["-C", "-c", "--git-dir", "--work-tree", "--namespace"];

/// A `git` run with global options removed
struct GitCommand<'a> {
    subcommand: &'a str,
    args: Vec<&'a str>,
}

impl<'a> GitCommand<'a> {
    fn parse(invocation: &Invocation<'a>) -> Option<Self> {
        let mut words = invocation.args.iter().copied();
        while let Some(word) = words.next() {
            if GLOBAL_OPTIONS_WITH_VALUE.contains(&word) {
                words.next();
            } else if !word.starts_with('-') {
                return Some(Self {
                    subcommand: word,
                    args: words.collect(),
                });
            }
        }
        None
    }

    fn has_flag(&self, short: char, long: &str) -> bool {
        short_flags(&self.args).any(|c| c == short) || has_long_flag(&self.args, long)
    }

    fn has_arg(&self, arg: &str) -> bool {
        self.args.contains(&arg)
    }

    fn first_arg_is(&self, word: &str) -> bool {
        self.args
            .iter()
            .find(|a| !a.starts_with('-'))
            .is_some_and(|a| *a == word)
    }

    /// Positional arguments, which for `push` are remote and refspecs
    fn positionals(&self) -> impl Iterator<Item = &&'a str> {
        self.args.iter().filter(|a| !a.starts_with('-'))
    }
}

type Check = fn(&GitCommand<'_>) -> Option<Finding>;

/// Ordered data-loss checks; several may fire for one invocation
const CHECKS: &[Check] = &[
    checkout,
    restore,
    reset,
    reset_hard,
    clean,
    clean_force_ignored,
    push_force,
    push_delete,
    history_rewrite,
    reflog_prune,
    stash_drop,
    branch_force_delete,
];

/// Analyze every `git` invocation in the command
pub fn analyze(tokens: &[Token]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for invocation in find_invocations(tokens, "git") {
        let Some(git) = GitCommand::parse(&invocation) else {
            continue;
        };
        let rendered = invocation.render();
        findings.extend(
            CHECKS
                .iter()
                .filter_map(|check| check(&git))
                .map(|finding| finding.with_evidence(&rendered)),
        );
    }

    findings
}

fn finding(code: &'static str, severity: Severity, title: &'static str) -> Option<Finding> {
    Some(Finding::new(code, severity, Category::GitDataLoss, title))
}

fn checkout(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "checkout" {
        return None;
    }
    if git.has_arg("--") || git.has_arg(".") || git.has_flag('f', "--force") {
        return finding(
            "GIT_CHECKOUT_DISCARD",
            Severity::Medium,
            "Discards uncommitted changes in the working tree",
        );
    }
    None
}

fn restore(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "restore" {
        return None;
    }
    let staged_only = git.has_flag('S', "--staged") && !git.has_flag('W', "--worktree");
    if staged_only {
        return None;
    }
    finding(
        "GIT_RESTORE",
        Severity::Medium,
        "Restores files over uncommitted changes",
    )
}

fn reset(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "reset" {
        return None;
    }
    finding("GIT_RESET", Severity::Medium, "Moves HEAD or unstages changes")
}

fn reset_hard(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand == "reset" && has_long_flag(&git.args, "--hard") {
        return finding(
            "GIT_RESET_HARD",
            Severity::High,
            "Discards all uncommitted changes",
        );
    }
    None
}

fn clean(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "clean" || git.has_flag('n', "--dry-run") {
        return None;
    }
    finding("GIT_CLEAN", Severity::Medium, "Deletes untracked files")
}

fn clean_force_ignored(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "clean" || git.has_flag('n', "--dry-run") {
        return None;
    }
    let flags: Vec<char> = short_flags(&git.args).collect();
    let force = flags.contains(&'f') || has_long_flag(&git.args, "--force");
    let ignored = flags.contains(&'x') || flags.contains(&'X');
    let dirs = flags.contains(&'d');
    if force && ignored && dirs {
        return finding(
            "GIT_CLEAN_FDX",
            Severity::High,
            "Deletes untracked and ignored files and directories",
        );
    }
    None
}

fn push_force(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "push" {
        return None;
    }
    let forced = git.has_flag('f', "--force")
        || has_long_flag(&git.args, "--force-with-lease")
        || has_long_flag(&git.args, "--force-if-includes")
        || has_long_flag(&git.args, "--mirror")
        || git.positionals().any(|refspec| refspec.starts_with('+'));
    if forced {
        return finding(
            "GIT_PUSH_FORCE",
            Severity::High,
            "Force-pushes and can overwrite remote history",
        );
    }
    None
}

fn push_delete(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "push" {
        return None;
    }
    let deleting = git.has_flag('d', "--delete")
        || has_long_flag(&git.args, "--prune")
        || git
            .positionals()
            .any(|refspec| refspec.len() > 1 && refspec.starts_with(':'));
    if deleting {
        return finding(
            "GIT_PUSH_DELETE",
            Severity::High,
            "Deletes remote branches or tags",
        );
    }
    None
}

fn history_rewrite(git: &GitCommand<'_>) -> Option<Finding> {
    if matches!(git.subcommand, "filter-branch" | "filter-repo") {
        return finding(
            "GIT_HISTORY_REWRITE",
            Severity::High,
            "Rewrites repository history",
        );
    }
    None
}

fn reflog_prune(git: &GitCommand<'_>) -> Option<Finding> {
    let immediate = |arg: &&str| arg.ends_with("=now") || arg.ends_with("=all");
    let pruning = match git.subcommand {
        "reflog" => {
            git.first_arg_is("delete")
                || (git.first_arg_is("expire") && git.args.iter().any(immediate))
        }
        "gc" => git
            .args
            .iter()
            .any(|arg| arg.starts_with("--prune=") && immediate(arg)),
        _ => false,
    };
    if pruning {
        return finding(
            "GIT_REFLOG_PRUNE",
            Severity::High,
            "Drops reflog entries or unreachable objects immediately",
        );
    }
    None
}

fn stash_drop(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand == "stash" && (git.first_arg_is("drop") || git.first_arg_is("clear")) {
        return finding("GIT_STASH_DROP", Severity::High, "Deletes stashed changes");
    }
    None
}

fn branch_force_delete(git: &GitCommand<'_>) -> Option<Finding> {
    if git.subcommand != "branch" {
        return None;
    }
    let flags: Vec<char> = short_flags(&git.args).collect();
    let forced = flags.contains(&'D')
        || ((flags.contains(&'d') || has_long_flag(&git.args, "--delete"))
            && (flags.contains(&'f') || has_long_flag(&git.args, "--force")));
    if forced {
        return finding(
            "GIT_BRANCH_FORCE_DELETE",
            Severity::Medium,
            "Deletes a branch even if it is not merged",
        );
    }
    None
}
