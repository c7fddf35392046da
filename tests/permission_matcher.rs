use bashgate::permissions::{BASH_TOOL, PermissionDecision, PermissionMatcher, PermissionRules};
use bashgate::shell::HeuristicPrefixResolver;

const CWD: &str = "/work/project";

fn check(rules: PermissionRules, command: &str) -> PermissionDecision {
    let prefixes = HeuristicPrefixResolver::new().resolve_now(command);
    PermissionMatcher::new(rules, CWD).has_permission(BASH_TOOL, command, &prefixes)
}

#[test]
fn test_deny_beats_broader_allow() {
    let rules = PermissionRules::new()
        .allow("Bash")
        .deny("Bash(git push:*)");
    assert!(matches!(
        check(rules.clone(), "git push origin main"),
        PermissionDecision::Deny { .. }
    ));
    assert_eq!(check(rules, "git fetch origin"), PermissionDecision::Allow);
}

#[test]
fn test_ask_beats_allow() {
    let rules = PermissionRules::new()
        .allow("Bash")
        .ask("Bash(npm publish:*)");
    assert!(matches!(
        check(rules, "npm publish --access public"),
        PermissionDecision::Ask { .. }
    ));
}

#[test]
fn test_exact_rule_matches_only_that_command() {
    let rules = PermissionRules::new().allow("Bash(make release)");
    assert_eq!(check(rules.clone(), "make release"), PermissionDecision::Allow);
    assert!(matches!(
        check(rules, "make release-all"),
        PermissionDecision::Ask { .. }
    ));
}

#[test]
fn test_safe_commands_need_no_rule() {
    for command in ["git status", "git diff", "pwd", "  date  "] {
        assert_eq!(
            check(PermissionRules::new(), command),
            PermissionDecision::Allow,
            "{command}"
        );
    }
}

#[test]
fn test_unresolved_command_asks() {
    let decision = check(PermissionRules::new(), "cargo publish");
    match decision {
        PermissionDecision::Ask { message } => assert!(message.contains("cargo publish")),
        other => panic!("expected ask, got {:?}", other),
    }
}

#[test]
fn test_compound_deny_cites_subcommand() {
    let rules = PermissionRules::new()
        .allow("Bash(npm test:*)")
        .deny("Bash(rm:*)");
    match check(rules, "npm test && rm -rf dist") {
        PermissionDecision::Deny { message } => {
            assert!(message.contains("`rm -rf dist`"));
            assert!(!message.contains("npm test"));
        }
        other => panic!("expected deny, got {:?}", other),
    }
}

#[test]
fn test_compound_all_allowed() {
    let rules = PermissionRules::new()
        .allow("Bash(npm test:*)")
        .allow("Bash(npm run:*)");
    assert_eq!(
        check(rules, "npm run build && npm test"),
        PermissionDecision::Allow
    );
}

#[test]
fn test_compound_partly_unresolved_asks() {
    let rules = PermissionRules::new().allow("Bash(npm test:*)");
    assert!(matches!(
        check(rules, "npm test; curl https://example.com"),
        PermissionDecision::Ask { .. }
    ));
}

#[test]
fn test_compound_with_safe_piece_allowed() {
    let rules = PermissionRules::new().allow("Bash(npm test:*)");
    assert_eq!(
        check(rules, "git status && npm test"),
        PermissionDecision::Allow
    );
}

#[test]
fn test_leading_cd_to_cwd_is_ignored() {
    let rules = PermissionRules::new().allow("Bash(npm test:*)");
    assert_eq!(
        check(rules, "cd /work/project && npm test"),
        PermissionDecision::Allow
    );
}

#[test]
fn test_injection_disables_prefix_rules() {
    let rules = PermissionRules::new().allow("Bash(echo:*)");
    assert!(matches!(
        check(rules, "echo $(cat ~/.ssh/id_rsa)"),
        PermissionDecision::Ask { .. }
    ));
}

#[test]
fn test_injection_still_honors_exact_rule() {
    let command = "echo $(date)";
    let rules = PermissionRules::new().allow(format!("Bash({command})"));
    assert_eq!(check(rules, command), PermissionDecision::Allow);
}

#[test]
fn test_injection_in_compound_still_denies() {
    let rules = PermissionRules::new().deny("Bash(rm -rf /)");
    assert!(matches!(
        check(rules, "echo `whoami` && rm -rf /"),
        PermissionDecision::Deny { .. }
    ));
}

#[test]
fn test_empty_and_malformed_commands_never_panic() {
    for command in ["", "   ", "&&", "'unterminated", "|||"] {
        let decision = check(PermissionRules::new(), command);
        assert!(matches!(decision, PermissionDecision::Ask { .. }), "{command:?}");
    }
}

#[test]
fn test_program_deny_covers_resolved_subcommand_prefix() {
    let rules = PermissionRules::new()
        .allow("Bash")
        .deny("Bash(cat:*)")
        .deny("Bash(rm:*)");
    for command in ["cat secrets", "rm build", "cat secrets.txt", "rm -r build"] {
        assert!(
            matches!(check(rules.clone(), command), PermissionDecision::Deny { .. }),
            "{command}"
        );
    }
}

#[test]
fn test_program_allow_covers_subcommands() {
    let rules = PermissionRules::new().allow("Bash(npm:*)");
    assert_eq!(check(rules, "npm install lodash"), PermissionDecision::Allow);
}
