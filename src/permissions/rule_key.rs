use std::fmt;

const PREFIX_WILDCARD: &str = ":*";

/// What part of a tool invocation a rule key covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleQualifier {
    /// `Bash` - every invocation of the tool
    Any,
    /// `Bash(npm test)` - exactly this trimmed command
    Exact(String),
    /// `Bash(npm run:*)` - any command with this literal prefix
    Prefix(String),
}

/// Structured view of a permission rule key string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRuleKey {
    pub tool_name: String,
    pub qualifier: RuleQualifier,
}

impl PermissionRuleKey {
    pub fn any(tool_name: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            qualifier: RuleQualifier::Any,
        }
    }

    pub fn exact(tool_name: &str, command: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            qualifier: RuleQualifier::Exact(command.trim().to_string()),
        }
    }

    pub fn prefix(tool_name: &str, prefix: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            qualifier: RuleQualifier::Prefix(prefix.to_string()),
        }
    }
}

impl fmt::Display for PermissionRuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            RuleQualifier::Any => write!(f, "{}", self.tool_name),
            RuleQualifier::Exact(command) => write!(f, "{}({})", self.tool_name, command),
            RuleQualifier::Prefix(prefix) => {
                write!(f, "{}({}{})", self.tool_name, prefix, PREFIX_WILDCARD)
            }
        }
    }
}

/// Key matching every invocation of a tool
pub fn tool_key(tool_name: &str) -> String {
    PermissionRuleKey::any(tool_name).to_string()
}

/// Key matching one exact command
pub fn exact_key(tool_name: &str, command: &str) -> String {
    PermissionRuleKey::exact(tool_name, command).to_string()
}

/// Key matching every command that starts with `prefix`
pub fn prefix_key(tool_name: &str, prefix: &str) -> String {
    PermissionRuleKey::prefix(tool_name, prefix).to_string()
}

/// Parse a stored rule key. Returns `None` for malformed keys.
pub fn parse_rule_key(key: &str) -> Option<PermissionRuleKey> {
    let Some(open) = key.find('(') else {
        return is_tool_name(key).then(|| PermissionRuleKey::any(key));
    };

    let tool_name = &key[..open];
    let inner = key[open + 1..].strip_suffix(')')?;
    if !is_tool_name(tool_name) || inner.trim().is_empty() {
        return None;
    }

    let qualifier = match inner.strip_suffix(PREFIX_WILDCARD) {
        Some(prefix) if !prefix.is_empty() => RuleQualifier::Prefix(prefix.to_string()),
        Some(_) => return None,
        None => RuleQualifier::Exact(inner.to_string()),
    };

    Some(PermissionRuleKey {
        tool_name: tool_name.to_string(),
        qualifier,
    })
}

fn is_tool_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(tool_key("Bash"), "Bash");
        assert_eq!(exact_key("Bash", "  npm test  "), "Bash(npm test)");
        assert_eq!(prefix_key("Bash", "git push"), "Bash(git push:*)");
    }

    #[test]
    fn test_parse_bare_tool() {
        assert_eq!(parse_rule_key("Bash"), Some(PermissionRuleKey::any("Bash")));
    }

    #[test]
    fn test_parse_exact() {
        let key = parse_rule_key("Bash(cargo test --all)").unwrap();
        assert_eq!(key.tool_name, "Bash");
        assert_eq!(key.qualifier, RuleQualifier::Exact("cargo test --all".to_string()));
    }

    #[test]
    fn test_parse_prefix() {
        let key = parse_rule_key("Bash(npm run:*)").unwrap();
        assert_eq!(key.qualifier, RuleQualifier::Prefix("npm run".to_string()));
    }

    #[test]
    fn test_parse_command_with_parentheses() {
        let key = parse_rule_key("Bash(echo (a))").unwrap();
        assert_eq!(key.qualifier, RuleQualifier::Exact("echo (a)".to_string()));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_rule_key(""), None);
        assert_eq!(parse_rule_key("Bash("), None);
        assert_eq!(parse_rule_key("Bash()"), None);
        assert_eq!(parse_rule_key("Bash(:*)"), None);
        assert_eq!(parse_rule_key("Ba sh(ls)"), None);
    }

    #[test]
    fn test_display_roundtrips_parse() {
        for key in ["Bash", "Bash(ls -la)", "Bash(git log:*)"] {
            assert_eq!(parse_rule_key(key).unwrap().to_string(), key);
        }
    }
}
