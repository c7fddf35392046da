use serde::Serialize;
use std::fmt;

/// Longest evidence excerpt kept on a finding, in characters
pub const MAX_EVIDENCE_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability a finding is evidence of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    FilesystemDelete,
    FilesystemWrite,
    PrivilegeEscalation,
    RemoteExecution,
    Persistence,
    CredentialAccess,
    GitDataLoss,
    InfrastructureDestruction,
    Container,
    SystemControl,
    PackageManagement,
    Obfuscation,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::FilesystemDelete => "filesystem-delete",
            Category::FilesystemWrite => "filesystem-write",
            Category::PrivilegeEscalation => "privilege-escalation",
            Category::RemoteExecution => "remote-execution",
            Category::Persistence => "persistence",
            Category::CredentialAccess => "credential-access",
            Category::GitDataLoss => "git-data-loss",
            Category::InfrastructureDestruction => "infrastructure-destruction",
            Category::Container => "container",
            Category::SystemControl => "system-control",
            Category::PackageManagement => "package-management",
            Category::Obfuscation => "obfuscation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of heuristic evidence that a command does something risky
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub code: &'static str,
    pub severity: Severity,
    pub category: Category,
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Finding {
    pub fn new(
        code: &'static str,
        severity: Severity,
        category: Category,
        title: &'static str,
    ) -> Self {
        Self {
            code,
            severity,
            category,
            title,
            evidence: None,
        }
    }

    /// Attach an excerpt, truncated to [`MAX_EVIDENCE_CHARS`]
    pub fn with_evidence(mut self, evidence: &str) -> Self {
        let evidence = evidence.trim();
        if !evidence.is_empty() {
            self.evidence = Some(truncate_chars(evidence, MAX_EVIDENCE_CHARS));
        }
        self
    }

    pub fn is_high(&self) -> bool {
        self.severity == Severity::High
    }
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_is_bounded() {
        let long = "x".repeat(500);
        let finding = Finding::new("T", Severity::High, Category::Obfuscation, "t").with_evidence(&long);
        assert_eq!(finding.evidence.unwrap().chars().count(), MAX_EVIDENCE_CHARS);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(300);
        let truncated = truncate_chars(&text, 200);
        assert_eq!(truncated.chars().count(), 200);
    }

    #[test]
    fn test_empty_evidence_is_dropped() {
        let finding = Finding::new("T", Severity::Medium, Category::Container, "t").with_evidence("  ");
        assert!(finding.evidence.is_none());
    }

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&Category::InfrastructureDestruction).unwrap();
        assert_eq!(json, "\"infrastructure-destruction\"");
        assert_eq!(Category::GitDataLoss.to_string(), "git-data-loss");
    }
}
