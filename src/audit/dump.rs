use crate::gate::prompt::format_finding_line;
use crate::llm::ModelTier;
use crate::security::Finding;
use chrono::Utc;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One model attempt as recorded in a dump
#[derive(Debug, Clone)]
pub struct DumpAttempt {
    pub tier: ModelTier,
    pub outcome: Result<String, String>,
}

/// Everything known about a failed gate run
#[derive(Debug, Clone, Copy)]
pub struct FailureReport<'a> {
    pub error_type: &'a str,
    pub error: &'a str,
    pub command: &'a str,
    pub description: Option<&'a str>,
    pub user_prompt: Option<&'a str>,
    pub findings: &'a [Finding],
    pub gate_input: &'a str,
    pub attempts: &'a [DumpAttempt],
}

impl FailureReport<'_> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "timestamp: {}", Utc::now().to_rfc3339());
        let _ = writeln!(out, "error_type: {}", self.error_type);
        let _ = writeln!(out, "error: {}", self.error);

        section(&mut out, "command", self.command);
        section(&mut out, "description", self.description.unwrap_or("(none)"));
        section(&mut out, "user prompt", self.user_prompt.unwrap_or("(none)"));

        let findings = self
            .findings
            .iter()
            .map(format_finding_line)
            .collect::<Vec<_>>()
            .join("\n");
        section(&mut out, "findings", &findings);
        section(&mut out, "gate input", self.gate_input);

        for (index, attempt) in self.attempts.iter().enumerate() {
            let title = format!("attempt {} ({})", index + 1, attempt.tier);
            match &attempt.outcome {
                Ok(raw) => section(&mut out, &title, &format!("output:\n{}", raw)),
                Err(error) => section(&mut out, &title, &format!("error: {}", error)),
            }
        }
        out
    }
}

fn section(out: &mut String, title: &str, body: &str) {
    let _ = write!(out, "\n== {} ==\n{}\n", title, body);
}

/// Writes one plain-text file per gate failure. Nothing reads them back.
pub struct FailureDump {
    dir: PathBuf,
}

impl FailureDump {
    /// Dump into the default cache directory
    pub fn new() -> Self {
        Self {
            dir: Self::default_dir(),
        }
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// `$XDG_CACHE_HOME/bashgate/gate-failures`, else
    /// `~/.cache/bashgate/gate-failures`, else under the temp dir
    pub fn default_dir() -> PathBuf {
        let cache = std::env::var_os("XDG_CACHE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
            .unwrap_or_else(std::env::temp_dir);
        cache.join("bashgate").join("gate-failures")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the report to a fresh file and return its path
    pub fn write(&self, report: &FailureReport<'_>) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(dump_file_name());
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(report.render().as_bytes())?;
        file.flush()?;

        Ok(path)
    }
}

impl Default for FailureDump {
    fn default() -> Self {
        Self::new()
    }
}

/// `{timestamp}-{random id}.txt`
fn dump_file_name() -> String {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}.txt", timestamp, &id[..8])
}
