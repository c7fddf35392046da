use crate::shell::split::split_into_subcommands;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors produced while resolving command prefixes
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Prefix resolution was cancelled")]
    Cancelled,

    #[error("Prefix resolution failed: {0}")]
    Failed(String),
}

/// Literal matchable prefixes for a command and each of its subcommands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSubcommandPrefixResult {
    pub command_prefix: Option<String>,
    pub command_injection_detected: bool,
    pub subcommand_prefixes: HashMap<String, CommandSubcommandPrefixResult>,
}

impl CommandSubcommandPrefixResult {
    /// A result for a command whose shape makes prefix reasoning unsafe
    pub fn injection() -> Self {
        Self {
            command_injection_detected: true,
            ..Self::default()
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn with_subcommand(
        mut self,
        subcommand: impl Into<String>,
        result: CommandSubcommandPrefixResult,
    ) -> Self {
        self.subcommand_prefixes.insert(subcommand.into(), result);
        self
    }
}

/// Source of [`CommandSubcommandPrefixResult`] values
#[async_trait]
pub trait PrefixResolver: Send + Sync {
    async fn resolve(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<CommandSubcommandPrefixResult, ResolveError>;
}

/// Markers that hide what will actually run behind expansion
const INJECTION_MARKERS: &[&str] = &["$(", "`", "<(", ">(", "${"];

/// Deterministic resolver based on the first words of each subcommand.
///
/// `git push origin main` resolves to `git push`, `ls -la` to `ls`.
/// Anything containing command or process substitution is reported as an
/// injection so only exact-match rules can apply to it.
#[derive(Debug, Default, Clone)]
pub struct HeuristicPrefixResolver;

impl HeuristicPrefixResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve_now(&self, command: &str) -> CommandSubcommandPrefixResult {
        let command = command.trim();
        let subcommands = split_into_subcommands(command);

        if subcommands.len() <= 1 {
            return Self::resolve_simple(command);
        }

        let mut result = CommandSubcommandPrefixResult {
            command_injection_detected: Self::has_injection(command),
            ..CommandSubcommandPrefixResult::default()
        };
        for subcommand in subcommands {
            let nested = Self::resolve_simple(&subcommand);
            result.subcommand_prefixes.insert(subcommand, nested);
        }
        result
    }

    fn resolve_simple(command: &str) -> CommandSubcommandPrefixResult {
        if Self::has_injection(command) {
            return CommandSubcommandPrefixResult::injection();
        }

        CommandSubcommandPrefixResult {
            command_prefix: Self::literal_prefix(command),
            ..CommandSubcommandPrefixResult::default()
        }
    }

    fn has_injection(command: &str) -> bool {
        INJECTION_MARKERS.iter().any(|marker| command.contains(marker))
    }

    fn literal_prefix(command: &str) -> Option<String> {
        let mut words = command.split_whitespace();
        let program = words.next()?;

        // `FOO=bar cmd` changes how cmd behaves; no safe literal prefix
        if program.contains('=') || Self::is_quoted(program) {
            return None;
        }

        match words.next() {
            Some(second) if Self::looks_like_subcommand(second) => {
                Some(format!("{} {}", program, second))
            }
            _ => Some(program.to_string()),
        }
    }

    fn looks_like_subcommand(word: &str) -> bool {
        !word.is_empty()
            && !word.starts_with('-')
            && word
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
    }

    fn is_quoted(word: &str) -> bool {
        word.starts_with('\'') || word.starts_with('"')
    }
}

#[async_trait]
impl PrefixResolver for HeuristicPrefixResolver {
    async fn resolve(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<CommandSubcommandPrefixResult, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        Ok(self.resolve_now(command))
    }
}
