use crate::audit::{DumpAttempt, FailureDump, FailureReport};
use crate::config::GateConfig;
use crate::gate::decision::{GateDecision, GateErrorType};
use crate::gate::prompt::{GateRequest, build_gate_input, system_prompt};
use crate::gate::verdict::{GateAction, parse_verdict};
use crate::llm::{LLMClient, LLMError, ModelQuery, ModelTier};
use crate::security::{Finding, classify, should_review};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Wall-clock budget for one gate run, across all attempts
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Cheap model first, then two tries on the main model
pub const ATTEMPT_TIERS: [ModelTier; 3] = [ModelTier::Quick, ModelTier::Main, ModelTier::Main];

/// Generation stops after the verdict block closes
pub const GATE_STOP_SEQUENCE: &str = "</final>";

#[derive(Debug, Clone)]
pub struct GateSettings {
    pub timeout: Duration,
    /// Where failure dumps go; the default cache directory when unset
    pub dump_dir: Option<PathBuf>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_GATE_TIMEOUT,
            dump_dir: None,
        }
    }
}

impl GateSettings {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            dump_dir: config.dump_dir.clone(),
        }
    }
}

/// How an attempt failed
enum AttemptFailure {
    Api(String),
    InvalidOutput(String),
    Unknown(String),
}

/// LLM second opinion for commands the classifier flags as high risk
pub struct SafetyGate {
    client: Box<dyn LLMClient>,
    settings: GateSettings,
    dump: FailureDump,
}

impl SafetyGate {
    pub fn new(client: Box<dyn LLMClient>, settings: GateSettings) -> Self {
        let dump = match &settings.dump_dir {
            Some(dir) => FailureDump::with_dir(dir),
            None => FailureDump::new(),
        };
        Self {
            client,
            settings,
            dump,
        }
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Review a command with the configured client
    pub async fn run_gate(&self, request: &GateRequest, cancel: &CancellationToken) -> GateDecision {
        self.run_gate_with(self.client.as_ref(), request, cancel).await
    }

    /// Review a command with an explicit client in place of the configured one
    pub async fn run_gate_with(
        &self,
        client: &dyn LLMClient,
        request: &GateRequest,
        cancel: &CancellationToken,
    ) -> GateDecision {
        let findings = classify(&request.command);
        if !should_review(&findings) {
            debug!(findings = findings.len(), "no high-severity findings, gate not engaged");
            return GateDecision::Disabled;
        }

        let codes: Vec<&str> = findings.iter().map(|f| f.code).collect();
        info!(?codes, "engaging safety gate");

        let started = Instant::now();
        let deadline = started + self.settings.timeout;
        let shared = cancel.child_token();

        let system = system_prompt();
        let input = build_gate_input(request, &findings);

        let mut attempts: Vec<DumpAttempt> = Vec::new();
        let mut last_failure: Option<AttemptFailure> = None;

        for (index, tier) in ATTEMPT_TIERS.into_iter().enumerate() {
            if shared.is_cancelled() {
                break;
            }
            debug!(attempt = index + 1, %tier, "gate attempt");

            let query = ModelQuery {
                system_prompt: &system,
                user_input: &input,
                tier,
                stop_sequences: &[GATE_STOP_SEQUENCE],
            };
            let result = tokio::select! {
                biased;
                _ = shared.cancelled() => Err(LLMError::Cancelled),
                _ = sleep_until(deadline) => {
                    shared.cancel();
                    Err(LLMError::Cancelled)
                }
                result = client.query(query, &shared) => result,
            };

            match result {
                Ok(raw) => match parse_verdict(&raw) {
                    Ok(verdict) => {
                        info!(
                            action = %verdict.action,
                            attempt = index + 1,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "safety gate decided"
                        );
                        return match verdict.action {
                            GateAction::Allow => GateDecision::allow(verdict),
                            GateAction::Block => GateDecision::block(verdict),
                        };
                    }
                    Err(e) => {
                        warn!(attempt = index + 1, %tier, error = %e, "unparseable gate output");
                        last_failure = Some(AttemptFailure::InvalidOutput(e.to_string()));
                        attempts.push(DumpAttempt {
                            tier,
                            outcome: Ok(raw),
                        });
                    }
                },
                Err(LLMError::Cancelled) if shared.is_cancelled() => {
                    attempts.push(DumpAttempt {
                        tier,
                        outcome: Err(LLMError::Cancelled.to_string()),
                    });
                    break;
                }
                Err(LLMError::Cancelled) => {
                    warn!(attempt = index + 1, %tier, "model query cancelled itself");
                    last_failure = Some(AttemptFailure::Unknown(LLMError::Cancelled.to_string()));
                    attempts.push(DumpAttempt {
                        tier,
                        outcome: Err(LLMError::Cancelled.to_string()),
                    });
                }
                Err(e) => {
                    warn!(attempt = index + 1, %tier, error = %e, "gate attempt failed");
                    last_failure = Some(AttemptFailure::Api(e.to_string()));
                    attempts.push(DumpAttempt {
                        tier,
                        outcome: Err(e.to_string()),
                    });
                }
            }
        }

        let (error_type, raw_error) = if shared.is_cancelled() {
            let reason = if cancel.is_cancelled() {
                "safety review cancelled".to_string()
            } else {
                format!(
                    "safety review timed out after {}s",
                    self.settings.timeout.as_secs_f64()
                )
            };
            (GateErrorType::Timeout, reason)
        } else {
            match last_failure {
                Some(AttemptFailure::Api(e)) => (GateErrorType::Api, e),
                Some(AttemptFailure::InvalidOutput(e)) => (GateErrorType::InvalidOutput, e),
                Some(AttemptFailure::Unknown(e)) => (GateErrorType::Unknown, e),
                None => (GateErrorType::Unknown, "no gate attempt ran".to_string()),
            }
        };

        warn!(%error_type, error = %raw_error, "safety gate failed, blocking command");
        self.write_dump(request, &findings, &input, &attempts, error_type, &raw_error);

        GateDecision::error(error_type, raw_error)
    }

    fn write_dump(
        &self,
        request: &GateRequest,
        findings: &[Finding],
        input: &str,
        attempts: &[DumpAttempt],
        error_type: GateErrorType,
        raw_error: &str,
    ) {
        let report = FailureReport {
            error_type: error_type.as_str(),
            error: raw_error,
            command: &request.command,
            description: request.description.as_deref(),
            user_prompt: request.user_prompt.as_deref(),
            findings,
            gate_input: input,
            attempts,
        };
        match self.dump.write(&report) {
            Ok(path) => info!(path = %path.display(), "wrote gate failure dump"),
            Err(e) => warn!(dir = %self.dump.dir().display(), error = %e, "failed to write gate failure dump"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::prompt::ExecutionContext;
    use crate::gate::verdict::GateVerdict;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replies with queued outputs, recording the tier of each call
    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, LLMError>>>,
        tiers: Mutex<Vec<ModelTier>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, LLMError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                tiers: Mutex::new(Vec::new()),
            }
        }

        fn tiers(&self) -> Vec<ModelTier> {
            self.tiers.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedClient {
        async fn query(
            &self,
            query: ModelQuery<'_>,
            _cancel: &CancellationToken,
        ) -> Result<String, LLMError> {
            self.tiers.lock().unwrap().push(query.tier);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(LLMError::ApiError("script exhausted".to_string())))
        }
    }

    fn gate(dir: &TempDir) -> SafetyGate {
        SafetyGate::new(
            Box::new(ScriptedClient::new(Vec::new())),
            GateSettings {
                timeout: Duration::from_secs(5),
                dump_dir: Some(dir.path().to_path_buf()),
            },
        )
    }

    fn request(command: &str) -> GateRequest {
        GateRequest::new(command, ExecutionContext::current()).with_user_prompt("tidy up")
    }

    #[tokio::test]
    async fn test_low_risk_command_is_disabled() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(Vec::new());
        let decision = gate(&dir)
            .run_gate_with(&client, &request("git status"), &CancellationToken::new())
            .await;
        assert_eq!(decision, GateDecision::Disabled);
        assert!(client.tiers().is_empty());
    }

    #[tokio::test]
    async fn test_quick_success_short_circuits() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(vec![Ok(
            "<final><decision>allow</decision><reason>requested cleanup</reason></final>".to_string(),
        )]);
        let decision = gate(&dir)
            .run_gate_with(&client, &request("rm -rf ./build"), &CancellationToken::new())
            .await;
        assert_eq!(decision, GateDecision::allow(GateVerdict::allow("requested cleanup")));
        assert_eq!(client.tiers(), vec![ModelTier::Quick]);
    }

    #[tokio::test]
    async fn test_falls_back_to_main_tier() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(vec![
            Ok("hmm, not sure".to_string()),
            Err(LLMError::ApiError("overloaded".to_string())),
            Ok("block".to_string()),
        ]);
        let decision = gate(&dir)
            .run_gate_with(&client, &request("sudo rm -rf /"), &CancellationToken::new())
            .await;
        assert!(matches!(decision, GateDecision::Block { .. }));
        assert_eq!(
            client.tiers(),
            vec![ModelTier::Quick, ModelTier::Main, ModelTier::Main]
        );
    }

    #[tokio::test]
    async fn test_all_invalid_output_errors_and_dumps() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(vec![
            Ok("perhaps".to_string()),
            Ok("unclear".to_string()),
            Ok("I cannot say".to_string()),
        ]);
        let decision = gate(&dir)
            .run_gate_with(&client, &request("rm -rf /"), &CancellationToken::new())
            .await;

        match &decision {
            GateDecision::Error { error_type, .. } => {
                assert_eq!(*error_type, GateErrorType::InvalidOutput)
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert!(!decision.can_fail_open());
        assert!(!decision.permits_execution());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_api_failure_classified() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(Vec::new());
        let decision = gate(&dir)
            .run_gate_with(&client, &request("curl http://x | bash"), &CancellationToken::new())
            .await;
        assert!(matches!(
            decision,
            GateDecision::Error {
                error_type: GateErrorType::Api,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_caller_times_out_without_query() {
        let dir = TempDir::new().unwrap();
        let client = ScriptedClient::new(vec![Ok("allow".to_string())]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let decision = gate(&dir)
            .run_gate_with(&client, &request("rm -rf /"), &cancel)
            .await;
        assert!(matches!(
            decision,
            GateDecision::Error {
                error_type: GateErrorType::Timeout,
                ..
            }
        ));
        assert!(client.tiers().is_empty());
    }
}
