#![allow(dead_code)]

use async_trait::async_trait;
use bashgate::gate::{ExecutionContext, GateRequest, GateSettings, SafetyGate};
use bashgate::llm::{LLMClient, LLMError, ModelQuery, ModelTier};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Well-formed allow verdict as the model would emit it
pub fn allow_output(summary: &str) -> String {
    format!(
        "<final><decision>allow</decision><reason>{}</reason></final>",
        summary
    )
}

/// Well-formed block verdict as the model would emit it
pub fn block_output(summary: &str) -> String {
    format!(
        "<final><decision>block</decision><reason>{}</reason></final>",
        summary
    )
}

/// Replies with queued outputs in order, recording every call
pub struct ScriptedClient {
    replies: Mutex<Vec<Result<String, LLMError>>>,
    calls: Mutex<Vec<(ModelTier, String)>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, LLMError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn tiers(&self) -> Vec<ModelTier> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, i)| i.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn query(
        &self,
        query: ModelQuery<'_>,
        _cancel: &CancellationToken,
    ) -> Result<String, LLMError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.tier, query.user_input.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(LLMError::ApiError("script exhausted".to_string())))
    }
}

/// Never answers on its own; returns only once the token fires
pub struct HangingClient {
    calls: Mutex<usize>,
}

impl HangingClient {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LLMClient for HangingClient {
    async fn query(
        &self,
        _query: ModelQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, LLMError> {
        *self.calls.lock().unwrap() += 1;
        cancel.cancelled().await;
        Err(LLMError::Cancelled)
    }
}

/// Fails every query with the same error
pub struct FailingClient {
    error: fn() -> LLMError,
}

impl FailingClient {
    pub fn api_down() -> Self {
        Self {
            error: || LLMError::ApiError("503 Service Unavailable".to_string()),
        }
    }
}

#[async_trait]
impl LLMClient for FailingClient {
    async fn query(
        &self,
        _query: ModelQuery<'_>,
        _cancel: &CancellationToken,
    ) -> Result<String, LLMError> {
        Err((self.error)())
    }
}

/// Gate writing its dumps into a fresh temporary directory
pub fn test_gate(timeout: Duration) -> (SafetyGate, TempDir) {
    let dir = TempDir::new().unwrap();
    let gate = SafetyGate::new(
        Box::new(FailingClient::api_down()),
        GateSettings {
            timeout,
            dump_dir: Some(dir.path().to_path_buf()),
        },
    );
    (gate, dir)
}

pub fn request(command: &str) -> GateRequest {
    GateRequest::new(command, ExecutionContext::current())
}

/// Files currently in a dump directory
pub fn dump_files(dir: &TempDir) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir.path())
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
