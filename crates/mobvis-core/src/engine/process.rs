use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::wire::{EngineRequest, EngineResponse};
use super::{EngineError, GaitEngine, PipelineResult, PipelineVariant};
use crate::dataset::GaitRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessEngineConfig {
    pub program: String,
    pub args: Vec<String>,
    pub pipeline: PipelineVariant,
}

impl Default for ProcessEngineConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["scripts/mobgap_bridge.py".to_string()],
            pipeline: PipelineVariant::Impaired,
        }
    }
}

/// Runs the gait pipeline in a child process. The record goes in as JSON on
/// stdin and the result tables come back as JSON on stdout. A non-zero exit
/// is reported with the last non-empty line the child wrote to stderr.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    config: ProcessEngineConfig,
}

impl ProcessEngine {
    pub fn new(config: ProcessEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessEngineConfig {
        &self.config
    }
}

impl GaitEngine for ProcessEngine {
    fn name(&self) -> &'static str {
        "process"
    }

    fn run(&self, record: &GaitRecord) -> Result<PipelineResult, EngineError> {
        let request = EngineRequest::new(self.config.pipeline, record)?;
        let payload = serde_json::to_vec(&request)
            .map_err(|err| EngineError::Protocol(format!("failed to encode request: {err}")))?;

        debug!(
            program = %self.config.program,
            pipeline = %self.config.pipeline,
            bytes = payload.len(),
            "launching gait engine"
        );

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Launch {
                program: self.config.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Protocol("child stdin unavailable".to_string()))?;
        // stdout is drained concurrently so a large result cannot block the write
        let writer = thread::spawn(move || stdin.write_all(&payload));

        let output = child.wait_with_output()?;
        let write_result = writer
            .join()
            .map_err(|_| EngineError::Protocol("stdin writer panicked".to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("gait engine exited with {}", output.status));
            return Err(EngineError::Failed(message));
        }
        write_result?;

        let response: EngineResponse = serde_json::from_slice(&output.stdout)
            .map_err(|err| EngineError::Protocol(format!("failed to decode result: {err}")))?;
        response.into_result()
    }
}
