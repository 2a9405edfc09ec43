use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Instant;

use crate::error::EngineError;

#[derive(Debug, Serialize)]
struct Stage {
    stage: String,
    elapsed_ms: u64,
    data: JsonValue,
}

/// Per-iteration audit log.
///
/// Every stage of an iteration records its outcome here; the whole tree is
/// emitted as a single structured log line at iteration end, success or not,
/// so one line tells the full story of a pass.
#[derive(Debug)]
pub struct DecisionTree {
    label: String,
    started: Instant,
    stages: Vec<Stage>,
}

impl DecisionTree {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: &str, data: JsonValue) {
        self.stages.push(Stage {
            stage: stage.to_string(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            data,
        });
    }

    pub fn record_error(&mut self, stage: &str, error: &EngineError) {
        self.record(stage, serde_json::json!({ "error": error.to_string() }));
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Emit the whole tree as one structured log line.
    pub fn emit(&self) {
        let stages = serde_json::to_string(&self.stages).unwrap_or_else(|_| "[]".to_string());
        tracing::info!(
            target: "repliset::audit",
            label = %self.label,
            duration_ms = self.started.elapsed().as_millis() as u64,
            stages = %stages,
            "iteration complete"
        );
    }
}
