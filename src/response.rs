//! Response envelope and per-tool payloads.

use crate::diagnostics::DiagnosticRecord;
use crate::error::{ErrorKind, ExecError, ToolError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of one tool call. Built once and never mutated.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success {
        payload: T,
        elapsed_ms: u64,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        details: BTreeMap<String, String>,
        elapsed_ms: u64,
    },
}

impl<T> Response<T> {
    pub fn success(payload: T, elapsed: Duration) -> Self {
        Response::Success {
            payload,
            elapsed_ms: millis(elapsed),
        }
    }

    pub fn failure(error: &ToolError, elapsed: Duration) -> Self {
        Response::Failure {
            kind: error.kind(),
            message: error.to_string(),
            details: failure_details(error),
            elapsed_ms: millis(elapsed),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Response::Success { payload, .. } => Some(payload),
            Response::Failure { .. } => None,
        }
    }

    /// Failure kind, if this is a failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Response::Success { .. } => None,
            Response::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Failure message, if this is a failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            Response::Success { .. } => None,
            Response::Failure { message, .. } => Some(message),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            Response::Success { elapsed_ms, .. } | Response::Failure { elapsed_ms, .. } => {
                *elapsed_ms
            }
        }
    }
}

/// Machine-readable context for a failure.
fn failure_details(error: &ToolError) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    match error {
        ToolError::Violation(v) => {
            details.insert("field".to_string(), v.field().to_string());
        }
        ToolError::Exec(ExecError::Timeout { limit, elapsed }) => {
            details.insert("limit_ms".to_string(), millis(*limit).to_string());
            details.insert("elapsed_ms".to_string(), millis(*elapsed).to_string());
        }
        ToolError::Exec(ExecError::ResourceExhausted {
            waited,
            max_concurrent,
        }) => {
            details.insert("max_concurrent".to_string(), max_concurrent.to_string());
            details.insert("waited_ms".to_string(), millis(*waited).to_string());
        }
        ToolError::Exec(_) => {}
    }
    details
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Compile result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilePayload {
    /// Exit code 0 and an artifact was produced.
    pub success: bool,
    pub exit_code: i32,
    /// Name of the produced object or executable. It is not returned.
    pub artifact: Option<String>,
    pub diagnostics: Vec<DiagnosticRecord>,
    pub error_count: usize,
    pub warning_count: usize,
    pub stdout: String,
    /// Sanitized compiler stderr, for context the parser dropped.
    pub stderr: String,
    pub truncated: bool,
}

/// Static analysis result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzePayload {
    pub findings: Vec<DiagnosticRecord>,
    /// Warnings and errors per category. Notes are path steps, not findings.
    pub summary: BTreeMap<String, usize>,
    pub exit_code: i32,
    pub truncated: bool,
}

/// AST dump result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstPayload {
    pub format: String,
    pub ast: String,
    pub diagnostics: Vec<DiagnosticRecord>,
    pub truncated: bool,
}
