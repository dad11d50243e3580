//! Error types for cc_jail.
//!
//! This module defines the error categories of the pipeline:
//! - [`Violation`]: malformed or disallowed request input, detected before anything runs
//! - [`ExecError`]: the request was valid but preparing or running the toolchain failed
//! - [`ConfigError`]: the jail itself was configured with an unusable toolchain or work root

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Category of a high-risk construct found in submitted source.
///
/// Findings are advisory only. The sandbox is the boundary; the scan just
/// records what a reviewer would want to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// Headers exposing raw system calls (`sys/syscall.h`, `asm/unistd.h`, ...)
    SyscallInclude,
    /// Process creation (`system`, `fork`, `exec*`, `popen`, ...)
    ProcessSpawn,
    /// Inline assembly blocks
    InlineAssembly,
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCategory::SyscallInclude => write!(f, "syscall include"),
            RiskCategory::ProcessSpawn => write!(f, "process spawn"),
            RiskCategory::InlineAssembly => write!(f, "inline assembly"),
        }
    }
}

/// Validation failure for a request field.
///
/// Every message names the offending field and the rule it broke, and is
/// safe to hand back to the caller verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    // Source errors
    /// Source text has zero length
    #[error("source_code: source code is empty")]
    SourceEmpty,

    /// Source text exceeds the byte limit
    #[error("source_code: source code is {size} bytes, exceeding the maximum of {limit} bytes")]
    SourceTooLarge { size: usize, limit: usize },

    // Option errors
    /// Language standard is not one of the supported dialects
    #[error("language_standard: invalid language standard '{value}'; valid standards are: {allowed}")]
    InvalidStandard { value: String, allowed: String },

    /// Optimization level is not recognised
    #[error("optimization_level: invalid optimization level '{value}'; valid levels are: {allowed}")]
    InvalidOptimization { value: String, allowed: String },

    /// Warning policy is not recognised
    #[error("warning_level: invalid warning level '{value}'; valid levels are: {allowed}")]
    InvalidWarningLevel { value: String, allowed: String },

    /// AST output format is not recognised
    #[error("output_format: invalid output format '{value}'; valid formats are: {allowed}")]
    InvalidAstFormat { value: String, allowed: String },

    // Preprocessor errors
    /// Macro definition does not match `NAME` or `NAME=value`
    #[error(
        "defines: invalid macro definition '{entry}'; expected NAME or NAME=value \
         where NAME matches [A-Za-z_][A-Za-z0-9_]* and value uses only letters, digits, \
         '_', '.', '-' and quotes"
    )]
    InvalidDefine { entry: String },

    /// Include path attempts to leave the working directory
    #[error(
        "include_paths: directory traversal is not allowed in '{entry}'; \
         paths must be relative and must not contain '..' or start with '/' or '~'"
    )]
    IncludeTraversal { entry: String },

    /// Include path contains characters outside the allowed set
    #[error("include_paths: invalid include path '{entry}'; only [A-Za-z0-9_/-] is allowed")]
    InvalidIncludePath { entry: String },

    // Flag errors
    /// Flag is neither in the allow-list nor under an allowed prefix
    #[error("extra_flags: flag not allowed: {flag}")]
    FlagNotAllowed { flag: String },

    /// Flag uses an allowed prefix but its payload failed revalidation
    #[error("extra_flags: flag '{flag}' rejected: {source}")]
    FlagPayloadRejected {
        flag: String,
        #[source]
        source: Box<Violation>,
    },

    // Analyzer errors
    /// Checker is not part of the analyzer catalog
    #[error("checkers: unknown checker '{checker}'")]
    UnknownChecker { checker: String },

    // Limits
    /// Timeout is outside the accepted range
    #[error("timeout: {value} seconds is out of range; timeout must be between {min} and {max} seconds")]
    TimeoutOutOfRange { value: String, min: u64, max: u64 },
}

impl Violation {
    /// Name of the request field this violation refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Violation::SourceEmpty | Violation::SourceTooLarge { .. } => "source_code",
            Violation::InvalidStandard { .. } => "language_standard",
            Violation::InvalidOptimization { .. } => "optimization_level",
            Violation::InvalidWarningLevel { .. } => "warning_level",
            Violation::InvalidAstFormat { .. } => "output_format",
            Violation::InvalidDefine { .. } => "defines",
            Violation::IncludeTraversal { .. } | Violation::InvalidIncludePath { .. } => {
                "include_paths"
            }
            Violation::FlagNotAllowed { .. } | Violation::FlagPayloadRejected { .. } => {
                "extra_flags"
            }
            Violation::UnknownChecker { .. } => "checkers",
            Violation::TimeoutOutOfRange { .. } => "timeout",
        }
    }
}

/// Execution error while preparing, running or tearing down a job.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Process exceeded its wall-clock timeout and was killed
    #[error("process timed out after {elapsed:?} (limit: {limit:?})")]
    Timeout { limit: Duration, elapsed: Duration },

    /// No execution slot became free within the admission wait
    #[error(
        "too many concurrent executions: no slot freed within {waited:?} \
         (max concurrent: {max_concurrent})"
    )]
    ResourceExhausted {
        waited: Duration,
        max_concurrent: usize,
    },

    /// The working directory could not be created or populated
    #[error("failed to prepare working directory: {reason}")]
    WorkDirFailed { reason: String },

    /// Failed to spawn the process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed { reason: String },

    /// Anything the pipeline did not expect
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

/// Invalid jail configuration (compiler, bubblewrap or work root), reported by `JailConfigBuilder::build()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Binary path is not absolute
    #[error("binary path must be absolute: {path}")]
    BinNotAbsolute { path: String },

    /// Binary does not exist
    #[error("binary not found: {path}")]
    BinNotFound { path: String },

    /// Failed to canonicalize or stat the binary path
    #[error("failed to resolve binary path {path}: {reason}")]
    BinResolveFailed { path: String, reason: String },

    /// Binary path points to a directory
    #[error("binary path is a directory: {path}")]
    BinIsDirectory { path: String },

    /// Binary is not a regular file
    #[error("binary is not a regular file: {path}")]
    BinNotRegularFile { path: String },

    /// Binary is not executable
    #[error("binary is not executable: {path}")]
    BinNotExecutable { path: String },

    /// Work root cannot be used
    #[error("invalid work root {path}: {reason}")]
    InvalidWorkRoot { path: String, reason: String },

    /// A configuration value is out of range or unparsable
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Combined error type for the validate-and-execute flow.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Violation(#[from] Violation),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Error classification carried by a failure response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ExecutionError,
    Timeout,
    ResourceExhausted,
    InternalError,
}

impl ToolError {
    /// Classify this error for the response envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Violation(_) => ErrorKind::ValidationError,
            ToolError::Exec(ExecError::Timeout { .. }) => ErrorKind::Timeout,
            ToolError::Exec(ExecError::ResourceExhausted { .. }) => ErrorKind::ResourceExhausted,
            ToolError::Exec(ExecError::Internal { .. }) => ErrorKind::InternalError,
            ToolError::Exec(ExecError::WorkDirFailed { .. })
            | ToolError::Exec(ExecError::SpawnFailed { .. }) => ErrorKind::ExecutionError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_names_field() {
        let v = Violation::FlagNotAllowed {
            flag: "--evil".to_string(),
        };
        assert_eq!(v.field(), "extra_flags");
        assert!(v.to_string().contains("--evil"));
    }

    #[test]
    fn test_payload_rejection_mentions_inner_rule() {
        let v = Violation::FlagPayloadRejected {
            flag: "-I../etc".to_string(),
            source: Box::new(Violation::IncludeTraversal {
                entry: "../etc".to_string(),
            }),
        };
        let msg = v.to_string();
        assert!(msg.contains("-I../etc"));
        assert!(msg.contains("traversal"));
    }

    #[test]
    fn test_kind_mapping() {
        let timeout = ToolError::from(ExecError::Timeout {
            limit: Duration::from_secs(1),
            elapsed: Duration::from_secs(1),
        });
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let busy = ToolError::from(ExecError::ResourceExhausted {
            waited: Duration::from_secs(1),
            max_concurrent: 1,
        });
        assert_eq!(busy.kind(), ErrorKind::ResourceExhausted);

        let bad = ToolError::from(Violation::SourceEmpty);
        assert_eq!(bad.kind(), ErrorKind::ValidationError);
    }
}
