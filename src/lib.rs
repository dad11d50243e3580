//! # cc_jail
//!
//! Sandboxed compile, static-analysis and AST-dump pipeline for untrusted C and
//! C++ source.
//!
//! `cc_jail` takes a structured request, proves every field is acceptable,
//! builds a clang argument vector, runs it inside an isolation backend under
//! resource limits and a hard timeout, and scrubs the output before it leaves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cc_jail::{CompileRequest, Isolation, Jail, JailConfig, Response};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JailConfig::builder()
//!     .compiler("/usr/bin/clang")
//!     .work_root("/var/lib/cc_jail")
//!     .isolation(Isolation::bubblewrap("/usr/bin/bwrap"))
//!     .max_concurrent(4)
//!     .build()?;
//! let jail = Jail::new(config)?;
//!
//! let request = CompileRequest::new("int main(void) { return 0; }").with_standard("c11");
//! match jail.compile(request).await {
//!     Response::Success { payload, .. } => println!("exit {}", payload.exit_code),
//!     Response::Failure { kind, message, .. } => println!("{kind:?}: {message}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Principles
//!
//! - **Allow-list validation**: language, flags, defines, include paths and
//!   checkers are checked against fixed lists before anything runs
//! - **Fixed argv layout**: the source file is always last after `--`, and
//!   output paths come from the job directory only
//! - **No shell interpretation**: clang is executed argv-style
//! - **Scoped execution**: a job directory and an execution slot are held for
//!   exactly one request and released on every exit path
//! - **Fail closed**: every error becomes a typed failure response
//!
//! ## Platform Support
//!
//! Unix only. Resource limits use `setrlimit` in the child and the bubblewrap
//! backend needs Linux namespaces.

#[cfg(windows)]
compile_error!(
    "cc_jail does not support Windows. \
     Resource limits, process groups and the bubblewrap backend are Unix facilities."
);

mod checkers;
mod command;
mod config;
mod diagnostics;
mod env_policy;
mod error;
mod file_check;
mod flag_rules;
mod isolation;
mod limits;
mod manager;
mod options;
mod output;
mod prepared;
mod request;
mod response;
mod risky;
mod sanitize;
pub mod telemetry;
mod tools;
pub mod validate;
mod workdir;

// Public API
pub use checkers::{category_for, is_known_checker, CHECKER_CATALOG};
pub use command::{analyze_argv, ast_argv, compile_argv};
pub use config::{
    JailConfig, JailConfigBuilder, DEFAULT_BWRAP, DEFAULT_MAX_CONCURRENT, DEFAULT_QUEUE_WAIT,
};
pub use diagnostics::{parse_diagnostics, DiagnosticRecord, ParseMode, Severity};
pub use env_policy::{EnvPolicy, ALWAYS_STRIP, DEFAULT_PATH};
pub use error::{ConfigError, ErrorKind, ExecError, RiskCategory, ToolError, Violation};
pub use file_check::{find_compiler, resolve_binary};
pub use flag_rules::{check_flag, FlagRule};
pub use isolation::Isolation;
pub use limits::ResourceLimits;
pub use manager::{ExecutionManager, Job, JobOutput};
pub use options::{AstFormat, LanguageFamily, LanguageStandard, OptimizationLevel, WarningLevel};
pub use output::{ExecutionResult, TRUNCATION_MARKER};
pub use prepared::PreparedInvocation;
pub use request::{AnalyzeRequest, AstRequest, CompileRequest};
pub use response::{AnalyzePayload, AstPayload, CompilePayload, Response};
pub use risky::{scan_source, RiskFinding};
pub use sanitize::Sanitizer;
pub use tools::{ast_to_dot, Jail, ToolCall, ANALYZE_TIMEOUT, AST_TIMEOUT};
pub use validate::{ValidationOutcome, MAX_SOURCE_BYTES};
pub use workdir::WorkDir;
