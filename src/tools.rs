//! Tool facades.
//!
//! Each tool runs the same pipeline and stops at the first failure:
//!
//! ```text
//! validate -> build argv -> execute -> sanitize -> parse -> respond
//! ```
//!
//! Facades never return `Err`. Every outcome, including validation and
//! execution failures, is a [`Response`] carrying the elapsed time.

use crate::command::{analyze_argv, ast_argv, compile_argv, EXECUTABLE_NAME, OBJECT_NAME};
use crate::config::JailConfig;
use crate::diagnostics::{count_severity, parse_diagnostics, ParseMode, Severity};
use crate::error::{ConfigError, ExecError, ToolError};
use crate::manager::{ExecutionManager, Job};
use crate::options::AstFormat;
use crate::request::{AnalyzeRequest, AstRequest, CompileRequest};
use crate::response::{AnalyzePayload, AstPayload, CompilePayload, Response};
use crate::sanitize::Sanitizer;
use crate::validate::{validate_analyze, validate_ast, validate_compile};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock limit for static analysis.
pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Wall-clock limit for AST dumps.
pub const AST_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool invocation as it arrives at the boundary:
/// `{"tool": "compile", "arguments": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "lowercase")]
pub enum ToolCall {
    Compile(CompileRequest),
    Analyze(AnalyzeRequest),
    Ast(AstRequest),
}

/// The compile / analyze / AST service.
///
/// Cheap to clone; clones share the concurrency ceiling.
#[derive(Debug, Clone)]
pub struct Jail {
    manager: ExecutionManager,
    sanitizer: Sanitizer,
}

impl Jail {
    pub fn new(config: JailConfig) -> Result<Self, ConfigError> {
        let sanitizer = Sanitizer::new(&config.work_root, config.limits.max_output)?;
        let manager = ExecutionManager::new(
            config.max_concurrent,
            config.queue_wait,
            config.work_root,
            config.compiler,
            config.isolation,
            config.limits,
            config.env_policy.apply(),
        );
        Ok(Self { manager, sanitizer })
    }

    /// Jobs currently holding an execution slot.
    pub fn live_executions(&self) -> usize {
        self.manager.live_executions()
    }

    /// Dispatch a boundary call and serialize its response.
    pub async fn call(&self, call: ToolCall) -> Result<serde_json::Value, serde_json::Error> {
        match call {
            ToolCall::Compile(req) => serde_json::to_value(self.compile(req).await),
            ToolCall::Analyze(req) => serde_json::to_value(self.analyze(req).await),
            ToolCall::Ast(req) => serde_json::to_value(self.ast(req).await),
        }
    }

    /// Compile source to an object file or executable.
    ///
    /// The artifact itself never leaves the jail; the payload only reports
    /// whether it was produced.
    #[tracing::instrument(skip_all, fields(tool = "compile"))]
    pub async fn compile(&self, request: CompileRequest) -> Response<CompilePayload> {
        let start = Instant::now();
        respond("compile", start, self.run_compile(request).await)
    }

    /// Run the clang static analyzer.
    #[tracing::instrument(skip_all, fields(tool = "analyze"))]
    pub async fn analyze(&self, request: AnalyzeRequest) -> Response<AnalyzePayload> {
        let start = Instant::now();
        respond("analyze", start, self.run_analyze(request).await)
    }

    /// Dump the abstract syntax tree.
    #[tracing::instrument(skip_all, fields(tool = "ast"))]
    pub async fn ast(&self, request: AstRequest) -> Response<AstPayload> {
        let start = Instant::now();
        respond("ast", start, self.run_ast(request).await)
    }

    async fn run_compile(&self, request: CompileRequest) -> Result<CompilePayload, ToolError> {
        let options = validate_compile(request)?;
        let job = Job {
            source: &options.source,
            family: options.standard.family(),
            timeout: options.timeout,
        };
        let out = self
            .manager
            .execute(job, |source, dir| compile_argv(&options, source, dir))
            .await?;

        let (stdout, stdout_cut) = self.sanitizer.sanitize_checked(&out.result.stdout_string());
        let (stderr, stderr_cut) = self.sanitizer.sanitize_checked(&out.result.stderr_string());
        let diagnostics = parse_diagnostics(&stderr, ParseMode::Compiler);

        let expected = if options.compile_only {
            OBJECT_NAME
        } else {
            EXECUTABLE_NAME
        };
        let artifact = out
            .produced
            .iter()
            .any(|name| name == expected)
            .then(|| expected.to_string());
        let exit_code = out.result.code();

        Ok(CompilePayload {
            success: exit_code == 0 && artifact.is_some(),
            exit_code,
            artifact,
            error_count: count_severity(&diagnostics, Severity::Error),
            warning_count: count_severity(&diagnostics, Severity::Warning),
            diagnostics,
            stdout,
            stderr,
            truncated: out.result.truncated() || stdout_cut || stderr_cut,
        })
    }

    async fn run_analyze(&self, request: AnalyzeRequest) -> Result<AnalyzePayload, ToolError> {
        let options = validate_analyze(request)?;
        let job = Job {
            source: &options.source,
            family: options.standard.family(),
            timeout: ANALYZE_TIMEOUT,
        };
        let out = self
            .manager
            .execute(job, |source, dir| analyze_argv(&options, source, dir))
            .await?;

        let (stderr, stderr_cut) = self.sanitizer.sanitize_checked(&out.result.stderr_string());
        let findings = parse_diagnostics(&stderr, ParseMode::Analyzer);

        let mut summary = BTreeMap::new();
        for finding in findings.iter().filter(|f| f.severity != Severity::Note) {
            if let Some(category) = &finding.category {
                *summary.entry(category.clone()).or_insert(0) += 1;
            }
        }

        Ok(AnalyzePayload {
            findings,
            summary,
            exit_code: out.result.code(),
            truncated: out.result.truncated() || stderr_cut,
        })
    }

    async fn run_ast(&self, request: AstRequest) -> Result<AstPayload, ToolError> {
        let options = validate_ast(request)?;
        let job = Job {
            source: &options.source,
            family: options.standard.family(),
            timeout: AST_TIMEOUT,
        };
        let out = self
            .manager
            .execute(job, |source, _| ast_argv(&options, source))
            .await?;

        let raw = match options.format {
            AstFormat::Text | AstFormat::Json => out.result.stdout_string(),
            AstFormat::Graph => {
                if out.result.stdout_truncated {
                    return Err(ExecError::Internal {
                        reason: "AST dump exceeded the output limit; graph unavailable".to_string(),
                    }
                    .into());
                }
                let tree: serde_json::Value = serde_json::from_slice(&out.result.stdout)
                    .map_err(|e| ExecError::Internal {
                        reason: format!("AST dump is not valid JSON: {e}"),
                    })?;
                ast_to_dot(&tree)
            }
        };

        let (ast, ast_cut) = self.sanitizer.sanitize_checked(&raw);
        let (stderr, stderr_cut) = self.sanitizer.sanitize_checked(&out.result.stderr_string());

        Ok(AstPayload {
            format: options.format.as_str().to_string(),
            ast,
            diagnostics: parse_diagnostics(&stderr, ParseMode::Compiler),
            truncated: out.result.truncated() || ast_cut || stderr_cut,
        })
    }
}

fn respond<T>(tool: &str, start: Instant, outcome: Result<T, ToolError>) -> Response<T> {
    let elapsed = start.elapsed();
    match outcome {
        Ok(payload) => {
            info!(tool, elapsed_ms = elapsed.as_millis() as u64, "request succeeded");
            Response::success(payload, elapsed)
        }
        Err(error) => {
            info!(
                tool,
                kind = ?error.kind(),
                elapsed_ms = elapsed.as_millis() as u64,
                %error,
                "request failed"
            );
            Response::failure(&error, elapsed)
        }
    }
}

/// Render clang's JSON AST as a Graphviz digraph.
///
/// One node per AST node, labelled with its kind and name, and one edge per
/// parent/child link. Implicit declarations are left out. The walk is
/// iterative so deeply nested input cannot exhaust the stack.
pub fn ast_to_dot(root: &serde_json::Value) -> String {
    let mut dot = String::from("digraph AST {\n  node [shape=box, fontname=\"monospace\"];\n");
    let mut next_id = 0usize;
    let mut stack: Vec<(&serde_json::Value, Option<usize>)> = vec![(root, None)];

    while let Some((node, parent)) = stack.pop() {
        if node.get("isImplicit").and_then(|v| v.as_bool()) == Some(true) {
            continue;
        }
        let id = next_id;
        next_id += 1;

        dot.push_str(&format!("  n{id} [label=\"{}\"];\n", escape_label(&node_label(node))));
        if let Some(parent) = parent {
            dot.push_str(&format!("  n{parent} -> n{id};\n"));
        }

        if let Some(children) = node.get("inner").and_then(|v| v.as_array()) {
            // Reversed so children come off the stack in source order.
            for child in children.iter().rev() {
                stack.push((child, Some(id)));
            }
        }
    }

    dot.push_str("}\n");
    dot
}

fn node_label(node: &serde_json::Value) -> String {
    let kind = node
        .get("kind")
        .and_then(|v| v.as_str())
        .unwrap_or("Node");
    match node.get("name").and_then(|v| v.as_str()) {
        Some(name) if !name.is_empty() => format!("{kind} {name}"),
        _ => match node.get("opcode").and_then(|v| v.as_str()) {
            Some(op) => format!("{kind} {op}"),
            None => kind.to_string(),
        },
    }
}

fn escape_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ast_to_dot() {
        let tree = json!({
            "kind": "TranslationUnitDecl",
            "inner": [
                { "kind": "TypedefDecl", "name": "__int128_t", "isImplicit": true },
                {
                    "kind": "FunctionDecl",
                    "name": "main",
                    "inner": [
                        { "kind": "CompoundStmt", "inner": [
                            { "kind": "ReturnStmt", "inner": [
                                { "kind": "BinaryOperator", "opcode": "+" }
                            ]}
                        ]}
                    ]
                }
            ]
        });

        let dot = ast_to_dot(&tree);
        assert!(dot.starts_with("digraph AST {"));
        assert!(dot.contains("n0 [label=\"TranslationUnitDecl\"]"));
        assert!(dot.contains("n1 [label=\"FunctionDecl main\"]"));
        assert!(dot.contains("n0 -> n1;"));
        assert!(dot.contains("n2 [label=\"CompoundStmt\"]"));
        assert!(dot.contains("n4 [label=\"BinaryOperator +\"]"));
        assert!(!dot.contains("__int128_t"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_label_escaping() {
        let tree = json!({ "kind": "StringLiteral", "name": "say \"hi\"\\" });
        let dot = ast_to_dot(&tree);
        assert!(dot.contains(r#"label="StringLiteral say \"hi\"\\""#));
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let mut tree = json!({ "kind": "ParenExpr" });
        for _ in 0..100 {
            tree = json!({ "kind": "ParenExpr", "inner": [tree] });
        }
        let dot = ast_to_dot(&tree);
        assert_eq!(dot.matches("->").count(), 100);
    }

    #[test]
    fn test_tool_call_envelope() {
        let call: ToolCall = serde_json::from_value(json!({
            "tool": "compile",
            "arguments": { "source_code": "int x;", "language_standard": "c11" }
        }))
        .unwrap();
        match call {
            ToolCall::Compile(req) => {
                assert_eq!(req.source_code, "int x;");
                assert_eq!(req.language_standard.as_deref(), Some("c11"));
            }
            other => panic!("unexpected call {other:?}"),
        }

        let bad = serde_json::from_value::<ToolCall>(json!({ "tool": "link", "arguments": {} }));
        assert!(bad.is_err());
    }
}
