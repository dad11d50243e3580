//! Request validation.
//!
//! One total function per field. Each returns a [`ValidationOutcome`]: the
//! field verbatim if it is acceptable, or the single [`Violation`] explaining
//! why not. Values are never rewritten.
//!
//! The request-level validators apply the field validators in a fixed order
//! (source, language, tool options, flags, timeout) so a malformed request
//! always reports the same first error.

use crate::checkers::{is_known_checker, DEFAULT_CPP_CHECKERS, DEFAULT_C_CHECKERS};
use crate::error::Violation;
use crate::flag_rules::check_flag;
use crate::options::{list, AstFormat, LanguageFamily, LanguageStandard, OptimizationLevel, WarningLevel};
use crate::request::{AnalyzeRequest, AstRequest, CompileRequest};
use crate::risky::warn_on_risky;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Maximum accepted source size in bytes.
pub const MAX_SOURCE_BYTES: usize = 1024 * 1024;

/// Accepted compile timeout range, inclusive, in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 60;

/// Compile timeout when the request names none.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

static DEFINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[A-Za-z_][A-Za-z0-9_]*(=[A-Za-z0-9_"'.\-]*)?$"#).unwrap()
});

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_/\-]+$").unwrap());

/// Result of validating one field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum ValidationOutcome<T> {
    Accepted(T),
    Rejected(Violation),
}

impl<T> ValidationOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    pub fn into_result(self) -> Result<T, Violation> {
        match self {
            ValidationOutcome::Accepted(v) => Ok(v),
            ValidationOutcome::Rejected(v) => Err(v),
        }
    }

    /// The rejection, if any.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            ValidationOutcome::Accepted(_) => None,
            ValidationOutcome::Rejected(v) => Some(v),
        }
    }
}

impl<T> From<Result<T, Violation>> for ValidationOutcome<T> {
    fn from(result: Result<T, Violation>) -> Self {
        match result {
            Ok(v) => ValidationOutcome::Accepted(v),
            Err(v) => ValidationOutcome::Rejected(v),
        }
    }
}

use ValidationOutcome::{Accepted, Rejected};

/// Source must be 1..=[`MAX_SOURCE_BYTES`] bytes.
///
/// Risky constructs are logged but do not affect the outcome.
pub fn validate_source(source: &str) -> ValidationOutcome<&str> {
    if source.is_empty() {
        return Rejected(Violation::SourceEmpty);
    }
    if source.len() > MAX_SOURCE_BYTES {
        return Rejected(Violation::SourceTooLarge {
            size: source.len(),
            limit: MAX_SOURCE_BYTES,
        });
    }
    warn_on_risky(source);
    Accepted(source)
}

pub fn validate_language_standard(value: Option<&str>) -> ValidationOutcome<LanguageStandard> {
    let Some(value) = value else {
        return Accepted(LanguageStandard::DEFAULT);
    };
    match LanguageStandard::parse(value) {
        Some(std) => Accepted(std),
        None => Rejected(Violation::InvalidStandard {
            value: value.to_string(),
            allowed: list(LanguageStandard::ALL, LanguageStandard::as_str),
        }),
    }
}

pub fn validate_optimization(value: Option<&str>) -> ValidationOutcome<OptimizationLevel> {
    let Some(value) = value else {
        return Accepted(OptimizationLevel::DEFAULT);
    };
    match OptimizationLevel::parse(value) {
        Some(level) => Accepted(level),
        None => Rejected(Violation::InvalidOptimization {
            value: value.to_string(),
            allowed: list(OptimizationLevel::ALL, OptimizationLevel::as_str),
        }),
    }
}

pub fn validate_warning_level(value: Option<&str>) -> ValidationOutcome<WarningLevel> {
    let Some(value) = value else {
        return Accepted(WarningLevel::DEFAULT);
    };
    match WarningLevel::parse(value) {
        Some(level) => Accepted(level),
        None => Rejected(Violation::InvalidWarningLevel {
            value: value.to_string(),
            allowed: list(WarningLevel::ALL, WarningLevel::as_str),
        }),
    }
}

pub fn validate_ast_format(value: Option<&str>) -> ValidationOutcome<AstFormat> {
    let Some(value) = value else {
        return Accepted(AstFormat::DEFAULT);
    };
    match AstFormat::parse(value) {
        Some(format) => Accepted(format),
        None => Rejected(Violation::InvalidAstFormat {
            value: value.to_string(),
            allowed: list(AstFormat::ALL, AstFormat::as_str),
        }),
    }
}

/// `NAME` or `NAME=value`.
pub fn validate_define(entry: &str) -> ValidationOutcome<&str> {
    if DEFINE_RE.is_match(entry) {
        Accepted(entry)
    } else {
        Rejected(Violation::InvalidDefine {
            entry: entry.to_string(),
        })
    }
}

pub fn validate_defines(entries: &[String]) -> ValidationOutcome<Vec<String>> {
    all_or_nothing(entries, validate_define)
}

/// Relative path inside the working directory.
pub fn validate_include_path(entry: &str) -> ValidationOutcome<&str> {
    if entry.contains("..") || entry.starts_with('~') || entry.starts_with('/') {
        return Rejected(Violation::IncludeTraversal {
            entry: entry.to_string(),
        });
    }
    if !INCLUDE_RE.is_match(entry) {
        return Rejected(Violation::InvalidIncludePath {
            entry: entry.to_string(),
        });
    }
    Accepted(entry)
}

pub fn validate_include_paths(entries: &[String]) -> ValidationOutcome<Vec<String>> {
    all_or_nothing(entries, validate_include_path)
}

pub fn validate_flags(flags: &[String]) -> ValidationOutcome<Vec<String>> {
    for flag in flags {
        if let Err(violation) = check_flag(flag) {
            return Rejected(violation);
        }
    }
    Accepted(flags.to_vec())
}

pub fn validate_checkers(checkers: &[String]) -> ValidationOutcome<Vec<String>> {
    match checkers.iter().find(|c| !is_known_checker(c)) {
        Some(unknown) => Rejected(Violation::UnknownChecker {
            checker: unknown.clone(),
        }),
        None => Accepted(checkers.to_vec()),
    }
}

/// Timeout in seconds within [`MIN_TIMEOUT_SECS`]..=[`MAX_TIMEOUT_SECS`].
pub fn validate_timeout(value: Option<f64>, default: Duration) -> ValidationOutcome<Duration> {
    let Some(secs) = value else {
        return Accepted(default);
    };
    if !secs.is_finite() || secs < MIN_TIMEOUT_SECS as f64 || secs > MAX_TIMEOUT_SECS as f64 {
        return Rejected(Violation::TimeoutOutOfRange {
            value: format_seconds(secs),
            min: MIN_TIMEOUT_SECS,
            max: MAX_TIMEOUT_SECS,
        });
    }
    Accepted(Duration::from_secs_f64(secs))
}

fn format_seconds(secs: f64) -> String {
    if secs.is_finite() && secs.fract() == 0.0 {
        format!("{}", secs as i64)
    } else {
        secs.to_string()
    }
}

fn all_or_nothing<F>(entries: &[String], check: F) -> ValidationOutcome<Vec<String>>
where
    F: for<'a> Fn(&'a str) -> ValidationOutcome<&'a str>,
{
    for entry in entries {
        if let Rejected(violation) = check(entry.as_str()) {
            return Rejected(violation);
        }
    }
    Accepted(entries.to_vec())
}

/// Validated compile options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub source: String,
    pub standard: LanguageStandard,
    pub optimization: OptimizationLevel,
    pub warnings: WarningLevel,
    pub defines: Vec<String>,
    pub include_paths: Vec<String>,
    pub extra_flags: Vec<String>,
    pub compile_only: bool,
    pub timeout: Duration,
}

/// Validated analyzer options.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOptions {
    pub source: String,
    pub standard: LanguageStandard,
    /// Never empty: a request without checkers gets the language default set.
    pub checkers: Vec<String>,
    pub defines: Vec<String>,
    pub include_paths: Vec<String>,
}

/// Validated AST dump options.
#[derive(Debug, Clone, PartialEq)]
pub struct AstOptions {
    pub source: String,
    pub standard: LanguageStandard,
    pub format: AstFormat,
}

pub fn validate_compile(request: CompileRequest) -> Result<CompileOptions, Violation> {
    validate_source(&request.source_code).into_result()?;
    let standard = validate_language_standard(request.language_standard.as_deref()).into_result()?;
    let optimization = validate_optimization(request.optimization_level.as_deref()).into_result()?;
    let warnings = validate_warning_level(request.warning_level.as_deref()).into_result()?;
    let defines = validate_defines(&request.defines).into_result()?;
    let include_paths = validate_include_paths(&request.include_paths).into_result()?;
    let extra_flags = validate_flags(&request.extra_flags).into_result()?;
    let timeout = validate_timeout(request.timeout, DEFAULT_COMPILE_TIMEOUT).into_result()?;

    Ok(CompileOptions {
        source: request.source_code,
        standard,
        optimization,
        warnings,
        defines,
        include_paths,
        extra_flags,
        compile_only: request.compile_only.unwrap_or(true),
        timeout,
    })
}

pub fn validate_analyze(request: AnalyzeRequest) -> Result<AnalyzeOptions, Violation> {
    validate_source(&request.source_code).into_result()?;
    let standard = validate_language_standard(request.language_standard.as_deref()).into_result()?;
    let mut checkers = validate_checkers(&request.checkers).into_result()?;
    let defines = validate_defines(&request.defines).into_result()?;
    let include_paths = validate_include_paths(&request.include_paths).into_result()?;

    if checkers.is_empty() {
        let defaults = match standard.family() {
            LanguageFamily::C => DEFAULT_C_CHECKERS,
            LanguageFamily::Cpp => DEFAULT_CPP_CHECKERS,
        };
        checkers = defaults.iter().map(|c| c.to_string()).collect();
    }

    Ok(AnalyzeOptions {
        source: request.source_code,
        standard,
        checkers,
        defines,
        include_paths,
    })
}

pub fn validate_ast(request: AstRequest) -> Result<AstOptions, Violation> {
    validate_source(&request.source_code).into_result()?;
    let standard = validate_language_standard(request.language_standard.as_deref()).into_result()?;
    let format = validate_ast_format(request.output_format.as_deref()).into_result()?;

    Ok(AstOptions {
        source: request.source_code,
        standard,
        format,
    })
}
