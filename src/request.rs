//! Inbound tool requests.
//!
//! These mirror the external tool schemas field for field (snake_case names).
//! Nothing here is trusted: every field goes through [`crate::validate`]
//! before it is used. Absent optional fields take documented defaults during
//! validation, not during deserialization.

use serde::Deserialize;

/// Request for the `compile` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompileRequest {
    /// Source text. Required; a missing field reads as empty and is rejected.
    #[serde(default)]
    pub source_code: String,

    /// Language dialect such as `c11` or `c++20`. Default: `c++20`.
    pub language_standard: Option<String>,

    /// One of `O0 O1 O2 O3 Os Oz Ofast`. Default: `O2`.
    pub optimization_level: Option<String>,

    /// One of `none all extra pedantic error`. Default: `all`.
    pub warning_level: Option<String>,

    /// `NAME` or `NAME=value` macro definitions.
    #[serde(default)]
    pub defines: Vec<String>,

    /// Include directories relative to the working directory.
    #[serde(default)]
    pub include_paths: Vec<String>,

    /// Additional compiler flags, checked against the flag allow-list.
    #[serde(default)]
    pub extra_flags: Vec<String>,

    /// Produce an object file only (default) instead of a linked executable.
    pub compile_only: Option<bool>,

    /// Wall-clock limit in seconds, 1 to 60. Default: 30.
    pub timeout: Option<f64>,
}

/// Request for the `analyze` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub source_code: String,

    pub language_standard: Option<String>,

    /// Analyzer checkers or checker packages. Empty selects the default set.
    #[serde(default)]
    pub checkers: Vec<String>,

    #[serde(default)]
    pub defines: Vec<String>,

    #[serde(default)]
    pub include_paths: Vec<String>,
}

/// Request for the `ast` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AstRequest {
    #[serde(default)]
    pub source_code: String,

    pub language_standard: Option<String>,

    /// One of `json`, `text` or `graph`. Default: `text`.
    pub output_format: Option<String>,
}

impl CompileRequest {
    /// Create a request with default options.
    pub fn new(source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            ..Default::default()
        }
    }

    /// Set the language standard.
    pub fn with_standard(mut self, standard: impl Into<String>) -> Self {
        self.language_standard = Some(standard.into());
        self
    }

    /// Set extra flags.
    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.extra_flags = flags;
        self
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout = Some(secs);
        self
    }
}

impl AnalyzeRequest {
    pub fn new(source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            ..Default::default()
        }
    }
}

impl AstRequest {
    pub fn new(source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_request_from_json() {
        let json = r#"{
            "source_code": "int main(){}",
            "language_standard": "c11",
            "defines": ["DEBUG"],
            "compile_only": false,
            "timeout": 5
        }"#;
        let request: CompileRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.source_code, "int main(){}");
        assert_eq!(request.language_standard.as_deref(), Some("c11"));
        assert_eq!(request.defines, vec!["DEBUG".to_string()]);
        assert_eq!(request.compile_only, Some(false));
        assert_eq!(request.timeout, Some(5.0));
        assert!(request.include_paths.is_empty());
    }

    #[test]
    fn test_missing_source_reads_as_empty() {
        let request: AstRequest = serde_json::from_str(r#"{"output_format": "json"}"#).unwrap();
        assert!(request.source_code.is_empty());
    }
}
