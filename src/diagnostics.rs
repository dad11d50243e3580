//! Diagnostic parsing.
//!
//! Turns sanitized toolchain text into [`DiagnosticRecord`]s. Only lines of
//! the shape `file:line[:col]: severity: message` become records; caret
//! lines, source excerpts and summaries are dropped. Emission order is kept.

use crate::checkers::{category_for, GENERAL_CATEGORY, UNKNOWN_CHECKER};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static DIAGNOSTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>[^:\n]+):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<severity>fatal error|error|warning|note|remark):\s*(?P<message>.*?)\s*$",
    )
    .unwrap()
});

/// Trailing analyzer checker tag, e.g. `[core.DivideZero]`. Compiler flags
/// such as `[-Wunused-variable]` start with `-` and are not checkers.
static CHECKER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[(?P<id>[A-Za-z][A-Za-z0-9_.]*)\]$").unwrap());

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    fn from_tool(word: &str) -> Option<Self> {
        match word {
            "error" | "fatal error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "note" | "remark" => Some(Severity::Note),
            _ => None,
        }
    }
}

/// Which tool produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Compiler and AST dump diagnostics.
    Compiler,
    /// Static analyzer findings; checker ids are extracted.
    Analyzer,
}

/// One parsed diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    pub severity: Severity,
    pub file: String,
    /// 1-based.
    pub line: u32,
    /// 1-based, or 0 when the tool gave none.
    pub column: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Parse every recognisable diagnostic line in `text`.
pub fn parse_diagnostics(text: &str, mode: ParseMode) -> Vec<DiagnosticRecord> {
    text.lines().filter_map(|line| parse_line(line, mode)).collect()
}

/// Count records of one severity.
pub fn count_severity(records: &[DiagnosticRecord], severity: Severity) -> usize {
    records.iter().filter(|r| r.severity == severity).count()
}

fn parse_line(line: &str, mode: ParseMode) -> Option<DiagnosticRecord> {
    let caps = DIAGNOSTIC_RE.captures(line)?;

    let line_no: u32 = caps["line"].parse().ok().filter(|n| *n > 0)?;
    let column = match caps.name("col") {
        Some(col) => col.as_str().parse().ok()?,
        None => 0,
    };
    let severity = Severity::from_tool(&caps["severity"])?;
    let mut message = caps["message"].to_string();

    let (checker, category) = match mode {
        ParseMode::Compiler => (None, None),
        ParseMode::Analyzer => {
            let checker = match CHECKER_TAG_RE.captures(&message) {
                Some(tag) => {
                    let id = tag["id"].to_string();
                    let start = tag.get(0).map_or(message.len(), |m| m.start());
                    message.truncate(start);
                    id
                }
                None => UNKNOWN_CHECKER.to_string(),
            };
            let category = if checker == UNKNOWN_CHECKER {
                GENERAL_CATEGORY
            } else {
                category_for(&checker)
            };
            (Some(checker), Some(category.to_string()))
        }
    };

    Some(DiagnosticRecord {
        severity,
        file: caps["file"].to_string(),
        line: line_no,
        column,
        message,
        checker,
        category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_lines() {
        let text = "\
source.c:3:12: error: call to undeclared function 'undeclared_fn'; ISO C99 and later do not support implicit function declarations
    3 |     return undeclared_fn();
      |            ^
source.c:1:5: warning: unused variable 'x' [-Wunused-variable]
1 error generated.";
        let records = parse_diagnostics(text, ParseMode::Compiler);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].severity, Severity::Error);
        assert_eq!(records[0].file, "source.c");
        assert_eq!((records[0].line, records[0].column), (3, 12));
        assert!(records[0].message.contains("undeclared_fn"));
        assert_eq!(records[0].checker, None);

        assert_eq!(records[1].severity, Severity::Warning);
        assert!(records[1].message.ends_with("[-Wunused-variable]"));
    }

    #[test]
    fn test_missing_column_and_severity_aliases() {
        let text = "source.cpp:7: fatal error: 'nope.h' file not found\nsource.cpp:2:1: remark: inlined";
        let records = parse_diagnostics(text, ParseMode::Compiler);
        assert_eq!(records[0].severity, Severity::Error);
        assert_eq!(records[0].column, 0);
        assert_eq!(records[1].severity, Severity::Note);
    }

    #[test]
    fn test_analyzer_checker_extraction() {
        let text = "\
source.c:4:14: warning: Division by zero [core.DivideZero]
source.c:3:5: note: 'z' initialized to 0
source.c:9:3: warning: Call to function 'gets' is extremely insecure [security.insecureAPI.gets]
source.c:12:1: warning: Potential leak [alpha.unix.Stream]";
        let records = parse_diagnostics(text, ParseMode::Analyzer);
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].checker.as_deref(), Some("core.DivideZero"));
        assert_eq!(records[0].category.as_deref(), Some("core"));
        assert_eq!(records[0].message, "Division by zero");

        assert_eq!(records[1].checker.as_deref(), Some(UNKNOWN_CHECKER));
        assert_eq!(records[1].category.as_deref(), Some(GENERAL_CATEGORY));

        assert_eq!(records[2].category.as_deref(), Some("security"));
        assert_eq!(records[3].category.as_deref(), Some("experimental"));
    }

    #[test]
    fn test_garbage_is_dropped() {
        let text = "In file included from source.c:1:\nclang: error: no input files\n:::\nsource.c:0:1: error: zero line";
        assert!(parse_diagnostics(text, ParseMode::Compiler).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let text = "source.c:1:1: warning: a\nsource.c:2:1: error: b";
        assert_eq!(
            parse_diagnostics(text, ParseMode::Analyzer),
            parse_diagnostics(text, ParseMode::Analyzer)
        );
        let records = parse_diagnostics(text, ParseMode::Compiler);
        assert_eq!(count_severity(&records, Severity::Error), 1);
        assert_eq!(count_severity(&records, Severity::Warning), 1);
    }
}
