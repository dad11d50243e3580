//! Risky source pattern detection.
//!
//! Some constructs are worth flagging in submitted source: raw system call
//! headers, process creation, inline assembly. Detection is advisory. The
//! validator logs findings and carries on; [`scan_source`] returns them for
//! callers that want to inspect them. The sandbox is what contains the program.

use crate::error::RiskCategory;
use regex::Regex;
use std::sync::LazyLock;

/// Headers that expose raw system call interfaces.
pub const RISKY_INCLUDES: &[&str] = &[
    "sys/syscall.h",
    "syscall.h",
    "asm/unistd.h",
    "linux/seccomp.h",
    "sys/ptrace.h",
    "sys/mount.h",
];

/// Functions that create processes or replace the current image.
pub const RISKY_SPAWN_CALLS: &[&str] = &[
    "system", "popen", "fork", "vfork", "clone", "execl", "execle", "execlp", "execv", "execve",
    "execvp", "execvpe", "posix_spawn", "posix_spawnp", "syscall",
];

/// Keywords that introduce inline assembly.
pub const RISKY_ASM_KEYWORDS: &[&str] = &["asm", "__asm", "__asm__"];

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).unwrap()
});

static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

static ASM_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Longest keyword first so `__asm__` is not reported as `__asm`.
    let mut keywords = RISKY_ASM_KEYWORDS.to_vec();
    keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));
    let alternation = keywords.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(
        r"\b({alternation})\b\s*(volatile\b|__volatile__\b)?\s*[({{]"
    ))
    .unwrap()
});

/// A single advisory finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskFinding {
    pub category: RiskCategory,
    /// 1-based line of the construct.
    pub line: usize,
    /// The matched include, function or keyword.
    pub construct: String,
}

/// Scan source text for risky constructs.
pub fn scan_source(source: &str) -> Vec<RiskFinding> {
    let mut findings = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(caps) = INCLUDE_RE.captures(line) {
            let header = &caps[1];
            if RISKY_INCLUDES.contains(&header) {
                findings.push(RiskFinding {
                    category: RiskCategory::SyscallInclude,
                    line: line_no,
                    construct: header.to_string(),
                });
            }
            continue;
        }

        if let Some(caps) = ASM_RE.captures(line) {
            findings.push(RiskFinding {
                category: RiskCategory::InlineAssembly,
                line: line_no,
                construct: caps[1].to_string(),
            });
        }

        for caps in CALL_RE.captures_iter(line) {
            let name = &caps[1];
            if RISKY_SPAWN_CALLS.contains(&name) {
                findings.push(RiskFinding {
                    category: RiskCategory::ProcessSpawn,
                    line: line_no,
                    construct: name.to_string(),
                });
            }
        }
    }

    findings
}

/// Scan and log findings without affecting the outcome.
pub fn warn_on_risky(source: &str) -> Vec<RiskFinding> {
    let findings = scan_source(source);
    for finding in &findings {
        tracing::warn!(
            category = %finding.category,
            line = finding.line,
            construct = %finding.construct,
            "Risky construct in submitted source"
        );
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syscall_include_detected() {
        let findings = scan_source("#include <sys/syscall.h>\nint main(){}\n");
        assert_eq!(
            findings,
            vec![RiskFinding {
                category: RiskCategory::SyscallInclude,
                line: 1,
                construct: "sys/syscall.h".to_string(),
            }]
        );
    }

    #[test]
    fn test_spawn_calls_detected() {
        let src = "int main() {\n  system(\"ls\");\n  if (fork() == 0) execvp(a, b);\n}\n";
        let found: Vec<_> = scan_source(src)
            .into_iter()
            .map(|f| (f.line, f.construct))
            .collect();
        assert_eq!(
            found,
            vec![
                (2, "system".to_string()),
                (3, "fork".to_string()),
                (3, "execvp".to_string())
            ]
        );
    }

    #[test]
    fn test_inline_asm_detected() {
        let findings = scan_source("void f(){ __asm__ volatile (\"nop\"); }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, RiskCategory::InlineAssembly);
    }

    #[test]
    fn test_every_asm_keyword_detected() {
        for keyword in RISKY_ASM_KEYWORDS {
            let findings = scan_source(&format!("void f(){{ {keyword}(\"nop\"); }}"));
            assert_eq!(findings.len(), 1, "{keyword}");
            assert_eq!(findings[0].construct, *keyword);
        }
    }

    #[test]
    fn test_safe_source_not_detected() {
        let src = "#include <stdio.h>\nint systematic(int x) { return x; }\nint main(){ printf(\"hi\"); }";
        assert!(scan_source(src).is_empty());
    }
}
