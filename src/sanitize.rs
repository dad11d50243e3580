//! Output sanitization.
//!
//! Toolchain output is scrubbed before it leaves the jail: host paths, process
//! and container identifiers, heap addresses and timestamps are rewritten by an
//! ordered list of `(pattern, replacement)` rules. This is best-effort hygiene;
//! the isolation backend is the boundary.
//!
//! Rule order matters. Job-directory paths are made relative first so that the
//! generic path rules only ever see paths outside the job.

use crate::error::ConfigError;
use crate::output::TRUNCATION_MARKER;
use crate::workdir::JOB_PREFIX;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Characters that may appear in a path segment we rewrite.
const SEG: &str = r"[A-Za-z0-9._+\-]";

/// Absolute paths ending in a source or header file, reduced to the file name.
static SOURCE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(^|[^A-Za-z0-9._/\-])(?:/{SEG}+)+/({SEG}+\.(?:cpp|cxx|cc|c\+\+|c|hpp|hxx|hh|h|inc|def|ipp|tcc))\b"
    ))
    .unwrap()
});

/// `pid=1234`, `uid: 0`. Only numeric values directly after `=` or `:` count,
/// so `pid = fork()` and `struct pid` are left alone.
static KEYED_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(uid|gid|pid|ppid|tid)(?:=|:\s*)\d+\b").unwrap()
});

/// `container_id=9f86d0...`, hex values only.
static CONTAINER_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(container[_\-]?id)(?:=|:\s*)[0-9a-f]+\b").unwrap()
});

/// Bare 64-hex container identifiers.
static CONTAINER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-f]{64}\b").unwrap());

/// Toolchain and system installation directories.
static SYSTEM_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(^|[^A-Za-z0-9._/\-])(?:/usr/(?:include|lib64|lib|libexec|share|local)|/opt/{SEG}+/lib|/lib64|/lib|/etc)(?:/{SEG}+)*"
    ))
    .unwrap()
});

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b0x[0-9a-fA-F]{6,}\b").unwrap());

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?").unwrap()
});

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Ordered scrubber bound to one work root.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    rules: Vec<(Regex, &'static str)>,
    max_output: usize,
}

impl Sanitizer {
    /// Build the rule list for jobs under `work_root`.
    pub fn new(work_root: &Path, max_output: usize) -> Result<Self, ConfigError> {
        let lossy = work_root.to_string_lossy();
        let trimmed = lossy.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidWorkRoot {
                path: work_root.display().to_string(),
                reason: "the filesystem root cannot be a work root".to_string(),
            });
        }
        let root = regex::escape(trimmed);
        let job = format!("{root}/{}[A-Za-z0-9_]+", regex::escape(JOB_PREFIX));

        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| ConfigError::InvalidWorkRoot {
                path: work_root.display().to_string(),
                reason: e.to_string(),
            })
        };

        let rules = vec![
            // Inside the job: `<root>/job-x/source.c` -> `source.c`.
            (compile(format!("{job}/"))?, ""),
            (compile(job)?, "."),
            // The root itself, but not `<root>suffix` siblings.
            (compile(format!(r"{root}(/|[^A-Za-z0-9._\-]|$)"))?, ".${1}"),
            (SOURCE_PATH_RE.clone(), "${1}${2}"),
            (KEYED_ID_RE.clone(), "${1}=<ID>"),
            (CONTAINER_KEY_RE.clone(), "${1}=<ID>"),
            (CONTAINER_ID_RE.clone(), "<ID>"),
            (SYSTEM_PATH_RE.clone(), "${1}<SYSTEM>"),
            (ADDRESS_RE.clone(), "<ADDR>"),
            (TIMESTAMP_RE.clone(), "<TIMESTAMP>"),
            (BLANK_RUN_RE.clone(), "\n\n"),
        ];

        Ok(Self { rules, max_output })
    }

    /// Apply every rule in order, then the byte ceiling.
    pub fn sanitize(&self, text: &str) -> String {
        self.sanitize_checked(text).0
    }

    /// Like [`Sanitizer::sanitize`], also reporting whether the ceiling cut
    /// the text.
    pub fn sanitize_checked(&self, text: &str) -> (String, bool) {
        let mut out = text.to_string();
        for (pattern, replacement) in &self.rules {
            let replaced = pattern.replace_all(&out, *replacement).into_owned();
            out = replaced;
        }
        truncate(out, self.max_output)
    }
}

/// Cut `text` to at most `max` bytes on a char boundary, appending the marker.
fn truncate(mut text: String, max: usize) -> (String, bool) {
    if text.len() <= max {
        return (text, false);
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_MARKER);
    (text, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(Path::new("/var/lib/cc_jail/work"), 1024).unwrap()
    }

    #[test]
    fn test_job_paths_become_relative() {
        let s = sanitizer();
        let text = "/var/lib/cc_jail/work/job-a1B2c3/source.c:3:5: error: boom";
        assert_eq!(s.sanitize(text), "source.c:3:5: error: boom");

        let text = "cd /var/lib/cc_jail/work/job-a1B2c3 failed";
        assert_eq!(s.sanitize(text), "cd . failed");
    }

    #[test]
    fn test_foreign_source_paths_keep_file_name() {
        let s = sanitizer();
        assert_eq!(
            s.sanitize("In file included from /home/alice/project/util.hpp:4:"),
            "In file included from util.hpp:4:"
        );
        assert_eq!(
            s.sanitize("/usr/include/stdio.h:12:1: note: here"),
            "stdio.h:12:1: note: here"
        );
        // Relative paths are left alone.
        assert_eq!(s.sanitize("src/lib/a.c:1:1"), "src/lib/a.c:1:1");
    }

    #[test]
    fn test_system_directories() {
        let s = sanitizer();
        assert_eq!(
            s.sanitize("search starts here: /usr/lib/llvm-18/lib/clang/18/include"),
            "search starts here: <SYSTEM>"
        );
        assert_eq!(s.sanitize(" /opt/llvm/lib/libLLVM.so"), " <SYSTEM>");
    }

    #[test]
    fn test_identifiers() {
        let s = sanitizer();
        assert_eq!(s.sanitize("pid=4242 uid: 1000"), "pid=<ID> uid=<ID>");
        let cid = "a".repeat(64);
        assert_eq!(s.sanitize(&format!("container {cid} died")), "container <ID> died");
    }

    #[test]
    fn test_identifier_words_in_code_untouched() {
        let s = sanitizer();
        for text in [
            "RecordDecl <ADDR> <line:1:1, col:8> col:8 struct pid definition",
            "    3 |     pid = fork();",
            "note: the uid field was declared here",
            "warning: unused variable 'tid' [-Wunused-variable]",
        ] {
            assert_eq!(s.sanitize(text), text);
        }
        assert_eq!(
            s.sanitize("container_id: 9f86d081 ready"),
            "container_id=<ID> ready"
        );
    }

    #[test]
    fn test_root_prefix_siblings_untouched() {
        let s = Sanitizer::new(Path::new("/srv/jail"), 1024).unwrap();
        assert_eq!(
            s.sanitize("mount /srv/jailbreak/data failed"),
            "mount /srv/jailbreak/data failed"
        );
        assert_eq!(s.sanitize("cd /srv/jail: denied"), "cd .: denied");
        assert_eq!(s.sanitize("/srv/jail/other/x"), "./other/x");
        assert_eq!(s.sanitize("in /srv/jail"), "in .");
    }

    #[test]
    fn test_filesystem_root_rejected() {
        let err = Sanitizer::new(Path::new("/"), 1024).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkRoot { .. }));
        assert!(Sanitizer::new(Path::new("//"), 1024).is_err());
    }

    #[test]
    fn test_addresses_and_timestamps() {
        let s = sanitizer();
        assert_eq!(
            s.sanitize("FunctionDecl 0x55d5c8a1b2c8 <line:1:1> main"),
            "FunctionDecl <ADDR> <line:1:1> main"
        );
        // Short hex literals are code, not addresses.
        assert_eq!(s.sanitize("int x = 0xff;"), "int x = 0xff;");
        assert_eq!(
            s.sanitize("built 2024-05-01T12:30:00.123Z ok"),
            "built <TIMESTAMP> ok"
        );
    }

    #[test]
    fn test_blank_runs_collapse() {
        assert_eq!(sanitizer().sanitize("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_ceiling_respects_char_boundary() {
        let s = Sanitizer::new(Path::new("/w"), 5).unwrap();
        let (text, truncated) = s.sanitize_checked("abcdé and more");
        assert!(truncated);
        assert_eq!(text, format!("abcd{TRUNCATION_MARKER}"));

        let (text, truncated) = s.sanitize_checked("abc");
        assert!(!truncated);
        assert_eq!(text, "abc");
    }

    #[test]
    fn test_idempotent() {
        let s = sanitizer();
        let raw = "/var/lib/cc_jail/work/job-x9/source.cpp:1:2: warning: 0xdeadbeef00 at 2024-01-01 00:00:00";
        let once = s.sanitize(raw);
        assert_eq!(s.sanitize(&once), once);
    }
}
