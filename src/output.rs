//! Output capture utilities.

use std::process::ExitStatus;
use std::time::Duration;

/// Marker appended to a stream that hit its byte ceiling.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Raw result of one toolchain run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Standard output bytes, at most the configured ceiling.
    pub stdout: Vec<u8>,

    /// Standard error bytes, at most the configured ceiling.
    pub stderr: Vec<u8>,

    /// Exit status of the process.
    pub status: ExitStatus,

    /// Wall-clock time from spawn to exit.
    pub duration: Duration,

    /// Stdout exceeded the ceiling and was cut.
    pub stdout_truncated: bool,

    /// Stderr exceeded the ceiling and was cut.
    pub stderr_truncated: bool,
}

impl ExecutionResult {
    /// Get stdout as a string (lossy UTF-8), with the truncation marker if cut.
    pub fn stdout_string(&self) -> String {
        render(&self.stdout, self.stdout_truncated)
    }

    /// Get stderr as a string (lossy UTF-8), with the truncation marker if cut.
    pub fn stderr_string(&self) -> String {
        render(&self.stderr, self.stderr_truncated)
    }

    /// Whether either stream exceeded the ceiling.
    pub fn truncated(&self) -> bool {
        self.stdout_truncated || self.stderr_truncated
    }

    /// Check if the process exited successfully (code 0).
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code.
    ///
    /// Signal terminations map to `128 + signal`, as a shell would report them.
    pub fn code(&self) -> i32 {
        use std::os::unix::process::ExitStatusExt;
        match self.status.code() {
            Some(code) => code,
            None => 128 + self.status.signal().unwrap_or(0),
        }
    }
}

fn render(bytes: &[u8], truncated: bool) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn result(stdout: &[u8], stderr: &[u8]) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
            status: ExitStatus::from_raw(0),
            duration: Duration::from_millis(1),
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }

    #[test]
    fn test_marker_only_on_truncated_stream() {
        let mut r = result(b"aaaa", b"b");
        r.stdout_truncated = true;
        assert!(r.truncated());
        assert!(r.stdout_string().ends_with(TRUNCATION_MARKER));
        assert_eq!(r.stderr_string(), "b");
    }

    #[test]
    fn test_no_marker_when_complete() {
        let r = result(b"out", b"err");
        assert!(!r.truncated());
        assert_eq!(r.stdout_string(), "out");
        assert_eq!(r.stderr_string(), "err");
        assert!(r.success());
        assert_eq!(r.code(), 0);
    }

    #[test]
    fn test_signal_exit_code() {
        let mut r = result(b"", b"");
        r.status = ExitStatus::from_raw(9); // killed by SIGKILL
        assert_eq!(r.code(), 137);
    }
}
