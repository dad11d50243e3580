//! A toolchain invocation ready for execution.
//!
//! `PreparedInvocation` is only built by the execution manager, after the
//! request has been validated, the argument vector assembled and the job
//! directory populated. Nothing else in the crate starts a process.

use crate::error::ExecError;
use crate::isolation::Isolation;
use crate::limits::ResourceLimits;
use crate::output::ExecutionResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

const READ_CHUNK: usize = 8192;

/// A validated invocation bound to one job directory.
#[derive(Debug, Clone)]
pub struct PreparedInvocation {
    pub(crate) compiler: PathBuf,
    pub(crate) argv: Vec<String>,
    pub(crate) workdir: PathBuf,
    pub(crate) env: HashMap<String, String>,
    pub(crate) limits: ResourceLimits,
    pub(crate) isolation: Isolation,
    pub(crate) timeout: Duration,
}

impl PreparedInvocation {
    /// Run the invocation to completion.
    ///
    /// Each stream is kept up to `limits.max_output` bytes. Anything beyond
    /// that is read and discarded so the child never blocks on a full pipe,
    /// and the result is marked truncated.
    ///
    /// # Errors
    ///
    /// - `ExecError::SpawnFailed` if the process couldn't be started
    /// - `ExecError::Timeout` if the process outlived `timeout`; the whole
    ///   process group is killed before this returns
    pub async fn spawn(self) -> Result<ExecutionResult, ExecError> {
        let start = Instant::now();
        let limits = self.limits;

        let mut cmd = self
            .isolation
            .command(&self.compiler, &self.argv, &self.workdir, &self.env);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .process_group(0)
            .kill_on_drop(true);

        // SAFETY: the closure only calls getrlimit/setrlimit, which are
        // async-signal-safe, and touches no shared state.
        unsafe {
            cmd.pre_exec(move || limits.apply());
        }

        let mut child = cmd.spawn().map_err(|e| ExecError::SpawnFailed {
            reason: e.to_string(),
        })?;
        let pgid = child.id();

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            return Err(ExecError::Internal {
                reason: "child pipes were not captured".to_string(),
            });
        };

        let run = async {
            let (out, err) = tokio::join!(
                read_capped(&mut stdout, limits.max_output),
                read_capped(&mut stderr, limits.max_output),
            );
            let status = child.wait().await;
            (out, err, status)
        };

        let outcome = timeout(self.timeout, run).await;
        match outcome {
            Ok((out, err, status)) => {
                let (stdout, stdout_truncated) = out.map_err(|e| ExecError::Internal {
                    reason: format!("stdout read error: {e}"),
                })?;
                let (stderr, stderr_truncated) = err.map_err(|e| ExecError::Internal {
                    reason: format!("stderr read error: {e}"),
                })?;
                let status = status.map_err(|e| ExecError::Internal {
                    reason: format!("wait error: {e}"),
                })?;

                Ok(ExecutionResult {
                    stdout,
                    stderr,
                    status,
                    duration: start.elapsed(),
                    stdout_truncated,
                    stderr_truncated,
                })
            }
            Err(_) => {
                let elapsed = start.elapsed();
                if let Some(pid) = pgid {
                    kill_group(pid);
                }
                let _ = child.kill().await;
                tracing::warn!(
                    limit_ms = self.timeout.as_millis() as u64,
                    "toolchain process timed out and was killed"
                );
                Err(ExecError::Timeout {
                    limit: self.timeout,
                    elapsed,
                })
            }
        }
    }

    /// Get the compiler path.
    pub fn compiler(&self) -> &PathBuf {
        &self.compiler
    }

    /// Get the compiler arguments.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Get the job directory.
    pub fn workdir(&self) -> &PathBuf {
        &self.workdir
    }
}

/// Read a stream to EOF, keeping at most `max` bytes.
async fn read_capped<R>(reader: &mut R, max: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok((kept, truncated));
        }
        let room = max.saturating_sub(kept.len());
        if n > room {
            truncated = true;
        }
        kept.extend_from_slice(&buf[..n.min(room)]);
    }
}

/// SIGKILL every process in the group led by `pid`.
fn kill_group(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill has no memory-safety preconditions; a stale group id
    // only yields ESRCH.
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_policy::EnvPolicy;

    fn shell(script: &str, timeout: Duration, max_output: usize) -> PreparedInvocation {
        PreparedInvocation {
            compiler: PathBuf::from("/bin/sh"),
            argv: vec!["-c".to_string(), script.to_string()],
            workdir: std::env::temp_dir(),
            env: EnvPolicy::default().apply(),
            limits: ResourceLimits::default().with_max_output(max_output),
            isolation: Isolation::Unconfined,
            timeout,
        }
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let result = shell("echo out; echo err >&2; exit 3", Duration::from_secs(5), 1024)
            .spawn()
            .await
            .unwrap();
        assert_eq!(result.stdout_string(), "out\n");
        assert_eq!(result.stderr_string(), "err\n");
        assert_eq!(result.code(), 3);
        assert!(!result.truncated());
    }

    #[tokio::test]
    async fn test_output_is_truncated_not_failed() {
        let result = shell(
            "i=0; while [ $i -lt 2000 ]; do echo 0123456789; i=$((i+1)); done; exit 0",
            Duration::from_secs(10),
            100,
        )
        .spawn()
        .await
        .unwrap();
        assert!(result.success());
        assert!(result.stdout_truncated);
        assert!(!result.stderr_truncated);
        assert_eq!(result.stdout.len(), 100);
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let start = Instant::now();
        let err = shell("sleep 30", Duration::from_millis(200), 1024)
            .spawn()
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_kills_background_children() {
        // The grandchild keeps the pipes open; only a group kill ends it.
        let err = shell("sleep 30 & sleep 30", Duration::from_millis(200), 1024)
            .spawn()
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_environment_is_cleared() {
        std::env::set_var("CC_JAIL_PREPARED_LEAK", "1");
        let result = shell("echo ${CC_JAIL_PREPARED_LEAK:-unset}", Duration::from_secs(5), 1024)
            .spawn()
            .await
            .unwrap();
        assert_eq!(result.stdout_string(), "unset\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let mut inv = shell("true", Duration::from_secs(1), 1024);
        inv.compiler = PathBuf::from("/nonexistent/clang");
        let err = inv.spawn().await.unwrap_err();
        assert!(matches!(err, ExecError::SpawnFailed { .. }));
    }
}
