//! Execution environment manager.
//!
//! Owns the concurrency ceiling and turns an argument vector into a finished
//! [`ExecutionResult`]: admission, job directory, isolated launch, capture,
//! teardown. Every exit path removes the job directory before the slot is
//! released.

use crate::error::ExecError;
use crate::isolation::Isolation;
use crate::limits::ResourceLimits;
use crate::options::LanguageFamily;
use crate::output::ExecutionResult;
use crate::prepared::PreparedInvocation;
use crate::workdir::WorkDir;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Upper bound on how long teardown may block before it is abandoned to
/// the background and logged.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// One unit of work handed to the manager.
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    /// Validated source text.
    pub source: &'a str,
    /// Selects `source.c` or `source.cpp`.
    pub family: LanguageFamily,
    /// Wall-clock limit for the toolchain process.
    pub timeout: Duration,
}

/// Result of a finished job, captured before the directory was removed.
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Raw process result.
    pub result: ExecutionResult,
    /// Path the job ran in. It no longer exists; the sanitizer uses it.
    pub workdir: PathBuf,
    /// File names present in the job directory after the run, source excluded.
    pub produced: Vec<String>,
    /// Time spent waiting for a slot.
    pub queued: Duration,
}

/// Runs toolchain jobs under a fixed concurrency ceiling.
#[derive(Debug, Clone)]
pub struct ExecutionManager {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    queue_wait: Duration,
    work_root: PathBuf,
    compiler: PathBuf,
    isolation: Isolation,
    limits: ResourceLimits,
    env: HashMap<String, String>,
}

impl ExecutionManager {
    /// Build a manager. `max_concurrent` must be at least 1.
    pub fn new(
        max_concurrent: usize,
        queue_wait: Duration,
        work_root: PathBuf,
        compiler: PathBuf,
        isolation: Isolation,
        limits: ResourceLimits,
        env: HashMap<String, String>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            queue_wait,
            work_root,
            compiler,
            isolation,
            limits,
            env,
        }
    }

    /// Number of jobs currently holding a slot.
    pub fn live_executions(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }

    /// Configured ceiling.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Root under which job directories are created.
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Output ceiling applied to captured streams.
    pub fn max_output(&self) -> usize {
        self.limits.max_output
    }

    /// Run one job.
    ///
    /// `build_argv` receives the source file and the job directory and returns
    /// the compiler arguments.
    ///
    /// # Errors
    ///
    /// - `ExecError::ResourceExhausted` if no slot frees within the queue wait
    /// - `ExecError::WorkDirFailed` if the job directory can't be prepared
    ///   after one retry
    /// - anything [`PreparedInvocation::spawn`] returns
    pub async fn execute<F>(&self, job: Job<'_>, build_argv: F) -> Result<JobOutput, ExecError>
    where
        F: FnOnce(&Path, &Path) -> Vec<String>,
    {
        let queued_at = Instant::now();
        let permit = match tokio::time::timeout(
            self.queue_wait,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(ExecError::Internal {
                    reason: "execution gate closed".to_string(),
                })
            }
            Err(_) => {
                warn!(
                    max_concurrent = self.max_concurrent,
                    waited_ms = queued_at.elapsed().as_millis() as u64,
                    "no execution slot freed in time"
                );
                return Err(ExecError::ResourceExhausted {
                    waited: self.queue_wait,
                    max_concurrent: self.max_concurrent,
                });
            }
        };
        let queued = queued_at.elapsed();

        let workdir = self.create_workdir(job)?;
        let argv = build_argv(workdir.source_path(), workdir.path());
        debug!(?argv, workdir = %workdir.path().display(), "launching toolchain");

        let invocation = PreparedInvocation {
            compiler: self.compiler.clone(),
            argv,
            workdir: workdir.path().to_path_buf(),
            env: self.env.clone(),
            limits: self.limits,
            isolation: self.isolation.clone(),
            timeout: job.timeout,
        };
        let outcome = invocation.spawn().await;

        let path = workdir.path().to_path_buf();
        let produced = if outcome.is_ok() {
            list_produced(&path, workdir.source_path())
        } else {
            Vec::new()
        };
        teardown(workdir).await;
        drop(permit);

        let result = outcome?;
        debug!(
            exit_code = result.code(),
            duration_ms = result.duration.as_millis() as u64,
            truncated = result.truncated(),
            "toolchain finished"
        );
        Ok(JobOutput {
            result,
            workdir: path,
            produced,
            queued,
        })
    }

    /// Create the job directory, retrying once on failure.
    fn create_workdir(&self, job: Job<'_>) -> Result<WorkDir, ExecError> {
        match WorkDir::create(&self.work_root, job.source, job.family) {
            Ok(dir) => Ok(dir),
            Err(first) => {
                warn!(error = %first, "job directory creation failed, retrying once");
                WorkDir::create(&self.work_root, job.source, job.family).map_err(|e| {
                    ExecError::WorkDirFailed {
                        reason: e.to_string(),
                    }
                })
            }
        }
    }
}

/// Remove the job directory off the async runtime, bounded in time.
async fn teardown(workdir: WorkDir) {
    let path = workdir.path().to_path_buf();
    let removal = tokio::task::spawn_blocking(move || workdir.close());
    match tokio::time::timeout(CLEANUP_TIMEOUT, removal).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => {
            warn!(path = %path.display(), error = %e, "failed to remove job directory");
        }
        Ok(Err(e)) => {
            warn!(path = %path.display(), error = %e, "job directory cleanup task failed");
        }
        Err(_) => {
            warn!(
                path = %path.display(),
                timeout_ms = CLEANUP_TIMEOUT.as_millis() as u64,
                "job directory cleanup still running after timeout"
            );
        }
    }
}

fn list_produced(dir: &Path, source: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path() != source)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_policy::EnvPolicy;
    use tempfile::TempDir;

    fn manager(root: &Path, max: usize, queue_wait: Duration) -> ExecutionManager {
        ExecutionManager::new(
            max,
            queue_wait,
            root.to_path_buf(),
            PathBuf::from("/bin/sh"),
            Isolation::Unconfined,
            ResourceLimits::default(),
            EnvPolicy::default().apply(),
        )
    }

    fn job(timeout: Duration) -> Job<'static> {
        Job {
            source: "int main(void) { return 0; }\n",
            family: LanguageFamily::C,
            timeout,
        }
    }

    fn script(body: &'static str) -> impl FnOnce(&Path, &Path) -> Vec<String> {
        move |_, _| vec!["-c".to_string(), body.to_string()]
    }

    #[tokio::test]
    async fn test_runs_in_workdir_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let m = manager(root.path(), 2, Duration::from_secs(1));

        let out = m
            .execute(job(Duration::from_secs(5)), |source, dir| {
                vec![
                    "-c".to_string(),
                    format!("cat {} && touch {}/output.o", source.display(), dir.display()),
                ]
            })
            .await
            .unwrap();

        assert!(out.result.success());
        assert!(out.result.stdout_string().contains("int main"));
        assert_eq!(out.produced, vec!["output.o".to_string()]);
        assert!(out.workdir.starts_with(root.path()));
        assert!(!out.workdir.exists());
        assert_eq!(m.live_executions(), 0);
    }

    #[tokio::test]
    async fn test_timeout_still_cleans_up() {
        let root = TempDir::new().unwrap();
        let m = manager(root.path(), 1, Duration::from_secs(1));

        let err = m
            .execute(job(Duration::from_millis(200)), script("sleep 30"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
        assert_eq!(m.live_executions(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_is_rejected() {
        let root = TempDir::new().unwrap();
        let m = manager(root.path(), 1, Duration::from_millis(100));

        let busy = m.clone();
        let holder = tokio::spawn(async move {
            busy.execute(job(Duration::from_secs(5)), script("sleep 1")).await
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(m.live_executions(), 1);

        let err = m
            .execute(job(Duration::from_secs(5)), script("true"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecError::ResourceExhausted {
                max_concurrent: 1,
                ..
            }
        ));

        assert!(holder.await.unwrap().is_ok());
        assert_eq!(m.live_executions(), 0);
    }

    #[tokio::test]
    async fn test_missing_work_root_fails_after_retry() {
        let m = manager(Path::new("/nonexistent/cc_jail"), 1, Duration::from_secs(1));
        let err = m
            .execute(job(Duration::from_secs(1)), script("true"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::WorkDirFailed { .. }));
        assert_eq!(m.live_executions(), 0);
    }
}
