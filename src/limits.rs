//! Resource limits for toolchain execution.
//!
//! Kernel-enforced limits are applied in the child between `fork` and `exec`
//! and are fixed by configuration; requests cannot raise them.
//!
//! | Limit | Purpose | Default |
//! |-------|---------|---------|
//! | `RLIMIT_DATA` | Memory usage | 1 GiB |
//! | `RLIMIT_CPU` | CPU time | 60 s |
//! | `RLIMIT_FSIZE` | Size of any written file | 64 MiB |
//! | `RLIMIT_NOFILE` | Open file descriptors | 256 |
//! | `RLIMIT_CORE` | Core dump size | 0 |
//! | `RLIMIT_NPROC` | Processes for the user | unset |
//!
//! `RLIMIT_AS` is not used: clang reserves large address ranges it never
//! commits, so `RLIMIT_DATA` is the meaningful memory bound.

use std::io;

/// Default byte ceiling for each captured stream and for sanitized text.
pub const DEFAULT_MAX_OUTPUT: usize = 10 * 1024 * 1024;

/// Resource limits applied during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Data segment ceiling in bytes.
    pub memory_bytes: u64,

    /// CPU seconds before the kernel sends SIGXCPU/SIGKILL.
    pub cpu_secs: u64,

    /// Largest file the process may write, in bytes.
    pub file_size_bytes: u64,

    /// Open file descriptor ceiling.
    pub open_files: u64,

    /// Process ceiling. Counted per real user id, so it is off by default.
    pub max_processes: Option<u64>,

    /// Maximum bytes kept from each of stdout and stderr.
    ///
    /// Excess output is discarded and the result is marked truncated.
    pub max_output: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 1024 * 1024 * 1024,  // 1 GiB
            cpu_secs: 60,
            file_size_bytes: 64 * 1024 * 1024, // 64 MiB
            open_files: 256,
            max_processes: None,
            max_output: DEFAULT_MAX_OUTPUT,
        }
    }
}

impl ResourceLimits {
    /// Set the memory ceiling.
    pub fn with_memory_bytes(mut self, bytes: u64) -> Self {
        self.memory_bytes = bytes;
        self
    }

    /// Set the CPU time ceiling.
    pub fn with_cpu_secs(mut self, secs: u64) -> Self {
        self.cpu_secs = secs;
        self
    }

    /// Set the per-stream output ceiling.
    pub fn with_max_output(mut self, max: usize) -> Self {
        self.max_output = max;
        self
    }

    /// Set the process ceiling.
    pub fn with_max_processes(mut self, max: u64) -> Self {
        self.max_processes = Some(max);
        self
    }

    /// Apply the kernel limits to the calling process.
    ///
    /// Runs inside `pre_exec`, so it only calls async-signal-safe functions.
    pub(crate) fn apply(&self) -> io::Result<()> {
        set_rlimit(libc::RLIMIT_DATA, self.memory_bytes)?;
        set_rlimit(libc::RLIMIT_CPU, self.cpu_secs)?;
        set_rlimit(libc::RLIMIT_FSIZE, self.file_size_bytes)?;
        set_rlimit(libc::RLIMIT_NOFILE, self.open_files)?;
        set_rlimit(libc::RLIMIT_CORE, 0)?;
        if let Some(nproc) = self.max_processes {
            set_rlimit(libc::RLIMIT_NPROC, nproc)?;
        }
        Ok(())
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type Resource = libc::__rlimit_resource_t;

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
type Resource = libc::c_int;

/// Lower both soft and hard limit to `limit`, never above the current hard limit.
fn set_rlimit(resource: Resource, limit: u64) -> io::Result<()> {
    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: current is a valid out-pointer and resource is a libc constant.
    if unsafe { libc::getrlimit(resource, &mut current) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let target = (limit as libc::rlim_t).min(current.rlim_max);
    let rlim = libc::rlimit {
        rlim_cur: target,
        rlim_max: target,
    };
    // SAFETY: rlim is a valid rlimit and resource is a libc constant.
    if unsafe { libc::setrlimit(resource, &rlim) } != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_output, 10 * 1024 * 1024);
        assert_eq!(limits.cpu_secs, 60);
        assert!(limits.max_processes.is_none());
    }

    #[test]
    fn test_builders() {
        let limits = ResourceLimits::default()
            .with_memory_bytes(1 << 20)
            .with_cpu_secs(5)
            .with_max_output(100)
            .with_max_processes(32);
        assert_eq!(limits.memory_bytes, 1 << 20);
        assert_eq!(limits.cpu_secs, 5);
        assert_eq!(limits.max_output, 100);
        assert_eq!(limits.max_processes, Some(32));
    }
}
