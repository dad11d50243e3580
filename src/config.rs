//! Jail configuration.
//!
//! `JailConfig` is built once at startup through [`JailConfig::builder()`] or
//! [`JailConfig::from_env()`]. Binary paths are resolved and checked, and the
//! work root is created, when the builder is built; a `JailConfig` that exists
//! is usable.

use crate::env_policy::{EnvPolicy, DEFAULT_PATH};
use crate::error::ConfigError;
use crate::file_check::{find_compiler, resolve_binary};
use crate::isolation::Isolation;
use crate::limits::ResourceLimits;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ceiling on simultaneous toolchain processes.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Default time a request may wait for a free slot.
pub const DEFAULT_QUEUE_WAIT: Duration = Duration::from_secs(30);

/// Default location of bubblewrap.
pub const DEFAULT_BWRAP: &str = "/usr/bin/bwrap";

/// Prefix of every environment variable read by [`JailConfig::from_env`].
pub const ENV_PREFIX: &str = "CC_JAIL_";

/// Validated jail configuration.
#[derive(Debug, Clone)]
pub struct JailConfig {
    /// Canonical path of the clang driver.
    pub(crate) compiler: PathBuf,

    /// Canonical directory under which job directories are created.
    pub(crate) work_root: PathBuf,

    pub(crate) isolation: Isolation,

    pub(crate) max_concurrent: usize,

    pub(crate) queue_wait: Duration,

    pub(crate) limits: ResourceLimits,

    pub(crate) env_policy: EnvPolicy,
}

impl JailConfig {
    /// Create a new configuration builder.
    pub fn builder() -> JailConfigBuilder {
        JailConfigBuilder::new()
    }

    /// Defaults overlaid with `CC_JAIL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        JailConfigBuilder::from_env()?.build()
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn isolation(&self) -> &Isolation {
        &self.isolation
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn queue_wait(&self) -> Duration {
        self.queue_wait
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

/// Builder for `JailConfig`.
#[derive(Debug, Clone)]
pub struct JailConfigBuilder {
    /// Compiler path; searched on [`DEFAULT_PATH`] when unset.
    compiler: Option<PathBuf>,

    /// Work root; a `cc_jail` directory under the system temp dir when unset.
    work_root: Option<PathBuf>,

    isolation: Isolation,

    max_concurrent: usize,

    queue_wait: Duration,

    limits: ResourceLimits,

    env_policy: EnvPolicy,
}

impl JailConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            compiler: None,
            work_root: None,
            isolation: Isolation::bubblewrap(DEFAULT_BWRAP),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            queue_wait: DEFAULT_QUEUE_WAIT,
            limits: ResourceLimits::default(),
            env_policy: EnvPolicy::default(),
        }
    }

    /// Builder seeded from `CC_JAIL_*` variables of this process.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new().overlay(|key| std::env::var(key).ok())
    }

    /// Apply `CC_JAIL_*` settings looked up through `lookup`.
    ///
    /// Recognised keys (without the prefix): `COMPILER`, `WORK_ROOT`,
    /// `ISOLATION` (`bubblewrap` or `unconfined`), `BWRAP`, `MAX_CONCURRENT`,
    /// `QUEUE_WAIT_SECS`, `MEMORY_MB`, `CPU_SECS`, `MAX_OUTPUT_BYTES`.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        if let Some(path) = get("COMPILER") {
            self = self.compiler(path);
        }
        if let Some(path) = get("WORK_ROOT") {
            self = self.work_root(path);
        }
        match get("ISOLATION").as_deref() {
            None => {}
            Some("unconfined") => self = self.isolation(Isolation::Unconfined),
            Some("bubblewrap") => {
                let bwrap = get("BWRAP").unwrap_or_else(|| DEFAULT_BWRAP.to_string());
                self = self.isolation(Isolation::bubblewrap(bwrap));
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "CC_JAIL_ISOLATION",
                    reason: format!("'{other}' is not one of: bubblewrap, unconfined"),
                })
            }
        }
        if let Some(v) = get("MAX_CONCURRENT") {
            self = self.max_concurrent(parse_num("CC_JAIL_MAX_CONCURRENT", &v)?);
        }
        if let Some(v) = get("QUEUE_WAIT_SECS") {
            self = self.queue_wait(Duration::from_secs(parse_num("CC_JAIL_QUEUE_WAIT_SECS", &v)?));
        }
        if let Some(v) = get("MEMORY_MB") {
            let mb: u64 = parse_num("CC_JAIL_MEMORY_MB", &v)?;
            self.limits = self.limits.with_memory_bytes(mb.saturating_mul(1024 * 1024));
        }
        if let Some(v) = get("CPU_SECS") {
            self.limits = self.limits.with_cpu_secs(parse_num("CC_JAIL_CPU_SECS", &v)?);
        }
        if let Some(v) = get("MAX_OUTPUT_BYTES") {
            self.limits = self.limits.with_max_output(parse_num("CC_JAIL_MAX_OUTPUT_BYTES", &v)?);
        }
        Ok(self)
    }

    /// Set the clang driver path. Must be absolute.
    pub fn compiler(mut self, path: impl Into<PathBuf>) -> Self {
        self.compiler = Some(path.into());
        self
    }

    /// Set the work root. Created if missing.
    pub fn work_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_root = Some(path.into());
        self
    }

    /// Set the isolation backend.
    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the concurrency ceiling.
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set how long a request may wait for a slot.
    pub fn queue_wait(mut self, wait: Duration) -> Self {
        self.queue_wait = wait;
        self
    }

    /// Set resource limits.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set maximum bytes kept per output stream.
    pub fn max_output(mut self, max: usize) -> Self {
        self.limits.max_output = max;
        self
    }

    /// Set the environment policy.
    pub fn env_policy(mut self, policy: EnvPolicy) -> Self {
        self.env_policy = policy;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - no compiler was given and none is found on the default `PATH`
    /// - the compiler or bubblewrap binary is not an absolute path to a
    ///   regular executable
    /// - the work root cannot be created or resolved
    /// - the concurrency ceiling or output limit is zero
    pub fn build(self) -> Result<JailConfig, ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.limits.max_output == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_output",
                reason: "must be at least 1".to_string(),
            });
        }

        let compiler = match self.compiler {
            Some(path) => resolve_binary(&path)?,
            None => find_compiler(DEFAULT_PATH).ok_or_else(|| ConfigError::BinNotFound {
                path: format!("clang (searched {DEFAULT_PATH})"),
            })?,
        };

        let isolation = match self.isolation {
            Isolation::Bubblewrap { bwrap, ro_binds } => Isolation::Bubblewrap {
                bwrap: resolve_binary(&bwrap)?,
                ro_binds,
            },
            Isolation::Unconfined => Isolation::Unconfined,
        };

        let work_root = self
            .work_root
            .unwrap_or_else(|| std::env::temp_dir().join("cc_jail"));
        let work_root = prepare_work_root(&work_root)?;

        Ok(JailConfig {
            compiler,
            work_root,
            isolation,
            max_concurrent: self.max_concurrent,
            queue_wait: self.queue_wait,
            limits: self.limits,
            env_policy: self.env_policy,
        })
    }
}

impl Default for JailConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the work root if needed and return its canonical path.
///
/// The canonical form matters: toolchain output names job directories by
/// their resolved path, and the sanitizer must match it.
fn prepare_work_root(path: &Path) -> Result<PathBuf, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidWorkRoot {
        path: path.display().to_string(),
        reason,
    };

    if !path.is_absolute() {
        return Err(invalid("must be absolute".to_string()));
    }
    std::fs::create_dir_all(path).map_err(|e| invalid(e.to_string()))?;
    let canonical = std::fs::canonicalize(path).map_err(|e| invalid(e.to_string()))?;
    if !canonical.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    if canonical.parent().is_none() {
        return Err(invalid("the filesystem root cannot be a work root".to_string()));
    }
    Ok(canonical)
}

fn parse_num<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: format!("'{value}': {e}"),
        })
}
