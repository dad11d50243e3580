//! Isolation backends.
//!
//! The jail does not implement a sandbox. It wraps the toolchain invocation in
//! an existing isolation primitive:
//!
//! - [`Isolation::Bubblewrap`] runs clang under `bwrap` in fresh namespaces:
//!   no network, read-only system directories, a private `/tmp`, and the job
//!   directory as the only writable bind.
//! - [`Isolation::Unconfined`] runs clang directly. Resource limits, the
//!   cleared environment and the timeout still apply, but there is no network
//!   or filesystem isolation. Use it for development and tests only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// System directories mounted read-only inside the bubblewrap sandbox.
///
/// Entries that do not exist on the host are skipped.
pub const DEFAULT_RO_BINDS: &[&str] = &[
    "/usr",
    "/bin",
    "/sbin",
    "/lib",
    "/lib32",
    "/lib64",
    "/etc/alternatives",
    "/etc/ld.so.cache",
    "/etc/ld.so.conf",
    "/etc/ld.so.conf.d",
];

/// How the toolchain process is isolated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// Namespace sandbox through bubblewrap.
    Bubblewrap {
        /// Absolute path to the `bwrap` binary.
        bwrap: PathBuf,
        /// Host paths mounted read-only at the same location.
        ro_binds: Vec<PathBuf>,
    },

    /// Direct execution with resource limits only.
    Unconfined,
}

impl Isolation {
    /// Bubblewrap with the default read-only mounts.
    pub fn bubblewrap(bwrap: impl Into<PathBuf>) -> Self {
        Isolation::Bubblewrap {
            bwrap: bwrap.into(),
            ro_binds: DEFAULT_RO_BINDS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Short name used in logs and configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Isolation::Bubblewrap { .. } => "bubblewrap",
            Isolation::Unconfined => "unconfined",
        }
    }

    /// The program and arguments that run `compiler argv` under this backend.
    ///
    /// `extra_ro` are additional host paths the toolchain needs to read, such
    /// as the compiler's own installation prefix.
    pub fn wrap(
        &self,
        compiler: &Path,
        argv: &[String],
        workdir: &Path,
        extra_ro: &[PathBuf],
    ) -> (PathBuf, Vec<String>) {
        match self {
            Isolation::Unconfined => (compiler.to_path_buf(), argv.to_vec()),
            Isolation::Bubblewrap { bwrap, ro_binds } => {
                let mut args: Vec<String> = [
                    "--die-with-parent",
                    "--new-session",
                    "--unshare-all",
                    "--proc",
                    "/proc",
                    "--dev",
                    "/dev",
                    "--tmpfs",
                    "/tmp",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect();

                for path in ro_binds.iter().chain(extra_ro) {
                    let p = path.display().to_string();
                    args.push("--ro-bind-try".to_string());
                    args.push(p.clone());
                    args.push(p);
                }

                // Same path inside and out, so diagnostics name the job dir
                // the sanitizer knows about.
                let dir = workdir.display().to_string();
                args.extend([
                    "--bind".to_string(),
                    dir.clone(),
                    dir.clone(),
                    "--chdir".to_string(),
                    dir,
                    "--".to_string(),
                    compiler.display().to_string(),
                ]);
                args.extend(argv.iter().cloned());

                (bwrap.clone(), args)
            }
        }
    }

    /// Build the tokio command for `compiler argv` inside `workdir`.
    pub(crate) fn command(
        &self,
        compiler: &Path,
        argv: &[String],
        workdir: &Path,
        env: &HashMap<String, String>,
    ) -> Command {
        let extra_ro: Vec<PathBuf> = compiler_prefix(compiler).into_iter().collect();
        let (program, args) = self.wrap(compiler, argv, workdir, &extra_ro);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(workdir)
            .env_clear()
            .envs(env);
        cmd
    }
}

/// Installation prefix of a compiler outside the default mounts,
/// e.g. `/opt/llvm-18` for `/opt/llvm-18/bin/clang`.
fn compiler_prefix(compiler: &Path) -> Option<PathBuf> {
    let prefix = compiler.parent()?.parent()?;
    let covered = DEFAULT_RO_BINDS
        .iter()
        .any(|bind| prefix.starts_with(bind) || Path::new(bind).starts_with(prefix));
    if covered {
        None
    } else {
        Some(prefix.to_path_buf())
    }
}
