//! Environment variable policy.
//!
//! The toolchain never inherits the service's environment. It gets a small
//! fixed set of variables; some variables are always stripped regardless of
//! policy.

use std::collections::HashMap;

/// Environment variables that are ALWAYS stripped, even from a `Fixed` policy.
///
/// These change what the compiler driver loads, searches or executes.
pub const ALWAYS_STRIP: &[&str] = &[
    // Library injection
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "LD_DEBUG",
    "LD_PROFILE",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "DYLD_FRAMEWORK_PATH",
    "DYLD_FALLBACK_LIBRARY_PATH",
    // Driver behaviour
    "CCC_OVERRIDE_OPTIONS",
    "COMPILER_PATH",
    "GCC_EXEC_PREFIX",
    "LIBRARY_PATH",
    // Header search
    "CPATH",
    "C_INCLUDE_PATH",
    "CPLUS_INCLUDE_PATH",
    "OBJC_INCLUDE_PATH",
    // Dependency output written to arbitrary paths
    "DEPENDENCIES_OUTPUT",
    "SUNPRO_DEPENDENCIES",
    // Proxy hijacking
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
];

/// `PATH` handed to the toolchain under the default policy.
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Policy for the toolchain's environment.
#[derive(Debug, Clone, Default)]
pub enum EnvPolicy {
    /// `PATH` plus the C locale (default).
    ///
    /// The C locale keeps diagnostics in untranslated English so they parse.
    #[default]
    Minimal,

    /// Pass a fixed set of environment variables.
    ///
    /// ALWAYS_STRIP is still applied.
    Fixed(HashMap<String, String>),
}

impl EnvPolicy {
    /// Produce the environment to pass to the toolchain.
    pub fn apply(&self) -> HashMap<String, String> {
        let mut result = match self {
            EnvPolicy::Minimal => {
                let mut env = HashMap::new();
                env.insert("PATH".to_string(), DEFAULT_PATH.to_string());
                env.insert("LANG".to_string(), "C".to_string());
                env.insert("LC_ALL".to_string(), "C".to_string());
                env
            }
            EnvPolicy::Fixed(fixed) => fixed.clone(),
        };

        for key in ALWAYS_STRIP {
            result.remove(*key);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_policy() {
        let env = EnvPolicy::Minimal.apply();
        assert_eq!(env.get("LC_ALL").map(String::as_str), Some("C"));
        assert_eq!(env.get("PATH").map(String::as_str), Some(DEFAULT_PATH));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn test_fixed_policy_strips_dangerous() {
        let mut fixed = HashMap::new();
        fixed.insert("PATH".to_string(), "/usr/bin".to_string());
        fixed.insert("CCC_OVERRIDE_OPTIONS".to_string(), "+-load".to_string());
        fixed.insert("LD_PRELOAD".to_string(), "/tmp/evil.so".to_string());
        fixed.insert("CPATH".to_string(), "/etc".to_string());

        let env = EnvPolicy::Fixed(fixed).apply();
        assert_eq!(env.len(), 1);
        assert!(env.contains_key("PATH"));
    }
}
