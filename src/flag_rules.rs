//! Extra compiler flag rules.
//!
//! A flag is accepted only if it matches one of the tagged rules in
//! [`FlagRule`]. There is no deny-list mode: anything unmatched is rejected
//! by name.

use crate::error::Violation;
use crate::options::{LanguageStandard, OptimizationLevel};
use crate::validate::{validate_define, validate_include_path};

/// Flags accepted verbatim.
pub const EXACT_FLAGS: &[&str] = &[
    // Warnings
    "-w",
    "-Wall",
    "-Wextra",
    "-Wpedantic",
    "-pedantic",
    "-Werror",
    // Debug info
    "-g",
    "-g0",
    "-g1",
    "-g2",
    "-g3",
    // Code generation
    "-fPIC",
    "-fPIE",
    "-fpic",
    "-fpie",
    "-pthread",
    "-ffast-math",
    "-fno-exceptions",
    "-fno-rtti",
    "-fno-strict-aliasing",
    "-fwrapv",
];

/// Prefixes accepted without further inspection of the remainder.
pub const OTHER_PREFIXES: &[&str] = &["-L", "-l", "-W", "-f", "-m"];

/// Prefixed flags that are refused even though their prefix is allowed.
///
/// `-Wa,`/`-Wl,`/`-Wp,` forward arbitrary options to the assembler, linker
/// and preprocessor; `-fplugin` and `-fpass-plugin` load shared objects into
/// the compiler.
pub const REFUSED_PREFIXES: &[&str] = &["-Wa,", "-Wl,", "-Wp,", "-fplugin", "-fpass-plugin"];

/// The rule a flag was accepted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagRule {
    /// In [`EXACT_FLAGS`], or an `-O<level>` / `-std=<dialect>` duplicate.
    ExactMatch,
    /// `-D<macro>`, payload revalidated as a define.
    PrefixedDefine,
    /// `-I<dir>`, payload revalidated as an include path.
    PrefixedInclude,
    /// One of [`OTHER_PREFIXES`].
    PrefixedOther(&'static str),
}

fn is_exact(flag: &str) -> bool {
    if EXACT_FLAGS.contains(&flag) {
        return true;
    }
    if OptimizationLevel::ALL.iter().any(|o| o.flag() == flag) {
        return true;
    }
    LanguageStandard::ALL.iter().any(|s| s.flag() == flag)
}

/// Validate a single flag and report which rule admitted it.
pub fn check_flag(flag: &str) -> Result<FlagRule, Violation> {
    let not_allowed = || Violation::FlagNotAllowed {
        flag: flag.to_string(),
    };

    if is_exact(flag) {
        return Ok(FlagRule::ExactMatch);
    }

    if let Some(payload) = flag.strip_prefix("-D") {
        return validate_define(payload)
            .into_result()
            .map(|_| FlagRule::PrefixedDefine)
            .map_err(|source| Violation::FlagPayloadRejected {
                flag: flag.to_string(),
                source: Box::new(source),
            });
    }

    if let Some(payload) = flag.strip_prefix("-I") {
        return validate_include_path(payload)
            .into_result()
            .map(|_| FlagRule::PrefixedInclude)
            .map_err(|source| Violation::FlagPayloadRejected {
                flag: flag.to_string(),
                source: Box::new(source),
            });
    }

    if REFUSED_PREFIXES.iter().any(|p| flag.starts_with(p)) {
        return Err(not_allowed());
    }

    OTHER_PREFIXES
        .iter()
        .copied()
        .find(|p| flag.len() > p.len() && flag.starts_with(p))
        .map(FlagRule::PrefixedOther)
        .ok_or_else(not_allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_flags() {
        assert_eq!(check_flag("-Wall"), Ok(FlagRule::ExactMatch));
        assert_eq!(check_flag("-O3"), Ok(FlagRule::ExactMatch));
        assert_eq!(check_flag("-std=c11"), Ok(FlagRule::ExactMatch));
        assert_eq!(check_flag("-pthread"), Ok(FlagRule::ExactMatch));
    }

    #[test]
    fn test_prefixed_define_revalidated() {
        assert_eq!(check_flag("-DDEBUG=1"), Ok(FlagRule::PrefixedDefine));
        assert!(matches!(
            check_flag("-D1BAD"),
            Err(Violation::FlagPayloadRejected { flag, .. }) if flag == "-D1BAD"
        ));
        assert!(matches!(
            check_flag("-DX=$(rm -rf /)"),
            Err(Violation::FlagPayloadRejected { .. })
        ));
        // Bare -D has no macro
        assert!(check_flag("-D").is_err());
    }

    #[test]
    fn test_prefixed_include_revalidated() {
        assert_eq!(check_flag("-Iinclude/sub"), Ok(FlagRule::PrefixedInclude));
        match check_flag("-I../../etc") {
            Err(Violation::FlagPayloadRejected { source, .. }) => {
                assert!(matches!(*source, Violation::IncludeTraversal { .. }));
            }
            other => panic!("expected traversal rejection, got {other:?}"),
        }
        assert!(check_flag("-I/usr/include").is_err());
        assert!(check_flag("-I~/secrets").is_err());
    }

    #[test]
    fn test_other_prefixes() {
        assert_eq!(check_flag("-lm"), Ok(FlagRule::PrefixedOther("-l")));
        assert_eq!(check_flag("-Wshadow"), Ok(FlagRule::PrefixedOther("-W")));
        assert_eq!(check_flag("-fno-inline"), Ok(FlagRule::PrefixedOther("-f")));
        assert_eq!(check_flag("-march=native"), Ok(FlagRule::PrefixedOther("-m")));
    }

    #[test]
    fn test_unknown_flags_rejected_by_name() {
        for flag in ["-o", "-ooutput", "--output=x", "-Xclang", "-include", "-E", "", "x"] {
            assert_eq!(
                check_flag(flag),
                Err(Violation::FlagNotAllowed {
                    flag: flag.to_string()
                }),
                "{flag:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_passthrough_and_plugins_refused() {
        assert!(check_flag("-Wl,-rpath,/tmp").is_err());
        assert!(check_flag("-Wa,--defsym").is_err());
        assert!(check_flag("-fplugin=/tmp/evil.so").is_err());
        assert!(check_flag("-fpass-plugin=/tmp/evil.so").is_err());
    }

    #[test]
    fn test_bare_prefix_rejected() {
        assert!(check_flag("-W").is_err());
        assert!(check_flag("-f").is_err());
    }
}
