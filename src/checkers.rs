//! Static analyzer checker catalog.
//!
//! Only identifiers listed here can be passed to `-analyzer-checker`. Package
//! names (`core`, `unix`, ...) enable every checker in that package.

/// Checker packages and individual checkers callers may request.
pub const CHECKER_CATALOG: &[&str] = &[
    // Packages
    "core",
    "cplusplus",
    "deadcode",
    "nullability",
    "security",
    "unix",
    // core
    "core.CallAndMessage",
    "core.DivideZero",
    "core.NonNullParamChecker",
    "core.NullDereference",
    "core.StackAddressEscape",
    "core.UndefinedBinaryOperatorResult",
    "core.VLASize",
    "core.uninitialized.ArraySubscript",
    "core.uninitialized.Assign",
    "core.uninitialized.Branch",
    "core.uninitialized.CapturedBlockVariable",
    "core.uninitialized.UndefReturn",
    // cplusplus
    "cplusplus.InnerPointer",
    "cplusplus.Move",
    "cplusplus.NewDelete",
    "cplusplus.NewDeleteLeaks",
    // deadcode
    "deadcode.DeadStores",
    // nullability
    "nullability.NullPassedToNonnull",
    "nullability.NullReturnedFromNonnull",
    // security
    "security.FloatLoopCounter",
    "security.insecureAPI.UncheckedReturn",
    "security.insecureAPI.bcmp",
    "security.insecureAPI.bcopy",
    "security.insecureAPI.bzero",
    "security.insecureAPI.getpw",
    "security.insecureAPI.gets",
    "security.insecureAPI.mkstemp",
    "security.insecureAPI.mktemp",
    "security.insecureAPI.rand",
    "security.insecureAPI.strcpy",
    "security.insecureAPI.vfork",
    // unix
    "unix.API",
    "unix.Malloc",
    "unix.MallocSizeof",
    "unix.MismatchedDeallocator",
    "unix.Vfork",
    "unix.cstring.BadSizeArg",
    "unix.cstring.NullArg",
    // alpha (experimental)
    "alpha.core.CastSize",
    "alpha.core.PointerArithm",
    "alpha.core.SizeofPtr",
    "alpha.security.ArrayBoundV2",
    "alpha.security.MallocOverflow",
    "alpha.security.ReturnPtrRange",
    "alpha.unix.Stream",
];

/// Checkers enabled when a C request names none.
pub const DEFAULT_C_CHECKERS: &[&str] = &["core", "deadcode", "security", "unix"];

/// Checkers enabled when a C++ request names none.
pub const DEFAULT_CPP_CHECKERS: &[&str] = &["core", "cplusplus", "deadcode", "security", "unix"];

/// Checker id assigned to findings that carry no bracketed identifier.
pub const UNKNOWN_CHECKER: &str = "unknown";

/// Category of findings that carry no bracketed identifier.
pub const GENERAL_CATEGORY: &str = "general";

pub fn is_known_checker(id: &str) -> bool {
    CHECKER_CATALOG.contains(&id)
}

/// Category derived from the leading namespace segment of a checker id.
pub fn category_for(checker: &str) -> &'static str {
    if checker == UNKNOWN_CHECKER {
        return GENERAL_CATEGORY;
    }
    match checker.split('.').next().unwrap_or_default() {
        "core" => "core",
        "security" => "security",
        "unix" => "unix",
        "deadcode" => "deadcode",
        "cplusplus" => "cplusplus",
        "alpha" => "experimental",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_membership() {
        assert!(is_known_checker("core.NullDereference"));
        assert!(is_known_checker("unix"));
        assert!(!is_known_checker("core.nullDereference"));
        assert!(!is_known_checker("debug.DumpCFG"));
    }

    #[test]
    fn test_defaults_are_in_catalog() {
        for id in DEFAULT_C_CHECKERS.iter().chain(DEFAULT_CPP_CHECKERS) {
            assert!(is_known_checker(id), "{id} missing from catalog");
        }
    }

    #[test]
    fn test_category_for() {
        assert_eq!(category_for("core.DivideZero"), "core");
        assert_eq!(category_for("security.insecureAPI.gets"), "security");
        assert_eq!(category_for("unix.Malloc"), "unix");
        assert_eq!(category_for("deadcode.DeadStores"), "deadcode");
        assert_eq!(category_for("cplusplus.NewDelete"), "cplusplus");
        assert_eq!(category_for("alpha.security.ArrayBoundV2"), "experimental");
        assert_eq!(category_for("nullability.NullPassedToNonnull"), "other");
        assert_eq!(category_for(UNKNOWN_CHECKER), "general");
    }
}
