//! Enumerated compilation options.
//!
//! Each option is a closed set. Parsing is exact and case-sensitive; the
//! canonical spelling is what callers send and what ends up on the command line.

use serde::Serialize;

/// Source language family, used to pick the source file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageFamily {
    C,
    Cpp,
}

impl LanguageFamily {
    /// Extension (without dot) of the file the source is written to.
    pub fn extension(self) -> &'static str {
        match self {
            LanguageFamily::C => "c",
            LanguageFamily::Cpp => "cpp",
        }
    }
}

/// Language dialect passed as `-std=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LanguageStandard {
    #[serde(rename = "c89")]
    C89,
    #[serde(rename = "c90")]
    C90,
    #[serde(rename = "c99")]
    C99,
    #[serde(rename = "c11")]
    C11,
    #[serde(rename = "c17")]
    C17,
    #[serde(rename = "c18")]
    C18,
    #[serde(rename = "c23")]
    C23,
    #[serde(rename = "c++98")]
    Cpp98,
    #[serde(rename = "c++03")]
    Cpp03,
    #[serde(rename = "c++11")]
    Cpp11,
    #[serde(rename = "c++14")]
    Cpp14,
    #[serde(rename = "c++17")]
    Cpp17,
    #[serde(rename = "c++20")]
    Cpp20,
    #[serde(rename = "c++23")]
    Cpp23,
}

impl LanguageStandard {
    /// Every supported dialect, oldest C first.
    pub const ALL: &'static [LanguageStandard] = &[
        LanguageStandard::C89,
        LanguageStandard::C90,
        LanguageStandard::C99,
        LanguageStandard::C11,
        LanguageStandard::C17,
        LanguageStandard::C18,
        LanguageStandard::C23,
        LanguageStandard::Cpp98,
        LanguageStandard::Cpp03,
        LanguageStandard::Cpp11,
        LanguageStandard::Cpp14,
        LanguageStandard::Cpp17,
        LanguageStandard::Cpp20,
        LanguageStandard::Cpp23,
    ];

    /// Newest stable dialect, used when a request names none.
    pub const DEFAULT: LanguageStandard = LanguageStandard::Cpp20;

    pub fn as_str(self) -> &'static str {
        match self {
            LanguageStandard::C89 => "c89",
            LanguageStandard::C90 => "c90",
            LanguageStandard::C99 => "c99",
            LanguageStandard::C11 => "c11",
            LanguageStandard::C17 => "c17",
            LanguageStandard::C18 => "c18",
            LanguageStandard::C23 => "c23",
            LanguageStandard::Cpp98 => "c++98",
            LanguageStandard::Cpp03 => "c++03",
            LanguageStandard::Cpp11 => "c++11",
            LanguageStandard::Cpp14 => "c++14",
            LanguageStandard::Cpp17 => "c++17",
            LanguageStandard::Cpp20 => "c++20",
            LanguageStandard::Cpp23 => "c++23",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value)
    }

    pub fn family(self) -> LanguageFamily {
        if self.as_str().starts_with("c++") {
            LanguageFamily::Cpp
        } else {
            LanguageFamily::C
        }
    }

    /// The `-std=` flag for this dialect.
    pub fn flag(self) -> String {
        format!("-std={}", self.as_str())
    }
}

/// Optimization level passed as `-O<level>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OptimizationLevel {
    O0,
    O1,
    O2,
    O3,
    Os,
    Oz,
    Ofast,
}

impl OptimizationLevel {
    pub const ALL: &'static [OptimizationLevel] = &[
        OptimizationLevel::O0,
        OptimizationLevel::O1,
        OptimizationLevel::O2,
        OptimizationLevel::O3,
        OptimizationLevel::Os,
        OptimizationLevel::Oz,
        OptimizationLevel::Ofast,
    ];

    pub const DEFAULT: OptimizationLevel = OptimizationLevel::O2;

    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationLevel::O0 => "O0",
            OptimizationLevel::O1 => "O1",
            OptimizationLevel::O2 => "O2",
            OptimizationLevel::O3 => "O3",
            OptimizationLevel::Os => "Os",
            OptimizationLevel::Oz => "Oz",
            OptimizationLevel::Ofast => "Ofast",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|o| o.as_str() == value)
    }

    pub fn flag(self) -> String {
        format!("-{}", self.as_str())
    }
}

/// Warning policy, expanded into concrete flag groups by the command builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    None,
    All,
    Extra,
    Pedantic,
    Error,
}

impl WarningLevel {
    pub const ALL: &'static [WarningLevel] = &[
        WarningLevel::None,
        WarningLevel::All,
        WarningLevel::Extra,
        WarningLevel::Pedantic,
        WarningLevel::Error,
    ];

    /// Verbose but non-fatal.
    pub const DEFAULT: WarningLevel = WarningLevel::All;

    pub fn as_str(self) -> &'static str {
        match self {
            WarningLevel::None => "none",
            WarningLevel::All => "all",
            WarningLevel::Extra => "extra",
            WarningLevel::Pedantic => "pedantic",
            WarningLevel::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|w| w.as_str() == value)
    }

    pub fn flags(self) -> &'static [&'static str] {
        match self {
            WarningLevel::None => &["-w"],
            WarningLevel::All => &["-Wall"],
            WarningLevel::Extra => &["-Wall", "-Wextra"],
            WarningLevel::Pedantic => &["-Wall", "-Wextra", "-Wpedantic"],
            WarningLevel::Error => &["-Wall", "-Wextra", "-Werror"],
        }
    }
}

/// AST dump format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AstFormat {
    /// clang's JSON dump
    Json,
    /// clang's indented text dump
    Text,
    /// Graphviz DOT derived from the JSON dump
    Graph,
}

impl AstFormat {
    pub const ALL: &'static [AstFormat] = &[AstFormat::Json, AstFormat::Text, AstFormat::Graph];

    pub const DEFAULT: AstFormat = AstFormat::Text;

    pub fn as_str(self) -> &'static str {
        match self {
            AstFormat::Json => "json",
            AstFormat::Text => "text",
            AstFormat::Graph => "graph",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == value)
    }
}

/// Join the canonical spellings of an option set for error messages.
pub(crate) fn list<T: Copy>(all: &[T], as_str: fn(T) -> &'static str) -> String {
    all.iter()
        .map(|v| as_str(*v))
        .collect::<Vec<_>>()
        .join(", ")
}
