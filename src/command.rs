//! Command construction.
//!
//! Turns validated options into a clang argument vector. Positional layout is
//! fixed for every tool:
//!
//! ```text
//! <option flags...> [-o <workdir>/<artifact>] -- <workdir>/source.<ext>
//! ```
//!
//! The source path is always last and is preceded by the `--` end-of-options
//! marker, so nothing supplied by the caller can be read as the input file.
//! The output path is always derived from the working directory.

use crate::options::AstFormat;
use crate::validate::{AnalyzeOptions, AstOptions, CompileOptions};
use std::path::Path;

/// File stem of the source written into each working directory.
pub const SOURCE_STEM: &str = "source";

/// Artifact names inside the working directory.
pub const OBJECT_NAME: &str = "output.o";
pub const EXECUTABLE_NAME: &str = "output";
pub const ANALYSIS_NAME: &str = "analysis.out";

const COMMON_FLAGS: &[&str] = &["-fno-color-diagnostics"];

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn push_preprocessor(argv: &mut Vec<String>, defines: &[String], include_paths: &[String]) {
    argv.extend(defines.iter().map(|d| format!("-D{d}")));
    argv.extend(include_paths.iter().map(|i| format!("-I{i}")));
}

fn finish(mut argv: Vec<String>, source: &Path) -> Vec<String> {
    argv.push("--".to_string());
    argv.push(path_arg(source));
    argv
}

/// Arguments for the `compile` tool.
pub fn compile_argv(options: &CompileOptions, source: &Path, out_dir: &Path) -> Vec<String> {
    let mut argv = vec![options.standard.flag(), options.optimization.flag()];
    argv.extend(options.warnings.flags().iter().map(|f| f.to_string()));
    argv.extend(COMMON_FLAGS.iter().map(|f| f.to_string()));
    push_preprocessor(&mut argv, &options.defines, &options.include_paths);
    argv.extend(options.extra_flags.iter().cloned());

    let artifact = if options.compile_only {
        argv.push("-c".to_string());
        OBJECT_NAME
    } else {
        EXECUTABLE_NAME
    };
    argv.push("-o".to_string());
    argv.push(path_arg(&out_dir.join(artifact)));

    finish(argv, source)
}

/// Arguments for the `analyze` tool.
pub fn analyze_argv(options: &AnalyzeOptions, source: &Path, out_dir: &Path) -> Vec<String> {
    let mut argv = vec![
        "--analyze".to_string(),
        options.standard.flag(),
        "-Xanalyzer".to_string(),
        "-analyzer-output=text".to_string(),
    ];
    for checker in &options.checkers {
        argv.push("-Xanalyzer".to_string());
        argv.push(format!("-analyzer-checker={checker}"));
    }
    // Compiler warnings would be mixed into the findings
    argv.push("-Wno-everything".to_string());
    argv.extend(COMMON_FLAGS.iter().map(|f| f.to_string()));
    push_preprocessor(&mut argv, &options.defines, &options.include_paths);

    argv.push("-o".to_string());
    argv.push(path_arg(&out_dir.join(ANALYSIS_NAME)));

    finish(argv, source)
}

/// Arguments for the `ast` tool. Syntax-only: no output file is produced.
pub fn ast_argv(options: &AstOptions, source: &Path) -> Vec<String> {
    let dump = match options.format {
        AstFormat::Text => "-ast-dump",
        AstFormat::Json | AstFormat::Graph => "-ast-dump=json",
    };
    let mut argv = vec![
        options.standard.flag(),
        "-fsyntax-only".to_string(),
        "-Xclang".to_string(),
        dump.to_string(),
        "-Wno-everything".to_string(),
    ];
    argv.extend(COMMON_FLAGS.iter().map(|f| f.to_string()));

    finish(argv, source)
}
