use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Offline code dependency analyzer.
///
/// codegraph indexes a workspace into a queryable symbol graph stored at
/// `.codegraph/graph.db`, then answers structural questions (callers,
/// callees, transitive impact) without re-reading source files.
#[derive(Parser, Debug)]
#[command(name = "codegraph", version, about, long_about = None, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for query results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Compact one-line-per-result format (default).
    #[default]
    Compact,
    /// Structured JSON suitable for programmatic consumption.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the graph for a workspace, replacing any previous build.
    Build {
        /// Path to the workspace root.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print each discovered file path during indexing.
        #[arg(short, long)]
        verbose: bool,

        /// Emit the build summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Build, then keep the graph current with incremental per-file updates.
    Watch {
        /// Path to the workspace root.
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Look up symbols by name substring; reports callers and callees.
    Symbol {
        /// Substring of the symbol name.
        name: String,

        /// Directory to locate the graph database from.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Filter out test files (.test./.spec./__tests__/.stories.).
        #[arg(long)]
        exclude_tests: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Transitive dependents of a file, by reverse import traversal.
    Impact {
        /// Workspace-relative file path.
        file: String,

        /// Directory to locate the graph database from.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Filter out test files.
        #[arg(long)]
        exclude_tests: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Transitive callers of a symbol, by reverse call traversal.
    Callers {
        /// Exact symbol name (`Class.method` for methods).
        name: String,

        /// Directory to locate the graph database from.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum traversal depth.
        #[arg(long, default_value_t = 3)]
        depth: usize,

        /// Filter out test files.
        #[arg(long)]
        exclude_tests: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Rank files by inbound edge count (test files excluded).
    Map {
        /// Directory to locate the graph database from.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum number of files listed.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Impact of a unified diff read from stdin: affected definitions and
    /// their transitive callers.
    Diff {
        /// Directory to locate the graph database from.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum caller traversal depth.
        #[arg(long, default_value_t = 3)]
        depth: usize,

        /// Filter out test files.
        #[arg(long)]
        exclude_tests: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },
}
