use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kgidx",
    version,
    about = "Incremental code knowledge graph indexer",
    after_help = r#"Examples:
  kgidx reindex --repo .
  kgidx serve --link-calls
  kgidx stats --detailed
  kgidx request --json '{"id":1,"command":"update_file","file_path":"a.py","content":"def greet():\n    pass\n"}'
  kgidx request --json '{"id":2,"command":"get_stats","detailed":true}'
"#
)]
pub struct Args {
    /// Snapshot file (default: .kgidx/graph.sqlite).
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,
    /// Log level or filter directive; RUST_LOG takes precedence.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

/// Relationship linking beyond containment.
#[derive(ClapArgs, Debug, Clone, Copy, Default)]
pub struct LinkArgs {
    /// Add Import and Module nodes with IMPORTS edges.
    #[arg(long)]
    pub link_imports: bool,
    /// Add CALLS edges for calls resolved within the same file.
    #[arg(long)]
    pub link_calls: bool,
    /// Add INHERITS_FROM edges for base classes in the same file.
    #[arg(long)]
    pub link_inheritance: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the line-delimited JSON command server over stdin/stdout.
    Serve {
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Rebuild the graph from a directory tree and exit.
    Reindex {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Print graph statistics from the snapshot.
    Stats {
        /// Include per-node-kind counts.
        #[arg(long)]
        detailed: bool,
    },
    /// Run a single JSON request and exit.
    Request {
        /// Request object, e.g. '{"id":1,"command":"ping"}'.
        #[arg(long, conflicts_with = "file")]
        json: Option<String>,
        /// Read the request from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        link: LinkArgs,
    },
}
