//! Command line argument parsing.

use crate::tags::{ReleaseMode, DEFAULT_TAG_FORMAT, DEFAULT_UMBRELLA_FORMAT};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// releasekit - dependency-ordered publishing and idempotent tagging
#[derive(Parser, Debug)]
#[command(
    name = "releasekit",
    version,
    about = "Dependency-ordered, resumable publishing and idempotent tagging for monorepos",
    long_about = "releasekit takes a workspace snapshot and a release manifest, publishes the
bumped packages level by level with bounded concurrency, and tags the result.
Re-running any command is safe: published packages and existing tags are detected."
)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to workspace root (defaults to current directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub workspace: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the dependency levels of a workspace snapshot
    Levels {
        /// Workspace snapshot (JSON array of packages)
        #[arg(long, value_name = "PATH")]
        packages: PathBuf,

        /// Format output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish the bumped packages of a release manifest
    Publish {
        /// Workspace snapshot (JSON array of packages)
        #[arg(long, value_name = "PATH")]
        packages: PathBuf,

        /// Release manifest (JSON)
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,

        /// Go through every stage without uploading
        #[arg(short, long)]
        dry_run: bool,

        /// Maximum concurrent publishes within a level
        #[arg(long, default_value = "5", value_name = "COUNT")]
        concurrency: usize,

        /// Workspace label, used in the state file name
        #[arg(long, default_value = "", value_name = "LABEL")]
        label: String,

        /// Registry index queried for availability and checksums
        #[arg(long, value_name = "URL")]
        check_url: Option<String>,

        /// Registry index to upload to
        #[arg(long, value_name = "URL")]
        index_url: Option<String>,

        /// Seconds to wait for a version to appear on the registry
        #[arg(long, default_value = "300", value_name = "SECONDS")]
        poll_timeout: u64,

        /// Seconds between availability checks
        #[arg(long, default_value = "5", value_name = "SECONDS")]
        poll_interval: u64,

        /// Skip the post-publish install check
        #[arg(long)]
        no_smoke_test: bool,

        /// Skip artifact checksum verification
        #[arg(long)]
        no_verify_checksums: bool,

        /// Maximum retry attempts for transient upload failures
        #[arg(long, default_value = "3", value_name = "COUNT")]
        max_retries: usize,

        /// First retry delay in seconds; doubles per attempt
        #[arg(long, default_value = "5", value_name = "SECONDS")]
        retry_delay: u64,
    },

    /// Create and push release tags, then the platform release
    Tag {
        /// Release manifest (JSON)
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,

        /// Log instead of creating anything
        #[arg(short, long)]
        dry_run: bool,

        /// Release mode: local publishes the release, ci creates a draft
        #[arg(long, default_value = "local", value_name = "MODE")]
        mode: ReleaseMode,

        /// Provenance file attached to CI draft releases
        #[arg(long, value_name = "PATH")]
        provenance: Option<PathBuf>,

        #[command(flatten)]
        target: TagTarget,
    },

    /// Delete the tags and platform release of a release manifest
    Rollback {
        /// Release manifest (JSON)
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,

        /// Log instead of deleting anything
        #[arg(short, long)]
        dry_run: bool,

        #[command(flatten)]
        target: TagTarget,
    },

    /// Split a tag into package name and version
    ParseTag {
        /// Tag to parse
        tag: String,

        /// Template the tag was produced from
        #[arg(long, default_value = DEFAULT_TAG_FORMAT, value_name = "TEMPLATE")]
        format: String,
    },

    /// Show the persisted state of the last publish run
    Status {
        /// Workspace label
        #[arg(long, default_value = "", value_name = "LABEL")]
        label: String,

        /// Format output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Tag naming and destination shared by `tag` and `rollback`
#[derive(clap::Args, Debug, Clone)]
pub struct TagTarget {
    /// Remote to push to and delete from
    #[arg(long, default_value = "origin", value_name = "REMOTE")]
    pub remote: String,

    /// Per-package tag template
    #[arg(long, default_value = DEFAULT_TAG_FORMAT, value_name = "TEMPLATE")]
    pub tag_format: String,

    /// Umbrella tag template
    #[arg(long, default_value = DEFAULT_UMBRELLA_FORMAT, value_name = "TEMPLATE")]
    pub umbrella_format: String,

    /// Second per-package tag template
    #[arg(long, value_name = "TEMPLATE")]
    pub secondary_format: Option<String>,

    /// Value substituted for {label}
    #[arg(long, default_value = "", value_name = "LABEL")]
    pub label: String,

    /// GitHub repository (owner/name) for platform releases
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<String>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get workspace path or default to current directory
    pub fn workspace_path(&self) -> PathBuf {
        self.workspace.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Command {
    /// Get the command name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Command::Levels { .. } => "levels",
            Command::Publish { .. } => "publish",
            Command::Tag { .. } => "tag",
            Command::Rollback { .. } => "rollback",
            Command::ParseTag { .. } => "parse-tag",
            Command::Status { .. } => "status",
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Workspace root path
    pub workspace_path: PathBuf,
    /// Verbosity level
    pub verbosity: VerbosityLevel,
}

/// Verbosity level for output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Minimal output, only errors
    Quiet,
    /// Standard output level
    Normal,
    /// Detailed output with debug information
    Verbose,
}

impl VerbosityLevel {
    /// Default `log` filter for this verbosity
    pub fn log_filter(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        let verbosity = if args.quiet {
            VerbosityLevel::Quiet
        } else if args.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        };

        Self {
            workspace_path: args.workspace_path(),
            verbosity,
        }
    }
}

impl RuntimeConfig {
    /// Check if output should be suppressed
    pub fn is_quiet(&self) -> bool {
        self.verbosity == VerbosityLevel::Quiet
    }

    /// Print message if not in quiet mode
    pub fn println(&self, message: &str) {
        if !self.is_quiet() {
            println!("{}", message);
        }
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        eprintln!("❌ {}", message);
    }

    /// Print warning message if not in quiet mode
    pub fn warning_println(&self, message: &str) {
        if !self.is_quiet() {
            println!("⚠️ {}", message);
        }
    }

    /// Print success message if not in quiet mode
    pub fn success_println(&self, message: &str) {
        if !self.is_quiet() {
            println!("✅ {}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn tag_defaults() {
        let args = Args::try_parse_from(["releasekit", "tag", "--manifest", "m.json", "--mode", "ci"])
            .expect("parse");
        match args.command {
            Command::Tag { mode, target, dry_run, .. } => {
                assert_eq!(mode, ReleaseMode::Ci);
                assert!(!dry_run);
                assert_eq!(target.remote, "origin");
                assert_eq!(target.tag_format, DEFAULT_TAG_FORMAT);
                assert_eq!(target.umbrella_format, DEFAULT_UMBRELLA_FORMAT);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["releasekit", "-v", "-q", "status"]).is_err());
    }
}
