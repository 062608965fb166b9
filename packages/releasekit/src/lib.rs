//! # releasekit
//!
//! Release-publishing core for monorepos.
//!
//! Given a workspace snapshot and a release manifest (the per-package version
//! decisions made upstream), releasekit publishes the bumped packages in
//! dependency order and tags the result.
//!
//! ## Features
//!
//! - **Dependency Levels**: packages are grouped into topological generations
//! - **Bounded Concurrency**: each level publishes concurrently under a limit,
//!   and a level is a hard barrier for the next
//! - **Staged Publishing**: pin, build, checksum, upload, poll, smoke test
//! - **Resume Capability**: a run state file is rewritten after every level
//! - **Idempotent Tagging**: existing tags are skipped, new ones pushed in one call
//! - **Rollback Support**: delete the tags and platform release of a manifest
//!
//! The core only talks to the [`backends::Vcs`], [`backends::PackageManager`],
//! [`backends::Registry`] and [`backends::Forge`] traits.
//!
//! ## Usage
//!
//! ```bash
//! releasekit levels --packages workspace.json
//! releasekit publish --packages workspace.json --manifest release.json --dry-run
//! releasekit tag --manifest release.json --repo acme/widgets
//! releasekit rollback --manifest release.json
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod backends;
pub mod cli;
pub mod error;
pub mod publish;
pub mod state;
pub mod tags;
pub mod version;
pub mod workspace;

// Re-export main types for public API
pub use error::{ReleaseError, Result};
pub use publish::{Observer, PublishConfig, PublishOrchestrator, PublishResult, Stage};
pub use state::{RunState, StateManager};
pub use tags::{format_tag, parse_tag, TagConfig, TagManager, TagResult};
pub use version::{BumpKind, PackageVersion, ReleaseManifest};
pub use workspace::{build_graph, DependencyGraph, Package};
