//! Package publishing in dependency order.
//!
//! The orchestrator walks the dependency graph level by level with bounded
//! concurrency, driving each package through a staged state machine and
//! persisting a resumable run state after every level.

mod checksum;
mod config;
mod observer;
mod orchestrator;
mod result;
mod stage;

pub use checksum::{compute_checksums, sha256_file};
pub use config::{PublishConfig, PublishConfigBuilder};
pub use observer::{LogObserver, NoopObserver, Observer};
pub use orchestrator::PublishOrchestrator;
pub use result::PublishResult;
pub use stage::Stage;
