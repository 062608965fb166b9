//! Release tagging: tag name templates, idempotent tag creation with a
//! single batched push, platform releases, and rollback.

mod format;
mod manager;
mod release_body;

pub use format::{format_tag, parse_tag, DEFAULT_TAG_FORMAT, DEFAULT_UMBRELLA_FORMAT};
pub use manager::{DeleteResult, ReleaseMode, TagConfig, TagManager, TagResult, TagResultBuilder};
pub use release_body::render_release_body;
