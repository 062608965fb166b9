//! Version decisions and manifest pinning.
//!
//! The bump decision itself is made upstream; this module carries its
//! output ([`ReleaseManifest`]) and the format-preserving editor used to pin
//! versions while a package is being published.

mod manifest;
mod toml_editor;

pub use manifest::{BumpKind, PackageVersion, ReleaseManifest};
pub use toml_editor::TomlEditor;
