//! Markdown body for platform releases.

use crate::version::ReleaseManifest;
use std::fmt::Write;

/// Render the release notes for the umbrella tag
pub fn render_release_body(manifest: &ReleaseManifest, umbrella_tag: &str) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "## Release {}", umbrella_tag);
    body.push('\n');
    if !manifest.git_sha().is_empty() {
        let _ = writeln!(body, "Built from commit `{}`.", manifest.git_sha());
        body.push('\n');
    }

    body.push_str("| Package | From | To | Bump |\n");
    body.push_str("|---|---|---|---|\n");
    for package in manifest.bumped() {
        let _ = writeln!(
            body,
            "| {} | {} | {} | {} |",
            package.name(),
            package.old_version(),
            package.new_version(),
            package.bump()
        );
    }

    let reasons: Vec<_> = manifest.bumped().filter(|p| !p.reason().trim().is_empty()).collect();
    if !reasons.is_empty() {
        body.push_str("\n### Changes\n\n");
        for package in reasons {
            let _ = writeln!(body, "- **{}**: {}", package.name(), package.reason().trim());
        }
    }

    body
}
