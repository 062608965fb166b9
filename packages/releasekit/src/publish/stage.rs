//! Per-package publish stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the per-package publish state machine
///
/// `Pinning -> Building -> [ChecksumVerify] -> Uploading -> Polling ->
/// [SmokeTest] -> Done`, with `Failed` reachable from anywhere. `Skipped`
/// marks packages found to be published already.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Not started yet
    Pending,
    /// Rewriting version constraints
    Pinning,
    /// Producing distributable artifacts
    Building,
    /// Hashing artifacts and comparing against the registry
    ChecksumVerify,
    /// Uploading artifacts
    Uploading,
    /// Waiting for the registry to serve the version
    Polling,
    /// Install check of the published version
    SmokeTest,
    /// Published
    Done,
    /// Gave up
    Failed,
    /// Already published before this run
    Skipped,
}

impl Stage {
    /// Whether the package will not move any further
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed | Stage::Skipped)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Pinning => "pinning",
            Stage::Building => "building",
            Stage::ChecksumVerify => "checksum-verify",
            Stage::Uploading => "uploading",
            Stage::Polling => "polling",
            Stage::SmokeTest => "smoke-test",
            Stage::Done => "done",
            Stage::Failed => "failed",
            Stage::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::ChecksumVerify).expect("json"), "\"CHECKSUM_VERIFY\"");
        assert_eq!(serde_json::from_str::<Stage>("\"SMOKE_TEST\"").expect("json"), Stage::SmokeTest);
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Polling.is_terminal());
    }
}
