//! Publish configuration.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Frozen settings for one publish run
///
/// Built through [`PublishConfig::builder`], which validates the values.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    concurrency: usize,
    dry_run: bool,
    check_url: Option<String>,
    index_url: Option<String>,
    poll_timeout: Duration,
    poll_interval: Duration,
    smoke_test: bool,
    verify_checksums: bool,
    max_retries: usize,
    retry_base_delay: Duration,
    workspace_root: PathBuf,
    label: String,
}

impl PublishConfig {
    /// Start building a config for the workspace at `workspace_root`
    pub fn builder(workspace_root: impl Into<PathBuf>) -> PublishConfigBuilder {
        PublishConfigBuilder::new(workspace_root.into())
    }

    /// Maximum packages published at once within a level
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Go through every stage without uploading
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Registry endpoint used for availability and checksum queries
    pub fn check_url(&self) -> Option<&str> {
        self.check_url.as_deref()
    }

    /// Registry endpoint artifacts are uploaded to
    pub fn index_url(&self) -> Option<&str> {
        self.index_url.as_deref()
    }

    /// How long to wait for a version to appear on the registry
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Sleep between availability checks
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run the install check after publishing
    pub fn smoke_test(&self) -> bool {
        self.smoke_test
    }

    /// Compare artifact digests with the registry's
    pub fn verify_checksums(&self) -> bool {
        self.verify_checksums
    }

    /// Retries of a transient upload failure
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// First backoff delay; doubles per retry
    pub fn retry_base_delay(&self) -> Duration {
        self.retry_base_delay
    }

    /// Workspace root, where the run state file lives
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Workspace label, empty for the default workspace
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Builder for [`PublishConfig`]
#[derive(Debug, Clone)]
pub struct PublishConfigBuilder {
    config: PublishConfig,
}

impl PublishConfigBuilder {
    fn new(workspace_root: PathBuf) -> Self {
        Self {
            config: PublishConfig {
                concurrency: 5,
                dry_run: false,
                check_url: None,
                index_url: None,
                poll_timeout: Duration::from_secs(300),
                poll_interval: Duration::from_secs(5),
                smoke_test: true,
                verify_checksums: true,
                max_retries: 3,
                retry_base_delay: Duration::from_secs(5),
                workspace_root,
                label: String::new(),
            },
        }
    }

    /// Maximum packages published at once within a level
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Go through every stage without uploading
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Registry endpoint used for availability and checksum queries
    pub fn check_url(mut self, url: impl Into<String>) -> Self {
        self.config.check_url = Some(url.into());
        self
    }

    /// Registry endpoint artifacts are uploaded to
    pub fn index_url(mut self, url: impl Into<String>) -> Self {
        self.config.index_url = Some(url.into());
        self
    }

    /// How long to wait for a version to appear on the registry
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// Sleep between availability checks
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Run the install check after publishing
    pub fn smoke_test(mut self, enabled: bool) -> Self {
        self.config.smoke_test = enabled;
        self
    }

    /// Compare artifact digests with the registry's
    pub fn verify_checksums(mut self, enabled: bool) -> Self {
        self.config.verify_checksums = enabled;
        self
    }

    /// Retries of a transient upload failure
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// First backoff delay
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry_base_delay = delay;
        self
    }

    /// Workspace label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<PublishConfig, ConfigError> {
        if self.config.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.config.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(self.config)
    }
}
