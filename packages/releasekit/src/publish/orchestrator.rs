//! Level-by-level publish orchestrator.
//!
//! Levels of the dependency graph are hard barriers: every package task of
//! level k is awaited before level k+1 starts, and any failure in level k
//! stops the run there. Within a level, packages run concurrently under a
//! semaphore. Each package goes through the staged state machine described
//! on [`Stage`]; failures, panics included, are contained to the package.

use crate::backends::{PackageManager, PinnedManifest, Registry};
use crate::error::{PublishError, Result};
use crate::publish::checksum::{compute_checksums, mismatched, uncovered};
use crate::publish::{NoopObserver, Observer, PublishConfig, PublishResult, Stage};
use crate::state::{RunState, StateManager};
use crate::version::{PackageVersion, ReleaseManifest};
use crate::workspace::{normalize_name, DependencyGraph, Package};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Publishes a release manifest in dependency order
pub struct PublishOrchestrator {
    package_manager: Arc<dyn PackageManager>,
    registry: Arc<dyn Registry>,
    observer: Arc<dyn Observer>,
    config: Arc<PublishConfig>,
}

/// Everything one package task needs, owned so it can be spawned
struct PackageTask {
    package_manager: Arc<dyn PackageManager>,
    registry: Arc<dyn Registry>,
    observer: Arc<dyn Observer>,
    config: Arc<PublishConfig>,
    /// Normalized key used for state, observer events and results
    key: String,
    /// Package as declared; its name is what the registry and PM see
    package: Package,
    version: String,
    pins: BTreeMap<String, String>,
}

/// Restores an ephemeral manifest rewrite when the task ends, even on panic
struct PinGuard(PinnedManifest);

impl Drop for PinGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.restore() {
            log::warn!("{}", e);
        }
    }
}

impl PublishOrchestrator {
    /// Create an orchestrator reporting to a no-op observer
    pub fn new(
        package_manager: Arc<dyn PackageManager>,
        registry: Arc<dyn Registry>,
        config: PublishConfig,
    ) -> Self {
        Self {
            package_manager,
            registry,
            observer: Arc::new(NoopObserver),
            config: Arc::new(config),
        }
    }

    /// Report progress to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Publish every bumped package of `manifest`
    ///
    /// Returns `Err` only for fatal problems found before anything is
    /// published; per-package failures are reported in the result.
    pub async fn publish(
        &self,
        graph: &DependencyGraph,
        packages: &[Package],
        manifest: &ReleaseManifest,
    ) -> Result<PublishResult> {
        let by_name: BTreeMap<String, &Package> =
            packages.iter().map(|p| (p.key(), p)).collect();

        for version in manifest.bumped() {
            if !by_name.contains_key(version.name()) {
                return Err(PublishError::UnknownPackage {
                    package: version.name().to_string(),
                }
                .into());
            }
        }

        let mut skipped: Vec<String> = manifest.skipped().map(|p| p.name().to_string()).collect();
        if manifest.is_empty_release() {
            log::info!("Every package is skipped; nothing to publish");
            self.observer.on_complete();
            return Ok(PublishResult::empty(skipped));
        }

        // Versions every internal dependency is pinned to
        let versions: BTreeMap<String, String> = by_name
            .iter()
            .map(|(name, package)| {
                let version = manifest
                    .get(name)
                    .filter(|v| !v.skipped())
                    .map(|v| v.new_version().to_string())
                    .unwrap_or_else(|| package.version.clone());
                (name.clone(), version)
            })
            .collect();

        let mut plan: Vec<Vec<(&Package, &PackageVersion)>> = Vec::with_capacity(graph.levels().len());
        for level in graph.levels() {
            let mut work = Vec::new();
            for name in level {
                let (Some(package), Some(version)) = (by_name.get(name), manifest.get(name)) else {
                    continue;
                };
                if version.skipped() {
                    continue;
                }
                if !package.is_publishable {
                    log::info!("{} is not publishable, skipping", name);
                    skipped.push(name.clone());
                    continue;
                }
                work.push((*package, version));
            }
            plan.push(work);
        }

        let state_manager = StateManager::for_workspace(self.config.workspace_root(), self.config.label());
        let previous = self.previous_state(&state_manager, manifest.git_sha());

        let mut state = RunState::new(manifest.git_sha(), self.config.label()).with_dry_run(self.config.dry_run());
        let mut init = Vec::new();
        for (level, work) in plan.iter().enumerate() {
            for (package, version) in work {
                let name = package.key();
                state.track(&name, level, version.new_version());
                init.push((name, level, version.new_version().to_string()));
            }
        }
        for name in &skipped {
            state.mark_skipped(name);
        }
        self.observer.init_packages(&init);

        let mut published = Vec::new();
        let mut failed = BTreeMap::new();

        for (level, work) in plan.iter().enumerate() {
            if work.is_empty() {
                continue;
            }
            log::info!("Level {}: {} package(s)", level, work.len());

            let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));
            let mut handles = Vec::new();

            for (package, version) in work {
                let name = package.key();

                if previous
                    .as_ref()
                    .is_some_and(|prev| prev.is_done(&name, version.new_version()))
                {
                    log::info!("{} {} was published by a previous run", name, version.new_version());
                    self.observer.on_stage(&name, Stage::Done);
                    state.set_stage(&name, Stage::Done);
                    state.mark_published(&name);
                    published.push(name);
                    continue;
                }

                // Pins are keyed by the dependency's declared name
                let pins = package
                    .internal_deps
                    .iter()
                    .map(|dep| normalize_name(dep))
                    .filter_map(|dep| {
                        let declared = by_name.get(&dep)?.name.clone();
                        versions.get(&dep).map(|v| (declared, v.clone()))
                    })
                    .collect();
                let task = PackageTask {
                    package_manager: Arc::clone(&self.package_manager),
                    registry: Arc::clone(&self.registry),
                    observer: Arc::clone(&self.observer),
                    config: Arc::clone(&self.config),
                    key: name.clone(),
                    package: (*package).clone(),
                    version: version.new_version().to_string(),
                    pins,
                };
                let semaphore = Arc::clone(&semaphore);

                let handle = tokio::spawn(async move {
                    match semaphore.acquire_owned().await {
                        Ok(_permit) => task.run().await,
                        Err(e) => Err(PublishError::Unexpected {
                            package: task.key.clone(),
                            reason: format!("worker pool closed: {}", e),
                        }),
                    }
                });
                handles.push((name, handle));
            }

            // Wait for every task of the level, successes and failures alike
            for (name, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(PublishError::Unexpected {
                        package: name.clone(),
                        reason: format!("task aborted: {}", e),
                    }),
                };

                match outcome {
                    Ok(stage) => {
                        state.set_stage(&name, stage);
                        state.mark_published(&name);
                        published.push(name);
                    }
                    Err(e) => {
                        let message = e.to_string();
                        self.observer.on_stage(&name, Stage::Failed);
                        self.observer.on_error(&name, &message);
                        state.mark_failed(&name, &message);
                        failed.insert(name, message);
                    }
                }
            }

            state.complete_level(level);
            if let Err(e) = state_manager.save(&state) {
                log::warn!("Could not persist run state: {}", e);
            }

            if !failed.is_empty() {
                log::error!(
                    "Level {} had {} failure(s); not starting later levels",
                    level,
                    failed.len()
                );
                break;
            }
        }

        self.observer.on_complete();

        Ok(PublishResult {
            published,
            skipped,
            failed,
            state: Some(state),
            state_path: Some(state_manager.path().to_path_buf()),
        })
    }

    fn previous_state(&self, state_manager: &StateManager, git_sha: &str) -> Option<RunState> {
        if self.config.dry_run() {
            return None;
        }
        match state_manager.load_if_exists() {
            Ok(Some(state)) if state.resumable_for(git_sha) => {
                log::info!("Resuming from {}", state_manager.path().display());
                Some(state)
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Ignoring unreadable run state: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for PublishOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PackageTask {
    fn name(&self) -> &str {
        &self.key
    }

    /// Spelling the registry and package manager know the package by
    fn registry_name(&self) -> &str {
        &self.package.name
    }

    fn stage(&self, stage: Stage) {
        self.observer.on_stage(self.name(), stage);
    }

    fn step_failed(&self, step: &str, reason: impl ToString) -> PublishError {
        PublishError::StepFailed {
            step: step.to_string(),
            package: self.name().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Drive one package to `Done` (or `Skipped` when already on the registry)
    async fn run(self) -> std::result::Result<Stage, PublishError> {
        let dry_run = self.config.dry_run();

        if !dry_run {
            match self.registry.is_available(self.registry_name(), &self.version).await {
                Ok(true) => {
                    log::info!("{} {} is already on the registry", self.name(), self.version);
                    self.stage(Stage::Skipped);
                    return Ok(Stage::Skipped);
                }
                Ok(false) => {}
                Err(e) => log::warn!("{}: availability pre-check failed: {}", self.name(), e),
            }
        }

        self.stage(Stage::Pinning);
        let pinned = self
            .package_manager
            .pin_versions(&self.package, &self.version, &self.pins, dry_run)
            .await
            .map_err(|e| self.step_failed("pin", e))?;
        let _restore = PinGuard(pinned);

        self.stage(Stage::Building);
        let output_dir = tempfile::tempdir().map_err(|e| PublishError::Unexpected {
            package: self.name().to_string(),
            reason: format!("cannot create build directory: {}", e),
        })?;
        let output = self
            .package_manager
            .build(&self.package.path, output_dir.path(), dry_run)
            .await
            .map_err(|e| self.step_failed("build", e))?;
        if !output.ok {
            return Err(self.step_failed("build", output.error_text()));
        }
        let artifacts = list_artifacts(output_dir.path()).map_err(|e| PublishError::Unexpected {
            package: self.name().to_string(),
            reason: format!("cannot list build output: {}", e),
        })?;
        if artifacts.is_empty() {
            if !dry_run {
                return Err(PublishError::NoArtifacts {
                    package: self.name().to_string(),
                });
            }
            log::debug!("[dry-run] {} produced no files", self.name());
        }

        let local_checksums = if self.config.verify_checksums() {
            self.stage(Stage::ChecksumVerify);
            compute_checksums(&artifacts).map_err(|e| self.step_failed("checksum", e))?
        } else {
            BTreeMap::new()
        };

        self.stage(Stage::Uploading);
        self.upload(&artifacts).await?;

        self.stage(Stage::Polling);
        self.poll().await?;

        if self.config.verify_checksums() && !dry_run {
            self.verify_checksums(&local_checksums).await?;
        }

        if self.config.smoke_test() {
            self.stage(Stage::SmokeTest);
            let output = self
                .package_manager
                .smoke_test(self.registry_name(), &self.version, dry_run)
                .await
                .map_err(|e| self.step_failed("smoke test", e))?;
            if !output.ok {
                return Err(self.step_failed("smoke test", output.error_text()));
            }
        }

        self.stage(Stage::Done);
        Ok(Stage::Done)
    }

    /// Upload with exponential backoff on transient failures
    async fn upload(&self, artifacts: &[PathBuf]) -> std::result::Result<(), PublishError> {
        if self.config.dry_run() {
            log::info!(
                "[dry-run] would upload {} {} ({} file(s))",
                self.name(),
                self.version,
                artifacts.len()
            );
            return Ok(());
        }

        let mut delay = self.config.retry_base_delay();
        let mut attempt = 0;
        loop {
            match self
                .package_manager
                .publish(&self.package, artifacts, self.config.index_url(), false)
                .await
            {
                Ok(output) if output.ok => return Ok(()),
                Ok(output) => return Err(self.step_failed("upload", output.error_text())),
                Err(e) if e.is_transient() && attempt < self.config.max_retries() => {
                    attempt += 1;
                    log::warn!(
                        "{}: upload attempt {} failed: {}. Retrying in {:.1}s...",
                        self.name(),
                        attempt,
                        e,
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_RETRY_DELAY);
                }
                Err(e) => return Err(self.step_failed("upload", e)),
            }
        }
    }

    /// Wait until the registry serves the new version
    async fn poll(&self) -> std::result::Result<(), PublishError> {
        if self.config.dry_run() {
            return Ok(());
        }

        let deadline = Instant::now() + self.config.poll_timeout();
        loop {
            match self.registry.is_available(self.registry_name(), &self.version).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => log::debug!("{}: registry not answering yet: {}", self.name(), e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PublishError::PollTimeout {
                    package: self.name().to_string(),
                    version: self.version.clone(),
                    timeout_secs: self.config.poll_timeout().as_secs(),
                });
            }
            sleep(std::cmp::min(self.config.poll_interval(), deadline - now)).await;
        }
    }

    async fn verify_checksums(&self, local: &BTreeMap<String, String>) -> std::result::Result<(), PublishError> {
        let remote = self
            .registry
            .checksums(self.registry_name(), &self.version)
            .await
            .map_err(|e| self.step_failed("checksum", e))?;

        let missing = uncovered(local, &remote);
        if !remote.is_empty() && !local.is_empty() && missing.len() == local.len() {
            return Err(PublishError::ChecksumUnverified {
                package: self.name().to_string(),
                artifacts: missing,
            });
        }
        for name in &missing {
            log::warn!("{}: registry reports no digest for {}", self.name(), name);
        }

        let mismatched = mismatched(local, &remote);
        if !mismatched.is_empty() {
            return Err(PublishError::ChecksumMismatch {
                package: self.name().to_string(),
                mismatched,
            });
        }
        Ok(())
    }
}

/// Regular files directly inside the build output directory
fn list_artifacts(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            artifacts.push(entry.path());
        }
    }
    artifacts.sort();
    Ok(artifacts)
}
