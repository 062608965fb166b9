//! In-memory backends shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use releasekit::backends::{CommandOutput, Forge, PackageManager, PinnedManifest, Registry, ReleaseRequest, Vcs};
use releasekit::error::BackendError;
use releasekit::publish::{Observer, Stage};
use releasekit::workspace::Package;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registry backed by a set of available `name@version` keys
#[derive(Default)]
pub struct FakeRegistry {
    available: Mutex<BTreeSet<String>>,
    checksums: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    calls: AtomicUsize,
    /// Packages that never become available
    pub never_available: Mutex<BTreeSet<String>>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn make_available(&self, name: &str, version: &str) {
        if self.never_available.lock().unwrap().contains(name) {
            return;
        }
        self.available.lock().unwrap().insert(format!("{}@{}", name, version));
    }

    pub fn set_checksums(&self, name: &str, version: &str, digests: BTreeMap<String, String>) {
        self.checksums
            .lock()
            .unwrap()
            .insert(format!("{}@{}", name, version), digests);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn is_available(&self, name: &str, version: &str) -> Result<bool, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.available.lock().unwrap().contains(&format!("{}@{}", name, version)))
    }

    async fn checksums(&self, name: &str, version: &str) -> Result<BTreeMap<String, String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .checksums
            .lock()
            .unwrap()
            .get(&format!("{}@{}", name, version))
            .cloned()
            .unwrap_or_default())
    }
}

/// Package manager that writes one artifact per build and uploads into a [`FakeRegistry`]
pub struct FakePm {
    registry: Arc<FakeRegistry>,
    calls: Mutex<Vec<String>>,
    pinned: Mutex<BTreeMap<String, String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Time each build takes
    pub build_delay: Mutex<Duration>,
    /// Packages whose build fails
    pub failing_builds: Mutex<BTreeSet<String>>,
    /// Number of transient upload failures before an upload succeeds
    pub transient_failures: AtomicUsize,
}

impl FakePm {
    pub fn new(registry: Arc<FakeRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            calls: Mutex::new(Vec::new()),
            pinned: Mutex::new(BTreeMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            build_delay: Mutex::new(Duration::ZERO),
            failing_builds: Mutex::new(BTreeSet::new()),
            transient_failures: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, op: &str) -> Vec<String> {
        let prefix = format!("{} ", op);
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn package_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl PackageManager for FakePm {
    async fn pin_versions(
        &self,
        package: &Package,
        own_version: &str,
        dependencies: &BTreeMap<String, String>,
        _dry_run: bool,
    ) -> Result<PinnedManifest, BackendError> {
        let pins: Vec<String> = dependencies.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
        self.record(format!("pin {}@{} [{}]", package.name, own_version, pins.join(",")));
        self.pinned
            .lock()
            .unwrap()
            .insert(package.name.clone(), own_version.to_string());
        Ok(PinnedManifest::untouched(&package.manifest_path))
    }

    async fn build(&self, package_dir: &Path, output_dir: &Path, dry_run: bool) -> Result<CommandOutput, BackendError> {
        let name = package_name(package_dir);
        self.record(format!("build {}", name));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.build_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_builds.lock().unwrap().contains(&name) {
            return Ok(CommandOutput::failure("fake build", format!("{} does not compile", name)));
        }
        if !dry_run {
            std::fs::write(output_dir.join(format!("{}.crate", name)), name.as_bytes())
                .map_err(|e| BackendError::CommandFailed {
                    command: "fake build".to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(CommandOutput::success("fake build"))
    }

    async fn publish(
        &self,
        package: &Package,
        _artifacts: &[PathBuf],
        _index_url: Option<&str>,
        dry_run: bool,
    ) -> Result<CommandOutput, BackendError> {
        self.record(format!("publish {}", package.name));
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Transient {
                reason: "503 Service Unavailable".to_string(),
            });
        }
        if !dry_run {
            let version = self
                .pinned
                .lock()
                .unwrap()
                .get(&package.name)
                .cloned()
                .unwrap_or_else(|| package.version.clone());
            self.registry.make_available(&package.name, &version);
        }
        Ok(CommandOutput::success("fake publish"))
    }

    async fn smoke_test(&self, name: &str, version: &str, _dry_run: bool) -> Result<CommandOutput, BackendError> {
        self.record(format!("smoke {}@{}", name, version));
        Ok(CommandOutput::success("fake smoke test"))
    }
}

/// Git stand-in keeping tags in memory
#[derive(Default)]
pub struct FakeVcs {
    tags: Mutex<BTreeSet<String>>,
    pushes: Mutex<Vec<Vec<String>>>,
    deleted: Mutex<Vec<String>>,
    /// Tags whose creation fails
    pub failing_tags: Mutex<BTreeSet<String>>,
    /// Report the push as rejected
    pub reject_push: Mutex<bool>,
}

impl FakeVcs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_tags(tags: &[&str]) -> Arc<Self> {
        let vcs = Self::default();
        vcs.tags.lock().unwrap().extend(tags.iter().map(|t| t.to_string()));
        Arc::new(vcs)
    }

    pub fn tags(&self) -> BTreeSet<String> {
        self.tags.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<Vec<String>> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn tag_exists(&self, name: &str) -> Result<bool, BackendError> {
        Ok(self.tags.lock().unwrap().contains(name))
    }

    async fn tag(&self, name: &str, _message: &str, dry_run: bool) -> Result<(), BackendError> {
        if self.failing_tags.lock().unwrap().contains(name) {
            return Err(BackendError::CommandFailed {
                command: format!("git tag {}", name),
                reason: "cannot lock ref".to_string(),
            });
        }
        if !dry_run {
            self.tags.lock().unwrap().insert(name.to_string());
        }
        Ok(())
    }

    async fn delete_tag(&self, name: &str, _remote: Option<&str>, dry_run: bool) -> Result<(), BackendError> {
        if !dry_run {
            self.tags.lock().unwrap().remove(name);
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn push(&self, tags: &[String], _remote: &str, _dry_run: bool) -> Result<CommandOutput, BackendError> {
        self.pushes.lock().unwrap().push(tags.to_vec());
        if *self.reject_push.lock().unwrap() {
            return Ok(CommandOutput::failure("git push", "remote rejected"));
        }
        Ok(CommandOutput::success("git push"))
    }
}

/// Forge recording release requests
#[derive(Default)]
pub struct FakeForge {
    requests: Mutex<Vec<ReleaseRequest>>,
    deleted: Mutex<Vec<String>>,
    /// Fail every create_release call
    pub fail_create: Mutex<bool>,
}

impl FakeForge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<ReleaseRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn is_available(&self) -> bool {
        true
    }

    async fn create_release(&self, request: &ReleaseRequest, _dry_run: bool) -> Result<String, BackendError> {
        // Assets only live as long as the call, so check them here
        for asset in &request.assets {
            assert!(asset.is_file(), "asset {} missing at upload time", asset.display());
        }
        self.requests.lock().unwrap().push(request.clone());
        if *self.fail_create.lock().unwrap() {
            return Err(BackendError::Http {
                url: "https://forge.test/releases".to_string(),
                reason: "422 Validation Failed".to_string(),
            });
        }
        Ok(format!("https://forge.test/releases/{}", request.tag))
    }

    async fn delete_release(&self, tag: &str, _dry_run: bool) -> Result<(), BackendError> {
        self.deleted.lock().unwrap().push(tag.to_string());
        Ok(())
    }
}

/// Observer that keeps every stage transition
#[derive(Default)]
pub struct RecordingObserver {
    pub initialized: Mutex<Vec<(String, usize, String)>>,
    pub stages: Mutex<Vec<(String, Stage)>>,
    pub errors: Mutex<Vec<(String, String)>>,
    pub completed: AtomicUsize,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stages_of(&self, name: &str) -> Vec<Stage> {
        self.stages
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Index of the first event for `name` reaching `stage`
    pub fn position(&self, name: &str, stage: Stage) -> Option<usize> {
        self.stages
            .lock()
            .unwrap()
            .iter()
            .position(|(n, s)| n == name && *s == stage)
    }
}

impl Observer for RecordingObserver {
    fn init_packages(&self, packages: &[(String, usize, String)]) {
        self.initialized.lock().unwrap().extend_from_slice(packages);
    }

    fn on_stage(&self, name: &str, stage: Stage) {
        self.stages.lock().unwrap().push((name.to_string(), stage));
    }

    fn on_error(&self, name: &str, message: &str) {
        self.errors.lock().unwrap().push((name.to_string(), message.to_string()));
    }

    fn on_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Package rooted in `root/<name>` so fakes can recover the name from the build dir
pub fn package(root: &Path, name: &str, version: &str, deps: &[&str]) -> Package {
    Package::new(name, version, root.join(name)).with_internal_deps(deps.iter().copied())
}
