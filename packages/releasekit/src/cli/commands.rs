//! Command execution wiring JSON hand-off artifacts and concrete backends
//! into the publish orchestrator and tag manager.

use crate::backends::{CargoBackend, GitCli, GitHubForge, SparseIndexRegistry};
use crate::cli::{Args, Command, RuntimeConfig, TagTarget};
use crate::error::ReleaseError;
use crate::publish::{LogObserver, NoopObserver, Observer, PublishConfig, PublishOrchestrator};
use crate::state::StateManager;
use crate::tags::{parse_tag, ReleaseMode, TagConfig, TagManager};
use crate::version::ReleaseManifest;
use crate::workspace::{build_graph, load_packages};
use anyhow::Context;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Exit code for a run that completed with failures
pub const EXIT_NOT_OK: i32 = 1;

/// Execute the parsed command, returning the process exit code
pub async fn execute_command(args: Args) -> anyhow::Result<i32> {
    let config = RuntimeConfig::from(&args);
    let workspace = config
        .workspace_path
        .absolutize()
        .with_context(|| format!("Invalid workspace path {}", config.workspace_path.display()))?
        .into_owned();
    log::debug!("Running '{}' in {}", args.command.name(), workspace.display());

    match args.command {
        Command::Levels { packages, json } => execute_levels(&config, &packages, json),
        Command::Publish {
            packages,
            manifest,
            dry_run,
            concurrency,
            label,
            check_url,
            index_url,
            poll_timeout,
            poll_interval,
            no_smoke_test,
            no_verify_checksums,
            max_retries,
            retry_delay,
        } => {
            let mut builder = PublishConfig::builder(workspace.clone())
                .dry_run(dry_run)
                .concurrency(concurrency)
                .label(label)
                .poll_timeout(Duration::from_secs(poll_timeout))
                .poll_interval(Duration::from_secs(poll_interval))
                .smoke_test(!no_smoke_test)
                .verify_checksums(!no_verify_checksums)
                .max_retries(max_retries)
                .retry_base_delay(Duration::from_secs(retry_delay));
            if let Some(url) = check_url {
                builder = builder.check_url(url);
            }
            if let Some(url) = index_url {
                builder = builder.index_url(url);
            }
            let publish_config = builder.build().map_err(ReleaseError::from)?;
            execute_publish(&config, &packages, &manifest, publish_config).await
        }
        Command::Tag {
            manifest,
            dry_run,
            mode,
            provenance,
            target,
        } => {
            let tag_config = tag_config(&target, dry_run, mode, provenance);
            execute_tag(&config, &workspace, &manifest, tag_config, target.repo.as_deref()).await
        }
        Command::Rollback {
            manifest,
            dry_run,
            target,
        } => {
            let tag_config = tag_config(&target, dry_run, ReleaseMode::Local, None);
            execute_rollback(&config, &workspace, &manifest, tag_config, target.repo.as_deref()).await
        }
        Command::ParseTag { tag, format } => Ok(execute_parse_tag(&config, &tag, &format)),
        Command::Status { label, json } => execute_status(&config, &workspace, &label, json),
    }
}

fn tag_config(target: &TagTarget, dry_run: bool, mode: ReleaseMode, provenance: Option<PathBuf>) -> TagConfig {
    TagConfig {
        tag_format: target.tag_format.clone(),
        umbrella_format: target.umbrella_format.clone(),
        secondary_format: target.secondary_format.clone(),
        label: target.label.clone(),
        remote: target.remote.clone(),
        mode,
        provenance,
        dry_run,
    }
}

fn load_manifest(path: &Path) -> anyhow::Result<ReleaseManifest> {
    ReleaseManifest::load(path).with_context(|| format!("Failed to load release manifest {}", path.display()))
}

fn execute_levels(config: &RuntimeConfig, packages: &Path, json: bool) -> anyhow::Result<i32> {
    let packages =
        load_packages(packages).with_context(|| format!("Failed to load workspace snapshot {}", packages.display()))?;
    let graph = build_graph(&packages).map_err(ReleaseError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(graph.levels())?);
        return Ok(0);
    }

    for (index, level) in graph.levels().iter().enumerate() {
        let names: Vec<&str> = level.iter().map(String::as_str).collect();
        config.println(&format!("{}: {}", index, names.join(", ")));
    }
    Ok(0)
}

async fn execute_publish(
    config: &RuntimeConfig,
    packages: &Path,
    manifest: &Path,
    publish_config: PublishConfig,
) -> anyhow::Result<i32> {
    let packages =
        load_packages(packages).with_context(|| format!("Failed to load workspace snapshot {}", packages.display()))?;
    let manifest = load_manifest(manifest)?;
    let graph = build_graph(&packages).map_err(ReleaseError::from)?;

    let package_manager = Arc::new(CargoBackend::new().map_err(ReleaseError::from)?);
    let registry = Arc::new(match publish_config.check_url() {
        Some(url) => SparseIndexRegistry::new(url)?,
        None => SparseIndexRegistry::crates_io()?,
    });
    let observer: Arc<dyn Observer> = if config.is_quiet() {
        Arc::new(NoopObserver)
    } else {
        Arc::new(LogObserver)
    };

    let orchestrator = PublishOrchestrator::new(package_manager, registry, publish_config).with_observer(observer);
    let result = orchestrator.publish(&graph, &packages, &manifest).await?;

    for (name, message) in &result.failed {
        config.error_println(&format!("{}: {}", name, message));
    }
    if let Some(path) = &result.state_path {
        log::info!("Run state written to {}", path.display());
    }

    if result.ok() {
        config.success_println(&format!("Publish complete: {}", result.summary()));
        Ok(0)
    } else {
        config.error_println(&format!("Publish failed: {}", result.summary()));
        Ok(EXIT_NOT_OK)
    }
}

fn tag_manager(workspace: &Path, tag_config: TagConfig, repo: Option<&str>) -> anyhow::Result<TagManager> {
    let vcs = Arc::new(GitCli::open(workspace).map_err(ReleaseError::from)?);
    let manager = TagManager::new(vcs, tag_config);
    Ok(match repo {
        Some(repo) => manager.with_forge(Arc::new(GitHubForge::new(repo)?)),
        None => manager,
    })
}

async fn execute_tag(
    config: &RuntimeConfig,
    workspace: &Path,
    manifest: &Path,
    tag_config: TagConfig,
    repo: Option<&str>,
) -> anyhow::Result<i32> {
    let manifest = load_manifest(manifest)?;
    let manager = tag_manager(workspace, tag_config, repo)?;
    let result = manager.create_tags(&manifest).await.map_err(ReleaseError::from)?;

    for tag in result.created() {
        config.println(&format!("created {}", tag));
    }
    for tag in result.skipped() {
        config.println(&format!("exists  {}", tag));
    }
    for (tag, reason) in result.failed() {
        config.error_println(&format!("{}: {}", tag, reason));
    }
    if result.pushed() {
        config.success_println(&format!("Pushed {} tag(s)", result.created().len()));
    }
    if let Some(url) = result.release_url() {
        config.success_println(&format!("Release: {}", url));
    }

    Ok(if result.ok() { 0 } else { EXIT_NOT_OK })
}

async fn execute_rollback(
    config: &RuntimeConfig,
    workspace: &Path,
    manifest: &Path,
    tag_config: TagConfig,
    repo: Option<&str>,
) -> anyhow::Result<i32> {
    let manifest = load_manifest(manifest)?;
    let manager = tag_manager(workspace, tag_config, repo)?;
    let result = manager.delete_tags(&manifest).await;

    for tag in &result.deleted {
        config.println(&format!("deleted {}", tag));
    }
    for tag in &result.skipped {
        config.println(&format!("absent  {}", tag));
    }
    for (tag, reason) in &result.failed {
        config.error_println(&format!("{}: {}", tag, reason));
    }
    if result.release_deleted {
        config.success_println("Platform release deleted");
    }

    Ok(if result.ok() { 0 } else { EXIT_NOT_OK })
}

fn execute_parse_tag(config: &RuntimeConfig, tag: &str, format: &str) -> i32 {
    match parse_tag(tag, format) {
        Some((name, version)) => {
            println!("{} {}", name, version);
            0
        }
        None => {
            config.error_println(&format!("'{}' does not match '{}'", tag, format));
            EXIT_NOT_OK
        }
    }
}

fn execute_status(config: &RuntimeConfig, workspace: &Path, label: &str, json: bool) -> anyhow::Result<i32> {
    let manager = StateManager::for_workspace(workspace, label);
    let Some(state) = manager.load_if_exists()? else {
        config.warning_println(&format!("No run state at {}", manager.path().display()));
        return Ok(EXIT_NOT_OK);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(0);
    }

    config.println(&format!(
        "Run of {} (started {}, updated {}){}",
        if state.git_sha.is_empty() { "<unknown>" } else { state.git_sha.as_str() },
        state.started_at.to_rfc3339(),
        state.updated_at.to_rfc3339(),
        if state.dry_run { " [dry-run]" } else { "" }
    ));
    for (name, progress) in &state.packages {
        let error = progress.error.as_deref().map(|e| format!(" ({})", e)).unwrap_or_default();
        config.println(&format!(
            "  level {} {} {}: {}{}",
            progress.level, name, progress.version, progress.stage, error
        ));
    }
    config.println(&format!(
        "{} published, {} skipped, {} failed",
        state.published.len(),
        state.skipped.len(),
        state.failed.len()
    ));

    Ok(if state.failed.is_empty() { 0 } else { EXIT_NOT_OK })
}
