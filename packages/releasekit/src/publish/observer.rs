//! Progress reporting hooks for the publish orchestrator.

use crate::publish::Stage;

/// Receives publish progress events
///
/// Called from concurrently running package tasks, so implementations must
/// be thread-safe.
pub trait Observer: Send + Sync {
    /// Every package that will be published, as `(name, level, version)`
    fn init_packages(&self, packages: &[(String, usize, String)]);

    /// A package entered a stage
    fn on_stage(&self, name: &str, stage: Stage);

    /// A package failed
    fn on_error(&self, name: &str, message: &str);

    /// The run finished, successfully or not
    fn on_complete(&self);
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn init_packages(&self, _packages: &[(String, usize, String)]) {}
    fn on_stage(&self, _name: &str, _stage: Stage) {}
    fn on_error(&self, _name: &str, _message: &str) {}
    fn on_complete(&self) {}
}

/// Observer that forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn init_packages(&self, packages: &[(String, usize, String)]) {
        log::info!("Publishing {} package(s)", packages.len());
        for (name, level, version) in packages {
            log::info!("  level {}: {} {}", level, name, version);
        }
    }

    fn on_stage(&self, name: &str, stage: Stage) {
        match stage {
            Stage::Done => log::info!("{}: published", name),
            Stage::Skipped => log::info!("{}: already published", name),
            stage => log::info!("{}: {}", name, stage),
        }
    }

    fn on_error(&self, name: &str, message: &str) {
        log::error!("{}: {}", name, message);
    }

    fn on_complete(&self) {
        log::info!("Publish run complete");
    }
}
