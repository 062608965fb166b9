//! Run state tracking and persistence.
//!
//! The orchestrator rewrites the state file after every level so an
//! interrupted run can be diagnosed and resumed.

mod manager;
mod run_state;

pub use manager::{state_file_path, StateManager};
pub use run_state::{PackageProgress, RunState, STATE_FORMAT_VERSION};
