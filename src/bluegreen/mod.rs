// ABOUTME: Blue/green rollout engine for Marathon applications behind HAProxy.
// ABOUTME: Probe picks colour and port, orchestrator creates, drain retires the old app.

pub mod drain;
mod error;
pub mod labels;
mod options;
mod orchestrator;
mod probe;

pub use drain::{DrainController, DrainOutcome, DrainReport, Step, WaitReason};
pub use error::{BlueGreenError, BlueGreenErrorKind};
pub use labels::{DeploymentLabels, LabelError};
pub use options::BlueGreenOptions;
pub use orchestrator::{BlueGreen, Rollout};
pub use probe::{AppState, probe};
