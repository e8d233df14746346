//! Readiness orchestration for installing AutoShift onto an
//! OpenShift hub.
//!
//! A run polls a [`StatusProvider`] until it reports the target status. The
//! first time it sees anything else it fires the [`RemediationAction`] (the
//! bootstrap install) exactly once, without waiting for it, and keeps polling.
//! Every observation goes to an [`EventSink`] as a log line; the run ends with
//! one terminal [`RunOutcome`].
//!
//! # Quick start
//!
//! ```rust,ignore
//! use autoshift_core::{AutoShiftConfig, Orchestrator, TracingSink};
//!
//! let cfg = AutoShiftConfig::load("autoshift.yaml".as_ref())?;
//! let orchestrator = Orchestrator::new(cfg.orchestrator_config()?)?;
//! let handle = orchestrator.start(cfg.status_provider(), cfg.remediation(), TracingSink)?;
//! let outcome = handle.wait().await;
//! println!("{outcome}");
//! ```

pub mod capability;
pub mod cluster;
pub mod config;
pub mod error;
pub mod io;
pub mod orchestrator;
pub mod run;
pub mod shell;
pub mod sink;
pub mod trigger;

pub use capability::{EventSink, RemediationAction, StatusProvider};
pub use config::{AutoShiftConfig, ConfigWarning, OrchestratorConfig, ReadinessSettings, WarnLevel};
pub use error::{ReadinessError, Result, RunFailure};
pub use orchestrator::{start, Orchestrator, RunHandle};
pub use run::{OrchestrationRun, RunId, RunOutcome, RunState};
pub use shell::{CommandSpec, ShellRemediation, ShellStatusProvider};
pub use sink::{BroadcastSink, CollectingSink, FanoutSink, FileSink, RunEvent, TracingSink};
pub use trigger::SingleFlight;
