//! The three collaborators a readiness run talks to.
//!
//! ```text
//! Orchestrator ──status()──▶ StatusProvider       (oc get mch …)
//!      │       ──run()─────▶ RemediationAction    (install-bootstrap.sh)
//!      └──────── log()/complete() ─▶ EventSink    (terminal, log file, UI)
//! ```
//!
//! Real implementations live in [`crate::shell`] and [`crate::sink`]; tests
//! substitute scripted ones.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::run::RunOutcome;

/// Reports the current status of the managed resource.
///
/// May be slow or fail. Never called concurrently for the same run.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn status(&self) -> Result<String>;
}

/// The one-shot action fired when the resource is not yet ready.
///
/// `sink` receives any output the action wants to surface while it runs.
#[async_trait]
pub trait RemediationAction: Send + Sync {
    async fn run(&self, sink: &dyn EventSink) -> Result<()>;
}

/// Receives log lines and exactly one completion per run.
///
/// Implementations must tolerate concurrent calls from several runs.
pub trait EventSink: Send + Sync {
    fn log(&self, line: &str);

    fn complete(&self, outcome: &RunOutcome);
}

#[async_trait]
impl<T: StatusProvider + ?Sized> StatusProvider for Arc<T> {
    async fn status(&self) -> Result<String> {
        (**self).status().await
    }
}

#[async_trait]
impl<T: RemediationAction + ?Sized> RemediationAction for Arc<T> {
    async fn run(&self, sink: &dyn EventSink) -> Result<()> {
        (**self).run(sink).await
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn log(&self, line: &str) {
        (**self).log(line)
    }

    fn complete(&self, outcome: &RunOutcome) {
        (**self).complete(outcome)
    }
}
