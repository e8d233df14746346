use crate::output::{print_json, ConsoleSink};
use anyhow::Context;
use autoshift_core::{
    cluster, BroadcastSink, EventSink, FanoutSink, FileSink, Orchestrator, RemediationAction,
    RunEvent, RunOutcome, RunState, WarnLevel,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Command-line overrides for the `readiness` section of the config file.
#[derive(Debug, Default)]
pub struct InstallArgs {
    pub target: Option<String>,
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_failures: Option<u32>,
    pub skip_login_check: bool,
    pub skip_post_install: bool,
    pub log_dir: Option<PathBuf>,
}

/// Exit codes: 0 succeeded, 1 failed, 130 cancelled (matching SIGINT).
pub fn exit_code(state: RunState) -> i32 {
    match state {
        RunState::Succeeded => 0,
        RunState::Cancelled => 130,
        _ => 1,
    }
}

pub fn run(config_path: &Path, args: InstallArgs, json: bool) -> anyhow::Result<i32> {
    let mut cfg = super::load_config(config_path)?;
    let skip_login_check = args.skip_login_check;
    let post_install = if args.skip_post_install {
        None
    } else {
        cfg.post_install_action()
    };

    let r = &mut cfg.readiness;
    if let Some(target) = args.target {
        r.target_status = target;
    }
    if let Some(secs) = args.interval_secs {
        r.poll_interval_secs = secs;
    }
    if args.timeout_secs.is_some() {
        r.timeout_secs = args.timeout_secs;
    }
    if args.max_failures.is_some() {
        r.max_consecutive_failures = args.max_failures;
    }
    if args.log_dir.is_some() {
        cfg.log_dir = args.log_dir;
    }

    for w in cfg.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid configuration: {}", w.message),
        }
    }
    let orchestrator = Orchestrator::new(cfg.orchestrator_config()?)?;

    let broadcast = BroadcastSink::default();
    let printer_rx = broadcast.subscribe();
    let mut sink = FanoutSink::new().with(Arc::new(broadcast) as Arc<dyn EventSink>);
    let mut post_sink = FanoutSink::new().with(Arc::new(ConsoleSink::new(json)));
    if let Some(dir) = &cfg.log_dir {
        let file = FileSink::in_dir(dir)
            .with_context(|| format!("failed to open log file in {}", dir.display()))?;
        tracing::info!(path = %file.path().display(), "logging to file");
        let file: Arc<dyn EventSink> = Arc::new(file);
        sink = sink.with(Arc::clone(&file));
        post_sink = post_sink.with(file);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let (outcome, post) = rt.block_on(async move {
        if let Some(check) = &cfg.login_check {
            if !skip_login_check && !cluster::is_logged_in(check).await {
                anyhow::bail!(
                    "not logged in to a cluster ('{}' failed); run 'oc login' first",
                    check.display()
                );
            }
        }

        let printer = tokio::spawn(print_lines(printer_rx, json));
        let handle = orchestrator.start(cfg.status_provider(), cfg.remediation(), sink)?;

        let wait = handle.wait();
        tokio::pin!(wait);
        let outcome = tokio::select! {
            outcome = &mut wait => outcome,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted; cancelling");
                handle.cancel();
                wait.await
            }
        };

        // The printer stops on the Complete event; bound the wait anyway.
        let _ = tokio::time::timeout(Duration::from_secs(5), printer).await;

        let post = match (&post_install, outcome.state) {
            (Some(action), RunState::Succeeded) => {
                post_sink.log(&format!(
                    "hub is {}; installing AutoShift",
                    outcome.run.target_status
                ));
                Some(action.run(&post_sink).await)
            }
            _ => None,
        };
        Ok::<_, anyhow::Error>((outcome, post))
    })?;

    if json {
        print_json(&outcome)?;
    } else {
        report(&outcome);
    }
    if let Some(Err(e)) = post {
        anyhow::bail!("AutoShift install step failed after the hub became ready: {e}");
    }
    Ok(exit_code(outcome.state))
}

/// Echo run log lines as they arrive.
async fn print_lines(mut rx: broadcast::Receiver<RunEvent>, json: bool) {
    let console = ConsoleSink::new(json);
    loop {
        match rx.recv().await {
            Ok(RunEvent::Log { line }) => console.log(&line),
            Ok(RunEvent::Complete { .. }) => break,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                eprintln!("({n} log lines dropped)");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn report(outcome: &RunOutcome) {
    let elapsed = outcome.run.elapsed().num_seconds();
    match outcome.state {
        RunState::Succeeded if outcome.run.triggered => println!(
            "Installation complete: status {} after {} polls ({elapsed}s)",
            outcome.run.target_status, outcome.run.polls,
        ),
        RunState::Succeeded => println!(
            "Hub already {}; bootstrap not needed",
            outcome.run.target_status
        ),
        RunState::Cancelled => eprintln!("Installation cancelled after {elapsed}s"),
        _ => eprintln!("Installation failed: {outcome}"),
    }
}
