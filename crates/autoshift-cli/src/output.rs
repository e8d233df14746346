use autoshift_core::{EventSink, RunOutcome};
use serde::Serialize;

/// Pretty-print `value` as the last thing on stdout, after any streamed log lines.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Prints command output as it streams. Under `--json` lines go to stderr so
/// stdout stays parseable.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    pub to_stderr: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { to_stderr: json }
    }
}

impl EventSink for ConsoleSink {
    fn log(&self, line: &str) {
        if self.to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    fn complete(&self, _outcome: &RunOutcome) {}
}
