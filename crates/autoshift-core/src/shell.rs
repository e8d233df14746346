//! Shell-backed capabilities.
//!
//! Every external tool (`oc`, `bash`, `helm`) is described by a
//! [`CommandSpec`] and run through [`run_command`], which resolves the program
//! on `PATH`, drains stdout and stderr line by line, and hands each line to an
//! optional [`EventSink`] as it arrives.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::capability::{EventSink, RemediationAction, StatusProvider};
use crate::error::{ReadinessError, Result};

/// Longest stderr excerpt carried in an error message.
const STDERR_HINT_CHARS: usize = 500;

// ─── CommandSpec ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// `sh -c <script>`; handy for one-liners in config files and tests.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh", ["-c".to_string(), script.into()])
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The command line as a user would type it, for log lines.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build(&self) -> Result<Command> {
        let exe = which::which(&self.program)
            .map_err(|_| ReadinessError::CommandNotFound(self.program.clone()))?;
        let mut cmd = Command::new(exe);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        Ok(cmd)
    }
}

// ─── run_command ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// A short human description of a failed exit, including stderr.
    pub fn failure_summary(&self, spec: &CommandSpec) -> String {
        let exit = match self.code {
            Some(code) => format!("'{}' exited with code {code}", spec.program),
            None => format!("'{}' terminated by signal", spec.program),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            exit
        } else {
            let hint: String = stderr.chars().take(STDERR_HINT_CHARS).collect();
            format!("{exit}\nstderr: {hint}")
        }
    }
}

/// Run `spec` to completion, forwarding each output line to `lines` if given.
pub async fn run_command(
    spec: &CommandSpec,
    lines: Option<&dyn EventSink>,
) -> Result<CommandOutput> {
    let mut child = spec
        .build()?
        .spawn()
        .map_err(|source| ReadinessError::CommandSpawn {
            program: spec.program.clone(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

    let (stdout, stderr) = tokio::join!(drain(stdout, lines), drain(stderr, lines));
    let status = child.wait().await?;

    Ok(CommandOutput {
        code: status.code(),
        stdout: stdout?,
        stderr: stderr?,
    })
}

/// Read `pipe` to EOF, decoding each line lossily.
///
/// Stopping early would close the pipe under a still-running child, so a
/// line that isn't valid UTF-8 is kept with replacement characters instead.
async fn drain<R>(pipe: R, lines: Option<&dyn EventSink>) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut raw = Vec::new();
    let mut buf = String::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end_matches(['\n', '\r']);
        if let Some(sink) = lines {
            if !line.trim().is_empty() {
                sink.log(line);
            }
        }
        if !buf.is_empty() {
            buf.push('\n');
        }
        buf.push_str(line);
    }
    Ok(buf)
}

/// Strip whitespace and the quotes `-o jsonpath='{...}'` leaves around a value.
pub fn normalize_status(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '\'' || c == '"')
        .trim()
        .to_string()
}

// ─── ShellStatusProvider ──────────────────────────────────────────────────

/// Markers `oc` prints when the queried resource or its CRD does not exist.
const ABSENT_MARKERS: &[&str] = &[
    "NotFound",
    "not found",
    "doesn't have a resource type",
];

/// True when `stderr` says the resource is missing rather than unreachable.
pub fn looks_absent(stderr: &str) -> bool {
    ABSENT_MARKERS.iter().any(|m| stderr.contains(m))
}

#[derive(Debug, Clone)]
pub struct ShellStatusProvider {
    spec: CommandSpec,
    absent_status: Option<String>,
}

impl ShellStatusProvider {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            absent_status: None,
        }
    }

    /// Report `status` instead of an error when the resource doesn't exist yet.
    ///
    /// Before the bootstrap script has run there is no `MultiClusterHub` at
    /// all, and that has to read as "not ready" rather than as a failed query.
    pub fn with_absent_status(mut self, status: impl Into<String>) -> Self {
        self.absent_status = Some(status.into());
        self
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

#[async_trait]
impl StatusProvider for ShellStatusProvider {
    async fn status(&self) -> Result<String> {
        let output = run_command(&self.spec, None).await?;
        if !output.success() {
            if let Some(absent) = &self.absent_status {
                if looks_absent(&output.stderr) {
                    return Ok(absent.clone());
                }
            }
            return Err(ReadinessError::StatusQuery(
                output.failure_summary(&self.spec),
            ));
        }
        Ok(normalize_status(&output.stdout))
    }
}

// ─── ShellRemediation ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShellRemediation {
    spec: CommandSpec,
}

impl ShellRemediation {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

#[async_trait]
impl RemediationAction for ShellRemediation {
    async fn run(&self, sink: &dyn EventSink) -> Result<()> {
        sink.log(&format!("running: {}", self.spec.display()));
        let output = run_command(&self.spec, Some(sink))
            .await
            .map_err(|e| ReadinessError::Remediation(e.to_string()))?;
        if !output.success() {
            return Err(ReadinessError::Remediation(
                output.failure_summary(&self.spec),
            ));
        }
        Ok(())
    }
}
