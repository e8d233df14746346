use crate::output::ConsoleSink;
use autoshift_core::shell::run_command;
use autoshift_core::{cluster, CommandSpec};

/// `oc login` against `server`. The password never reaches the console.
pub fn login(server: &str, username: &str, password: &str, json: bool) -> anyhow::Result<()> {
    let spec = cluster::login_command(server, username, password);
    run_oc(&spec, json)
        .map_err(|e| anyhow::anyhow!("login to {server} as {username} failed: {e}"))
}

pub fn logout(json: bool) -> anyhow::Result<()> {
    run_oc(&cluster::logout_command(), json).map_err(|e| anyhow::anyhow!("logout failed: {e}"))
}

fn run_oc(spec: &CommandSpec, json: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let output = rt.block_on(run_command(spec, Some(&ConsoleSink::new(json))))?;
    if !output.success() {
        anyhow::bail!("{}", output.failure_summary(spec));
    }
    Ok(())
}
