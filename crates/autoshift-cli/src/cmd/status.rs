use crate::output::print_json;
use autoshift_core::StatusProvider;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = super::load_config(config_path)?;
    let provider = cfg.status_provider();
    let target = cfg.readiness.target_status.clone();

    let rt = tokio::runtime::Runtime::new()?;
    let status = rt.block_on(provider.status())?;
    let ready = status == target;

    if json {
        print_json(&serde_json::json!({
            "status": status,
            "target_status": target,
            "ready": ready,
        }))?;
    } else {
        println!("{status}");
    }
    Ok(())
}
