use autoshift_core::{cluster, AutoShiftConfig, CommandSpec};
use clap::ValueEnum;
use std::path::Path;

/// What `autoshift install` runs once the hub reports ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PostInstall {
    /// `bash -c scripts/install-autoshift.sh`
    #[default]
    Script,
    /// `helm upgrade --install openshift-gitops ...`
    Gitops,
    None,
}

impl PostInstall {
    fn command(self) -> Option<CommandSpec> {
        match self {
            PostInstall::Script => Some(cluster::install_autoshift_command(
                cluster::INSTALL_SCRIPT,
            )),
            PostInstall::Gitops => Some(cluster::helm_gitops_command(
                cluster::GITOPS_CHART,
                cluster::GITOPS_VALUES,
            )),
            PostInstall::None => None,
        }
    }
}

pub fn run(config_path: &Path, force: bool, post_install: PostInstall) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    let cfg = AutoShiftConfig {
        post_install: post_install.command(),
        ..AutoShiftConfig::default()
    };
    cfg.save(config_path)?;
    println!("Wrote {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_pick_the_matching_command() {
        assert_eq!(PostInstall::Script.command().unwrap().program, "bash");
        assert_eq!(PostInstall::Gitops.command().unwrap().program, "helm");
        assert!(PostInstall::None.command().is_none());
    }
}
