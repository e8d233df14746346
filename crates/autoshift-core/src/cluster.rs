//! Commands for the OpenShift hub AutoShift installs onto.
//!
//! The readiness signal is the phase of the `MultiClusterHub` resource; the
//! remediation is the bootstrap script that installs the ACM and GitOps
//! operators. Once the hub is running, AutoShift itself goes on through its
//! install script or a helm release. All of these are plain [`CommandSpec`]s
//! so a config file can override them.

use crate::shell::{run_command, CommandSpec};

pub const HUB_NAME: &str = "multiclusterhub";
pub const HUB_NAMESPACE: &str = "open-cluster-management";
/// Phase reported by a healthy hub.
pub const HUB_READY_PHASE: &str = "Running";
/// Reported in place of a phase while no hub exists yet.
pub const HUB_ABSENT_STATUS: &str = "NotInstalled";
pub const BOOTSTRAP_SCRIPT: &str = "scripts/install-bootstrap.sh";
/// Installs AutoShift itself once the hub is up.
pub const INSTALL_SCRIPT: &str = "scripts/install-autoshift.sh";

pub const GITOPS_RELEASE: &str = "openshift-gitops";
pub const GITOPS_CHART: &str = "openshift-gitops";
pub const GITOPS_VALUES: &str = "autoshiftv2/policies/values.yaml";

/// `oc get mch <name> -n <namespace> -o jsonpath={.status.phase}`
pub fn hub_phase_command(namespace: &str, name: &str) -> CommandSpec {
    CommandSpec::new(
        "oc",
        [
            "get",
            "mch",
            name,
            "-n",
            namespace,
            "-o",
            "jsonpath={.status.phase}",
        ],
    )
}

/// `bash -c <script>`
pub fn bootstrap_command(script: &str) -> CommandSpec {
    CommandSpec::new("bash", ["-c", script])
}

/// `bash -c <script>` for the AutoShift install that follows the hub.
pub fn install_autoshift_command(script: &str) -> CommandSpec {
    bootstrap_command(script)
}

/// `helm upgrade --install openshift-gitops <chart> -f <values>`
pub fn helm_gitops_command(chart: &str, values: &str) -> CommandSpec {
    CommandSpec::new(
        "helm",
        ["upgrade", "--install", GITOPS_RELEASE, chart, "-f", values],
    )
}

/// `oc login <server> --username=<user> --password=<password>`
///
/// The password sits in the argument list, so never log [`CommandSpec::display`]
/// for this command.
pub fn login_command(server: &str, username: &str, password: &str) -> CommandSpec {
    CommandSpec::new(
        "oc",
        [
            "login".to_string(),
            server.to_string(),
            format!("--username={username}"),
            format!("--password={password}"),
        ],
    )
}

pub fn logout_command() -> CommandSpec {
    CommandSpec::new("oc", ["logout"])
}

/// `oc status`, which exits non-zero when there is no active login.
pub fn login_check_command() -> CommandSpec {
    CommandSpec::new("oc", ["status"])
}

/// Run `check` and report whether it exited cleanly.
///
/// A missing binary or spawn failure counts as not logged in.
pub async fn is_logged_in(check: &CommandSpec) -> bool {
    match run_command(check, None).await {
        Ok(output) => output.success(),
        Err(e) => {
            tracing::debug!("login check failed: {e}");
            false
        }
    }
}
