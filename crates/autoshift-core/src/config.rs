use crate::cluster;
use crate::error::{ReadinessError, Result};
use crate::shell::{CommandSpec, ShellRemediation, ShellStatusProvider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "autoshift.yaml";

/// Intervals below this get a lint warning; they hammer the API server.
const SHORT_POLL_WARN_SECS: u64 = 2;

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Parameters for one readiness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Status value that ends the run successfully.
    pub target_status: String,
    pub poll_interval: Duration,
    /// `None` keeps retrying failed status queries forever.
    pub max_consecutive_failures: Option<u32>,
    /// Overall limit measured from the start of the run.
    pub deadline: Option<Duration>,
    /// A single status query slower than this counts as a failed query.
    pub query_timeout: Option<Duration>,
}

impl OrchestratorConfig {
    pub fn new(target_status: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            target_status: target_status.into(),
            poll_interval,
            max_consecutive_failures: None,
            deadline: None,
            query_timeout: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = Some(max);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_status.trim().is_empty() {
            return Err(ReadinessError::InvalidConfig(
                "target status must not be empty".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ReadinessError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(ReadinessError::InvalidConfig(
                "max consecutive failures must be at least 1 (omit it for unlimited)".into(),
            ));
        }
        if self.query_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ReadinessError::InvalidConfig(
                "query timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new(
            cluster::HUB_READY_PHASE,
            Duration::from_secs(default_poll_interval_secs()),
        )
    }
}

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ReadinessSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_target_status")]
    pub target_status: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout_secs: Option<u64>,
    /// Status reported when the status command says the resource is missing.
    #[serde(default = "default_absent_status")]
    pub absent_status: Option<String>,
}

fn default_target_status() -> String {
    cluster::HUB_READY_PHASE.to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_absent_status() -> Option<String> {
    Some(cluster::HUB_ABSENT_STATUS.to_string())
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            target_status: default_target_status(),
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: None,
            max_consecutive_failures: None,
            query_timeout_secs: None,
            absent_status: default_absent_status(),
        }
    }
}

// ---------------------------------------------------------------------------
// AutoShiftConfig
// ---------------------------------------------------------------------------

/// Contents of `autoshift.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoShiftConfig {
    #[serde(default)]
    pub readiness: ReadinessSettings,
    #[serde(default = "default_status_command")]
    pub status_command: CommandSpec,
    #[serde(default = "default_remediation_command")]
    pub remediation_command: CommandSpec,
    /// Run before installing; a non-zero exit means "not logged in".
    #[serde(default = "default_login_check")]
    pub login_check: Option<CommandSpec>,
    /// Run once the readiness run succeeds; `null` skips it.
    #[serde(default = "default_post_install")]
    pub post_install: Option<CommandSpec>,
    /// Directory for per-session log files. No file logging when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_status_command() -> CommandSpec {
    cluster::hub_phase_command(cluster::HUB_NAMESPACE, cluster::HUB_NAME)
}

fn default_remediation_command() -> CommandSpec {
    cluster::bootstrap_command(cluster::BOOTSTRAP_SCRIPT)
}

fn default_login_check() -> Option<CommandSpec> {
    Some(cluster::login_check_command())
}

fn default_post_install() -> Option<CommandSpec> {
    Some(cluster::install_autoshift_command(cluster::INSTALL_SCRIPT))
}

impl Default for AutoShiftConfig {
    fn default() -> Self {
        Self {
            readiness: ReadinessSettings::default(),
            status_command: default_status_command(),
            remediation_command: default_remediation_command(),
            login_check: default_login_check(),
            post_install: default_post_install(),
            log_dir: None,
        }
    }
}

impl AutoShiftConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReadinessError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: AutoShiftConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Build the run parameters, rejecting values the orchestrator can't use.
    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig> {
        let r = &self.readiness;
        let cfg = OrchestratorConfig {
            target_status: r.target_status.clone(),
            poll_interval: Duration::from_secs(r.poll_interval_secs),
            max_consecutive_failures: r.max_consecutive_failures,
            deadline: r.timeout_secs.map(Duration::from_secs),
            query_timeout: r.query_timeout_secs.map(Duration::from_secs),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn status_provider(&self) -> ShellStatusProvider {
        let provider = ShellStatusProvider::new(self.status_command.clone());
        match &self.readiness.absent_status {
            Some(absent) => provider.with_absent_status(absent.clone()),
            None => provider,
        }
    }

    pub fn remediation(&self) -> ShellRemediation {
        ShellRemediation::new(self.remediation_command.clone())
    }

    pub fn post_install_action(&self) -> Option<ShellRemediation> {
        self.post_install.clone().map(ShellRemediation::new)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let r = &self.readiness;

        if let Err(e) = self.orchestrator_config() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: e.to_string(),
            });
        }

        let commands = [
            ("status_command", Some(&self.status_command)),
            ("remediation_command", Some(&self.remediation_command)),
            ("login_check", self.login_check.as_ref()),
            ("post_install", self.post_install.as_ref()),
        ];
        for (field, spec) in commands {
            if let Some(spec) = spec {
                if spec.program.trim().is_empty() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("{field}: program is empty"),
                    });
                }
            }
        }

        if r.poll_interval_secs > 0 && r.poll_interval_secs < SHORT_POLL_WARN_SECS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "readiness.poll_interval_secs={} is very short for a cluster API",
                    r.poll_interval_secs
                ),
            });
        }

        if let Some(timeout) = r.timeout_secs {
            if timeout < r.poll_interval_secs {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "readiness.timeout_secs={timeout} is shorter than one poll interval ({}s)",
                        r.poll_interval_secs
                    ),
                });
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn orchestrator_config_rejects_empty_target() {
        let err = OrchestratorConfig::new("  ", Duration::from_secs(1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ReadinessError::InvalidConfig(ref m) if m.contains("target")));
    }

    #[test]
    fn orchestrator_config_rejects_zero_interval() {
        let err = OrchestratorConfig::new("Running", Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ReadinessError::InvalidConfig(ref m) if m.contains("interval")));
    }

    #[test]
    fn orchestrator_config_rejects_zero_failure_limit() {
        let cfg = OrchestratorConfig::new("Running", Duration::from_millis(1))
            .with_max_consecutive_failures(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn orchestrator_config_accepts_millisecond_interval() {
        let cfg = OrchestratorConfig::new("Running", Duration::from_millis(1))
            .with_deadline(Duration::from_millis(50))
            .with_query_timeout(Duration::from_millis(20));
        cfg.validate().unwrap();
    }

    #[test]
    fn default_config_targets_hub_running() {
        let cfg = AutoShiftConfig::default();
        assert_eq!(cfg.readiness.target_status, "Running");
        assert_eq!(cfg.readiness.poll_interval_secs, 10);
        assert_eq!(cfg.status_command.program, "oc");
        assert_eq!(cfg.remediation_command.program, "bash");
        assert!(cfg.login_check.is_some());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn save_then_load_preserves_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut cfg = AutoShiftConfig::default();
        cfg.readiness.timeout_secs = Some(600);
        cfg.log_dir = Some(PathBuf::from("data/logs"));
        cfg.save(&path).unwrap();

        let loaded = AutoShiftConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let dir = TempDir::new().unwrap();
        let err = AutoShiftConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ReadinessError::ConfigNotFound(_)));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "readiness:\n  poll_interval_secs: 5\nstatus_command:\n  program: sh\n  args: [\"-c\", \"echo Running\"]\n";
        let cfg: AutoShiftConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.readiness.poll_interval_secs, 5);
        assert_eq!(cfg.readiness.target_status, "Running");
        assert_eq!(cfg.status_command.args, vec!["-c", "echo Running"]);
        assert_eq!(cfg.remediation_command.program, "bash");
    }

    #[test]
    fn explicit_null_login_check_disables_it() {
        let cfg: AutoShiftConfig = serde_yaml::from_str("login_check: null\n").unwrap();
        assert!(cfg.login_check.is_none());
    }

    #[test]
    fn post_install_defaults_to_install_script_and_can_be_disabled() {
        let cfg = AutoShiftConfig::default();
        let spec = cfg.post_install_action().unwrap();
        assert_eq!(spec.spec().args, vec!["-c", cluster::INSTALL_SCRIPT]);

        let cfg: AutoShiftConfig = serde_yaml::from_str("post_install: null\n").unwrap();
        assert!(cfg.post_install_action().is_none());
    }

    #[test]
    fn post_install_accepts_helm_preset() {
        let yaml = serde_yaml::to_string(&cluster::helm_gitops_command(
            cluster::GITOPS_CHART,
            cluster::GITOPS_VALUES,
        ))
        .unwrap();
        let doc = format!("post_install:\n{}", indent(&yaml));
        let cfg: AutoShiftConfig = serde_yaml::from_str(&doc).unwrap();
        assert_eq!(cfg.post_install.unwrap().program, "helm");
    }

    fn indent(yaml: &str) -> String {
        yaml.lines().map(|l| format!("  {l}\n")).collect()
    }

    #[test]
    fn validate_flags_empty_post_install_program() {
        let mut cfg = AutoShiftConfig::default();
        cfg.post_install = Some(CommandSpec::new("", Vec::<String>::new()));
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("post_install")));
    }

    #[test]
    fn orchestrator_config_converts_seconds() {
        let mut cfg = AutoShiftConfig::default();
        cfg.readiness.timeout_secs = Some(90);
        cfg.readiness.max_consecutive_failures = Some(3);
        let oc = cfg.orchestrator_config().unwrap();
        assert_eq!(oc.poll_interval, Duration::from_secs(10));
        assert_eq!(oc.deadline, Some(Duration::from_secs(90)));
        assert_eq!(oc.max_consecutive_failures, Some(3));
        assert_eq!(oc.query_timeout, None);
    }

    #[test]
    fn absent_status_defaults_and_can_be_disabled() {
        assert_eq!(
            AutoShiftConfig::default().readiness.absent_status.as_deref(),
            Some("NotInstalled")
        );
        let cfg: AutoShiftConfig =
            serde_yaml::from_str("readiness:\n  absent_status: null\n").unwrap();
        assert!(cfg.readiness.absent_status.is_none());
    }

    #[test]
    fn validate_flags_zero_interval_and_empty_program() {
        let mut cfg = AutoShiftConfig::default();
        cfg.readiness.poll_interval_secs = 0;
        cfg.remediation_command.program = String::new();
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("poll interval")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("remediation_command")));
    }

    #[test]
    fn validate_warns_on_short_interval_and_tight_timeout() {
        let mut cfg = AutoShiftConfig::default();
        cfg.readiness.poll_interval_secs = 1;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("very short")));

        let mut cfg = AutoShiftConfig::default();
        cfg.readiness.timeout_secs = Some(5);
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("shorter than one poll interval")));
    }
}
