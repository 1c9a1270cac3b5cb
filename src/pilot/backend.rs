use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::Error;
use crate::supervisor::AgentCommand;

/// Environment variable selecting the backend.
pub const ENV_PILOT_TYPE: &str = "PILOT_TYPE";

/// Supported log-shipping agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Filebeat,
    /// Supports live reload through `SIGHUP`.
    Fluentd,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Filebeat => "filebeat",
            BackendKind::Fluentd => "fluentd",
        }
    }

    pub fn supports_reload(&self) -> bool {
        matches!(self, BackendKind::Fluentd)
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filebeat" => Ok(BackendKind::Filebeat),
            "fluentd" => Ok(BackendKind::Fluentd),
            other => Err(Error::InvalidBackendType(other.to_owned())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an agent lives on disk and how it is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLayout {
    pub command: AgentCommand,
    /// Root of the agent's configuration.
    pub base_conf: PathBuf,
    /// Directory holding one config file per entity.
    pub conf_dir: PathBuf,
    /// Extension of per-entity config files, without the dot.
    pub conf_extension: String,
    /// The agent's persisted offset registry.
    pub registry_path: PathBuf,
}

impl AgentLayout {
    /// Returns the layout used by the stock agent images.
    pub fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Filebeat => Self::rooted(
                "/usr/bin/filebeat",
                "/etc/filebeat",
                "filebeat.yml",
                "prospectors.d",
                "yml",
                "/var/lib/filebeat/registry",
            ),
            BackendKind::Fluentd => Self::rooted(
                "/usr/bin/fluentd",
                "/etc/fluentd",
                "fluent.conf",
                "conf.d",
                "conf",
                "/var/lib/fluentd/registry",
            ),
        }
    }

    fn rooted(
        program: &str,
        base_conf: &str,
        conf_file: &str,
        conf_dir: &str,
        conf_extension: &str,
        registry_path: &str,
    ) -> Self {
        let base_conf = PathBuf::from(base_conf);
        let conf_file = base_conf.join(conf_file).to_string_lossy().into_owned();
        Self {
            command: AgentCommand::new(program, ["-c".to_owned(), conf_file]),
            conf_dir: base_conf.join(conf_dir),
            base_conf,
            conf_extension: conf_extension.to_owned(),
            registry_path: PathBuf::from(registry_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_kind() {
        assert_eq!("filebeat".parse::<BackendKind>().unwrap(), BackendKind::Filebeat);
        assert_eq!("fluentd".parse::<BackendKind>().unwrap(), BackendKind::Fluentd);
        for invalid in ["", "Filebeat", "logstash"] {
            let err = invalid.parse::<BackendKind>().unwrap_err();
            assert!(matches!(err, Error::InvalidBackendType(ref v) if v == invalid));
        }
    }

    #[test]
    fn test_filebeat_layout() {
        let layout = AgentLayout::for_kind(BackendKind::Filebeat);
        assert_eq!(layout.command.program, PathBuf::from("/usr/bin/filebeat"));
        assert_eq!(layout.command.args, vec!["-c", "/etc/filebeat/filebeat.yml"]);
        assert_eq!(layout.conf_dir, PathBuf::from("/etc/filebeat/prospectors.d"));
        assert_eq!(layout.conf_extension, "yml");
        assert_eq!(layout.registry_path, PathBuf::from("/var/lib/filebeat/registry"));
    }

    #[test]
    fn test_fluentd_layout() {
        let layout = AgentLayout::for_kind(BackendKind::Fluentd);
        assert_eq!(layout.base_conf, PathBuf::from("/etc/fluentd"));
        assert_eq!(layout.conf_dir, PathBuf::from("/etc/fluentd/conf.d"));
        assert!(BackendKind::Fluentd.supports_reload());
        assert!(!BackendKind::Filebeat.supports_reload());
    }
}
