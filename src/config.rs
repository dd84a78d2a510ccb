use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Read-only settings for one refresh cycle. A reload produces a new value;
/// nothing mutates a loaded config.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_kubectl_path")]
    pub kubectl_path: String,
    #[serde(default = "default_grouping_label")]
    pub grouping_label: String,
    #[serde(default = "default_true")]
    pub show_system_pods: bool,
    #[serde(default = "default_true")]
    pub show_unlabeled_pods: bool,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_usage_concurrency")]
    pub usage_concurrency: usize,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_kubectl_path() -> String {
    "kubectl".to_string()
}

fn default_grouping_label() -> String {
    "app".to_string()
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_usage_concurrency() -> usize {
    4
}

fn default_listen_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubectl_path: default_kubectl_path(),
            grouping_label: default_grouping_label(),
            show_system_pods: true,
            show_unlabeled_pods: true,
            refresh_interval_secs: default_refresh_interval_secs(),
            usage_concurrency: default_usage_concurrency(),
            listen_port: default_listen_port(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        // An empty file is a valid "all defaults" config.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.kubectl_path.contains("kubectl") {
            return Err(ConfigError::Invalid("kubectl_path must point at a kubectl binary"));
        }
        if self.grouping_label.trim().is_empty() {
            return Err(ConfigError::Invalid("grouping_label must not be empty"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh_interval_secs must be at least 1"));
        }
        if self.usage_concurrency == 0 {
            return Err(ConfigError::Invalid("usage_concurrency must be at least 1"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_yaml("").unwrap();
        assert_eq!(cfg.kubectl_path, "kubectl");
        assert_eq!(cfg.grouping_label, "app");
        assert!(cfg.show_system_pods);
        assert!(cfg.show_unlabeled_pods);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(5));
        assert_eq!(cfg.usage_concurrency, 4);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:9090");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "kubectl_path: /usr/local/bin/kubectl\ngrouping_label: tier\nshow_system_pods: false\nrefresh_interval_secs: 30"
        )
        .unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.kubectl_path, "/usr/local/bin/kubectl");
        assert_eq!(cfg.grouping_label, "tier");
        assert!(!cfg.show_system_pods);
        assert!(cfg.show_unlabeled_pods);
        assert_eq!(cfg.refresh_interval_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_yaml("grouping_label: \"\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("kubectl_path: \"\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("kubectl_path: /usr/bin/helm"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(Config::from_yaml("kubectl_path: ~/bin/kubectl-1.27").is_ok());
        assert!(matches!(
            Config::from_yaml("usage_concurrency: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("show_system_pods: maybe"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/kube-monitor.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
