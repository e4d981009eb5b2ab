//! Configuration management for the CLI

use advisor_lib::AdvisorConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over file and environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub prometheus_url: Option<String>,
    pub namespaces: Vec<String>,
}

/// Load the advisor configuration and apply command-line overrides
pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<AdvisorConfig> {
    let mut config = AdvisorConfig::load(path).with_context(|| match path {
        Some(p) => format!("Failed to load config file {}", p.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    apply(&mut config, overrides);
    Ok(config)
}

fn apply(config: &mut AdvisorConfig, overrides: Overrides) {
    if let Some(url) = overrides.prometheus_url.filter(|u| !u.trim().is_empty()) {
        config.prometheus_url = url;
    }

    let namespaces: Vec<String> = overrides
        .namespaces
        .into_iter()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .collect();
    if !namespaces.is_empty() {
        config.namespaces = namespaces;
    }
}

/// Get kubeconfig path
pub fn kubeconfig_path(override_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("KUBECONFIG") {
        return Ok(PathBuf::from(path));
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".kube").join("config"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "namespaces: [shop]\nprometheus_url: http://file:9090").unwrap();

        let config = load(
            Some(file.path()),
            Overrides {
                prometheus_url: Some("http://flag:9090".to_string()),
                namespaces: vec!["payments".to_string(), " ".to_string()],
            },
        )
        .unwrap();

        assert_eq!(config.prometheus_url, "http://flag:9090");
        assert_eq!(config.namespaces, vec!["payments"]);
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let mut config = AdvisorConfig {
            prometheus_url: "http://file:9090".to_string(),
            namespaces: vec!["shop".to_string()],
            ..Default::default()
        };
        apply(
            &mut config,
            Overrides {
                prometheus_url: Some(String::new()),
                namespaces: Vec::new(),
            },
        );
        assert_eq!(config.prometheus_url, "http://file:9090");
        assert_eq!(config.namespaces, vec!["shop"]);
    }

    #[test]
    fn test_kubeconfig_override() {
        let path = kubeconfig_path(Some("/tmp/kubeconfig")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/kubeconfig"));
    }
}
