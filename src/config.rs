use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Immutable process configuration, built once at startup and passed by
/// reference to every component. Nothing else reads ambient state.
#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    pub github: GithubConfig,
    pub freshdesk: FreshdeskConfig,
    pub board: BoardConfig,
    pub sync: SyncOptions,
}

#[derive(Debug, Deserialize)]
pub struct GithubConfig {
    /// Organization that owns the repositories and the project board.
    pub org: String,
    /// Projects v2 board number within the organization.
    pub project_number: u32,
    /// API token; falls back to the GITHUB_TOKEN environment variable.
    #[serde(default)]
    pub token: Option<String>,
    /// Optional primary-language filter restricting which repositories
    /// participate in the sync.
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FreshdeskConfig {
    /// Helpdesk domain, e.g. "acme.freshdesk.com".
    pub domain: String,
    /// API key; falls back to the FRESHDESK_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Names of the custom fields on the project board.
#[derive(Debug, Deserialize)]
pub struct BoardConfig {
    pub status_field: String,
    pub priority_field: String,
    pub company_field: String,
    pub iteration_field: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncOptions {
    /// Tag scoping which tickets are in-sync.
    pub tag: String,
    /// Ordered ticket-type → issue-label pairs.
    #[serde(default)]
    pub type_labels: Vec<(String, String)>,
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".deskbridge")
        .join("config.toml")
}

pub fn load_config() -> Result<SyncConfig> {
    load_from(&config_path())
}

pub fn load_from(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        bail!("No config found at {}", path.display());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let mut config: SyncConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;

    if config.github.token.is_none() {
        config.github.token = std::env::var("GITHUB_TOKEN").ok();
    }
    if config.freshdesk.api_key.is_none() {
        config.freshdesk.api_key = std::env::var("FRESHDESK_KEY").ok();
    }
    if config.github.token.is_none() {
        bail!("Missing GitHub token: set github.token in config.toml or GITHUB_TOKEN");
    }
    if config.freshdesk.api_key.is_none() {
        bail!("Missing Freshdesk API key: set freshdesk.api_key in config.toml or FRESHDESK_KEY");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[github]
org = "acme"
project_number = 3
token = "ghp_xxx"
language = "AL"

[freshdesk]
domain = "acme.freshdesk.com"
api_key = "fd_xxx"

[board]
status_field = "Status"
priority_field = "Priority"
company_field = "Company"
iteration_field = "Iteration"

[sync]
tag = "development"
type_labels = [["Incident", "bug"], ["Feature Request", "enhancement"]]
"#;

    #[test]
    fn parses_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.github.org, "acme");
        assert_eq!(config.github.project_number, 3);
        assert_eq!(config.github.language.as_deref(), Some("AL"));
        assert_eq!(config.board.iteration_field, "Iteration");
        assert_eq!(config.sync.tag, "development");
        assert_eq!(
            config.sync.type_labels,
            vec![
                ("Incident".to_string(), "bug".to_string()),
                ("Feature Request".to_string(), "enhancement".to_string()),
            ]
        );
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_from(&dir.path().join("absent.toml"));
        assert!(result.is_err());
    }
}
