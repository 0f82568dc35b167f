use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration file structure for godash.
///
/// Describes the GoCD server to resolve against and the ordered groups of
/// pipelines shown on the dashboard. Configuration files are loaded from the
/// current directory or a specified path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GoCD server connection settings
    pub gocd: GoCdConfig,

    /// Ordered pipeline groups to resolve
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoCdConfig {
    /// GoCD server base URL (e.g., 'https://gocd.example.com')
    pub server: String,

    /// Basic-auth username
    #[serde(default)]
    pub username: String,

    /// Basic-auth password
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupConfig {
    /// Display name for the group
    pub name: String,

    /// Pipeline names in display order
    #[serde(default)]
    pub pipelines: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./godash.toml
    /// 3. ./godash.json
    /// 4. ./godash.yaml
    /// 5. ./godash.yml
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        // Try common configuration file names
        let candidates = ["godash.toml", "godash.json", "godash.yaml", "godash.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        bail!("No configuration file found (looked for {})", candidates.join(", "));
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}
