use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Program used as the device-control backend.
    pub blueutil_path: String,
    /// Bound on a single connect/disconnect call.
    pub action_timeout_secs: u64,
    /// Overall bound on pair/repair, picker time included.
    pub repair_deadline_secs: u64,
    pub pair: PairConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PairConfig {
    pub inquiry_secs: u64,
    pub wait_connect_secs: u64,
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blueutil_path: "blueutil".to_string(),
            action_timeout_secs: 10,
            repair_deadline_secs: 180,
            pair: PairConfig::default(),
        }
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            inquiry_secs: 60,
            wait_connect_secs: 10,
            max_attempts: 6,
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/btswitch/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("btswitch").join("config.toml"))
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    /// Nothing is ever written back.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("invalid config file {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "blueutil_path = \"/opt/homebrew/bin/blueutil\"\n\n[pair]\nmax_attempts = 2\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.blueutil_path, "/opt/homebrew/bin/blueutil");
        assert_eq!(config.pair.max_attempts, 2);
        assert_eq!(config.pair.inquiry_secs, 60);
        assert_eq!(config.action_timeout_secs, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "action_timeout_secs = \"soon\"").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid config file"));
    }
}
