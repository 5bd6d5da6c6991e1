use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

use crate::logging::Level;

pub const CONFIG_ENV: &str = "JSEMBED_CONFIG";
pub const LOG_LEVEL_ENV: &str = "JSEMBED_LOG_LEVEL";
pub const ROOTS_ENV: &str = "JSEMBED_ROOTS";

/// Knobs for diagnostic rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagnosticSettings {
    /// Lines shown on each side of the failing line.
    pub half_window: usize,
    /// Host stack frames rendered before the trace is cut with `...`.
    pub max_stack_frames: usize,
    pub tab_width: usize,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            half_window: 3,
            max_stack_frames: 20,
            tab_width: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Script directories, searched in order.
    pub roots: Vec<PathBuf>,
    /// `.tar.gz` bundles, searched after `roots`.
    pub archives: Vec<PathBuf>,
    pub diagnostics: DiagnosticSettings,
    pub max_conversion_depth: usize,
    pub log_level: Level,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            archives: Vec::new(),
            diagnostics: DiagnosticSettings::default(),
            max_conversion_depth: 64,
            log_level: Level::Info,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid runtime configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Defaults, then the file (explicit or `JSEMBED_CONFIG`), then environment
    /// overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.log_level = level
                    .parse()
                    .with_context(|| format!("invalid {LOG_LEVEL_ENV}"))?;
            }
        }
        if let Some(roots) = env::var_os(ROOTS_ENV) {
            let extra: Vec<PathBuf> = env::split_paths(&roots)
                .filter(|path| !path.as_os_str().is_empty())
                .collect();
            if !extra.is_empty() {
                self.roots = extra;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = RuntimeConfig::from_toml_str(
            "roots = [\"scripts\"]\nlogLevel = \"debug\"\n\n[diagnostics]\nhalfWindow = 5\n",
        )
        .unwrap();
        assert_eq!(config.roots, vec![PathBuf::from("scripts")]);
        assert_eq!(config.log_level, Level::Debug);
        assert_eq!(config.diagnostics.half_window, 5);
        assert_eq!(config.diagnostics.max_stack_frames, 20);
        assert_eq!(config.max_conversion_depth, 64);
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(RuntimeConfig::from_toml_str("logLevel = \"loud\"").is_err());
    }

    #[test]
    fn reads_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("runtime.toml");
        fs::write(&file, "archives = [\"bundle.tar.gz\"]\nmaxConversionDepth = 8\n").unwrap();
        let config = RuntimeConfig::from_file(&file).unwrap();
        assert_eq!(config.archives, vec![PathBuf::from("bundle.tar.gz")]);
        assert_eq!(config.max_conversion_depth, 8);
    }
}
