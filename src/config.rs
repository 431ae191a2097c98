use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub importer: ImporterConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory holding one folder per source, each with
    /// `import/`, `puzzles/` and `errors/` subdirectories.
    pub puzzles_root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImporterConfig {
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_scan_interval_secs() -> u64 {
    15
}
fn default_debounce_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentsConfig {
    #[serde(default = "default_schedule_check_secs")]
    pub schedule_check_secs: u64,
    #[serde(default = "default_worker_poll_secs")]
    pub worker_poll_secs: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            schedule_check_secs: default_schedule_check_secs(),
            worker_poll_secs: default_worker_poll_secs(),
        }
    }
}

fn default_schedule_check_secs() -> u64 {
    60
}
fn default_worker_poll_secs() -> u64 {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.importer.scan_interval_secs == 0 {
        anyhow::bail!("importer.scan_interval_secs must be > 0");
    }

    if config.importer.debounce_ms == 0 {
        anyhow::bail!("importer.debounce_ms must be > 0");
    }

    if config.agents.schedule_check_secs == 0 {
        anyhow::bail!("agents.schedule_check_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_applied_when_sections_omitted() {
        let f = write_config(
            r#"[db]
path = "/tmp/pzv.sqlite"

[storage]
puzzles_root = "/tmp/puzzles"
"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.importer.scan_interval_secs, 15);
        assert_eq!(config.importer.debounce_ms, 1000);
        assert_eq!(config.agents.schedule_check_secs, 60);
    }

    #[test]
    fn zero_scan_interval_rejected() {
        let f = write_config(
            r#"[db]
path = "/tmp/pzv.sqlite"

[storage]
puzzles_root = "/tmp/puzzles"

[importer]
scan_interval_secs = 0
"#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
