use crate::workspace::Workspace;
use clap::Subcommand;
use resman_store::config::{parse_value, read_config, write_config, KNOWN_KEYS};
use std::path::Path;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. prune.keep_last)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, cwd: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(cwd, &key, &value),
        ConfigCmd::Get { key } => get(cwd, &key),
        ConfigCmd::List => list(cwd),
    }
}

// ── Command Implementations ──

/// `resman config set <key> <value>`
pub fn set(cwd: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    if !KNOWN_KEYS.contains(&key) {
        eprintln!("warning: unknown key {key} (known: {})", KNOWN_KEYS.join(", "));
    }
    let mut config = read_config(&ws.paths.config_json)?;
    config.insert(key.to_string(), parse_value(value));
    write_config(&ws.paths.config_json, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `resman config get <key>`
pub fn get(cwd: &Path, key: &str) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let config = read_config(&ws.paths.config_json)?;
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `resman config list`
pub fn list(cwd: &Path) -> anyhow::Result<()> {
    let ws = Workspace::open(cwd)?;
    let config = read_config(&ws.paths.config_json)?;
    if config.is_empty() {
        println!("(no config set)");
    } else {
        for (k, v) in &config {
            println!("{k} = {v}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resman_store::{Settings, StatePaths};

    #[test]
    fn set_values_reach_settings() {
        let tmp = tempfile::tempdir().unwrap();
        crate::cmd_init::execute(tmp.path()).unwrap();
        set(tmp.path(), "prune.keep_last", "12").unwrap();
        set(tmp.path(), "pdf.enabled", "true").unwrap();

        let paths = StatePaths::discover(tmp.path());
        let config = read_config(&paths.config_json).unwrap();
        let settings = Settings::from_sources(&config, |_| None).unwrap();
        assert_eq!(settings.keep_last, 12);
        assert!(settings.pdf_enabled);
    }

    #[test]
    fn requires_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list(tmp.path()).is_err());
    }
}
