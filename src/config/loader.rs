use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::types::AppConfig;

/// Discover and load the app config.
///
/// Priority:
/// 1. `--config` flag (explicit path)
/// 2. `$GH_PULSE_CONFIG` environment variable
/// 3. `$XDG_CONFIG_HOME/gh-pulse/config.toml`
/// 4. `~/.config/gh-pulse/config.toml`
///
/// With no file found the built-in defaults are used.
pub fn load_config(explicit_path: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_global_config(),
    };
    let Some(path) = path else {
        tracing::debug!("config: no file found, using defaults");
        return Ok(AppConfig::default());
    };
    let contents =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML from {}", path.display()))?;
    tracing::debug!("config: loaded {}", path.display());
    Ok(config)
}

/// Where the preference store lives unless the config overrides it.
///
/// `$XDG_STATE_HOME/gh-pulse/state.json`, else `~/.local/state/gh-pulse/state.json`.
pub fn default_state_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("gh-pulse/state.json"));
    }
    dirs_fallback().map(|home| home.join(".local/state/gh-pulse/state.json"))
}

fn find_global_config() -> Option<PathBuf> {
    // $GH_PULSE_CONFIG
    if let Ok(path) = std::env::var("GH_PULSE_CONFIG") {
        let p = PathBuf::from(&path);
        if p.is_file() {
            return Some(p);
        }
    }

    // $XDG_CONFIG_HOME/gh-pulse/config.toml
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let p = PathBuf::from(xdg).join("gh-pulse/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // ~/.config/gh-pulse/config.toml
    if let Some(home) = dirs_fallback() {
        let p = home.join(".config/gh-pulse/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    None
}

fn dirs_fallback() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
