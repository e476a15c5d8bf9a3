use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default pchain data directory: ~/.pchain
pub fn get_pchain_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".pchain"))
}

/// Reads one TOML file. Missing sections fall back to their defaults.
pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {} failed: {e}", path.display()))?;
    Ok(cfg)
}

pub fn load_default(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    // Priority 1: --config
    // Priority 2: $PCHAIN_CONFIG
    // Priority 3: ~/.pchain/config.toml
    // Priority 4: ./pchain.toml
    let mut cfg = if let Some(path) = explicit {
        load_from_path(path)?
    } else if let Some(path) = std::env::var_os("PCHAIN_CONFIG").filter(|v| !v.is_empty()) {
        load_from_path(Path::new(&path))?
    } else {
        let home_config = get_pchain_data_dir().ok().map(|d| d.join("config.toml"));
        let local_config = Path::new("pchain.toml");

        match home_config {
            Some(p) if p.exists() => load_from_path(&p)?,
            _ if local_config.exists() => load_from_path(local_config)?,
            _ => AppConfig::default(),
        }
    };

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;

    Ok(cfg)
}

pub(crate) fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("PCHAIN_VERBOSE") {
        cfg.pipeline.verbose = parse_bool(&v)
            .ok_or_else(|| anyhow::anyhow!("PCHAIN_VERBOSE: expected a boolean, got {v:?}"))?;
    }
    if let Some(v) = get("PCHAIN_TIMEOUT_MS") {
        let ms = v
            .trim()
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("PCHAIN_TIMEOUT_MS: {e}"))?;
        cfg.pipeline.timeout_ms = Some(ms);
    }
    if let Some(v) = get("PCHAIN_LOG_LEVEL") {
        cfg.logging.level = v;
    }

    Ok(())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
