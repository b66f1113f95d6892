use crate::config::AppConfig;
use aftx_hal::path::find_executable;
use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PreflightConfig {
    pub required_tools: Vec<String>,
    pub downloads_dir: PathBuf,
    pub path_env: String,
}

impl PreflightConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            required_tools: vec![cfg.tools.adb.clone(), cfg.tools.fastboot.clone()],
            downloads_dir: cfg.paths.downloads_dir.clone(),
            path_env: std::env::var("PATH").unwrap_or_default(),
        }
    }
}

/// Tools that were found, with their resolved paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    pub tools: Vec<(String, PathBuf)>,
}

pub fn run(cfg: &AppConfig) -> Result<PreflightReport> {
    run_with(&PreflightConfig::from_app(cfg))
}

pub fn run_with(cfg: &PreflightConfig) -> Result<PreflightReport> {
    log::info!("Preflight checks");

    let tools = check_tools(cfg)?;
    check_downloads_dir(cfg)?;

    log::info!("Preflight complete");
    Ok(PreflightReport { tools })
}

fn check_tools(cfg: &PreflightConfig) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for tool in &cfg.required_tools {
        match find_executable(tool, &cfg.path_env) {
            Some(path) => {
                log::debug!("{} -> {}", tool, path.display());
                found.push((tool.clone(), path));
            }
            None => missing.push(tool.clone()),
        }
    }
    if !missing.is_empty() {
        bail!("Missing required tools: {}", missing.join(", "));
    }
    Ok(found)
}

fn check_downloads_dir(cfg: &PreflightConfig) -> Result<()> {
    let dir = &cfg.downloads_dir;
    if dir.exists() && !dir.is_dir() {
        bail!("Downloads path is not a directory: {}", dir.display());
    }
    if let Ok(meta) = fs::metadata(dir) {
        if meta.permissions().readonly() {
            bail!("Downloads directory is read-only: {}", dir.display());
        }
    }
    Ok(())
}
