use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Cli;

pub const CACHE_FILE_NAME: &str = ".aws_ec2_cache.json";
pub const DEFAULT_PROFILE: &str = "default";

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub profile: String,
    pub region: String,
    pub cache_ttl: Duration,
    pub cache_path: PathBuf,
    pub sso_cache_path: PathBuf,
    pub aws_cli: String,
    pub refresh: bool,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let home = home_dir()?;

        let cache_path = match &cli.cache_file {
            Some(path) => path.clone(),
            None => default_cache_path()?,
        };

        let cache_ttl_secs = cli.cache_ttl_hours.checked_mul(3600).ok_or_else(|| {
            anyhow!("--cache-ttl-hours {} is too large", cli.cache_ttl_hours)
        })?;

        Ok(Self {
            profile: cli.profile.clone(),
            region: cli.region.clone(),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_path,
            sso_cache_path: sso_cache_dir(&home),
            aws_cli: cli.aws_cli.clone(),
            refresh: cli.refresh,
            verbose: cli.verbose,
        })
    }

    /// Profile to hand to the AWS SDK and CLI, `None` when the default chain applies.
    pub fn explicit_profile(&self) -> Option<&str> {
        if self.profile == DEFAULT_PROFILE {
            None
        } else {
            Some(&self.profile)
        }
    }
}

pub fn sso_cache_dir(home: &Path) -> PathBuf {
    home.join(".aws").join("sso").join("cache")
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .or_else(dirs_next::home_dir)
        .ok_or_else(|| anyhow!("Could not locate home directory"))
}

// The cache lives next to the binary so every profile shares one file.
fn default_cache_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Could not locate the running executable")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow!("Executable path {} has no parent directory", exe.display()))?;
    Ok(dir.join(CACHE_FILE_NAME))
}
