//! Configuration handling
use std::{fs::read_to_string, path::PathBuf};

use home::home_dir;
use serde::{Deserialize, Serialize};

use crate::{
    bitbucket::config::BitbucketConfig,
    cli::MoverCli,
    errors::{MoverError, MoverErrorKind},
    macros::env_override,
    tfs::config::TfsConfig,
};

/// Work directory used when none is configured
pub const DEFAULT_WORK_DIR: &str = "tfs";

/// Configuration data
#[derive(Default, Clone, Debug)]
pub struct MoverConfig {
    /// path to the configuration file, if one was read
    pub config_path: Option<PathBuf>,

    /// actual configuration data
    pub config_data: ConfigData,

    /// CLI arguments
    pub cli_args: MoverCli,
}

/// Settings read from the configuration file and the environment
#[derive(Deserialize, Serialize, Default, Clone, Debug)]
#[serde(default)]
pub struct ConfigData {
    /// Directory holding the local mirrors
    pub work_dir: Option<PathBuf>,

    /// Source server configuration
    pub tfs: TfsConfig,

    /// Destination configuration
    pub bitbucket: BitbucketConfig,
}

impl ConfigData {
    /// Override the settings with the non-empty variables found by `lookup`
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let config_data = self;
        env_override!(lookup, config_data.tfs.url, "TFS_URL");
        env_override!(lookup, config_data.tfs.username, "TFS_USERNAME");
        env_override!(lookup, config_data.tfs.password, "TFS_PASSWORD");
        env_override!(lookup, config_data.tfs.token, "TFS_PAT");
        env_override!(lookup, config_data.bitbucket.owner, "BITBUCKET_REPO_OWNER");
        env_override!(lookup, config_data.bitbucket.username, "BITBUCKET_USER");
        env_override!(lookup, config_data.bitbucket.password, "BITBUCKET_PASSWORD");
        env_override!(lookup, config_data.bitbucket.api_url, "BITBUCKET_API_URL");
        if let Some(work_dir) = lookup("TFS_MOVER_WORK_DIR").filter(|value| !value.is_empty()) {
            config_data.work_dir = Some(PathBuf::from(work_dir));
        }
    }
}

impl MoverConfig {
    /// Create a new Config object from the CLI arguments and the process environment
    /// # Errors
    /// Error if the config file can't be read or parsed
    pub fn try_new(cli_args: MoverCli) -> Result<Self, MoverError> {
        Self::try_new_with_env(cli_args, |name| std::env::var(name).ok())
    }

    /// Create a new Config object, reading environment variables through `lookup`
    /// # Errors
    /// Error if the config file can't be read or parsed
    pub fn try_new_with_env<F: Fn(&str) -> Option<String>>(
        cli_args: MoverCli,
        lookup: F,
    ) -> Result<Self, MoverError> {
        let config_path = match cli_args.config.clone() {
            Some(path) => Some(path),
            None => Self::get_config_path().ok().filter(|path| path.is_file()),
        };
        let mut config_data = match &config_path {
            Some(path) => {
                let contents = read_to_string(path).map_err(|e| {
                    MoverError::new(MoverErrorKind::Config)
                        .with_text(&format!("Unable to open {}: {e}", path.display()))
                })?;
                toml::from_str(&contents)?
            }
            None => ConfigData::default(),
        };
        config_data.apply_env(lookup);
        Ok(MoverConfig {
            config_path,
            config_data,
            cli_args,
        })
    }

    /// Get the path of the default config file
    /// # Errors
    /// Error if the home directory can't be found
    pub fn get_config_path() -> Result<PathBuf, MoverError> {
        let home_dir = match home_dir() {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => return Err("Unable to get your home dir! home::home_dir() isn't working".into()),
        };
        Ok(home_dir
            .join(".config")
            .join(".tfs-mover")
            .join("config.toml"))
    }

    /// Directory holding the mirrors: CLI, then config, then the default
    pub fn work_dir(&self) -> PathBuf {
        self.cli_args
            .work_dir
            .clone()
            .or_else(|| self.config_data.work_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR))
    }

    /// Whether an existing destination repository is reused
    pub fn resolve_existing(&self) -> bool {
        self.cli_args.resolve_existing || self.config_data.bitbucket.resolve_existing == Some(true)
    }
}
