//! Bitbucket configuration
use super::platform::BitbucketProvisioner;
use serde::{Deserialize, Serialize};

use crate::config::MoverConfig;

/// Bitbucket configuration
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct BitbucketConfig {
    /// Workspace owning the new repositories
    pub owner: Option<String>,

    /// Bitbucket username
    pub username: Option<String>,

    /// Bitbucket app password
    pub password: Option<String>,

    /// API URL override
    pub api_url: Option<String>,

    /// Resolve already existing repositories instead of failing
    pub resolve_existing: Option<bool>,
}

impl BitbucketConfig {
    /// Get the bitbucket provisioner
    pub fn get_provisioner(config: &MoverConfig) -> BitbucketProvisioner {
        BitbucketProvisioner::new(
            config.config_data.bitbucket.clone(),
            config.resolve_existing(),
        )
    }
}
