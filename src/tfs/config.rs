//! TFS configuration
use super::platform::TfsLister;
use serde::{Deserialize, Serialize};

use crate::config::MoverConfig;

/// TFS configuration
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct TfsConfig {
    /// Collection URL, e.g. `https://tfs.example.com/DefaultCollection`
    pub url: Option<String>,

    /// TFS username
    pub username: Option<String>,

    /// TFS password, embedded in the clone URLs
    pub password: Option<String>,

    /// Personal access token, used for the listing API
    pub token: Option<String>,
}

impl TfsConfig {
    /// Get the TFS lister
    pub fn get_lister(config: &MoverConfig) -> TfsLister {
        TfsLister::new(config.config_data.tfs.clone())
    }
}
