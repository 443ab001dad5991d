//! Bitbucket Cloud destination module.
pub(crate) mod config;
pub(crate) mod platform;
pub(crate) mod repo;

/// Bitbucket API URL
const BITBUCKET_API_URL: &str = "https://api.bitbucket.org";

/// Repositories endpoint, relative to the API URL
const BITBUCKET_REPOSITORIES_PATH: &str = "/2.0/repositories";
