//! TFS (Azure DevOps Server) source module.
pub(crate) mod config;
pub(crate) mod platform;
pub(crate) mod repo;

/// Path of the repository listing endpoint, relative to the collection URL
const TFS_API_REPO_LIST: &str = "/_apis/git/repositories";
