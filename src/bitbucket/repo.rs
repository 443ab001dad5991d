//! Bitbucket request and response payloads
use serde::{Deserialize, Serialize};

/// Body of the repository creation request
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BitbucketRepoCreation {
    /// Version control system, always git
    pub scm: String,

    /// Repository private status
    pub is_private: bool,
}

impl Default for BitbucketRepoCreation {
    fn default() -> Self {
        Self {
            scm: "git".to_string(),
            is_private: true,
        }
    }
}

/// Repository as returned by the API
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct BitbucketRepo {
    /// Repository slug
    pub slug: Option<String>,

    /// Link collections
    pub links: Option<BitbucketLinks>,
}

impl BitbucketRepo {
    /// First clone link, used as the push URL
    pub fn clone_href(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.clone.first())
            .map(|link| link.href.as_str())
    }
}

/// Links of a repository
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct BitbucketLinks {
    /// Clone URLs (https, ssh)
    #[serde(default)]
    pub clone: Vec<BitbucketLink>,
}

/// A single link
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct BitbucketLink {
    /// Target of the link
    pub href: String,

    /// Protocol name for clone links
    pub name: Option<String>,
}

/// Error payload
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct BitbucketErrorBody {
    /// Error details
    pub error: Option<BitbucketErrorDetail>,
}

/// Error details
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct BitbucketErrorDetail {
    /// Error message
    pub message: Option<String>,
}

impl BitbucketErrorBody {
    /// Whether the error says the repository already exists
    pub fn is_already_exists(&self) -> bool {
        self.error
            .as_ref()
            .and_then(|error| error.message.as_deref())
            .is_some_and(|message| message.to_lowercase().contains("already exists"))
    }
}
