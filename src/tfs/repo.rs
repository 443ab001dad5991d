//! TFS repository listing payload and conversion to SourceRepository
use crate::utils::SourceRepository;
use serde::{Deserialize, Serialize};

/// Listing response, the repositories live under `value`
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TfsRepoList {
    /// Listed repositories
    pub value: Vec<TfsRepo>,

    /// Number of repositories as reported by the server
    pub count: Option<usize>,
}

/// TFS Repo
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TfsRepo {
    /// Repository ID
    pub id: Option<String>,

    /// Repository name
    pub name: String,

    /// Clone URL
    pub remote_url: String,

    /// Default branch, absent for empty repositories
    pub default_branch: Option<String>,
}

impl From<TfsRepo> for SourceRepository {
    fn from(repo: TfsRepo) -> Self {
        SourceRepository {
            name: repo.name,
            remote_url: repo.remote_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_payload() {
        let body = r#"{
            "value": [
                {
                    "id": "5febef5a-833d-4e14-b9c0-14cb638f91e6",
                    "name": "Proj A",
                    "url": "https://tfs/_apis/git/repositories/5febef5a",
                    "remoteUrl": "https://tfs/DefaultCollection/_git/Proj%20A"
                },
                { "name": "Empty", "remoteUrl": "https://tfs/DefaultCollection/_git/Empty" }
            ],
            "count": 2
        }"#;
        let list: TfsRepoList = serde_json::from_str(body).unwrap();
        let repos: Vec<SourceRepository> = list.value.into_iter().map(Into::into).collect();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "Proj A");
        assert_eq!(
            repos[0].remote_url,
            "https://tfs/DefaultCollection/_git/Proj%20A"
        );
    }

    #[test]
    fn missing_value_is_rejected() {
        let res = serde_json::from_str::<TfsRepoList>(r#"{"count": 0}"#);
        assert!(res.is_err());
    }
}
