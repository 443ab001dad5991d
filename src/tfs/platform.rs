//! TFS source lister
use log::debug;
use reqwest::header::ACCEPT;

use super::{config::TfsConfig, repo::TfsRepoList, TFS_API_REPO_LIST};
use crate::{
    errors::{MoverError, MoverErrorKind},
    platform::{BoxFuture, SourceLister},
    utils::SourceRepository,
};

/// Lists the repositories of a TFS collection
#[derive(Default, Debug, Clone)]
pub struct TfsLister {
    /// TFS settings
    config: TfsConfig,

    /// Reqwest client
    client: reqwest::Client,
}

impl TfsLister {
    /// Create a new TfsLister
    pub fn new(config: TfsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

/// Fetch a required TFS setting or fail the listing
fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, MoverError> {
    value
        .as_deref()
        .ok_or_else(|| MoverError::new(MoverErrorKind::Listing).with_text(&format!("missing {what}")))
}

impl SourceLister for TfsLister {
    fn list(&self) -> BoxFuture<'_, Vec<SourceRepository>> {
        Box::pin(async move {
            let base_url = required(&self.config.url, "TFS url")?;
            let username = required(&self.config.username, "TFS username")?;
            let token = required(&self.config.token, "TFS access token")?;
            let url = format!("{}{}", base_url.trim_end_matches('/'), TFS_API_REPO_LIST);
            debug!("GET {url}");
            let response = self
                .client
                .get(&url)
                .basic_auth(username, Some(token))
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(MoverError::wrap(MoverErrorKind::Listing))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(MoverError::wrap(MoverErrorKind::Listing))?;
            if !status.is_success() {
                return Err(MoverError::new(MoverErrorKind::Listing)
                    .with_text(&format!("{status} - {text}")));
            }
            let list: TfsRepoList =
                serde_json::from_str(&text).map_err(MoverError::wrap(MoverErrorKind::Listing))?;
            Ok(list.value.into_iter().map(|r| r.into()).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lister(base_url: String) -> TfsLister {
        TfsLister::new(TfsConfig {
            url: Some(base_url),
            username: Some("me".into()),
            password: Some("pw".into()),
            token: Some("pat".into()),
        })
    }

    #[tokio::test]
    async fn lists_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Coll/_apis/git/repositories"))
            // base64("me:pat")
            .and(header("authorization", "Basic bWU6cGF0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    { "name": "Proj A", "remoteUrl": "https://src/proja" },
                    { "name": "Proj B", "remoteUrl": "https://src/projb" }
                ],
                "count": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let repos = lister(format!("{}/Coll/", server.uri())).list().await.unwrap();
        assert_eq!(
            repos,
            vec![
                SourceRepository {
                    name: "Proj A".into(),
                    remote_url: "https://src/proja".into()
                },
                SourceRepository {
                    name: "Proj B".into(),
                    remote_url: "https://src/projb".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn http_failure_is_a_listing_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = lister(server.uri()).list().await.unwrap_err();
        assert_eq!(err.kind(), MoverErrorKind::Listing);
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn body_without_value_is_a_listing_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "count": 0 })))
            .mount(&server)
            .await;

        let err = lister(server.uri()).list().await.unwrap_err();
        assert_eq!(err.kind(), MoverErrorKind::Listing);
    }

    #[tokio::test]
    async fn missing_url_fails_without_request() {
        let err = TfsLister::new(TfsConfig::default()).list().await.unwrap_err();
        assert_eq!(err.kind(), MoverErrorKind::Listing);
        assert!(err.to_string().contains("missing TFS url"));
    }
}
