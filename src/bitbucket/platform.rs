//! Bitbucket provisioner
use log::{debug, warn};
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    StatusCode,
};
use urlencoding::encode;

use super::{
    config::BitbucketConfig,
    repo::{BitbucketErrorBody, BitbucketRepo, BitbucketRepoCreation},
    BITBUCKET_API_URL, BITBUCKET_REPOSITORIES_PATH,
};
use crate::{
    errors::{MoverError, MoverErrorKind},
    platform::{BoxFuture, DestinationProvisioner},
    utils::{slugify, DestinationRepository},
};

/// Creates private git repositories on Bitbucket
#[derive(Default, Debug, Clone)]
pub struct BitbucketProvisioner {
    /// Bitbucket settings
    config: BitbucketConfig,

    /// Look up the existing repository when the slug is taken
    resolve_existing: bool,

    /// Reqwest client
    client: reqwest::Client,
}

/// Credentials needed for every call
struct Auth<'a> {
    /// Workspace
    owner: &'a str,
    /// Username
    username: &'a str,
    /// App password
    password: &'a str,
}

impl BitbucketProvisioner {
    /// Create a new BitbucketProvisioner
    pub fn new(config: BitbucketConfig, resolve_existing: bool) -> Self {
        Self {
            config,
            resolve_existing,
            client: reqwest::Client::new(),
        }
    }

    /// Credentials from the configuration, all of them are required
    fn auth(&self) -> Result<Auth<'_>, MoverError> {
        let missing =
            |what: &str| MoverError::new(MoverErrorKind::Provision).with_text(&format!("missing {what}"));
        Ok(Auth {
            owner: self
                .config
                .owner
                .as_deref()
                .ok_or_else(|| missing("Bitbucket repository owner"))?,
            username: self
                .config
                .username
                .as_deref()
                .ok_or_else(|| missing("Bitbucket user"))?,
            password: self
                .config
                .password
                .as_deref()
                .ok_or_else(|| missing("Bitbucket password"))?,
        })
    }

    /// URL of the repository `slug` under `owner`
    fn repo_url(&self, owner: &str, slug: &str) -> String {
        let api_url = self.config.api_url.as_deref().unwrap_or(BITBUCKET_API_URL);
        format!(
            "{}{}/{}/{}",
            api_url.trim_end_matches('/'),
            BITBUCKET_REPOSITORIES_PATH,
            encode(owner),
            encode(slug)
        )
    }

    /// Fetch an existing repository and return its push URL
    async fn get_repo(&self, auth: &Auth<'_>, slug: &str) -> Result<String, MoverError> {
        let url = self.repo_url(auth.owner, slug);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .basic_auth(auth.username, Some(auth.password))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(MoverError::wrap(MoverErrorKind::Provision))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(MoverError::wrap(MoverErrorKind::Provision))?;
        if !status.is_success() {
            return Err(MoverError::new(MoverErrorKind::Provision)
                .with_text(&format!("{status} - {text}")));
        }
        push_url_from(&text)
    }
}

/// Extract `links.clone[0].href` from a repository payload
fn push_url_from(text: &str) -> Result<String, MoverError> {
    let repo: BitbucketRepo =
        serde_json::from_str(text).map_err(MoverError::wrap(MoverErrorKind::Provision))?;
    match repo.clone_href() {
        Some(href) => Ok(href.to_string()),
        None => Err(MoverError::new(MoverErrorKind::Provision)
            .with_text(&format!("no clone link in response: {text}"))),
    }
}

/// Whether the creation answer means the slug is already taken
fn is_conflict(status: StatusCode, text: &str) -> bool {
    if status == StatusCode::CONFLICT {
        return true;
    }
    status == StatusCode::BAD_REQUEST
        && serde_json::from_str::<BitbucketErrorBody>(text)
            .map(|body| body.is_already_exists())
            .unwrap_or(false)
}

impl DestinationProvisioner for BitbucketProvisioner {
    fn provision<'a>(&'a self, name: &'a str) -> BoxFuture<'a, DestinationRepository> {
        Box::pin(async move {
            let auth = self.auth()?;
            let slug = slugify(name);
            let url = self.repo_url(auth.owner, &slug);
            debug!("POST {url}");
            let response = self
                .client
                .post(&url)
                .basic_auth(auth.username, Some(auth.password))
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .json(&BitbucketRepoCreation::default())
                .send()
                .await
                .map_err(MoverError::wrap(MoverErrorKind::Provision))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(MoverError::wrap(MoverErrorKind::Provision))?;
            if is_conflict(status, &text) {
                if !self.resolve_existing {
                    return Err(MoverError::new(MoverErrorKind::ProvisionConflict)
                        .with_text(&format!("{slug}: {status} - {text}")));
                }
                warn!("Repository \"{slug}\" already exists, reusing it");
                let push_url = match self.get_repo(&auth, &slug).await {
                    Ok(push_url) => push_url,
                    Err(e) => {
                        let text_error = format!("{text} - {e}");
                        return Err(
                            MoverError::new(MoverErrorKind::Provision).with_text(&text_error)
                        );
                    }
                };
                return Ok(DestinationRepository { slug, push_url });
            }
            if !status.is_success() {
                return Err(MoverError::new(MoverErrorKind::Provision)
                    .with_text(&format!("{status} - {text}")));
            }
            let push_url = push_url_from(&text)?;
            Ok(DestinationRepository { slug, push_url })
        })
    }
}
