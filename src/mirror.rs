//! Local bare mirrors: clone, remote rewrite and mirror push with git2
use std::{
    collections::HashSet,
    fs::{create_dir_all, remove_dir_all},
    path::PathBuf,
};

use git2::{Cred, Direction, FetchOptions, PushOptions, ReferenceType, RemoteCallbacks, Repository};
use log::{debug, warn};

use crate::{
    errors::{MoverError, MoverErrorKind},
    platform::{MirrorCloner, MirrorPusher, RemoteRepointer},
    utils::{embed_credentials, LocalMirror},
};

/// Name of the mirror's single remote
const REMOTE_NAME: &str = "origin";

/// Fetch refspec replicating every ref
const MIRROR_REFSPEC: &str = "+refs/*:refs/*";

/// Username and password pair
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Username
    pub username: Option<String>,
    /// Password or token
    pub password: Option<String>,
}

impl Credentials {
    /// Both parts, if present
    fn pair(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.password.as_deref()?))
    }
}

/// Callbacks offering `credentials` once; a rejected credential fails instead of looping
fn remote_callbacks(credentials: &Credentials) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;
    callbacks.credentials(move |url, _username_from_url, _allowed| {
        attempts += 1;
        match credentials.pair() {
            Some((username, password)) if attempts == 1 => {
                Cred::userpass_plaintext(username, password)
            }
            _ => Err(git2::Error::from_str(&format!(
                "authentication failed for {url}"
            ))),
        }
    });
    callbacks
}

/// git2 backed mirror operations rooted in a work directory
#[derive(Debug, Clone)]
pub struct Git2Mirror {
    /// Directory holding one mirror per repository
    work_dir: PathBuf,

    /// Source credentials, embedded in the fetch URL
    source: Credentials,

    /// Destination credentials, offered on push
    destination: Credentials,
}

impl Git2Mirror {
    /// Create mirror operations rooted in `work_dir`
    pub fn new(work_dir: PathBuf, source: Credentials, destination: Credentials) -> Self {
        Self {
            work_dir,
            source,
            destination,
        }
    }

    /// Fetch every ref of `auth_url` into a new bare repository at `mirror`.
    ///
    /// The configured remote keeps `fetch_url` so no credential lands on disk.
    fn fetch_mirror(
        &self,
        fetch_url: &str,
        auth_url: &str,
        mirror: &LocalMirror,
    ) -> Result<(), git2::Error> {
        let repo = Repository::init_bare(mirror.path())?;
        repo.remote_with_fetch(REMOTE_NAME, fetch_url, MIRROR_REFSPEC)?;
        repo.config()?.set_bool("remote.origin.mirror", true)?;
        let mut remote = repo.remote_anonymous(auth_url)?;

        let connection = remote.connect_auth(
            Direction::Fetch,
            Some(remote_callbacks(&self.source)),
            None,
        )?;
        let default_branch = connection
            .default_branch()
            .ok()
            .and_then(|branch| branch.as_str().map(str::to_string));
        drop(connection);

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(remote_callbacks(&self.source));
        remote.fetch(&[MIRROR_REFSPEC], Some(&mut fetch_opts), None)?;

        if let Some(branch) = default_branch {
            repo.set_head(&branch)?;
        }
        Ok(())
    }
}

impl MirrorCloner for Git2Mirror {
    fn clone_mirror(&self, fetch_url: &str, name: &str) -> Result<LocalMirror, MoverError> {
        create_dir_all(&self.work_dir).map_err(|e| {
            MoverError::new(MoverErrorKind::Clone)
                .with_repo(name)
                .with_source(e)
        })?;
        let mirror = LocalMirror::new(&self.work_dir, name);
        if mirror.path().exists() {
            return Err(MoverError::new(MoverErrorKind::Clone)
                .with_repo(name)
                .with_text(&format!("{} already exists", mirror.path().display())));
        }
        let (username, password) = self.source.pair().ok_or_else(|| {
            MoverError::new(MoverErrorKind::Clone)
                .with_repo(name)
                .with_text("missing TFS username or password")
        })?;
        let auth_url = embed_credentials(fetch_url, username, password);

        debug!("Mirroring {fetch_url} into {}", mirror.path().display());
        if let Err(e) = self.fetch_mirror(fetch_url, &auth_url, &mirror) {
            if let Err(cleanup) = remove_dir_all(mirror.path()) {
                warn!("Unable to remove {}: {cleanup}", mirror.path().display());
            }
            return Err(MoverError::new(MoverErrorKind::Clone)
                .with_repo(name)
                .with_source(e));
        }
        Ok(mirror)
    }
}

impl RemoteRepointer for Git2Mirror {
    fn repoint(&self, mirror: &LocalMirror, push_url: &str) -> Result<(), MoverError> {
        let wrap = |e: git2::Error| {
            MoverError::new(MoverErrorKind::Repoint)
                .with_repo(mirror.name())
                .with_source(e)
        };
        if !mirror.path().is_dir() {
            return Err(MoverError::new(MoverErrorKind::Repoint)
                .with_repo(mirror.name())
                .with_text(&format!("{} does not exist", mirror.path().display())));
        }
        let repo = Repository::open_bare(mirror.path()).map_err(wrap)?;
        if repo.find_remote(REMOTE_NAME).is_err() {
            repo.remote_with_fetch(REMOTE_NAME, push_url, MIRROR_REFSPEC)
                .map_err(wrap)?;
        }
        repo.remote_set_url(REMOTE_NAME, push_url).map_err(wrap)?;
        // deleting an unset remote.origin.pushurl is a NotFound error
        let has_push_url = repo
            .find_remote(REMOTE_NAME)
            .map_err(wrap)?
            .pushurl()
            .is_some();
        if has_push_url {
            repo.remote_set_pushurl(REMOTE_NAME, None).map_err(wrap)?;
        }
        Ok(())
    }
}

impl Git2Mirror {
    /// Push every local ref and delete remote refs absent locally
    fn push_mirror(&self, mirror: &LocalMirror) -> Result<(), git2::Error> {
        let repo = Repository::open_bare(mirror.path())?;
        let mut remote = repo.find_remote(REMOTE_NAME)?;

        let mut local_refs = HashSet::new();
        for reference in repo.references()? {
            let reference = reference?;
            if reference.kind() != Some(ReferenceType::Direct) {
                continue;
            }
            if let Some(name) = reference.name() {
                if name.starts_with("refs/") {
                    local_refs.insert(name.to_string());
                }
            }
        }

        let connection = remote.connect_auth(
            Direction::Push,
            Some(remote_callbacks(&self.destination)),
            None,
        )?;
        let remote_refs: Vec<String> = connection
            .list()?
            .iter()
            .map(|head| head.name().to_string())
            .filter(|name| name.starts_with("refs/") && !name.ends_with("^{}"))
            .collect();
        drop(connection);

        let mut refspecs: Vec<String> = local_refs.iter().map(|r| format!("+{r}:{r}")).collect();
        refspecs.sort();
        refspecs.extend(
            remote_refs
                .iter()
                .filter(|name| !local_refs.contains(*name))
                .map(|name| format!(":{name}")),
        );
        if refspecs.is_empty() {
            debug!("Nothing to push for {}", mirror.name());
            return Ok(());
        }

        let mut callbacks = remote_callbacks(&self.destination);
        callbacks.push_update_reference(|refname, status| match status {
            Some(message) => Err(git2::Error::from_str(&format!(
                "{refname} rejected: {message}"
            ))),
            None => Ok(()),
        });
        let mut opts = PushOptions::new();
        opts.remote_callbacks(callbacks);
        debug!("Pushing {} refspecs for {}", refspecs.len(), mirror.name());
        remote.push(&refspecs, Some(&mut opts))
    }
}

impl MirrorPusher for Git2Mirror {
    fn push(&self, mirror: &LocalMirror) -> Result<(), MoverError> {
        self.push_mirror(mirror).map_err(|e| {
            MoverError::new(MoverErrorKind::Push)
                .with_repo(mirror.name())
                .with_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Oid, Signature};
    use std::path::Path;
    use tempfile::TempDir;

    fn creds() -> Credentials {
        Credentials {
            username: Some("me".into()),
            password: Some("secret".into()),
        }
    }

    fn commit(repo: &Repository, refname: &str, content: &[u8]) -> Oid {
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let blob = repo.blob(content).unwrap();
        let mut builder = repo.treebuilder(None).unwrap();
        builder.insert("README", blob, 0o100644).unwrap();
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        repo.commit(Some(refname), &sig, &sig, "commit", &tree, &[])
            .unwrap()
    }

    /// Bare source with main, a feature branch and a tag
    fn seed_source(path: &Path) -> Oid {
        let repo = Repository::init_bare(path).unwrap();
        let main = commit(&repo, "refs/heads/main", b"main");
        commit(&repo, "refs/heads/feature", b"feature");
        repo.reference("refs/tags/v1", main, false, "tag").unwrap();
        repo.set_head("refs/heads/main").unwrap();
        main
    }

    fn ref_names(path: &Path) -> Vec<String> {
        let repo = Repository::open_bare(path).unwrap();
        let mut names: Vec<String> = repo
            .references()
            .unwrap()
            .map(|r| r.unwrap().name().unwrap().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn clones_every_ref_into_a_bare_mirror() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        let main = seed_source(&source);
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());

        let mirror = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap();

        assert_eq!(mirror.path(), tmp.path().join("tfs").join("Proj A"));
        let repo = Repository::open_bare(mirror.path()).unwrap();
        assert!(repo.is_bare());
        assert_eq!(
            repo.find_reference("refs/heads/main").unwrap().target(),
            Some(main)
        );
        assert_eq!(
            ref_names(mirror.path()),
            vec!["refs/heads/feature", "refs/heads/main", "refs/tags/v1"]
        );
        assert!(repo.config().unwrap().get_bool("remote.origin.mirror").unwrap());
        // credentials only travel with the fetch, never into the config
        assert_eq!(repo.find_remote("origin").unwrap().url(), source.to_str());
    }

    #[test]
    fn stored_origin_is_free_of_credentials() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        seed_source(&source);
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let fetch_url = format!("file://{}", source.display());

        let mirror = mirrors.clone_mirror(&fetch_url, "Proj A").unwrap();

        let repo = Repository::open_bare(mirror.path()).unwrap();
        let origin = repo.find_remote("origin").unwrap();
        assert_eq!(origin.url(), Some(fetch_url.as_str()));
        let config = std::fs::read_to_string(mirror.path().join("config")).unwrap();
        assert!(!config.contains("secret"));
    }

    #[test]
    fn repoint_on_a_fresh_mirror_succeeds() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        seed_source(&source);
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let mirror = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap();

        mirrors.repoint(&mirror, "https://dest/projecta").unwrap();

        let repo = Repository::open_bare(mirror.path()).unwrap();
        let remote = repo.find_remote("origin").unwrap();
        assert_eq!(remote.url(), Some("https://dest/projecta"));
        assert_eq!(remote.pushurl(), None);
    }

    #[test]
    fn repoint_clears_a_separate_push_url() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        seed_source(&source);
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let mirror = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap();
        Repository::open_bare(mirror.path())
            .unwrap()
            .remote_set_pushurl("origin", Some("https://old/push"))
            .unwrap();

        mirrors.repoint(&mirror, "https://dest/projecta").unwrap();

        let repo = Repository::open_bare(mirror.path()).unwrap();
        let remote = repo.find_remote("origin").unwrap();
        assert_eq!(remote.url(), Some("https://dest/projecta"));
        assert_eq!(remote.pushurl(), None);
    }

    #[test]
    fn existing_mirror_is_left_untouched() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        seed_source(&source);
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let mirror = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap();
        let before = ref_names(mirror.path());

        let err = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap_err();

        assert_eq!(err.kind(), MoverErrorKind::Clone);
        assert_eq!(err.repo(), Some("Proj A"));
        assert_eq!(ref_names(mirror.path()), before);
    }

    #[test]
    fn failed_clone_leaves_no_directory() {
        let tmp = TempDir::new().unwrap();
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let missing = tmp.path().join("missing.git");

        let err = mirrors
            .clone_mirror(missing.to_str().unwrap(), "Gone")
            .unwrap_err();

        assert_eq!(err.kind(), MoverErrorKind::Clone);
        assert!(tmp.path().join("tfs").is_dir());
        assert!(!tmp.path().join("tfs").join("Gone").exists());
    }

    #[test]
    fn clone_requires_source_credentials() {
        let tmp = TempDir::new().unwrap();
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), Credentials::default(), creds());
        let err = mirrors.clone_mirror("https://src/proja", "Proj A").unwrap_err();
        assert_eq!(err.kind(), MoverErrorKind::Clone);
    }

    #[test]
    fn repoint_overwrites_the_remote() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        seed_source(&source);
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let mirror = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap();

        mirrors.repoint(&mirror, "https://dest/first").unwrap();
        mirrors.repoint(&mirror, "https://dest/projecta").unwrap();

        let repo = Repository::open_bare(mirror.path()).unwrap();
        let remote = repo.find_remote("origin").unwrap();
        assert_eq!(remote.url(), Some("https://dest/projecta"));
        assert_eq!(remote.pushurl(), None);
        assert_eq!(repo.remotes().unwrap().len(), 1);
    }

    #[test]
    fn repoint_without_mirror_fails() {
        let tmp = TempDir::new().unwrap();
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let mirror = LocalMirror::new(tmp.path().join("tfs"), "Nope");
        let err = mirrors.repoint(&mirror, "https://dest/nope").unwrap_err();
        assert_eq!(err.kind(), MoverErrorKind::Repoint);
        assert_eq!(err.repo(), Some("Nope"));
    }

    #[test]
    fn push_mirrors_refs_and_prunes_stale_ones() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        seed_source(&source);
        let destination = tmp.path().join("destination.git");
        let dest_repo = Repository::init_bare(&destination).unwrap();
        commit(&dest_repo, "refs/heads/stale", b"stale");

        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let mirror = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap();
        mirrors
            .repoint(&mirror, destination.to_str().unwrap())
            .unwrap();
        mirrors.push(&mirror).unwrap();

        assert_eq!(
            ref_names(&destination),
            vec!["refs/heads/feature", "refs/heads/main", "refs/tags/v1"]
        );
    }

    #[test]
    fn push_to_missing_remote_names_the_repo() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.git");
        seed_source(&source);
        let mirrors = Git2Mirror::new(tmp.path().join("tfs"), creds(), creds());
        let mirror = mirrors
            .clone_mirror(source.to_str().unwrap(), "Proj A")
            .unwrap();
        let missing = tmp.path().join("nowhere.git");
        mirrors.repoint(&mirror, missing.to_str().unwrap()).unwrap();

        let err = mirrors.push(&mirror).unwrap_err();
        assert_eq!(err.kind(), MoverErrorKind::Push);
        assert!(err.to_string().contains("Proj A"));
    }
}
