//! Migrate every source repository to the destination, one at a time
use std::{
    fmt,
    process::exit,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use serde::{Serialize, Serializer};
use tokio::signal;

use crate::{
    bitbucket::config::BitbucketConfig,
    config::MoverConfig,
    errors::{MoverError, Stage},
    mirror::{Credentials, Git2Mirror},
    platform::{
        DestinationProvisioner, MirrorCloner, MirrorPusher, RemoteRepointer, SourceLister,
    },
    tfs::config::TfsConfig,
    utils::{DestinationRepository, LocalMirror, SourceRepository},
};

/// Where a repository stands in the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    /// Returned by the source lister
    Listed,
    /// Mirror cloned locally
    Cloned {
        /// Local mirror path
        mirror: String,
    },
    /// Destination created
    Provisioned {
        /// Destination repository
        destination: DestinationRepository,
    },
    /// Mirror remote rewritten
    Repointed {
        /// Destination repository
        destination: DestinationRepository,
    },
    /// Every ref pushed (terminal)
    Pushed {
        /// Destination repository
        destination: DestinationRepository,
    },
    /// A stage failed (terminal)
    Failed {
        /// Failing stage
        stage: Stage,
        /// Error message
        error: String,
    },
}

/// Outcome of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Display name of the source repository
    pub source_name: String,

    /// Terminal state
    pub state: MigrationState,
}

/// Report shape of a record, with the derived `success` flag
#[derive(Serialize)]
struct ReportEntry<'a> {
    /// Display name of the source repository
    source_name: &'a str,
    /// Whether the repository was fully pushed
    success: bool,
    /// Terminal state
    #[serde(flatten)]
    state: &'a MigrationState,
}

impl Serialize for MigrationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReportEntry {
            source_name: &self.source_name,
            success: self.success(),
            state: &self.state,
        }
        .serialize(serializer)
    }
}

impl MigrationState {
    /// Short name of the state
    pub fn label(&self) -> &'static str {
        match self {
            MigrationState::Listed => "listed",
            MigrationState::Cloned { .. } => "cloned",
            MigrationState::Provisioned { .. } => "provisioned",
            MigrationState::Repointed { .. } => "repointed",
            MigrationState::Pushed { .. } => "pushed",
            MigrationState::Failed { .. } => "failed",
        }
    }
}

impl MigrationRecord {
    /// Whether the repository was fully pushed
    pub fn success(&self) -> bool {
        matches!(self.state, MigrationState::Pushed { .. })
    }

    /// Stage that failed, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        match &self.state {
            MigrationState::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Error message of the failed stage, if any
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            MigrationState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Progress line emitted before every stage
#[derive(Debug, Clone)]
pub struct ProgressMarker {
    /// 1-based index of the repository
    pub index: usize,
    /// Number of repositories in the batch
    pub total: usize,
    /// When the stage started
    pub timestamp: DateTime<Local>,
    /// Stage about to run
    pub stage: Stage,
    /// Display name of the repository
    pub name: String,
}

impl fmt::Display for ProgressMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{} {}] {} \"{}\"...",
            self.index,
            self.total,
            self.timestamp.format("%H:%M:%S"),
            self.stage.action(),
            self.name
        )
    }
}

/// Receives the progress markers
pub trait ProgressReporter: Sync + Send {
    /// Called right before a stage starts
    fn report(&self, marker: &ProgressMarker);
}

/// Logs progress markers at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, marker: &ProgressMarker) {
        info!("{marker}");
    }
}

/// Drives the clone, provision, repoint and push stages over the whole list
pub struct Migrator {
    /// Source server
    lister: Box<dyn SourceLister>,
    /// Mirror clone stage
    cloner: Box<dyn MirrorCloner>,
    /// Destination creation stage
    provisioner: Box<dyn DestinationProvisioner>,
    /// Remote rewrite stage
    repointer: Box<dyn RemoteRepointer>,
    /// Mirror push stage
    pusher: Box<dyn MirrorPusher>,
    /// Progress sink
    reporter: Box<dyn ProgressReporter>,
    /// Set to stop before the next repository
    cancel: Arc<AtomicBool>,
    /// Only migrate these repositories, all if empty
    only: Vec<String>,
}

/// Failure of one stage for one repository
type StageFailure = (Stage, MoverError);

impl Migrator {
    /// Create a new Migrator from its five capabilities
    pub fn new(
        lister: Box<dyn SourceLister>,
        cloner: Box<dyn MirrorCloner>,
        provisioner: Box<dyn DestinationProvisioner>,
        repointer: Box<dyn RemoteRepointer>,
        pusher: Box<dyn MirrorPusher>,
    ) -> Self {
        Self {
            lister,
            cloner,
            provisioner,
            repointer,
            pusher,
            reporter: Box::new(LogReporter),
            cancel: Arc::new(AtomicBool::new(false)),
            only: Vec::new(),
        }
    }

    /// Wire the TFS lister, the git2 mirror and the Bitbucket provisioner from the configuration
    pub fn from_config(config: &MoverConfig) -> Self {
        let data = &config.config_data;
        let mirror = Git2Mirror::new(
            config.work_dir(),
            Credentials {
                username: data.tfs.username.clone(),
                password: data.tfs.password.clone(),
            },
            Credentials {
                username: data.bitbucket.username.clone(),
                password: data.bitbucket.password.clone(),
            },
        );
        Self::new(
            Box::new(TfsConfig::get_lister(config)),
            Box::new(mirror.clone()),
            Box::new(BitbucketConfig::get_provisioner(config)),
            Box::new(mirror.clone()),
            Box::new(mirror),
        )
        .with_only(config.cli_args.only.clone())
    }

    /// Replace the progress reporter
    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Share a cancellation flag, checked before each repository
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Restrict the batch to the given repository names
    pub fn with_only(mut self, only: Vec<String>) -> Self {
        self.only = only;
        self
    }

    /// Run the whole batch
    /// # Errors
    /// Listing error if the source list can't be obtained, repository failures are recorded instead
    pub async fn run(&self) -> Result<Vec<MigrationRecord>, MoverError> {
        info!("Getting list of repositories...");
        let repos = self.lister.list().await?;
        info!("Found {} repositories!", repos.len());
        let repos: Vec<SourceRepository> = if self.only.is_empty() {
            repos
        } else {
            let selected: Vec<_> = repos
                .into_iter()
                .filter(|repo| self.only.contains(&repo.name))
                .collect();
            for name in &self.only {
                if !selected.iter().any(|repo| &repo.name == name) {
                    warn!("Repository \"{name}\" not found on the source");
                }
            }
            info!("Selected {} repositories", selected.len());
            selected
        };

        let total = repos.len();
        let mut records = Vec::with_capacity(total);
        for (idx, repo) in repos.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(
                    "Cancelled, {} of {total} repositories not started",
                    total - idx
                );
                break;
            }
            let state = match self.migrate_one(idx + 1, total, repo).await {
                Ok(state) => state,
                Err((stage, e)) => {
                    error!(
                        "[{}/{total} {}] {stage} stage: {e}",
                        idx + 1,
                        Local::now().format("%H:%M:%S"),
                    );
                    MigrationState::Failed {
                        stage,
                        error: e.to_string(),
                    }
                }
            };
            records.push(MigrationRecord {
                source_name: repo.name.clone(),
                state,
            });
        }
        summarize(&records);
        Ok(records)
    }

    /// Report the marker for `stage`
    fn progress(&self, index: usize, total: usize, stage: Stage, name: &str) {
        self.reporter.report(&ProgressMarker {
            index,
            total,
            timestamp: Local::now(),
            stage,
            name: name.to_string(),
        });
    }

    /// Carry one repository through the four stages, stopping at the first failure
    async fn migrate_one(
        &self,
        index: usize,
        total: usize,
        repo: &SourceRepository,
    ) -> Result<MigrationState, StageFailure> {
        let name = repo.name.as_str();
        let state = MigrationState::Listed;

        self.progress(index, total, Stage::Clone, name);
        let mirror: LocalMirror = self
            .cloner
            .clone_mirror(&repo.remote_url, name)
            .map_err(|e| (Stage::Clone, e))?;
        let state = advance(
            name,
            state,
            MigrationState::Cloned {
                mirror: mirror.path().display().to_string(),
            },
        );

        self.progress(index, total, Stage::Provision, name);
        let destination = self
            .provisioner
            .provision(name)
            .await
            .map_err(|e| (Stage::Provision, e.with_repo(name)))?;
        let state = advance(
            name,
            state,
            MigrationState::Provisioned {
                destination: destination.clone(),
            },
        );

        self.progress(index, total, Stage::Repoint, name);
        self.repointer
            .repoint(&mirror, &destination.push_url)
            .map_err(|e| (Stage::Repoint, e))?;
        let state = advance(
            name,
            state,
            MigrationState::Repointed {
                destination: destination.clone(),
            },
        );

        self.progress(index, total, Stage::Push, name);
        self.pusher
            .push(&mirror)
            .map_err(|e| (Stage::Push, e))?;
        Ok(advance(name, state, MigrationState::Pushed { destination }))
    }
}

/// Move `name` from one state to the next
fn advance(name: &str, from: MigrationState, to: MigrationState) -> MigrationState {
    debug!("\"{name}\": {} -> {}", from.label(), to.label());
    to
}

/// Flag raised by the first Ctrl-C, the second one exits right away
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Stopping after the current repository, press Ctrl-C again to abort");
        flag.store(true, Ordering::SeqCst);
        if signal::ctrl_c().await.is_ok() {
            exit(130);
        }
    });
    cancel
}

/// Main function to migrate repositories
/// # Errors
/// Listing error if the source repositories can't be listed
pub async fn main_migrate(config: &MoverConfig) -> Result<Vec<MigrationRecord>, MoverError> {
    info!("Mirroring into {}", config.work_dir().display());
    Migrator::from_config(config)
        .with_cancel_flag(cancel_on_ctrl_c())
        .run()
        .await
}

/// Log the outcome of the run, listing the repositories to re-drive
fn summarize(records: &[MigrationRecord]) {
    let failed: Vec<&MigrationRecord> = records.iter().filter(|r| !r.success()).collect();
    info!(
        "Migrated {} of {} repositories",
        records.len() - failed.len(),
        records.len()
    );
    for record in failed {
        if let MigrationState::Failed { stage, error } = &record.state {
            error!("- \"{}\" failed at {stage}: {error}", record.source_name);
        }
    }
}
