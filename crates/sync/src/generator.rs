//! Metadata regeneration.
//!
//! Regenerating the index files of a repository is delegated to an external
//! program. [`Mkrepo`] drives [`mkrepo`](https://github.com/tarantool/mkrepo),
//! which reads the packages already in a repository (locally or over S3) and
//! writes fresh `repodata/` or `dists/` metadata next to them.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use pkgrepo_layout::RepositoryPath;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Rebuilds the metadata of one repository.
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    async fn regenerate(&self, repository: &RepositoryPath) -> Result<()>;
}

pub type GeneratorHandle = Arc<dyn MetadataGenerator>;

/// Connection details `mkrepo` needs to reach an S3 bucket.
#[derive(Clone)]
pub struct S3Target {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub key_id: String,
    pub key_secret: String,
}

impl std::fmt::Debug for S3Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Target")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Where the repositories `mkrepo` works on live.
#[derive(Debug, Clone)]
pub enum Target {
    S3(S3Target),
    /// Root directory of a local store.
    Local(PathBuf),
}

/// Values written into the `Release` file of deb repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebRelease {
    pub origin: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
}

/// Runs `mkrepo` once per regeneration, each time in a fresh temporary
/// working directory.
///
/// No timeout is applied: a hung `mkrepo` holds up its worker, and only that
/// worker.
#[derive(Debug, Clone)]
pub struct Mkrepo {
    program: PathBuf,
    target: Target,
    force: bool,
    public_read: bool,
    deb: DebRelease,
}

impl Mkrepo {
    pub fn new(program: impl Into<PathBuf>, target: Target) -> Self {
        Self {
            program: program.into(),
            target,
            force: false,
            public_read: false,
            deb: DebRelease::default(),
        }
    }

    /// Looks `command` up in `PATH` (or uses it as-is if it is a path).
    pub fn discover(command: &str, target: Target) -> Result<Self> {
        match which::which(command) {
            Ok(program) => {
                tracing::debug!(program = %program.display(), "Found metadata generator");
                Ok(Self::new(program, target))
            },
            Err(_) => exn::bail!(ErrorKind::GeneratorNotFound(command.to_string())),
        }
    }

    /// Regenerate all metadata instead of only what changed.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Make the written metadata publicly readable (S3 only).
    pub fn with_public_read(mut self, public_read: bool) -> Self {
        self.public_read = public_read;
        self
    }

    pub fn with_deb_release(mut self, deb: DebRelease) -> Self {
        self.deb = deb;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, repository: &RepositoryPath, temp_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--temp-dir").arg(temp_dir);
        let location = match &self.target {
            Target::S3(s3) => {
                command
                    .args(["--s3-access-key-id", s3.key_id.as_str()])
                    .args(["--s3-secret-access-key", s3.key_secret.as_str()])
                    .args(["--s3-region", s3.region.as_str()]);
                if let Some(endpoint) = &s3.endpoint {
                    command.args(["--s3-endpoint", endpoint.as_str()]);
                }
                if self.public_read {
                    command.arg("--s3-public-read");
                }
                format!("s3://{}/{}", s3.bucket, repository.as_str())
            },
            Target::Local(root) => root.join(repository.as_str()).display().to_string(),
        };
        if self.force {
            command.arg("--force");
        }
        if let Some(key) = repository.signing_key() {
            command.arg("--sign").env("GPG_SIGN_KEY", key);
        }
        for (name, value) in [
            ("MKREPO_DEB_ORIGIN", &self.deb.origin),
            ("MKREPO_DEB_LABEL", &self.deb.label),
            ("MKREPO_DEB_DESCRIPTION", &self.deb.description),
        ] {
            if let Some(value) = value {
                command.env(name, value);
            }
        }
        command.arg(location).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl MetadataGenerator for Mkrepo {
    #[tracing::instrument(skip_all, fields(repository = %repository))]
    async fn regenerate(&self, repository: &RepositoryPath) -> Result<()> {
        let temp_dir = tempfile::Builder::new()
            .prefix("pkgrepo-mkrepo-")
            .tempdir()
            .or_raise(|| ErrorKind::Launch(repository.to_string()))?;
        let output = self
            .command(repository, temp_dir.path())
            .output()
            .await
            .or_raise(|| ErrorKind::Launch(repository.to_string()))?;
        if output.status.success() {
            tracing::debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "mkrepo finished");
            return Ok(());
        }
        tracing::debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim(), "mkrepo failed");
        exn::bail!(ErrorKind::Generation {
            repository: repository.to_string(),
            status: output.status.to_string(),
        })
    }
}
