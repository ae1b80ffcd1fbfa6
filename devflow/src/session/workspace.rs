//! Filesystem workspace session.

use super::{Session, SessionFactory};
use crate::collaborators::LanguageModel;
use crate::context::RunIdentity;
use crate::errors::DevflowError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Name of the lock file placed in the work directory.
pub const LOCK_FILE_NAME: &str = ".devflow.lock";

/// Exclusive hold on the output and work directories for one run.
#[derive(Debug)]
pub struct WorkspaceSession {
    lock_path: PathBuf,
    run_id: String,
}

impl WorkspaceSession {
    /// Returns the lock file location.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

#[async_trait]
impl Session for WorkspaceSession {
    fn label(&self) -> &str {
        &self.run_id
    }

    async fn release(&self) -> Result<(), DevflowError> {
        match tokio::fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Opens a [`WorkspaceSession`].
///
/// Setup fails if the language model is not available, if the directories
/// cannot be created, or if another run holds the lock.
pub struct WorkspaceSessionFactory {
    work_directory: PathBuf,
    model: Arc<dyn LanguageModel>,
}

impl WorkspaceSessionFactory {
    /// Creates a factory for the given work directory.
    #[must_use]
    pub fn new(work_directory: impl Into<PathBuf>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            work_directory: work_directory.into(),
            model,
        }
    }
}

impl std::fmt::Debug for WorkspaceSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSessionFactory")
            .field("work_directory", &self.work_directory)
            .field("model", &self.model.describe())
            .finish()
    }
}

#[async_trait]
impl SessionFactory for WorkspaceSessionFactory {
    async fn open(
        &self,
        identity: &RunIdentity,
        output_dir: &Path,
    ) -> Result<Arc<dyn Session>, DevflowError> {
        if !self.model.is_available() {
            return Err(DevflowError::Setup(format!(
                "language model unavailable: {}",
                self.model.describe()
            )));
        }

        tokio::fs::create_dir_all(output_dir).await?;
        tokio::fs::create_dir_all(&self.work_directory).await?;

        let lock_path = self.work_directory.join(LOCK_FILE_NAME);
        let run_id = identity.pipeline_run_id.to_string();
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DevflowError::Setup(format!(
                    "workspace {} is locked by another run",
                    self.work_directory.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(run_id.as_bytes()).await?;
        file.flush().await?;

        info!(
            run_id = %run_id,
            work_directory = %self.work_directory.display(),
            "Workspace session opened"
        );
        Ok(Arc::new(WorkspaceSession { lock_path, run_id }))
    }
}
