//! Fixtures for stage and pipeline tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::doubles::{
    RecordingDocumentStore, RecordingNotifier, RecordingSourceControl, ScriptedModel,
};
use crate::collaborators::{Collaborators, InMemoryKnowledgeBase};
use crate::context::{PipelineContext, RunIdentity, StageContext};
use crate::core::StageResult;
use crate::errors::DevflowError;
use crate::session::{Session, SessionFactory};

/// Handles to the doubles inside a [`fake_collaborators`] bundle.
#[derive(Debug, Clone)]
pub struct Fakes {
    /// The language model.
    pub model: Arc<ScriptedModel>,
    /// The source control.
    pub source_control: Arc<RecordingSourceControl>,
    /// The document store.
    pub documents: Arc<RecordingDocumentStore>,
    /// The notifier.
    pub notifier: Arc<RecordingNotifier>,
}

/// Builds a collaborator bundle of doubles plus handles to inspect them.
///
/// The knowledge base is the seeded conversion catalogue.
#[must_use]
pub fn fake_collaborators() -> (Collaborators, Fakes) {
    let fakes = Fakes {
        model: Arc::new(ScriptedModel::new()),
        source_control: Arc::new(RecordingSourceControl::new()),
        documents: Arc::new(RecordingDocumentStore::new()),
        notifier: Arc::new(RecordingNotifier::new()),
    };
    let collaborators = Collaborators::new(
        fakes.model.clone(),
        Arc::new(InMemoryKnowledgeBase::with_conversion_entries()),
        fakes.source_control.clone(),
        fakes.documents.clone(),
        fakes.notifier.clone(),
    );
    (collaborators, fakes)
}

/// Builds a stage context with earlier stage results already recorded.
///
/// # Panics
///
/// Panics if `results` names the same stage twice.
#[must_use]
pub fn stage_context(
    transcript_path: &Path,
    output_dir: &Path,
    results: &[(&str, Value)],
) -> StageContext {
    let pipeline = PipelineContext::new(RunIdentity::new(), transcript_path, output_dir);
    for (stage, value) in results {
        pipeline
            .record(stage, StageResult::from_value(value.clone()))
            .unwrap_or_else(|e| panic!("fixture: {e}"));
    }
    StageContext::new(Arc::new(pipeline), "under_test")
}

/// A session that counts how often it is released.
#[derive(Debug, Default)]
pub struct CountingSession {
    releases: AtomicUsize,
    fail: bool,
}

impl CountingSession {
    /// Creates a session whose release succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session whose release reports an error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            releases: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Returns how many times release ran.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for CountingSession {
    fn label(&self) -> &str {
        "counting"
    }

    async fn release(&self) -> Result<(), DevflowError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DevflowError::Setup("release refused".to_string()));
        }
        Ok(())
    }
}

/// Hands out one shared [`CountingSession`], or fails setup.
#[derive(Debug, Default)]
pub struct CountingSessionFactory {
    session: Arc<CountingSession>,
    setup_error: Mutex<Option<String>>,
    opened: AtomicUsize,
}

impl CountingSessionFactory {
    /// Creates a factory whose setup succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory whose setup fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        let factory = Self::default();
        *factory.setup_error.lock() = Some(reason.into());
        factory
    }

    /// The session handed out by `open`.
    #[must_use]
    pub fn session(&self) -> Arc<CountingSession> {
        self.session.clone()
    }

    /// Returns how many times `open` was called.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for CountingSessionFactory {
    async fn open(
        &self,
        _identity: &RunIdentity,
        _output_dir: &Path,
    ) -> Result<Arc<dyn Session>, DevflowError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.setup_error.lock().clone() {
            return Err(DevflowError::Setup(reason));
        }
        Ok(self.session.clone())
    }
}
