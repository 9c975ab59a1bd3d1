use std::sync::{Arc, Mutex};

use super::artifact::Artifact;

/// Host callback for finished captures
///
/// Receives `Some(artifact)` on every successful capture or import and `None`
/// when a previously delivered artifact is discarded by a retake.
pub trait ArtifactListener: Send {
    fn on_artifact_ready(&mut self, artifact: Option<Artifact>);
}

impl<F> ArtifactListener for F
where
    F: FnMut(Option<Artifact>) + Send,
{
    fn on_artifact_ready(&mut self, artifact: Option<Artifact>) {
        self(artifact)
    }
}

/// Listener that keeps every notification for later inspection
#[derive(Debug, Clone, Default)]
pub struct ArtifactInbox {
    notifications: Arc<Mutex<Vec<Option<Artifact>>>>,
}

impl ArtifactInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received, oldest first
    pub fn notifications(&self) -> Vec<Option<Artifact>> {
        match self.notifications.lock() {
            Ok(n) => n.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Most recent artifact, unless it was discarded afterwards
    pub fn current(&self) -> Option<Artifact> {
        self.notifications().into_iter().last().flatten()
    }

    /// Number of populated artifacts delivered
    pub fn delivered(&self) -> usize {
        self.notifications().iter().filter(|n| n.is_some()).count()
    }
}

impl ArtifactListener for ArtifactInbox {
    fn on_artifact_ready(&mut self, artifact: Option<Artifact>) {
        match self.notifications.lock() {
            Ok(mut n) => n.push(artifact),
            Err(poisoned) => poisoned.into_inner().push(artifact),
        }
    }
}
