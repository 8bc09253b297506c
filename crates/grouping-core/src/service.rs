//! Async front for a grouping session.
//!
//! Embedding and clustering are CPU-bound, so every call runs on the
//! blocking pool. The session sits behind a fair async mutex: calls are
//! served one at a time in arrival order.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CoreError;
use crate::session::{CalibrationReport, GroupingSession, GroupingUpdate};
use crate::textual::{ItemKey, TextualItem};

/// Cloneable handle serializing access to one [`GroupingSession`].
#[derive(Debug, Clone)]
pub struct GroupingService {
    inner: Arc<Mutex<GroupingSession>>,
}

impl GroupingService {
    pub fn new(session: GroupingSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` against the session on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut GroupingSession) -> Result<T, CoreError> + Send + 'static,
    {
        let mut session = Arc::clone(&self.inner).lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut session))
            .await
            .map_err(|e| CoreError::Worker(format!("Task error: {}", e)))?
    }

    /// Add or replace an item.
    pub async fn add(&self, item: TextualItem) -> Result<GroupingUpdate, CoreError> {
        debug!(id = %item.id, "Queued add");
        self.run(move |session| session.add(&item)).await
    }

    /// Remove an item by key.
    pub async fn remove(
        &self,
        id: impl Into<String>,
        tab_id: impl Into<String>,
    ) -> Result<GroupingUpdate, CoreError> {
        let (id, tab_id) = (id.into(), tab_id.into());
        self.run(move |session| session.remove(&id, &tab_id)).await
    }

    /// Calibrate the threshold against an expected grouping.
    pub async fn calibrate(
        &self,
        expected: Vec<Vec<ItemKey>>,
    ) -> Result<CalibrationReport, CoreError> {
        self.run(move |session| session.calibrate(&expected)).await
    }

    /// Current groups.
    pub async fn groups(&self) -> Result<Vec<Vec<ItemKey>>, CoreError> {
        self.run(|session| session.groups()).await
    }

    /// Current threshold.
    pub async fn threshold(&self) -> f32 {
        self.inner.lock().await.threshold()
    }

    /// Number of items.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
