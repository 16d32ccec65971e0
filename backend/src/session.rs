use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::{sync::Mutex, task::AbortHandle};
use uuid::Uuid;

use crate::models::{Coordinate, SelectionResult, SessionSnapshot};

pub const DEFAULT_START_NAME: &str = "Current Location";

pub const DEFAULT_SESSION_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("start location is not known yet")]
    StartUnknown,
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("destination was superseded by a newer one")]
    Superseded,
}

/// Ticket for one synthesis started by a destination commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSynthesis {
    pub generation: u64,
    pub start: Coordinate,
    pub end: Coordinate,
}

/// Per-user selection state. Exactly one result is current; a new
/// destination replaces it, and results from superseded commits are dropped.
#[derive(Debug, Default)]
pub struct SelectionSession {
    start: Option<Coordinate>,
    start_name: String,
    end: Option<Coordinate>,
    end_name: String,
    target: Option<Coordinate>,
    current: Option<SelectionResult>,
    generation: u64,
    in_flight: Option<AbortHandle>,
}

impl SelectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known origin. Until a destination is committed the end mirrors it.
    pub fn set_start(&mut self, coord: Coordinate, name: impl Into<String>) {
        self.start = Some(coord);
        self.start_name = name.into();
        if self.target.is_none() {
            self.end = Some(coord);
        }
    }

    pub fn commit_destination(
        &mut self,
        coord: Coordinate,
        name: impl Into<String>,
    ) -> Result<PendingSynthesis, SessionError> {
        let start = self.start.ok_or(SessionError::StartUnknown)?;

        self.target = Some(coord);
        self.end = Some(coord);
        self.end_name = name.into();
        self.generation += 1;
        if self.in_flight.is_some() {
            tracing::debug!("aborting superseded synthesis");
            self.cancel_in_flight();
        }

        Ok(PendingSynthesis {
            generation: self.generation,
            start,
            end: coord,
        })
    }

    pub fn track(&mut self, pending: &PendingSynthesis, handle: AbortHandle) {
        if pending.generation == self.generation {
            self.in_flight = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Stores `result` if `pending` is still the latest commit.
    pub fn apply(&mut self, pending: &PendingSynthesis, result: SelectionResult) -> bool {
        if pending.generation != self.generation {
            tracing::debug!(
                "discarding stale synthesis result (generation {} < {})",
                pending.generation,
                self.generation
            );
            return false;
        }
        self.current = Some(result);
        self.in_flight = None;
        true
    }

    fn cancel_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.start
    }

    pub fn target(&self) -> Option<Coordinate> {
        self.target
    }

    pub fn current(&self) -> Option<&SelectionResult> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self, id: Uuid) -> SessionSnapshot {
        SessionSnapshot {
            id: id.to_string(),
            start: self.start,
            start_name: self.start_name.clone(),
            end: self.end,
            end_name: self.end_name.clone(),
            target: self.target,
            generation: self.generation,
            route: self.current.clone(),
        }
    }
}

/// In-memory sessions keyed by id. Nothing is persisted; once `capacity`
/// sessions exist, creating another evicts the least recently used one.
pub struct SessionStore {
    sessions: Mutex<LruCache<Uuid, SelectionSession>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let evicted = self
            .sessions
            .lock()
            .await
            .push(id, SelectionSession::new());
        if let Some((old_id, mut old)) = evicted {
            tracing::debug!("evicting idle session {old_id}");
            old.cancel_in_flight();
        }
        id
    }

    /// Runs `f` against the session while holding the store lock. Counts as
    /// a use for eviction.
    pub async fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut SelectionSession) -> T,
    ) -> Result<T, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        Ok(f(session))
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteSource;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }

    fn result(points: Vec<Coordinate>) -> SelectionResult {
        SelectionResult {
            length_proxy: points.len() as u64,
            points,
            instructions: Vec::new(),
            source: RouteSource::Jitter,
        }
    }

    #[test]
    fn commit_without_start_is_rejected() {
        let mut session = SelectionSession::new();
        let err = session
            .commit_destination(coord(48.8, 2.3), "Paris")
            .unwrap_err();
        assert_eq!(err, SessionError::StartUnknown);
        assert_eq!(session.generation(), 0);
        assert!(session.target().is_none());
    }

    #[test]
    fn start_seeds_end_until_destination() {
        let mut session = SelectionSession::new();
        session.set_start(coord(51.5, -0.1), "London");
        let snapshot = session.snapshot(Uuid::nil());
        assert_eq!(snapshot.end, Some(coord(51.5, -0.1)));
        assert_eq!(snapshot.start_name, "London");
    }

    #[test]
    fn new_destination_replaces_result() {
        let mut session = SelectionSession::new();
        session.set_start(coord(51.5, -0.1), "London");

        let first = session.commit_destination(coord(48.8, 2.3), "Paris").unwrap();
        assert!(session.apply(&first, result(vec![first.start, first.end])));

        let second = session
            .commit_destination(coord(52.5, 13.4), "Berlin")
            .unwrap();
        assert!(session.apply(&second, result(vec![second.start, second.end])));

        let current = session.current().unwrap();
        assert_eq!(current.points.last(), Some(&coord(52.5, 13.4)));
        assert_eq!(session.snapshot(Uuid::nil()).end_name, "Berlin");
    }

    #[test]
    fn stale_result_is_discarded() {
        let mut session = SelectionSession::new();
        session.set_start(coord(51.5, -0.1), "London");

        let old = session.commit_destination(coord(48.8, 2.3), "Paris").unwrap();
        let new = session
            .commit_destination(coord(52.5, 13.4), "Berlin")
            .unwrap();

        assert!(session.apply(&new, result(vec![new.start, new.end])));
        assert!(!session.apply(&old, result(vec![old.start, old.end])));
        assert_eq!(
            session.current().unwrap().points.last(),
            Some(&coord(52.5, 13.4))
        );
    }

    #[tokio::test]
    async fn new_commit_aborts_in_flight_task() {
        let mut session = SelectionSession::new();
        session.set_start(coord(51.5, -0.1), "London");

        let pending = session.commit_destination(coord(48.8, 2.3), "Paris").unwrap();
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        session.track(&pending, task.abort_handle());

        session
            .commit_destination(coord(52.5, 13.4), "Berlin")
            .unwrap();
        let err = task.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn store_reports_unknown_sessions() {
        let store = SessionStore::new();
        let id = store.create().await;
        assert_eq!(store.len().await, 1);

        let generation = store.with_session(id, |s| s.generation()).await.unwrap();
        assert_eq!(generation, 0);

        let missing = Uuid::new_v4();
        assert_eq!(
            store.with_session(missing, |_| ()).await.unwrap_err(),
            SessionError::NotFound(missing)
        );
    }

    #[tokio::test]
    async fn least_recently_used_session_is_evicted() {
        let store = SessionStore::with_capacity(NonZeroUsize::new(2).unwrap());
        let first = store.create().await;
        let second = store.create().await;

        // touching `first` makes `second` the eviction candidate
        store.with_session(first, |_| ()).await.unwrap();
        let third = store.create().await;

        assert_eq!(store.len().await, 2);
        assert!(store.with_session(first, |_| ()).await.is_ok());
        assert!(store.with_session(third, |_| ()).await.is_ok());
        assert_eq!(
            store.with_session(second, |_| ()).await.unwrap_err(),
            SessionError::NotFound(second)
        );
    }

    #[tokio::test]
    async fn eviction_aborts_pending_synthesis() {
        let store = SessionStore::with_capacity(NonZeroUsize::new(1).unwrap());
        let id = store.create().await;

        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        store
            .with_session(id, |session| {
                session.set_start(coord(51.5, -0.1), "London");
                let pending = session.commit_destination(coord(48.8, 2.3), "Paris").unwrap();
                session.track(&pending, task.abort_handle());
            })
            .await
            .unwrap();

        store.create().await;
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
