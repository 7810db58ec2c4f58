//! Paste lifecycle: creation, availability and view accounting.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use ephemeral_common::{CreatePaste, PasteView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, instrument};

use crate::clock::Clock;
use crate::error::{Result, StorageError, ValidationError};
use crate::paste::Paste;
use crate::short_code::{self, ShortCode, SHORT_CODE_SIZE};
use crate::store::{Decrement, PasteStore};

/// Attempts at drawing an unused id before giving up. With 60 bits per id a
/// second attempt is already unlikely.
const ID_ATTEMPTS: usize = 16;

/// Owns the rules for creating and reading pastes. Holds no per-paste state;
/// everything lives in the injected [`PasteStore`].
pub struct Engine {
    store: Arc<dyn PasteStore>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

/// Validated form of a [`CreatePaste`] request.
struct NewPaste {
    content: String,
    ttl: Option<Duration>,
    max_views: Option<u32>,
}

impl TryFrom<CreatePaste> for NewPaste {
    type Error = ValidationError;

    fn try_from(request: CreatePaste) -> Result<Self, Self::Error> {
        let content = request
            .content
            .filter(|content| !content.is_empty())
            .ok_or(ValidationError::MissingContent)?;

        let ttl = request.ttl_seconds.map(ttl_from_secs).transpose()?;

        let max_views = request
            .max_views
            .map(|max_views| {
                u32::try_from(max_views)
                    .ok()
                    .filter(|max_views| *max_views > 0)
                    .ok_or(ValidationError::InvalidMaxViews)
            })
            .transpose()?;

        Ok(Self {
            content,
            ttl,
            max_views,
        })
    }
}

/// Converts fractional seconds to a duration at millisecond resolution. Every
/// positive ttl lasts at least a millisecond.
fn ttl_from_secs(secs: f64) -> Result<Duration, ValidationError> {
    // Roughly 292 million years; anything longer cannot be represented.
    #[allow(clippy::cast_precision_loss)]
    const MAX_MILLIS: f64 = i64::MAX as f64;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(ValidationError::InvalidTtl);
    }

    let millis = (secs * 1_000.0).round().max(1.0);
    if millis > MAX_MILLIS {
        return Err(ValidationError::InvalidTtl);
    }

    #[allow(clippy::cast_possible_truncation)]
    let millis = millis as i64;
    Duration::try_milliseconds(millis).ok_or(ValidationError::InvalidTtl)
}

impl Engine {
    pub fn new(store: Arc<dyn PasteStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(store, clock, StdRng::from_entropy())
    }

    pub fn with_rng(store: Arc<dyn PasteStore>, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            store,
            clock,
            rng: Mutex::new(rng),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn store(&self) -> &Arc<dyn PasteStore> {
        &self.store
    }

    pub fn create(&self, request: CreatePaste) -> Result<Paste> {
        self.create_at(request, self.clock.now())
    }

    /// Creates a paste as if the current instant were `now`.
    #[instrument(skip_all, err)]
    pub fn create_at(&self, request: CreatePaste, now: DateTime<Utc>) -> Result<Paste> {
        let NewPaste {
            content,
            ttl,
            max_views,
        } = NewPaste::try_from(request)?;

        let expires_at = ttl
            .map(|ttl| now.checked_add_signed(ttl).ok_or(ValidationError::InvalidTtl))
            .transpose()?;

        let mut paste = Paste::new(String::new(), content, now, expires_at, max_views);

        for _ in 0..ID_ATTEMPTS {
            paste.id = self.next_id();
            match self.store.insert(&paste) {
                Ok(()) => {
                    debug!(id = %paste.id, ?expires_at, ?max_views, "Created paste");
                    return Ok(paste);
                }
                Err(StorageError::Conflict(id)) => debug!(%id, "Id already taken, drawing another"),
                Err(e) => return Err(e.into()),
            }
        }

        error!("Failed to generate an unused paste id");
        Err(StorageError::Conflict(paste.id).into())
    }

    pub fn fetch(&self, id: &str) -> Result<Option<PasteView>> {
        self.fetch_at(id, self.clock.now())
    }

    /// Reads a paste as if the current instant were `now`, consuming one view
    /// if the paste has a view budget.
    ///
    /// Returns `Ok(None)` when the paste does not exist, has expired or has
    /// run out of views. Callers are not told which.
    #[instrument(skip(self), err)]
    pub fn fetch_at(&self, id: &str, now: DateTime<Utc>) -> Result<Option<PasteView>> {
        if id.parse::<ShortCode<SHORT_CODE_SIZE>>().is_err() {
            debug!("Malformed id");
            return Ok(None);
        }

        let Some(paste) = self.store.find_by_id(id)? else {
            debug!("No such paste");
            return Ok(None);
        };

        if let Err(reason) = paste.availability(now) {
            debug!(?reason, "Paste unavailable");
            return Ok(None);
        }

        if paste.views.is_none() {
            return Ok(Some(paste.into_view(None)));
        }

        match self.store.decrement_remaining_views(id)? {
            Decrement::Remaining(remaining) => Ok(Some(paste.into_view(Some(remaining)))),
            outcome => {
                debug!(?outcome, "Lost the race for the last view");
                Ok(None)
            }
        }
    }

    fn next_id(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.sample::<ShortCode<SHORT_CODE_SIZE>, _>(short_code::Generator)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use chrono::TimeZone;

    use super::*;
    use crate::clock::FixedClock;
    use crate::error::Error;
    use crate::store::MemoryStore;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn setup() -> (Engine, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(t0()));
        let engine = Engine::with_rng(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            StdRng::seed_from_u64(42),
        );
        (engine, clock)
    }

    fn validation_error(result: Result<Paste>) -> ValidationError {
        match result {
            Err(Error::Validation(e)) => e,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_or_empty_content() {
        let (engine, _) = setup();
        let limits = [
            (None, None),
            (Some(10.0), None),
            (None, Some(3)),
            (Some(10.0), Some(3)),
        ];

        for (ttl_seconds, max_views) in limits {
            for content in [None, Some(String::new())] {
                let request = CreatePaste {
                    content,
                    ttl_seconds,
                    max_views,
                };
                assert_eq!(
                    validation_error(engine.create(request)),
                    ValidationError::MissingContent
                );
            }
        }

        assert!(engine.store().find_by_id("anything").unwrap().is_none());
    }

    #[test]
    fn rejects_bad_limits() {
        let (engine, _) = setup();
        for ttl in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e300] {
            assert_eq!(
                validation_error(engine.create(CreatePaste::new("x").ttl_seconds(ttl))),
                ValidationError::InvalidTtl,
                "ttl {ttl}"
            );
        }
        for max_views in [0, -3, i64::from(u32::MAX) + 1] {
            assert_eq!(
                validation_error(engine.create(CreatePaste::new("x").max_views(max_views))),
                ValidationError::InvalidMaxViews,
                "max_views {max_views}"
            );
        }
    }

    #[test]
    fn tiny_ttls_last_a_millisecond() {
        let (engine, _) = setup();
        for ttl in [0.0001, 0.0004, f64::MIN_POSITIVE] {
            let paste = engine
                .create(CreatePaste::new("x").ttl_seconds(ttl))
                .unwrap();
            assert_eq!(
                paste.expires_at,
                Some(t0() + Duration::milliseconds(1)),
                "ttl {ttl}"
            );
        }

        let paste = engine
            .create(CreatePaste::new("x").ttl_seconds(1.1))
            .unwrap();
        assert_eq!(paste.expires_at, Some(t0() + Duration::milliseconds(1100)));
    }

    #[test]
    fn create_records_limits() {
        let (engine, _) = setup();
        let paste = engine
            .create(CreatePaste::new("hello").ttl_seconds(1.5).max_views(4))
            .unwrap();

        assert_eq!(paste.id.len(), SHORT_CODE_SIZE);
        assert_eq!(paste.created_at, t0());
        assert_eq!(paste.expires_at, Some(t0() + Duration::milliseconds(1500)));
        assert_eq!(paste.max_views(), Some(4));
        assert_eq!(paste.remaining_views(), Some(4));
        assert_eq!(engine.store().find_by_id(&paste.id).unwrap(), Some(paste));
    }

    #[test]
    fn ids_are_unique() {
        let (engine, _) = setup();
        let mut ids: Vec<String> = (0..200)
            .map(|_| engine.create(CreatePaste::new("x")).unwrap().id)
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn deadline_boundary() {
        let (engine, _) = setup();
        let id = engine
            .create(CreatePaste::new("x").ttl_seconds(10.0))
            .unwrap()
            .id;

        assert!(engine
            .fetch_at(&id, t0() + Duration::milliseconds(10_000))
            .unwrap()
            .is_some());
        assert!(engine
            .fetch_at(&id, t0() + Duration::milliseconds(10_001))
            .unwrap()
            .is_none());
    }

    #[test]
    fn view_budget_runs_out() {
        let (engine, clock) = setup();
        let id = engine.create(CreatePaste::new("x").max_views(2)).unwrap().id;

        assert_eq!(engine.fetch(&id).unwrap().unwrap().remaining_views, Some(1));
        clock.advance(Duration::days(365));
        assert_eq!(engine.fetch(&id).unwrap().unwrap().remaining_views, Some(0));
        assert!(engine.fetch(&id).unwrap().is_none());
        assert!(engine.fetch(&id).unwrap().is_none());
    }

    #[test]
    fn unlimited_reads_never_mutate() {
        let (engine, _) = setup();
        let paste = engine.create(CreatePaste::new("same")).unwrap();

        for _ in 0..1_000 {
            let view = engine.fetch(&paste.id).unwrap().unwrap();
            assert_eq!(view.content, "same");
            assert_eq!(view.remaining_views, None);
            assert_eq!(view.expires_at, None);
        }
        assert_eq!(engine.store().find_by_id(&paste.id).unwrap(), Some(paste));
    }

    #[test]
    fn unknown_and_malformed_ids_are_unavailable() {
        let (engine, _) = setup();
        assert!(engine.fetch("2345cfgh6789").unwrap().is_none());
        assert!(engine.fetch("../etc/passwd").unwrap().is_none());
        assert!(engine.fetch("").unwrap().is_none());
    }

    #[test]
    fn single_view_survives_only_one_concurrent_reader() {
        const READERS: usize = 32;
        let (engine, _) = setup();
        let id = engine.create(CreatePaste::new("once").max_views(1)).unwrap().id;
        let barrier = Barrier::new(READERS);

        let results: Vec<Option<PasteView>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..READERS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        engine.fetch(&id).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes: Vec<&PasteView> = results.iter().flatten().collect();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].remaining_views, Some(0));
        assert_eq!(
            engine.store().find_by_id(&id).unwrap().unwrap().remaining_views(),
            Some(0)
        );
    }

    #[test]
    fn views_then_deadline() {
        let (engine, _) = setup();
        let id = engine
            .create(CreatePaste::new("hello").ttl_seconds(5.0).max_views(1))
            .unwrap()
            .id;

        let view = engine
            .fetch_at(&id, t0() + Duration::seconds(1))
            .unwrap()
            .unwrap();
        assert_eq!(
            view,
            PasteView {
                content: "hello".to_string(),
                remaining_views: Some(0),
                expires_at: Some(t0() + Duration::seconds(5)),
            }
        );
        assert!(engine
            .fetch_at(&id, t0() + Duration::seconds(2))
            .unwrap()
            .is_none());
    }

    #[test]
    fn deadline_without_views() {
        let (engine, _) = setup();
        let id = engine
            .create(CreatePaste::new("bye").ttl_seconds(1.0))
            .unwrap()
            .id;

        let view = engine
            .fetch_at(&id, t0() + Duration::milliseconds(500))
            .unwrap()
            .unwrap();
        assert_eq!(view.content, "bye");
        assert!(engine
            .fetch_at(&id, t0() + Duration::milliseconds(1500))
            .unwrap()
            .is_none());
    }

    /// A store whose every write fails.
    struct BrokenStore;

    impl PasteStore for BrokenStore {
        fn insert(&self, _: &Paste) -> Result<(), StorageError> {
            Err(StorageError::Backend("disk on fire".to_string()))
        }

        fn find_by_id(&self, _: &str) -> Result<Option<Paste>, StorageError> {
            Err(StorageError::Backend("disk on fire".to_string()))
        }

        fn decrement_remaining_views(&self, _: &str) -> Result<Decrement, StorageError> {
            Err(StorageError::Backend("disk on fire".to_string()))
        }

        fn purge_unavailable(&self, _: DateTime<Utc>) -> Result<usize, StorageError> {
            Err(StorageError::Backend("disk on fire".to_string()))
        }
    }

    #[test]
    fn storage_failures_propagate() {
        let engine = Engine::new(Arc::new(BrokenStore), Arc::new(FixedClock::new(t0())));
        assert!(matches!(
            engine.create(CreatePaste::new("x")),
            Err(Error::Storage(StorageError::Backend(_)))
        ));
        assert!(matches!(
            engine.fetch("2345cfgh6789"),
            Err(Error::Storage(StorageError::Backend(_)))
        ));
    }

    /// Reads succeed but view accounting fails.
    struct StuckCounterStore(MemoryStore);

    impl PasteStore for StuckCounterStore {
        fn insert(&self, paste: &Paste) -> Result<(), StorageError> {
            self.0.insert(paste)
        }

        fn find_by_id(&self, id: &str) -> Result<Option<Paste>, StorageError> {
            self.0.find_by_id(id)
        }

        fn decrement_remaining_views(&self, _: &str) -> Result<Decrement, StorageError> {
            Err(StorageError::Backend("write rejected".to_string()))
        }

        fn purge_unavailable(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
            self.0.purge_unavailable(now)
        }
    }

    #[test]
    fn failed_decrement_consumes_nothing() {
        let store = Arc::new(StuckCounterStore(MemoryStore::new()));
        let engine = Engine::new(store.clone(), Arc::new(FixedClock::new(t0())));
        let paste = engine.create(CreatePaste::new("x").max_views(2)).unwrap();

        for _ in 0..3 {
            assert!(matches!(
                engine.fetch(&paste.id),
                Err(Error::Storage(StorageError::Backend(_)))
            ));
        }
        assert_eq!(store.find_by_id(&paste.id).unwrap(), Some(paste));

        let unlimited = engine.create(CreatePaste::new("y")).unwrap();
        assert!(engine.fetch(&unlimited.id).unwrap().is_some());
    }

    /// Reports every id as taken.
    struct CrowdedStore;

    impl PasteStore for CrowdedStore {
        fn insert(&self, paste: &Paste) -> Result<(), StorageError> {
            Err(StorageError::Conflict(paste.id.clone()))
        }

        fn find_by_id(&self, _: &str) -> Result<Option<Paste>, StorageError> {
            Ok(None)
        }

        fn decrement_remaining_views(&self, _: &str) -> Result<Decrement, StorageError> {
            Ok(Decrement::Missing)
        }

        fn purge_unavailable(&self, _: DateTime<Utc>) -> Result<usize, StorageError> {
            Ok(0)
        }
    }

    #[test]
    fn gives_up_after_repeated_collisions() {
        let engine = Engine::new(Arc::new(CrowdedStore), Arc::new(FixedClock::new(t0())));
        assert!(matches!(
            engine.create(CreatePaste::new("x")),
            Err(Error::Storage(StorageError::Conflict(_)))
        ));
    }
}
