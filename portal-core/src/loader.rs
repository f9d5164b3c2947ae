//! src/loader.rs
//! ============================================================================
//! # `CollectionLoader`: remote list + count with ordered completions
//!
//! Each load takes a generation token. Only the completion holding the latest
//! token may write the list, the count or the loading flag; older completions
//! come back as [`LoadOutcome::Stale`] and are dropped on the floor.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PortalError, PortalResult};
use crate::filter::{Filter, FilterStore};
use crate::model::{CollectionPage, ListState, Record};
use crate::tasks::scope::TaskScope;

/// Remote source of a collection.
#[async_trait]
pub trait DataService<R: Record>: Send + Sync + 'static {
    async fn list(&self, filter: &Filter) -> PortalResult<Vec<R>>;

    async fn count(&self, filter: &Filter) -> PortalResult<u64>;
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded { count: u64 },
    Failed(PortalError),

    /// A newer load was issued before this one finished.
    Stale { generation: u64 },
}

impl LoadOutcome {
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

struct LoaderInner<R: Record, S> {
    service: S,
    store: FilterStore,
    state: watch::Sender<ListState<R>>,
    generation: AtomicU64,
}

/// Loader for one collection. Clones share state.
pub struct CollectionLoader<R: Record, S: DataService<R>> {
    inner: Arc<LoaderInner<R, S>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, S: DataService<R>> Clone for CollectionLoader<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _record: PhantomData,
        }
    }
}

/// Clears the loading flag if the load it guards is abandoned while still
/// the latest one.
struct InFlight<R: Record, S> {
    inner: Arc<LoaderInner<R, S>>,
    generation: u64,
    settled: bool,
}

impl<R: Record, S> Drop for InFlight<R, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let inner = &self.inner;
        let generation = self.generation;
        let released = inner.state.send_if_modified(|s| {
            if inner.generation.load(Ordering::SeqCst) == generation {
                s.loading = false;
                true
            } else {
                false
            }
        });
        if released {
            warn!(
                marker = "LOAD_ABANDONED",
                operation_type = "collection_load",
                generation,
                "Load dropped before completion"
            );
        }
    }
}

impl<R: Record, S: DataService<R>> CollectionLoader<R, S> {
    pub fn new(service: S, initial: Filter) -> Self {
        let (state, _) = watch::channel(ListState::default());
        Self {
            inner: Arc::new(LoaderInner {
                service,
                store: FilterStore::new(initial),
                state,
                generation: AtomicU64::new(0),
            }),
            _record: PhantomData,
        }
    }

    pub fn store(&self) -> &FilterStore {
        &self.inner.store
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<R>> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> ListState<R> {
        self.inner.state.borrow().clone()
    }

    pub fn page(&self) -> CollectionPage<R> {
        self.inner.state.borrow().page()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn has_loaded(&self) -> bool {
        self.inner.state.borrow().loaded
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Take the next generation. The bump happens under the state lock so a
    /// completion can never check against a generation that is about to move.
    fn begin(&self) -> InFlight<R, S> {
        let mut generation = 0;
        self.inner.state.send_modify(|s| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            s.loading = true;
        });
        InFlight {
            inner: self.inner.clone(),
            generation,
            settled: false,
        }
    }

    async fn run(mut guard: InFlight<R, S>, filter: Filter) -> LoadOutcome {
        let inner = guard.inner.clone();
        let generation = guard.generation;
        let start = Instant::now();

        let result = tokio::try_join!(inner.service.list(&filter), inner.service.count(&filter));
        guard.settled = true;

        // Check and write under one lock acquisition, serialised with `begin`.
        let mut outcome = LoadOutcome::Stale { generation };
        let mut latest = generation;
        let mut items = 0;
        inner.state.send_if_modified(|s| {
            latest = inner.generation.load(Ordering::SeqCst);
            if latest != generation {
                return false;
            }
            match result {
                Ok((list, count)) => {
                    items = list.len();
                    s.list = list;
                    s.count = Some(count);
                    s.loaded = true;
                    outcome = LoadOutcome::Loaded { count };
                }
                Err(err) => {
                    s.list = Vec::new();
                    s.count = None;
                    outcome = LoadOutcome::Failed(err);
                }
            }
            s.loading = false;
            true
        });

        match &outcome {
            LoadOutcome::Loaded { count } => info!(
                marker = "LOAD_COMPLETED",
                operation_type = "collection_load",
                generation,
                items,
                count,
                duration_ms = start.elapsed().as_millis() as u64,
                "Collection loaded"
            ),
            LoadOutcome::Failed(err) => warn!(
                marker = "LOAD_FAILED",
                operation_type = "collection_load",
                generation,
                error = %err,
                "Collection load failed"
            ),
            LoadOutcome::Stale { .. } => debug!(
                marker = "LOAD_STALE",
                operation_type = "collection_load",
                generation,
                latest,
                "Discarding stale completion"
            ),
        }
        outcome
    }

    /// Load list and count for `filter`. The store is left untouched.
    pub async fn load(&self, filter: Filter) -> LoadOutcome {
        Self::run(self.begin(), filter).await
    }

    /// Load with the store's current filter.
    pub async fn load_current(&self) -> LoadOutcome {
        self.load(self.inner.store.current()).await
    }

    /// Replace the stored filter with `base`, then load it.
    pub async fn reload_from_base(&self, base: Filter) -> LoadOutcome {
        self.inner.store.replace(base.clone());
        self.load(base).await
    }

    /// Load the store's filter overlaid with `patch`.
    pub async fn load_merged(&self, patch: &Filter) -> LoadOutcome {
        let merged = self.inner.store.current().merged_with(patch);
        self.load(merged).await
    }

    /// Run a load as a task owned by `scope`. The generation is taken
    /// immediately, so a later spawn always supersedes this one, and a task
    /// cancelled before its first poll still releases the loading flag.
    pub fn spawn_load(&self, scope: &TaskScope, filter: Filter) -> JoinHandle<Option<LoadOutcome>> {
        scope.spawn(Self::run(self.begin(), filter))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PortalError;
    use crate::model::{DynamicRecord, Key};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Scripted service: each call pops the next delay and result.
    #[derive(Default)]
    pub(crate) struct ScriptedService {
        pub(crate) lists: Mutex<VecDeque<(Duration, PortalResult<Vec<DynamicRecord>>)>>,
        pub(crate) counts: Mutex<VecDeque<(Duration, PortalResult<u64>)>>,
        pub(crate) seen: Mutex<Vec<Filter>>,
    }

    impl ScriptedService {
        pub(crate) fn push(&self, delay: Duration, result: PortalResult<Vec<DynamicRecord>>) {
            let count = result.as_ref().map(|l| l.len() as u64).map_err(Clone::clone);
            self.lists.lock().push_back((delay, result));
            self.counts.lock().push_back((delay, count));
        }

        /// Script list and count independently.
        pub(crate) fn push_split(
            &self,
            delay: Duration,
            list: PortalResult<Vec<DynamicRecord>>,
            count: PortalResult<u64>,
        ) {
            self.lists.lock().push_back((delay, list));
            self.counts.lock().push_back((delay, count));
        }
    }

    /// Answers at once unless the filter searches for "slow".
    struct SearchDelayed;

    #[async_trait]
    impl DataService<DynamicRecord> for SearchDelayed {
        async fn list(&self, filter: &Filter) -> PortalResult<Vec<DynamicRecord>> {
            if filter.search.as_deref() == Some("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(vec![DynamicRecord::new(1)])
        }

        async fn count(&self, _filter: &Filter) -> PortalResult<u64> {
            Ok(1)
        }
    }

    #[async_trait]
    impl DataService<DynamicRecord> for ScriptedService {
        async fn list(&self, filter: &Filter) -> PortalResult<Vec<DynamicRecord>> {
            self.seen.lock().push(filter.clone());
            let next = self.lists.lock().pop_front();
            let (delay, result) = next.unwrap_or((Duration::ZERO, Ok(Vec::new())));
            tokio::time::sleep(delay).await;
            result
        }

        async fn count(&self, _filter: &Filter) -> PortalResult<u64> {
            let next = self.counts.lock().pop_front();
            let (delay, result) = next.unwrap_or((Duration::ZERO, Ok(0)));
            tokio::time::sleep(delay).await;
            result
        }
    }

    fn rows(ids: &[i64]) -> Vec<DynamicRecord> {
        ids.iter().map(|id| DynamicRecord::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_load_publishes_list_and_count() {
        let service = ScriptedService::default();
        service.push(Duration::ZERO, Ok(rows(&[1, 2])));
        let loader = CollectionLoader::new(service, Filter::default());

        let outcome = loader.load(Filter::default()).await;
        assert!(outcome.is_loaded());

        let state = loader.snapshot();
        assert_eq!(state.list.len(), 2);
        assert_eq!(state.count, Some(2));
        assert!(!state.loading);
        assert!(state.loaded);
    }

    #[tokio::test]
    async fn test_failure_clears_list_and_count() {
        let service = ScriptedService::default();
        service.push(Duration::ZERO, Ok(rows(&[1])));
        service.push(Duration::ZERO, Err(PortalError::Other("boom".into())));
        let loader = CollectionLoader::new(service, Filter::default());

        loader.load(Filter::default()).await;
        let outcome = loader.load(Filter::default()).await;

        assert!(matches!(outcome, LoadOutcome::Failed(_)));
        let state = loader.snapshot();
        assert!(state.list.is_empty());
        assert_eq!(state.count, None);
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_completion_is_discarded() {
        let service = ScriptedService::default();
        service.push(Duration::from_millis(500), Ok(rows(&[1, 2, 3])));
        service.push(Duration::from_millis(10), Ok(rows(&[9])));
        let loader = CollectionLoader::new(service, Filter::default());
        let scope = TaskScope::new("test");

        let slow = loader.spawn_load(&scope, Filter::default());
        let fast = loader.spawn_load(&scope, Filter::default());

        let fast = fast.await.unwrap().unwrap();
        assert!(fast.is_loaded());
        assert!(!loader.is_loading());

        let slow = slow.await.unwrap().unwrap();
        assert!(matches!(slow, LoadOutcome::Stale { generation: 1 }));

        let state = loader.snapshot();
        assert_eq!(state.list.len(), 1);
        assert_eq!(state.list[0].id, Some(Key::Number(9)));
        assert_eq!(state.count, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_stays_set_until_latest_completes() {
        let service = ScriptedService::default();
        service.push(Duration::from_millis(10), Ok(rows(&[1])));
        service.push(Duration::from_millis(500), Ok(rows(&[2])));
        let loader = CollectionLoader::new(service, Filter::default());
        let scope = TaskScope::new("test");

        let first = loader.spawn_load(&scope, Filter::default());
        let second = loader.spawn_load(&scope, Filter::default());

        assert!(matches!(first.await.unwrap(), Some(LoadOutcome::Stale { .. })));
        assert!(loader.is_loading());

        assert!(second.await.unwrap().unwrap().is_loaded());
        assert!(!loader.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_clears_loading_without_writing_list() {
        let service = ScriptedService::default();
        service.push(Duration::from_secs(30), Ok(rows(&[1])));
        let loader = CollectionLoader::new(service, Filter::default());
        let scope = TaskScope::new("test");

        let handle = loader.spawn_load(&scope, Filter::default());
        assert!(loader.is_loading());
        scope.teardown().await;

        assert_eq!(handle.await.unwrap().map(|o| o.is_loaded()), None);
        let state = loader.snapshot();
        assert!(!state.loading);
        assert!(state.list.is_empty());
    }

    #[tokio::test]
    async fn test_reload_from_base_overrides_store() {
        let loader = CollectionLoader::new(ScriptedService::default(), Filter::new().with_search("old"));
        let base = Filter::new().with_page(0, 25).unwrap();

        loader.reload_from_base(base.clone()).await;
        assert_eq!(loader.store().current(), base);
        assert_eq!(loader.inner.service.seen.lock().last(), Some(&base));
    }

    #[tokio::test]
    async fn test_load_merged_keeps_store() {
        let initial = Filter::new().with_search("acme");
        let loader = CollectionLoader::new(ScriptedService::default(), initial.clone());
        let patch = Filter::new().with_page(10, 10).unwrap();

        loader.load_merged(&patch).await;

        let seen = loader.inner.service.seen.lock().last().cloned().unwrap();
        assert_eq!(seen.skip, 10);
        assert_eq!(seen.search_term(), Some("acme"));
        assert_eq!(loader.store().current(), initial);
    }

    #[tokio::test]
    async fn test_count_failure_alone_fails_the_load() {
        let service = ScriptedService::default();
        service.push(Duration::ZERO, Ok(rows(&[1, 2])));
        service.push_split(
            Duration::ZERO,
            Ok(rows(&[3])),
            Err(PortalError::Other("count down".into())),
        );
        let loader = CollectionLoader::new(service, Filter::default());

        assert!(loader.load(Filter::default()).await.is_loaded());
        let outcome = loader.load(Filter::default()).await;

        assert!(matches!(outcome, LoadOutcome::Failed(PortalError::Other(ref m)) if m == "count down"));
        let state = loader.snapshot();
        assert!(state.list.is_empty());
        assert_eq!(state.count, None);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_list_failure_alone_fails_the_load() {
        let service = ScriptedService::default();
        service.push_split(
            Duration::ZERO,
            Err(PortalError::Other("list down".into())),
            Ok(7),
        );
        let loader = CollectionLoader::new(service, Filter::default());

        let outcome = loader.load(Filter::default()).await;

        assert!(matches!(outcome, LoadOutcome::Failed(PortalError::Other(ref m)) if m == "list down"));
        let state = loader.snapshot();
        assert!(state.list.is_empty());
        assert_eq!(state.count, None);
        assert!(!state.loaded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_newer_load_keeps_loading_set_across_threads() {
        let loader = CollectionLoader::new(SearchDelayed, Filter::default());

        for _ in 0..50 {
            let scope = TaskScope::new("race");
            let fast = loader.spawn_load(&scope, Filter::default());
            tokio::task::yield_now().await;
            let _slow = loader.spawn_load(&scope, Filter::new().with_search("slow"));

            // The fast completion may land before or after the slow load
            // begins, but never clears the flag the slow load owns.
            let outcome = fast.await.unwrap().unwrap();
            assert!(outcome.is_loaded() || matches!(outcome, LoadOutcome::Stale { .. }));
            assert!(loader.is_loading());

            scope.teardown().await;
            assert!(!loader.is_loading());
        }
    }
}
