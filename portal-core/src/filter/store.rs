//! Single-slot filter store.

use tokio::sync::watch;
use tracing::debug;

use crate::filter::Filter;

/// Holds the current filter of one collection. `replace` is a full replace;
/// merging is the caller's business.
#[derive(Debug)]
pub struct FilterStore {
    tx: watch::Sender<Filter>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new(Filter::default())
    }
}

impl FilterStore {
    pub fn new(initial: Filter) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn replace(&self, filter: Filter) {
        debug!(
            marker = "FILTER_REPLACED",
            operation_type = "filter_store",
            skip = filter.skip,
            take = filter.take,
            predicates = filter.fields.len(),
            "Filter replaced"
        );
        self.tx.send_replace(filter);
    }

    pub fn current(&self) -> Filter {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Filter> {
        self.tx.subscribe()
    }
}
