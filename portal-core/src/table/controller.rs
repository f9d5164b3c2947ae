//! Table sort and pagination events turned into filter replacements.

use tracing::debug;

use crate::config::PagingConfig;
use crate::error::{PortalError, PortalResult};
use crate::filter::{Filter, OrderType};
use crate::loader::{CollectionLoader, DataService, LoadOutcome};
use crate::model::Record;

/// Sort direction as a table column header reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascend,
    Descend,
}

impl From<Option<SortOrder>> for OrderType {
    fn from(order: Option<SortOrder>) -> Self {
        match order {
            Some(SortOrder::Ascend) => Self::Asc,
            Some(SortOrder::Descend) => Self::Desc,
            None => Self::None,
        }
    }
}

/// The column header state for `column` under `filter`.
pub fn column_sort_order(filter: &Filter, column: &str) -> Option<SortOrder> {
    if filter.order_by.as_deref() != Some(column) {
        return None;
    }
    match filter.order_type {
        OrderType::Asc => Some(SortOrder::Ascend),
        OrderType::Desc => Some(SortOrder::Descend),
        OrderType::None => None,
    }
}

/// New filter for a sort change. `order_by` is only kept when an order is
/// present; paging restarts from the first page.
pub fn sorted_filter(filter: &Filter, field: Option<&str>, order: Option<SortOrder>) -> Filter {
    let mut next = filter.clone().with_order(field, order.into());
    next.skip = 0;
    next
}

/// New filter for a page change.
pub fn paged_filter(filter: &Filter, skip: usize, take: usize) -> PortalResult<Filter> {
    filter.clone().with_page(skip, take)
}

/// Binds table events to a loader's store.
pub struct TableController<'a, R: Record, S: DataService<R>> {
    loader: &'a CollectionLoader<R, S>,
    reload: bool,
    page_sizes: Vec<usize>,
}

impl<'a, R: Record, S: DataService<R>> TableController<'a, R, S> {
    pub fn new(loader: &'a CollectionLoader<R, S>) -> Self {
        Self {
            loader,
            reload: true,
            page_sizes: Vec::new(),
        }
    }

    /// Restrict page sizes to the configured options.
    pub fn from_config(loader: &'a CollectionLoader<R, S>, paging: &PagingConfig) -> Self {
        Self::new(loader).with_page_sizes(paging.page_size_options.clone())
    }

    /// An empty list accepts any positive size.
    #[must_use]
    pub fn with_page_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.page_sizes = sizes;
        self
    }

    pub fn page_sizes(&self) -> &[usize] {
        &self.page_sizes
    }

    /// Only replace the filter; the caller decides when to load.
    #[must_use]
    pub fn without_reload(mut self) -> Self {
        self.reload = false;
        self
    }

    pub async fn sort_changed(
        &self,
        field: Option<&str>,
        order: Option<SortOrder>,
    ) -> Option<LoadOutcome> {
        let next = sorted_filter(&self.loader.store().current(), field, order);
        debug!(
            marker = "TABLE_SORT_CHANGED",
            operation_type = "table",
            field = ?next.order_by,
            order = ?next.order_type,
            "Sort changed"
        );
        self.apply(next).await
    }

    pub async fn page_changed(&self, skip: usize, take: usize) -> PortalResult<Option<LoadOutcome>> {
        if !self.page_sizes.is_empty() && !self.page_sizes.contains(&take) {
            return Err(PortalError::invalid_input(
                "take",
                format!("page size {take} is not one of {:?}", self.page_sizes),
            ));
        }
        let next = paged_filter(&self.loader.store().current(), skip, take)?;
        debug!(
            marker = "TABLE_PAGE_CHANGED",
            operation_type = "table",
            skip,
            take,
            "Page changed"
        );
        Ok(self.apply(next).await)
    }

    async fn apply(&self, next: Filter) -> Option<LoadOutcome> {
        if self.reload {
            Some(self.loader.reload_from_base(next).await)
        } else {
            self.loader.store().replace(next);
            None
        }
    }
}
