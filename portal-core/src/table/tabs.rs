//! Tabbed list views. Each tab owns its own repository handle; switching tabs
//! resets the list filter to a fresh first page tagged with the tab key.

use compact_str::CompactString;
use tracing::{debug, warn};

use crate::error::{PortalError, PortalResult};
use crate::filter::{Filter, FilterStore};
use crate::routing::query_param;

pub const TAB_KEY_PARAM: &str = "tabKey";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab<T> {
    pub key: CompactString,
    pub repo: T,
}

impl<T> Tab<T> {
    pub fn new(key: &str, repo: T) -> Self {
        Self { key: key.into(), repo }
    }
}

#[derive(Debug, Clone)]
pub struct TabSet<T> {
    tabs: Vec<Tab<T>>,
    active: usize,
}

impl<T> TabSet<T> {
    /// The first tab starts active.
    pub fn new(tabs: Vec<Tab<T>>) -> PortalResult<Self> {
        if tabs.is_empty() {
            return Err(PortalError::invalid_input("tabs", "a tab set needs at least one tab"));
        }
        Ok(Self { tabs, active: 0 })
    }

    /// Start on the tab named by the route's `tabKey` query. A missing or
    /// unknown key starts on the first tab.
    pub fn from_route(tabs: Vec<Tab<T>>, route: &str) -> PortalResult<Self> {
        let mut set = Self::new(tabs)?;
        if let Some(key) = query_param(route, TAB_KEY_PARAM) {
            match set.position(key) {
                Some(index) => set.active = index,
                None => warn!(
                    marker = "TAB_KEY_UNKNOWN",
                    operation_type = "tabs",
                    key,
                    "Route names an unknown tab, starting on the first"
                ),
            }
        }
        Ok(set)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.key == key)
    }

    pub fn tabs(&self) -> &[Tab<T>] {
        &self.tabs
    }

    pub fn active(&self) -> &Tab<T> {
        &self.tabs[self.active]
    }

    pub fn active_key(&self) -> &str {
        &self.active().key
    }

    /// Activate the tab named `key`. When a store is given its filter is
    /// replaced by a first page carrying the tab key. Unknown keys change
    /// nothing and return false.
    pub fn change_tab(&mut self, key: &str, store: Option<&FilterStore>) -> bool {
        let Some(index) = self.position(key) else {
            debug!(marker = "TAB_CHANGE_IGNORED", operation_type = "tabs", key, "No such tab");
            return false;
        };
        self.active = index;
        if let Some(store) = store {
            store.replace(Filter::new().with_tab_key(key));
        }
        debug!(marker = "TAB_CHANGED", operation_type = "tabs", key, "Tab changed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DEFAULT_TAKE;

    fn tabs() -> Vec<Tab<&'static str>> {
        vec![
            Tab::new("all", "/api/request/list"),
            Tab::new("pending", "/api/request/list-pending"),
            Tab::new("approved", "/api/request/list-approved"),
        ]
    }

    #[test]
    fn test_initial_tab_from_route() {
        let set = TabSet::from_route(tabs(), "/portal/request/request-master?tabKey=pending").unwrap();
        assert_eq!(set.active_key(), "pending");
        assert_eq!(set.active().repo, "/api/request/list-pending");

        let set = TabSet::from_route(tabs(), "/portal/request/request-master").unwrap();
        assert_eq!(set.active_key(), "all");

        let set = TabSet::from_route(tabs(), "/x?tabKey=archived").unwrap();
        assert_eq!(set.active_key(), "all");
    }

    #[test]
    fn test_change_tab_replaces_filter_with_first_page() {
        let store = FilterStore::new(Filter::new().with_search("acme").with_page(40, 20).unwrap());
        let mut set = TabSet::new(tabs()).unwrap();

        assert!(set.change_tab("approved", Some(&store)));

        let filter = store.current();
        assert_eq!(set.active().repo, "/api/request/list-approved");
        assert_eq!(filter.tab_key.as_deref(), Some("approved"));
        assert_eq!(filter.skip, 0);
        assert_eq!(filter.take, DEFAULT_TAKE);
        assert_eq!(filter.search_term(), None);
    }

    #[test]
    fn test_unknown_tab_changes_nothing() {
        let store = FilterStore::new(Filter::new().with_search("acme"));
        let mut set = TabSet::new(tabs()).unwrap();

        assert!(!set.change_tab("archived", Some(&store)));
        assert_eq!(set.active_key(), "all");
        assert_eq!(store.current().search_term(), Some("acme"));

        assert!(set.change_tab("pending", None));
        assert_eq!(set.active_key(), "pending");
    }

    #[test]
    fn test_empty_tab_set_rejected() {
        assert!(matches!(
            TabSet::<()>::new(Vec::new()),
            Err(PortalError::InvalidInput { .. })
        ));
    }
}
