//! Pages and list state published by loaders.

use serde::Serialize;

/// One page of a collection. `count` is `None` when the total is unknown,
/// which is what a failed remote load leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionPage<R> {
    pub list: Vec<R>,
    pub count: Option<u64>,
}

impl<R> Default for CollectionPage<R> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            count: Some(0),
        }
    }
}

/// Observable state of a collection loader.
#[derive(Debug, Clone)]
pub struct ListState<R> {
    pub list: Vec<R>,
    pub count: Option<u64>,
    pub loading: bool,

    /// At least one load completed successfully.
    pub loaded: bool,
}

impl<R> Default for ListState<R> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            count: Some(0),
            loading: false,
            loaded: false,
        }
    }
}

impl<R: Clone> ListState<R> {
    pub fn page(&self) -> CollectionPage<R> {
        CollectionPage {
            list: self.list.clone(),
            count: self.count,
        }
    }
}
