//! Sibling routes and navigation.
//!
//! Every entity area lives under a base path; its detail, master, preview and
//! approve pages are derived from the last path segment.

use compact_str::{CompactString, format_compact};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Key;

pub const LOGIN_ROUTE: &str = "/login";
pub const FORBIDDEN_ROUTE: &str = "/403";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Routes derived from an entity area's base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSet {
    pub base: CompactString,
    pub detail: CompactString,
    pub master: CompactString,
    pub preview: CompactString,
    pub approve: CompactString,
    pub detail_with_id: CompactString,
}

impl RouteSet {
    /// `"/portal/app-user"` yields `/portal/app-user/app-user-detail` and friends.
    pub fn new(base: &str) -> Self {
        let trimmed = base.trim_end_matches('/');
        let last = trimmed.rsplit('/').next().unwrap_or_default();

        Self {
            base: trimmed.into(),
            detail: format_compact!("{trimmed}/{last}-detail"),
            master: format_compact!("{trimmed}/{last}-master"),
            preview: format_compact!("{trimmed}/{last}-preview?id="),
            approve: format_compact!("{trimmed}/{last}-approve?id="),
            detail_with_id: format_compact!("{trimmed}/detail?id="),
        }
    }

    pub fn preview_of(&self, id: &Key) -> String {
        format!("{}{id}", self.preview)
    }

    pub fn approve_of(&self, id: &Key) -> String {
        format!("{}{id}", self.approve)
    }

    pub fn detail_of(&self, id: &Key) -> String {
        format!("{}{id}", self.detail_with_id)
    }
}

/// Raw value of the query parameter `name`, if present.
pub fn query_param<'a>(route: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = route.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Extract the `id` query parameter of a route; numeric ids become numeric keys.
pub fn id_from_query(route: &str) -> Option<Key> {
    query_param(route, "id").and_then(Key::parse)
}

/// Navigation collaborator.
pub trait Router: Send + Sync {
    fn push(&self, route: &str);
    fn replace(&self, route: &str);
}

/// In-memory history stack, for hosts without a browser history.
#[derive(Debug, Default)]
pub struct HistoryRouter {
    history: Mutex<Vec<String>>,
}

impl HistoryRouter {
    pub fn new(initial: &str) -> Self {
        Self {
            history: Mutex::new(vec![initial.to_string()]),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.history.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    pub fn back(&self) -> Option<String> {
        let mut history = self.history.lock();
        if history.len() > 1 {
            history.pop();
        }
        history.last().cloned()
    }
}

impl Router for HistoryRouter {
    fn push(&self, route: &str) {
        debug!(marker = "ROUTE_PUSH", operation_type = "routing", route, "Navigating");
        self.history.lock().push(route.to_string());
    }

    fn replace(&self, route: &str) {
        debug!(marker = "ROUTE_REPLACE", operation_type = "routing", route, "Replacing route");
        let mut history = self.history.lock();
        history.pop();
        history.push(route.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_routes() {
        let routes = RouteSet::new("/portal/app-user/");
        assert_eq!(routes.base, "/portal/app-user");
        assert_eq!(routes.detail, "/portal/app-user/app-user-detail");
        assert_eq!(routes.master, "/portal/app-user/app-user-master");
        assert_eq!(routes.preview_of(&Key::Number(7)), "/portal/app-user/app-user-preview?id=7");
        assert_eq!(routes.approve_of(&Key::Number(7)), "/portal/app-user/app-user-approve?id=7");
        assert_eq!(routes.detail_of(&Key::from("abc")), "/portal/app-user/detail?id=abc");
    }

    #[test]
    fn test_id_from_query() {
        assert_eq!(id_from_query("/x/detail?id=42"), Some(Key::Number(42)));
        assert_eq!(id_from_query("/x/detail?tab=1&id=a1"), Some(Key::from("a1")));
        assert_eq!(id_from_query("/x/detail"), None);
        assert_eq!(id_from_query("/x/detail?id="), None);
    }

    #[test]
    fn test_query_param_keeps_raw_value() {
        assert_eq!(query_param("/x/master?tabKey=pending&id=3", "tabKey"), Some("pending"));
        assert_eq!(query_param("/x/master?tabKey=", "tabKey"), Some(""));
        assert_eq!(query_param("/x/master", "tabKey"), None);
    }

    #[test]
    fn test_history_router() {
        let router = HistoryRouter::new("/dashboard");
        router.push("/portal/app-user/app-user-master");
        router.replace("/403");
        assert_eq!(router.current().as_deref(), Some("/403"));
        assert_eq!(router.len(), 2);
        assert_eq!(router.back().as_deref(), Some("/dashboard"));
        assert_eq!(router.back().as_deref(), Some("/dashboard"));
    }
}
