//! Sidebar menu tree and permission-based visibility.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::routing::DASHBOARD_ROUTE;

/// Permission paths granted to the signed-in user, keyed by route pattern.
pub type PermissionMap = HashMap<String, i64>;

static ROUTE_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\w+").expect("Invalid route parameter regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub name: String,
    pub link: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Menu>,

    #[serde(default)]
    pub show: bool,

    #[serde(default)]
    pub active: bool,
}

impl Menu {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Menu>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The stock menu: just the dashboard, always shown.
pub fn default_menu() -> Vec<Menu> {
    vec![Menu {
        show: true,
        ..Menu::new("menu.title.dashboard", DASHBOARD_ROUTE)
    }]
}

/// `:param` segments become `*`, the form permission paths are stored in.
pub fn permission_pattern(link: &str) -> String {
    ROUTE_PARAM.replace_all(link, "*").into_owned()
}

/// True when any of `urls` is granted.
pub fn check_visible(permissions: &PermissionMap, urls: &[&str]) -> bool {
    urls.iter().any(|url| permissions.contains_key(*url))
}

/// Recompute `show` across the tree. Leaves are shown when their link pattern
/// is granted; parents when at least one child is. Returns whether anything
/// at this level is shown.
pub fn apply_permissions(menus: &mut [Menu], permissions: &PermissionMap) -> bool {
    let mut any_shown = false;
    for menu in menus.iter_mut() {
        menu.show = if menu.is_leaf() {
            permissions.contains_key(&permission_pattern(&menu.link))
        } else {
            apply_permissions(&mut menu.children, permissions)
        };
        any_shown |= menu.show;
    }
    debug!(
        marker = "MENU_PERMISSIONS_APPLIED",
        operation_type = "menu",
        items = menus.len(),
        any_shown,
        "Menu visibility recomputed"
    );
    any_shown
}

/// Mark the menu items whose link is a prefix of `path` as active.
pub fn mark_active(menus: &mut [Menu], path: &str) -> bool {
    let mut found = false;
    for menu in menus.iter_mut() {
        let child_active = mark_active(&mut menu.children, path);
        menu.active = child_active || (!menu.link.is_empty() && path.starts_with(&menu.link));
        found |= menu.active;
    }
    found
}
