//! Signed-in user profile, persisted under the `profile` session key.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::model::Key;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminType {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub code: Option<CompactString>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSystem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub code: Option<CompactString>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: Option<Key>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub receiving_system_email: bool,
    #[serde(default)]
    pub receiving_system_notification: bool,

    /// The backend spells this field `tokenRemaingExpirySeconds`.
    #[serde(
        default,
        rename = "tokenRemaingExpirySeconds",
        alias = "tokenRemainingExpirySeconds"
    )]
    pub token_remaining_expiry_seconds: Option<u64>,

    #[serde(default)]
    pub admin_type: Option<AdminType>,

    #[serde(default, rename = "subSytems", alias = "subSystems")]
    pub sub_systems: Vec<SubSystem>,
}

impl Profile {
    pub fn display(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.user_name.as_deref())
            .unwrap_or_default()
    }
}
