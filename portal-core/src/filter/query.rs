//! The filter object: predicates plus paging, ordering and search.

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::{PortalError, PortalResult};
use crate::filter::Predicate;

pub const DEFAULT_TAKE: usize = 10;

const fn default_take() -> usize {
    DEFAULT_TAKE
}

fn deserialize_take<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let take = usize::deserialize(deserializer)?;
    if take == 0 {
        return Err(de::Error::custom("page size must be greater than zero"));
    }
    Ok(take)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Asc,
    Desc,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(default)]
    pub skip: usize,

    #[serde(default = "default_take", deserialize_with = "deserialize_take")]
    pub take: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<CompactString>,

    #[serde(default)]
    pub order_type: OrderType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<CompactString, Predicate>,

    /// Active tab of a tabbed list view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_key: Option<CompactString>,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            skip: 0,
            take: DEFAULT_TAKE,
            order_by: None,
            order_type: OrderType::None,
            search: None,
            fields: IndexMap::new(),
            tab_key: None,
        }
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page window. `take` must be positive.
    pub fn with_page(mut self, skip: usize, take: usize) -> PortalResult<Self> {
        if take == 0 {
            return Err(PortalError::invalid_input("take", "page size must be greater than zero"));
        }
        self.skip = skip;
        self.take = take;
        Ok(self)
    }

    /// Ordering only sticks when an order is present.
    #[must_use]
    pub fn with_order(mut self, field: Option<&str>, order: OrderType) -> Self {
        match (field, order) {
            (Some(field), OrderType::Asc | OrderType::Desc) => {
                self.order_by = Some(field.into());
                self.order_type = order;
            }
            _ => {
                self.order_by = None;
                self.order_type = OrderType::None;
            }
        }
        self
    }

    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.is_empty() { None } else { Some(term) };
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, field: &str, predicate: Predicate) -> Self {
        self.fields.insert(field.into(), predicate);
        self
    }

    #[must_use]
    pub fn with_tab_key(mut self, key: &str) -> Self {
        self.tab_key = Some(key.into());
        self
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    /// Overlay `patch` on top of this filter: paging, ordering and search come
    /// from the patch, predicates are unioned with the patch winning per field.
    #[must_use]
    pub fn merged_with(&self, patch: &Self) -> Self {
        let mut fields = self.fields.clone();
        for (name, predicate) in &patch.fields {
            fields.insert(name.clone(), predicate.clone());
        }

        Self {
            skip: patch.skip,
            take: patch.take,
            order_by: patch.order_by.clone(),
            order_type: patch.order_type,
            search: patch.search.clone().or_else(|| self.search.clone()),
            fields,
            tab_key: patch.tab_key.clone().or_else(|| self.tab_key.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{NumberOp, TextOp};

    #[test]
    fn test_defaults() {
        let filter = Filter::default();
        assert_eq!(filter.skip, 0);
        assert_eq!(filter.take, DEFAULT_TAKE);
        assert_eq!(filter.order_type, OrderType::None);

        let parsed: Filter = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, filter);
    }

    #[test]
    fn test_zero_take_rejected() {
        assert!(matches!(
            Filter::new().with_page(0, 0),
            Err(PortalError::InvalidInput { .. })
        ));
        assert_eq!(Filter::new().with_page(20, 5).unwrap().skip, 20);
    }

    #[test]
    fn test_zero_take_rejected_on_deserialize() {
        let err = serde_json::from_str::<Filter>(r#"{"skip":0,"take":0}"#).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let parsed: Filter = serde_json::from_str(r#"{"skip":40}"#).unwrap();
        assert_eq!(parsed.take, DEFAULT_TAKE);
    }

    #[test]
    fn test_tab_key_round_trips_as_camel_case() {
        let f = Filter::new().with_tab_key("pending");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["tabKey"], "pending");
        assert!(serde_json::to_value(Filter::new()).unwrap().get("tabKey").is_none());

        let merged = f.merged_with(&Filter::new().with_page(10, 10).unwrap());
        assert_eq!(merged.tab_key.as_deref(), Some("pending"));
    }

    #[test]
    fn test_order_requires_direction() {
        let f = Filter::new().with_order(Some("name"), OrderType::None);
        assert!(f.order_by.is_none());

        let f = Filter::new().with_order(Some("name"), OrderType::Desc);
        assert_eq!(f.order_by.as_deref(), Some("name"));
        assert_eq!(f.order_type, OrderType::Desc);
    }

    #[test]
    fn test_merge_overlays_patch() {
        let base = Filter::new()
            .with_search("acme")
            .with_predicate("code", crate::filter::Predicate::text(TextOp::Contain("A".into())))
            .with_predicate("age", crate::filter::Predicate::number(NumberOp::Greater(1.0)));
        let patch = Filter::new()
            .with_page(10, 10)
            .unwrap()
            .with_predicate("age", crate::filter::Predicate::number(NumberOp::Less(5.0)));

        let merged = base.merged_with(&patch);
        assert_eq!(merged.skip, 10);
        assert_eq!(merged.search_term(), Some("acme"));
        assert_eq!(merged.fields.len(), 2);
        assert_eq!(
            merged.fields["age"],
            crate::filter::Predicate::number(NumberOp::Less(5.0))
        );
    }

    #[test]
    fn test_json_shape() {
        let f: Filter = serde_json::from_str(
            r#"{"skip":0,"take":20,"orderBy":"name","orderType":"ASC",
                "fields":{"name":{"kind":"text","ops":[{"startWith":"A"}]}}}"#,
        )
        .unwrap();
        assert_eq!(f.take, 20);
        assert_eq!(f.order_type, OrderType::Asc);
        assert!(f.fields.contains_key("name"));
    }
}
