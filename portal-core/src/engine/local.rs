//! In-memory filter, sort and pagination over a held collection.

use compact_str::CompactString;
use smallvec::{SmallVec, smallvec};
use tracing::debug;

use crate::filter::{Filter, OrderType};
use crate::model::{CollectionPage, FieldValue, Record};

/// Evaluates filters against records held locally.
#[derive(Debug, Clone)]
pub struct LocalEngine {
    search_fields: SmallVec<[CompactString; 2]>,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self {
            search_fields: smallvec!["name".into(), "code".into()],
        }
    }
}

impl LocalEngine {
    pub fn new<I, S>(search_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        Self {
            search_fields: search_fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn search_fields(&self) -> &[CompactString] {
        &self.search_fields
    }

    /// Whether a record passes the filter's search term, or, without a term,
    /// every predicate.
    pub fn matches<R: Record>(&self, record: &R, filter: &Filter) -> bool {
        if let Some(term) = filter.search_term() {
            return self.search_fields.iter().any(|field| {
                record
                    .field(field)
                    .as_ref()
                    .and_then(FieldValue::as_text)
                    .is_some_and(|text| text.contains(term))
            });
        }

        filter
            .fields
            .iter()
            .all(|(name, predicate)| predicate.matches(record.field(name).as_ref()))
    }

    /// Stable sort by `order_by`. Missing values compare as null.
    pub fn sort<R: Record>(&self, records: &mut [R], filter: &Filter) {
        let Some(field) = filter.order_by.as_deref() else {
            return;
        };

        let value_of = |r: &R| r.field(field).unwrap_or(FieldValue::Null);
        match filter.order_type {
            OrderType::Asc => records.sort_by(|a, b| value_of(a).sort_cmp(&value_of(b))),
            OrderType::Desc => records.sort_by(|a, b| value_of(b).sort_cmp(&value_of(a))),
            OrderType::None => {}
        }
    }

    /// Filter, sort and page `records`. Unsaved records skip the pipeline and
    /// are placed at the front of the page.
    pub fn apply<R: Record>(&self, records: &[R], filter: &Filter) -> CollectionPage<R> {
        let (unsaved, saved): (Vec<&R>, Vec<&R>) = records.iter().partition(|r| r.id().is_none());

        let mut matched: Vec<R> = saved
            .into_iter()
            .filter(|r| self.matches(*r, filter))
            .cloned()
            .collect();
        self.sort(&mut matched, filter);

        let total = matched.len();
        let mut list: Vec<R> = unsaved.into_iter().cloned().collect();
        list.extend(matched.into_iter().skip(filter.skip).take(filter.take));

        debug!(
            marker = "LOCAL_FILTER_APPLIED",
            operation_type = "local_engine",
            input = records.len(),
            matched = total,
            returned = list.len(),
            "Local filter applied"
        );

        let count = list.len() as u64;
        CollectionPage {
            list,
            count: Some(count),
        }
    }
}
