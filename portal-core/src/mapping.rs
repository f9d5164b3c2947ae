//! src/mapping.rs
//! ============================================================================
//! # `MappingPicker`: modal multi-select over a remote candidate list
//!
//! The picker attaches children to a parent record. It pairs a
//! [`CollectionLoader`] for the candidates with a manual
//! [`SelectionTracker`], and remembers the parent's current children as the
//! baseline that `cancel` returns to.
//!
//! ```text
//! Closed --open--> Open --confirm--> Closed (selection returned)
//!                       --cancel---> Closed (baseline restored)
//! ```

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::filter::Filter;
use crate::loader::{CollectionLoader, DataService, LoadOutcome};
use crate::model::{CollectionPage, Key, Record};
use crate::selection::{SelectionMode, SelectionSet, SelectionTracker, SelectionType};
use crate::tasks::scope::TaskScope;

/// A child already attached to the parent, e.g. a role mapping that points at
/// a user.
pub trait Attachment<R> {
    /// Key of the mapped record.
    fn mapped_key(&self) -> Option<Key>;

    /// The mapped record itself.
    fn mapped_value(&self) -> Option<R>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    Closed,
    Open,
}

pub struct MappingPicker<R: Record, S: DataService<R>> {
    loader: CollectionLoader<R, S>,
    selection: SelectionTracker<R>,
    baseline: SelectionSet<R>,
    state: PickerState,
    accumulate: bool,
    scope: TaskScope,
}

impl<R: Record, S: DataService<R>> MappingPicker<R, S> {
    /// The candidate filter defaults to the first page of ten.
    pub fn new(service: S) -> Self {
        Self::with_filter(service, Filter::default())
    }

    pub fn with_filter(service: S, filter: Filter) -> Self {
        Self {
            loader: CollectionLoader::new(service, filter),
            selection: SelectionTracker::new(SelectionMode::Manual),
            baseline: SelectionSet::default(),
            state: PickerState::Closed,
            accumulate: false,
            scope: TaskScope::new("mapping-picker"),
        }
    }

    /// In accumulation mode each open starts from an empty selection and
    /// cancel leaves the selection alone.
    #[must_use]
    pub fn accumulating(mut self, accumulate: bool) -> Self {
        self.accumulate = accumulate;
        self
    }

    #[must_use]
    pub fn with_type(mut self, selection_type: SelectionType) -> Self {
        self.selection = self.selection.with_type(selection_type);
        self
    }

    #[must_use]
    pub fn with_check_used(mut self, check_used: bool) -> Self {
        self.selection = self.selection.with_check_used(check_used);
        self
    }

    pub const fn state(&self) -> PickerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == PickerState::Open
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn candidates(&self) -> CollectionPage<R> {
        self.loader.page()
    }

    pub fn filter(&self) -> Filter {
        self.loader.store().current()
    }

    pub fn loader(&self) -> &CollectionLoader<R, S> {
        &self.loader
    }

    pub fn selection(&self) -> &SelectionTracker<R> {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionTracker<R> {
        &mut self.selection
    }

    pub fn baseline(&self) -> &SelectionSet<R> {
        &self.baseline
    }

    /// Open the picker. Candidates are fetched only if they were never
    /// loaded and no load is already running.
    pub fn open(&mut self) -> Option<JoinHandle<Option<LoadOutcome>>> {
        self.state = PickerState::Open;

        if self.accumulate {
            self.selection.clear();
        } else {
            self.selection.replace(self.baseline.clone());
        }

        let needs_load = !self.loader.has_loaded() && !self.loader.is_loading();
        info!(
            marker = "PICKER_OPENED",
            operation_type = "mapping_picker",
            needs_load,
            seeded = self.selection.checked_keys().len(),
            "Mapping picker opened"
        );

        needs_load.then(|| self.loader.spawn_load(&self.scope, self.loader.store().current()))
    }

    /// Close and hand back the chosen records.
    pub fn confirm(&mut self) -> Vec<R> {
        self.state = PickerState::Closed;
        let chosen = self.selection.checked_values().to_vec();
        info!(
            marker = "PICKER_CONFIRMED",
            operation_type = "mapping_picker",
            chosen = chosen.len(),
            "Mapping picker confirmed"
        );
        chosen
    }

    pub fn cancel(&mut self) {
        if !self.accumulate {
            self.selection.replace(self.baseline.clone());
        }
        self.state = PickerState::Closed;
        debug!(marker = "PICKER_CANCELLED", operation_type = "mapping_picker", "Mapping picker cancelled");
    }

    /// Re-derive the baseline and selection from the parent's attached
    /// children. Entries missing either the key or the value are skipped so
    /// keys and values stay aligned.
    pub fn reset_from_parent<C: Attachment<R>>(&mut self, contents: &[C]) {
        let mut baseline = SelectionSet::default();
        for content in contents {
            if let (Some(key), Some(value)) = (content.mapped_key(), content.mapped_value()) {
                if !baseline.checked_keys.contains(&key) {
                    baseline.checked_keys.push(key);
                    baseline.checked_values.push(value);
                }
            }
        }

        debug!(
            marker = "PICKER_RESET",
            operation_type = "mapping_picker",
            attached = baseline.len(),
            "Baseline reset from parent"
        );
        self.selection.replace(baseline.clone());
        self.baseline = baseline;
    }

    /// Replace the candidate filter and reload.
    pub fn set_filter(&mut self, filter: Filter) -> JoinHandle<Option<LoadOutcome>> {
        self.loader.store().replace(filter.clone());
        self.loader.spawn_load(&self.scope, filter)
    }

    pub fn toggle(&mut self, record: &R, checked: bool) -> bool {
        self.selection.toggle(record, checked)
    }

    pub fn toggle_all(&mut self, checked: bool, change_rows: &[R]) -> bool {
        self.selection.toggle_all(checked, change_rows)
    }

    /// Cancel pending candidate loads.
    pub async fn teardown(&self) {
        self.scope.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::ScriptedService;
    use crate::model::DynamicRecord;
    use std::time::Duration;

    struct RoleUser {
        user_id: Option<i64>,
        user: Option<DynamicRecord>,
    }

    impl Attachment<DynamicRecord> for RoleUser {
        fn mapped_key(&self) -> Option<Key> {
            self.user_id.map(Key::Number)
        }

        fn mapped_value(&self) -> Option<DynamicRecord> {
            self.user.clone()
        }
    }

    fn attached(id: i64) -> RoleUser {
        RoleUser {
            user_id: Some(id),
            user: Some(DynamicRecord::new(id).with("name", format!("user {id}"))),
        }
    }

    fn candidates(ids: &[i64]) -> ScriptedService {
        let service = ScriptedService::default();
        service.push(
            Duration::ZERO,
            Ok(ids.iter().map(|id| DynamicRecord::new(*id)).collect()),
        );
        service
    }

    #[tokio::test]
    async fn test_open_loads_once_with_default_page() {
        let mut picker = MappingPicker::new(candidates(&[1, 2, 3]));

        let handle = picker.open().unwrap();
        assert!(handle.await.unwrap().unwrap().is_loaded());
        assert_eq!(picker.candidates().list.len(), 3);
        assert_eq!(picker.filter().take, 10);

        picker.cancel();
        assert!(picker.open().is_none());
    }

    #[tokio::test]
    async fn test_cancel_restores_baseline() {
        let mut picker = MappingPicker::new(candidates(&[1, 2, 3]));
        picker.reset_from_parent(&[attached(1)]);

        picker.open();
        picker.toggle(&DynamicRecord::new(2), true);
        picker.toggle(&DynamicRecord::new(1), false);
        picker.cancel();

        assert!(!picker.is_open());
        assert_eq!(picker.selection().checked_keys(), &[Key::Number(1)]);
    }

    #[tokio::test]
    async fn test_confirm_returns_selection() {
        let mut picker = MappingPicker::new(candidates(&[1, 2]));
        picker.reset_from_parent(&[attached(1)]);

        picker.open();
        picker.toggle(&DynamicRecord::new(2), true);
        let chosen = picker.confirm();

        let ids: Vec<_> = chosen.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec![Key::Number(1), Key::Number(2)]);
        assert_eq!(picker.state(), PickerState::Closed);
    }

    #[tokio::test]
    async fn test_accumulation_mode_starts_empty_and_keeps_on_cancel() {
        let mut picker = MappingPicker::new(candidates(&[1, 2])).accumulating(true);
        picker.reset_from_parent(&[attached(1)]);

        picker.open();
        assert!(picker.selection().checked_keys().is_empty());
        picker.toggle(&DynamicRecord::new(2), true);
        picker.cancel();
        assert_eq!(picker.selection().checked_keys(), &[Key::Number(2)]);
    }

    #[test]
    fn test_reset_skips_half_filled_attachments() {
        let mut picker = MappingPicker::new(ScriptedService::default());
        let broken = RoleUser {
            user_id: Some(5),
            user: None,
        };
        picker.reset_from_parent(&[attached(1), broken, attached(1), attached(3)]);

        assert_eq!(picker.baseline().checked_keys, vec![Key::Number(1), Key::Number(3)]);
        assert_eq!(picker.baseline().checked_values.len(), 2);
    }

    #[tokio::test]
    async fn test_set_filter_reloads() {
        let service = candidates(&[1]);
        service.push(Duration::ZERO, Ok(vec![DynamicRecord::new(4), DynamicRecord::new(5)]));
        let mut picker = MappingPicker::new(service);

        picker.open().unwrap().await.unwrap();
        let next = Filter::new().with_search("x");
        picker.set_filter(next.clone()).await.unwrap();

        assert_eq!(picker.filter(), next);
        assert_eq!(picker.candidates().list.len(), 2);
        picker.teardown().await;
    }
}
