//! Detail-page save and workflow actions, plus the side drawer that edits a
//! record without leaving the list.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{PortalError, PortalResult};
use crate::model::{Key, Record};
use crate::notify::Notifier;
use crate::routing::{RouteSet, Router};

/// Remote operations on a single record.
#[async_trait]
pub trait DetailService<R: Record>: Send + Sync {
    async fn get(&self, id: &Key) -> PortalResult<R>;

    async fn save(&self, record: &R) -> PortalResult<R>;

    async fn approve(&self, record: &R) -> PortalResult<R> {
        let _ = record;
        Err(PortalError::Other("approve is not supported".into()))
    }

    async fn reject(&self, record: &R) -> PortalResult<R> {
        let _ = record;
        Err(PortalError::Other("reject is not supported".into()))
    }

    /// Withdraw a submitted record.
    async fn cancel(&self, record: &R) -> PortalResult<R> {
        let _ = record;
        Err(PortalError::Other("cancel is not supported".into()))
    }

    /// Reset a record to its initial workflow state.
    async fn reset(&self, record: &R) -> PortalResult<R> {
        let _ = record;
        Err(PortalError::Other("reset is not supported".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailAction {
    Save,
    Approve,
    Reject,
    Cancel,
    Reset,
}

impl DetailAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Reset => "reset",
        }
    }
}

pub struct DetailActions<R: Record, S: DetailService<R>> {
    service: S,
    notifier: Arc<dyn Notifier>,
    router: Arc<dyn Router>,
    routes: RouteSet,
    loading: AtomicBool,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record, S: DetailService<R>> DetailActions<R, S> {
    pub fn new(service: S, notifier: Arc<dyn Notifier>, router: Arc<dyn Router>, routes: RouteSet) -> Self {
        Self {
            service,
            notifier,
            router,
            routes,
            loading: AtomicBool::new(false),
            _record: std::marker::PhantomData,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Fetch the record behind a detail route's `id` query, or a fresh one.
    pub async fn load(&self, id: Option<&Key>) -> PortalResult<Option<R>> {
        match id {
            Some(id) => self.service.get(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn call(&self, action: DetailAction, record: &R) -> PortalResult<R> {
        self.loading.store(true, Ordering::SeqCst);
        let result = match action {
            DetailAction::Save => self.service.save(record).await,
            DetailAction::Approve => self.service.approve(record).await,
            DetailAction::Reject => self.service.reject(record).await,
            DetailAction::Cancel => self.service.cancel(record).await,
            DetailAction::Reset => self.service.reset(record).await,
        };
        self.loading.store(false, Ordering::SeqCst);
        result
    }

    fn report_failure(&self, action: DetailAction, record: &mut R, err: &PortalError) {
        warn!(
            marker = "DETAIL_ACTION_FAILED",
            operation_type = action.as_str(),
            error = %err,
            "Detail action failed"
        );
        if let Some(errors) = err.field_errors() {
            record.set_errors(errors);
        }
        self.notifier.error("Update failed", &err.general_error());
    }

    /// Run `action`, then go back to the master list on success. On failure
    /// the record collects any field errors and the user is notified.
    pub async fn run(&self, action: DetailAction, record: &mut R) -> PortalResult<R> {
        match self.call(action, record).await {
            Ok(saved) => {
                info!(
                    marker = "DETAIL_ACTION_SUCCEEDED",
                    operation_type = action.as_str(),
                    "Detail action succeeded"
                );
                self.notifier.success("Update succeeded");
                self.router.replace(&self.routes.master);
                Ok(saved)
            }
            Err(err) => {
                self.report_failure(action, record, &err);
                Err(err)
            }
        }
    }

    pub async fn save(&self, record: &mut R) -> PortalResult<R> {
        self.run(DetailAction::Save, record).await
    }

    /// Save and stay on the page, replacing the record with the server copy.
    pub async fn save_in_place(&self, record: &mut R) -> PortalResult<()> {
        match self.call(DetailAction::Save, record).await {
            Ok(saved) => {
                *record = saved;
                self.notifier.success("Update succeeded");
                Ok(())
            }
            Err(err) => {
                self.report_failure(DetailAction::Save, record, &err);
                Err(err)
            }
        }
    }

    /// Leave the page without saving.
    pub fn go_back(&self) {
        self.router.replace(&self.routes.master);
    }
}

/// Edit-in-drawer state: open by id or with a default model, save, close.
pub struct DrawerState<R: Record, S: DetailService<R>> {
    service: S,
    notifier: Arc<dyn Notifier>,
    default_model: R,
    model: Mutex<R>,
    open: AtomicBool,
    loading: AtomicBool,
}

impl<R: Record, S: DetailService<R>> DrawerState<R, S> {
    pub fn new(service: S, notifier: Arc<dyn Notifier>, default_model: R) -> Self {
        Self {
            service,
            notifier,
            model: Mutex::new(default_model.clone()),
            default_model,
            open: AtomicBool::new(false),
            loading: AtomicBool::new(false),
        }
    }

    pub fn model(&self) -> R {
        self.model.lock().clone()
    }

    /// Edit the model in place, e.g. from a form field.
    pub fn update_model(&self, edit: impl FnOnce(&mut R)) {
        edit(&mut self.model.lock());
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Open on the record behind `id`, or on a copy of the default model.
    /// A failed fetch leaves the drawer open on its previous model.
    pub async fn open(&self, id: Option<&Key>) -> PortalResult<()> {
        self.open.store(true, Ordering::SeqCst);
        let Some(id) = id else {
            *self.model.lock() = self.default_model.clone();
            debug!(marker = "DRAWER_OPENED", operation_type = "drawer", "Drawer opened on a new record");
            return Ok(());
        };

        self.loading.store(true, Ordering::SeqCst);
        let result = self.service.get(id).await;
        self.loading.store(false, Ordering::SeqCst);

        let item = result?;
        *self.model.lock() = item;
        debug!(marker = "DRAWER_OPENED", operation_type = "drawer", id = %id, "Drawer opened");
        Ok(())
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub async fn save(&self) -> PortalResult<R> {
        self.save_with(|| {}).await
    }

    /// Save the model. On success the server copy replaces it, the drawer
    /// closes and `on_saved` runs. Validation failures land on the model.
    pub async fn save_with(&self, on_saved: impl FnOnce()) -> PortalResult<R> {
        let draft = self.model();
        self.loading.store(true, Ordering::SeqCst);
        let result = self.service.save(&draft).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(saved) => {
                *self.model.lock() = saved.clone();
                self.close();
                on_saved();
                info!(marker = "DRAWER_SAVED", operation_type = "drawer", "Drawer record saved");
                self.notifier.success("Update succeeded");
                Ok(saved)
            }
            Err(err) => {
                warn!(
                    marker = "DRAWER_SAVE_FAILED",
                    operation_type = "drawer",
                    error = %err,
                    "Drawer save failed"
                );
                if let Some(errors) = err.field_errors() {
                    self.model.lock().set_errors(errors);
                }
                self.notifier.error("Update failed", &err.general_error());
                Err(err)
            }
        }
    }
}
