pub mod error;
pub use error::{ErrorClass, FieldErrors, PortalError, PortalResult};

pub mod config;

pub mod logging;

pub mod http;
pub use http::{ErrorInterceptor, HttpError};

pub mod notify;
pub use notify::{ChannelNotifier, Notification, NotificationLevel, Notifier};

pub mod routing;
pub use routing::{HistoryRouter, RouteSet, Router};

pub mod model {
    pub mod record;
    pub use record::{DynamicRecord, FieldValue, Key, Record, ValidationState};

    pub mod profile;
    pub use profile::{AdminType, Profile, SubSystem};

    pub mod collection;
    pub use collection::{CollectionPage, ListState};
}

pub mod filter {
    pub mod predicate;
    pub use predicate::{DateOp, IdOp, NumberOp, Predicate, TextOp};

    pub mod query;
    pub use query::{DEFAULT_TAKE, Filter, OrderType};

    pub mod store;
    pub use store::FilterStore;
}

pub mod engine {
    pub mod local;
    pub use local::LocalEngine;

    pub mod tree;
    pub use tree::{Tree, TreeNode};
}

pub mod tasks {
    pub mod scope;
    pub use scope::TaskScope;
}

pub mod loader;
pub use loader::{CollectionLoader, DataService, LoadOutcome};

pub mod selection;
pub use selection::{SelectionMode, SelectionSet, SelectionTracker, SelectionType};

pub mod mapping;
pub use mapping::{Attachment, MappingPicker, PickerState};

pub mod table {
    pub mod controller;
    pub use controller::{SortOrder, TableController};

    pub mod content;
    pub use content::{ContentTable, Row};

    pub mod tabs;
    pub use tabs::{Tab, TabSet};
}

pub mod detail;
pub use detail::{DetailAction, DetailActions, DetailService, DrawerState};

pub mod session;
pub use session::{FileSessionStore, MemorySessionStore, SessionContext, SessionStore};

pub mod auth;
pub use auth::{AuthClient, Credentials, LoginFlow, LoginStep, SessionGuard};

pub mod menu;
pub use menu::Menu;

pub mod export;
pub use export::{ExportFile, ExportService, Exporter};

pub mod import;
pub use import::{ImportFile, ImportService, Importer};
