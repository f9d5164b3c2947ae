//! Spreadsheet imports into a list or into a parent's content rows.
//!
//! Both flavours report through the global [`Notifier`]: success as a plain
//! toast, failure as an error whose description is the server's response body.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs as TokioFs;
use tracing::{info, warn};

use crate::error::{PortalError, PortalResult};
use crate::model::{Key, Record};
use crate::notify::Notifier;

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn read(path: &Path) -> PortalResult<Self> {
        let bytes = TokioFs::read(path)
            .await
            .map_err(|e| PortalError::storage(path, e.to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PortalError::invalid_input("path", "import path has no file name"))?;
        Ok(Self { name, bytes })
    }
}

#[async_trait]
pub trait ImportService<R: Record>: Send + Sync {
    /// Upload into the list. `query` narrows the target, e.g. a category.
    async fn import_list(&self, file: &ImportFile, query: Option<&str>) -> PortalResult<()>;

    /// Upload content rows for `parent` and get the parsed rows back.
    async fn import_content(&self, file: &ImportFile, parent: &Key) -> PortalResult<Vec<R>>;
}

type ImportCallback<R> = Box<dyn Fn(&[R]) + Send + Sync>;

pub struct Importer<R: Record> {
    notifier: Arc<dyn Notifier>,
    on_success: Option<ImportCallback<R>>,
}

impl<R: Record> Importer<R> {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            on_success: None,
        }
    }

    /// Run `callback` after every successful import. List imports pass an
    /// empty slice.
    #[must_use]
    pub fn with_on_success(mut self, callback: impl Fn(&[R]) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub async fn import_list<S: ImportService<R>>(
        &self,
        service: &S,
        file: &ImportFile,
        query: Option<&str>,
    ) -> PortalResult<()> {
        match service.import_list(file, query).await {
            Ok(()) => {
                self.succeeded(file, &[]);
                Ok(())
            }
            Err(err) => Err(self.failed(file, err)),
        }
    }

    pub async fn import_content<S: ImportService<R>>(
        &self,
        service: &S,
        file: &ImportFile,
        parent: &Key,
    ) -> PortalResult<Vec<R>> {
        match service.import_content(file, parent).await {
            Ok(rows) => {
                self.succeeded(file, &rows);
                Ok(rows)
            }
            Err(err) => Err(self.failed(file, err)),
        }
    }

    /// Read `path` and import it into the list.
    pub async fn import_path<S: ImportService<R>>(
        &self,
        service: &S,
        path: &Path,
        query: Option<&str>,
    ) -> PortalResult<()> {
        let file = ImportFile::read(path).await?;
        self.import_list(service, &file, query).await
    }

    fn succeeded(&self, file: &ImportFile, rows: &[R]) {
        info!(
            marker = "IMPORT_SUCCEEDED",
            operation_type = "import",
            file = %file.name,
            rows = rows.len(),
            "Import succeeded"
        );
        self.notifier.success("Import succeeded");
        if let Some(callback) = &self.on_success {
            callback(rows);
        }
    }

    fn failed(&self, file: &ImportFile, err: PortalError) -> PortalError {
        warn!(
            marker = "IMPORT_FAILED",
            operation_type = "import",
            file = %file.name,
            error = %err,
            "Import failed"
        );
        self.notifier.error("Import failed", &failure_text(&err));
        err
    }
}

/// The server's explanation of a rejected import.
fn failure_text(err: &PortalError) -> String {
    match err {
        PortalError::Http(http) => http.body_text(),
        other => {
            let general = other.general_error();
            if general.is_empty() { other.to_string() } else { general }
        }
    }
}
