//! Saving server-generated export files.
//!
//! An [`Exporter`] drives one of four server exports (a filtered list, the
//! list template, a record's content rows or the content template) and saves
//! the response under the name the server advertises.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::fs as TokioFs;
use tracing::{info, warn};

use crate::error::{PortalError, PortalResult};
use crate::filter::Filter;
use crate::model::{Key, Record};

/// Name used when the server sends no usable `filename=`.
pub const FALLBACK_FILE_NAME: &str = "fileDownloaded";

/// Extract the file name from a `Content-Disposition` header value.
///
/// ```
/// use portal_core::export::filename_from_disposition;
/// let name = filename_from_disposition(r#"attachment; filename="roles.xlsx""#);
/// assert_eq!(name.as_deref(), Some("roles.xlsx"));
/// ```
pub fn filename_from_disposition(header: &str) -> Option<String> {
    header
        .split(';')
        .find(|part| part.contains("filename="))
        .map(|part| part.replace("filename=", "").replace('"', "").trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Write `bytes` into `dir` under the name carried by `disposition`. Only the
/// final path component of the advertised name is kept.
pub async fn save_export(dir: &Path, disposition: Option<&str>, bytes: &[u8]) -> PortalResult<PathBuf> {
    let name = disposition
        .and_then(filename_from_disposition)
        .and_then(|name| {
            Path::new(&name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

    TokioFs::create_dir_all(dir)
        .await
        .map_err(|e| PortalError::storage(dir, e.to_string()))?;

    let path = dir.join(name);
    TokioFs::write(&path, bytes)
        .await
        .map_err(|e| PortalError::storage(&path, e.to_string()))?;

    info!(
        marker = "EXPORT_SAVED",
        operation_type = "export",
        path = %path.display(),
        bytes = bytes.len(),
        "Export saved"
    );
    Ok(path)
}

/// A downloaded export: the raw `Content-Disposition` header and the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFile {
    pub disposition: Option<String>,
    pub bytes: Vec<u8>,
}

/// Server side of the export buttons. Every export defaults to unsupported.
#[async_trait]
pub trait ExportService<R: Record>: Send + Sync {
    async fn export_list(&self, filter: &Filter) -> PortalResult<ExportFile> {
        let _ = filter;
        Err(PortalError::Other("list export is not supported".into()))
    }

    async fn export_template(&self, query: Option<&Key>) -> PortalResult<ExportFile> {
        let _ = query;
        Err(PortalError::Other("template export is not supported".into()))
    }

    async fn export_content(&self, record: &R) -> PortalResult<ExportFile> {
        let _ = record;
        Err(PortalError::Other("content export is not supported".into()))
    }

    async fn export_content_template(&self, id: Option<&Key>) -> PortalResult<ExportFile> {
        let _ = id;
        Err(PortalError::Other("content template export is not supported".into()))
    }
}

pub struct Exporter {
    dir: PathBuf,
    loading: AtomicBool,
}

impl Exporter {
    /// Exports land in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loading: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn export_list<R: Record, S: ExportService<R>>(
        &self,
        service: &S,
        filter: &Filter,
    ) -> PortalResult<PathBuf> {
        self.download("list", service.export_list(filter)).await
    }

    pub async fn export_template<R: Record, S: ExportService<R>>(
        &self,
        service: &S,
        query: Option<&Key>,
    ) -> PortalResult<PathBuf> {
        self.download("template", service.export_template(query)).await
    }

    pub async fn export_content<R: Record, S: ExportService<R>>(
        &self,
        service: &S,
        record: &R,
    ) -> PortalResult<PathBuf> {
        self.download("content", service.export_content(record)).await
    }

    /// The content template is keyed by the owning record's id.
    pub async fn export_content_template<R: Record, S: ExportService<R>>(
        &self,
        service: &S,
        record: &R,
    ) -> PortalResult<PathBuf> {
        let id = record.id();
        self.download("content_template", service.export_content_template(id.as_ref()))
            .await
    }

    async fn download(
        &self,
        kind: &'static str,
        request: impl Future<Output = PortalResult<ExportFile>>,
    ) -> PortalResult<PathBuf> {
        self.loading.store(true, Ordering::SeqCst);
        let result = match request.await {
            Ok(file) => save_export(&self.dir, file.disposition.as_deref(), &file.bytes).await,
            Err(err) => Err(err),
        };
        self.loading.store(false, Ordering::SeqCst);

        if let Err(err) = &result {
            warn!(
                marker = "EXPORT_FAILED",
                operation_type = "export",
                kind,
                error = %err,
                "Export failed"
            );
        }
        result
    }
}
