//! HTTP failure model and the global error interceptor.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RouteConfig;
use crate::error::FieldErrors;
use crate::notify::Notifier;
use crate::routing::{FORBIDDEN_ROUTE, Router};

/// Non-2xx response reported by a remote collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    pub body: Value,
}

impl HttpError {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn status_text(&self) -> &'static str {
        match self.status {
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            420 => "Update Conflict",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unexpected Status",
        }
    }

    /// Field-keyed messages. A nested `errors` object wins over top-level
    /// string entries.
    pub fn field_errors(&self) -> FieldErrors {
        let source = match self.body.get("errors") {
            Some(Value::Object(map)) => map,
            _ => match &self.body {
                Value::Object(map) => map,
                _ => return FieldErrors::new(),
            },
        };

        source
            .iter()
            .filter(|(name, _)| name.as_str() != "generalErrors")
            .filter_map(|(name, value)| value.as_str().map(|msg| (name.clone(), msg.to_string())))
            .collect()
    }

    pub fn general_errors(&self) -> Vec<String> {
        self.body
            .get("generalErrors")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Best-effort human readable body: plain text, joined general errors or
    /// the raw JSON.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => {
                let general = self.general_errors();
                if general.is_empty() {
                    other.to_string()
                } else {
                    general.join(", ")
                }
            }
        }
    }
}

/// Turns well-known failure statuses into global notifications.
///
/// The error is handed back unchanged so the caller can still fold it into
/// local state.
#[derive(Clone)]
pub struct ErrorInterceptor {
    notifier: Arc<dyn Notifier>,
    router: Arc<dyn Router>,
    forbidden_route: String,
}

impl ErrorInterceptor {
    pub fn new(notifier: Arc<dyn Notifier>, router: Arc<dyn Router>) -> Self {
        Self {
            notifier,
            router,
            forbidden_route: FORBIDDEN_ROUTE.to_string(),
        }
    }

    pub fn from_config(notifier: Arc<dyn Notifier>, router: Arc<dyn Router>, routes: &RouteConfig) -> Self {
        Self::new(notifier, router).with_forbidden_route(routes.forbidden.clone())
    }

    #[must_use]
    pub fn with_forbidden_route(mut self, route: impl Into<String>) -> Self {
        self.forbidden_route = route.into();
        self
    }

    pub fn intercept(&self, err: HttpError) -> HttpError {
        match err.status {
            403 => {
                warn!(
                    marker = "HTTP_FORBIDDEN",
                    operation_type = "http_intercept",
                    status = err.status,
                    "Access denied, redirecting"
                );
                self.notifier.error(
                    "Access denied",
                    "You do not have permission to perform this action",
                );
                self.router.push(&self.forbidden_route);
            }
            420 => self.notifier.error("Update failed", &err.body_text()),
            500 => self.notifier.error("System error", &err.body_text()),
            502 => self
                .notifier
                .error("Bad gateway", "The backend server is not responding"),
            504 => self
                .notifier
                .error("Gateway timeout", "The backend server took too long to respond"),
            500..=599 => self.notifier.error("Service unavailable", &err.body_text()),
            status => {
                debug!(
                    marker = "HTTP_PASSTHROUGH",
                    operation_type = "http_intercept",
                    status,
                    "Error left to caller"
                );
            }
        }
        err
    }

    /// Intercept a failed result, leaving successes untouched.
    pub fn check<T>(&self, result: Result<T, HttpError>) -> Result<T, HttpError> {
        result.map_err(|err| self.intercept(err))
    }
}
