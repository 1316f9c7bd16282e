//! Helper types and traits for cleaner route handlers.
//!
//! Provides extension traits for converting `Option` and `Result` types
//! into HTTP-appropriate error responses, reducing boilerplate in routes.

use axum::http::StatusCode;
use invoicer_core::Error;

/// Standard result type for route handlers.
pub type RouteResult<T> = Result<T, (StatusCode, String)>;

/// Extension trait for converting `Option<T>` to `RouteResult<T>`.
pub trait OptionExt<T> {
    /// Returns the contained value or a 404 Not Found error.
    fn or_not_found(self, msg: &str) -> RouteResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> RouteResult<T> {
        self.ok_or_else(|| (StatusCode::NOT_FOUND, msg.to_string()))
    }
}

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

/// Status code for a core error.
///
/// Contract violations are the caller's fault, a busy export or lost race is a conflict,
/// and failures of the translation or upload services are upstream failures.
pub fn status_for(error: &Error) -> StatusCode {
    if error.is_contract_violation() {
        StatusCode::BAD_REQUEST
    } else if error.is_translation_failure() {
        StatusCode::BAD_GATEWAY
    } else {
        match error {
            Error::ExportInProgress | Error::PersistenceConflict(_) => StatusCode::CONFLICT,
            Error::UploadFailure(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Extension trait mapping core results onto status codes.
pub trait CoreResultExt<T> {
    fn or_status(self) -> RouteResult<T>;
}

impl<T> CoreResultExt<T> for invoicer_core::Result<T> {
    fn or_status(self) -> RouteResult<T> {
        self.map_err(|e| (status_for(&e), e.to_string()))
    }
}
