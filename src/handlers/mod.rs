//! HTTP request handlers

pub mod admin;
pub mod enrollments;
pub mod middleware;
pub mod profile;

pub use admin::*;
pub use enrollments::*;
pub use profile::*;

use crate::lifecycle::LifecycleError;
use crate::models::ApiResponse;
use axum::{http::StatusCode, Json};
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use tera::Tera;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Uploaded resumes
    pub upload_dir: PathBuf,
    /// Generated lifecycle documents
    pub docs_dir: PathBuf,
    pub templates: Arc<Tera>,
    pub max_upload_size: usize,
    pub is_production: bool,
}

/// Map a lifecycle error onto a `(status, envelope)` pair.
/// Infrastructure failures are logged and surfaced as a generic message.
pub fn lifecycle_error<T>(e: LifecycleError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &e {
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::InvalidTransition
        | LifecycleError::AlreadyEnrolled
        | LifecycleError::RequestPending
        | LifecycleError::InternshipFull
        | LifecycleError::InternshipInactive => StatusCode::CONFLICT,
        LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
        LifecycleError::DocumentNotAvailable | LifecycleError::Unauthorized => {
            StatusCode::FORBIDDEN
        }
        LifecycleError::Dependency(_)
        | LifecycleError::Render(_)
        | LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Lifecycle operation failed: {:?}", e);
        return (status, Json(ApiResponse::error("Internal error")));
    }

    (status, Json(ApiResponse::error(e.to_string())))
}
