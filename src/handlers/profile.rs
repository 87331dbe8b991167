//! Student profile handlers: resume management
//!
//! The profile holds exactly one resume representation or none: an uploaded
//! file XOR an external link. Setting one clears the other.

use crate::handlers::enrollments::store_resume;
use crate::handlers::AppState;
use crate::models::*;
use crate::notify;
use crate::validation::{validate_resume_upload, validate_resume_url};
use axum::{
    extract::{Extension, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tokio::fs;

/// Get the caller's profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> impl IntoResponse {
    let profile = sqlx::query_as::<_, StudentProfile>(
        "SELECT * FROM student_profiles WHERE user_id = $1",
    )
    .bind(actor.user_id)
    .fetch_optional(&state.pool)
    .await;

    match profile {
        Ok(Some(profile)) => (StatusCode::OK, Json(ApiResponse::success(profile))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Profile not found")),
        ),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Upload a resume file; clears any stored external link
pub async fn set_resume_file(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<StudentProfile>::error("No file provided")),
            );
        }
        Err(e) => {
            tracing::error!("Multipart parsing error: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(
                    "Failed to process upload. Please try again.",
                )),
            );
        }
    };

    let original_name = field.file_name().unwrap_or("resume").to_string();
    let data = match field.bytes().await {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("Failed to read resume bytes: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("Failed to read uploaded file")),
            );
        }
    };

    if let Err(e) = validate_resume_upload(&data, state.max_upload_size) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    let stored_path = match store_resume(&state, &data, &original_name).await {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("Failed to store resume: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to store resume")),
            );
        }
    };

    let previous_path = current_resume_path(&state, actor).await;

    // File replaces link: the drive URL column is cleared in the same write
    let result = sqlx::query_as::<_, StudentProfile>(
        r#"
        UPDATE student_profiles
        SET resume_path = $2,
            resume_original_name = $3,
            resume_drive_url = NULL,
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(actor.user_id)
    .bind(&stored_path)
    .bind(&original_name)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(profile)) => {
            if let Some(old) = previous_path {
                if old != stored_path {
                    if let Err(e) = fs::remove_file(&old).await {
                        tracing::warn!("Failed to remove replaced resume {}: {}", old, e);
                    }
                }
            }

            notify::log_audit(
                &state.pool,
                "resume_updated",
                "student_profile",
                Some(actor.user_id),
                "student",
                Some(actor.user_id),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(profile)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Profile not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update resume: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resume")),
            )
        }
    }
}

/// Set an external resume link; clears any stored uploaded file
pub async fn set_resume_url(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<SetResumeUrl>,
) -> impl IntoResponse {
    if let Err(e) = validate_resume_url(&input.url) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<StudentProfile>::error(e.to_string())),
        );
    }

    let previous_path = current_resume_path(&state, actor).await;

    let result = sqlx::query_as::<_, StudentProfile>(
        r#"
        UPDATE student_profiles
        SET resume_drive_url = $2,
            resume_path = NULL,
            resume_original_name = NULL,
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(actor.user_id)
    .bind(&input.url)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(profile)) => {
            if let Some(old) = previous_path {
                if let Err(e) = fs::remove_file(&old).await {
                    tracing::warn!("Failed to remove replaced resume {}: {}", old, e);
                }
            }

            notify::log_audit(
                &state.pool,
                "resume_updated",
                "student_profile",
                Some(actor.user_id),
                "student",
                Some(actor.user_id),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(profile)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Profile not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to update resume link: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update resume link")),
            )
        }
    }
}

/// Remove the resume entirely (both representations)
pub async fn delete_resume(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> impl IntoResponse {
    let previous_path = current_resume_path(&state, actor).await;

    let result = sqlx::query_as::<_, StudentProfile>(
        r#"
        UPDATE student_profiles
        SET resume_path = NULL,
            resume_original_name = NULL,
            resume_drive_url = NULL,
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(actor.user_id)
    .fetch_optional(&state.pool)
    .await;

    match result {
        Ok(Some(profile)) => {
            if let Some(old) = previous_path {
                if let Err(e) = fs::remove_file(&old).await {
                    tracing::warn!("Failed to remove deleted resume {}: {}", old, e);
                }
            }

            notify::log_audit(
                &state.pool,
                "resume_deleted",
                "student_profile",
                Some(actor.user_id),
                "student",
                Some(actor.user_id),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(profile)))
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Profile not found")),
        ),
        Err(e) => {
            tracing::error!("Failed to delete resume: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete resume")),
            )
        }
    }
}

async fn current_resume_path(state: &AppState, actor: Actor) -> Option<String> {
    sqlx::query_scalar::<_, Option<String>>(
        "SELECT resume_path FROM student_profiles WHERE user_id = $1",
    )
    .bind(actor.user_id)
    .fetch_optional(&state.pool)
    .await
    .ok()
    .flatten()
    .flatten()
}
