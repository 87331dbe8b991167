//! Student portal handlers: enrollment lifecycle, task submissions,
//! document downloads

use crate::documents;
use crate::handlers::{lifecycle_error, AppState};
use crate::lifecycle::{self, tracker, LifecycleError, ResumeSource};
use crate::models::*;
use crate::notify;
use crate::validation::{validate_resume_upload, validate_resume_url};
use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio::fs;
use uuid::Uuid;

// =============================================================================
// Internship Catalog
// =============================================================================

/// List active internships
pub async fn list_internships(State(state): State<AppState>) -> impl IntoResponse {
    let internships = sqlx::query_as::<_, Internship>(
        "SELECT * FROM internships WHERE is_active = TRUE ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await;

    match internships {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::success(items))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// List active tasks for an internship
pub async fn list_tasks(
    State(state): State<AppState>,
    Path(internship_id): Path<Uuid>,
) -> impl IntoResponse {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE internship_id = $1 AND is_active = TRUE ORDER BY day_number, created_at",
    )
    .bind(internship_id)
    .fetch_all(&state.pool)
    .await;

    match tasks {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::success(items))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

// =============================================================================
// Enrollment Endpoints
// =============================================================================

/// Request enrollment in an internship.
///
/// Multipart body: optional `resume` file (takes precedence), optional
/// `resume_url` link, optional `message`. With neither, the profile's
/// resume is used.
pub async fn create_enrollment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(internship_id): Path<Uuid>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut message: Option<String> = None;
    let mut resume_url: Option<String> = None;
    let mut uploaded: Option<(Vec<u8>, String)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart parsing error: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<EnrollmentRequest>::error(
                        "Failed to process upload. Please try again.",
                    )),
                );
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "message" => message = field.text().await.ok().filter(|s| !s.trim().is_empty()),
            "resume_url" => {
                resume_url = field.text().await.ok().filter(|s| !s.trim().is_empty())
            }
            "resume" => {
                let original = field.file_name().unwrap_or("resume").to_string();
                match field.bytes().await {
                    Ok(data) => uploaded = Some((data.to_vec(), original)),
                    Err(e) => {
                        tracing::error!("Failed to read resume bytes: {}", e);
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ApiResponse::error("Failed to read uploaded resume")),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    // Uploaded copy takes precedence over an inline link over the profile
    let resume = if let Some((data, original)) = uploaded {
        if let Err(e) = validate_resume_upload(&data, state.max_upload_size) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.to_string())),
            );
        }

        let stored = match store_resume(&state, &data, &original).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Failed to store resume: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error("Failed to store resume")),
                );
            }
        };

        ResumeSource::Uploaded {
            path: stored,
            original_name: original,
        }
    } else if let Some(url) = resume_url {
        if let Err(e) = validate_resume_url(&url) {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(e.to_string())),
            );
        }
        ResumeSource::Link(url)
    } else {
        ResumeSource::Profile
    };

    match lifecycle::create_request(&state.pool, actor.user_id, internship_id, message, resume)
        .await
    {
        Ok(request) => {
            notify::log_audit(
                &state.pool,
                "enrollment_requested",
                "enrollment_request",
                Some(request.id),
                "student",
                Some(actor.user_id),
            )
            .await;

            (StatusCode::CREATED, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

/// List the caller's enrollment requests
pub async fn list_my_enrollments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> impl IntoResponse {
    let requests = sqlx::query_as::<_, EnrollmentRequest>(
        "SELECT * FROM enrollment_requests WHERE student_id = $1 ORDER BY created_at DESC",
    )
    .bind(actor.user_id)
    .fetch_all(&state.pool)
    .await;

    match requests {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::success(items))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

/// Get one enrollment request (owner or admin)
pub async fn get_enrollment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match lifecycle::fetch_request(&state.pool, id).await {
        Ok(request) => {
            if request.student_id != actor.user_id && !actor.is_admin {
                return lifecycle_error(LifecycleError::Unauthorized);
            }
            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

/// File a completion claim for an approved enrollment
pub async fn request_completion(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match lifecycle::request_completion(&state.pool, id, actor.user_id).await {
        Ok(request) => {
            notify::log_audit(
                &state.pool,
                "completion_requested",
                "enrollment_request",
                Some(request.id),
                "student",
                Some(actor.user_id),
            )
            .await;

            tracing::info!(
                "Student {} requested completion for enrollment {} ({}/{} tasks)",
                actor.user_id,
                id,
                request.tasks_completed,
                request.total_tasks
            );

            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

/// File a withdrawal request against an approved enrollment
pub async fn request_withdrawal(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(input): Json<RequestWithdrawal>,
) -> impl IntoResponse {
    match lifecycle::request_withdrawal(&state.pool, id, actor.user_id, input.reason).await {
        Ok(request) => {
            notify::log_audit(
                &state.pool,
                "withdrawal_requested",
                "enrollment_request",
                Some(request.id),
                "student",
                Some(actor.user_id),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

// =============================================================================
// Document Downloads
// =============================================================================

fn parse_document_kind(value: &str) -> Option<DocumentKind> {
    match value {
        "mou" => Some(DocumentKind::Mou),
        "offer_letter" => Some(DocumentKind::OfferLetter),
        "completion_letter" => Some(DocumentKind::CompletionLetter),
        "certificate" => Some(DocumentKind::Certificate),
        "partial_completion_letter" => Some(DocumentKind::PartialCompletionLetter),
        "relieving_letter" => Some(DocumentKind::RelievingLetter),
        _ => None,
    }
}

/// Download a lifecycle document, generating it on demand. Gated on the
/// enrollment state; flags flip forward on first generation.
pub async fn download_document(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((id, doc_type)): Path<(Uuid, String)>,
) -> Response {
    let Some(kind) = parse_document_kind(&doc_type) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error("Unknown document type")),
        )
            .into_response();
    };

    let request = match lifecycle::fetch_request(&state.pool, id).await {
        Ok(r) => r,
        Err(e) => return lifecycle_error::<()>(e).into_response(),
    };
    if request.student_id != actor.user_id && !actor.is_admin {
        return lifecycle_error::<()>(LifecycleError::Unauthorized).into_response();
    }

    match documents::generate(&state.pool, &state.templates, &state.docs_dir, id, kind).await {
        Ok(doc) => {
            notify::log_audit(
                &state.pool,
                "document_generated",
                "enrollment_request",
                Some(id),
                if actor.is_admin { "admin" } else { "student" },
                Some(actor.user_id),
            )
            .await;

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", doc.filename),
                )
                .body(Body::from(doc.bytes))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => lifecycle_error::<()>(e).into_response(),
    }
}

// =============================================================================
// Task Submissions
// =============================================================================

/// Submit (or resubmit after rejection) work for a task. Requires an
/// approved enrollment in the task's internship.
pub async fn create_submission(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(task_id): Path<Uuid>,
    Json(input): Json<CreateSubmission>,
) -> impl IntoResponse {
    let enrolled: Option<i64> = match sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM enrollment_requests e
        JOIN tasks t ON t.internship_id = e.internship_id
        WHERE t.id = $1 AND e.student_id = $2 AND e.status = 'approved'
        "#,
    )
    .bind(task_id)
    .bind(actor.user_id)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            );
        }
    };

    if enrolled.unwrap_or(0) == 0 {
        return lifecycle_error(LifecycleError::Unauthorized);
    }

    match tracker::create_submission(&state.pool, actor.user_id, task_id, input).await {
        Ok(submission) => {
            notify::log_audit(
                &state.pool,
                "submission_created",
                "submission",
                Some(submission.id),
                "student",
                Some(actor.user_id),
            )
            .await;

            (StatusCode::CREATED, Json(ApiResponse::success(submission)))
        }
        Err(e) => lifecycle_error(e),
    }
}

/// List the caller's submissions for an internship
pub async fn list_my_submissions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(internship_id): Path<Uuid>,
) -> impl IntoResponse {
    let submissions = sqlx::query_as::<_, Submission>(
        r#"
        SELECT s.* FROM submissions s
        JOIN tasks t ON t.id = s.task_id
        WHERE s.student_id = $1 AND t.internship_id = $2 AND s.superseded = FALSE
        ORDER BY s.created_at DESC
        "#,
    )
    .bind(actor.user_id)
    .bind(internship_id)
    .fetch_all(&state.pool)
    .await;

    match submissions {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::success(items))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// List the caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> impl IntoResponse {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT 100",
    )
    .bind(actor.user_id)
    .fetch_all(&state.pool)
    .await;

    match notifications {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::success(items))),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error")),
            )
        }
    }
}

// =============================================================================
// Certificate Verification (public)
// =============================================================================

/// Look up a certificate by its verification code
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    let certificate = sqlx::query_as::<_, Certificate>(
        "SELECT * FROM certificates WHERE verification_code = $1",
    )
    .bind(code.trim().to_uppercase())
    .fetch_optional(&state.pool)
    .await;

    match certificate {
        Ok(Some(cert)) => (StatusCode::OK, Json(ApiResponse::success(cert))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Certificate not found")),
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

// =============================================================================
// Helper Functions
// =============================================================================

pub(super) fn sanitize_filename(filename: &str) -> String {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_start_matches('.').trim_matches('_');

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Store an uploaded resume under the upload directory, returning the path
pub(super) async fn store_resume(
    state: &AppState,
    data: &[u8],
    original_name: &str,
) -> Result<String, std::io::Error> {
    let resume_dir = state.upload_dir.join("resumes");
    fs::create_dir_all(&resume_dir).await?;

    let storage_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(original_name));
    let path = resume_dir.join(&storage_name);

    if !path.starts_with(&state.upload_dir) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path escapes upload directory",
        ));
    }

    fs::write(&path, data).await?;
    Ok(path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_kind() {
        assert_eq!(parse_document_kind("mou"), Some(DocumentKind::Mou));
        assert_eq!(
            parse_document_kind("offer_letter"),
            Some(DocumentKind::OfferLetter)
        );
        assert_eq!(
            parse_document_kind("relieving_letter"),
            Some(DocumentKind::RelievingLetter)
        );
        assert_eq!(parse_document_kind("payslip"), None);
        assert_eq!(parse_document_kind(""), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("resume.pdf"), "resume.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my resume (final).pdf"), "my_resume__final_.pdf");
        assert_eq!(sanitize_filename("...."), "upload");
    }
}
