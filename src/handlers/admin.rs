//! Admin back-office handlers: enrollment decisions, completion review,
//! certificate issuance, withdrawal decisions, submission review

use crate::documents;
use crate::handlers::{lifecycle_error, AppState};
use crate::lifecycle::{self, tracker};
use crate::models::*;
use crate::notify;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListEnrollmentsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<EnrollmentStatus>,
    pub search: Option<String>,
}

// =============================================================================
// Enrollment Management
// =============================================================================

/// List enrollment requests with pagination, status filter and search
pub async fn list_enrollments(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Query(query): Query<ListEnrollmentsQuery>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let (requests, total): (Vec<EnrollmentRequest>, i64) = if let Some(status) = query.status {
        let items = sqlx::query_as::<_, EnrollmentRequest>(
            r#"
            SELECT * FROM enrollment_requests
            WHERE status = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrollment_requests WHERE status = $1")
                .bind(status)
                .fetch_one(&state.pool)
                .await
                .unwrap_or(0);

        (items, count)
    } else if let Some(ref search) = query.search {
        let pattern = format!("%{}%", search);
        let items = sqlx::query_as::<_, EnrollmentRequest>(
            r#"
            SELECT * FROM enrollment_requests
            WHERE student_name ILIKE $1
               OR student_email ILIKE $1
               OR internship_title ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM enrollment_requests
            WHERE student_name ILIKE $1
               OR student_email ILIKE $1
               OR internship_title ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&state.pool)
        .await
        .unwrap_or(0);

        (items, count)
    } else {
        let items = sqlx::query_as::<_, EnrollmentRequest>(
            "SELECT * FROM enrollment_requests ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&state.pool)
        .await
        .unwrap_or_default();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollment_requests")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);

        (items, count)
    };

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    tracing::info!(
        "Admin {} listed enrollments (page {}, {} results)",
        admin.user_id,
        page,
        requests.len()
    );

    (
        StatusCode::OK,
        Json(ApiResponse::success(PaginatedResponse {
            items: requests,
            total,
            page,
            per_page,
            total_pages,
        })),
    )
}

/// Approve a pending enrollment request
pub async fn approve_enrollment(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(input): Json<ApproveEnrollment>,
) -> impl IntoResponse {
    match lifecycle::approve(
        &state.pool,
        id,
        admin.user_id,
        input.start_date,
        input.end_date,
        input.admin_note,
    )
    .await
    {
        Ok(request) => {
            notify::log_audit(
                &state.pool,
                "enrollment_approved",
                "enrollment_request",
                Some(id),
                "admin",
                Some(admin.user_id),
            )
            .await;
            notify::notify(
                &state.pool,
                request.student_id,
                "Enrollment approved",
                &format!(
                    "Your enrollment in {} has been approved.",
                    request.internship_title
                ),
                "enrollment",
                Some(format!("/enrollments/{}", request.id)),
            )
            .await;

            tracing::info!("Admin {} approved enrollment {}", admin.user_id, id);

            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

/// Reject a pending enrollment request
pub async fn reject_enrollment(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(input): Json<RejectEnrollment>,
) -> impl IntoResponse {
    match lifecycle::reject(&state.pool, id, admin.user_id, input.admin_note).await {
        Ok(request) => {
            notify::log_audit(
                &state.pool,
                "enrollment_rejected",
                "enrollment_request",
                Some(id),
                "admin",
                Some(admin.user_id),
            )
            .await;
            notify::notify(
                &state.pool,
                request.student_id,
                "Enrollment not approved",
                &format!(
                    "Your enrollment request for {} was not approved.",
                    request.internship_title
                ),
                "enrollment",
                Some(format!("/enrollments/{}", request.id)),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

/// Grade a pending completion claim. The completion letter is generated
/// eagerly; a failure there is logged and the letter is re-rendered on the
/// next download.
pub async fn review_completion(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(input): Json<ReviewCompletion>,
) -> impl IntoResponse {
    match lifecycle::review_completion(&state.pool, id, admin.user_id, input.marks, input.feedback)
        .await
    {
        Ok(request) => {
            if let Err(e) = documents::generate(
                &state.pool,
                &state.templates,
                &state.docs_dir,
                id,
                DocumentKind::CompletionLetter,
            )
            .await
            {
                tracing::warn!(
                    "Completion letter generation deferred for enrollment {}: {:?}",
                    id,
                    e
                );
            }

            notify::log_audit(
                &state.pool,
                "completion_reviewed",
                "enrollment_request",
                Some(id),
                "admin",
                Some(admin.user_id),
            )
            .await;
            notify::notify(
                &state.pool,
                request.student_id,
                "Completion reviewed",
                &format!(
                    "Your internship completion has been reviewed: grade {}.",
                    request.grade.as_deref().unwrap_or("-")
                ),
                "completion",
                Some(format!("/enrollments/{}", request.id)),
            )
            .await;

            // the flag may have flipped during generation, return fresh state
            match lifecycle::fetch_request(&state.pool, id).await {
                Ok(fresh) => (StatusCode::OK, Json(ApiResponse::success(fresh))),
                Err(_) => (StatusCode::OK, Json(ApiResponse::success(request))),
            }
        }
        Err(e) => lifecycle_error(e),
    }
}

/// Issue the certificate for a reviewed completion (idempotent)
pub async fn issue_certificate(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match lifecycle::issue_certificate(&state.pool, id).await {
        Ok((request, certificate)) => {
            notify::log_audit(
                &state.pool,
                "certificate_issued",
                "certificate",
                Some(certificate.id),
                "admin",
                Some(admin.user_id),
            )
            .await;
            notify::notify(
                &state.pool,
                request.student_id,
                "Certificate issued",
                &format!(
                    "Your certificate for {} is ready (code {}).",
                    request.internship_title, certificate.verification_code
                ),
                "certificate",
                Some(format!("/enrollments/{}", request.id)),
            )
            .await;

            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "enrollment": request,
                    "certificate": certificate,
                }))),
            )
        }
        Err(e) => lifecycle_error(e),
    }
}

/// Approve a pending withdrawal: the enrollment becomes withdrawn
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(input): Json<DecideWithdrawal>,
) -> impl IntoResponse {
    match lifecycle::approve_withdrawal(&state.pool, id, admin.user_id, input.admin_note).await {
        Ok(request) => {
            notify::log_audit(
                &state.pool,
                "withdrawal_approved",
                "enrollment_request",
                Some(id),
                "admin",
                Some(admin.user_id),
            )
            .await;
            notify::notify(
                &state.pool,
                request.student_id,
                "Withdrawal approved",
                &format!(
                    "Your withdrawal from {} has been approved.",
                    request.internship_title
                ),
                "withdrawal",
                Some(format!("/enrollments/{}", request.id)),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

/// Reject a pending withdrawal: the enrollment stays approved
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(input): Json<DecideWithdrawal>,
) -> impl IntoResponse {
    match lifecycle::reject_withdrawal(&state.pool, id, admin.user_id, input.admin_note).await {
        Ok(request) => {
            notify::log_audit(
                &state.pool,
                "withdrawal_rejected",
                "enrollment_request",
                Some(id),
                "admin",
                Some(admin.user_id),
            )
            .await;
            notify::notify(
                &state.pool,
                request.student_id,
                "Withdrawal declined",
                &format!(
                    "Your withdrawal request for {} was declined; the enrollment remains active.",
                    request.internship_title
                ),
                "withdrawal",
                Some(format!("/enrollments/{}", request.id)),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(request)))
        }
        Err(e) => lifecycle_error(e),
    }
}

// =============================================================================
// Submission Review
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Pending submission review queue, oldest first
pub async fn list_pending_submissions(
    State(state): State<AppState>,
    Extension(_admin): Extension<Actor>,
    Query(query): Query<ListSubmissionsQuery>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let items = sqlx::query_as::<_, Submission>(
        r#"
        SELECT * FROM submissions
        WHERE status = 'pending' AND superseded = FALSE
        ORDER BY created_at ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(per_page)
    .bind(offset)
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE status = 'pending' AND superseded = FALSE",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap_or(0);

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    (
        StatusCode::OK,
        Json(ApiResponse::success(PaginatedResponse {
            items,
            total,
            page,
            per_page,
            total_pages,
        })),
    )
}

/// Review a pending submission (approve with points or reject with feedback)
pub async fn review_submission(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(input): Json<ReviewSubmission>,
) -> impl IntoResponse {
    match tracker::review_submission(&state.pool, id, admin.user_id, input).await {
        Ok(submission) => {
            notify::log_audit(
                &state.pool,
                "submission_reviewed",
                "submission",
                Some(submission.id),
                "admin",
                Some(admin.user_id),
            )
            .await;

            (StatusCode::OK, Json(ApiResponse::success(submission)))
        }
        Err(e) => lifecycle_error(e),
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Admin dashboard statistics
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    Extension(_admin): Extension<Actor>,
) -> impl IntoResponse {
    let by_status = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status::text, COUNT(*) as count
        FROM enrollment_requests
        GROUP BY status
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .unwrap_or_default();

    let pending_completions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollment_requests WHERE completion_status = 'pending_review'",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap_or(0);

    let pending_withdrawals: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollment_requests WHERE status = 'approved' AND withdrawal_status = 'pending'",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap_or(0);

    let pending_submissions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE status = 'pending' AND superseded = FALSE",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap_or(0);

    let certificates_issued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM certificates")
        .fetch_one(&state.pool)
        .await
        .unwrap_or(0);

    let status_map: std::collections::HashMap<String, i64> = by_status.into_iter().collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "enrollments_by_status": status_map,
            "pending_completion_reviews": pending_completions,
            "pending_withdrawals": pending_withdrawals,
            "pending_submissions": pending_submissions,
            "certificates_issued": certificates_issued,
        }))),
    )
}
