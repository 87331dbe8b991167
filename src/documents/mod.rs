//! Document generation
//!
//! Renders the lifecycle-gated artifacts (MOU, offer letter, completion
//! letter, certificate, partial-completion and relieving letters) from tera
//! templates and stores them alongside the uploads.
//!
//! The enrollment snapshot is a cache of the student profile: before every
//! render it is refreshed fill-forward (blank fields only) from the live
//! profile and persisted back. Generation flags flip false -> true on first
//! render and never revert; a repeat call overwrites the stored artifact.

use crate::lifecycle::{self, state, LifecycleError};
use crate::models::{Certificate, DocumentKind, EnrollmentRequest, StudentProfile};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tera::Tera;
use tokio::fs;
use uuid::Uuid;

/// Rendered artifact handed back to the download handler
pub struct GeneratedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Fill-forward merge of the live profile into the enrollment snapshot.
/// Blank snapshot fields take the profile's value; populated fields are
/// never overwritten, and a blank profile field never blanks the snapshot.
/// Returns whether anything changed.
pub fn merge_forward(req: &mut EnrollmentRequest, profile: &StudentProfile) -> bool {
    fn fill(target: &mut String, source: Option<&str>) -> bool {
        match source {
            Some(value) if target.trim().is_empty() && !value.trim().is_empty() => {
                *target = value.to_string();
                true
            }
            _ => false,
        }
    }

    let mut changed = false;
    changed |= fill(&mut req.student_name, Some(&profile.name));
    changed |= fill(&mut req.student_email, Some(&profile.email));
    changed |= fill(&mut req.student_phone, profile.phone.as_deref());
    changed |= fill(&mut req.college, profile.college.as_deref());
    changed |= fill(&mut req.course, profile.course.as_deref());
    changed |= fill(&mut req.enrollment_number, profile.enrollment_number.as_deref());
    changed |= fill(&mut req.city, profile.city.as_deref());
    changed
}

/// Generate (or regenerate) a document for an enrollment.
///
/// The eligibility gate applies to first-time generation. Once the
/// corresponding `*_generated` flag is set the artifact stays available even
/// if the gate state has since moved on (e.g. the MOU of a later-withdrawn
/// enrollment); the flags only ever flip forward.
pub async fn generate(
    pool: &PgPool,
    tera: &Tera,
    docs_dir: &Path,
    request_id: Uuid,
    kind: DocumentKind,
) -> Result<GeneratedDocument, LifecycleError> {
    let mut request = lifecycle::fetch_request(pool, request_id).await?;

    if !flag_is_set(&request, kind) {
        state::document_gate(kind, &request)?;
    }

    request = refresh_snapshot(pool, request).await?;

    let certificate = match kind {
        DocumentKind::Certificate => Some(fetch_certificate(pool, &request).await?),
        _ => None,
    };

    let context = build_context(&request, certificate.as_ref());
    let html = tera.render(kind.template_name(), &context)?;
    let bytes = html.into_bytes();

    let path = artifact_path(docs_dir, request.id, kind);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&path, &bytes).await?;

    mark_generated(pool, request.id, kind, &path).await?;

    tracing::info!(
        "Generated {:?} for enrollment {} at {:?}",
        kind,
        request.id,
        path
    );

    Ok(GeneratedDocument {
        bytes,
        filename: format!("{}_{}.html", kind.file_stem(), request.id),
    })
}

fn flag_is_set(req: &EnrollmentRequest, kind: DocumentKind) -> bool {
    match kind {
        DocumentKind::Mou => req.mou_generated,
        DocumentKind::OfferLetter => req.offer_letter_generated,
        DocumentKind::CompletionLetter => req.completion_letter_generated,
        // these gates cannot regress, no flag is needed
        DocumentKind::Certificate
        | DocumentKind::PartialCompletionLetter
        | DocumentKind::RelievingLetter => false,
    }
}

fn artifact_path(docs_dir: &Path, request_id: Uuid, kind: DocumentKind) -> PathBuf {
    docs_dir
        .join(request_id.to_string())
        .join(format!("{}.html", kind.file_stem()))
}

/// Re-sync the cached snapshot from the live student profile (fill-forward)
/// and persist any newly filled fields
async fn refresh_snapshot(
    pool: &PgPool,
    mut request: EnrollmentRequest,
) -> Result<EnrollmentRequest, LifecycleError> {
    let profile = sqlx::query_as::<_, StudentProfile>(
        "SELECT * FROM student_profiles WHERE user_id = $1",
    )
    .bind(request.student_id)
    .fetch_optional(pool)
    .await?;

    // A missing profile is not fatal here, the snapshot already holds the
    // request-time copy
    let Some(profile) = profile else {
        return Ok(request);
    };

    if !merge_forward(&mut request, &profile) {
        return Ok(request);
    }

    // Each column's fill is decided server-side against its current value,
    // so a concurrent fill or admin edit is never clobbered with this
    // reader's older copy
    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET student_name = CASE WHEN BTRIM(student_name) = '' AND BTRIM($2) <> '' THEN $2 ELSE student_name END,
            student_email = CASE WHEN BTRIM(student_email) = '' AND BTRIM($3) <> '' THEN $3 ELSE student_email END,
            student_phone = CASE WHEN BTRIM(student_phone) = '' AND BTRIM($4) <> '' THEN $4 ELSE student_phone END,
            college = CASE WHEN BTRIM(college) = '' AND BTRIM($5) <> '' THEN $5 ELSE college END,
            course = CASE WHEN BTRIM(course) = '' AND BTRIM($6) <> '' THEN $6 ELSE course END,
            enrollment_number = CASE WHEN BTRIM(enrollment_number) = '' AND BTRIM($7) <> '' THEN $7 ELSE enrollment_number END,
            city = CASE WHEN BTRIM(city) = '' AND BTRIM($8) <> '' THEN $8 ELSE city END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(request.id)
    .bind(&profile.name)
    .bind(&profile.email)
    .bind(profile.phone.as_deref().unwrap_or(""))
    .bind(profile.college.as_deref().unwrap_or(""))
    .bind(profile.course.as_deref().unwrap_or(""))
    .bind(profile.enrollment_number.as_deref().unwrap_or(""))
    .bind(profile.city.as_deref().unwrap_or(""))
    .fetch_one(pool)
    .await?;
    Ok(updated)
}

async fn fetch_certificate(
    pool: &PgPool,
    request: &EnrollmentRequest,
) -> Result<Certificate, LifecycleError> {
    let certificate_id = request
        .certificate_id
        .ok_or(LifecycleError::DocumentNotAvailable)?;

    sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = $1")
        .bind(certificate_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LifecycleError::NotFound("certificate"))
}

fn build_context(request: &EnrollmentRequest, certificate: Option<&Certificate>) -> tera::Context {
    let mut context = tera::Context::new();
    context.insert("student_name", &request.student_name);
    context.insert("student_email", &request.student_email);
    context.insert("student_phone", &request.student_phone);
    context.insert("college", &request.college);
    context.insert("course", &request.course);
    context.insert("enrollment_number", &request.enrollment_number);
    context.insert("city", &request.city);
    context.insert("internship_title", &request.internship_title);
    context.insert("internship_domain", &request.internship_domain);
    context.insert("internship_location", &request.internship_location);
    context.insert("duration_weeks", &request.duration_weeks);
    let fmt = |d: chrono::DateTime<chrono::Utc>| d.format("%d %B %Y").to_string();
    context.insert(
        "start_date",
        &request.start_date.map(fmt).unwrap_or_default(),
    );
    context.insert("end_date", &request.end_date.map(fmt).unwrap_or_default());
    context.insert("tasks_completed", &request.tasks_completed);
    context.insert("total_tasks", &request.total_tasks);
    context.insert("total_points", &request.total_points);
    context.insert("marks", &request.marks.unwrap_or(0));
    context.insert("grade", request.grade.as_deref().unwrap_or(""));
    context.insert(
        "withdrawal_reason",
        request.withdrawal_reason.as_deref().unwrap_or(""),
    );
    context.insert(
        "withdrawal_date",
        &request
            .withdrawal_approved_at
            .map(fmt)
            .unwrap_or_default(),
    );

    if let Some(cert) = certificate {
        context.insert("verification_code", &cert.verification_code);
        context.insert("issued_at", &cert.issued_at.format("%d %B %Y").to_string());
    }

    context
}

/// Flip the generation flag and store the artifact path. Flags are monotonic:
/// this statement only ever sets them to TRUE.
async fn mark_generated(
    pool: &PgPool,
    request_id: Uuid,
    kind: DocumentKind,
    path: &Path,
) -> Result<(), LifecycleError> {
    let path_str = path.to_string_lossy().to_string();

    match kind {
        DocumentKind::Mou => {
            sqlx::query(
                "UPDATE enrollment_requests SET mou_generated = TRUE, mou_path = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(request_id)
            .bind(&path_str)
            .execute(pool)
            .await?;
        }
        DocumentKind::OfferLetter => {
            sqlx::query(
                "UPDATE enrollment_requests SET offer_letter_generated = TRUE, offer_letter_path = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(request_id)
            .bind(&path_str)
            .execute(pool)
            .await?;
        }
        DocumentKind::CompletionLetter => {
            sqlx::query(
                "UPDATE enrollment_requests SET completion_letter_generated = TRUE, completion_letter_path = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(request_id)
            .bind(&path_str)
            .execute(pool)
            .await?;
        }
        DocumentKind::Certificate
        | DocumentKind::PartialCompletionLetter
        | DocumentKind::RelievingLetter => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionStatus, EnrollmentStatus, WithdrawalStatus};
    use chrono::Utc;

    fn profile() -> StudentProfile {
        let now = Utc::now();
        StudentProfile {
            user_id: Uuid::new_v4(),
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: Some("+91 98765 43210".to_string()),
            college: Some("NIT Trichy".to_string()),
            course: Some("B.Tech CSE".to_string()),
            enrollment_number: Some("NT21CS042".to_string()),
            city: Some("Chennai".to_string()),
            resume_path: None,
            resume_original_name: None,
            resume_drive_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn request_with_blanks() -> EnrollmentRequest {
        let now = Utc::now();
        EnrollmentRequest {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            internship_id: Uuid::new_v4(),
            status: EnrollmentStatus::Approved,
            student_name: "Asha R.".to_string(),
            student_email: String::new(),
            student_phone: String::new(),
            college: String::new(),
            course: "B.Tech CSE".to_string(),
            enrollment_number: String::new(),
            city: "  ".to_string(),
            internship_title: "Backend Internship".to_string(),
            internship_domain: "Engineering".to_string(),
            internship_location: String::new(),
            duration_weeks: 8,
            message: None,
            admin_note: None,
            approved_by: None,
            approved_at: Some(now),
            rejected_at: None,
            start_date: None,
            end_date: None,
            resume_path: None,
            resume_original_name: None,
            resume_drive_url: None,
            mou_generated: false,
            mou_path: None,
            offer_letter_generated: false,
            offer_letter_path: None,
            completion_letter_generated: false,
            completion_letter_path: None,
            completion_requested: false,
            completion_requested_at: None,
            completion_status: CompletionStatus::NotRequested,
            tasks_completed: 0,
            total_tasks: 0,
            total_points: 0,
            marks: None,
            grade: None,
            admin_feedback: None,
            reviewed_at: None,
            reviewed_by: None,
            certificate_id: None,
            withdrawal_requested: false,
            withdrawal_requested_at: None,
            withdrawal_reason: None,
            withdrawal_status: WithdrawalStatus::NotRequested,
            withdrawal_approved_at: None,
            withdrawal_approved_by: None,
            withdrawal_admin_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merge_fills_blank_fields() {
        let mut req = request_with_blanks();
        let changed = merge_forward(&mut req, &profile());

        assert!(changed);
        assert_eq!(req.student_email, "asha@example.com");
        assert_eq!(req.college, "NIT Trichy");
        assert_eq!(req.city, "Chennai");
    }

    #[test]
    fn test_merge_never_overwrites_populated_fields() {
        let mut req = request_with_blanks();
        merge_forward(&mut req, &profile());

        // the snapshot had its own (older) name and course, they stay
        assert_eq!(req.student_name, "Asha R.");
        assert_eq!(req.course, "B.Tech CSE");
    }

    #[test]
    fn test_merge_ignores_blank_profile_fields() {
        let mut req = request_with_blanks();
        let mut p = profile();
        p.college = None;
        p.city = Some(String::new());

        merge_forward(&mut req, &p);
        assert_eq!(req.college, "");
        assert_eq!(req.city, "  ");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut req = request_with_blanks();
        let p = profile();

        assert!(merge_forward(&mut req, &p));
        let snapshot = req.clone();
        assert!(!merge_forward(&mut req, &p));
        assert_eq!(req.student_email, snapshot.student_email);
    }

    #[test]
    fn test_artifact_path_layout() {
        let id = Uuid::new_v4();
        let path = artifact_path(Path::new("/data/docs"), id, DocumentKind::OfferLetter);
        assert_eq!(
            path,
            Path::new("/data/docs")
                .join(id.to_string())
                .join("offer_letter.html")
        );
    }
}
