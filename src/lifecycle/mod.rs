//! Enrollment lifecycle engine
//!
//! Every transition is a read-check-write: the record is loaded and checked
//! against the state machine for a friendly error, then mutated with a single
//! conditional `UPDATE ... WHERE id = $1 AND <expected state> RETURNING *`.
//! A write that matches zero rows means a concurrent writer got there first
//! and surfaces as `InvalidTransition`, never as a silent double-apply.

pub mod state;
pub mod tracker;

use crate::models::{
    Certificate, EnrollmentRequest, EnrollmentStatus, Internship, StudentProfile,
};
use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for lifecycle operations. All variants are recovered at the
/// HTTP boundary; storage failures wrap as `Dependency`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("operation does not apply to the record's current status")]
    InvalidTransition,

    #[error("student already has an approved enrollment for this internship")]
    AlreadyEnrolled,

    #[error("a pending enrollment request for this internship already exists")]
    RequestPending,

    #[error("internship has no remaining seats")]
    InternshipFull,

    #[error("internship is not accepting enrollments")]
    InternshipInactive,

    #[error("{0}")]
    Validation(String),

    #[error("document is not available in the current enrollment state")]
    DocumentNotAvailable,

    #[error("caller is not allowed to act on this record")]
    Unauthorized,

    #[error("storage failure")]
    Dependency(#[from] sqlx::Error),

    #[error("document rendering failed")]
    Render(#[from] tera::Error),

    #[error("file storage failure")]
    Storage(#[from] std::io::Error),
}

impl From<crate::validation::ValidationError> for LifecycleError {
    fn from(e: crate::validation::ValidationError) -> Self {
        LifecycleError::Validation(e.to_string())
    }
}

/// Resume reference attached to a new enrollment request. An uploaded copy
/// takes precedence over an inline link, which takes precedence over
/// whatever the profile holds.
#[derive(Debug, Clone)]
pub enum ResumeSource {
    Uploaded { path: String, original_name: String },
    Link(String),
    Profile,
}

/// Create a new enrollment request in `pending`
pub async fn create_request(
    pool: &PgPool,
    student_id: Uuid,
    internship_id: Uuid,
    message: Option<String>,
    resume: ResumeSource,
) -> Result<EnrollmentRequest, LifecycleError> {
    let internship =
        sqlx::query_as::<_, Internship>("SELECT * FROM internships WHERE id = $1")
            .bind(internship_id)
            .fetch_optional(pool)
            .await?
            .ok_or(LifecycleError::NotFound("internship"))?;

    if !internship.is_active {
        return Err(LifecycleError::InternshipInactive);
    }
    if internship.enrolled >= internship.max_students {
        return Err(LifecycleError::InternshipFull);
    }

    // Uniqueness: at most one pending/approved request per (student, internship).
    // The partial unique index is the backstop for concurrent creates.
    let live = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        SELECT * FROM enrollment_requests
        WHERE student_id = $1 AND internship_id = $2
          AND status IN ('pending', 'approved')
        "#,
    )
    .bind(student_id)
    .bind(internship_id)
    .fetch_optional(pool)
    .await?;

    if let Some(existing) = live {
        return Err(live_conflict(existing.status));
    }

    let profile =
        sqlx::query_as::<_, StudentProfile>("SELECT * FROM student_profiles WHERE user_id = $1")
            .bind(student_id)
            .fetch_optional(pool)
            .await?
            .ok_or(LifecycleError::NotFound("student profile"))?;

    let (resume_path, resume_original_name, resume_drive_url) = match resume {
        ResumeSource::Uploaded {
            path,
            original_name,
        } => (Some(path), Some(original_name), None),
        ResumeSource::Link(url) => (None, None, Some(url)),
        ResumeSource::Profile => {
            if !profile.has_resume() {
                return Err(LifecycleError::Validation(
                    "a resume is required; upload one or add it to your profile".to_string(),
                ));
            }
            (
                profile.resume_path.clone(),
                profile.resume_original_name.clone(),
                profile.resume_drive_url.clone(),
            )
        }
    };

    let result = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        INSERT INTO enrollment_requests (
            student_id, internship_id, message,
            student_name, student_email, student_phone, college, course,
            enrollment_number, city,
            internship_title, internship_domain, internship_location, duration_weeks,
            resume_path, resume_original_name, resume_drive_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING *
        "#,
    )
    .bind(student_id)
    .bind(internship_id)
    .bind(&message)
    .bind(&profile.name)
    .bind(&profile.email)
    .bind(profile.phone.as_deref().unwrap_or(""))
    .bind(profile.college.as_deref().unwrap_or(""))
    .bind(profile.course.as_deref().unwrap_or(""))
    .bind(profile.enrollment_number.as_deref().unwrap_or(""))
    .bind(profile.city.as_deref().unwrap_or(""))
    .bind(&internship.title)
    .bind(&internship.domain)
    .bind(internship.location.as_deref().unwrap_or(""))
    .bind(internship.duration_weeks)
    .bind(&resume_path)
    .bind(&resume_original_name)
    .bind(&resume_drive_url)
    .fetch_one(pool)
    .await;

    match result {
        Ok(request) => Ok(request),
        Err(e) => {
            // Lost a create race: the partial unique index rejected the insert
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                Err(LifecycleError::RequestPending)
            } else {
                Err(e.into())
            }
        }
    }
}

/// Approve a pending request, setting the internship window and taking a seat
pub async fn approve(
    pool: &PgPool,
    request_id: Uuid,
    admin_id: Uuid,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    admin_note: Option<String>,
) -> Result<EnrollmentRequest, LifecycleError> {
    let request = fetch_request(pool, request_id).await?;
    state::can_approve(&request)?;

    let start = start_date.unwrap_or_else(Utc::now);
    let end = end_date
        .unwrap_or_else(|| start + Duration::weeks(request.duration_weeks.max(1) as i64));
    if end <= start {
        return Err(LifecycleError::Validation(
            "end date must be after start date".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    // Atomic, capacity-checked seat claim. Never read-modify-write.
    let seat = sqlx::query(
        r#"
        UPDATE internships
        SET enrolled = enrolled + 1
        WHERE id = $1 AND enrolled < max_students
        "#,
    )
    .bind(request.internship_id)
    .execute(&mut *tx)
    .await?;

    if seat.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(LifecycleError::InternshipFull);
    }

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET status = 'approved',
            approved_by = $2,
            approved_at = NOW(),
            start_date = $3,
            end_date = $4,
            admin_note = COALESCE($5, admin_note),
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(admin_id)
    .bind(start)
    .bind(end)
    .bind(&admin_note)
    .fetch_optional(&mut *tx)
    .await?;

    match updated {
        Some(request) => {
            tx.commit().await?;
            Ok(request)
        }
        None => {
            // Concurrent transition won; the seat increment rolls back with us
            tx.rollback().await?;
            Err(explain_zero_rows(pool, request_id).await)
        }
    }
}

/// Reject a pending request. Terminal for this record; the student may
/// re-apply with a fresh request.
pub async fn reject(
    pool: &PgPool,
    request_id: Uuid,
    _admin_id: Uuid,
    admin_note: Option<String>,
) -> Result<EnrollmentRequest, LifecycleError> {
    let request = fetch_request(pool, request_id).await?;
    state::can_reject(&request)?;

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET status = 'rejected',
            rejected_at = NOW(),
            admin_note = COALESCE($2, admin_note),
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(&admin_note)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(request) => Ok(request),
        None => Err(explain_zero_rows(pool, request_id).await),
    }
}

/// File a completion claim: freezes the current task counters onto the record
pub async fn request_completion(
    pool: &PgPool,
    request_id: Uuid,
    student_id: Uuid,
) -> Result<EnrollmentRequest, LifecycleError> {
    let request = fetch_request(pool, request_id).await?;
    if request.student_id != student_id {
        return Err(LifecycleError::Unauthorized);
    }
    state::can_request_completion(&request)?;

    let stats =
        tracker::completion_stats(pool, student_id, request.internship_id).await?;

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET completion_requested = TRUE,
            completion_requested_at = NOW(),
            completion_status = 'pending_review',
            tasks_completed = $2,
            total_tasks = $3,
            total_points = $4,
            updated_at = NOW()
        WHERE id = $1 AND status = 'approved' AND completion_status = 'not_requested'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(stats.tasks_completed)
    .bind(stats.total_tasks)
    .bind(stats.total_points)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(request) => Ok(request),
        None => Err(explain_zero_rows(pool, request_id).await),
    }
}

/// Grade a completion claim; the grade band is derived from the marks
pub async fn review_completion(
    pool: &PgPool,
    request_id: Uuid,
    admin_id: Uuid,
    marks: i32,
    feedback: Option<String>,
) -> Result<EnrollmentRequest, LifecycleError> {
    crate::validation::validate_marks(marks)?;

    let request = fetch_request(pool, request_id).await?;
    state::can_review_completion(&request)?;

    let grade = state::grade_for_marks(marks);

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET completion_status = 'reviewed',
            marks = $2,
            grade = $3,
            admin_feedback = $4,
            reviewed_by = $5,
            reviewed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND status = 'approved' AND completion_status = 'pending_review'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(marks)
    .bind(grade)
    .bind(&feedback)
    .bind(admin_id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(request) => Ok(request),
        None => Err(explain_zero_rows(pool, request_id).await),
    }
}

/// Issue the certificate for a reviewed completion.
///
/// Idempotent: a retry returns the already-issued certificate instead of
/// erroring or creating a second row.
pub async fn issue_certificate(
    pool: &PgPool,
    request_id: Uuid,
) -> Result<(EnrollmentRequest, Certificate), LifecycleError> {
    let request = fetch_request(pool, request_id).await?;
    state::can_issue_certificate(&request)?;

    if let Some(existing) = sqlx::query_as::<_, Certificate>(
        "SELECT * FROM certificates WHERE student_id = $1 AND internship_id = $2",
    )
    .bind(request.student_id)
    .bind(request.internship_id)
    .fetch_optional(pool)
    .await?
    {
        return Ok((request, existing));
    }

    let mut tx = pool.begin().await?;

    let certificate = sqlx::query_as::<_, Certificate>(
        r#"
        INSERT INTO certificates (
            student_id, internship_id, verification_code,
            student_name, internship_title, grade
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(request.student_id)
    .bind(request.internship_id)
    .bind(generate_verification_code())
    .bind(&request.student_name)
    .bind(&request.internship_title)
    .bind(&request.grade)
    .fetch_one(&mut *tx)
    .await;

    let certificate = match certificate {
        Ok(cert) => cert,
        Err(e) => {
            tx.rollback().await?;
            // Lost the issue race: return what the winner created
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                let existing = sqlx::query_as::<_, Certificate>(
                    "SELECT * FROM certificates WHERE student_id = $1 AND internship_id = $2",
                )
                .bind(request.student_id)
                .bind(request.internship_id)
                .fetch_one(pool)
                .await?;
                let request = fetch_request(pool, request_id).await?;
                return Ok((request, existing));
            }
            return Err(e.into());
        }
    };

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET completion_status = 'certificate_issued',
            certificate_id = $2,
            updated_at = NOW()
        WHERE id = $1 AND status = 'approved' AND completion_status = 'reviewed'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(certificate.id)
    .fetch_optional(&mut *tx)
    .await?;

    match updated {
        Some(request) => {
            tx.commit().await?;
            Ok((request, certificate))
        }
        None => {
            tx.rollback().await?;
            Err(explain_zero_rows(pool, request_id).await)
        }
    }
}

/// Student files a withdrawal request against an approved enrollment
pub async fn request_withdrawal(
    pool: &PgPool,
    request_id: Uuid,
    student_id: Uuid,
    reason: String,
) -> Result<EnrollmentRequest, LifecycleError> {
    crate::validation::validate_withdrawal_reason(&reason)?;

    let request = fetch_request(pool, request_id).await?;
    if request.student_id != student_id {
        return Err(LifecycleError::Unauthorized);
    }
    state::can_request_withdrawal(&request)?;

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET withdrawal_requested = TRUE,
            withdrawal_requested_at = NOW(),
            withdrawal_reason = $2,
            withdrawal_status = 'pending',
            updated_at = NOW()
        WHERE id = $1 AND status = 'approved' AND withdrawal_status = 'not_requested'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(&reason)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(request) => Ok(request),
        None => Err(explain_zero_rows(pool, request_id).await),
    }
}

/// Approve a pending withdrawal: the enrollment becomes `withdrawn`
/// (terminal) and its seat is released
pub async fn approve_withdrawal(
    pool: &PgPool,
    request_id: Uuid,
    admin_id: Uuid,
    admin_note: Option<String>,
) -> Result<EnrollmentRequest, LifecycleError> {
    let request = fetch_request(pool, request_id).await?;
    state::can_decide_withdrawal(&request)?;

    let mut tx = pool.begin().await?;

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET status = 'withdrawn',
            withdrawal_status = 'approved',
            withdrawal_approved_at = NOW(),
            withdrawal_approved_by = $2,
            withdrawal_admin_note = COALESCE($3, withdrawal_admin_note),
            updated_at = NOW()
        WHERE id = $1 AND status = 'approved' AND withdrawal_status = 'pending'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(admin_id)
    .bind(&admin_note)
    .fetch_optional(&mut *tx)
    .await?;

    let request = match updated {
        Some(request) => request,
        None => {
            tx.rollback().await?;
            return Err(explain_zero_rows(pool, request_id).await);
        }
    };

    // Release the seat taken at approval
    sqlx::query(
        "UPDATE internships SET enrolled = GREATEST(enrolled - 1, 0) WHERE id = $1",
    )
    .bind(request.internship_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(request)
}

/// Reject a pending withdrawal: the enrollment stays `approved`
pub async fn reject_withdrawal(
    pool: &PgPool,
    request_id: Uuid,
    _admin_id: Uuid,
    admin_note: Option<String>,
) -> Result<EnrollmentRequest, LifecycleError> {
    let request = fetch_request(pool, request_id).await?;
    state::can_decide_withdrawal(&request)?;

    let updated = sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        UPDATE enrollment_requests
        SET withdrawal_status = 'rejected',
            withdrawal_admin_note = COALESCE($2, withdrawal_admin_note),
            updated_at = NOW()
        WHERE id = $1 AND status = 'approved' AND withdrawal_status = 'pending'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(&admin_note)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(request) => Ok(request),
        None => Err(explain_zero_rows(pool, request_id).await),
    }
}

/// Fetch an enrollment request or `NotFound`
pub async fn fetch_request(
    pool: &PgPool,
    request_id: Uuid,
) -> Result<EnrollmentRequest, LifecycleError> {
    sqlx::query_as::<_, EnrollmentRequest>("SELECT * FROM enrollment_requests WHERE id = $1")
        .bind(request_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LifecycleError::NotFound("enrollment request"))
}

/// Error for a new request colliding with an existing live one
fn live_conflict(status: EnrollmentStatus) -> LifecycleError {
    match status {
        EnrollmentStatus::Approved => LifecycleError::AlreadyEnrolled,
        _ => LifecycleError::RequestPending,
    }
}

/// A conditional update matched zero rows: distinguish a vanished record
/// from a concurrent transition
async fn explain_zero_rows(pool: &PgPool, request_id: Uuid) -> LifecycleError {
    match fetch_request(pool, request_id).await {
        Ok(_) => LifecycleError::InvalidTransition,
        Err(e) => e,
    }
}

/// Human-readable certificate code, e.g. `IH-2026-K7QX2M9A`.
/// The unique index on verification_code is the collision backstop.
fn generate_verification_code() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("IH-{}-{}", Utc::now().year(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_code_shape() {
        let code = generate_verification_code();
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "IH");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        // ambiguous characters are excluded from the alphabet
        assert!(!parts[2].contains(['0', '1', 'I', 'O']));
    }

    #[test]
    fn test_verification_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..50).map(|_| generate_verification_code()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_live_conflict_mapping() {
        assert!(matches!(
            live_conflict(EnrollmentStatus::Approved),
            LifecycleError::AlreadyEnrolled
        ));
        assert!(matches!(
            live_conflict(EnrollmentStatus::Pending),
            LifecycleError::RequestPending
        ));
    }
}

// Database-backed tests; run with `cargo test -- --ignored` against a
// disposable Postgres pointed to by DATABASE_URL.
#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::documents;
    use crate::models::{CompletionStatus, DocumentKind};

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
        let pool = crate::db::create_pool(&url).await.expect("connect");
        crate::db::run_migrations(&pool).await.expect("migrate");
        pool
    }

    async fn seed_internship(pool: &PgPool, max_students: i32) -> Internship {
        sqlx::query_as::<_, Internship>(
            r#"
            INSERT INTO internships (title, domain, duration_weeks, max_students)
            VALUES ($1, 'Engineering', 8, $2)
            RETURNING *
            "#,
        )
        .bind(format!("Backend Internship {}", Uuid::new_v4()))
        .bind(max_students)
        .fetch_one(pool)
        .await
        .expect("seed internship")
    }

    async fn seed_profile(pool: &PgPool, name: &str) -> StudentProfile {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, StudentProfile>(
            "INSERT INTO student_profiles (user_id, name, email) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(format!("{}@example.com", id))
        .fetch_one(pool)
        .await
        .expect("seed profile")
    }

    fn link_resume() -> ResumeSource {
        ResumeSource::Link("https://drive.google.com/file/d/abc/view".to_string())
    }

    async fn enrolled_count(pool: &PgPool, internship_id: Uuid) -> i32 {
        sqlx::query_scalar("SELECT enrolled FROM internships WHERE id = $1")
            .bind(internship_id)
            .fetch_one(pool)
            .await
            .expect("read counter")
    }

    #[tokio::test]
    #[ignore]
    async fn test_one_live_request_per_pair() {
        let pool = test_pool().await;
        let internship = seed_internship(&pool, 5).await;
        let profile = seed_profile(&pool, "Asha Rao").await;
        let admin = Uuid::new_v4();

        let request =
            create_request(&pool, profile.user_id, internship.id, None, link_resume())
                .await
                .expect("first request");

        // a second request while the first is pending is refused
        assert!(matches!(
            create_request(&pool, profile.user_id, internship.id, None, link_resume()).await,
            Err(LifecycleError::RequestPending)
        ));

        approve(&pool, request.id, admin, None, None, None)
            .await
            .expect("approve");

        assert!(matches!(
            create_request(&pool, profile.user_id, internship.id, None, link_resume()).await,
            Err(LifecycleError::AlreadyEnrolled)
        ));

        // a withdrawn enrollment no longer blocks a fresh request
        request_withdrawal(&pool, request.id, profile.user_id, "moving cities".to_string())
            .await
            .expect("request withdrawal");
        approve_withdrawal(&pool, request.id, admin, None)
            .await
            .expect("approve withdrawal");

        create_request(&pool, profile.user_id, internship.id, None, link_resume())
            .await
            .expect("re-apply after withdrawal");
    }

    #[tokio::test]
    #[ignore]
    async fn test_certificate_issuance_is_idempotent() {
        let pool = test_pool().await;
        let internship = seed_internship(&pool, 5).await;
        let profile = seed_profile(&pool, "Asha Rao").await;
        let admin = Uuid::new_v4();

        let request =
            create_request(&pool, profile.user_id, internship.id, None, link_resume())
                .await
                .expect("request");
        approve(&pool, request.id, admin, None, None, None)
            .await
            .expect("approve");
        request_completion(&pool, request.id, profile.user_id)
            .await
            .expect("request completion");
        review_completion(&pool, request.id, admin, 46, None)
            .await
            .expect("review");

        let (first, cert_a) = issue_certificate(&pool, request.id).await.expect("issue");
        let (second, cert_b) = issue_certificate(&pool, request.id).await.expect("retry");

        assert_eq!(cert_a.id, cert_b.id);
        assert_eq!(cert_a.verification_code, cert_b.verification_code);
        assert_eq!(first.completion_status, CompletionStatus::CertificateIssued);
        assert_eq!(second.certificate_id, Some(cert_a.id));

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM certificates WHERE student_id = $1 AND internship_id = $2",
        )
        .bind(profile.user_id)
        .bind(internship.id)
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_seat_counter_claim_and_release() {
        let pool = test_pool().await;
        let internship = seed_internship(&pool, 1).await;
        let student_a = seed_profile(&pool, "Asha Rao").await;
        let student_b = seed_profile(&pool, "Vikram Iyer").await;
        let admin = Uuid::new_v4();

        let request_a =
            create_request(&pool, student_a.user_id, internship.id, None, link_resume())
                .await
                .expect("request a");
        let request_b =
            create_request(&pool, student_b.user_id, internship.id, None, link_resume())
                .await
                .expect("request b");

        approve(&pool, request_a.id, admin, None, None, None)
            .await
            .expect("approve a");
        assert_eq!(enrolled_count(&pool, internship.id).await, 1);

        // the capacity check lives in the approval transaction itself
        assert!(matches!(
            approve(&pool, request_b.id, admin, None, None, None).await,
            Err(LifecycleError::InternshipFull)
        ));
        assert_eq!(enrolled_count(&pool, internship.id).await, 1);

        request_withdrawal(&pool, request_a.id, student_a.user_id, "schedule clash".to_string())
            .await
            .expect("request withdrawal");
        approve_withdrawal(&pool, request_a.id, admin, None)
            .await
            .expect("approve withdrawal");
        assert_eq!(enrolled_count(&pool, internship.id).await, 0);

        // the released seat is claimable again
        approve(&pool, request_b.id, admin, None, None, None)
            .await
            .expect("approve b");
        assert_eq!(enrolled_count(&pool, internship.id).await, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_snapshot_fields_stay_frozen() {
        let pool = test_pool().await;
        let internship = seed_internship(&pool, 5).await;
        let profile = seed_profile(&pool, "Asha Rao").await;
        let admin = Uuid::new_v4();

        let request =
            create_request(&pool, profile.user_id, internship.id, None, link_resume())
                .await
                .expect("request");
        approve(&pool, request.id, admin, None, None, None)
            .await
            .expect("approve");

        // later profile edits: a rename (snapshot already populated) and a
        // newly supplied college (snapshot blank)
        sqlx::query(
            "UPDATE student_profiles SET name = 'A. Rao-Kumar', college = 'NIT Trichy' WHERE user_id = $1",
        )
        .bind(profile.user_id)
        .execute(&pool)
        .await
        .expect("edit profile");

        let tera = tera::Tera::new("templates/**/*.html").expect("templates");
        let docs_dir =
            std::env::temp_dir().join(format!("internhub-test-{}", Uuid::new_v4()));
        documents::generate(&pool, &tera, &docs_dir, request.id, DocumentKind::Mou)
            .await
            .expect("generate");

        let refreshed = fetch_request(&pool, request.id).await.expect("fetch");
        // populated at request time, frozen thereafter
        assert_eq!(refreshed.student_name, "Asha Rao");
        // blank at request time, filled forward at document time
        assert_eq!(refreshed.college, "NIT Trichy");
        assert!(refreshed.mou_generated);
    }
}
