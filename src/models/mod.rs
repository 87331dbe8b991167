//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enrollment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "completion_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotRequested,
    PendingReview,
    Reviewed,
    CertificateIssued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    NotRequested,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

/// The generated artifacts an enrollment can unlock. Never persisted as a
/// column; each kind maps onto its own flag/path pair on the enrollment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Mou,
    OfferLetter,
    CompletionLetter,
    Certificate,
    PartialCompletionLetter,
    RelievingLetter,
}

impl DocumentKind {
    /// Template file name for the renderer
    pub fn template_name(&self) -> &'static str {
        match self {
            DocumentKind::Mou => "mou.html",
            DocumentKind::OfferLetter => "offer_letter.html",
            DocumentKind::CompletionLetter => "completion_letter.html",
            DocumentKind::Certificate => "certificate.html",
            DocumentKind::PartialCompletionLetter => "partial_completion_letter.html",
            DocumentKind::RelievingLetter => "relieving_letter.html",
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            DocumentKind::Mou => "mou",
            DocumentKind::OfferLetter => "offer_letter",
            DocumentKind::CompletionLetter => "completion_letter",
            DocumentKind::Certificate => "certificate",
            DocumentKind::PartialCompletionLetter => "partial_completion_letter",
            DocumentKind::RelievingLetter => "relieving_letter",
        }
    }
}

// =============================================================================
// Internship
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Internship {
    pub id: Uuid,
    pub title: String,
    pub domain: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub duration_weeks: i32,
    pub is_active: bool,
    pub enrolled: i32,
    pub max_students: i32,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Student Profile
// =============================================================================

/// Student profile; holds at most one resume representation
/// (uploaded file XOR external drive link)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentProfile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub course: Option<String>,
    pub enrollment_number: Option<String>,
    pub city: Option<String>,
    pub resume_path: Option<String>,
    pub resume_original_name: Option<String>,
    pub resume_drive_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentProfile {
    pub fn has_resume(&self) -> bool {
        self.resume_path.is_some() || self.resume_drive_url.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetResumeUrl {
    pub url: String,
}

// =============================================================================
// Enrollment Request
// =============================================================================

/// The lifecycle aggregate root: one row per enrollment attempt
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub internship_id: Uuid,
    pub status: EnrollmentStatus,

    // Snapshot fields, filled forward from the live profile at document time
    pub student_name: String,
    pub student_email: String,
    pub student_phone: String,
    pub college: String,
    pub course: String,
    pub enrollment_number: String,
    pub city: String,
    pub internship_title: String,
    pub internship_domain: String,
    pub internship_location: String,
    pub duration_weeks: i32,

    pub message: Option<String>,
    pub admin_note: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub resume_path: Option<String>,
    pub resume_original_name: Option<String>,
    pub resume_drive_url: Option<String>,

    pub mou_generated: bool,
    pub mou_path: Option<String>,
    pub offer_letter_generated: bool,
    pub offer_letter_path: Option<String>,
    pub completion_letter_generated: bool,
    pub completion_letter_path: Option<String>,

    pub completion_requested: bool,
    pub completion_requested_at: Option<DateTime<Utc>>,
    pub completion_status: CompletionStatus,
    pub tasks_completed: i32,
    pub total_tasks: i32,
    pub total_points: i32,
    pub marks: Option<i32>,
    pub grade: Option<String>,
    pub admin_feedback: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub certificate_id: Option<Uuid>,

    pub withdrawal_requested: bool,
    pub withdrawal_requested_at: Option<DateTime<Utc>>,
    pub withdrawal_reason: Option<String>,
    pub withdrawal_status: WithdrawalStatus,
    pub withdrawal_approved_at: Option<DateTime<Utc>>,
    pub withdrawal_approved_by: Option<Uuid>,
    pub withdrawal_admin_note: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveEnrollment {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectEnrollment {
    pub admin_note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCompletion {
    pub marks: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestWithdrawal {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecideWithdrawal {
    pub admin_note: Option<String>,
}

// =============================================================================
// Task & Submission
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub internship_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub points: i32,
    pub difficulty: String,
    pub day_number: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub task_id: Uuid,
    pub student_id: Uuid,
    pub status: SubmissionStatus,
    pub content: String,
    pub link_url: Option<String>,
    pub feedback: Option<String>,
    pub points_awarded: Option<i32>,
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubmission {
    pub content: String,
    pub link_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSubmission {
    pub decision: ReviewDecision,
    pub feedback: Option<String>,
    pub points: Option<i32>,
}

// =============================================================================
// Certificate
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    pub id: Uuid,
    pub student_id: Uuid,
    pub internship_id: Uuid,
    pub verification_code: String,
    pub student_name: String,
    pub internship_title: String,
    pub grade: Option<String>,
    pub issued_at: DateTime<Utc>,
}

// =============================================================================
// Notification
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sessions / Actors
// =============================================================================

#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_admin: bool,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Authenticated caller, attached to the request by middleware
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}
