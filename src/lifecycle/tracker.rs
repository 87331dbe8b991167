//! Task & submission tracker
//!
//! Read model for completion counting: the most recent submission per
//! (student, task) is authoritative; superseded rows are kept for audit but
//! excluded from every count. The lifecycle engine reads these numbers once,
//! at completion-request time, and freezes them onto the enrollment record.

use super::LifecycleError;
use crate::models::{
    CreateSubmission, ReviewDecision, ReviewSubmission, Submission, SubmissionStatus, Task,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Counters frozen onto an enrollment at completion-request time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionStats {
    pub tasks_completed: i32,
    pub total_tasks: i32,
    pub total_points: i32,
}

/// Compute the live counters for one student in one internship
pub async fn completion_stats(
    pool: &PgPool,
    student_id: Uuid,
    internship_id: Uuid,
) -> Result<CompletionStats, LifecycleError> {
    let total_tasks: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks WHERE internship_id = $1 AND is_active = TRUE",
    )
    .bind(internship_id)
    .fetch_one(pool)
    .await?;

    let (tasks_completed, total_points): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(s.points_awarded), 0)
        FROM submissions s
        JOIN tasks t ON t.id = s.task_id
        WHERE s.student_id = $1
          AND t.internship_id = $2
          AND s.status = 'approved'
          AND s.superseded = FALSE
        "#,
    )
    .bind(student_id)
    .bind(internship_id)
    .fetch_one(pool)
    .await?;

    Ok(CompletionStats {
        tasks_completed: tasks_completed as i32,
        total_tasks: total_tasks as i32,
        total_points: total_points as i32,
    })
}

/// Create a submission for a task. A fresh submission is allowed when there
/// is no authoritative one yet or the latest was rejected; the rejected row
/// is flagged superseded in the same transaction.
pub async fn create_submission(
    pool: &PgPool,
    student_id: Uuid,
    task_id: Uuid,
    input: CreateSubmission,
) -> Result<Submission, LifecycleError> {
    crate::validation::validate_submission_content(&input.content)?;

    let task = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE id = $1 AND is_active = TRUE",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or(LifecycleError::NotFound("task"))?;

    let mut tx = pool.begin().await?;

    let latest = sqlx::query_as::<_, Submission>(
        r#"
        SELECT * FROM submissions
        WHERE student_id = $1 AND task_id = $2 AND superseded = FALSE
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(student_id)
    .bind(task.id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(previous) = latest {
        match previous.status {
            SubmissionStatus::Rejected => {
                sqlx::query("UPDATE submissions SET superseded = TRUE WHERE id = $1")
                    .bind(previous.id)
                    .execute(&mut *tx)
                    .await?;
            }
            // pending or approved: no resubmission allowed
            _ => {
                tx.rollback().await?;
                return Err(LifecycleError::InvalidTransition);
            }
        }
    }

    let submission = sqlx::query_as::<_, Submission>(
        r#"
        INSERT INTO submissions (task_id, student_id, content, link_url)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(task.id)
    .bind(student_id)
    .bind(&input.content)
    .bind(&input.link_url)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(submission)
}

/// Admin review of a pending submission: approve awards points (the task's
/// own points unless overridden), reject requires feedback. Terminal either
/// way for this row.
pub async fn review_submission(
    pool: &PgPool,
    submission_id: Uuid,
    admin_id: Uuid,
    input: ReviewSubmission,
) -> Result<Submission, LifecycleError> {
    let submission =
        sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
            .bind(submission_id)
            .fetch_optional(pool)
            .await?
            .ok_or(LifecycleError::NotFound("submission"))?;

    if submission.status != SubmissionStatus::Pending {
        return Err(LifecycleError::InvalidTransition);
    }

    let updated = match input.decision {
        ReviewDecision::Approve => {
            let points = match input.points {
                Some(p) if p < 0 => {
                    return Err(LifecycleError::Validation(
                        "points must be zero or positive".to_string(),
                    ))
                }
                Some(p) => p,
                None => {
                    sqlx::query_scalar::<_, i32>("SELECT points FROM tasks WHERE id = $1")
                        .bind(submission.task_id)
                        .fetch_one(pool)
                        .await?
                }
            };

            sqlx::query_as::<_, Submission>(
                r#"
                UPDATE submissions
                SET status = 'approved',
                    points_awarded = $2,
                    feedback = COALESCE($3, feedback),
                    reviewed_at = NOW(),
                    reviewed_by = $4
                WHERE id = $1 AND status = 'pending'
                RETURNING *
                "#,
            )
            .bind(submission_id)
            .bind(points)
            .bind(&input.feedback)
            .bind(admin_id)
            .fetch_optional(pool)
            .await?
        }
        ReviewDecision::Reject => {
            crate::validation::validate_rejection_feedback(input.feedback.as_deref())?;

            sqlx::query_as::<_, Submission>(
                r#"
                UPDATE submissions
                SET status = 'rejected',
                    feedback = $2,
                    reviewed_at = NOW(),
                    reviewed_by = $3
                WHERE id = $1 AND status = 'pending'
                RETURNING *
                "#,
            )
            .bind(submission_id)
            .bind(&input.feedback)
            .bind(admin_id)
            .fetch_optional(pool)
            .await?
        }
    };

    // Zero rows: a concurrent reviewer finished first
    updated.ok_or(LifecycleError::InvalidTransition)
}
