//! Notification sink and audit trail
//!
//! Both are fire-and-forget: a failed insert is logged and swallowed, never
//! part of a transition's transactional guarantee.

use sqlx::PgPool;
use uuid::Uuid;

/// Emit one notification event for a user
pub async fn notify(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    message: &str,
    kind: &str,
    link: Option<String>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, title, message, kind, link)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(kind)
    .bind(&link)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!("Failed to insert notification for {}: {}", user_id, e);
    }
}

/// Record an audit event
pub async fn log_audit(
    pool: &PgPool,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    actor_type: &str,
    actor_id: Option<Uuid>,
) {
    let _ = sqlx::query(
        r#"
        INSERT INTO audit_log (action, entity_type, entity_id, actor_type, actor_id)
        VALUES ($1::audit_action, $2, $3, $4, $5)
        "#,
    )
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(actor_type)
    .bind(actor_id)
    .execute(pool)
    .await;
}
