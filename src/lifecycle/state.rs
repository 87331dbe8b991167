//! Pure enrollment state machine
//!
//! An enrollment carries a composite state: the primary lifecycle status plus
//! a completion sub-state and a withdrawal sub-state. The valid combinations:
//!
//! | status    | completion_status                  | withdrawal_status              |
//! |-----------|------------------------------------|--------------------------------|
//! | pending   | not_requested                      | not_requested                  |
//! | approved  | any                                | not_requested, pending, rejected |
//! | rejected  | not_requested                      | not_requested                  |
//! | withdrawn | any (frozen at withdrawal time)    | approved                       |
//!
//! Every transition checks the record against this table before writing; the
//! conditional SQL update is the backstop against concurrent writers.

use super::LifecycleError;
use crate::models::{
    CompletionStatus, DocumentKind, EnrollmentRequest, EnrollmentStatus, WithdrawalStatus,
};

/// Upper bound for completion review marks
pub const MAX_MARKS: i32 = 50;

/// Deterministic marks -> grade banding.
///
/// Fixed policy: >=45 A+, >=40 A, >=35 B, >=25 C, else D.
pub fn grade_for_marks(marks: i32) -> &'static str {
    match marks {
        m if m >= 45 => "A+",
        m if m >= 40 => "A",
        m if m >= 35 => "B",
        m if m >= 25 => "C",
        _ => "D",
    }
}

/// Check the composite state against the valid-combination table
pub fn is_valid_combination(
    status: EnrollmentStatus,
    completion: CompletionStatus,
    withdrawal: WithdrawalStatus,
) -> bool {
    match status {
        EnrollmentStatus::Pending | EnrollmentStatus::Rejected => {
            completion == CompletionStatus::NotRequested
                && withdrawal == WithdrawalStatus::NotRequested
        }
        EnrollmentStatus::Approved => withdrawal != WithdrawalStatus::Approved,
        EnrollmentStatus::Withdrawn => withdrawal == WithdrawalStatus::Approved,
    }
}

fn check_combination(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    if is_valid_combination(req.status, req.completion_status, req.withdrawal_status) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition)
    }
}

pub fn can_approve(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    check_combination(req)?;
    if req.status != EnrollmentStatus::Pending {
        return Err(LifecycleError::InvalidTransition);
    }
    Ok(())
}

pub fn can_reject(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    check_combination(req)?;
    if req.status != EnrollmentStatus::Pending {
        return Err(LifecycleError::InvalidTransition);
    }
    Ok(())
}

pub fn can_request_completion(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    check_combination(req)?;
    if req.status != EnrollmentStatus::Approved
        || req.completion_status != CompletionStatus::NotRequested
    {
        return Err(LifecycleError::InvalidTransition);
    }
    Ok(())
}

pub fn can_review_completion(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    check_combination(req)?;
    // withdrawal freezes the completion sub-state; only a live enrollment
    // can have its claim reviewed
    if req.status != EnrollmentStatus::Approved
        || req.completion_status != CompletionStatus::PendingReview
    {
        return Err(LifecycleError::InvalidTransition);
    }
    Ok(())
}

pub fn can_issue_certificate(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    check_combination(req)?;
    if req.status != EnrollmentStatus::Approved {
        return Err(LifecycleError::InvalidTransition);
    }
    match req.completion_status {
        // CertificateIssued is accepted so retries can return the existing
        // certificate instead of erroring
        CompletionStatus::Reviewed | CompletionStatus::CertificateIssued => Ok(()),
        _ => Err(LifecycleError::InvalidTransition),
    }
}

pub fn can_request_withdrawal(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    check_combination(req)?;
    if req.status != EnrollmentStatus::Approved
        || req.withdrawal_status != WithdrawalStatus::NotRequested
    {
        return Err(LifecycleError::InvalidTransition);
    }
    Ok(())
}

pub fn can_decide_withdrawal(req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    check_combination(req)?;
    if req.status != EnrollmentStatus::Approved
        || req.withdrawal_status != WithdrawalStatus::Pending
    {
        return Err(LifecycleError::InvalidTransition);
    }
    Ok(())
}

/// Document eligibility gate.
///
/// | document                      | required enrollment state                |
/// |-------------------------------|------------------------------------------|
/// | MOU / offer letter            | status == approved                       |
/// | completion letter             | completion in {reviewed, cert_issued}    |
/// | certificate                   | certificate_id set                       |
/// | partial-completion / relieving| status == withdrawn                      |
pub fn document_gate(kind: DocumentKind, req: &EnrollmentRequest) -> Result<(), LifecycleError> {
    let eligible = match kind {
        DocumentKind::Mou | DocumentKind::OfferLetter => {
            req.status == EnrollmentStatus::Approved
        }
        DocumentKind::CompletionLetter => matches!(
            req.completion_status,
            CompletionStatus::Reviewed | CompletionStatus::CertificateIssued
        ),
        DocumentKind::Certificate => req.certificate_id.is_some(),
        DocumentKind::PartialCompletionLetter | DocumentKind::RelievingLetter => {
            req.status == EnrollmentStatus::Withdrawn
        }
    };

    if eligible {
        Ok(())
    } else {
        Err(LifecycleError::DocumentNotAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn base_request() -> EnrollmentRequest {
        let now = Utc::now();
        EnrollmentRequest {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            internship_id: Uuid::new_v4(),
            status: EnrollmentStatus::Pending,
            student_name: "Asha Rao".to_string(),
            student_email: "asha@example.com".to_string(),
            student_phone: String::new(),
            college: String::new(),
            course: String::new(),
            enrollment_number: String::new(),
            city: String::new(),
            internship_title: "Backend Internship".to_string(),
            internship_domain: "Engineering".to_string(),
            internship_location: String::new(),
            duration_weeks: 8,
            message: None,
            admin_note: None,
            approved_by: None,
            approved_at: None,
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

    fn approved_request() -> EnrollmentRequest {
        let mut req = base_request();
        req.status = EnrollmentStatus::Approved;
        req.approved_at = Some(Utc::now());
        req
    }

    #[test]
    fn test_grade_bands() {
        assert_eq!(grade_for_marks(50), "A+");
        assert_eq!(grade_for_marks(45), "A+");
        assert_eq!(grade_for_marks(44), "A");
        assert_eq!(grade_for_marks(40), "A");
        assert_eq!(grade_for_marks(39), "B");
        assert_eq!(grade_for_marks(35), "B");
        assert_eq!(grade_for_marks(34), "C");
        assert_eq!(grade_for_marks(25), "C");
        assert_eq!(grade_for_marks(24), "D");
        assert_eq!(grade_for_marks(0), "D");
    }

    #[test]
    fn test_grade_is_deterministic() {
        assert_eq!(grade_for_marks(47), grade_for_marks(47));
    }

    #[test]
    fn test_combination_table() {
        use CompletionStatus as C;
        use EnrollmentStatus as E;
        use WithdrawalStatus as W;

        assert!(is_valid_combination(E::Pending, C::NotRequested, W::NotRequested));
        assert!(!is_valid_combination(E::Pending, C::PendingReview, W::NotRequested));
        assert!(!is_valid_combination(E::Pending, C::NotRequested, W::Pending));

        assert!(is_valid_combination(E::Approved, C::Reviewed, W::Pending));
        assert!(is_valid_combination(E::Approved, C::NotRequested, W::Rejected));
        assert!(!is_valid_combination(E::Approved, C::NotRequested, W::Approved));

        assert!(!is_valid_combination(E::Rejected, C::PendingReview, W::NotRequested));

        assert!(is_valid_combination(E::Withdrawn, C::NotRequested, W::Approved));
        assert!(!is_valid_combination(E::Withdrawn, C::NotRequested, W::Pending));
    }

    #[test]
    fn test_approve_only_from_pending() {
        assert!(can_approve(&base_request()).is_ok());

        let approved = approved_request();
        assert!(matches!(
            can_approve(&approved),
            Err(LifecycleError::InvalidTransition)
        ));

        let mut rejected = base_request();
        rejected.status = EnrollmentStatus::Rejected;
        assert!(can_approve(&rejected).is_err());
    }

    #[test]
    fn test_request_completion_requires_approved_and_unrequested() {
        let req = approved_request();
        assert!(can_request_completion(&req).is_ok());

        let mut requested = approved_request();
        requested.completion_status = CompletionStatus::PendingReview;
        assert!(matches!(
            can_request_completion(&requested),
            Err(LifecycleError::InvalidTransition)
        ));

        assert!(can_request_completion(&base_request()).is_err());
    }

    #[test]
    fn test_review_completion_requires_pending_review() {
        let mut req = approved_request();
        req.completion_status = CompletionStatus::PendingReview;
        assert!(can_review_completion(&req).is_ok());

        // reviewing before any completion request was filed
        assert!(matches!(
            can_review_completion(&approved_request()),
            Err(LifecycleError::InvalidTransition)
        ));
    }

    #[test]
    fn test_issue_certificate_accepts_reviewed_and_issued() {
        let mut req = approved_request();
        req.completion_status = CompletionStatus::Reviewed;
        assert!(can_issue_certificate(&req).is_ok());

        req.completion_status = CompletionStatus::CertificateIssued;
        assert!(can_issue_certificate(&req).is_ok());

        req.completion_status = CompletionStatus::PendingReview;
        assert!(can_issue_certificate(&req).is_err());
    }

    #[test]
    fn test_withdrawal_flow_preconditions() {
        let req = approved_request();
        assert!(can_request_withdrawal(&req).is_ok());
        assert!(can_decide_withdrawal(&req).is_err());

        let mut pending_withdrawal = approved_request();
        pending_withdrawal.withdrawal_requested = true;
        pending_withdrawal.withdrawal_status = WithdrawalStatus::Pending;
        assert!(can_request_withdrawal(&pending_withdrawal).is_err());
        assert!(can_decide_withdrawal(&pending_withdrawal).is_ok());

        // a rejected withdrawal does not allow a second request on this model
        let mut rejected_withdrawal = approved_request();
        rejected_withdrawal.withdrawal_status = WithdrawalStatus::Rejected;
        assert!(can_request_withdrawal(&rejected_withdrawal).is_err());
    }

    #[test]
    fn test_completion_machine_freezes_after_withdrawal() {
        // a claim filed before withdrawal must stay frozen once the
        // enrollment is withdrawn
        let mut req = approved_request();
        req.completion_status = CompletionStatus::PendingReview;
        req.status = EnrollmentStatus::Withdrawn;
        req.withdrawal_status = WithdrawalStatus::Approved;

        assert!(matches!(
            can_review_completion(&req),
            Err(LifecycleError::InvalidTransition)
        ));

        req.completion_status = CompletionStatus::Reviewed;
        assert!(matches!(
            can_issue_certificate(&req),
            Err(LifecycleError::InvalidTransition)
        ));

        // the idempotent retry path is scoped to live enrollments too
        req.completion_status = CompletionStatus::CertificateIssued;
        assert!(can_issue_certificate(&req).is_err());
    }

    #[test]
    fn test_withdrawal_not_possible_from_pending() {
        assert!(matches!(
            can_request_withdrawal(&base_request()),
            Err(LifecycleError::InvalidTransition)
        ));
    }

    #[test]
    fn test_document_gate_approved_unlocks_mou_and_offer() {
        let pending = base_request();
        assert!(matches!(
            document_gate(DocumentKind::Mou, &pending),
            Err(LifecycleError::DocumentNotAvailable)
        ));

        let approved = approved_request();
        assert!(document_gate(DocumentKind::Mou, &approved).is_ok());
        assert!(document_gate(DocumentKind::OfferLetter, &approved).is_ok());
        assert!(document_gate(DocumentKind::CompletionLetter, &approved).is_err());
        assert!(document_gate(DocumentKind::PartialCompletionLetter, &approved).is_err());
    }

    #[test]
    fn test_document_gate_completion_letter() {
        let mut req = approved_request();
        req.completion_status = CompletionStatus::Reviewed;
        assert!(document_gate(DocumentKind::CompletionLetter, &req).is_ok());

        req.completion_status = CompletionStatus::CertificateIssued;
        assert!(document_gate(DocumentKind::CompletionLetter, &req).is_ok());

        req.completion_status = CompletionStatus::PendingReview;
        assert!(document_gate(DocumentKind::CompletionLetter, &req).is_err());
    }

    #[test]
    fn test_document_gate_certificate_requires_issued_id() {
        let mut req = approved_request();
        req.completion_status = CompletionStatus::CertificateIssued;
        // completion state alone is not enough, the certificate row must exist
        req.certificate_id = None;
        assert!(document_gate(DocumentKind::Certificate, &req).is_err());

        req.certificate_id = Some(Uuid::new_v4());
        assert!(document_gate(DocumentKind::Certificate, &req).is_ok());
    }

    #[test]
    fn test_document_gate_withdrawn_unlocks_exit_letters() {
        let mut req = approved_request();
        req.status = EnrollmentStatus::Withdrawn;
        req.withdrawal_status = WithdrawalStatus::Approved;

        assert!(document_gate(DocumentKind::PartialCompletionLetter, &req).is_ok());
        assert!(document_gate(DocumentKind::RelievingLetter, &req).is_ok());
        // MOU gate closes once no longer approved; an already generated file
        // stays downloadable through its stored path
        assert!(document_gate(DocumentKind::Mou, &req).is_err());
        // never-reviewed completion letter stays unavailable after withdrawal
        assert!(document_gate(DocumentKind::CompletionLetter, &req).is_err());
    }
}
