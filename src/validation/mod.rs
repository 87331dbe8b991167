//! Input validation module

use crate::lifecycle::state::MAX_MARKS;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Marks must be between 0 and {MAX_MARKS}")]
    MarksOutOfRange,

    #[error("Invalid URL format")]
    InvalidUrl,

    #[error("Invalid file type: {detected}")]
    InvalidFileType { detected: String },

    #[error("File too large (max {max_mb} MB)")]
    FileTooLarge { max_mb: usize },
}

/// Completion review marks must fall in the 0..=MAX_MARKS band
pub fn validate_marks(marks: i32) -> Result<(), ValidationError> {
    if !(0..=MAX_MARKS).contains(&marks) {
        return Err(ValidationError::MarksOutOfRange);
    }
    Ok(())
}

/// A withdrawal request must carry a reason
pub fn validate_withdrawal_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    if reason.len() > 2000 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 2000,
        });
    }
    Ok(())
}

/// Rejecting a submission requires non-empty feedback for the student
pub fn validate_rejection_feedback(feedback: Option<&str>) -> Result<(), ValidationError> {
    match feedback {
        Some(text) if !text.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::Required {
            field: "feedback".to_string(),
        }),
    }
}

/// A submission must describe the work done
pub fn validate_submission_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "content".to_string(),
        });
    }
    if content.len() > 20_000 {
        return Err(ValidationError::TooLong {
            field: "content".to_string(),
            max: 20_000,
        });
    }
    Ok(())
}

/// Validate an external resume link (Google Drive or any https URL)
pub fn validate_resume_url(url: &str) -> Result<(), ValidationError> {
    if url.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "url".to_string(),
        });
    }
    if !url.starts_with("https://") {
        return Err(ValidationError::InvalidUrl);
    }
    if url.len() > 2048 {
        return Err(ValidationError::TooLong {
            field: "url".to_string(),
            max: 2048,
        });
    }
    Ok(())
}

/// Resume uploads: PDF or Word, checked by magic bytes rather than the
/// client-supplied content type
pub fn validate_resume_upload(
    data: &[u8],
    max_size_bytes: usize,
) -> Result<(), ValidationError> {
    if data.len() > max_size_bytes {
        return Err(ValidationError::FileTooLarge {
            max_mb: max_size_bytes / (1024 * 1024),
        });
    }

    let allowed_types = [
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ];

    let detected = infer::get(data)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !allowed_types.contains(&detected.as_str()) {
        return Err(ValidationError::InvalidFileType { detected });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_range() {
        assert!(validate_marks(0).is_ok());
        assert!(validate_marks(50).is_ok());
        assert!(matches!(
            validate_marks(-1),
            Err(ValidationError::MarksOutOfRange)
        ));
        assert!(matches!(
            validate_marks(51),
            Err(ValidationError::MarksOutOfRange)
        ));
    }

    #[test]
    fn test_withdrawal_reason_required() {
        assert!(validate_withdrawal_reason("personal reasons").is_ok());
        assert!(matches!(
            validate_withdrawal_reason("   "),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_rejection_feedback_required() {
        assert!(validate_rejection_feedback(Some("missing unit tests")).is_ok());
        assert!(validate_rejection_feedback(Some("")).is_err());
        assert!(validate_rejection_feedback(None).is_err());
    }

    #[test]
    fn test_submission_content() {
        assert!(validate_submission_content("Implemented the parser").is_ok());
        assert!(validate_submission_content(" ").is_err());
    }

    #[test]
    fn test_resume_url() {
        assert!(validate_resume_url("https://drive.google.com/file/d/abc/view").is_ok());
        assert!(matches!(
            validate_resume_url("http://drive.google.com/file"),
            Err(ValidationError::InvalidUrl)
        ));
        assert!(validate_resume_url("").is_err());
    }

    #[test]
    fn test_resume_upload_accepts_pdf_magic() {
        let pdf = b"%PDF-1.7 rest of file".to_vec();
        assert!(validate_resume_upload(&pdf, 10 * 1024 * 1024).is_ok());
    }

    #[test]
    fn test_resume_upload_rejects_unknown_bytes() {
        let junk = b"#!/bin/sh\necho hi".to_vec();
        assert!(matches!(
            validate_resume_upload(&junk, 10 * 1024 * 1024),
            Err(ValidationError::InvalidFileType { .. })
        ));
    }

    #[test]
    fn test_resume_upload_size_limit() {
        let big = vec![0u8; 11];
        assert!(matches!(
            validate_resume_upload(&big, 10),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }
}
