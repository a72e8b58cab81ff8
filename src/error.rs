// Catalog errors - one enum for every recoverable and fatal condition
//
// Validation, permission and lookup errors are handled at the boundary
// (CLI / HTTP) and turned into user-facing messages. External source errors
// abort a reconciliation run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// FIELD-KEYED VALIDATION ERRORS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// Ok(()) when nothing was collected
    pub fn into_result(self) -> Result<(), CatalogError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ============================================================================
// CATALOG ERROR
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("permission denied: the creator of a tracker cannot approve it")]
    SelfApprovalDenied,

    #[error("approval already recorded for this reviewer")]
    ApprovalConflict,

    #[error("no approval from this reviewer")]
    ApprovalNotFound,

    #[error("Unexpected status from API: {0}")]
    ExternalSourceUnavailable(u16),

    #[error("Empty response")]
    ExternalSourceEmpty,

    #[error("tracker table is not empty, truncate it before the import")]
    ImportTargetNotEmpty,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Self-approval is a permission failure as far as callers are concerned
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            CatalogError::PermissionDenied(_) | CatalogError::SelfApprovalDenied
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound(_) | CatalogError::ApprovalNotFound
        )
    }

    /// HTTP status equivalent used by the API layer
    pub fn status_code(&self) -> u16 {
        match self {
            CatalogError::Validation(_) => 400,
            CatalogError::NotFound(_) | CatalogError::ApprovalNotFound => 404,
            CatalogError::PermissionDenied(_) | CatalogError::SelfApprovalDenied => 403,
            CatalogError::ApprovalConflict | CatalogError::ImportTargetNotEmpty => 409,
            CatalogError::ExternalSourceUnavailable(_) | CatalogError::ExternalSourceEmpty => 502,
            CatalogError::Storage(_)
            | CatalogError::Http(_)
            | CatalogError::Json(_)
            | CatalogError::Io(_) => 500,
        }
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("code_signature", "Must not contain spaces");
        errors.add("code_signature", "Must be a valid regex");
        errors.add("name", "This field is required.");

        assert_eq!(errors.field("code_signature").len(), 2);
        assert_eq!(errors.field("website").len(), 0);
        assert_eq!(
            errors.to_string(),
            "code_signature: Must not contain spaces; code_signature: Must be a valid regex; name: This field is required."
        );
        assert!(matches!(errors.into_result(), Err(CatalogError::Validation(_))));
    }

    #[test]
    fn test_external_errors_keep_operator_messages() {
        assert_eq!(
            CatalogError::ExternalSourceUnavailable(404).to_string(),
            "Unexpected status from API: 404"
        );
        assert_eq!(CatalogError::ExternalSourceEmpty.to_string(), "Empty response");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CatalogError::SelfApprovalDenied.status_code(), 403);
        assert!(CatalogError::SelfApprovalDenied.is_permission_denied());
        assert_eq!(CatalogError::ApprovalConflict.status_code(), 409);
        assert_eq!(CatalogError::NotFound("x".into()).status_code(), 404);
        assert!(CatalogError::ApprovalNotFound.is_not_found());
    }
}
