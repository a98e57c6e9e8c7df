//! Commands Layer
//!
//! Validated entry points the client calls. Input is trimmed and checked here,
//! before any store call; the repository itself does not re-validate.

mod card_cmd;
mod project_cmd;

pub use card_cmd::*;
pub use project_cmd::*;

use crate::domain::{DomainError, DomainResult};

/// Trimmed copy of `value`, or a validation error when nothing is left
pub(crate) fn require_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn require_id(field: &str, value: &str) -> DomainResult<String> {
    require_text(field, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text("name", "  Sprint 12 \n").unwrap(), "Sprint 12");
    }

    #[test]
    fn test_require_text_rejects_blank() {
        assert!(matches!(require_text("name", " \t "), Err(DomainError::Validation(_))));
    }
}
