// ============================================================================
// domain/error.rs - PURE WEAVING ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (collected per task in the weave report)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Graph & Plan Errors
    // ========================================================================
    /// A full-graph traversal was attempted on a plan that is still a draft.
    #[error("weaving plan is not final: cannot {operation} before finalization")]
    PlanNotFinal { operation: &'static str },

    #[error("Invalid ring '{name}': {reason}")]
    InvalidRing { name: String, reason: String },

    #[error("Invalid capability '{name}': {reason}")]
    InvalidCapability { name: String, reason: String },

    #[error("Unknown ring kind: {0}")]
    UnknownRingKind(String),

    // ========================================================================
    // Emission Errors
    // ========================================================================
    /// A type token has no mapping in the requested emit target.
    #[error("type '{token}' has no mapping for target '{target}'")]
    UnmappedType { token: String, target: String },

    #[error("Unknown emit target: {0}")]
    UnknownTarget(String),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("unresolved placeholder '{{{placeholder}}}' in '{template}'")]
    UnresolvedPlaceholder {
        placeholder: String,
        template: String,
    },

    // ========================================================================
    // Marker Errors
    // ========================================================================
    /// Start marker without matching end (or the reverse). Never repaired.
    #[error("corrupt marker block: {reason}: `{marker}`")]
    MarkerCorruption { marker: String, reason: String },

    #[error("anchor pattern `{pattern}` matched no line")]
    AnchorNotFound { pattern: String },

    #[error("invalid anchor pattern `{pattern}`: {reason}")]
    InvalidAnchor { pattern: String, reason: String },

    #[error("invalid marker key '{key}': {reason}")]
    InvalidMarkerKey { key: String, reason: String },

    // ========================================================================
    // Definition Errors
    // ========================================================================
    #[error("Invalid treadle '{name}': {reason}")]
    InvalidTreadle { name: String, reason: String },

    #[error("Required field missing: {field}")]
    MissingRequiredField { field: &'static str },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::PlanNotFinal { .. } => vec![
                "A generator read the plan before it was finalized".into(),
                "This is a bug in the weaving engine, please report it".into(),
            ],
            Self::UnmappedType { token, target } => vec![
                format!("Add a mapping for '{token}' to the '{target}' type table"),
                "Primitive tokens: string, number, integer, boolean, void, bytes".into(),
                "Domain types must start with an uppercase letter".into(),
            ],
            Self::MarkerCorruption { marker, .. } => vec![
                format!("Inspect the file around `{marker}`"),
                "Restore or delete the unmatched marker by hand, then re-run".into(),
                "Weft never guesses a repair to protect hand-written code".into(),
            ],
            Self::AnchorNotFound { pattern } => vec![
                format!("No line in the target file matches `{pattern}`"),
                "Adjust the patch anchor or add the anchor line to the file".into(),
            ],
            Self::UnresolvedPlaceholder { placeholder, .. } => vec![
                format!("'{placeholder}' is not in the treadle's data bag"),
                "Add it through the treadle's data builder".into(),
            ],
            Self::InvalidRing { reason, .. } => vec![
                "Check the ring graph declaration".into(),
                format!("Details: {reason}"),
            ],
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRing { .. }
            | Self::InvalidCapability { .. }
            | Self::InvalidTreadle { .. }
            | Self::InvalidAnchor { .. }
            | Self::InvalidMarkerKey { .. }
            | Self::UnknownRingKind(_)
            | Self::UnknownTarget(_)
            | Self::UnknownLanguage(_)
            | Self::MissingRequiredField { .. } => ErrorCategory::Validation,
            Self::UnmappedType { .. } | Self::UnresolvedPlaceholder { .. } => {
                ErrorCategory::Generation
            }
            Self::AnchorNotFound { .. } => ErrorCategory::NotFound,
            Self::MarkerCorruption { .. } => ErrorCategory::Corruption,
            Self::PlanNotFinal { .. } => ErrorCategory::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Generation,
    NotFound,
    Corruption,
    Internal,
}
