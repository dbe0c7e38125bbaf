use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::DealStatus;

/// Field name to human-readable reason.
pub type FieldErrors = BTreeMap<String, String>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    NotFound,
    Validation,
    StateConflict,
    Internal,
}

#[derive(Error, Debug)]
pub enum DealError {
    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed: {}", format_fields(.0))]
    Validation(FieldErrors),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: DealStatus, to: DealStatus },

    #[error("price mismatch: requested {requested}, listed {listed}")]
    PriceMismatch { requested: i64, listed: i64 },

    #[error("channel is not listed")]
    ChannelNotListed,

    #[error("{op} failed")]
    Internal {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl DealError {
    pub fn validation(field: &str, reason: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), reason.to_string());
        DealError::Validation(fields)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DealError::Forbidden => ErrorKind::Authorization,
            DealError::NotFound(_) => ErrorKind::NotFound,
            DealError::Validation(_) => ErrorKind::Validation,
            DealError::InvalidTransition { .. }
            | DealError::PriceMismatch { .. }
            | DealError::ChannelNotListed => ErrorKind::StateConflict,
            DealError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DealError::Forbidden => "forbidden",
            DealError::NotFound(_) => "not_found",
            DealError::Validation(_) => "validation_error",
            DealError::InvalidTransition { .. } => "invalid_transition",
            DealError::PriceMismatch { .. } => "price_mismatch",
            DealError::ChannelNotListed => "channel_not_listed",
            DealError::Internal { .. } => "internal_error",
        }
    }

    /// HTTP status a transport layer would typically map this error to.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::StateConflict => 409,
            ErrorKind::Internal => 500,
        }
    }

    pub fn details(&self) -> Option<&FieldErrors> {
        match self {
            DealError::Validation(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

fn format_fields(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wraps collaborator failures as [`DealError::Internal`] tagged with the
/// operation that hit them.
pub(crate) trait ResultExt<T> {
    fn or_internal(self, op: &'static str) -> Result<T, DealError>;
}

impl<T> ResultExt<T> for anyhow::Result<T> {
    fn or_internal(self, op: &'static str) -> Result<T, DealError> {
        self.map_err(|source| DealError::Internal { op, source })
    }
}
