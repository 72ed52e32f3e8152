#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! | Type | Raised by | Handling |
//! |------|-----------|----------|
//! | [`RegistryError`] | [`RegistryBuilder`](crate::RegistryBuilder) | logged and dropped by `build`, returned by `try_build` |
//! | [`TreeError`] | [`ViewTree`](crate::ViewTree) operations | returned to the caller |
//! | [`FieldInitError`] | markup application in `create_view` | collected in an [`InitReport`] |
//! | [`HandlerError`] | change handlers | logged at the flush boundary |

use mbind_core::{ConversionError, ValueKind};

use crate::id::ViewId;

/// Failure of a tree operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("unknown view type {0:?}")]
    UnknownType(String),
    #[error("view {0:?} does not exist or was destroyed")]
    UnknownView(ViewId),
    #[error("view type {view_type:?} has no field {field:?}")]
    UnknownField { view_type: String, field: String },
    #[error("view {0:?} is not a template")]
    NotATemplate(ViewId),
    #[error("field {field:?} holds {expected} values, got {actual}")]
    KindMismatch {
        field: String,
        expected: ValueKind,
        actual: &'static str,
    },
    #[error("field {field:?}: {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConversionError,
    },
}

/// Failure reported by a change handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<TreeError> for HandlerError {
    fn from(err: TreeError) -> Self {
        Self::new(err.to_string())
    }
}

/// Configuration error found while building the type registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("view type {0:?} registered twice")]
    DuplicateType(String),
    #[error("view type {view_type:?} declares field {field:?} twice")]
    DuplicateField { view_type: String, field: String },
    #[error("view type {view_type:?}: component {component:?} has unknown type {component_type:?}")]
    UnknownComponentType {
        view_type: String,
        component: String,
        component_type: String,
    },
    #[error("view type {view_type:?}: component {component:?} contains its own type")]
    ComponentCycle { view_type: String, component: String },
    #[error("view type {view_type:?}: field {field:?} maps to unresolved target {target:?}")]
    UnresolvedMapping {
        view_type: String,
        field: String,
        target: String,
    },
    #[error("view type {view_type:?}: field {field:?} ({expected}) cannot carry {actual} values")]
    KindMismatch {
        view_type: String,
        field: String,
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("cyclic field mapping: {}", cycle.join(" -> "))]
    CyclicMapping { cycle: Vec<String> },
    #[error("view type {view_type:?}: field {field:?} names unknown change handler {handler:?}")]
    UnknownHandler {
        view_type: String,
        field: String,
        handler: String,
    },
}

/// A markup attribute that could not be applied during view creation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldInitError {
    #[error("view {view:?} has no field {field:?}")]
    UnknownField { view: ViewId, field: String },
    #[error("view {view:?} field {field:?}: {source}")]
    Conversion {
        view: ViewId,
        field: String,
        #[source]
        source: ConversionError,
    },
}

/// Outcome of creating a view from markup.
///
/// The view exists even when some attributes failed; those fields keep their
/// defaults.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct InitReport {
    pub view: ViewId,
    pub failures: Vec<FieldInitError>,
}

impl InitReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
