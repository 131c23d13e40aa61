//! Workflow error types.

use thiserror::Error;

/// Errors raised while declaring or compiling a render workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// A declaration referenced a resource type that was never registered.
    #[error("there is no resource type with name {0}")]
    UnknownResourceType(String),

    /// A declaration referenced an operation that was never registered.
    #[error("there is no operation with name {0}")]
    UnknownOperation(String),

    /// A query or association referenced a resource that was never declared.
    #[error("there is no resource with name {0}")]
    UnknownResource(String),

    /// A resource was redeclared under a different resource type.
    #[error("resource {resource} already has type {existing}, cannot redeclare it as {requested}")]
    TypeMismatch {
        resource: String,
        existing: String,
        requested: String,
    },

    /// The resource type's meta type does not fit the kind of declaration.
    #[error("resource {resource} of type {type_name} cannot be used as {expected}")]
    MetaTypeMismatch {
        resource: String,
        type_name: String,
        expected: &'static str,
    },

    /// A resolve output pointed at a resource that does not exist.
    #[error("resolve output {resource} points at nonexisting resource {target}")]
    UnknownResolveTarget { resource: String, target: String },

    /// Verification found structural problems. Every violation is listed.
    #[error("errors in workflow operations:\n{}", .0.join("\n"))]
    WorkflowInvalid(Vec<String>),
}

/// Result alias used throughout the crate.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
