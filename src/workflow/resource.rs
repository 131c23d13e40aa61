//! Named resource instances of a workflow.

use std::sync::Arc;

use super::resource_type::ResourceType;

/// Unique identifier for a resource inside one workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resource declared by an input or output of some operation.
///
/// Created the first time its name is mentioned; later declarations must use
/// the same resource type.
#[derive(Debug, Clone)]
pub struct WorkflowResource {
    pub name: String,
    pub resource_type: Arc<ResourceType>,
}

impl WorkflowResource {
    pub fn type_name(&self) -> &str {
        &self.resource_type.type_name
    }
}
