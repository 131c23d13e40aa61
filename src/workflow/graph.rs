//! Workflow graph storage and queries.
//!
//! [`WorkflowGraph`] is a plain arena: operations, resources and transitions
//! live in vectors and refer to each other through [`OperationId`] and
//! [`ResourceId`]. Names map to ids through lookup tables, so every query is a
//! scan over the transition list. Workflows have tens of operations, which
//! keeps that cheap.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use ash::vk;

use super::operation::{OperationId, RenderOperation, SceneNode};
use super::resource::{ResourceId, WorkflowResource};
use super::resource_type::{MetaType, ResourceType};
use super::transition::{
    AttachmentTransition, BufferTransition, LoadOp, ResourceTransition, TransitionKinds,
    TransitionPayload, TransitionType,
};
use crate::error::{WorkflowError, WorkflowResult};

/// Externally owned object bound to a resource name.
pub type AssociatedResource = Arc<dyn Any + Send + Sync>;

/// Which meta types a declaration accepts.
#[derive(Debug, Clone, Copy)]
enum Declaration {
    Attachment,
    Buffer,
}

impl Declaration {
    fn accepts(self, meta_type: MetaType) -> bool {
        match self {
            Self::Attachment => meta_type == MetaType::Attachment,
            Self::Buffer => matches!(meta_type, MetaType::Buffer | MetaType::Image),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Attachment => "an attachment",
            Self::Buffer => "a buffer or image",
        }
    }
}

/// Operations, resources and the transitions connecting them.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    resource_types: HashMap<String, Arc<ResourceType>>,
    operations: Vec<RenderOperation>,
    operation_ids: HashMap<String, OperationId>,
    resources: Vec<WorkflowResource>,
    resource_ids: HashMap<String, ResourceId>,
    transitions: Vec<ResourceTransition>,
    associated_resources: HashMap<String, AssociatedResource>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Register a resource type. A type with the same name is replaced.
    pub fn add_resource_type(&mut self, resource_type: ResourceType) -> Arc<ResourceType> {
        let resource_type = Arc::new(resource_type);
        if self
            .resource_types
            .insert(resource_type.type_name.clone(), resource_type.clone())
            .is_some()
        {
            log::warn!(
                "RenderWorkflow : resource type {} registered twice, replacing it",
                resource_type.type_name
            );
        }
        resource_type
    }

    /// Register an operation. An operation with the same name is replaced in place,
    /// keeping its id and transitions.
    pub fn add_operation(&mut self, operation: RenderOperation) -> OperationId {
        if let Some(&id) = self.operation_ids.get(&operation.name) {
            log::warn!(
                "RenderWorkflow : operation {} registered twice, replacing it",
                operation.name
            );
            self.operations[id.index()] = operation;
            return id;
        }
        let id = OperationId(self.operations.len() as u32);
        self.operation_ids.insert(operation.name.clone(), id);
        self.operations.push(operation);
        id
    }

    pub fn add_attachment_input(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        layout: vk::ImageLayout,
    ) -> WorkflowResult<()> {
        self.add_attachment_transition(
            operation,
            resource_type,
            resource,
            TransitionType::AttachmentInput,
            AttachmentTransition {
                resolve_source: None,
                layout,
                load: LoadOp::Load,
            },
        )
    }

    pub fn add_attachment_output(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        layout: vk::ImageLayout,
        load: LoadOp,
    ) -> WorkflowResult<()> {
        self.add_attachment_transition(
            operation,
            resource_type,
            resource,
            TransitionType::AttachmentOutput,
            AttachmentTransition {
                resolve_source: None,
                layout,
                load,
            },
        )
    }

    /// Declare `resource` as the multisample resolve target of the color output `source`.
    ///
    /// `source` must already be declared.
    pub fn add_attachment_resolve_output(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        source: &str,
        layout: vk::ImageLayout,
        load: LoadOp,
    ) -> WorkflowResult<()> {
        let Some(&source_id) = self.resource_ids.get(source) else {
            return Err(WorkflowError::UnknownResolveTarget {
                resource: resource.to_string(),
                target: source.to_string(),
            });
        };
        self.add_attachment_transition(
            operation,
            resource_type,
            resource,
            TransitionType::AttachmentResolveOutput,
            AttachmentTransition {
                resolve_source: Some(source_id),
                layout,
                load,
            },
        )
    }

    pub fn add_attachment_depth_output(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        layout: vk::ImageLayout,
        load: LoadOp,
    ) -> WorkflowResult<()> {
        self.add_attachment_transition(
            operation,
            resource_type,
            resource,
            TransitionType::AttachmentDepthOutput,
            AttachmentTransition {
                resolve_source: None,
                layout,
                load,
            },
        )
    }

    pub fn add_buffer_input(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        pipeline_stage: vk::PipelineStageFlags,
        access: vk::AccessFlags,
    ) -> WorkflowResult<()> {
        self.add_transition(
            operation,
            resource_type,
            resource,
            Declaration::Buffer,
            TransitionType::BufferInput,
            TransitionPayload::Buffer(BufferTransition {
                pipeline_stage,
                access,
            }),
        )
    }

    pub fn add_buffer_output(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        pipeline_stage: vk::PipelineStageFlags,
        access: vk::AccessFlags,
    ) -> WorkflowResult<()> {
        self.add_transition(
            operation,
            resource_type,
            resource,
            Declaration::Buffer,
            TransitionType::BufferOutput,
            TransitionPayload::Buffer(BufferTransition {
                pipeline_stage,
                access,
            }),
        )
    }

    fn add_attachment_transition(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        transition_type: TransitionType,
        attachment: AttachmentTransition,
    ) -> WorkflowResult<()> {
        self.add_transition(
            operation,
            resource_type,
            resource,
            Declaration::Attachment,
            transition_type,
            TransitionPayload::Attachment(attachment),
        )
    }

    /// Validate a declaration, then create the resource if needed and record the transition.
    ///
    /// Nothing is modified when validation fails.
    fn add_transition(
        &mut self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        declaration: Declaration,
        transition_type: TransitionType,
        payload: TransitionPayload,
    ) -> WorkflowResult<()> {
        let operation = self.operation_id(operation)?;
        let res_type = self.resource_type(resource_type)?.clone();
        if !declaration.accepts(res_type.meta_type()) {
            return Err(WorkflowError::MetaTypeMismatch {
                resource: resource.to_string(),
                type_name: res_type.type_name.clone(),
                expected: declaration.describe(),
            });
        }

        let resource = match self.resource_ids.get(resource) {
            Some(&id) => {
                let existing = &self.resources[id.index()];
                if *existing.resource_type != *res_type {
                    return Err(WorkflowError::TypeMismatch {
                        resource: resource.to_string(),
                        existing: existing.resource_type.type_name.clone(),
                        requested: res_type.type_name.clone(),
                    });
                }
                id
            }
            None => {
                let id = ResourceId(self.resources.len() as u32);
                self.resource_ids.insert(resource.to_string(), id);
                self.resources.push(WorkflowResource {
                    name: resource.to_string(),
                    resource_type: res_type,
                });
                id
            }
        };

        self.transitions.push(ResourceTransition {
            operation,
            resource,
            transition_type,
            payload,
        });
        Ok(())
    }

    /// Bind an externally owned object to a declared resource.
    pub fn associate_resource(
        &mut self,
        resource: &str,
        object: AssociatedResource,
    ) -> WorkflowResult<()> {
        self.resource_id(resource)?;
        self.associated_resources.insert(resource.to_string(), object);
        Ok(())
    }

    pub fn associated_resource(&self, resource: &str) -> Option<AssociatedResource> {
        self.associated_resources.get(resource).cloned()
    }

    pub fn set_scene_node(&mut self, operation: &str, node: Option<SceneNode>) -> WorkflowResult<()> {
        let id = self.operation_id(operation)?;
        self.operations[id.index()].scene_node = node;
        Ok(())
    }

    pub fn set_operation_enabled(&mut self, operation: &str, enabled: bool) -> WorkflowResult<()> {
        let id = self.operation_id(operation)?;
        self.operations[id.index()].enabled = enabled;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn resource_type(&self, type_name: &str) -> WorkflowResult<&Arc<ResourceType>> {
        self.resource_types
            .get(type_name)
            .ok_or_else(|| WorkflowError::UnknownResourceType(type_name.to_string()))
    }

    pub fn operation_id(&self, name: &str) -> WorkflowResult<OperationId> {
        self.operation_ids
            .get(name)
            .copied()
            .ok_or_else(|| WorkflowError::UnknownOperation(name.to_string()))
    }

    pub fn resource_id(&self, name: &str) -> WorkflowResult<ResourceId> {
        self.resource_ids
            .get(name)
            .copied()
            .ok_or_else(|| WorkflowError::UnknownResource(name.to_string()))
    }

    /// Get an operation by id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not produced by this graph.
    pub fn operation(&self, id: OperationId) -> &RenderOperation {
        &self.operations[id.index()]
    }

    /// Get a resource by id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not produced by this graph.
    pub fn resource(&self, id: ResourceId) -> &WorkflowResource {
        &self.resources[id.index()]
    }

    /// All operations in registration order.
    pub fn operations(&self) -> impl Iterator<Item = (OperationId, &RenderOperation)> {
        self.operations
            .iter()
            .enumerate()
            .map(|(i, op)| (OperationId(i as u32), op))
    }

    /// All resources in declaration order.
    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &WorkflowResource)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, res)| (ResourceId(i as u32), res))
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn transitions(&self) -> &[ResourceTransition] {
        &self.transitions
    }

    // ------------------------------------------------------------------
    // Graph queries
    // ------------------------------------------------------------------

    /// Transitions of an operation whose type is in `kinds`, in declaration order.
    pub fn operation_io(
        &self,
        operation: OperationId,
        kinds: TransitionKinds,
    ) -> impl Iterator<Item = &ResourceTransition> {
        self.transitions.iter().filter(move |t| {
            t.operation == operation && kinds.intersects(t.transition_type.kind())
        })
    }

    /// Transitions of a resource whose type is in `kinds`, in declaration order.
    pub fn resource_io(
        &self,
        resource: ResourceId,
        kinds: TransitionKinds,
    ) -> impl Iterator<Item = &ResourceTransition> {
        self.transitions.iter().filter(move |t| {
            t.resource == resource && kinds.intersects(t.transition_type.kind())
        })
    }

    /// The transition producing a resource, if any.
    pub fn producer(&self, resource: ResourceId) -> Option<&ResourceTransition> {
        self.resource_io(resource, TransitionKinds::ALL_OUTPUTS).next()
    }

    /// Operations producing a resource consumed by `operation`.
    pub fn previous_operations(&self, operation: OperationId) -> BTreeSet<OperationId> {
        self.operation_io(operation, TransitionKinds::ALL_INPUTS)
            .flat_map(|input| self.resource_io(input.resource, TransitionKinds::ALL_OUTPUTS))
            .map(|output| output.operation)
            .filter(|&producer| producer != operation)
            .collect()
    }

    /// Operations consuming a resource produced by `operation`.
    pub fn next_operations(&self, operation: OperationId) -> BTreeSet<OperationId> {
        self.operation_io(operation, TransitionKinds::ALL_OUTPUTS)
            .flat_map(|output| self.resource_io(output.resource, TransitionKinds::ALL_INPUTS))
            .map(|input| input.operation)
            .filter(|&consumer| consumer != operation)
            .collect()
    }

    /// Operations without previous operations.
    pub fn initial_operations(&self) -> BTreeSet<OperationId> {
        self.operations()
            .map(|(id, _)| id)
            .filter(|&id| self.previous_operations(id).is_empty())
            .collect()
    }

    /// Operations without next operations.
    pub fn final_operations(&self) -> BTreeSet<OperationId> {
        self.operations()
            .map(|(id, _)| id)
            .filter(|&id| self.next_operations(id).is_empty())
            .collect()
    }
}
