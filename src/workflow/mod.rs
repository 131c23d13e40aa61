//! Render workflow: the user facing graph of operations and resources.
//!
//! [`RenderWorkflow`] is safe to share between threads. Every mutation goes
//! through one mutex and marks the compiled output stale; [`RenderWorkflow::compile`]
//! snapshots the graph, compiles the snapshot and publishes the result as a
//! whole. Compiling again without any mutation in between returns the
//! published output unchanged.

pub mod graph;
pub mod operation;
pub mod resource;
pub mod resource_type;
pub mod transition;

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use parking_lot::{Mutex, RwLock};

pub use graph::{AssociatedResource, WorkflowGraph};
pub use operation::{OperationId, OperationKind, RenderOperation, SceneNode};
pub use resource::{ResourceId, WorkflowResource};
pub use resource_type::{
    AttachmentDescription, AttachmentSize, AttachmentType, BufferKind, ChannelSwizzle, ImageKinds,
    MetaType, ResourcePayload, ResourceType, Swizzle,
};
pub use transition::{
    AttachmentTransition, BufferTransition, ClearValue, LoadOp, ResourceTransition, StoreOp,
    TransitionKinds, TransitionPayload, TransitionType,
};

use crate::compiler::WorkflowCompiler;
use crate::error::WorkflowResult;
use crate::sequences::{QueueTraits, WorkflowSequences};

struct WorkflowState {
    graph: WorkflowGraph,
    valid: bool,
    /// Bumped by every mutation, lets a finished compile tell whether its snapshot is current.
    generation: u64,
}

impl WorkflowState {
    fn invalidate(&mut self) {
        self.valid = false;
        self.generation += 1;
    }
}

/// A named render workflow targeting a set of queues.
pub struct RenderWorkflow {
    name: String,
    queue_traits: Vec<QueueTraits>,
    state: Mutex<WorkflowState>,
    compile_lock: Mutex<()>,
    sequences: RwLock<Option<Arc<WorkflowSequences>>>,
}

impl std::fmt::Debug for RenderWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWorkflow")
            .field("name", &self.name)
            .field("queue_traits", &self.queue_traits)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl RenderWorkflow {
    pub fn new(name: impl Into<String>, queue_traits: Vec<QueueTraits>) -> Self {
        Self {
            name: name.into(),
            queue_traits,
            state: Mutex::new(WorkflowState {
                graph: WorkflowGraph::new(),
                valid: false,
                generation: 0,
            }),
            compile_lock: Mutex::new(()),
            sequences: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue_traits(&self) -> &[QueueTraits] {
        &self.queue_traits
    }

    /// Run a mutation against the graph. Successful mutations invalidate the compiled output.
    fn mutate<R>(&self, f: impl FnOnce(&mut WorkflowGraph) -> WorkflowResult<R>) -> WorkflowResult<R> {
        let mut state = self.state.lock();
        let result = f(&mut state.graph)?;
        state.invalidate();
        Ok(result)
    }

    fn read<R>(&self, f: impl FnOnce(&WorkflowGraph) -> R) -> R {
        f(&self.state.lock().graph)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Register a resource type, replacing one with the same name.
    pub fn add_resource_type(&self, resource_type: ResourceType) -> Arc<ResourceType> {
        let mut state = self.state.lock();
        state.invalidate();
        state.graph.add_resource_type(resource_type)
    }

    /// Register an operation, replacing one with the same name.
    pub fn add_render_operation(&self, operation: RenderOperation) -> OperationId {
        let mut state = self.state.lock();
        state.invalidate();
        state.graph.add_operation(operation)
    }

    pub fn add_attachment_input(
        &self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        layout: vk::ImageLayout,
    ) -> WorkflowResult<()> {
        self.mutate(|graph| graph.add_attachment_input(operation, resource_type, resource, layout))
    }

    pub fn add_attachment_output(
        &self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        layout: vk::ImageLayout,
        load: LoadOp,
    ) -> WorkflowResult<()> {
        self.mutate(|graph| {
            graph.add_attachment_output(operation, resource_type, resource, layout, load)
        })
    }

    pub fn add_attachment_resolve_output(
        &self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        source: &str,
        layout: vk::ImageLayout,
        load: LoadOp,
    ) -> WorkflowResult<()> {
        self.mutate(|graph| {
            graph.add_attachment_resolve_output(
                operation,
                resource_type,
                resource,
                source,
                layout,
                load,
            )
        })
    }

    pub fn add_attachment_depth_output(
        &self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        layout: vk::ImageLayout,
        load: LoadOp,
    ) -> WorkflowResult<()> {
        self.mutate(|graph| {
            graph.add_attachment_depth_output(operation, resource_type, resource, layout, load)
        })
    }

    pub fn add_buffer_input(
        &self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        pipeline_stage: vk::PipelineStageFlags,
        access: vk::AccessFlags,
    ) -> WorkflowResult<()> {
        self.mutate(|graph| {
            graph.add_buffer_input(operation, resource_type, resource, pipeline_stage, access)
        })
    }

    pub fn add_buffer_output(
        &self,
        operation: &str,
        resource_type: &str,
        resource: &str,
        pipeline_stage: vk::PipelineStageFlags,
        access: vk::AccessFlags,
    ) -> WorkflowResult<()> {
        self.mutate(|graph| {
            graph.add_buffer_output(operation, resource_type, resource, pipeline_stage, access)
        })
    }

    pub fn set_scene_node(&self, operation: &str, node: Option<SceneNode>) -> WorkflowResult<()> {
        self.mutate(|graph| graph.set_scene_node(operation, node))
    }

    pub fn set_operation_enabled(&self, operation: &str, enabled: bool) -> WorkflowResult<()> {
        self.mutate(|graph| graph.set_operation_enabled(operation, enabled))
    }

    /// Bind an externally owned object to a declared resource.
    pub fn associate_resource(
        &self,
        resource: &str,
        object: AssociatedResource,
    ) -> WorkflowResult<()> {
        self.mutate(|graph| graph.associate_resource(resource, object))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn resource_type(&self, type_name: &str) -> WorkflowResult<Arc<ResourceType>> {
        self.read(|graph| graph.resource_type(type_name).cloned())
    }

    pub fn operation(&self, name: &str) -> WorkflowResult<RenderOperation> {
        self.read(|graph| {
            let id = graph.operation_id(name)?;
            Ok(graph.operation(id).clone())
        })
    }

    pub fn resource(&self, name: &str) -> WorkflowResult<WorkflowResource> {
        self.read(|graph| {
            let id = graph.resource_id(name)?;
            Ok(graph.resource(id).clone())
        })
    }

    /// Operation names in registration order.
    pub fn operation_names(&self) -> Vec<String> {
        self.read(|graph| graph.operations().map(|(_, op)| op.name.clone()).collect())
    }

    /// Resource names in declaration order.
    pub fn resource_names(&self) -> Vec<String> {
        self.read(|graph| graph.resources().map(|(_, res)| res.name.clone()).collect())
    }

    pub fn scene_node(&self, operation: &str) -> WorkflowResult<Option<SceneNode>> {
        self.operation(operation).map(|op| op.scene_node)
    }

    pub fn associated_resource(&self, resource: &str) -> Option<AssociatedResource> {
        self.read(|graph| graph.associated_resource(resource))
    }

    /// Associated object downcast to a concrete type.
    pub fn associated_resource_as<T: Any + Send + Sync>(&self, resource: &str) -> Option<Arc<T>> {
        self.associated_resource(resource)
            .and_then(|object| object.downcast::<T>().ok())
    }

    /// Transitions of an operation whose type is in `kinds`.
    pub fn operation_io(
        &self,
        operation: &str,
        kinds: TransitionKinds,
    ) -> WorkflowResult<Vec<ResourceTransition>> {
        self.read(|graph| {
            let id = graph.operation_id(operation)?;
            Ok(graph.operation_io(id, kinds).cloned().collect())
        })
    }

    /// Transitions of a resource whose type is in `kinds`.
    pub fn resource_io(
        &self,
        resource: &str,
        kinds: TransitionKinds,
    ) -> WorkflowResult<Vec<ResourceTransition>> {
        self.read(|graph| {
            let id = graph.resource_id(resource)?;
            Ok(graph.resource_io(id, kinds).cloned().collect())
        })
    }

    pub fn previous_operations(&self, operation: &str) -> WorkflowResult<Vec<String>> {
        self.read(|graph| {
            let id = graph.operation_id(operation)?;
            Ok(names(graph, graph.previous_operations(id)))
        })
    }

    pub fn next_operations(&self, operation: &str) -> WorkflowResult<Vec<String>> {
        self.read(|graph| {
            let id = graph.operation_id(operation)?;
            Ok(names(graph, graph.next_operations(id)))
        })
    }

    pub fn initial_operations(&self) -> Vec<String> {
        self.read(|graph| names(graph, graph.initial_operations()))
    }

    pub fn final_operations(&self) -> Vec<String> {
        self.read(|graph| names(graph, graph.final_operations()))
    }

    /// Copy of the current graph.
    pub fn graph(&self) -> WorkflowGraph {
        self.read(WorkflowGraph::clone)
    }

    // ------------------------------------------------------------------
    // Compilation
    // ------------------------------------------------------------------

    /// True when the published output matches the current graph.
    pub fn is_valid(&self) -> bool {
        self.state.lock().valid
    }

    /// Last successfully compiled output.
    pub fn sequences(&self) -> Option<Arc<WorkflowSequences>> {
        self.sequences.read().clone()
    }

    /// Compile the workflow unless the published output is still valid.
    ///
    /// On failure the previously published output stays in place.
    pub fn compile(&self, compiler: &dyn WorkflowCompiler) -> WorkflowResult<Arc<WorkflowSequences>> {
        let _compiling = self.compile_lock.lock();

        let (snapshot, generation) = {
            let state = self.state.lock();
            if state.valid {
                if let Some(sequences) = self.sequences.read().clone() {
                    return Ok(sequences);
                }
            }
            (state.graph.clone(), state.generation)
        };

        let sequences = Arc::new(compiler.compile(&snapshot, &self.queue_traits)?);
        *self.sequences.write() = Some(sequences.clone());

        let mut state = self.state.lock();
        if state.generation == generation {
            state.valid = true;
        } else {
            log::debug!(
                "RenderWorkflow {} : graph changed during compilation, output is stale",
                self.name
            );
        }
        Ok(sequences)
    }
}

fn names(
    graph: &WorkflowGraph,
    ids: impl IntoIterator<Item = OperationId>,
) -> Vec<String> {
    ids.into_iter()
        .map(|id| graph.operation(id).name.clone())
        .collect()
}
