//! Workflow compilation.
//!
//! A [`WorkflowCompiler`] turns a [`WorkflowGraph`] snapshot into
//! [`WorkflowSequences`]. [`SingleQueueCompiler`] runs every operation on one
//! queue:
//!
//! 1. verify attachment sizes, producers and acyclicity
//! 2. tag operations by attachment geometry
//! 3. schedule with the fewest tag switches
//! 4. assign physical slots, aliasing transient attachments
//! 5. group into render passes and compute passes
//! 6. synthesize subpasses, dependencies, barriers and load/store ops
//! 7. assemble frame buffer image definitions

pub mod cost;
pub mod render_pass;
pub mod resources;
pub mod schedule;
pub mod sync;

use std::collections::{BTreeSet, HashMap};

use crate::config::CompilerConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::sequences::{FrameBufferImageDefinition, QueueTraits, ResourceSlot, WorkflowSequences};
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::operation::OperationId;
use crate::workflow::transition::TransitionKinds;

pub use cost::CostCalculator;
pub use sync::attachment_usage;

/// Turns a workflow graph into executable sequences.
pub trait WorkflowCompiler: Send + Sync {
    fn compile(
        &self,
        graph: &WorkflowGraph,
        queue_traits: &[QueueTraits],
    ) -> WorkflowResult<WorkflowSequences>;
}

/// Compiler scheduling every operation on a single queue.
#[derive(Debug, Clone, Default)]
pub struct SingleQueueCompiler {
    config: CompilerConfig,
}

impl SingleQueueCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Check structural rules, collecting every violation.
    ///
    /// Returns the schedule computed for the cycle check so it is not searched twice.
    fn verify(
        &self,
        graph: &WorkflowGraph,
        cost: &CostCalculator,
    ) -> WorkflowResult<Vec<OperationId>> {
        let mut errors = Vec::new();

        for (id, operation) in graph.operations() {
            let mut sizes = graph
                .operation_io(id, TransitionKinds::ALL_ATTACHMENT_OUTPUTS)
                .filter_map(|t| graph.resource(t.resource).resource_type.attachment_size());
            if let Some(first) = sizes.next() {
                if sizes.any(|size| size != first) {
                    errors.push(format!(
                        "Operation <{}> : not all attachments have the same size",
                        operation.name
                    ));
                }
            }
        }

        for (id, resource) in graph.resources() {
            if graph.resource_io(id, TransitionKinds::ALL_OUTPUTS).count() > 1 {
                errors.push(format!(
                    "Resource <{}> : resource must have at most one output that generates it",
                    resource.name
                ));
            }
        }

        let schedule = schedule::schedule_operations(graph, cost, self.config.memoize_schedule);
        if schedule.len() < graph.operation_count() {
            let scheduled: BTreeSet<OperationId> = schedule.iter().copied().collect();
            for (id, operation) in graph.operations() {
                if !scheduled.contains(&id) {
                    errors.push(format!(
                        "Operation <{}> : operation is part of a dependency cycle",
                        operation.name
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(schedule)
        } else {
            Err(WorkflowError::WorkflowInvalid(errors))
        }
    }
}

impl WorkflowCompiler for SingleQueueCompiler {
    fn compile(
        &self,
        graph: &WorkflowGraph,
        queue_traits: &[QueueTraits],
    ) -> WorkflowResult<WorkflowSequences> {
        let cost = CostCalculator::tag_operations(graph, self.config.tag_switch_cost);
        let schedule = self.verify(graph, &cost)?;

        let operation_names: Vec<String> = schedule
            .iter()
            .map(|&id| graph.operation(id).name.clone())
            .collect();
        log::debug!("RenderWorkflow : schedule [{}]", operation_names.join(", "));

        let operation_tags: HashMap<String, u32> = graph
            .operations()
            .map(|(id, op)| (op.name.clone(), cost.tag(id)))
            .collect();
        log::debug!("RenderWorkflow : operation tags {:?}", operation_tags);

        let allocation = resources::collect_resources(graph, &schedule);
        let synthesis = render_pass::synthesize_commands(graph, &schedule, &cost, &allocation);

        let mut resource_index = HashMap::new();
        let mut attachment_index = HashMap::new();
        let resource_slots: Vec<ResourceSlot> = allocation
            .slots
            .iter()
            .enumerate()
            .map(|(slot_index, slot)| {
                let resources: Vec<String> = slot
                    .resources
                    .iter()
                    .map(|&r| graph.resource(r).name.clone())
                    .collect();
                for name in &resources {
                    resource_index.insert(name.clone(), slot_index);
                    if let Some(fb) = slot.frame_buffer_index {
                        attachment_index.insert(name.clone(), fb);
                    }
                }
                ResourceSlot {
                    type_name: slot.resource_type.type_name.clone(),
                    resources,
                    frame_buffer_index: slot.frame_buffer_index,
                }
            })
            .collect();

        let frame_buffer_images: Vec<FrameBufferImageDefinition> = allocation
            .frame_buffer_slots()
            .zip(&synthesis.usage)
            .filter_map(|((_, slot), &usage)| {
                let description = slot.resource_type.attachment_description()?;
                let name = slot
                    .resources
                    .first()
                    .map(|&r| graph.resource(r).name.clone())
                    .unwrap_or_default();
                Some(FrameBufferImageDefinition {
                    name,
                    type_name: slot.resource_type.type_name.clone(),
                    attachment_type: description.attachment_type,
                    format: description.format,
                    samples: description.samples,
                    usage,
                    aspect_mask: description.attachment_type.aspect_mask(),
                    size: description.size,
                    swizzle: description.swizzle,
                    persistent: slot.resource_type.persistent,
                })
            })
            .collect();

        let presentation_queue_index = synthesis
            .output_render_pass
            .filter(|_| !queue_traits.is_empty())
            .map(|_| 0);

        log::info!(
            "RenderWorkflow : compiled {} operations into {} commands, {} resource slots, {} frame buffer images",
            schedule.len(),
            synthesis.commands.len(),
            resource_slots.len(),
            frame_buffer_images.len()
        );

        Ok(WorkflowSequences {
            queue_traits: queue_traits.to_vec(),
            commands: vec![synthesis.commands],
            operation_order: vec![operation_names],
            operation_tags,
            resource_slots,
            resource_index,
            attachment_index,
            frame_buffer_images,
            initial_image_layouts: synthesis.initial_layouts,
            output_render_pass: synthesis.output_render_pass,
            presentation_queue_index,
        })
    }
}
