//! Render pass and compute pass synthesis.
//!
//! Scheduled operations are grouped into commands: maximal runs of graphics
//! operations sharing a tag become one render pass with a subpass per
//! operation, every compute operation becomes a compute pass. Each command is
//! then filled in while walking the schedule, carrying the current layout of
//! every frame buffer image from one command to the next.

use std::collections::{BTreeSet, HashMap, HashSet};

use ash::vk;

use super::cost::CostCalculator;
use super::resources::ResourceAllocation;
use super::sync::{
    attachment_usage, dependency_masks, destination_stage_or_bottom, source_stage_or_top,
    ALL_ATTACHMENT_ACCESS,
};
use crate::sequences::{
    AttachmentDefinition, AttachmentReference, ComputePassDescription, ImageLayoutTransition,
    PipelineBarrier, RenderCommand, RenderPassDescription, SubpassDefinition, SubpassDependency,
};
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::operation::{OperationId, OperationKind};
use crate::workflow::resource::ResourceId;
use crate::workflow::resource_type::AttachmentType;
use crate::workflow::transition::{
    ClearValue, LoadOp, ResourceTransition, StoreOp, TransitionKinds,
};

/// Consecutive scheduled operations recorded by one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationGroup {
    pub tag: u32,
    pub kind: OperationKind,
    pub operations: Vec<OperationId>,
}

/// Split a schedule into render pass and compute pass groups.
pub fn group_operations(
    graph: &WorkflowGraph,
    schedule: &[OperationId],
    cost: &CostCalculator,
) -> Vec<OperationGroup> {
    let mut groups: Vec<OperationGroup> = Vec::new();
    for &operation in schedule {
        let kind = graph.operation(operation).kind;
        let tag = cost.tag(operation);
        match groups.last_mut() {
            Some(group)
                if kind == OperationKind::Graphics
                    && group.kind == OperationKind::Graphics
                    && group.tag == tag =>
            {
                group.operations.push(operation);
            }
            _ => groups.push(OperationGroup {
                tag,
                kind,
                operations: vec![operation],
            }),
        }
    }
    groups
}

/// Commands of one queue plus the frame buffer facts gathered while building them.
#[derive(Debug, Clone)]
pub struct CommandSynthesis {
    pub commands: Vec<RenderCommand>,
    /// Accumulated usage of every frame buffer image.
    pub usage: Vec<vk::ImageUsageFlags>,
    pub initial_layouts: Vec<vk::ImageLayout>,
    /// Index of the last render pass writing the surface.
    pub output_render_pass: Option<usize>,
}

/// Build every command of a schedule.
pub fn synthesize_commands(
    graph: &WorkflowGraph,
    schedule: &[OperationId],
    cost: &CostCalculator,
    allocation: &ResourceAllocation,
) -> CommandSynthesis {
    let mut builder = CommandBuilder::new(graph, schedule, allocation);
    let initial_layouts = builder.last_layout.clone();

    let mut commands = Vec::new();
    let mut output_render_pass = None;
    for group in group_operations(graph, schedule, cost) {
        let command = match group.kind {
            OperationKind::Graphics => {
                let pass = builder.render_pass(&group);
                if pass.outputs_surface {
                    output_render_pass = Some(commands.len());
                }
                RenderCommand::RenderPass(pass)
            }
            OperationKind::Compute => RenderCommand::ComputePass(builder.compute_pass(&group)),
        };
        commands.push(command);
    }

    CommandSynthesis {
        commands,
        usage: builder.usage,
        initial_layouts,
        output_render_pass,
    }
}

struct CommandBuilder<'a> {
    graph: &'a WorkflowGraph,
    schedule: &'a [OperationId],
    allocation: &'a ResourceAllocation,
    position: HashMap<OperationId, usize>,
    last_layout: Vec<vk::ImageLayout>,
    usage: Vec<vk::ImageUsageFlags>,
}

impl<'a> CommandBuilder<'a> {
    fn new(
        graph: &'a WorkflowGraph,
        schedule: &'a [OperationId],
        allocation: &'a ResourceAllocation,
    ) -> Self {
        let position = schedule
            .iter()
            .enumerate()
            .map(|(i, &op)| (op, i))
            .collect();
        let mut builder = Self {
            graph,
            schedule,
            allocation,
            position,
            last_layout: vec![vk::ImageLayout::UNDEFINED; allocation.frame_buffer_count()],
            usage: vec![vk::ImageUsageFlags::empty(); allocation.frame_buffer_count()],
        };
        builder.last_layout = builder.frame_start_layouts();
        builder
    }

    /// Transient images start undefined, persistent ones start in the layout
    /// they end the previous frame in.
    fn frame_start_layouts(&self) -> Vec<vk::ImageLayout> {
        let mut frame_end = self.last_layout.clone();
        for &operation in self.schedule {
            for transition in self.operation_attachments(operation) {
                if let (Some(fb), Some(layout)) =
                    (self.frame_buffer_index(transition.resource), transition.layout())
                {
                    frame_end[fb as usize] = layout;
                }
            }
        }

        self.allocation
            .frame_buffer_slots()
            .zip(frame_end)
            .map(|((_, slot), layout)| {
                if slot.resource_type.persistent {
                    layout
                } else {
                    vk::ImageLayout::UNDEFINED
                }
            })
            .collect()
    }

    /// Attachment transitions of an operation, inputs first.
    fn operation_attachments(
        &self,
        operation: OperationId,
    ) -> impl Iterator<Item = &'a ResourceTransition> {
        let graph = self.graph;
        graph
            .operation_io(operation, TransitionKinds::ATTACHMENT_INPUT)
            .chain(graph.operation_io(operation, TransitionKinds::ALL_ATTACHMENT_OUTPUTS))
    }

    fn frame_buffer_index(&self, resource: ResourceId) -> Option<u32> {
        self.allocation.frame_buffer_index(resource)
    }

    fn reference(&self, transition: &ResourceTransition) -> AttachmentReference {
        AttachmentReference::new(
            self.frame_buffer_index(transition.resource)
                .unwrap_or(vk::ATTACHMENT_UNUSED),
            transition.layout().unwrap_or(vk::ImageLayout::UNDEFINED),
        )
    }

    /// Inputs reading the image that `resource` replaces in an aliased slot.
    fn alias_readers(&self, resource: ResourceId) -> Vec<&'a ResourceTransition> {
        let graph = self.graph;
        self.allocation
            .aliased_predecessor(resource)
            .map(|previous| {
                graph
                    .resource_io(previous, TransitionKinds::ALL_INPUTS)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record that an attachment was used in `layout`.
    fn touch(&mut self, fb: u32, layout: vk::ImageLayout) {
        self.last_layout[fb as usize] = layout;
        self.usage[fb as usize] |= attachment_usage(layout);
    }

    fn subpass(&self, operation: OperationId) -> SubpassDefinition {
        let graph = self.graph;
        let op = graph.operation(operation);

        let input_attachments = graph
            .operation_io(operation, TransitionKinds::ATTACHMENT_INPUT)
            .map(|t| self.reference(t))
            .collect();

        let resolves: Vec<&ResourceTransition> = graph
            .operation_io(operation, TransitionKinds::ATTACHMENT_RESOLVE_OUTPUT)
            .collect();
        let mut color_attachments = Vec::new();
        let mut resolve_attachments = Vec::new();
        for output in graph.operation_io(operation, TransitionKinds::ATTACHMENT_OUTPUT) {
            color_attachments.push(self.reference(output));
            let resolve = resolves
                .iter()
                .find(|r| r.resolve_source() == Some(output.resource))
                .map_or(AttachmentReference::UNUSED, |r| self.reference(r));
            resolve_attachments.push(resolve);
        }

        let depth_stencil_attachment = graph
            .operation_io(operation, TransitionKinds::ATTACHMENT_DEPTH_OUTPUT)
            .next()
            .map_or(AttachmentReference::UNUSED, |t| self.reference(t));

        SubpassDefinition {
            operation: op.name.clone(),
            bind_point: op.bind_point(),
            contents: op.subpass_contents,
            input_attachments,
            color_attachments,
            resolve_attachments,
            depth_stencil_attachment,
            preserve_attachments: Vec::new(),
        }
    }

    fn render_pass(&mut self, group: &OperationGroup) -> RenderPassDescription {
        let graph = self.graph;
        let mut pass = RenderPassDescription::new(group.tag);
        let begin_layout = self.last_layout.clone();
        let mut first_load: Vec<Option<LoadOp>> = vec![None; self.last_layout.len()];
        let mut modified: HashMap<ResourceId, u32> = HashMap::new();
        let subpass_of: HashMap<OperationId, u32> = group
            .operations
            .iter()
            .enumerate()
            .map(|(index, &op)| (op, index as u32))
            .collect();

        for (subpass_index, &operation) in group.operations.iter().enumerate() {
            let subpass_index = subpass_index as u32;
            pass.operations.push(graph.operation(operation).name.clone());
            pass.subpasses.push(self.subpass(operation));

            for input in graph.operation_io(operation, TransitionKinds::ALL_INPUTS) {
                let src_subpass = modified
                    .get(&input.resource)
                    .copied()
                    .unwrap_or(vk::SUBPASS_EXTERNAL);
                let (src_stage, dst_stage, src_access, dst_access) =
                    dependency_masks(graph.producer(input.resource), input);
                let dependency = merge_dependency(&mut pass, src_subpass, subpass_index);
                dependency.src_stage_mask |= src_stage;
                dependency.dst_stage_mask |= dst_stage;
                dependency.src_access_mask |= src_access;
                dependency.dst_access_mask |= dst_access;

                if let Some(attachment) = input.attachment() {
                    dependency.dependency_flags |= vk::DependencyFlags::BY_REGION;
                    if let Some(fb) = self.frame_buffer_index(input.resource) {
                        self.touch(fb, attachment.layout);
                        first_load[fb as usize].get_or_insert(LoadOp::Load);
                    }
                }
            }

            for output in graph.operation_io(operation, TransitionKinds::ALL_OUTPUTS) {
                modified.insert(output.resource, subpass_index);
                let Some(attachment) = output.attachment() else {
                    continue;
                };

                // readers of the image previously held by this slot must finish before the write
                for reader in self.alias_readers(output.resource) {
                    let src_subpass = subpass_of
                        .get(&reader.operation)
                        .copied()
                        .filter(|&index| index < subpass_index)
                        .unwrap_or(vk::SUBPASS_EXTERNAL);
                    let (src_stage, dst_stage, src_access, dst_access) =
                        dependency_masks(Some(reader), output);
                    let dependency = merge_dependency(&mut pass, src_subpass, subpass_index);
                    dependency.src_stage_mask |= src_stage;
                    dependency.dst_stage_mask |= dst_stage;
                    dependency.src_access_mask |= src_access;
                    dependency.dst_access_mask |= dst_access;
                    dependency.dependency_flags |= vk::DependencyFlags::BY_REGION;
                }

                if let Some(fb) = self.frame_buffer_index(output.resource) {
                    self.touch(fb, attachment.layout);
                    first_load[fb as usize].get_or_insert(attachment.load);
                }
                if graph.resource(output.resource).resource_type.is_surface() {
                    pass.outputs_surface = true;
                }
            }
        }

        for dependency in &mut pass.dependencies {
            dependency.src_stage_mask = source_stage_or_top(dependency.src_stage_mask);
            dependency.dst_stage_mask = destination_stage_or_bottom(dependency.dst_stage_mask);
        }

        if pass.dependency(vk::SUBPASS_EXTERNAL, 0).is_none() {
            let mut intro = SubpassDependency::new(vk::SUBPASS_EXTERNAL, 0);
            intro.src_stage_mask = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
            intro.dst_stage_mask = vk::PipelineStageFlags::ALL_COMMANDS;
            pass.dependencies.push(intro);
        }

        // TODO: limit the outro to attachments read by later commands
        let last_subpass = group.operations.len().saturating_sub(1) as u32;
        let mut outro = SubpassDependency::new(last_subpass, vk::SUBPASS_EXTERNAL);
        outro.src_stage_mask = vk::PipelineStageFlags::ALL_COMMANDS;
        outro.dst_stage_mask = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
        outro.src_access_mask = ALL_ATTACHMENT_ACCESS;
        pass.dependencies.push(outro);

        fill_preserve_attachments(&mut pass.subpasses);

        let used_after = self.slots_used_after(group);
        for (fb, (slot_index, slot)) in self.allocation.frame_buffer_slots().enumerate() {
            let Some(description) = slot.resource_type.attachment_description() else {
                continue;
            };
            let attachment_type = description.attachment_type;
            let must_save = slot.resource_type.persistent
                || attachment_type == AttachmentType::Surface
                || used_after.contains(&slot_index);

            // untouched images that must survive the pass are carried through it
            let load = first_load[fb].unwrap_or(if must_save {
                LoadOp::Load
            } else {
                LoadOp::DontCare
            });
            let color_depth = attachment_type.has_color_or_depth();
            let stencil = attachment_type.has_stencil();
            let (load_op, store_op) = load_store(color_depth, load, must_save);
            let (stencil_load_op, stencil_store_op) = load_store(stencil, load, must_save);

            pass.attachments.push(AttachmentDefinition {
                frame_buffer_index: fb as u32,
                format: description.format,
                samples: description.samples,
                load_op,
                store_op,
                stencil_load_op,
                stencil_store_op,
                initial_layout: begin_layout[fb],
                final_layout: self.last_layout[fb],
            });

            let value = load.clear_value();
            pass.clear_values.push(if attachment_type.is_depth_stencil() {
                ClearValue::DepthStencil {
                    depth: value.x,
                    stencil: value.y as u32,
                }
            } else {
                ClearValue::Color(value)
            });
        }

        log::debug!(
            "RenderWorkflow : render pass [{}] with {} subpasses, {} dependencies",
            pass.operations.join(", "),
            pass.subpasses.len(),
            pass.dependencies.len()
        );
        pass
    }

    /// Slots holding a resource read by an operation scheduled after `group`.
    fn slots_used_after(&self, group: &OperationGroup) -> HashSet<usize> {
        let last = group
            .operations
            .iter()
            .filter_map(|op| self.position.get(op).copied())
            .max()
            .unwrap_or_default();
        self.schedule
            .iter()
            .skip(last + 1)
            .flat_map(|&op| self.graph.operation_io(op, TransitionKinds::ALL_INPUTS))
            .filter_map(|t| self.allocation.slot(t.resource))
            .collect()
    }

    fn compute_pass(&mut self, group: &OperationGroup) -> ComputePassDescription {
        let graph = self.graph;
        let mut barriers = Vec::new();

        for &operation in &group.operations {
            let position = self.position.get(&operation).copied().unwrap_or_default();

            for input in graph.operation_io(operation, TransitionKinds::ALL_INPUTS) {
                let fb = self.frame_buffer_index(input.resource);
                let old_layout = fb.map(|fb| self.last_layout[fb as usize]);
                if let (Some(fb), Some(layout)) = (fb, input.layout()) {
                    self.touch(fb, layout);
                }

                let Some(generating) = graph.producer(input.resource) else {
                    continue;
                };
                let produced_earlier = self
                    .position
                    .get(&generating.operation)
                    .map_or(false, |&p| p < position);
                if !produced_earlier {
                    continue;
                }

                let (src_stage, dst_stage, src_access, dst_access) =
                    dependency_masks(Some(generating), input);
                let resource = graph.resource(input.resource);
                let image = match (fb, old_layout, input.layout()) {
                    (Some(fb), Some(old_layout), Some(new_layout)) => Some(ImageLayoutTransition {
                        frame_buffer_index: fb,
                        aspect_mask: resource
                            .resource_type
                            .attachment_type()
                            .map(|t| t.aspect_mask())
                            .unwrap_or_default(),
                        old_layout,
                        new_layout,
                    }),
                    _ => None,
                };
                barriers.push(PipelineBarrier {
                    resource: resource.name.clone(),
                    src_stage_mask: source_stage_or_top(src_stage),
                    dst_stage_mask: destination_stage_or_bottom(dst_stage),
                    src_access_mask: src_access,
                    dst_access_mask: dst_access,
                    image,
                });
            }

            for output in graph.operation_io(operation, TransitionKinds::ALL_ATTACHMENT_OUTPUTS) {
                let fb = self.frame_buffer_index(output.resource);
                let old_layout = fb.map(|fb| self.last_layout[fb as usize]);
                for reader in self.alias_readers(output.resource) {
                    let (src_stage, dst_stage, src_access, dst_access) =
                        dependency_masks(Some(reader), output);
                    let resource = graph.resource(output.resource);
                    let image = match (fb, old_layout, output.layout()) {
                        (Some(fb), Some(old_layout), Some(new_layout)) => {
                            Some(ImageLayoutTransition {
                                frame_buffer_index: fb,
                                aspect_mask: resource
                                    .resource_type
                                    .attachment_type()
                                    .map(|t| t.aspect_mask())
                                    .unwrap_or_default(),
                                old_layout,
                                new_layout,
                            })
                        }
                        _ => None,
                    };
                    barriers.push(PipelineBarrier {
                        resource: resource.name.clone(),
                        src_stage_mask: source_stage_or_top(src_stage),
                        dst_stage_mask: destination_stage_or_bottom(dst_stage),
                        src_access_mask: src_access,
                        dst_access_mask: dst_access,
                        image,
                    });
                }
                if let (Some(fb), Some(layout)) = (fb, output.layout()) {
                    self.touch(fb, layout);
                }
            }
        }

        let operation = group
            .operations
            .first()
            .map(|&op| graph.operation(op).name.clone())
            .unwrap_or_default();
        log::debug!(
            "RenderWorkflow : compute pass {} with {} barriers",
            operation,
            barriers.len()
        );
        ComputePassDescription {
            tag: group.tag,
            operation,
            barriers,
        }
    }
}

fn load_store(
    applies: bool,
    load: LoadOp,
    must_save: bool,
) -> (vk::AttachmentLoadOp, vk::AttachmentStoreOp) {
    if !applies {
        return (
            vk::AttachmentLoadOp::DONT_CARE,
            vk::AttachmentStoreOp::DONT_CARE,
        );
    }
    let store = if must_save {
        StoreOp::Store
    } else {
        StoreOp::DontCare
    };
    (load.to_vk(), store.to_vk())
}

/// Dependency between two subpasses of `pass`, created empty on first use.
fn merge_dependency(
    pass: &mut RenderPassDescription,
    src_subpass: u32,
    dst_subpass: u32,
) -> &mut SubpassDependency {
    let index = match pass
        .dependencies
        .iter()
        .position(|d| d.src_subpass == src_subpass && d.dst_subpass == dst_subpass)
    {
        Some(index) => index,
        None => {
            pass.dependencies
                .push(SubpassDependency::new(src_subpass, dst_subpass));
            pass.dependencies.len() - 1
        }
    };
    &mut pass.dependencies[index]
}

/// Preserve attachments referenced both before and after a subpass that does
/// not reference them itself.
fn fill_preserve_attachments(subpasses: &mut [SubpassDefinition]) {
    let referenced: Vec<BTreeSet<u32>> = subpasses
        .iter()
        .map(|subpass| {
            subpass
                .input_attachments
                .iter()
                .chain(&subpass.color_attachments)
                .chain(&subpass.resolve_attachments)
                .chain(std::iter::once(&subpass.depth_stencil_attachment))
                .filter(|r| !r.is_unused())
                .map(|r| r.attachment)
                .collect()
        })
        .collect();

    for (i, subpass) in subpasses.iter_mut().enumerate() {
        let before: BTreeSet<u32> = referenced[..i].iter().flatten().copied().collect();
        let after: BTreeSet<u32> = referenced[i + 1..].iter().flatten().copied().collect();
        subpass.preserve_attachments = before
            .intersection(&after)
            .filter(|fb| !referenced[i].contains(fb))
            .copied()
            .collect();
    }
}
