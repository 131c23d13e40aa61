//! Compiled workflow output.
//!
//! Everything here is a plain description: render pass layouts, subpass
//! dependencies, barriers and frame buffer image definitions. Command buffer
//! recording and Vulkan object creation consume these descriptions; the
//! compiler never touches a device.

use std::collections::HashMap;

use ash::vk;

use crate::workflow::resource_type::{AttachmentSize, AttachmentType, Swizzle};
use crate::workflow::transition::ClearValue;

/// Capabilities requested from a hardware queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueTraits {
    pub flags: vk::QueueFlags,
    pub priority: f32,
}

impl QueueTraits {
    pub fn new(flags: vk::QueueFlags, priority: f32) -> Self {
        Self { flags, priority }
    }

    /// Graphics and compute capable queue with a priority of 0.75.
    pub fn graphics() -> Self {
        Self::new(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 0.75)
    }
}

impl Default for QueueTraits {
    fn default() -> Self {
        Self::graphics()
    }
}

/// Reference from a subpass to a frame buffer attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: vk::ImageLayout,
}

impl AttachmentReference {
    /// Placeholder for an absent attachment.
    pub const UNUSED: Self = Self {
        attachment: vk::ATTACHMENT_UNUSED,
        layout: vk::ImageLayout::UNDEFINED,
    };

    pub fn new(attachment: u32, layout: vk::ImageLayout) -> Self {
        Self { attachment, layout }
    }

    pub fn is_unused(&self) -> bool {
        self.attachment == vk::ATTACHMENT_UNUSED
    }

    pub fn to_vk(self) -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: self.attachment,
            layout: self.layout,
        }
    }
}

/// One operation's slice of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SubpassDefinition {
    pub operation: String,
    pub bind_point: vk::PipelineBindPoint,
    pub contents: vk::SubpassContents,
    pub input_attachments: Vec<AttachmentReference>,
    pub color_attachments: Vec<AttachmentReference>,
    /// One entry per color attachment, [`AttachmentReference::UNUSED`] when not resolved.
    pub resolve_attachments: Vec<AttachmentReference>,
    pub depth_stencil_attachment: AttachmentReference,
    pub preserve_attachments: Vec<u32>,
}

impl SubpassDefinition {
    /// True when at least one color attachment is resolved.
    pub fn has_resolve(&self) -> bool {
        self.resolve_attachments.iter().any(|r| !r.is_unused())
    }

    pub fn has_depth_stencil(&self) -> bool {
        !self.depth_stencil_attachment.is_unused()
    }
}

/// Execution and memory dependency between two subpasses of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stage_mask: vk::PipelineStageFlags,
    pub dst_stage_mask: vk::PipelineStageFlags,
    pub src_access_mask: vk::AccessFlags,
    pub dst_access_mask: vk::AccessFlags,
    pub dependency_flags: vk::DependencyFlags,
}

impl SubpassDependency {
    /// Dependency with empty masks.
    pub fn new(src_subpass: u32, dst_subpass: u32) -> Self {
        Self {
            src_subpass,
            dst_subpass,
            src_stage_mask: vk::PipelineStageFlags::empty(),
            dst_stage_mask: vk::PipelineStageFlags::empty(),
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::empty(),
            dependency_flags: vk::DependencyFlags::empty(),
        }
    }

    pub fn is_external_source(&self) -> bool {
        self.src_subpass == vk::SUBPASS_EXTERNAL
    }

    pub fn is_external_destination(&self) -> bool {
        self.dst_subpass == vk::SUBPASS_EXTERNAL
    }

    pub fn to_vk(self) -> vk::SubpassDependency {
        vk::SubpassDependency {
            src_subpass: self.src_subpass,
            dst_subpass: self.dst_subpass,
            src_stage_mask: self.src_stage_mask,
            dst_stage_mask: self.dst_stage_mask,
            src_access_mask: self.src_access_mask,
            dst_access_mask: self.dst_access_mask,
            dependency_flags: self.dependency_flags,
        }
    }
}

/// Render pass attachment: one per frame buffer image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDefinition {
    pub frame_buffer_index: u32,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

impl AttachmentDefinition {
    pub fn to_vk(self) -> vk::AttachmentDescription {
        vk::AttachmentDescription {
            flags: vk::AttachmentDescriptionFlags::empty(),
            format: self.format,
            samples: self.samples,
            load_op: self.load_op,
            store_op: self.store_op,
            stencil_load_op: self.stencil_load_op,
            stencil_store_op: self.stencil_store_op,
            initial_layout: self.initial_layout,
            final_layout: self.final_layout,
        }
    }
}

/// Layout change carried by an image barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayoutTransition {
    pub frame_buffer_index: u32,
    pub aspect_mask: vk::ImageAspectFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

/// Barrier recorded before a compute pass for one of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineBarrier {
    pub resource: String,
    pub src_stage_mask: vk::PipelineStageFlags,
    pub dst_stage_mask: vk::PipelineStageFlags,
    pub src_access_mask: vk::AccessFlags,
    pub dst_access_mask: vk::AccessFlags,
    /// Present for attachment resources only.
    pub image: Option<ImageLayoutTransition>,
}

/// A render pass built from a run of graphics operations sharing a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDescription {
    pub tag: u32,
    pub operations: Vec<String>,
    pub subpasses: Vec<SubpassDefinition>,
    pub dependencies: Vec<SubpassDependency>,
    pub attachments: Vec<AttachmentDefinition>,
    /// One per attachment, indexed like `attachments`.
    pub clear_values: Vec<ClearValue>,
    /// True when an operation of this pass writes the presentable surface.
    pub outputs_surface: bool,
}

impl RenderPassDescription {
    pub(crate) fn new(tag: u32) -> Self {
        Self {
            tag,
            operations: Vec::new(),
            subpasses: Vec::new(),
            dependencies: Vec::new(),
            attachments: Vec::new(),
            clear_values: Vec::new(),
            outputs_surface: false,
        }
    }

    /// Find the dependency between two subpasses.
    pub fn dependency(&self, src_subpass: u32, dst_subpass: u32) -> Option<&SubpassDependency> {
        self.dependencies
            .iter()
            .find(|d| d.src_subpass == src_subpass && d.dst_subpass == dst_subpass)
    }

    pub fn attachment(&self, frame_buffer_index: u32) -> Option<&AttachmentDefinition> {
        self.attachments
            .iter()
            .find(|a| a.frame_buffer_index == frame_buffer_index)
    }
}

/// A standalone compute operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePassDescription {
    pub tag: u32,
    pub operation: String,
    pub barriers: Vec<PipelineBarrier>,
}

/// A single entry of a queue's command sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    RenderPass(RenderPassDescription),
    ComputePass(ComputePassDescription),
}

impl RenderCommand {
    /// Names of the operations recorded by this command, in execution order.
    pub fn operations(&self) -> Vec<&str> {
        match self {
            Self::RenderPass(pass) => pass.operations.iter().map(String::as_str).collect(),
            Self::ComputePass(pass) => vec![pass.operation.as_str()],
        }
    }

    pub fn tag(&self) -> u32 {
        match self {
            Self::RenderPass(pass) => pass.tag,
            Self::ComputePass(pass) => pass.tag,
        }
    }

    pub fn as_render_pass(&self) -> Option<&RenderPassDescription> {
        match self {
            Self::RenderPass(pass) => Some(pass),
            Self::ComputePass(_) => None,
        }
    }

    pub fn as_compute_pass(&self) -> Option<&ComputePassDescription> {
        match self {
            Self::ComputePass(pass) => Some(pass),
            Self::RenderPass(_) => None,
        }
    }
}

/// Everything needed to allocate one frame buffer image.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBufferImageDefinition {
    /// Name of the first resource mapped onto this image.
    pub name: String,
    pub type_name: String,
    pub attachment_type: AttachmentType,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    /// Union of the usages implied by every layout the image is used in.
    pub usage: vk::ImageUsageFlags,
    pub aspect_mask: vk::ImageAspectFlags,
    pub size: AttachmentSize,
    pub swizzle: Swizzle,
    pub persistent: bool,
}

/// A physical resource slot shared by resources with disjoint lifetimes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub type_name: String,
    /// Resources mapped onto this slot, in allocation order.
    pub resources: Vec<String>,
    /// Frame buffer image backing the slot, for attachment slots.
    pub frame_buffer_index: Option<u32>,
}

/// The compiled artifact of a workflow.
///
/// Immutable once produced; a recompilation replaces it as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSequences {
    pub queue_traits: Vec<QueueTraits>,
    /// One command sequence per queue.
    pub commands: Vec<Vec<RenderCommand>>,
    /// Scheduled operation names, one list per queue.
    pub operation_order: Vec<Vec<String>>,
    pub operation_tags: HashMap<String, u32>,
    pub resource_slots: Vec<ResourceSlot>,
    /// Resource name to index into `resource_slots`.
    pub resource_index: HashMap<String, usize>,
    /// Attachment resource name to frame buffer image index.
    pub attachment_index: HashMap<String, u32>,
    pub frame_buffer_images: Vec<FrameBufferImageDefinition>,
    /// Layout of each frame buffer image at the start of a frame.
    pub initial_image_layouts: Vec<vk::ImageLayout>,
    /// Index into the presentation queue's commands of the pass writing the surface.
    pub output_render_pass: Option<usize>,
    pub presentation_queue_index: Option<usize>,
}

impl WorkflowSequences {
    /// Traits of the queue presenting the surface.
    pub fn presentation_queue(&self) -> Option<&QueueTraits> {
        self.presentation_queue_index
            .and_then(|index| self.queue_traits.get(index))
    }

    /// The render pass writing the presentable surface.
    pub fn output_render_pass(&self) -> Option<&RenderPassDescription> {
        let queue = self.presentation_queue_index?;
        let index = self.output_render_pass?;
        self.commands.get(queue)?.get(index)?.as_render_pass()
    }

    pub fn render_passes(&self) -> impl Iterator<Item = &RenderPassDescription> {
        self.commands
            .iter()
            .flatten()
            .filter_map(RenderCommand::as_render_pass)
    }

    pub fn compute_passes(&self) -> impl Iterator<Item = &ComputePassDescription> {
        self.commands
            .iter()
            .flatten()
            .filter_map(RenderCommand::as_compute_pass)
    }

    /// Physical slot of a resource.
    pub fn resource_slot(&self, resource: &str) -> Option<usize> {
        self.resource_index.get(resource).copied()
    }

    /// Frame buffer image index of an attachment resource.
    pub fn frame_buffer_index(&self, resource: &str) -> Option<u32> {
        self.attachment_index.get(resource).copied()
    }

    /// Position of an operation in its queue's schedule.
    pub fn operation_position(&self, operation: &str) -> Option<(usize, usize)> {
        self.operation_order
            .iter()
            .enumerate()
            .find_map(|(queue, order)| {
                order
                    .iter()
                    .position(|name| name == operation)
                    .map(|position| (queue, position))
            })
    }
}
