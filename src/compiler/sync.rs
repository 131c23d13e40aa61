//! Pipeline stage and access mask lookup.

use ash::vk;

use crate::workflow::transition::{ResourceTransition, TransitionPayload};

/// Stages able to read a shader-read-only image.
const SHADER_STAGES: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::VERTEX_SHADER.as_raw()
        | vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER.as_raw()
        | vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER.as_raw()
        | vk::PipelineStageFlags::GEOMETRY_SHADER.as_raw()
        | vk::PipelineStageFlags::FRAGMENT_SHADER.as_raw()
        | vk::PipelineStageFlags::COMPUTE_SHADER.as_raw(),
);

const FRAGMENT_TESTS: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw(),
);

/// Access mask of the outro dependency closing every render pass.
pub const ALL_ATTACHMENT_ACCESS: vk::AccessFlags = vk::AccessFlags::from_raw(
    vk::AccessFlags::INPUT_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags::COLOR_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
);

/// Stage and access masks of an image used in `layout`.
pub fn layout_stage_access(layout: vk::ImageLayout) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => (
            FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (SHADER_STAGES, vk::AccessFlags::SHADER_READ),
        _ => (vk::PipelineStageFlags::empty(), vk::AccessFlags::empty()),
    }
}

/// Stage and access masks of a single transition.
///
/// Attachments are looked up by layout, buffers carry their own masks.
pub fn transition_stage_access(
    transition: &ResourceTransition,
) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match &transition.payload {
        TransitionPayload::Attachment(attachment) => layout_stage_access(attachment.layout),
        TransitionPayload::Buffer(buffer) => (buffer.pipeline_stage, buffer.access),
    }
}

/// Masks of a dependency from `generating` to `consuming`.
///
/// Returns `(src_stage, dst_stage, src_access, dst_access)`. A missing
/// generating transition contributes empty source masks.
pub fn dependency_masks(
    generating: Option<&ResourceTransition>,
    consuming: &ResourceTransition,
) -> (
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
    vk::AccessFlags,
    vk::AccessFlags,
) {
    let (src_stage, src_access) = generating
        .map(transition_stage_access)
        .unwrap_or((vk::PipelineStageFlags::empty(), vk::AccessFlags::empty()));
    let (dst_stage, dst_access) = transition_stage_access(consuming);
    (src_stage, dst_stage, src_access, dst_access)
}

/// Replace an empty source stage mask with `TOP_OF_PIPE`.
pub fn source_stage_or_top(stage: vk::PipelineStageFlags) -> vk::PipelineStageFlags {
    if stage.is_empty() {
        vk::PipelineStageFlags::TOP_OF_PIPE
    } else {
        stage
    }
}

/// Replace an empty destination stage mask with `BOTTOM_OF_PIPE`.
pub fn destination_stage_or_bottom(stage: vk::PipelineStageFlags) -> vk::PipelineStageFlags {
    if stage.is_empty() {
        vk::PipelineStageFlags::BOTTOM_OF_PIPE
    } else {
        stage
    }
}

/// Image usage implied by using an image in `layout`.
pub fn attachment_usage(layout: vk::ImageLayout) -> vk::ImageUsageFlags {
    match layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        | vk::ImageLayout::PRESENT_SRC_KHR
        | vk::ImageLayout::SHARED_PRESENT_KHR => vk::ImageUsageFlags::COLOR_ATTACHMENT,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        }
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        | vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => vk::ImageUsageFlags::INPUT_ATTACHMENT,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => vk::ImageUsageFlags::TRANSFER_SRC,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => vk::ImageUsageFlags::TRANSFER_DST,
        _ => vk::ImageUsageFlags::empty(),
    }
}
