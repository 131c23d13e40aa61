//! Common utilities for workflow compilation tests.
//!
//! Resource type factories and small workflow builders shared by the
//! integration tests.

#![allow(dead_code)]

use ash::vk;

use render_workflow::{
    AttachmentSize, AttachmentType, BufferKind, LoadOp, QueueTraits, RenderOperation,
    RenderWorkflow, ResourceType, WorkflowSequences,
};

pub const COLOR_LAYOUT: vk::ImageLayout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
pub const DEPTH_LAYOUT: vk::ImageLayout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
pub const READ_LAYOUT: vk::ImageLayout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;

/// Install a test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn new_workflow(name: &str) -> RenderWorkflow {
    init_logging();
    RenderWorkflow::new(name, vec![QueueTraits::graphics()])
}

// ============================================================================
// Resource types
// ============================================================================

pub fn color_type(name: &str, size: AttachmentSize) -> ResourceType {
    ResourceType::attachment(
        name,
        false,
        vk::Format::R8G8B8A8_UNORM,
        vk::SampleCountFlags::TYPE_1,
        AttachmentType::Color,
        size,
    )
}

pub fn depth_type(name: &str, size: AttachmentSize) -> ResourceType {
    ResourceType::attachment(
        name,
        false,
        vk::Format::D32_SFLOAT,
        vk::SampleCountFlags::TYPE_1,
        AttachmentType::Depth,
        size,
    )
}

pub fn surface_type() -> ResourceType {
    ResourceType::attachment(
        "surface",
        true,
        vk::Format::B8G8R8A8_SRGB,
        vk::SampleCountFlags::TYPE_1,
        AttachmentType::Surface,
        AttachmentSize::full_surface(),
    )
}

pub fn storage_buffer_type(name: &str) -> ResourceType {
    ResourceType::buffer(name, false, BufferKind::Storage)
}

// ============================================================================
// Workflow builders
// ============================================================================

/// Shadow pass rendering a 2048x2048 depth map read by the main pass.
pub fn shadow_workflow() -> RenderWorkflow {
    let workflow = new_workflow("shadow");
    workflow.add_resource_type(depth_type(
        "shadow_map",
        AttachmentSize::absolute(2048.0, 2048.0),
    ));
    workflow.add_resource_type(color_type("color", AttachmentSize::full_surface()));
    workflow.add_render_operation(RenderOperation::graphics("Shadow"));
    workflow.add_render_operation(RenderOperation::graphics("Main"));

    workflow
        .add_attachment_depth_output(
            "Shadow",
            "shadow_map",
            "shadowmap",
            DEPTH_LAYOUT,
            LoadOp::clear_depth(1.0, 0.0),
        )
        .unwrap();
    workflow
        .add_attachment_input("Main", "shadow_map", "shadowmap", READ_LAYOUT)
        .unwrap();
    workflow
        .add_attachment_output(
            "Main",
            "color",
            "color",
            COLOR_LAYOUT,
            LoadOp::clear_color(0.0, 0.0, 0.0, 1.0),
        )
        .unwrap();
    workflow
}

/// Chain of `length` full screen passes, each reading the previous pass's image.
pub fn chain_workflow(length: usize) -> RenderWorkflow {
    let workflow = new_workflow("chain");
    workflow.add_resource_type(color_type("hdr", AttachmentSize::full_surface()));
    for i in 0..length {
        workflow.add_render_operation(RenderOperation::graphics(format!("pass_{i}")));
    }
    for i in 0..length {
        let op = format!("pass_{i}");
        if i > 0 {
            workflow
                .add_attachment_input(&op, "hdr", &format!("image_{}", i - 1), READ_LAYOUT)
                .unwrap();
        }
        workflow
            .add_attachment_output(&op, "hdr", &format!("image_{i}"), COLOR_LAYOUT, LoadOp::DontCare)
            .unwrap();
    }
    workflow
}

/// Deferred renderer with a compute culling pass and a final surface pass.
pub fn deferred_workflow() -> RenderWorkflow {
    let workflow = new_workflow("deferred");
    workflow.add_resource_type(color_type("gbuffer", AttachmentSize::full_surface()));
    workflow.add_resource_type(depth_type("depth", AttachmentSize::full_surface()));
    workflow.add_resource_type(storage_buffer_type("lights"));
    workflow.add_resource_type(surface_type());

    workflow.add_render_operation(RenderOperation::compute("cull_lights"));
    workflow.add_render_operation(RenderOperation::graphics("gbuffer"));
    workflow.add_render_operation(RenderOperation::graphics("lighting"));

    workflow
        .add_buffer_output(
            "cull_lights",
            "lights",
            "visible_lights",
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_WRITE,
        )
        .unwrap();
    workflow
        .add_attachment_output(
            "gbuffer",
            "gbuffer",
            "albedo",
            COLOR_LAYOUT,
            LoadOp::clear_color(0.0, 0.0, 0.0, 0.0),
        )
        .unwrap();
    workflow
        .add_attachment_depth_output(
            "gbuffer",
            "depth",
            "depth",
            DEPTH_LAYOUT,
            LoadOp::clear_depth(1.0, 0.0),
        )
        .unwrap();
    workflow
        .add_attachment_input("lighting", "gbuffer", "albedo", READ_LAYOUT)
        .unwrap();
    workflow
        .add_buffer_input(
            "lighting",
            "lights",
            "visible_lights",
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        )
        .unwrap();
    workflow
        .add_attachment_output(
            "lighting",
            "surface",
            "swapchain",
            COLOR_LAYOUT,
            LoadOp::clear_color(0.0, 0.0, 0.0, 1.0),
        )
        .unwrap();
    workflow
}

/// Position of an operation in the single queue schedule.
pub fn position(sequences: &WorkflowSequences, operation: &str) -> usize {
    sequences
        .operation_position(operation)
        .map(|(_, position)| position)
        .unwrap_or_else(|| panic!("operation {operation} was not scheduled"))
}
