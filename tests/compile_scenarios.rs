//! End to end compilation tests for render workflows.
//!
//! Each test declares a workflow through the public API, compiles it with
//! [`SingleQueueCompiler`] and inspects the produced sequences.
//!
//! # Test Categories
//!
//! - **Render Pass Tests**: pass splitting, dependencies, load/store ops
//! - **Validation Tests**: declaration and verification failures
//! - **Scheduling Tests**: ordering and tagging
//! - **Aliasing Tests**: frame buffer image reuse
//! - **Concurrency Tests**: shared compiled output

mod common;

use std::sync::Arc;

use ash::vk;
use rstest::rstest;

use common::{
    COLOR_LAYOUT, DEPTH_LAYOUT, READ_LAYOUT, chain_workflow, color_type, deferred_workflow,
    new_workflow, position, shadow_workflow, surface_type,
};
use render_workflow::{
    AttachmentSize, AttachmentType, LoadOp, QueueTraits, RenderCommand, RenderOperation,
    ResourceType, SingleQueueCompiler, WorkflowError,
};

// ============================================================================
// Render Pass Tests
// ============================================================================

/// A depth map rendered at a fixed size and sampled by a full screen pass.
///
/// This test verifies that:
/// 1. Different geometries end up in separate render passes
/// 2. The reading pass waits on depth writes before sampling
/// 3. The depth map is stored because a later pass reads it
#[test]
fn test_shadow_map_feeds_main_pass() {
    let workflow = shadow_workflow();
    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();

    assert_eq!(sequences.operation_order, vec![vec!["Shadow", "Main"]]);
    let passes: Vec<_> = sequences.render_passes().collect();
    assert_eq!(passes.len(), 2);
    assert_ne!(passes[0].tag, passes[1].tag);
    assert_eq!(passes[0].operations, vec!["Shadow"]);
    assert_eq!(passes[1].operations, vec!["Main"]);
    assert!(passes[0].subpasses[0].has_depth_stencil());
    assert!(!passes[1].subpasses[0].has_depth_stencil());

    let main = passes[1];
    let intro = main.dependency(vk::SUBPASS_EXTERNAL, 0).unwrap();
    assert!(intro.src_stage_mask.contains(
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
    ));
    assert!(intro
        .src_access_mask
        .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    assert!(intro
        .dst_stage_mask
        .contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
    assert!(intro.dst_access_mask.contains(vk::AccessFlags::SHADER_READ));
    assert!(intro
        .dependency_flags
        .contains(vk::DependencyFlags::BY_REGION));

    let shadowmap = sequences.frame_buffer_index("shadowmap").unwrap();
    let stored = passes[0].attachment(shadowmap).unwrap();
    assert_eq!(stored.load_op, vk::AttachmentLoadOp::CLEAR);
    assert_eq!(stored.store_op, vk::AttachmentStoreOp::STORE);
    assert_eq!(stored.final_layout, DEPTH_LAYOUT);

    let loaded = main.attachment(shadowmap).unwrap();
    assert_eq!(loaded.load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(loaded.initial_layout, DEPTH_LAYOUT);
    assert_eq!(loaded.final_layout, READ_LAYOUT);

    let image = &sequences.frame_buffer_images[shadowmap as usize];
    assert_eq!(image.attachment_type, AttachmentType::Depth);
    assert!(image.usage.contains(
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT
    ));
}

#[test]
fn test_single_surface_clear() {
    let workflow = new_workflow("clear");
    workflow.add_resource_type(surface_type());
    workflow.add_render_operation(RenderOperation::graphics("final"));
    workflow
        .add_attachment_output(
            "final",
            "surface",
            "swapchain",
            COLOR_LAYOUT,
            LoadOp::clear_color(0.2, 0.3, 0.4, 1.0),
        )
        .unwrap();

    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();

    assert_eq!(sequences.commands.len(), 1);
    assert_eq!(sequences.commands[0].len(), 1);
    let pass = sequences.output_render_pass().unwrap();
    assert!(pass.outputs_surface);
    assert_eq!(pass.subpasses.len(), 1);
    assert_eq!(pass.subpasses[0].color_attachments[0].attachment, 0);
    assert_eq!(pass.attachments.len(), 1);
    assert_eq!(pass.attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
    assert_eq!(pass.attachments[0].store_op, vk::AttachmentStoreOp::STORE);
    assert_eq!(
        sequences.presentation_queue(),
        Some(&QueueTraits::graphics())
    );
    assert_eq!(sequences.frame_buffer_images.len(), 1);
    assert_eq!(sequences.frame_buffer_images[0].name, "swapchain");
}

/// Deferred shading with a compute pass culling lights before the G-buffer.
///
/// This test verifies that:
/// 1. The compute operation is scheduled ahead of the graphics run
/// 2. Both graphics operations share one render pass
/// 3. The buffer produced by compute is waited on from outside the pass
#[test]
fn test_deferred_with_compute_culling() {
    let workflow = deferred_workflow();
    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();

    assert_eq!(
        sequences.operation_order,
        vec![vec!["cull_lights", "gbuffer", "lighting"]]
    );
    let commands = &sequences.commands[0];
    assert_eq!(commands.len(), 2);
    assert!(matches!(commands[0], RenderCommand::ComputePass(_)));
    assert_eq!(commands[0].operations(), vec!["cull_lights"]);
    assert!(commands[0].as_compute_pass().unwrap().barriers.is_empty());
    assert_eq!(sequences.compute_passes().count(), 1);

    let pass = commands[1].as_render_pass().unwrap();
    assert_eq!(pass.operations, vec!["gbuffer", "lighting"]);
    assert_eq!(sequences.output_render_pass, Some(1));

    let internal = pass.dependency(0, 1).unwrap();
    assert!(internal
        .src_access_mask
        .contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
    assert!(internal.dst_access_mask.contains(vk::AccessFlags::SHADER_READ));

    let from_compute = pass.dependency(vk::SUBPASS_EXTERNAL, 1).unwrap();
    assert!(from_compute
        .src_stage_mask
        .contains(vk::PipelineStageFlags::COMPUTE_SHADER));
    assert!(from_compute
        .src_access_mask
        .contains(vk::AccessFlags::SHADER_WRITE));

    // intro and outro
    assert!(pass.dependency(vk::SUBPASS_EXTERNAL, 0).is_some());
    assert!(pass.dependency(1, vk::SUBPASS_EXTERNAL).is_some());

    // buffers get a slot but no frame buffer image
    assert!(sequences.resource_slot("visible_lights").is_some());
    assert!(sequences.frame_buffer_index("visible_lights").is_none());
    assert_eq!(sequences.frame_buffer_images.len(), 3);
}

#[test]
fn test_msaa_resolve_into_surface() {
    let workflow = new_workflow("msaa");
    workflow.add_resource_type(ResourceType::attachment(
        "msaa_color",
        false,
        vk::Format::B8G8R8A8_SRGB,
        vk::SampleCountFlags::TYPE_4,
        AttachmentType::Color,
        AttachmentSize::full_surface(),
    ));
    workflow.add_resource_type(surface_type());
    workflow.add_render_operation(RenderOperation::graphics("scene"));
    workflow
        .add_attachment_output(
            "scene",
            "msaa_color",
            "multisampled",
            COLOR_LAYOUT,
            LoadOp::clear_color(0.0, 0.0, 0.0, 1.0),
        )
        .unwrap();
    workflow
        .add_attachment_resolve_output(
            "scene",
            "surface",
            "swapchain",
            "multisampled",
            COLOR_LAYOUT,
            LoadOp::DontCare,
        )
        .unwrap();

    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();
    let pass = sequences.output_render_pass().unwrap();
    let subpass = &pass.subpasses[0];

    let multisampled = sequences.frame_buffer_index("multisampled").unwrap();
    let swapchain = sequences.frame_buffer_index("swapchain").unwrap();
    assert!(subpass.has_resolve());
    assert_eq!(subpass.color_attachments[0].attachment, multisampled);
    assert_eq!(subpass.resolve_attachments[0].attachment, swapchain);
    assert_eq!(
        pass.attachment(multisampled).unwrap().samples,
        vk::SampleCountFlags::TYPE_4
    );
    assert_eq!(
        pass.attachment(swapchain).unwrap().store_op,
        vk::AttachmentStoreOp::STORE
    );
}

#[test]
fn test_unknown_resolve_source_rejected() {
    let workflow = new_workflow("msaa");
    workflow.add_resource_type(surface_type());
    workflow.add_render_operation(RenderOperation::graphics("scene"));

    let result = workflow.add_attachment_resolve_output(
        "scene",
        "surface",
        "swapchain",
        "missing",
        COLOR_LAYOUT,
        LoadOp::DontCare,
    );
    assert!(matches!(
        result,
        Err(WorkflowError::UnknownResolveTarget { .. })
    ));
}

/// An image written before a smaller pass and read after it.
///
/// This test verifies that:
/// 1. The middle pass keeps the image although none of its subpasses touch it
/// 2. The image keeps its layout across the middle pass
#[test]
fn test_middle_pass_keeps_untouched_image() {
    let workflow = new_workflow("interleaved");
    workflow.add_resource_type(color_type("color", AttachmentSize::full_surface()));
    workflow.add_resource_type(color_type("small", AttachmentSize::absolute(64.0, 64.0)));
    workflow.add_resource_type(surface_type());
    for name in ["scene", "downsample", "compose"] {
        workflow.add_render_operation(RenderOperation::graphics(name));
    }
    workflow
        .add_attachment_output(
            "scene",
            "color",
            "x",
            COLOR_LAYOUT,
            LoadOp::clear_color(0.0, 0.0, 0.0, 1.0),
        )
        .unwrap();
    workflow
        .add_attachment_output("scene", "color", "y1", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();
    workflow
        .add_attachment_input("downsample", "color", "y1", READ_LAYOUT)
        .unwrap();
    workflow
        .add_attachment_output("downsample", "small", "y2", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();
    workflow
        .add_attachment_input("compose", "color", "x", READ_LAYOUT)
        .unwrap();
    workflow
        .add_attachment_input("compose", "small", "y2", READ_LAYOUT)
        .unwrap();
    workflow
        .add_attachment_output("compose", "surface", "swapchain", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();

    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();
    assert_eq!(
        sequences.operation_order,
        vec![vec!["scene", "downsample", "compose"]]
    );
    let passes: Vec<_> = sequences.render_passes().collect();
    assert_eq!(passes.len(), 3);
    assert_eq!(passes[1].operations, vec!["downsample"]);

    let x = sequences.frame_buffer_index("x").unwrap();
    let kept = passes[1].attachment(x).unwrap();
    assert_eq!(kept.load_op, vk::AttachmentLoadOp::LOAD);
    assert_eq!(kept.store_op, vk::AttachmentStoreOp::STORE);
    assert_eq!(kept.initial_layout, COLOR_LAYOUT);
    assert_eq!(kept.final_layout, COLOR_LAYOUT);

    let read = passes[2].attachment(x).unwrap();
    assert_eq!(read.load_op, vk::AttachmentLoadOp::LOAD);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_unregistered_resource_type() {
    let workflow = new_workflow("broken");
    workflow.add_render_operation(RenderOperation::graphics("final"));

    let result = workflow.add_attachment_output(
        "final",
        "surface",
        "swapchain",
        COLOR_LAYOUT,
        LoadOp::DontCare,
    );
    match result {
        Err(WorkflowError::UnknownResourceType(name)) => assert_eq!(name, "surface"),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(workflow.resource_names().is_empty());
}

#[test]
fn test_mixed_sizes_and_duplicate_producers() {
    let workflow = new_workflow("invalid");
    workflow.add_resource_type(color_type("small", AttachmentSize::absolute(256.0, 256.0)));
    workflow.add_resource_type(color_type("large", AttachmentSize::full_surface()));
    workflow.add_render_operation(RenderOperation::graphics("mixed"));
    workflow.add_render_operation(RenderOperation::graphics("second_writer"));

    workflow
        .add_attachment_output("mixed", "small", "a", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();
    workflow
        .add_attachment_output("mixed", "large", "b", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();
    workflow
        .add_attachment_output("second_writer", "large", "b", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();

    let Err(WorkflowError::WorkflowInvalid(errors)) =
        workflow.compile(&SingleQueueCompiler::new())
    else {
        panic!("workflow should not compile");
    };
    assert!(errors
        .iter()
        .any(|e| e == "Operation <mixed> : not all attachments have the same size"));
    assert!(errors
        .iter()
        .any(|e| e == "Resource <b> : resource must have at most one output that generates it"));
    assert!(!workflow.is_valid());
    assert!(workflow.sequences().is_none());
}

#[test]
fn test_dependency_cycle_rejected() {
    let workflow = new_workflow("cycle");
    workflow.add_resource_type(color_type("color", AttachmentSize::full_surface()));
    workflow.add_render_operation(RenderOperation::graphics("ping"));
    workflow.add_render_operation(RenderOperation::graphics("pong"));
    workflow
        .add_attachment_input("ping", "color", "b", READ_LAYOUT)
        .unwrap();
    workflow
        .add_attachment_output("ping", "color", "a", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();
    workflow
        .add_attachment_input("pong", "color", "a", READ_LAYOUT)
        .unwrap();
    workflow
        .add_attachment_output("pong", "color", "b", COLOR_LAYOUT, LoadOp::DontCare)
        .unwrap();

    let result = workflow.compile(&SingleQueueCompiler::new());
    let Err(WorkflowError::WorkflowInvalid(errors)) = result else {
        panic!("cycle should be reported");
    };
    assert!(errors
        .iter()
        .any(|e| e.contains("operation is part of a dependency cycle")));
}

// ============================================================================
// Scheduling Tests
// ============================================================================

#[rstest]
#[case::shadow(shadow_workflow())]
#[case::chain(chain_workflow(6))]
#[case::deferred(deferred_workflow())]
fn test_schedule_respects_dependencies(#[case] workflow: render_workflow::RenderWorkflow) {
    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();

    assert_eq!(
        sequences.operation_order[0].len(),
        workflow.operation_names().len()
    );
    for operation in workflow.operation_names() {
        let own = position(&sequences, &operation);
        for previous in workflow.previous_operations(&operation).unwrap() {
            assert!(
                position(&sequences, &previous) < own,
                "{previous} must run before {operation}"
            );
        }
    }
}

#[test]
fn test_operation_tags() {
    let workflow = deferred_workflow();
    workflow.add_render_operation(RenderOperation::compute("histogram"));
    workflow
        .add_buffer_input(
            "histogram",
            "lights",
            "visible_lights",
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::AccessFlags::SHADER_READ,
        )
        .unwrap();

    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();
    let tags = &sequences.operation_tags;

    assert_eq!(tags["gbuffer"], tags["lighting"]);
    assert_ne!(tags["cull_lights"], tags["histogram"]);
    assert_ne!(tags["cull_lights"], tags["gbuffer"]);
    assert_ne!(tags["histogram"], tags["gbuffer"]);
}

// ============================================================================
// Aliasing Tests
// ============================================================================

/// Chains of full screen passes reuse images once their readers have run.
#[rstest]
#[case::single(1, 1)]
#[case::pair(2, 2)]
#[case::triple(3, 2)]
#[case::long(5, 2)]
fn test_chain_aliasing(#[case] length: usize, #[case] images: usize) {
    let workflow = chain_workflow(length);
    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();

    assert_eq!(sequences.frame_buffer_images.len(), images);
    assert_eq!(sequences.resource_slots.len(), images);
    if length >= 3 {
        assert_eq!(
            sequences.frame_buffer_index("image_0"),
            sequences.frame_buffer_index("image_2")
        );
    }
}

/// The pass writing an aliased image waits for the readers of the image it replaces.
#[test]
fn test_aliased_image_waits_for_previous_reader() {
    let workflow = chain_workflow(3);
    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();

    let pass = sequences.render_passes().next().unwrap();
    assert_eq!(pass.operations, vec!["pass_0", "pass_1", "pass_2"]);
    let dependency = pass.dependency(1, 2).unwrap();
    assert!(dependency
        .src_stage_mask
        .contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
    assert!(dependency.src_access_mask.contains(vk::AccessFlags::SHADER_READ));
    assert!(dependency
        .dst_stage_mask
        .contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT));
    assert!(dependency
        .dst_access_mask
        .contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
}

#[test]
fn test_persistent_images_are_not_aliased() {
    let workflow = new_workflow("history");
    workflow.add_resource_type(ResourceType::attachment(
        "history",
        true,
        vk::Format::R16G16B16A16_SFLOAT,
        vk::SampleCountFlags::TYPE_1,
        AttachmentType::Color,
        AttachmentSize::full_surface(),
    ));
    for i in 0..4 {
        let op = format!("pass_{i}");
        workflow.add_render_operation(RenderOperation::graphics(op.clone()));
        if i > 0 {
            workflow
                .add_attachment_input(&op, "history", &format!("frame_{}", i - 1), READ_LAYOUT)
                .unwrap();
        }
        workflow
            .add_attachment_output(&op, "history", &format!("frame_{i}"), COLOR_LAYOUT, LoadOp::Load)
            .unwrap();
    }

    let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();
    assert_eq!(sequences.frame_buffer_images.len(), 4);
    assert!(sequences.frame_buffer_images.iter().all(|image| image.persistent));
    // persistent images start the frame in the layout they ended it in
    assert_eq!(sequences.initial_image_layouts[0], READ_LAYOUT);
    assert_eq!(sequences.initial_image_layouts[3], COLOR_LAYOUT);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_recompile_returns_same_output() {
    let workflow = shadow_workflow();
    let compiler = SingleQueueCompiler::new();

    let first = workflow.compile(&compiler).unwrap();
    let second = workflow.compile(&compiler).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    workflow.add_render_operation(RenderOperation::graphics("overlay"));
    assert!(!workflow.is_valid());
    let third = workflow.compile(&compiler).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.operation_order[0].len(), 3);
}

#[test]
fn test_concurrent_compile_shares_output() {
    let workflow = deferred_workflow();
    let compiler = SingleQueueCompiler::new();

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| workflow.compile(&compiler).unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    for sequences in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], sequences));
    }
    assert!(workflow.is_valid());
}
