//! # Render Workflow
//!
//! Declarative render graph compiler for Vulkan renderers.
//!
//! ## Overview
//!
//! A [`RenderWorkflow`] describes graphics and compute operations and the
//! resources they read and write. Compiling it produces [`WorkflowSequences`]:
//!
//! - an operation order minimising render pass switches
//! - render passes with subpasses, subpass dependencies and load/store ops
//! - compute passes with the pipeline barriers they need
//! - frame buffer image definitions, with transient attachments aliased
//!   onto shared images when their lifetimes do not overlap
//!
//! The crate only produces descriptions. Creating Vulkan objects and
//! recording command buffers is left to the renderer.
//!
//! ## Example
//!
//! ```
//! use ash::vk;
//! use render_workflow::{
//!     AttachmentSize, AttachmentType, LoadOp, QueueTraits, RenderOperation, RenderWorkflow,
//!     ResourceType, SingleQueueCompiler,
//! };
//!
//! let workflow = RenderWorkflow::new("default", vec![QueueTraits::graphics()]);
//! workflow.add_resource_type(ResourceType::attachment(
//!     "surface",
//!     true,
//!     vk::Format::B8G8R8A8_SRGB,
//!     vk::SampleCountFlags::TYPE_1,
//!     AttachmentType::Surface,
//!     AttachmentSize::full_surface(),
//! ));
//! workflow.add_render_operation(RenderOperation::graphics("final"));
//! workflow
//!     .add_attachment_output(
//!         "final",
//!         "surface",
//!         "swapchain",
//!         vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
//!         LoadOp::clear_color(0.0, 0.0, 0.0, 1.0),
//!     )
//!     .unwrap();
//!
//! let sequences = workflow.compile(&SingleQueueCompiler::new()).unwrap();
//! assert!(sequences.output_render_pass().is_some());
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod sequences;
pub mod workflow;

// Re-export main types for convenience
pub use compiler::{SingleQueueCompiler, WorkflowCompiler};
pub use config::CompilerConfig;
pub use error::{WorkflowError, WorkflowResult};
pub use sequences::{
    AttachmentDefinition, AttachmentReference, ComputePassDescription, FrameBufferImageDefinition,
    ImageLayoutTransition, PipelineBarrier, QueueTraits, RenderCommand, RenderPassDescription,
    ResourceSlot, SubpassDefinition, SubpassDependency, WorkflowSequences,
};
pub use workflow::{
    AssociatedResource, AttachmentSize, AttachmentType, BufferKind, ChannelSwizzle, ClearValue,
    ImageKinds, LoadOp, MetaType, OperationKind, RenderOperation, RenderWorkflow,
    ResourceTransition, ResourceType, SceneNode, StoreOp, Swizzle, TransitionKinds,
    TransitionType, WorkflowGraph, WorkflowResource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
pub fn init() {
    log::info!("Render Workflow v{} initialized", VERSION);
}
