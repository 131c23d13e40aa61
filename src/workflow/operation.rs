//! Render operations: the graphics and compute work items of a workflow.

use std::any::Any;
use std::sync::Arc;

use ash::vk;

use super::resource_type::AttachmentSize;

/// Opaque scene graph node recorded by an operation. The compiler never reads it.
pub type SceneNode = Arc<dyn Any + Send + Sync>;

/// Unique identifier for an operation inside one workflow.
///
/// Ids are assigned in registration order, which is also the order every
/// graph traversal visits operations in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub(crate) u32);

impl OperationId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of work an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Becomes a subpass of a render pass.
    Graphics,
    /// Becomes a standalone compute pass.
    Compute,
}

/// A graphics or compute operation, identified by its name.
#[derive(Debug, Clone)]
pub struct RenderOperation {
    pub name: String,
    pub kind: OperationKind,
    pub attachment_size: AttachmentSize,
    pub subpass_contents: vk::SubpassContents,
    pub scene_node: Option<SceneNode>,
    /// Stored for callers; the single queue compiler schedules every operation.
    pub enabled: bool,
}

impl RenderOperation {
    /// Create an operation covering the whole surface with inline subpass contents.
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attachment_size: AttachmentSize::full_surface(),
            subpass_contents: vk::SubpassContents::INLINE,
            scene_node: None,
            enabled: true,
        }
    }

    pub fn graphics(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Graphics)
    }

    pub fn compute(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Compute)
    }

    pub fn with_attachment_size(mut self, size: AttachmentSize) -> Self {
        self.attachment_size = size;
        self
    }

    pub fn with_subpass_contents(mut self, contents: vk::SubpassContents) -> Self {
        self.subpass_contents = contents;
        self
    }

    pub fn with_scene_node(mut self, node: SceneNode) -> Self {
        self.scene_node = Some(node);
        self
    }

    pub fn is_graphics(&self) -> bool {
        self.kind == OperationKind::Graphics
    }

    pub fn is_compute(&self) -> bool {
        self.kind == OperationKind::Compute
    }

    /// Pipeline bind point used by the operation's subpass.
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        match self.kind {
            OperationKind::Graphics => vk::PipelineBindPoint::GRAPHICS,
            OperationKind::Compute => vk::PipelineBindPoint::COMPUTE,
        }
    }
}
