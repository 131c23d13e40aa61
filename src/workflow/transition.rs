//! Resource transitions: typed edges between operations and resources.

use ash::vk;
use bitflags::bitflags;
use glam::Vec4;

use super::operation::OperationId;
use super::resource::ResourceId;

/// What an operation does with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionType {
    AttachmentInput,
    AttachmentOutput,
    /// Multisample resolve target of a color output.
    AttachmentResolveOutput,
    AttachmentDepthOutput,
    BufferInput,
    BufferOutput,
}

bitflags! {
    /// Set of transition types, used to filter graph queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransitionKinds: u32 {
        const ATTACHMENT_INPUT = 1;
        const ATTACHMENT_OUTPUT = 2;
        const ATTACHMENT_RESOLVE_OUTPUT = 4;
        const ATTACHMENT_DEPTH_OUTPUT = 8;
        const BUFFER_INPUT = 16;
        const BUFFER_OUTPUT = 32;

        const ALL_ATTACHMENTS = Self::ATTACHMENT_INPUT.bits()
            | Self::ATTACHMENT_OUTPUT.bits()
            | Self::ATTACHMENT_RESOLVE_OUTPUT.bits()
            | Self::ATTACHMENT_DEPTH_OUTPUT.bits();
        const ALL_ATTACHMENT_OUTPUTS = Self::ATTACHMENT_OUTPUT.bits()
            | Self::ATTACHMENT_RESOLVE_OUTPUT.bits()
            | Self::ATTACHMENT_DEPTH_OUTPUT.bits();
        const ALL_INPUTS = Self::ATTACHMENT_INPUT.bits() | Self::BUFFER_INPUT.bits();
        const ALL_OUTPUTS = Self::ALL_ATTACHMENT_OUTPUTS.bits() | Self::BUFFER_OUTPUT.bits();
        const ALL_INPUTS_OUTPUTS = Self::ALL_INPUTS.bits() | Self::ALL_OUTPUTS.bits();
    }
}

impl TransitionType {
    /// The single-bit set matching this type.
    pub fn kind(self) -> TransitionKinds {
        match self {
            Self::AttachmentInput => TransitionKinds::ATTACHMENT_INPUT,
            Self::AttachmentOutput => TransitionKinds::ATTACHMENT_OUTPUT,
            Self::AttachmentResolveOutput => TransitionKinds::ATTACHMENT_RESOLVE_OUTPUT,
            Self::AttachmentDepthOutput => TransitionKinds::ATTACHMENT_DEPTH_OUTPUT,
            Self::BufferInput => TransitionKinds::BUFFER_INPUT,
            Self::BufferOutput => TransitionKinds::BUFFER_OUTPUT,
        }
    }

    pub fn is_input(self) -> bool {
        TransitionKinds::ALL_INPUTS.contains(self.kind())
    }

    pub fn is_output(self) -> bool {
        TransitionKinds::ALL_OUTPUTS.contains(self.kind())
    }

    pub fn is_attachment(self) -> bool {
        TransitionKinds::ALL_ATTACHMENTS.contains(self.kind())
    }
}

/// Operation to perform when loading an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Load the existing contents of the attachment.
    Load,
    /// Clear the attachment. Depth/stencil attachments read depth from `x` and stencil from `y`.
    Clear(Vec4),
    /// Don't care about the existing contents (may be undefined).
    #[default]
    DontCare,
}

impl LoadOp {
    /// Create a clear operation with a color value.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(Vec4::new(r, g, b, a))
    }

    /// Create a clear operation with a depth and stencil value.
    pub fn clear_depth(depth: f32, stencil: f32) -> Self {
        Self::Clear(Vec4::new(depth, stencil, 0.0, 0.0))
    }

    pub fn to_vk(self) -> vk::AttachmentLoadOp {
        match self {
            Self::Load => vk::AttachmentLoadOp::LOAD,
            Self::Clear(_) => vk::AttachmentLoadOp::CLEAR,
            Self::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        }
    }

    /// Clear value carried by the operation, zero when not clearing.
    pub fn clear_value(self) -> Vec4 {
        match self {
            Self::Clear(value) => value,
            _ => Vec4::ZERO,
        }
    }
}

/// Operation to perform when storing an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    #[default]
    DontCare,
}

impl StoreOp {
    pub fn to_vk(self) -> vk::AttachmentStoreOp {
        match self {
            Self::Store => vk::AttachmentStoreOp::STORE,
            Self::DontCare => vk::AttachmentStoreOp::DONT_CARE,
        }
    }
}

/// Clear value of a single frame buffer attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color(Vec4),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    pub fn to_vk(self) -> vk::ClearValue {
        match self {
            Self::Color(color) => vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: color.to_array(),
                },
            },
            Self::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

/// Attachment specific data of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentTransition {
    /// For resolve outputs: the color output being resolved.
    pub resolve_source: Option<ResourceId>,
    pub layout: vk::ImageLayout,
    pub load: LoadOp,
}

/// Buffer specific data of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTransition {
    pub pipeline_stage: vk::PipelineStageFlags,
    pub access: vk::AccessFlags,
}

/// Transition payload, discriminated by the transition type family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionPayload {
    Attachment(AttachmentTransition),
    Buffer(BufferTransition),
}

/// A typed edge connecting an operation to a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTransition {
    pub operation: OperationId,
    pub resource: ResourceId,
    pub transition_type: TransitionType,
    pub payload: TransitionPayload,
}

impl ResourceTransition {
    pub fn is_input(&self) -> bool {
        self.transition_type.is_input()
    }

    pub fn is_output(&self) -> bool {
        self.transition_type.is_output()
    }

    pub fn attachment(&self) -> Option<&AttachmentTransition> {
        match &self.payload {
            TransitionPayload::Attachment(attachment) => Some(attachment),
            TransitionPayload::Buffer(_) => None,
        }
    }

    pub fn buffer(&self) -> Option<&BufferTransition> {
        match &self.payload {
            TransitionPayload::Buffer(buffer) => Some(buffer),
            TransitionPayload::Attachment(_) => None,
        }
    }

    /// Image layout of an attachment transition.
    pub fn layout(&self) -> Option<vk::ImageLayout> {
        self.attachment().map(|a| a.layout)
    }

    /// Resolve source of a resolve output transition.
    pub fn resolve_source(&self) -> Option<ResourceId> {
        self.attachment().and_then(|a| a.resolve_source)
    }
}
