//! Resource types for the render workflow.
//!
//! A [`ResourceType`] describes a *kind* of resource (an attachment with a given
//! format and size, a storage buffer, a sampled image...) independently of the
//! operations that use it. Resources declared in a workflow refer to a type by
//! its unique `type_name`.

use ash::vk;
use bitflags::bitflags;
use glam::{Vec2, Vec3};

/// The broad category a resource type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaType {
    /// Image used as a render pass attachment.
    Attachment,
    /// Image bound through descriptors.
    Image,
    /// Buffer bound through descriptors.
    Buffer,
}

/// What an attachment is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentType {
    #[default]
    Undefined,
    /// Presentable swapchain surface.
    Surface,
    Color,
    Depth,
    DepthStencil,
    Stencil,
}

impl AttachmentType {
    /// Image aspects covered by this attachment type.
    pub fn aspect_mask(self) -> vk::ImageAspectFlags {
        match self {
            Self::Color | Self::Surface => vk::ImageAspectFlags::COLOR,
            Self::Depth => vk::ImageAspectFlags::DEPTH,
            Self::DepthStencil => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
            Self::Stencil => vk::ImageAspectFlags::STENCIL,
            Self::Undefined => vk::ImageAspectFlags::empty(),
        }
    }

    /// Check if the attachment has a color or depth component.
    pub fn has_color_or_depth(self) -> bool {
        matches!(
            self,
            Self::Surface | Self::Color | Self::Depth | Self::DepthStencil
        )
    }

    /// Check if the attachment has a stencil component.
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::DepthStencil | Self::Stencil)
    }

    /// Check if the attachment is cleared with a depth/stencil value.
    pub fn is_depth_stencil(self) -> bool {
        matches!(self, Self::Depth | Self::DepthStencil | Self::Stencil)
    }
}

/// Attachment geometry.
///
/// Two sizes are equal only when both the variant and the vector match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AttachmentSize {
    #[default]
    Undefined,
    /// Size in pixels.
    Absolute(Vec3),
    /// Size as a multiple of the surface size (1.0 = full surface).
    SurfaceDependent(Vec3),
}

impl AttachmentSize {
    /// Absolute 2D size with a depth of one.
    pub fn absolute(width: f32, height: f32) -> Self {
        Self::Absolute(Vec2::new(width, height).extend(1.0))
    }

    /// Surface relative 2D size with a depth of one.
    pub fn surface_dependent(width_scale: f32, height_scale: f32) -> Self {
        Self::SurfaceDependent(Vec2::new(width_scale, height_scale).extend(1.0))
    }

    /// Exactly the size of the surface.
    pub fn full_surface() -> Self {
        Self::SurfaceDependent(Vec3::ONE)
    }

    /// Resolve to pixel dimensions for a surface of the given size.
    pub fn resolve(&self, surface_width: u32, surface_height: u32) -> Option<(u32, u32, u32)> {
        match self {
            Self::Undefined => None,
            Self::Absolute(size) => Some((size.x as u32, size.y as u32, size.z as u32)),
            Self::SurfaceDependent(scale) => Some((
                (surface_width as f32 * scale.x) as u32,
                (surface_height as f32 * scale.y) as u32,
                scale.z as u32,
            )),
        }
    }
}

/// Source of a single image channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSwizzle {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

impl ChannelSwizzle {
    fn to_vk(self) -> vk::ComponentSwizzle {
        match self {
            Self::Red => vk::ComponentSwizzle::R,
            Self::Green => vk::ComponentSwizzle::G,
            Self::Blue => vk::ComponentSwizzle::B,
            Self::Alpha => vk::ComponentSwizzle::A,
            Self::Zero => vk::ComponentSwizzle::ZERO,
            Self::One => vk::ComponentSwizzle::ONE,
        }
    }
}

/// Channel mapping applied when an attachment is viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle {
    pub r: ChannelSwizzle,
    pub g: ChannelSwizzle,
    pub b: ChannelSwizzle,
    pub a: ChannelSwizzle,
}

impl Default for Swizzle {
    fn default() -> Self {
        Self {
            r: ChannelSwizzle::Red,
            g: ChannelSwizzle::Green,
            b: ChannelSwizzle::Blue,
            a: ChannelSwizzle::Alpha,
        }
    }
}

impl Swizzle {
    /// Convert to a Vulkan component mapping.
    pub fn to_vk(self) -> vk::ComponentMapping {
        vk::ComponentMapping {
            r: self.r.to_vk(),
            g: self.g.to_vk(),
            b: self.b.to_vk(),
            a: self.a.to_vk(),
        }
    }
}

/// Payload of an attachment resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDescription {
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub attachment_type: AttachmentType,
    pub size: AttachmentSize,
    pub swizzle: Swizzle,
}

/// Payload of a buffer resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Uniform,
    Storage,
}

bitflags! {
    /// Payload of an image resource type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageKinds: u32 {
        const COMBINED_SAMPLER = 1;
        const SAMPLED = 2;
        const STORAGE = 4;
    }
}

/// Meta type specific data of a resource type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    Attachment(AttachmentDescription),
    Buffer(BufferKind),
    Image(ImageKinds),
}

/// Describes a kind of resource, keyed by a workflow-unique `type_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceType {
    pub type_name: String,
    /// Persistent resources keep their contents between frames and are never aliased.
    pub persistent: bool,
    pub payload: ResourcePayload,
}

impl ResourceType {
    /// Create an attachment resource type with an identity swizzle.
    pub fn attachment(
        type_name: impl Into<String>,
        persistent: bool,
        format: vk::Format,
        samples: vk::SampleCountFlags,
        attachment_type: AttachmentType,
        size: AttachmentSize,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            persistent,
            payload: ResourcePayload::Attachment(AttachmentDescription {
                format,
                samples,
                attachment_type,
                size,
                swizzle: Swizzle::default(),
            }),
        }
    }

    /// Create a buffer resource type.
    pub fn buffer(type_name: impl Into<String>, persistent: bool, kind: BufferKind) -> Self {
        Self {
            type_name: type_name.into(),
            persistent,
            payload: ResourcePayload::Buffer(kind),
        }
    }

    /// Create an image resource type.
    pub fn image(type_name: impl Into<String>, persistent: bool, kinds: ImageKinds) -> Self {
        Self {
            type_name: type_name.into(),
            persistent,
            payload: ResourcePayload::Image(kinds),
        }
    }

    /// Replace the channel swizzle. Has no effect on non-attachment types.
    pub fn with_swizzle(mut self, swizzle: Swizzle) -> Self {
        if let ResourcePayload::Attachment(attachment) = &mut self.payload {
            attachment.swizzle = swizzle;
        }
        self
    }

    pub fn meta_type(&self) -> MetaType {
        match self.payload {
            ResourcePayload::Attachment(_) => MetaType::Attachment,
            ResourcePayload::Buffer(_) => MetaType::Buffer,
            ResourcePayload::Image(_) => MetaType::Image,
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.meta_type() == MetaType::Attachment
    }

    /// Attachment payload, if this is an attachment type.
    pub fn attachment_description(&self) -> Option<&AttachmentDescription> {
        match &self.payload {
            ResourcePayload::Attachment(attachment) => Some(attachment),
            _ => None,
        }
    }

    pub fn attachment_size(&self) -> Option<AttachmentSize> {
        self.attachment_description().map(|a| a.size)
    }

    pub fn attachment_type(&self) -> Option<AttachmentType> {
        self.attachment_description().map(|a| a.attachment_type)
    }

    /// Check if this type describes the presentable surface.
    pub fn is_surface(&self) -> bool {
        self.attachment_type() == Some(AttachmentType::Surface)
    }
}
