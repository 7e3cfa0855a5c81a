/// Attachment - a named image slot written or read by a render pass
///
/// The binding index is the attachment's identity inside its pass and
/// matches the shader output location.

use crate::device::{ClearValue, Format};

/// What backs an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// The acquired swapchain image (one view per swapchain image)
    Swapchain,
    /// The pass-owned depth image, shared by every framebuffer
    Depth,
    /// A free-standing color image owned by the pass
    Image,
}

/// Render pass attachment declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    binding: u32,
    name: String,
    kind: AttachmentKind,
    /// Format of `Image` attachments; resolved at initialization for the others
    format: Format,
    clear_value: ClearValue,
}

impl Attachment {
    /// Swapchain color attachment cleared to `clear_color`
    pub fn swapchain(binding: u32, name: &str, clear_color: [f32; 4]) -> Self {
        Self {
            binding,
            name: name.to_string(),
            kind: AttachmentKind::Swapchain,
            format: Format::Undefined,
            clear_value: ClearValue::Color(clear_color),
        }
    }

    /// Depth attachment cleared to the far plane
    pub fn depth(binding: u32, name: &str) -> Self {
        Self {
            binding,
            name: name.to_string(),
            kind: AttachmentKind::Depth,
            format: Format::Undefined,
            clear_value: ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
        }
    }

    /// Free-standing color image of `format`
    pub fn image(binding: u32, name: &str, format: Format, clear_color: [f32; 4]) -> Self {
        Self {
            binding,
            name: name.to_string(),
            kind: AttachmentKind::Image,
            format,
            clear_value: ClearValue::Color(clear_color),
        }
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// Declared format (`Undefined` for swapchain and depth attachments)
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn clear_value(&self) -> ClearValue {
        self.clear_value
    }
}
