/// Texture trait, texture descriptor, and texture info

use std::any::Any;
use bitflags::bitflags;

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_SFLOAT,
    R32_UINT,
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::D16_UNORM => 2,
            TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::R32_SFLOAT
            | TextureFormat::R32_UINT
            | TextureFormat::D32_FLOAT
            | TextureFormat::D24_UNORM_S8_UINT => 4,
            TextureFormat::R16G16B16A16_SFLOAT => 8,
            TextureFormat::R32G32B32A32_SFLOAT => 16,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM | TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, TextureFormat::D24_UNORM_S8_UINT)
    }
}

bitflags! {
    /// Views a texture may be used with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Sampled in shaders (shader-resource view)
        const SAMPLED = 1 << 0;
        /// Read-write in shaders (unordered-access view)
        const STORAGE = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const DEPTH_STENCIL = 1 << 3;
    }
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Debug name
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of array layers (1 = simple 2D texture)
    pub array_layers: u32,
    /// Number of mip levels (initial data covers mip 0 only)
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDesc {
    pub fn new_2d(name: &str, width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            array_layers: 1,
            mip_levels: 1,
            format,
            usage,
        }
    }

    pub fn info(&self) -> TextureInfo {
        TextureInfo {
            width: self.width,
            height: self.height,
            array_layers: self.array_layers,
            mip_levels: self.mip_levels,
            format: self.format,
            usage: self.usage,
        }
    }
}

// ===== TEXTURE INFO =====

/// Read-only properties of a created texture.
///
/// Returned by `Texture::info()` to query texture properties
/// without exposing backend-specific details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureInfo {
    /// Returns true if this texture is a texture array (array_layers > 1)
    pub fn is_array(&self) -> bool {
        self.array_layers > 1
    }

    /// Tightly packed size of mip 0 across all layers
    pub fn mip0_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.array_layers as u64
            * self.format.bytes_per_pixel() as u64
    }
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// Implemented by backend-specific texture types (e.g., VulkanTexture).
/// The native texture is destroyed when dropped, unless the backend
/// does not own it (swapchain images).
pub trait Texture: Send + Sync {
    /// Get the read-only properties of this texture
    fn info(&self) -> &TextureInfo;

    fn as_any(&self) -> &dyn Any;
}
