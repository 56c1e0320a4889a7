//! Unit tests for command list helpers that need no device

use super::*;
use ash::vk::Handle;
use quasar_gpu::quasar::device::{TextureFormat, TextureInfo, TextureUsage};
use quasar_gpu::quasar::Error;

fn image(kind: ViewKind) -> DescriptorSlot {
    DescriptorSlot::Image {
        image: vk::Image::from_raw(1),
        view: vk::ImageView::from_raw(2),
        kind,
        owned: false,
    }
}

fn buffer(kind: ViewKind) -> DescriptorSlot {
    DescriptorSlot::Buffer {
        buffer: vk::Buffer::from_raw(3),
        offset: 256,
        range: 512,
        kind,
    }
}

// ============================================================================
// TABLE SLOTS
// ============================================================================

#[test]
fn test_sampled_image_slot() {
    match table_info(&image(ViewKind::ShaderResource), vk::DescriptorType::SAMPLED_IMAGE) {
        Some(PendingInfo::Image(info)) => {
            assert_eq!(info.image_view, vk::ImageView::from_raw(2));
            assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        }
        _ => panic!("expected an image descriptor"),
    }
}

#[test]
fn test_storage_image_slot_uses_general_layout() {
    match table_info(&image(ViewKind::UnorderedAccess), vk::DescriptorType::STORAGE_IMAGE) {
        Some(PendingInfo::Image(info)) => assert_eq!(info.image_layout, vk::ImageLayout::GENERAL),
        _ => panic!("expected an image descriptor"),
    }
}

#[test]
fn test_buffer_slots_keep_their_range() {
    for kind in [ViewKind::ShaderResource, ViewKind::UnorderedAccess] {
        match table_info(&buffer(kind), vk::DescriptorType::STORAGE_BUFFER) {
            Some(PendingInfo::Buffer(info)) => {
                assert_eq!(info.offset, 256);
                assert_eq!(info.range, 512);
            }
            _ => panic!("expected a buffer descriptor"),
        }
    }
    assert!(table_info(&buffer(ViewKind::ConstantBuffer), vk::DescriptorType::UNIFORM_BUFFER).is_some());
}

#[test]
fn test_mismatched_slots_are_rejected() {
    assert!(table_info(&image(ViewKind::ShaderResource), vk::DescriptorType::STORAGE_IMAGE).is_none());
    assert!(table_info(&image(ViewKind::UnorderedAccess), vk::DescriptorType::SAMPLED_IMAGE).is_none());
    assert!(table_info(&image(ViewKind::RenderTarget), vk::DescriptorType::SAMPLED_IMAGE).is_none());
    assert!(table_info(&buffer(ViewKind::ShaderResource), vk::DescriptorType::SAMPLED_IMAGE).is_none());
    assert!(table_info(&buffer(ViewKind::ConstantBuffer), vk::DescriptorType::STORAGE_BUFFER).is_none());
    assert!(table_info(&DescriptorSlot::Empty, vk::DescriptorType::SAMPLED_IMAGE).is_none());
}

// ============================================================================
// BARRIERS
// ============================================================================

struct SampledTexture(TextureInfo);

impl DeviceTexture for SampledTexture {
    fn info(&self) -> &TextureInfo {
        &self.0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn sampled_texture() -> SampledTexture {
    SampledTexture(TextureInfo {
        width: 4,
        height: 4,
        array_layers: 1,
        mip_levels: 1,
        format: TextureFormat::R8G8B8A8_UNORM,
        usage: TextureUsage::SAMPLED,
    })
}

#[test]
fn test_layout_transition_rejected_inside_render_pass() {
    let texture = sampled_texture();
    let barriers = [NativeBarrier::Transition {
        resource: ResourceRef::Texture(&texture),
        before: ResourceState::COMMON,
        after: ResourceState::ALL_SHADER_RESOURCE,
    }];
    assert!(check_barrier_placement(false, &barriers).is_ok());
    let result = check_barrier_placement(true, &barriers);
    assert!(matches!(result, Err(Error::InvalidState(ref message)) if message.contains("1 image layout")));
}

#[test]
fn test_unordered_access_barrier_rejected_inside_render_pass() {
    let texture = sampled_texture();
    let barriers = [NativeBarrier::UnorderedAccess { resource: ResourceRef::Texture(&texture) }];
    assert!(check_barrier_placement(false, &barriers).is_ok());
    assert!(matches!(check_barrier_placement(true, &barriers), Err(Error::InvalidState(_))));
}

// ============================================================================
// CONVERSIONS
// ============================================================================

#[test]
fn test_rect_conversion() {
    let rect = to_vk_rect(Rect2D { x: -4, y: 8, width: 640, height: 480 });
    assert_eq!(rect.offset.x, -4);
    assert_eq!(rect.offset.y, 8);
    assert_eq!(rect.extent.width, 640);
    assert_eq!(rect.extent.height, 480);
}

#[test]
fn test_clear_values() {
    let color = to_vk_clear(ClearValue::Color([0.1, 0.2, 0.3, 1.0]));
    assert_eq!(unsafe { color.color.float32 }, [0.1, 0.2, 0.3, 1.0]);

    let depth = to_vk_clear(ClearValue::DepthStencil { depth: 1.0, stencil: 7 });
    let depth_stencil = unsafe { depth.depth_stencil };
    assert_eq!(depth_stencil.depth, 1.0);
    assert_eq!(depth_stencil.stencil, 7);
}
