//! Integration tests for the Vulkan device objects
//!
//! These tests require a Vulkan 1.3 GPU and are marked with #[ignore].
//! Run with: cargo test -p quasar_gpu_vulkan --test vulkan_device_tests -- --ignored

use quasar_gpu::quasar::device::{
    BufferDesc, BufferFlags, BufferUsage, DescriptorHeapDesc, DescriptorHeapType, GraphicsDevice,
    QueueType, ResourceRef, TextureDesc, TextureFormat, TextureUsage, ViewDesc, ViewKind,
};
use quasar_gpu::quasar::Error;
use quasar_gpu_vulkan::{VulkanConfig, VulkanDevice};
use serial_test::serial;

fn device() -> VulkanDevice {
    VulkanDevice::headless(VulkanConfig::default().with_validation(true)).unwrap()
}

fn heap(device: &mut VulkanDevice, heap_type: DescriptorHeapType, capacity: u32, shader_visible: bool)
    -> Box<dyn quasar_gpu::quasar::device::DescriptorHeap>
{
    device
        .create_descriptor_heap(&DescriptorHeapDesc {
            name: format!("{:?} test heap", heap_type),
            heap_type,
            capacity,
            shader_visible,
        })
        .unwrap()
}

// ============================================================================
// DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_headless_device_reports_adapter() {
    let device = device();
    assert!(!device.adapter_name().is_empty());
    assert!(device.max_bindless_descriptors() > 0);
    device.wait_idle().unwrap();
}

// ============================================================================
// BUFFERS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_mapped_buffer_write_and_read() {
    let mut device = device();
    let upload = device
        .create_buffer(&BufferDesc::new("upload", 64, BufferUsage::Upload, BufferFlags::empty()))
        .unwrap();
    upload.write(16, &[1, 2, 3, 4]).unwrap();

    let readback = device
        .create_buffer(&BufferDesc::new("readback", 64, BufferUsage::Readback, BufferFlags::empty()))
        .unwrap();
    let mut out = [0u8; 4];
    readback.read(0, &mut out).unwrap();

    assert!(upload.write(62, &[0; 4]).is_err());
    assert!(readback.read(61, &mut out).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_zero_sized_buffer_is_rejected() {
    let mut device = device();
    let result = device.create_buffer(&BufferDesc::new("empty", 0, BufferUsage::Static, BufferFlags::VERTEX));
    assert!(result.is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_static_buffer_has_device_address() {
    let mut device = device();
    let buffer = device
        .create_buffer(&BufferDesc::new(
            "structured",
            1024,
            BufferUsage::Static,
            BufferFlags::SHADER_RESOURCE | BufferFlags::UNORDERED_ACCESS,
        ).with_stride(16))
        .unwrap();
    assert_ne!(buffer.gpu_address(), 0);
}

// ============================================================================
// DESCRIPTOR HEAPS AND VIEWS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_views_and_copies_between_heaps() {
    let mut device = device();
    let staging = heap(&mut device, DescriptorHeapType::CbvSrvUav, 8, false);
    let visible = heap(&mut device, DescriptorHeapType::CbvSrvUav, 8, true);
    assert!(staging.gpu_start().is_null());
    assert!(!visible.gpu_start().is_null());

    let buffer = device
        .create_buffer(&BufferDesc::new("constants", 256, BufferUsage::Dynamic, BufferFlags::CONSTANT))
        .unwrap();
    let texture = device
        .create_texture(&TextureDesc::new_2d("albedo", 4, 4, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED))
        .unwrap();

    let increment = staging.increment();
    let cbv = staging.cpu_start();
    let srv = staging.cpu_start().offset(1, increment);
    device.create_view(ResourceRef::Buffer(buffer.as_ref()), &ViewDesc::buffer(ViewKind::ConstantBuffer, 0, 256, 0), cbv).unwrap();
    device.create_view(ResourceRef::Texture(texture.as_ref()), &ViewDesc::texture(ViewKind::ShaderResource), srv).unwrap();

    device.copy_descriptors(visible.cpu_start().offset(4, visible.increment()), cbv, 2).unwrap();

    device.release_view(srv).unwrap();
    device.release_view(cbv).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_view_into_wrong_heap_type() {
    let mut device = device();
    let rtv_heap = heap(&mut device, DescriptorHeapType::RenderTarget, 2, false);
    let buffer = device
        .create_buffer(&BufferDesc::new("constants", 256, BufferUsage::Dynamic, BufferFlags::CONSTANT))
        .unwrap();

    let result = device.create_view(
        ResourceRef::Buffer(buffer.as_ref()),
        &ViewDesc::buffer(ViewKind::ConstantBuffer, 0, 256, 0),
        rtv_heap.cpu_start(),
    );
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_copy_between_heap_types_is_rejected() {
    let mut device = device();
    let cbv_heap = heap(&mut device, DescriptorHeapType::CbvSrvUav, 2, false);
    let rtv_heap = heap(&mut device, DescriptorHeapType::RenderTarget, 2, false);
    let result = device.copy_descriptors(cbv_heap.cpu_start(), rtv_heap.cpu_start(), 1);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_render_target_and_depth_views() {
    let mut device = device();
    let rtv_heap = heap(&mut device, DescriptorHeapType::RenderTarget, 1, false);
    let dsv_heap = heap(&mut device, DescriptorHeapType::DepthStencil, 1, false);

    let color = device
        .create_texture(&TextureDesc::new_2d("color", 64, 64, TextureFormat::R8G8B8A8_UNORM, TextureUsage::RENDER_TARGET))
        .unwrap();
    let depth = device
        .create_texture(&TextureDesc::new_2d("depth", 64, 64, TextureFormat::D32_FLOAT, TextureUsage::DEPTH_STENCIL))
        .unwrap();

    device.create_view(ResourceRef::Texture(color.as_ref()), &ViewDesc::texture(ViewKind::RenderTarget), rtv_heap.cpu_start()).unwrap();
    device.create_view(ResourceRef::Texture(depth.as_ref()), &ViewDesc::texture(ViewKind::DepthStencil), dsv_heap.cpu_start()).unwrap();
}

// ============================================================================
// QUEUES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_queue_fences_advance() {
    let mut device = device();
    for queue_type in [QueueType::Graphics, QueueType::Compute, QueueType::Copy] {
        let mut queue = device.create_queue(queue_type).unwrap();
        let mut list = device.create_command_list(queue_type).unwrap();
        assert_eq!(queue.completed_value().unwrap(), 0);

        list.begin().unwrap();
        list.end().unwrap();
        queue.submit(&[list.as_ref()]).unwrap();
        queue.signal(1).unwrap();
        queue.wait_for_value(1).unwrap();
        assert!(queue.completed_value().unwrap() >= 1);

        queue.wait_idle().unwrap();
    }
}
