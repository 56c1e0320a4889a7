use super::*;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;

fn allocator(size: u64) -> FrameAllocator {
    let mut device = MockGraphicsDevice::new();
    FrameAllocator::new(&mut device, "frame_allocator_0", size).unwrap()
}

#[test]
fn test_allocations_are_constant_buffer_aligned() {
    let mut allocator = allocator(1024);

    assert_eq!(allocator.allocate(&[1u8; 16]).unwrap(), 0);
    assert_eq!(allocator.allocate(&[2u8; 300]).unwrap(), 256);
    assert_eq!(allocator.allocate(&[3u8; 4]).unwrap(), 768);
    assert_eq!(allocator.used(), 772);
}

#[test]
fn test_data_is_written() {
    let mut allocator = allocator(512);
    allocator.allocate(&[0u8; 8]).unwrap();
    let offset = allocator.allocate(&[7, 7, 7]).unwrap();

    let mut out = [0u8; 3];
    allocator.buffer().read(offset, &mut out).unwrap();
    assert_eq!(out, [7, 7, 7]);
}

#[test]
fn test_overflow_is_capacity_exceeded() {
    let mut allocator = allocator(512);
    allocator.allocate(&[0u8; 300]).unwrap();

    assert!(matches!(allocator.allocate(&[0u8; 257]), Err(Error::CapacityExceeded(_))));
    assert_eq!(allocator.used(), 300);
    assert_eq!(allocator.allocate(&[0u8; 256]).unwrap(), 256);
}

#[test]
fn test_reset_rewinds_cursor() {
    let mut allocator = allocator(256);
    allocator.allocate(&[0u8; 256]).unwrap();
    allocator.reset();

    assert_eq!(allocator.used(), 0);
    assert_eq!(allocator.allocate(&[0u8; 4]).unwrap(), 0);
    assert_eq!(allocator.capacity(), 256);
}
