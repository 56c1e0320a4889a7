use super::*;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{TextureDesc, TextureFormat, TextureUsage};

fn manager(heap_size: u64) -> UploadManager {
    let mut device = MockGraphicsDevice::new();
    UploadManager::new(&mut device, heap_size, 2).unwrap()
}

fn buffer(index: u32) -> BufferHandle {
    BufferHandle::from_index(index)
}

fn texture_info(width: u32, height: u32, layers: u32) -> TextureInfo {
    let mut desc = TextureDesc::new_2d("tex", width, height, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED);
    desc.array_layers = layers;
    desc.info()
}

// ============================================================================
// Placement
// ============================================================================

#[test]
fn test_buffer_uploads_are_packed_in_order() {
    let mut uploads = manager(1024);
    uploads.queue_buffer_upload(buffer(0), 0, vec![1; 100]).unwrap();
    uploads.queue_buffer_upload(buffer(1), 16, vec![2; 50]).unwrap();

    let placed = uploads.process(0).unwrap();
    assert_eq!(
        placed,
        vec![
            PlacedCopy::Buffer { handle: buffer(0), dst_offset: 0, src_offset: 0, size: 100 },
            PlacedCopy::Buffer { handle: buffer(1), dst_offset: 16, src_offset: 100, size: 50 },
        ]
    );

    let mut out = [0u8; 2];
    uploads.heap(0).read(99, &mut out).unwrap();
    assert_eq!(out, [1, 2]);
    assert_eq!(uploads.pending_count(), 0);
}

#[test]
fn test_uploads_that_do_not_fit_stay_queued() {
    let mut uploads = manager(256);
    uploads.queue_buffer_upload(buffer(0), 0, vec![0; 200]).unwrap();
    uploads.queue_buffer_upload(buffer(1), 0, vec![0; 100]).unwrap();
    uploads.queue_buffer_upload(buffer(2), 0, vec![0; 10]).unwrap();

    // FIFO: the small third upload waits behind the second
    assert_eq!(uploads.process(0).unwrap().len(), 1);
    assert_eq!(uploads.pending_count(), 2);

    let placed = uploads.process(1).unwrap();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].resource(), ResourceHandle::Buffer(buffer(2)));
}

#[test]
fn test_upload_larger_than_heap_is_rejected() {
    let mut uploads = manager(256);
    assert!(matches!(
        uploads.queue_buffer_upload(buffer(0), 0, vec![0; 257]),
        Err(Error::CapacityExceeded(_))
    ));
    assert_eq!(uploads.pending_count(), 0);
}

#[test]
fn test_texture_rows_are_pitch_aligned() {
    let mut uploads = manager(4096);
    uploads.queue_buffer_upload(buffer(0), 0, vec![9; 10]).unwrap();
    // 3x2 RGBA8: 12-byte rows
    let texels: Vec<u8> = (0..24).collect();
    let handle = TextureHandle::from_index(0);
    uploads.queue_texture_upload(handle, &texture_info(3, 2, 1), texels).unwrap();

    let placed = uploads.process(0).unwrap();
    let footprints = match &placed[1] {
        PlacedCopy::Texture { footprints, .. } => footprints.clone(),
        other => panic!("unexpected copy {:?}", other),
    };
    assert_eq!(footprints.len(), 1);
    assert_eq!(footprints[0].offset, 512);
    assert_eq!(footprints[0].row_pitch, 256);

    let mut second_row = [0u8; 12];
    uploads.heap(0).read(512 + 256, &mut second_row).unwrap();
    assert_eq!(second_row.to_vec(), (12..24).collect::<Vec<u8>>());
}

#[test]
fn test_texture_array_gets_one_footprint_per_layer() {
    let mut uploads = manager(8192);
    let handle = TextureHandle::from_index(1);
    uploads.queue_texture_upload(handle, &texture_info(4, 4, 3), vec![0; 4 * 4 * 4 * 3]).unwrap();

    let placed = uploads.process(1).unwrap();
    match &placed[0] {
        PlacedCopy::Texture { footprints, .. } => {
            let layers: Vec<u32> = footprints.iter().map(|f| f.array_layer).collect();
            assert_eq!(layers, vec![0, 1, 2]);
            assert!(footprints.iter().all(|f| f.offset % 512 == 0));
        }
        other => panic!("unexpected copy {:?}", other),
    }
}

#[test]
fn test_texture_size_mismatch_fails() {
    let mut uploads = manager(4096);
    let result = uploads.queue_texture_upload(TextureHandle::from_index(0), &texture_info(4, 4, 1), vec![0; 10]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// Readiness
// ============================================================================

#[test]
fn test_ready_after_fence_reached() {
    let mut uploads = manager(1024);
    uploads.queue_buffer_upload(buffer(0), 0, vec![0; 4]).unwrap();
    uploads.process(0).unwrap();
    uploads.commit(5);

    assert!(uploads.retire(4).is_empty());
    assert!(uploads.is_pending(ResourceHandle::Buffer(buffer(0))));
    assert_eq!(uploads.retire(5), vec![ResourceHandle::Buffer(buffer(0))]);
    assert!(uploads.retire(6).is_empty());
}

#[test]
fn test_commit_without_copies_is_no_op() {
    let mut uploads = manager(1024);
    uploads.process(0).unwrap();
    uploads.commit(1);
    assert!(uploads.retire(u64::MAX).is_empty());
}

#[test]
fn test_discard_forgets_destroyed_resource() {
    let mut uploads = manager(256);
    uploads.queue_buffer_upload(buffer(0), 0, vec![0; 200]).unwrap();
    uploads.queue_buffer_upload(buffer(1), 0, vec![0; 200]).unwrap();
    uploads.process(0).unwrap();
    uploads.commit(1);

    uploads.discard(ResourceHandle::Buffer(buffer(0)));
    uploads.discard(ResourceHandle::Buffer(buffer(1)));

    assert_eq!(uploads.pending_count(), 0);
    assert!(uploads.retire(1).is_empty());
}
