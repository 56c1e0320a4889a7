/// Upload manager
///
/// CPU data headed for GPU-only buffers and textures is queued as owned
/// bytes. At the start of each frame as much of the queue as fits is copied
/// into that frame slot's upload heap, in FIFO order; the first upload that
/// does not fit and everything behind it wait for a later frame. The caller
/// records one copy per [`PlacedCopy`] and, once the frame is submitted,
/// commits the batch with the frame's fence value. Destinations become ready
/// when [`UploadManager::retire`] sees that fence reached.

use std::collections::VecDeque;
use crate::config::{align_up, TEXTURE_DATA_PITCH_ALIGNMENT, TEXTURE_DATA_PLACEMENT_ALIGNMENT};
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, BufferFlags, BufferUsage, GraphicsDevice, TextureCopyFootprint, TextureInfo,
};
use crate::resource::{BufferHandle, ResourceHandle, TextureHandle};

/// Where queued bytes go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Buffer { handle: BufferHandle, offset: u64 },
    Texture {
        handle: TextureHandle,
        width: u32,
        height: u32,
        array_layers: u32,
        bytes_per_pixel: u32,
    },
}

impl Destination {
    fn resource(&self) -> ResourceHandle {
        match self {
            Destination::Buffer { handle, .. } => ResourceHandle::Buffer(*handle),
            Destination::Texture { handle, .. } => ResourceHandle::Texture(*handle),
        }
    }
}

struct PendingUpload {
    destination: Destination,
    data: Vec<u8>,
}

/// A copy whose source bytes are in the current slot's upload heap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacedCopy {
    Buffer {
        handle: BufferHandle,
        dst_offset: u64,
        src_offset: u64,
        size: u64,
    },
    /// One footprint per array layer (mip 0 only)
    Texture {
        handle: TextureHandle,
        footprints: Vec<TextureCopyFootprint>,
    },
}

impl PlacedCopy {
    pub fn resource(&self) -> ResourceHandle {
        match self {
            PlacedCopy::Buffer { handle, .. } => ResourceHandle::Buffer(*handle),
            PlacedCopy::Texture { handle, .. } => ResourceHandle::Texture(*handle),
        }
    }
}

pub struct UploadManager {
    heaps: Vec<Box<dyn Buffer>>,
    queue: VecDeque<PendingUpload>,
    /// Destinations copied during the frame being recorded
    recorded: Vec<ResourceHandle>,
    /// (fence value, destinations) of submitted frames
    in_flight: Vec<(u64, Vec<ResourceHandle>)>,
}

impl UploadManager {
    /// One upload heap of `heap_size` bytes per frame slot
    pub fn new(device: &mut dyn GraphicsDevice, heap_size: u64, frames_in_flight: usize) -> Result<Self> {
        let heaps = (0..frames_in_flight)
            .map(|slot| {
                device.create_buffer(&BufferDesc::new(
                    &format!("upload_heap_{}", slot),
                    heap_size,
                    BufferUsage::Upload,
                    BufferFlags::empty(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            heaps,
            queue: VecDeque::new(),
            recorded: Vec::new(),
            in_flight: Vec::new(),
        })
    }

    pub fn queue_buffer_upload(&mut self, handle: BufferHandle, offset: u64, data: Vec<u8>) -> Result<()> {
        self.push(Destination::Buffer { handle, offset }, data)
    }

    /// Queue the full mip 0 of every layer, tightly packed, layer after layer
    pub fn queue_texture_upload(&mut self, handle: TextureHandle, info: &TextureInfo, data: Vec<u8>) -> Result<()> {
        if data.len() as u64 != info.mip0_size() {
            crate::engine_bail!(InvalidResource => "quasar::UploadManager",
                "Texture upload of {} bytes, expected {} ({}x{}x{} {:?})",
                data.len(), info.mip0_size(), info.width, info.height, info.array_layers, info.format);
        }
        let destination = Destination::Texture {
            handle,
            width: info.width,
            height: info.height,
            array_layers: info.array_layers,
            bytes_per_pixel: info.format.bytes_per_pixel(),
        };
        self.push(destination, data)
    }

    fn push(&mut self, destination: Destination, data: Vec<u8>) -> Result<()> {
        let required = Self::staged_size(&destination, data.len() as u64);
        if required > self.heap_size() {
            crate::engine_bail!(CapacityExceeded => "quasar::UploadManager",
                "{:?} needs {} bytes of upload heap, heap holds {}",
                destination.resource(), required, self.heap_size());
        }
        self.queue.push_back(PendingUpload { destination, data });
        Ok(())
    }

    /// Bytes an upload occupies in a heap starting at offset 0
    fn staged_size(destination: &Destination, len: u64) -> u64 {
        match destination {
            Destination::Buffer { .. } => len,
            Destination::Texture { width, height, array_layers, bytes_per_pixel, .. } => {
                let pitch = align_up(*width as u64 * *bytes_per_pixel as u64, TEXTURE_DATA_PITCH_ALIGNMENT);
                let layer = align_up(pitch * *height as u64, TEXTURE_DATA_PLACEMENT_ALIGNMENT);
                layer * *array_layers as u64
            }
        }
    }

    /// Copy as many queued uploads as fit into the heap of `slot`
    pub fn process(&mut self, slot: usize) -> Result<Vec<PlacedCopy>> {
        let heap = self.heaps[slot].as_ref();
        let capacity = heap.desc().size;
        let mut cursor = 0u64;
        let mut placed = Vec::new();

        while let Some(upload) = self.queue.front() {
            let copy = match upload.destination {
                Destination::Buffer { handle, offset } => {
                    let size = upload.data.len() as u64;
                    if cursor + size > capacity {
                        break;
                    }
                    heap.write(cursor, &upload.data)?;
                    let copy = PlacedCopy::Buffer { handle, dst_offset: offset, src_offset: cursor, size };
                    cursor += size;
                    copy
                }
                Destination::Texture { handle, width, height, array_layers, bytes_per_pixel } => {
                    let row_bytes = width as u64 * bytes_per_pixel as u64;
                    let pitch = align_up(row_bytes, TEXTURE_DATA_PITCH_ALIGNMENT);
                    let start = align_up(cursor, TEXTURE_DATA_PLACEMENT_ALIGNMENT);
                    let layer_size = align_up(pitch * height as u64, TEXTURE_DATA_PLACEMENT_ALIGNMENT);
                    if start + layer_size * array_layers as u64 > capacity {
                        break;
                    }
                    let mut footprints = Vec::with_capacity(array_layers as usize);
                    for layer in 0..array_layers as u64 {
                        let offset = start + layer * layer_size;
                        for row in 0..height as u64 {
                            let src = ((layer * height as u64 + row) * row_bytes) as usize;
                            heap.write(offset + row * pitch, &upload.data[src..src + row_bytes as usize])?;
                        }
                        footprints.push(TextureCopyFootprint {
                            offset,
                            row_pitch: pitch,
                            width,
                            height,
                            array_layer: layer as u32,
                            mip_level: 0,
                        });
                    }
                    cursor = start + layer_size * array_layers as u64;
                    PlacedCopy::Texture { handle, footprints }
                }
            };
            self.recorded.push(copy.resource());
            placed.push(copy);
            self.queue.pop_front();
        }

        if !self.queue.is_empty() {
            crate::engine_debug!("quasar::UploadManager",
                "{} upload(s) left queued for a later frame ({} of {} bytes used)",
                self.queue.len(), cursor, capacity);
        }
        Ok(placed)
    }

    /// Attach the copies recorded this frame to the frame's fence
    pub fn commit(&mut self, fence_value: u64) {
        if !self.recorded.is_empty() {
            let recorded = std::mem::take(&mut self.recorded);
            self.in_flight.push((fence_value, recorded));
        }
    }

    /// Destinations whose copies completed now that `completed_fence` is reached
    pub fn retire(&mut self, completed_fence: u64) -> Vec<ResourceHandle> {
        let mut ready = Vec::new();
        self.in_flight.retain(|(fence, targets)| {
            if *fence <= completed_fence {
                ready.extend_from_slice(targets);
                false
            } else {
                true
            }
        });
        ready
    }

    /// Forget everything headed for a destroyed resource
    pub fn discard(&mut self, resource: ResourceHandle) {
        self.queue.retain(|u| u.destination.resource() != resource);
        self.recorded.retain(|r| *r != resource);
        for (_, targets) in &mut self.in_flight {
            targets.retain(|r| *r != resource);
        }
    }

    /// Uploads still waiting for heap space
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether `resource` has bytes queued, recorded or in flight
    pub fn is_pending(&self, resource: ResourceHandle) -> bool {
        self.queue.iter().any(|u| u.destination.resource() == resource)
            || self.recorded.contains(&resource)
            || self.in_flight.iter().any(|(_, t)| t.contains(&resource))
    }

    pub fn heap(&self, slot: usize) -> &dyn Buffer {
        self.heaps[slot].as_ref()
    }

    pub fn heap_size(&self) -> u64 {
        self.heaps.first().map(|h| h.desc().size).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "upload_manager_tests.rs"]
mod tests;
