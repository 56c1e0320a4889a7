/// CommandQueue - Vulkan implementation of the CommandQueue trait
///
/// The queue fence is a timeline semaphore. Command queues of the same
/// family share one native `vk::Queue`, submission is serialized through
/// the context's queue mutex.

use quasar_gpu::quasar::Result;
use quasar_gpu::quasar::device::{CommandList as DeviceCommandList, CommandQueue as DeviceCommandQueue, QueueType};
use quasar_gpu::{engine_bail, engine_err, engine_trace, engine_warn};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_command_list::downcast_command_list;
use crate::vulkan_context::GpuContext;

/// Vulkan command queue implementation
pub struct CommandQueue {
    ctx: Arc<GpuContext>,
    queue_type: QueueType,
    timeline: vk::Semaphore,
    last_signaled: u64,
}

impl CommandQueue {
    pub(crate) fn new(ctx: Arc<GpuContext>, queue_type: QueueType) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let timeline = unsafe {
            ctx.device.create_semaphore(&create_info, None)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to create timeline semaphore: {:?}", e))?
        };

        Ok(Self {
            ctx,
            queue_type,
            timeline,
            last_signaled: 0,
        })
    }

    fn submit2(&self, submit: vk::SubmitInfo2<'_>) -> Result<()> {
        let queue = self.ctx.queue(self.queue_type).handle.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "{:?} queue mutex poisoned", self.queue_type))?;
        unsafe {
            self.ctx.device.queue_submit2(*queue, &[submit], vk::Fence::null())
                .map_err(|e| engine_err!("quasar::vulkan", "{:?} queue submission failed: {:?}", self.queue_type, e))
        }
    }
}

impl DeviceCommandQueue for CommandQueue {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn submit(&mut self, command_lists: &[&dyn DeviceCommandList]) -> Result<()> {
        let family = self.ctx.queue(self.queue_type).family;
        let mut command_buffers = Vec::with_capacity(command_lists.len());
        for list in command_lists {
            let list = downcast_command_list(*list)?;
            if self.ctx.queue(list.queue_type()).family != family {
                engine_bail!(InvalidResource => "quasar::vulkan",
                    "{:?} command list submitted to the {:?} queue", list.queue_type(), self.queue_type);
            }
            command_buffers.push(vk::CommandBufferSubmitInfo::default().command_buffer(list.command_buffer));
        }

        // The graphics submission after an acquire waits for the image and signals present
        let (wait, signal) = if self.queue_type == QueueType::Graphics {
            let mut sync = self.ctx.present_sync.lock()
                .map_err(|_| engine_err!("quasar::vulkan", "Present sync mutex poisoned"))?;
            (sync.wait.take(), sync.signal.take())
        } else {
            (None, None)
        };

        let waits: Vec<vk::SemaphoreSubmitInfo> = wait
            .into_iter()
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags2::ALL_TRANSFER)
            })
            .collect();
        let signals: Vec<vk::SemaphoreSubmitInfo> = signal
            .into_iter()
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            })
            .collect();

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);
        self.submit2(submit)?;

        engine_trace!("quasar::vulkan", "{:?} queue: {} command lists submitted", self.queue_type, command_lists.len());
        Ok(())
    }

    fn signal(&mut self, value: u64) -> Result<()> {
        if value <= self.last_signaled {
            engine_bail!(InvalidState => "quasar::vulkan",
                "Fence value {} does not increase the {:?} queue fence (last {})", value, self.queue_type, self.last_signaled);
        }
        let signals = [
            vk::SemaphoreSubmitInfo::default()
                .semaphore(self.timeline)
                .value(value)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
        ];
        self.submit2(vk::SubmitInfo2::default().signal_semaphore_infos(&signals))?;
        self.last_signaled = value;
        Ok(())
    }

    fn completed_value(&self) -> Result<u64> {
        unsafe {
            self.ctx.device.get_semaphore_counter_value(self.timeline)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to read {:?} queue fence: {:?}", self.queue_type, e))
        }
    }

    fn wait_for_value(&self, value: u64) -> Result<()> {
        let semaphores = [self.timeline];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe {
            self.ctx.device.wait_semaphores(&wait_info, u64::MAX)
                .map_err(|e| engine_err!("quasar::vulkan", "Waiting for {:?} fence value {} failed: {:?}", self.queue_type, value, e))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        let queue = self.ctx.queue(self.queue_type).handle.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "{:?} queue mutex poisoned", self.queue_type))?;
        unsafe {
            self.ctx.device.queue_wait_idle(*queue)
                .map_err(|e| engine_err!("quasar::vulkan", "{:?} queue wait idle failed: {:?}", self.queue_type, e))
        }
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_value(self.last_signaled) {
            engine_warn!("quasar::vulkan", "Dropping {:?} queue without reaching its fence: {}", self.queue_type, e);
        }
        unsafe {
            self.ctx.device.destroy_semaphore(self.timeline, None);
        }
    }
}
