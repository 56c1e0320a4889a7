/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns nothing but the shared [`GpuContext`]; every native object it
/// creates keeps the context alive. Presentation is separate: a window gets
/// its swapchain from [`VulkanDevice::create_swapchain`].

use quasar_gpu::quasar::Result;
use quasar_gpu::quasar::device::{
    Buffer as DeviceBuffer, BufferDesc, CommandList as DeviceCommandList,
    CommandQueue as DeviceCommandQueue, CpuDescriptorHandle, DescriptorHeap as DeviceDescriptorHeap,
    DescriptorHeapDesc, DescriptorHeapType, GraphicsDevice, NativePipelineDesc,
    Pipeline as DevicePipeline, QueueType, ResourceRef, Texture as DeviceTexture, TextureDesc,
    ViewDesc, ViewKind,
};
use quasar_gpu::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::{downcast_buffer, downcast_texture, CommandList};
use crate::vulkan_config::VulkanConfig;
use crate::vulkan_context::{DeviceQueue, GpuContext, PresentSync};
use crate::vulkan_descriptor_heap::{
    DescriptorHeap, DescriptorRegistry, DescriptorSlot, BINDLESS_SAMPLED_IMAGE_BINDING,
    BINDLESS_STORAGE_BUFFER_BINDING, BINDLESS_STORAGE_IMAGE_BINDING,
};
use crate::vulkan_format::aspect_mask;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_queue::CommandQueue;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::Texture;

/// Queue families chosen for the three queue types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
    pub copy: u32,
    pub present: Option<u32>,
}

/// Pick a family per queue type, preferring dedicated compute and transfer families
pub(crate) fn choose_queue_families(
    families: &[vk::QueueFamilyProperties],
    can_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let find = |wanted: vk::QueueFlags, excluded: vk::QueueFlags| {
        families
            .iter()
            .position(|f| f.queue_count > 0 && f.queue_flags.contains(wanted) && !f.queue_flags.intersects(excluded))
            .map(|i| i as u32)
    };

    let graphics = find(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, vk::QueueFlags::empty())?;
    let compute = find(vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS).unwrap_or(graphics);
    let copy = find(vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE).unwrap_or(compute);

    let present = if can_present(graphics) {
        Some(graphics)
    } else {
        (0..families.len() as u32).find(|&i| families[i as usize].queue_count > 0 && can_present(i))
    };

    Some(QueueFamilies { graphics, compute, copy, present })
}

/// Distinct families to create one queue each, plus where every queue type lands
pub(crate) fn queue_layout(families: &QueueFamilies) -> (Vec<u32>, [usize; 3], Option<usize>) {
    let mut distinct: Vec<u32> = Vec::new();
    let mut slot_of = |family: u32| match distinct.iter().position(|&f| f == family) {
        Some(index) => index,
        None => {
            distinct.push(family);
            distinct.len() - 1
        }
    };
    let slots = [slot_of(families.graphics), slot_of(families.compute), slot_of(families.copy)];
    let present = families.present.map(&mut slot_of);
    (distinct, slots, present)
}

/// Vulkan device implementation
pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
    adapter_name: String,
}

impl VulkanDevice {
    /// Create a device able to present to `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: VulkanConfig) -> Result<Self> {
        let display_handle = window.display_handle()
            .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to get display handle: {}", e))?;
        let window_extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to get required extensions: {}", e))?;
        Self::create(Some(window), window_extensions, config)
    }

    /// Create a device without presentation support
    pub fn headless(config: VulkanConfig) -> Result<Self> {
        Self::create(None::<&winit::window::Window>, &[], config)
    }

    fn create<W: HasDisplayHandle + HasWindowHandle>(
        window: Option<&W>,
        window_extensions: &[*const std::os::raw::c_char],
        config: VulkanConfig,
    ) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to load Vulkan library: {:?}", e))?;

        let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Quasar")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let validation = config.validation_active();
        let mut extension_names = window_extensions.to_vec();
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layer_names = if validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create Vulkan instance: {:?}", e))?;

        let (debug_utils_loader, debug_messenger) = match create_debug_messenger(&entry, &instance, &config) {
            Ok(debug) => debug,
            Err(e) => {
                unsafe { instance.destroy_instance(None); }
                return Err(e);
            }
        };

        let result = Self::create_device(&entry, &instance, window, &config);
        match result {
            Ok(parts) => Ok(parts.into_device(entry, instance, debug_utils_loader, debug_messenger, &config)),
            Err(e) => {
                unsafe {
                    if let (Some(loader), Some(messenger)) = (&debug_utils_loader, debug_messenger) {
                        loader.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                Err(e)
            }
        }
    }

    /// Everything from physical device selection to the bindless layout
    fn create_device<W: HasDisplayHandle + HasWindowHandle>(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: Option<&W>,
        config: &VulkanConfig,
    ) -> Result<DeviceParts> {
        // Temporary surface, only to find a family that can present
        let surface = match window {
            Some(window) => Some(create_surface(entry, instance, window)?),
            None => None,
        };
        let picked = pick_physical_device(instance, surface.as_ref());
        if let Some((loader, surface)) = &surface {
            unsafe { loader.destroy_surface(*surface, None); }
        }
        let (physical_device, families, adapter_name) = picked?;

        let (distinct, queue_slots, present_queue) = queue_layout(&families);
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = distinct
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let device_extension_names = if window.is_some() {
            vec![ash::khr::swapchain::NAME.as_ptr()]
        } else {
            vec![]
        };

        let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
            .descriptor_indexing(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_partially_bound(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .descriptor_binding_storage_image_update_after_bind(true)
            .descriptor_binding_storage_buffer_update_after_bind(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
            .shader_storage_image_array_non_uniform_indexing(true)
            .shader_storage_buffer_array_non_uniform_indexing(true)
            .timeline_semaphore(true)
            .buffer_device_address(true);
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .features(vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true))
            .push_next(&mut features12)
            .push_next(&mut features13);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .push_next(&mut features2);

        let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
            .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create logical device: {:?}", e))?;

        match Self::create_device_objects(instance, physical_device, &device, &families, config) {
            Ok((allocator, upload_command_pool, bindless_layout, max_bindless_descriptors)) => {
                let queues = distinct
                    .iter()
                    .map(|&family| DeviceQueue {
                        family,
                        handle: Mutex::new(unsafe { device.get_device_queue(family, 0) }),
                    })
                    .collect();
                Ok(DeviceParts {
                    physical_device,
                    device,
                    allocator,
                    queues,
                    queue_slots,
                    present_queue,
                    upload_command_pool,
                    bindless_layout,
                    max_bindless_descriptors,
                    adapter_name,
                })
            }
            Err(e) => {
                unsafe { device.destroy_device(None); }
                Err(e)
            }
        }
    }

    fn create_device_objects(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        families: &QueueFamilies,
        config: &VulkanConfig,
    ) -> Result<(Allocator, vk::CommandPool, vk::DescriptorSetLayout, u32)> {
        let max_bindless_descriptors = bindless_capacity(instance, physical_device, config.max_bindless_descriptors);
        let bindless_layout = create_bindless_layout(device, max_bindless_descriptors)?;

        let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(families.graphics)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_command_pool = match unsafe { device.create_command_pool(&upload_pool_create_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(bindless_layout, None); }
                engine_bail!(InitializationFailed => "quasar::vulkan", "Failed to create upload command pool: {:?}", e);
            }
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        });
        match allocator {
            Ok(allocator) => Ok((allocator, upload_command_pool, bindless_layout, max_bindless_descriptors)),
            Err(e) => {
                unsafe {
                    device.destroy_command_pool(upload_command_pool, None);
                    device.destroy_descriptor_set_layout(bindless_layout, None);
                }
                Err(engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create GPU allocator: {:?}", e))
            }
        }
    }

    /// Create a swapchain presenting to `window`
    ///
    /// The device must have been created with [`VulkanDevice::new`] for a
    /// window on the same display.
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        width: u32,
        height: u32,
    ) -> Result<Swapchain> {
        let (surface_loader, surface) = create_surface(&self.ctx.entry, &self.ctx.instance, window)?;

        let supported = match self.ctx.present_queue {
            Some(index) => unsafe {
                surface_loader
                    .get_physical_device_surface_support(self.ctx.physical_device, self.ctx.queues[index].family, surface)
                    .unwrap_or(false)
            },
            None => false,
        };
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None); }
            engine_bail!(InitializationFailed => "quasar::vulkan", "Device cannot present to this window");
        }

        Swapchain::new(self.ctx.clone(), surface, surface_loader, width, height)
    }

    /// Name of the physical device
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Capacity of every shader-visible CBV/SRV/UAV heap (after device limits)
    pub fn max_bindless_descriptors(&self) -> u32 {
        self.ctx.max_bindless_descriptors
    }

    /// Validation messages counted since the device was created
    #[cfg(feature = "vulkan-validation")]
    pub fn validation_stats(&self) -> crate::vulkan_config::ValidationStats {
        crate::debug::validation_stats()
    }

    fn create_buffer_slot(&self, buffer: &dyn DeviceBuffer, view: &ViewDesc) -> Result<DescriptorSlot> {
        let native = downcast_buffer(buffer)?;
        let size = buffer.desc().size;
        if !matches!(view.kind, ViewKind::ConstantBuffer | ViewKind::ShaderResource | ViewKind::UnorderedAccess) {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "{:?} view of buffer '{}'", view.kind, buffer.desc().name);
        }
        let range = if view.size == 0 { size.saturating_sub(view.offset) } else { view.size };
        if range == 0 || view.offset.checked_add(range).map_or(true, |end| end > size) {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "View {}+{} outside buffer '{}' ({} bytes)", view.offset, range, buffer.desc().name, size);
        }
        Ok(DescriptorSlot::Buffer {
            buffer: native.buffer,
            offset: view.offset,
            range,
            kind: view.kind,
        })
    }

    fn create_image_slot(&self, texture: &dyn DeviceTexture, view: &ViewDesc) -> Result<DescriptorSlot> {
        let native = downcast_texture(texture)?;
        let info = texture.info();
        if view.kind == ViewKind::ConstantBuffer {
            engine_bail!(InvalidResource => "quasar::vulkan", "Constant buffer view of a texture");
        }

        // Writable and attachment views address mip 0 only
        let level_count = match view.kind {
            ViewKind::ShaderResource => info.mip_levels.max(1),
            _ => 1,
        };
        let view_type = if info.is_array() { vk::ImageViewType::TYPE_2D_ARRAY } else { vk::ImageViewType::TYPE_2D };
        let create_info = vk::ImageViewCreateInfo::default()
            .image(native.image)
            .view_type(view_type)
            .format(native.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(info.format, view.kind == ViewKind::ShaderResource),
                base_mip_level: 0,
                level_count,
                base_array_layer: 0,
                layer_count: info.array_layers.max(1),
            });

        let image_view = unsafe { self.ctx.device.create_image_view(&create_info, None) }
            .map_err(|e| engine_err!("quasar::vulkan", "Failed to create {:?} image view: {:?}", view.kind, e))?;

        Ok(DescriptorSlot::Image {
            image: native.image,
            view: image_view,
            kind: view.kind,
            owned: true,
        })
    }
}

/// Heap type a view kind may be written to
fn heap_type_for(kind: ViewKind) -> DescriptorHeapType {
    match kind {
        ViewKind::RenderTarget => DescriptorHeapType::RenderTarget,
        ViewKind::DepthStencil => DescriptorHeapType::DepthStencil,
        _ => DescriptorHeapType::CbvSrvUav,
    }
}

/// Native objects created between instance and context
struct DeviceParts {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    allocator: Allocator,
    queues: Vec<DeviceQueue>,
    queue_slots: [usize; 3],
    present_queue: Option<usize>,
    upload_command_pool: vk::CommandPool,
    bindless_layout: vk::DescriptorSetLayout,
    max_bindless_descriptors: u32,
    adapter_name: String,
}

impl DeviceParts {
    fn into_device(
        self,
        entry: ash::Entry,
        instance: ash::Instance,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
        config: &VulkanConfig,
    ) -> VulkanDevice {
        engine_info!("quasar::vulkan", "Vulkan device created on '{}' ({} queues, present: {}, bindless capacity {}, validation: {})",
            self.adapter_name, self.queues.len(), self.present_queue.is_some(),
            self.max_bindless_descriptors, config.validation_active());

        let ctx = Arc::new(GpuContext {
            entry,
            instance,
            physical_device: self.physical_device,
            device: self.device,
            allocator: ManuallyDrop::new(Mutex::new(self.allocator)),
            queues: self.queues,
            queue_slots: self.queue_slots,
            present_queue: self.present_queue,
            upload_command_pool: Mutex::new(self.upload_command_pool),
            bindless_layout: self.bindless_layout,
            max_bindless_descriptors: self.max_bindless_descriptors,
            descriptors: DescriptorRegistry::new(),
            samplers: Mutex::new(SamplerCache::new()),
            present_sync: Mutex::new(PresentSync::default()),
            debug_utils_loader,
            debug_messenger,
        });

        VulkanDevice { ctx, adapter_name: self.adapter_name }
    }
}

fn create_surface<W: HasDisplayHandle + HasWindowHandle>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<(ash::khr::surface::Instance, vk::SurfaceKHR)> {
    let display_handle = window.display_handle()
        .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to get display handle: {}", e))?;
    let window_handle = window.window_handle()
        .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to get window handle: {}", e))?;
    let surface = unsafe {
        ash_window::create_surface(entry, instance, display_handle.as_raw(), window_handle.as_raw(), None)
    }
    .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create surface: {:?}", e))?;
    Ok((ash::khr::surface::Instance::new(entry, instance), surface))
}

/// First Vulkan 1.3 device with usable queues, discrete GPUs first
fn pick_physical_device(
    instance: &ash::Instance,
    surface: Option<&(ash::khr::surface::Instance, vk::SurfaceKHR)>,
) -> Result<(vk::PhysicalDevice, QueueFamilies, String)> {
    let physical_devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to enumerate physical devices: {:?}", e))?;

    let mut candidates = Vec::new();
    for physical_device in physical_devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = properties.device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown device".to_string());

        if properties.api_version < vk::API_VERSION_1_3 {
            engine_debug!("quasar::vulkan", "Skipping '{}': Vulkan 1.3 not supported", name);
            continue;
        }

        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let can_present = |family: u32| match surface {
            Some((loader, surface)) => unsafe {
                loader.get_physical_device_surface_support(physical_device, family, *surface).unwrap_or(false)
            },
            None => false,
        };
        let families = match choose_queue_families(&queue_families, can_present) {
            Some(families) if surface.is_none() || families.present.is_some() => families,
            _ => {
                engine_debug!("quasar::vulkan", "Skipping '{}': no suitable queue families", name);
                continue;
            }
        };

        let rank = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 0,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
            _ => 3,
        };
        candidates.push((rank, physical_device, families, name));
    }

    candidates.sort_by_key(|(rank, ..)| *rank);
    match candidates.into_iter().next() {
        Some((_, physical_device, families, name)) => {
            engine_info!("quasar::vulkan", "Using GPU '{}' (graphics family {}, compute {}, copy {})",
                name, families.graphics, families.compute, families.copy);
            Ok((physical_device, families, name))
        }
        None => Err(engine_err!(InitializationFailed => "quasar::vulkan", "No Vulkan 1.3 GPU with usable queues found")),
    }
}

/// Requested bindless capacity, clamped to the update-after-bind limits
fn bindless_capacity(instance: &ash::Instance, physical_device: vk::PhysicalDevice, requested: u32) -> u32 {
    let mut properties12 = vk::PhysicalDeviceVulkan12Properties::default();
    let mut properties = vk::PhysicalDeviceProperties2::default().push_next(&mut properties12);
    unsafe { instance.get_physical_device_properties2(physical_device, &mut properties); }

    let limit = properties12.max_per_stage_descriptor_update_after_bind_sampled_images
        .min(properties12.max_per_stage_descriptor_update_after_bind_storage_images)
        .min(properties12.max_per_stage_descriptor_update_after_bind_storage_buffers);
    if requested > limit {
        engine_warn!("quasar::vulkan", "Bindless capacity {} above device limit, using {}", requested, limit);
        limit
    } else {
        requested
    }
}

fn create_bindless_layout(device: &ash::Device, count: u32) -> Result<vk::DescriptorSetLayout> {
    let binding = |index: u32, ty: vk::DescriptorType| {
        vk::DescriptorSetLayoutBinding::default()
            .binding(index)
            .descriptor_type(ty)
            .descriptor_count(count)
            .stage_flags(vk::ShaderStageFlags::ALL)
    };
    let bindings = [
        binding(BINDLESS_SAMPLED_IMAGE_BINDING, vk::DescriptorType::SAMPLED_IMAGE),
        binding(BINDLESS_STORAGE_IMAGE_BINDING, vk::DescriptorType::STORAGE_IMAGE),
        binding(BINDLESS_STORAGE_BUFFER_BINDING, vk::DescriptorType::STORAGE_BUFFER),
    ];
    let flags = vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND;
    let binding_flags = [flags; 3];
    let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
        .binding_flags(&binding_flags);
    let create_info = vk::DescriptorSetLayoutCreateInfo::default()
        .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
        .bindings(&bindings)
        .push_next(&mut flags_info);

    unsafe { device.create_descriptor_set_layout(&create_info, None) }
        .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create bindless set layout: {:?}", e))
}

#[cfg(feature = "vulkan-validation")]
fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: &VulkanConfig,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    if !config.validation_active() {
        return Ok((None, None));
    }
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    crate::debug::init_debug_config(crate::debug::Config::from(config));

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::severity_flags(config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&debug_info, None) }
        .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create debug messenger: {:?}", e))?;
    Ok((Some(debug_utils), Some(messenger)))
}

#[cfg(not(feature = "vulkan-validation"))]
fn create_debug_messenger(
    _entry: &ash::Entry,
    _instance: &ash::Instance,
    config: &VulkanConfig,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    if config.enable_validation {
        engine_warn!("quasar::vulkan", "Validation requested but the 'vulkan-validation' feature is disabled");
    }
    Ok((None, None))
}

impl GraphicsDevice for VulkanDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Box<dyn DeviceBuffer>> {
        if desc.size == 0 {
            engine_bail!(InvalidResource => "quasar::vulkan", "Buffer '{}' has zero size", desc.name);
        }
        Ok(Box::new(Buffer::new(self.ctx.clone(), desc)?))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Box<dyn DeviceTexture>> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "Texture '{}' has zero extent ({}x{})", desc.name, desc.width, desc.height);
        }
        Ok(Box::new(Texture::new(self.ctx.clone(), desc)?))
    }

    fn create_descriptor_heap(&mut self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DeviceDescriptorHeap>> {
        Ok(Box::new(DescriptorHeap::new(self.ctx.clone(), desc)?))
    }

    fn create_view(&mut self, resource: ResourceRef<'_>, view: &ViewDesc, dest: CpuDescriptorHandle) -> Result<()> {
        let (storage, slot) = self.ctx.descriptors.resolve(dest.0)?;
        let expected = heap_type_for(view.kind);
        if storage.desc.heap_type != expected {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "{:?} view written to {:?} heap '{}'", view.kind, storage.desc.heap_type, storage.desc.name);
        }

        let content = match resource {
            ResourceRef::Buffer(buffer) => self.create_buffer_slot(buffer, view)?,
            ResourceRef::Texture(texture) => self.create_image_slot(texture, view)?,
        };
        if let Err(e) = storage.store(&self.ctx.device, slot, content) {
            if let DescriptorSlot::Image { view, owned: true, .. } = content {
                unsafe { self.ctx.device.destroy_image_view(view, None); }
            }
            return Err(e);
        }
        Ok(())
    }

    fn copy_descriptors(&mut self, dest: CpuDescriptorHandle, src: CpuDescriptorHandle, count: u32) -> Result<()> {
        let (dest_storage, dest_slot) = self.ctx.descriptors.resolve(dest.0)?;
        let (src_storage, src_slot) = self.ctx.descriptors.resolve(src.0)?;
        if dest_storage.desc.heap_type != src_storage.desc.heap_type {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "Descriptor copy from {:?} heap '{}' to {:?} heap '{}'",
                src_storage.desc.heap_type, src_storage.desc.name, dest_storage.desc.heap_type, dest_storage.desc.name);
        }
        for i in 0..count {
            // Copies never own the image view, the source slot does
            let content = src_storage.slot(src_slot + i)?;
            dest_storage.store(&self.ctx.device, dest_slot + i, content)?;
        }
        Ok(())
    }

    fn release_view(&mut self, dest: CpuDescriptorHandle) -> Result<()> {
        let (storage, slot) = self.ctx.descriptors.resolve(dest.0)?;
        storage.store(&self.ctx.device, slot, DescriptorSlot::Empty)
    }

    fn create_pipeline(&mut self, desc: &NativePipelineDesc<'_>) -> Result<Box<dyn DevicePipeline>> {
        Ok(Box::new(Pipeline::new(self.ctx.clone(), desc)?))
    }

    fn create_command_list(&mut self, queue: QueueType) -> Result<Box<dyn DeviceCommandList>> {
        Ok(Box::new(CommandList::new(self.ctx.clone(), queue)?))
    }

    fn create_queue(&mut self, queue: QueueType) -> Result<Box<dyn DeviceCommandQueue>> {
        Ok(Box::new(CommandQueue::new(self.ctx.clone(), queue)?))
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            engine_error!("quasar::vulkan", "Device not idle at teardown: {}", e);
        }
        let holders = Arc::strong_count(&self.ctx) - 1;
        if holders > 0 {
            engine_debug!("quasar::vulkan", "Device dropped, {} objects still hold the GPU context", holders);
        } else {
            engine_info!("quasar::vulkan", "Vulkan device destroyed");
        }
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
