/// SamplerCache - VkSampler objects for static samplers
///
/// Static samplers are baked into pipeline set layouts as immutable samplers.
/// Every pipeline naming the same sampler shares one VkSampler, created on
/// first use and destroyed with the GPU context.

use ash::vk;
use quasar_gpu::quasar::Result;
use quasar_gpu::quasar::shader::{Filter, StaticSampler};
use quasar_gpu::{engine_debug, engine_err};
use rustc_hash::FxHashMap;

use crate::vulkan_format::{address_mode_to_vk, compare_op_to_vk, filter_to_vk};

#[derive(Default)]
pub(crate) struct SamplerCache {
    cache: FxHashMap<String, vk::Sampler>,
}

impl SamplerCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get or create the VkSampler for a static sampler
    pub(crate) fn get_or_create(&mut self, device: &ash::Device, sampler: &StaticSampler) -> Result<vk::Sampler> {
        if let Some(&native) = self.cache.get(&sampler.name) {
            return Ok(native);
        }

        let create_info = sampler_create_info(sampler);
        let native = unsafe {
            device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to create sampler '{}': {:?}", sampler.name, e))?
        };
        engine_debug!("quasar::vulkan", "Sampler '{}' created", sampler.name);
        self.cache.insert(sampler.name.clone(), native);
        Ok(native)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    /// Destroy every cached sampler, the device must still be alive
    pub(crate) fn destroy_all(&mut self, device: &ash::Device) {
        for (_, sampler) in self.cache.drain() {
            unsafe { device.destroy_sampler(sampler, None); }
        }
    }
}

pub(crate) fn sampler_create_info(sampler: &StaticSampler) -> vk::SamplerCreateInfo<'static> {
    let (filter, mipmap) = filter_to_vk(sampler.filter);
    let address = address_mode_to_vk(sampler.address_mode);
    // Comparison samplers usually read shadow maps, outside reads as "lit"
    let border = if sampler.comparison.is_some() {
        vk::BorderColor::FLOAT_OPAQUE_WHITE
    } else {
        vk::BorderColor::FLOAT_OPAQUE_BLACK
    };

    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap)
        .address_mode_u(address)
        .address_mode_v(address)
        .address_mode_w(address)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(border)
        .unnormalized_coordinates(false);

    create_info = match sampler.comparison {
        Some(op) => create_info.compare_enable(true).compare_op(compare_op_to_vk(op)),
        None => create_info.compare_enable(false).compare_op(vk::CompareOp::ALWAYS),
    };

    if sampler.filter == Filter::Anisotropic && sampler.max_anisotropy > 1 {
        create_info.anisotropy_enable(true).max_anisotropy(sampler.max_anisotropy as f32)
    } else {
        create_info.anisotropy_enable(false).max_anisotropy(1.0)
    }
}

#[cfg(test)]
#[path = "vulkan_sampler_tests.rs"]
mod tests;
