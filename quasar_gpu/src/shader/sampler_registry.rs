/// Global static samplers, registered once by name

use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::CompareOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Point,
    Linear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Wrap,
    Clamp,
    Mirror,
    Border,
}

/// Sampler baked into every pipeline layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSampler {
    pub name: String,
    pub filter: Filter,
    pub address_mode: AddressMode,
    /// Comparison samplers (shadow maps)
    pub comparison: Option<CompareOp>,
    pub max_anisotropy: u32,
}

impl StaticSampler {
    pub fn new(name: &str, filter: Filter, address_mode: AddressMode) -> Self {
        Self {
            name: name.to_string(),
            filter,
            address_mode,
            comparison: None,
            max_anisotropy: if filter == Filter::Anisotropic { 16 } else { 1 },
        }
    }
}

/// Name -> sampler table shared by every pipeline of a context
///
/// Shaders refer to samplers by name; the layout builder resolves each
/// reflected sampler here and never gives it a proxy.
#[derive(Debug, Clone, Default)]
pub struct SamplerRegistry {
    samplers: Vec<StaticSampler>,
    lookup: FxHashMap<String, u32>,
}

impl SamplerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the engine's standard samplers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults = [
            StaticSampler::new("point_wrap", Filter::Point, AddressMode::Wrap),
            StaticSampler::new("point_clamp", Filter::Point, AddressMode::Clamp),
            StaticSampler::new("linear_wrap", Filter::Linear, AddressMode::Wrap),
            StaticSampler::new("linear_clamp", Filter::Linear, AddressMode::Clamp),
            StaticSampler::new("anisotropic_wrap", Filter::Anisotropic, AddressMode::Wrap),
            StaticSampler {
                comparison: Some(CompareOp::LessOrEqual),
                ..StaticSampler::new("shadow_compare", Filter::Linear, AddressMode::Border)
            },
        ];
        for sampler in defaults {
            registry.samplers.push(sampler.clone());
            registry.lookup.insert(sampler.name, registry.samplers.len() as u32 - 1);
        }
        registry
    }

    /// Register a sampler, returns its index
    pub fn register(&mut self, sampler: StaticSampler) -> Result<u32> {
        if self.lookup.contains_key(&sampler.name) {
            crate::engine_bail!(InvalidBinding => "quasar::SamplerRegistry",
                "Sampler '{}' already registered", sampler.name);
        }
        let index = self.samplers.len() as u32;
        self.lookup.insert(sampler.name.clone(), index);
        self.samplers.push(sampler);
        Ok(index)
    }

    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.lookup.get(name).copied()
    }

    pub fn samplers(&self) -> &[StaticSampler] {
        &self.samplers
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

#[cfg(test)]
#[path = "sampler_registry_tests.rs"]
mod tests;
