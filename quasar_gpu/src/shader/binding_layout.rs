/// Binding-layout derivation from shader reflection
///
/// [`BindingLayout::build`] is a pure function of the reflection data of a
/// pipeline's stages and the global sampler table. It produces:
///
/// - one push-constant parameter for the constant buffer declared at
///   [`PUSH_CONSTANT_REGISTER`] (at most one per pipeline)
/// - one constant-buffer-by-address parameter per other constant buffer
/// - one descriptor table holding every shader-resource and
///   unordered-access binding (at most one per pipeline)
/// - a name -> proxy lookup over all of the above
///
/// Samplers never get a proxy: they are resolved against the
/// [`SamplerRegistry`] and baked into the native layout. Resources declared
/// in [`BINDLESS_REGISTER_SPACE`] are the global bindless arrays and are
/// skipped.

use rustc_hash::FxHashMap;
use crate::config::{
    BINDLESS_REGISTER_SPACE, INVALID_PARAMETER, MAX_PUSH_CONSTANT_SIZE, PUSH_CONSTANT_REGISTER,
};
use crate::error::Result;
use crate::graphics_device::ViewKind;
use crate::shader::{ResourceKind, SamplerRegistry, ShaderReflection, ShaderStageFlags};

/// Kind of a layout parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    PushConstants { size: u32 },
    ConstantBuffer { size: u32 },
    DescriptorTable { size: u32 },
}

/// One parameter of the native layout, in parameter-index order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutParameter {
    pub kind: ParameterKind,
    /// Register of the constant buffer; unused for the table
    pub register: u32,
    pub space: u32,
    pub visibility: ShaderStageFlags,
}

/// How a proxy is bound at draw time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyBinding {
    PushConstants,
    ConstantBuffer,
    /// Slot `offset` of the descriptor table
    TableEntry { view: ViewKind, offset: u32 },
}

/// One named binding of the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    pub name: String,
    pub kind: ResourceKind,
    pub binding: ProxyBinding,
    /// Layout parameter this binding lives in
    pub parameter: u32,
    pub register: u32,
    pub space: u32,
    pub visibility: ShaderStageFlags,
}

/// A reflected sampler resolved against the global registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub register: u32,
    pub space: u32,
    /// Index into the registry's sampler table
    pub sampler_index: u32,
    pub visibility: ShaderStageFlags,
}

/// Binding layout of one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingLayout {
    parameters: Vec<LayoutParameter>,
    proxies: Vec<ProxyEntry>,
    lookup: FxHashMap<String, u32>,
    samplers: Vec<SamplerBinding>,
    push_constant_parameter: u32,
    descriptor_table_parameter: u32,
    /// Proxies of the table, in slot order
    table_entries: Vec<u32>,
}

impl BindingLayout {
    /// Derive the layout of a pipeline from its stages' reflection
    ///
    /// Stages are walked in order; a name already registered by an earlier
    /// stage only widens that binding's visibility.
    pub fn build(stages: &[&ShaderReflection], samplers: &SamplerRegistry) -> Result<Self> {
        let mut layout = Self::empty();
        let mut table_space: Option<u32> = None;
        let mut table_proxies: Vec<u32> = Vec::new();
        let mut table_visibility = ShaderStageFlags::empty();

        for reflection in stages {
            let stage = reflection.stage.flag();

            for resource in &reflection.resources {
                if resource.space == BINDLESS_REGISTER_SPACE {
                    continue;
                }

                if resource.kind == ResourceKind::Sampler {
                    layout.add_sampler(resource, stage, samplers)?;
                    continue;
                }

                if let Some(&proxy) = layout.lookup.get(&resource.name) {
                    let entry = &mut layout.proxies[proxy as usize];
                    if entry.kind != resource.kind {
                        crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                            "'{}' declared as {:?} and {:?} in different stages",
                            resource.name, entry.kind, resource.kind);
                    }
                    entry.visibility |= stage;
                    let parameter = entry.parameter;
                    if matches!(entry.binding, ProxyBinding::TableEntry { .. }) {
                        table_visibility |= stage;
                    } else {
                        layout.parameters[parameter as usize].visibility |= stage;
                    }
                    continue;
                }

                let proxy = layout.proxies.len() as u32;
                match &resource.kind {
                    ResourceKind::ConstantBuffer if resource.register == PUSH_CONSTANT_REGISTER => {
                        if layout.push_constant_parameter != INVALID_PARAMETER {
                            crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                                "Second push-constant block '{}' (only one per pipeline)", resource.name);
                        }
                        if resource.size > MAX_PUSH_CONSTANT_SIZE {
                            crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                                "Push-constant block '{}' is {} bytes (max {})",
                                resource.name, resource.size, MAX_PUSH_CONSTANT_SIZE);
                        }
                        let parameter = layout.push_parameter(ParameterKind::PushConstants { size: resource.size }, resource.register, resource.space, stage);
                        layout.push_constant_parameter = parameter;
                        layout.push_proxy(resource, ProxyBinding::PushConstants, parameter, stage);
                    }
                    ResourceKind::ConstantBuffer => {
                        let parameter = layout.push_parameter(ParameterKind::ConstantBuffer { size: resource.size }, resource.register, resource.space, stage);
                        layout.push_proxy(resource, ProxyBinding::ConstantBuffer, parameter, stage);
                    }
                    ResourceKind::Unknown(type_name) => {
                        crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                            "Resource '{}' has unsupported type '{}'", resource.name, type_name);
                    }
                    kind => {
                        let view = match kind.table_view() {
                            Some(view) => view,
                            None => crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                                "Resource '{}' of type {:?} cannot live in a descriptor table", resource.name, kind),
                        };
                        if resource.count != 1 {
                            crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                                "Array '{}' must be declared in the bindless space {}", resource.name, BINDLESS_REGISTER_SPACE);
                        }
                        match table_space {
                            None => table_space = Some(resource.space),
                            Some(space) if space != resource.space => {
                                crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                                    "'{}' in space {} would need a second descriptor table (table uses space {})",
                                    resource.name, resource.space, space);
                            }
                            Some(_) => {}
                        }
                        let clash = table_proxies.iter().any(|&p| {
                            let other = &layout.proxies[p as usize];
                            other.register == resource.register && other.kind.table_view() == Some(view)
                        });
                        if clash {
                            crate::engine_bail!(InvalidBinding => "quasar::BindingLayout",
                                "'{}' reuses register {} of another table entry", resource.name, resource.register);
                        }
                        table_visibility |= stage;
                        table_proxies.push(proxy);
                        layout.push_proxy(resource, ProxyBinding::TableEntry { view, offset: 0 }, INVALID_PARAMETER, stage);
                    }
                }
            }
        }

        if !table_proxies.is_empty() {
            // Shader-resource views first, then unordered-access views, each by register
            table_proxies.sort_by_key(|&p| {
                let entry = &layout.proxies[p as usize];
                (entry.kind.table_view() == Some(ViewKind::UnorderedAccess), entry.register)
            });
            let parameter = layout.push_parameter(
                ParameterKind::DescriptorTable { size: table_proxies.len() as u32 },
                0,
                table_space.unwrap_or(0),
                table_visibility,
            );
            for (offset, &proxy) in table_proxies.iter().enumerate() {
                let entry = &mut layout.proxies[proxy as usize];
                entry.parameter = parameter;
                if let ProxyBinding::TableEntry { view, .. } = entry.binding {
                    entry.binding = ProxyBinding::TableEntry { view, offset: offset as u32 };
                }
            }
            layout.descriptor_table_parameter = parameter;
            layout.table_entries = table_proxies;
        }

        Ok(layout)
    }

    fn empty() -> Self {
        Self {
            parameters: Vec::new(),
            proxies: Vec::new(),
            lookup: FxHashMap::default(),
            samplers: Vec::new(),
            push_constant_parameter: INVALID_PARAMETER,
            descriptor_table_parameter: INVALID_PARAMETER,
            table_entries: Vec::new(),
        }
    }

    fn push_parameter(&mut self, kind: ParameterKind, register: u32, space: u32, visibility: ShaderStageFlags) -> u32 {
        self.parameters.push(LayoutParameter { kind, register, space, visibility });
        self.parameters.len() as u32 - 1
    }

    fn push_proxy(&mut self, resource: &crate::shader::ReflectedResource, binding: ProxyBinding, parameter: u32, stage: ShaderStageFlags) {
        let proxy = self.proxies.len() as u32;
        self.proxies.push(ProxyEntry {
            name: resource.name.clone(),
            kind: resource.kind.clone(),
            binding,
            parameter,
            register: resource.register,
            space: resource.space,
            visibility: stage,
        });
        self.lookup.insert(resource.name.clone(), proxy);
    }

    fn add_sampler(&mut self, resource: &crate::shader::ReflectedResource, stage: ShaderStageFlags, registry: &SamplerRegistry) -> Result<()> {
        if let Some(existing) = self.samplers.iter_mut().find(|s| s.name == resource.name) {
            existing.visibility |= stage;
            return Ok(());
        }
        let sampler_index = registry.index_of(&resource.name).ok_or_else(|| {
            crate::engine_err!(InvalidBinding => "quasar::BindingLayout",
                "Sampler '{}' is not registered", resource.name)
        })?;
        self.samplers.push(SamplerBinding {
            name: resource.name.clone(),
            register: resource.register,
            space: resource.space,
            sampler_index,
            visibility: stage,
        });
        Ok(())
    }

    /// Proxy of the binding called `name`
    pub fn proxy(&self, name: &str) -> Option<u32> {
        self.lookup.get(name).copied()
    }

    /// Name of the binding behind `proxy`
    pub fn name(&self, proxy: u32) -> Option<&str> {
        self.proxies.get(proxy as usize).map(|p| p.name.as_str())
    }

    pub fn entry(&self, proxy: u32) -> Option<&ProxyEntry> {
        self.proxies.get(proxy as usize)
    }

    pub fn proxies(&self) -> &[ProxyEntry] {
        &self.proxies
    }

    pub fn parameters(&self) -> &[LayoutParameter] {
        &self.parameters
    }

    pub fn samplers(&self) -> &[SamplerBinding] {
        &self.samplers
    }

    /// Parameter index of the push-constant block, `INVALID_PARAMETER` if none
    pub fn push_constant_parameter(&self) -> u32 {
        self.push_constant_parameter
    }

    /// Parameter index of the descriptor table, `INVALID_PARAMETER` if none
    pub fn descriptor_table_parameter(&self) -> u32 {
        self.descriptor_table_parameter
    }

    /// Number of slots in the descriptor table
    pub fn table_size(&self) -> u32 {
        self.table_entries.len() as u32
    }

    /// Proxies of the table entries, in slot order
    pub fn table_entries(&self) -> &[u32] {
        &self.table_entries
    }

    /// Size of the push-constant block, 0 if none
    pub fn push_constant_size(&self) -> u32 {
        self.parameters
            .get(self.push_constant_parameter as usize)
            .map(|p| match p.kind {
                ParameterKind::PushConstants { size } => size,
                _ => 0,
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "binding_layout_tests.rs"]
mod tests;
