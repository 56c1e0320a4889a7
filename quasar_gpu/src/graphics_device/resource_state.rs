/// Resource access states used for transition decisions

use bitflags::bitflags;

bitflags! {
    /// Access state of a buffer or texture, mirroring the native resource-state model.
    ///
    /// A resource is in exactly one *write* state or any combination of *read*
    /// states. `COMMON` (no bits) is the state of freshly created resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const DEPTH_WRITE = 1 << 4;
        const DEPTH_READ = 1 << 5;
        const NON_PIXEL_SHADER_RESOURCE = 1 << 6;
        const PIXEL_SHADER_RESOURCE = 1 << 7;
        const INDIRECT_ARGUMENT = 1 << 8;
        const COPY_DEST = 1 << 9;
        const COPY_SOURCE = 1 << 10;
        const PRESENT = 1 << 11;

        const ALL_SHADER_RESOURCE = Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits();
        const GENERIC_READ = Self::VERTEX_AND_CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::ALL_SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl ResourceState {
    pub const COMMON: Self = Self::empty();

    /// True if the state allows the GPU to write the resource
    pub fn is_write(&self) -> bool {
        self.intersects(
            Self::RENDER_TARGET | Self::UNORDERED_ACCESS | Self::DEPTH_WRITE | Self::COPY_DEST,
        )
    }
}
