//! Buffer description, usage table and buffer wrapper

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{CommandList, ImageFormat, NativeBuffer, RenderDevice, ResourceId, ShaderStageFlags};
use crate::rhi_warn;

// ===== BUFFER TYPE =====

/// What a buffer is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Unknown,
    Constant,
    Vertex,
    DynamicVertex,
    Index,
    DynamicIndex,
    UavBuffer,
    UavTexture1D,
    UavTexture2D,
    UavTexture3D,
    Structured,
    AppendStructured,
    IndirectDrawArguments,
}

bitflags! {
    /// Logical pipeline bindings of a buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferBindFlags: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const CONSTANT = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
    }
}

bitflags! {
    /// Host access to buffer memory
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuAccess: u32 {
        const WRITE = 1 << 0;
        const READ = 1 << 1;
    }
}

bitflags! {
    /// Extra buffer properties
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferMiscFlags: u32 {
        const STRUCTURED = 1 << 0;
        const APPEND = 1 << 1;
        const DRAW_INDIRECT_ARGS = 1 << 2;
    }
}

/// Backend-neutral usage of a buffer type
///
/// Every backend derives its native flags from this table and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage {
    pub bind: BufferBindFlags,
    pub cpu_access: CpuAccess,
    pub misc: BufferMiscFlags,
    /// Frequently rewritten from the host
    pub dynamic: bool,
}

impl BufferType {
    /// Usage table entry for this type
    pub fn usage(&self) -> BufferUsage {
        let uav = BufferBindFlags::SHADER_RESOURCE | BufferBindFlags::UNORDERED_ACCESS;
        let (bind, dynamic, misc) = match self {
            BufferType::Constant => (BufferBindFlags::CONSTANT, true, BufferMiscFlags::empty()),
            BufferType::DynamicVertex => (BufferBindFlags::VERTEX, true, BufferMiscFlags::empty()),
            BufferType::Vertex => (BufferBindFlags::VERTEX, false, BufferMiscFlags::empty()),
            BufferType::DynamicIndex => (BufferBindFlags::INDEX, true, BufferMiscFlags::empty()),
            BufferType::Index => (BufferBindFlags::INDEX, false, BufferMiscFlags::empty()),
            BufferType::UavBuffer
            | BufferType::UavTexture1D
            | BufferType::UavTexture2D
            | BufferType::UavTexture3D => (uav, false, BufferMiscFlags::empty()),
            BufferType::Structured => (uav, false, BufferMiscFlags::STRUCTURED),
            BufferType::AppendStructured => (uav, false, BufferMiscFlags::STRUCTURED | BufferMiscFlags::APPEND),
            BufferType::IndirectDrawArguments => (uav, false, BufferMiscFlags::DRAW_INDIRECT_ARGS),
            BufferType::Unknown => (BufferBindFlags::SHADER_RESOURCE, false, BufferMiscFlags::empty()),
        };

        BufferUsage {
            bind,
            cpu_access: if dynamic { CpuAccess::WRITE } else { CpuAccess::empty() },
            misc,
            dynamic,
        }
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self, BufferType::Vertex | BufferType::DynamicVertex)
    }

    pub fn is_index(&self) -> bool {
        matches!(self, BufferType::Index | BufferType::DynamicIndex)
    }

    /// Backed by a texture rather than a linear allocation
    pub fn is_texture(&self) -> bool {
        matches!(self, BufferType::UavTexture1D | BufferType::UavTexture2D | BufferType::UavTexture3D)
    }

    /// Element size/count semantics apply (`size * stride` bytes)
    pub fn is_element_array(&self) -> bool {
        matches!(
            self,
            BufferType::Structured | BufferType::AppendStructured | BufferType::IndirectDrawArguments
        )
    }
}

// ===== BUFFER DESC =====

/// Storage shape of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferShape {
    /// Linear allocation
    ///
    /// For element arrays (structured, append, indirect) `size` is the size of
    /// one element and the element count is `BufferDesc::stride`.
    Linear { size: u64, single_element_size: u32 },
    /// Texture-backed UAV
    Image { width: u32, height: u32, depth: u32, mip_count: u32 },
}

/// Buffer description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub buffer_type: BufferType,
    pub shape: BufferShape,
    /// View format (UAV and index buffers)
    pub view_format: ImageFormat,
    /// Vertex stride, or element count for element arrays
    pub stride: u32,
}

impl BufferDesc {
    /// Constant buffer of `size` bytes
    pub fn constant(size: u64) -> Self {
        Self {
            buffer_type: BufferType::Constant,
            shape: BufferShape::Linear { size, single_element_size: 0 },
            view_format: ImageFormat::Unknown,
            stride: 0,
        }
    }

    /// Vertex buffer of `size` bytes with `stride` bytes per vertex
    pub fn vertex(size: u64, stride: u32, dynamic: bool) -> Self {
        Self {
            buffer_type: if dynamic { BufferType::DynamicVertex } else { BufferType::Vertex },
            shape: BufferShape::Linear { size, single_element_size: stride },
            view_format: ImageFormat::Unknown,
            stride,
        }
    }

    /// Index buffer of `size` bytes; `format` must be `R16Uint` or `R32Uint`
    pub fn index(size: u64, format: ImageFormat, dynamic: bool) -> Self {
        Self {
            buffer_type: if dynamic { BufferType::DynamicIndex } else { BufferType::Index },
            shape: BufferShape::Linear { size, single_element_size: format.element_size() },
            view_format: format,
            stride: format.element_size(),
        }
    }

    /// Structured buffer of `count` elements of `element_size` bytes
    pub fn structured(element_size: u32, count: u32, append: bool) -> Self {
        Self {
            buffer_type: if append { BufferType::AppendStructured } else { BufferType::Structured },
            shape: BufferShape::Linear { size: element_size as u64, single_element_size: element_size },
            view_format: ImageFormat::Unknown,
            stride: count,
        }
    }

    /// Size of the native allocation in bytes
    pub fn byte_width(&self) -> u64 {
        match self.shape {
            BufferShape::Linear { size, .. } if self.buffer_type.is_element_array() => size * self.stride as u64,
            BufferShape::Linear { size, .. } => size,
            BufferShape::Image { width, height, depth, .. } => {
                width as u64 * height as u64 * depth.max(1) as u64 * self.view_format.bits_per_pixel() as u64 / 8
            }
        }
    }

    /// Index type of an index buffer
    pub fn index_type(&self) -> IndexType {
        if self.view_format == ImageFormat::R16Uint {
            IndexType::U16
        } else {
            IndexType::U32
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.byte_width() == 0 {
            return Err(Error::InvalidResource(format!("{:?} buffer has a zero byte width", self.buffer_type)));
        }
        if self.buffer_type.is_texture() != matches!(self.shape, BufferShape::Image { .. }) {
            return Err(Error::InvalidResource(format!(
                "{:?} buffer shape does not match its type",
                self.buffer_type
            )));
        }
        if self.buffer_type.is_vertex() && self.stride == 0 {
            return Err(Error::InvalidResource("Vertex buffer requires a stride".to_string()));
        }
        Ok(())
    }
}

// ===== BINDING =====

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Access of a shader-visible buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindMode {
    ReadOnly,
    WriteOnly,
}

/// Where a buffer is bound on a command list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferBinding {
    Vertex { slot: u32, stride: u32 },
    Index { index_type: IndexType },
    Constant { index: u32, stages: ShaderStageFlags },
    Resource { index: u32, stages: ShaderStageFlags, mode: BindMode },
}

// ===== BUFFER =====

/// GPU buffer
///
/// Owns its native buffer until [`Buffer::destroy`] is called.
pub struct Buffer {
    id: ResourceId,
    desc: BufferDesc,
    native: Option<Box<dyn NativeBuffer>>,
}

impl Buffer {
    /// Create a buffer, optionally filled with `initial_data`
    pub fn create(device: &RenderDevice, desc: BufferDesc, initial_data: Option<&[u8]>) -> Result<Self> {
        desc.validate()?;
        if let Some(data) = initial_data {
            if data.len() as u64 > desc.byte_width() {
                return Err(Error::InvalidResource(format!(
                    "Initial data ({} bytes) exceeds buffer size ({} bytes)",
                    data.len(),
                    desc.byte_width()
                )));
            }
        }

        let native = device.backend().create_buffer(&desc, initial_data)?;
        Ok(Self {
            id: ResourceId::next(),
            desc,
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_buffer(native);
        }
    }

    /// Binding used by `bind`/`unbind` for this buffer's type
    pub fn binding(&self, index: u32, stages: ShaderStageFlags, mode: BindMode) -> BufferBinding {
        match self.desc.buffer_type {
            BufferType::Constant => BufferBinding::Constant { index, stages },
            BufferType::Vertex | BufferType::DynamicVertex => {
                BufferBinding::Vertex { slot: index, stride: self.desc.stride }
            }
            BufferType::Index | BufferType::DynamicIndex => {
                BufferBinding::Index { index_type: self.desc.index_type() }
            }
            _ => BufferBinding::Resource { index, stages, mode },
        }
    }

    /// Bind for read/write access (constant, vertex and index buffers ignore the mode)
    pub fn bind(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.bind_buffer(self, self.binding(index, stages, BindMode::WriteOnly))
    }

    /// Bind a shader-visible buffer for reads only
    pub fn bind_read_only(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.bind_buffer(self, self.binding(index, stages, BindMode::ReadOnly))
    }

    pub fn unbind(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.unbind_buffer(self.binding(index, stages, BindMode::WriteOnly))
    }

    /// Replace the buffer contents now
    ///
    /// # Errors
    ///
    /// `Error::MappingFailed` if the backend cannot map the buffer; the buffer
    /// is left untouched.
    pub fn update(&self, device: &RenderDevice, data: &[u8]) -> Result<()> {
        self.check_update_size(data)?;
        device.backend().update_buffer(self.native()?, data)
    }

    /// Record a contents update on `cmd`
    pub fn update_async(&self, cmd: &mut CommandList, data: &[u8]) -> Result<()> {
        self.check_update_size(data)?;
        cmd.update_buffer(self, data)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn native(&self) -> Result<&dyn NativeBuffer> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Buffer used after destroy()".to_string()))
    }

    fn check_update_size(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 > self.desc.byte_width() {
            return Err(Error::InvalidResource(format!(
                "Update of {} bytes exceeds buffer size ({} bytes)",
                data.len(),
                self.desc.byte_width()
            )));
        }
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::Buffer", "Buffer dropped without destroy(), native object leaked");
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
