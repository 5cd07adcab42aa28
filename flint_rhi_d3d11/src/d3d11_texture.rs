/// D3D11Texture - Direct3D 11 implementation of NativeTexture
///
/// Depth formats are stored typeless so the same texture can be bound as a
/// depth target and sampled. Render targets build their RTVs/DSVs once at
/// creation: one per (layer, mip) for single-slice binds plus one covering
/// every layer of each mip for flat binds and clears. Array views are used
/// throughout so a single view kind serves every layer count.

use d3d12::ComPtr;
use flint_rhi::flint::render::{
    subresource_index, subresource_layouts, total_byte_size, NativeTexture, SubresourceLayout, SubresourceViewTable,
    TextureDescription, TextureDimension, TextureFlags, ViewKind,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_error, rhi_warn};
use std::mem;
use std::ptr;
use std::sync::{Arc, Mutex};
use winapi::shared::dxgiformat::DXGI_FORMAT;
use winapi::shared::dxgitype::DXGI_SAMPLE_DESC;
use winapi::um::d3d11;
use winapi::um::d3dcommon;

use crate::d3d11_context::{as_resource, check, hresult_code, set_object_name, D3D11Context, HResult, SOURCE};
use crate::d3d11_conv::{depth_formats, srv_dimension, texture_formats};

// ===== CREATION HELPERS =====

/// Shape of the render views of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderViewShape {
    Array1D,
    Array2D,
    MultisampledArray,
    /// W slices of a 3D texture
    Volume,
}

pub(crate) fn render_view_shape(desc: &TextureDescription) -> RenderViewShape {
    match desc.dimension {
        TextureDimension::Texture1D => RenderViewShape::Array1D,
        TextureDimension::Texture3D => RenderViewShape::Volume,
        _ if desc.sampler_count > 1 => RenderViewShape::MultisampledArray,
        _ => RenderViewShape::Array2D,
    }
}

/// Bind and misc flags of the native texture
pub(crate) fn texture_flags(desc: &TextureDescription, render_target: bool, generate_mips: bool) -> (u32, u32) {
    let mut bind = d3d11::D3D11_BIND_SHADER_RESOURCE;
    let mut misc = 0;

    if render_target {
        bind |= if desc.format.is_depth() { d3d11::D3D11_BIND_DEPTH_STENCIL } else { d3d11::D3D11_BIND_RENDER_TARGET };
    }
    if generate_mips {
        bind |= d3d11::D3D11_BIND_RENDER_TARGET;
        misc |= d3d11::D3D11_RESOURCE_MISC_GENERATE_MIPS;
    }
    if matches!(desc.view_kind(), ViewKind::Cube | ViewKind::CubeArray) {
        misc |= d3d11::D3D11_RESOURCE_MISC_TEXTURECUBE;
    }
    (bind, misc)
}

pub(crate) fn sample_desc(desc: &TextureDescription) -> DXGI_SAMPLE_DESC {
    let pattern = desc.sampler_count > 1 && desc.flags.contains(TextureFlags::MULTISAMPLE_PATTERN);
    DXGI_SAMPLE_DESC {
        Count: desc.sampler_count,
        Quality: if pattern { d3d11::D3D11_STANDARD_MULTISAMPLE_PATTERN } else { 0 },
    }
}

/// Shader resource view covering every layer and mip
pub(crate) fn shader_view_desc(desc: &TextureDescription, format: DXGI_FORMAT) -> d3d11::D3D11_SHADER_RESOURCE_VIEW_DESC {
    let kind = desc.view_kind();
    let mips = desc.mip_count;
    let layers = desc.array_size;

    unsafe {
        let mut view: d3d11::D3D11_SHADER_RESOURCE_VIEW_DESC = mem::zeroed();
        view.Format = format;
        view.ViewDimension = srv_dimension(kind);
        match kind {
            ViewKind::Texture1D => {
                *view.u.Texture1D_mut() = d3d11::D3D11_TEX1D_SRV { MostDetailedMip: 0, MipLevels: mips };
            }
            ViewKind::Texture1DArray => {
                *view.u.Texture1DArray_mut() = d3d11::D3D11_TEX1D_ARRAY_SRV {
                    MostDetailedMip: 0,
                    MipLevels: mips,
                    FirstArraySlice: 0,
                    ArraySize: layers,
                };
            }
            ViewKind::Texture2D => {
                *view.u.Texture2D_mut() = d3d11::D3D11_TEX2D_SRV { MostDetailedMip: 0, MipLevels: mips };
            }
            ViewKind::Texture2DArray => {
                *view.u.Texture2DArray_mut() = d3d11::D3D11_TEX2D_ARRAY_SRV {
                    MostDetailedMip: 0,
                    MipLevels: mips,
                    FirstArraySlice: 0,
                    ArraySize: layers,
                };
            }
            ViewKind::Cube => {
                *view.u.TextureCube_mut() = d3d11::D3D11_TEXCUBE_SRV { MostDetailedMip: 0, MipLevels: mips };
            }
            ViewKind::CubeArray => {
                *view.u.TextureCubeArray_mut() = d3d11::D3D11_TEXCUBE_ARRAY_SRV {
                    MostDetailedMip: 0,
                    MipLevels: mips,
                    First2DArrayFace: 0,
                    NumCubes: layers / 6,
                };
            }
            ViewKind::Multisampled => {}
            ViewKind::MultisampledArray => {
                *view.u.Texture2DMSArray_mut() = d3d11::D3D11_TEX2DMS_ARRAY_SRV { FirstArraySlice: 0, ArraySize: layers };
            }
            ViewKind::Texture3D => {
                *view.u.Texture3D_mut() = d3d11::D3D11_TEX3D_SRV { MostDetailedMip: 0, MipLevels: mips };
            }
        }
        view
    }
}

/// Render target view of `count` slices starting at `first` (W slices for volumes)
pub(crate) fn color_view_desc(
    shape: RenderViewShape,
    format: DXGI_FORMAT,
    mip: u32,
    first: u32,
    count: u32,
) -> d3d11::D3D11_RENDER_TARGET_VIEW_DESC {
    unsafe {
        let mut view: d3d11::D3D11_RENDER_TARGET_VIEW_DESC = mem::zeroed();
        view.Format = format;
        match shape {
            RenderViewShape::Array1D => {
                view.ViewDimension = d3d11::D3D11_RTV_DIMENSION_TEXTURE1DARRAY;
                *view.u.Texture1DArray_mut() =
                    d3d11::D3D11_TEX1D_ARRAY_RTV { MipSlice: mip, FirstArraySlice: first, ArraySize: count };
            }
            RenderViewShape::Array2D => {
                view.ViewDimension = d3d11::D3D11_RTV_DIMENSION_TEXTURE2DARRAY;
                *view.u.Texture2DArray_mut() =
                    d3d11::D3D11_TEX2D_ARRAY_RTV { MipSlice: mip, FirstArraySlice: first, ArraySize: count };
            }
            RenderViewShape::MultisampledArray => {
                view.ViewDimension = d3d11::D3D11_RTV_DIMENSION_TEXTURE2DMSARRAY;
                *view.u.Texture2DMSArray_mut() = d3d11::D3D11_TEX2DMS_ARRAY_RTV { FirstArraySlice: first, ArraySize: count };
            }
            RenderViewShape::Volume => {
                view.ViewDimension = d3d11::D3D11_RTV_DIMENSION_TEXTURE3D;
                *view.u.Texture3D_mut() = d3d11::D3D11_TEX3D_RTV { MipSlice: mip, FirstWSlice: first, WSize: count };
            }
        }
        view
    }
}

/// Depth-stencil view of `count` layers starting at `first`
pub(crate) fn depth_view_desc(
    shape: RenderViewShape,
    format: DXGI_FORMAT,
    mip: u32,
    first: u32,
    count: u32,
) -> Result<d3d11::D3D11_DEPTH_STENCIL_VIEW_DESC> {
    unsafe {
        let mut view: d3d11::D3D11_DEPTH_STENCIL_VIEW_DESC = mem::zeroed();
        view.Format = format;
        match shape {
            RenderViewShape::Array1D => {
                view.ViewDimension = d3d11::D3D11_DSV_DIMENSION_TEXTURE1DARRAY;
                *view.u.Texture1DArray_mut() =
                    d3d11::D3D11_TEX1D_ARRAY_DSV { MipSlice: mip, FirstArraySlice: first, ArraySize: count };
            }
            RenderViewShape::Array2D => {
                view.ViewDimension = d3d11::D3D11_DSV_DIMENSION_TEXTURE2DARRAY;
                *view.u.Texture2DArray_mut() =
                    d3d11::D3D11_TEX2D_ARRAY_DSV { MipSlice: mip, FirstArraySlice: first, ArraySize: count };
            }
            RenderViewShape::MultisampledArray => {
                view.ViewDimension = d3d11::D3D11_DSV_DIMENSION_TEXTURE2DMSARRAY;
                *view.u.Texture2DMSArray_mut() = d3d11::D3D11_TEX2DMS_ARRAY_DSV { FirstArraySlice: first, ArraySize: count };
            }
            RenderViewShape::Volume => {
                return Err(Error::InvalidResource("3D textures cannot be depth targets".to_string()));
            }
        }
        Ok(view)
    }
}

/// Copy a mapped subresource into walk layout, dropping the driver's row padding
pub(crate) fn pack_rows(mapped: &[u8], row_pitch: usize, depth_pitch: usize, layout: &SubresourceLayout) -> Vec<u8> {
    let row_bytes = layout.row_pitch as usize;
    let mut packed = Vec::with_capacity(layout.size as usize);
    for slice in 0..layout.depth as usize {
        for row in 0..layout.num_rows as usize {
            let start = slice * depth_pitch + row * row_pitch;
            packed.extend_from_slice(&mapped[start..start + row_bytes]);
        }
    }
    packed
}

/// Bytes a mapped subresource spans, up to the end of its last row
pub(crate) fn mapped_span(row_pitch: usize, depth_pitch: usize, layout: &SubresourceLayout) -> usize {
    (layout.depth as usize - 1) * depth_pitch + (layout.num_rows as usize - 1) * row_pitch + layout.row_pitch as usize
}

// ===== TEXTURE =====

/// Render views of a render target
pub(crate) enum TargetViews {
    Color {
        layers: SubresourceViewTable<ComPtr<d3d11::ID3D11RenderTargetView>>,
        flat: Vec<ComPtr<d3d11::ID3D11RenderTargetView>>,
    },
    Depth {
        layers: SubresourceViewTable<ComPtr<d3d11::ID3D11DepthStencilView>>,
        flat: Vec<ComPtr<d3d11::ID3D11DepthStencilView>>,
    },
}

/// Direct3D 11 texture / render target
pub struct D3D11Texture {
    ctx: Arc<D3D11Context>,
    resource: ComPtr<d3d11::ID3D11Resource>,
    pub(crate) desc: TextureDescription,
    storage_format: DXGI_FORMAT,
    pub(crate) srv: ComPtr<d3d11::ID3D11ShaderResourceView>,
    targets: Option<TargetViews>,
    debug_name: Mutex<String>,
}

// SAFETY: resources and views are free-threaded in D3D11
unsafe impl Send for D3D11Texture {}
unsafe impl Sync for D3D11Texture {}

impl NativeTexture for D3D11Texture {}

impl D3D11Texture {
    /// Create a sampled texture, or a render target when `render_target` is set
    pub(crate) fn create(
        ctx: &Arc<D3D11Context>,
        desc: &TextureDescription,
        initial_data: Option<&[u8]>,
        render_target: bool,
    ) -> Result<Self> {
        desc.validate()?;
        if matches!(desc.dimension, TextureDimension::Unknown | TextureDimension::Buffer) {
            return Err(Error::InvalidResource(format!("{:?} textures are not images", desc.dimension)));
        }
        if desc.dimension == TextureDimension::Texture3D && desc.array_size > 1 {
            return Err(Error::InvalidResource("3D textures cannot be arrays".to_string()));
        }
        if desc.sampler_count > 1 && (desc.mip_count > 1 || initial_data.is_some()) {
            return Err(Error::InvalidResource(
                "Multisampled textures take neither mips nor initial data".to_string(),
            ));
        }
        if render_target && desc.format.is_compressed() {
            return Err(Error::InvalidResource(format!("{:?} cannot be a render target", desc.format)));
        }
        if render_target && desc.format.is_depth() && desc.dimension == TextureDimension::Texture3D {
            return Err(Error::InvalidResource("3D textures cannot be depth targets".to_string()));
        }
        if let Some(data) = initial_data {
            let expected = total_byte_size(desc);
            if data.len() as u64 != expected {
                return Err(Error::InvalidResource(format!(
                    "Texture initial data is {} bytes, expected {}",
                    data.len(),
                    expected
                )));
            }
        }

        let (storage_format, shader_format) = texture_formats(desc.format);
        let generate_mips = desc.flags.contains(TextureFlags::HARDWARE_MIP_GEN)
            && desc.mip_count > 1
            && !desc.format.is_depth()
            && supports_mip_autogen(ctx, shader_format);
        let (bind, misc) = texture_flags(desc, render_target, generate_mips);

        let init: Option<Vec<d3d11::D3D11_SUBRESOURCE_DATA>> = initial_data.map(|data| {
            subresource_layouts(desc)
                .iter()
                .map(|layout| d3d11::D3D11_SUBRESOURCE_DATA {
                    pSysMem: data[layout.offset as usize..].as_ptr() as *const _,
                    // D3D11 caps a single resource well under 4 GiB
                    SysMemPitch: layout.row_pitch as u32,
                    SysMemSlicePitch: layout.slice_pitch.min(u32::MAX as u64) as u32,
                })
                .collect()
        });
        let init_ptr = init.as_ref().map_or(ptr::null(), |init| init.as_ptr());

        let resource = create_resource(
            ctx,
            desc,
            storage_format,
            NativeUsage { usage: d3d11::D3D11_USAGE_DEFAULT, bind, cpu_access: 0, misc },
            desc.array_size,
            init_ptr,
        )?;

        let mut srv = ComPtr::<d3d11::ID3D11ShaderResourceView>::null();
        let view = shader_view_desc(desc, shader_format);
        check(
            unsafe { ctx.device.CreateShaderResourceView(resource.as_mut_ptr(), &view, srv.mut_self()) },
            "CreateShaderResourceView",
        )?;

        if generate_mips {
            unsafe { ctx.immediate().GenerateMips(srv.as_mut_ptr()) };
        }

        let targets = if render_target { Some(create_target_views(ctx, desc, &resource)?) } else { None };

        Ok(Self {
            ctx: ctx.clone(),
            resource,
            desc: *desc,
            storage_format,
            srv,
            targets,
            debug_name: Mutex::new(String::new()),
        })
    }

    pub(crate) fn resource(&self) -> *mut d3d11::ID3D11Resource {
        self.resource.as_mut_ptr()
    }

    pub(crate) fn is_render_target(&self) -> bool {
        self.targets.is_some()
    }

    pub(crate) fn is_depth(&self) -> bool {
        matches!(self.targets, Some(TargetViews::Depth { .. }))
    }

    /// Color view for a bind: one layer, or every layer (`None`) of `mip`
    pub(crate) fn color_view(&self, layer: Option<u32>, mip: u32) -> Option<*mut d3d11::ID3D11RenderTargetView> {
        match &self.targets {
            Some(TargetViews::Color { layers, flat }) => match layer {
                Some(layer) => layers.get(layer, mip).map(|view| view.as_mut_ptr()),
                None => flat.get(mip as usize).map(|view| view.as_mut_ptr()),
            },
            _ => None,
        }
    }

    /// Depth view for a bind: one layer, or every layer (`None`) of `mip`
    pub(crate) fn depth_view(&self, layer: Option<u32>, mip: u32) -> Option<*mut d3d11::ID3D11DepthStencilView> {
        match &self.targets {
            Some(TargetViews::Depth { layers, flat }) => match layer {
                Some(layer) => layers.get(layer, mip).map(|view| view.as_mut_ptr()),
                None => flat.get(mip as usize).map(|view| view.as_mut_ptr()),
            },
            _ => None,
        }
    }

    /// Every-layer color views, one per mip
    pub(crate) fn flat_color_views(&self) -> Vec<*mut d3d11::ID3D11RenderTargetView> {
        match &self.targets {
            Some(TargetViews::Color { flat, .. }) => flat.iter().map(|view| view.as_mut_ptr()).collect(),
            _ => Vec::new(),
        }
    }

    /// Every-layer depth views, one per mip
    pub(crate) fn flat_depth_views(&self) -> Vec<*mut d3d11::ID3D11DepthStencilView> {
        match &self.targets {
            Some(TargetViews::Depth { flat, .. }) => flat.iter().map(|view| view.as_mut_ptr()).collect(),
            _ => Vec::new(),
        }
    }

    /// Read one subresource back into host memory, laid out like the upload walk
    pub(crate) fn read_subresource(&self, layer: u32, mip: u32) -> Result<Vec<u8>> {
        if self.desc.sampler_count > 1 {
            return Err(Error::InvalidResource("Multisampled textures cannot be read back".to_string()));
        }
        let layout = subresource_layouts(&self.desc)
            .into_iter()
            .find(|layout| layout.layer == layer && layout.mip == mip)
            .ok_or_else(|| {
                Error::InvalidResource(format!("Subresource (layer {}, mip {}) out of range", layer, mip))
            })?;

        // One layer with the full mip chain keeps block-compressed mips valid
        let staging_desc = TextureDescription { array_size: 1, flags: TextureFlags::empty(), ..self.desc };
        let staging = create_resource(
            &self.ctx,
            &staging_desc,
            self.storage_format,
            NativeUsage {
                usage: d3d11::D3D11_USAGE_STAGING,
                bind: 0,
                cpu_access: d3d11::D3D11_CPU_ACCESS_READ,
                misc: 0,
            },
            1,
            ptr::null(),
        )?;

        let source = subresource_index(layer, mip, self.desc.mip_count);
        let immediate = self.ctx.immediate();
        unsafe {
            immediate.CopySubresourceRegion(staging.as_mut_ptr(), mip, 0, 0, 0, self.resource.as_mut_ptr(), source, ptr::null());

            let mut mapped: d3d11::D3D11_MAPPED_SUBRESOURCE = mem::zeroed();
            let hr = immediate.Map(staging.as_mut_ptr(), mip, d3d11::D3D11_MAP_READ, 0, &mut mapped);
            if let Err(hr) = hr.into_result() {
                rhi_error!(SOURCE, "Failed to map readback texture! ({})", hresult_code(hr));
                return Err(Error::MappingFailed(format!("Map returned {}", hresult_code(hr))));
            }

            let row_pitch = mapped.RowPitch as usize;
            let depth_pitch = mapped.DepthPitch as usize;
            let bytes =
                std::slice::from_raw_parts(mapped.pData as *const u8, mapped_span(row_pitch, depth_pitch, &layout));
            let packed = pack_rows(bytes, row_pitch, depth_pitch, &layout);
            immediate.Unmap(staging.as_mut_ptr(), mip);
            Ok(packed)
        }
    }

    pub(crate) fn set_debug_name(&self, name: &str) {
        unsafe { set_object_name(self.resource.as_mut_ptr() as *mut d3d11::ID3D11DeviceChild, name) };
        if let Ok(mut debug_name) = self.debug_name.lock() {
            *debug_name = name.to_string();
        }
    }

    pub fn debug_name(&self) -> String {
        self.debug_name.lock().map(|name| name.clone()).unwrap_or_default()
    }
}

fn supports_mip_autogen(ctx: &D3D11Context, format: DXGI_FORMAT) -> bool {
    let mut support = 0u32;
    let hr = unsafe { ctx.device.CheckFormatSupport(format, &mut support) };
    let supported = hr.into_result().is_ok() && support & d3d11::D3D11_FORMAT_SUPPORT_MIP_AUTOGEN != 0;
    if !supported {
        rhi_warn!(SOURCE, "Format {} does not support hardware mip generation, mips left as uploaded", format);
    }
    supported
}

struct NativeUsage {
    usage: d3d11::D3D11_USAGE,
    bind: u32,
    cpu_access: u32,
    misc: u32,
}

fn create_resource(
    ctx: &D3D11Context,
    desc: &TextureDescription,
    format: DXGI_FORMAT,
    usage: NativeUsage,
    array_size: u32,
    init: *const d3d11::D3D11_SUBRESOURCE_DATA,
) -> Result<ComPtr<d3d11::ID3D11Resource>> {
    unsafe {
        match desc.dimension {
            TextureDimension::Texture1D => {
                let native = d3d11::D3D11_TEXTURE1D_DESC {
                    Width: desc.width,
                    MipLevels: desc.mip_count,
                    ArraySize: array_size,
                    Format: format,
                    Usage: usage.usage,
                    BindFlags: usage.bind,
                    CPUAccessFlags: usage.cpu_access,
                    MiscFlags: usage.misc,
                };
                let mut texture = ComPtr::<d3d11::ID3D11Texture1D>::null();
                check(ctx.device.CreateTexture1D(&native, init, texture.mut_self()), "CreateTexture1D")?;
                as_resource(&texture)
            }
            TextureDimension::Texture3D => {
                let native = d3d11::D3D11_TEXTURE3D_DESC {
                    Width: desc.width,
                    Height: desc.height,
                    Depth: desc.depth,
                    MipLevels: desc.mip_count,
                    Format: format,
                    Usage: usage.usage,
                    BindFlags: usage.bind,
                    CPUAccessFlags: usage.cpu_access,
                    MiscFlags: usage.misc,
                };
                let mut texture = ComPtr::<d3d11::ID3D11Texture3D>::null();
                check(ctx.device.CreateTexture3D(&native, init, texture.mut_self()), "CreateTexture3D")?;
                as_resource(&texture)
            }
            _ => {
                let native = d3d11::D3D11_TEXTURE2D_DESC {
                    Width: desc.width,
                    Height: desc.height,
                    MipLevels: desc.mip_count,
                    ArraySize: array_size,
                    Format: format,
                    SampleDesc: sample_desc(desc),
                    Usage: usage.usage,
                    BindFlags: usage.bind,
                    CPUAccessFlags: usage.cpu_access,
                    MiscFlags: usage.misc,
                };
                let mut texture = ComPtr::<d3d11::ID3D11Texture2D>::null();
                check(ctx.device.CreateTexture2D(&native, init, texture.mut_self()), "CreateTexture2D")?;
                as_resource(&texture)
            }
        }
    }
}

fn create_target_views(
    ctx: &D3D11Context,
    desc: &TextureDescription,
    resource: &ComPtr<d3d11::ID3D11Resource>,
) -> Result<TargetViews> {
    let shape = render_view_shape(desc);

    if let Some(formats) = depth_formats(desc.format) {
        let create = |mip: u32, first: u32, count: u32| -> Result<ComPtr<d3d11::ID3D11DepthStencilView>> {
            let view_desc = depth_view_desc(shape, formats.depth_view, mip, first, count)?;
            let mut view = ComPtr::<d3d11::ID3D11DepthStencilView>::null();
            check(
                unsafe { ctx.device.CreateDepthStencilView(resource.as_mut_ptr(), &view_desc, view.mut_self()) },
                "CreateDepthStencilView",
            )?;
            Ok(view)
        };
        let layers = SubresourceViewTable::build(desc.array_size, desc.mip_count, |layer, mip| create(mip, layer, 1))?;
        let flat = (0..desc.mip_count).map(|mip| create(mip, 0, desc.array_size)).collect::<Result<Vec<_>>>()?;
        return Ok(TargetViews::Depth { layers, flat });
    }

    let format = texture_formats(desc.format).0;
    let create = |mip: u32, first: u32, count: u32| -> Result<ComPtr<d3d11::ID3D11RenderTargetView>> {
        let view_desc = color_view_desc(shape, format, mip, first, count);
        let mut view = ComPtr::<d3d11::ID3D11RenderTargetView>::null();
        check(
            unsafe { ctx.device.CreateRenderTargetView(resource.as_mut_ptr(), &view_desc, view.mut_self()) },
            "CreateRenderTargetView",
        )?;
        Ok(view)
    };

    let (layers, flat) = if shape == RenderViewShape::Volume {
        // Single W slices are addressable on mip 0 only
        let layers = SubresourceViewTable::build(desc.depth, 1, |slice, _| create(0, slice, 1))?;
        let flat = (0..desc.mip_count)
            .map(|mip| create(mip, 0, desc.mip_extent(mip).2))
            .collect::<Result<Vec<_>>>()?;
        (layers, flat)
    } else {
        let layers = SubresourceViewTable::build(desc.array_size, desc.mip_count, |layer, mip| create(mip, layer, 1))?;
        let flat = (0..desc.mip_count).map(|mip| create(mip, 0, desc.array_size)).collect::<Result<Vec<_>>>()?;
        (layers, flat)
    };
    Ok(TargetViews::Color { layers, flat })
}

#[cfg(test)]
#[path = "d3d11_texture_tests.rs"]
mod tests;
