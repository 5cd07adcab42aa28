/// D3D11Buffer - Direct3D 11 implementation of NativeBuffer
///
/// Linear buffers are `ID3D11Buffer`s; the UAV texture types are backed by a
/// 1D/2D/3D texture instead. Shader-visible buffers carry their SRV and UAV.

use d3d12::ComPtr;
use flint_rhi::flint::render::{BufferDesc, BufferShape, BufferType, NativeBuffer};
use flint_rhi::flint::{Error, Result};
use flint_rhi::rhi_error;
use std::mem;
use std::ptr;
use std::sync::Arc;
use winapi::shared::dxgiformat::DXGI_FORMAT;
use winapi::um::d3d11;
use winapi::um::d3dcommon;

use crate::d3d11_context::{as_resource, check, hresult_code, D3D11Context, HResult, SOURCE};
use crate::d3d11_conv::{buffer_desc, buffer_view_layout, image_format_to_dxgi, index_format, BufferViewLayout};

pub(crate) enum BufferStorage {
    Linear(ComPtr<d3d11::ID3D11Buffer>),
    Texture(ComPtr<d3d11::ID3D11Resource>),
}

pub struct D3D11Buffer {
    storage: BufferStorage,
    pub(crate) srv: Option<ComPtr<d3d11::ID3D11ShaderResourceView>>,
    pub(crate) uav: Option<ComPtr<d3d11::ID3D11UnorderedAccessView>>,
    pub(crate) buffer_type: BufferType,
    pub(crate) index_format: DXGI_FORMAT,
    /// UAV counter reset on bind (append buffers only)
    pub(crate) append: bool,
    byte_width: u64,
    dynamic: bool,
    /// Row and depth pitch of texture-backed buffers
    pitches: (u32, u32),
}

// SAFETY: D3D11 resources and views are free-threaded; they are only mutated
// through device contexts, which are synchronized by their owners.
unsafe impl Send for D3D11Buffer {}
unsafe impl Sync for D3D11Buffer {}

impl NativeBuffer for D3D11Buffer {}

impl D3D11Buffer {
    pub(crate) fn create(ctx: &Arc<D3D11Context>, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Self> {
        desc.validate()?;
        let byte_width = desc.byte_width();
        if let Some(data) = initial_data {
            if (data.len() as u64) < byte_width {
                return Err(Error::InvalidResource(format!(
                    "Initial data of {} bytes is smaller than the {} byte buffer",
                    data.len(),
                    byte_width
                )));
            }
        }

        match desc.shape {
            BufferShape::Linear { .. } => Self::create_linear(ctx, desc, initial_data),
            BufferShape::Image { width, height, depth, mip_count } => {
                Self::create_texture_backed(ctx, desc, (width, height, depth, mip_count), initial_data)
            }
        }
    }

    fn create_linear(ctx: &Arc<D3D11Context>, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Self> {
        let native_desc = buffer_desc(desc);

        // Constant buffers are padded, so the payload may be shorter than ByteWidth
        let padded;
        let init = match initial_data {
            Some(data) if (data.len() as u32) < native_desc.ByteWidth => {
                let mut bytes = data.to_vec();
                bytes.resize(native_desc.ByteWidth as usize, 0);
                padded = bytes;
                Some(subresource_data(&padded, 0, 0))
            }
            Some(data) => Some(subresource_data(data, 0, 0)),
            None => None,
        };

        let mut buffer = ComPtr::<d3d11::ID3D11Buffer>::null();
        let hr = unsafe {
            ctx.device.CreateBuffer(
                &native_desc,
                init.as_ref().map_or(ptr::null(), |init| init as *const _),
                buffer.mut_self(),
            )
        };
        check(hr, "CreateBuffer")?;

        let resource = buffer.as_mut_ptr() as *mut d3d11::ID3D11Resource;
        let layout = buffer_view_layout(desc);
        let (srv, uav) = match layout {
            Some(layout) => (
                Some(create_buffer_srv(ctx, resource, &layout)?),
                Some(create_buffer_uav(ctx, resource, &layout)?),
            ),
            None => (None, None),
        };

        Ok(Self {
            storage: BufferStorage::Linear(buffer),
            srv,
            uav,
            buffer_type: desc.buffer_type,
            index_format: index_format(desc.index_type()),
            append: layout.map(|layout| layout.append).unwrap_or(false),
            byte_width: desc.byte_width(),
            dynamic: desc.buffer_type.usage().dynamic,
            pitches: (0, 0),
        })
    }

    fn create_texture_backed(
        ctx: &Arc<D3D11Context>,
        desc: &BufferDesc,
        (width, height, depth, mip_count): (u32, u32, u32, u32),
        initial_data: Option<&[u8]>,
    ) -> Result<Self> {
        let format = image_format_to_dxgi(desc.view_format);
        let bind = d3d11::D3D11_BIND_SHADER_RESOURCE | d3d11::D3D11_BIND_UNORDERED_ACCESS;
        let row_pitch = width * desc.view_format.bits_per_pixel() / 8;
        let depth_pitch = row_pitch * height.max(1);
        let init = initial_data.map(|data| subresource_data(data, row_pitch, depth_pitch));
        let init_ptr = init.as_ref().map_or(ptr::null(), |init| init as *const _);
        let mip_levels = mip_count.max(1);
        if initial_data.is_some() && mip_levels > 1 {
            return Err(Error::InvalidResource("Initial data is only accepted for single-mip UAV textures".to_string()));
        }

        let resource: ComPtr<d3d11::ID3D11Resource> = unsafe {
            match desc.buffer_type {
                BufferType::UavTexture1D => {
                    let native = d3d11::D3D11_TEXTURE1D_DESC {
                        Width: width,
                        MipLevels: mip_levels,
                        ArraySize: 1,
                        Format: format,
                        Usage: d3d11::D3D11_USAGE_DEFAULT,
                        BindFlags: bind,
                        CPUAccessFlags: 0,
                        MiscFlags: 0,
                    };
                    let mut texture = ComPtr::<d3d11::ID3D11Texture1D>::null();
                    check(ctx.device.CreateTexture1D(&native, init_ptr, texture.mut_self()), "CreateTexture1D")?;
                    as_resource(&texture)?
                }
                BufferType::UavTexture2D => {
                    let mut native: d3d11::D3D11_TEXTURE2D_DESC = mem::zeroed();
                    native.Width = width;
                    native.Height = height.max(1);
                    native.MipLevels = mip_levels;
                    native.ArraySize = 1;
                    native.Format = format;
                    native.SampleDesc.Count = 1;
                    native.Usage = d3d11::D3D11_USAGE_DEFAULT;
                    native.BindFlags = bind;
                    let mut texture = ComPtr::<d3d11::ID3D11Texture2D>::null();
                    check(ctx.device.CreateTexture2D(&native, init_ptr, texture.mut_self()), "CreateTexture2D")?;
                    as_resource(&texture)?
                }
                _ => {
                    let native = d3d11::D3D11_TEXTURE3D_DESC {
                        Width: width,
                        Height: height.max(1),
                        Depth: depth.max(1),
                        MipLevels: mip_levels,
                        Format: format,
                        Usage: d3d11::D3D11_USAGE_DEFAULT,
                        BindFlags: bind,
                        CPUAccessFlags: 0,
                        MiscFlags: 0,
                    };
                    let mut texture = ComPtr::<d3d11::ID3D11Texture3D>::null();
                    check(ctx.device.CreateTexture3D(&native, init_ptr, texture.mut_self()), "CreateTexture3D")?;
                    as_resource(&texture)?
                }
            }
        };

        let mut srv = ComPtr::<d3d11::ID3D11ShaderResourceView>::null();
        let mut uav = ComPtr::<d3d11::ID3D11UnorderedAccessView>::null();
        unsafe {
            check(
                ctx.device.CreateShaderResourceView(resource.as_mut_ptr(), ptr::null(), srv.mut_self()),
                "CreateShaderResourceView",
            )?;
            check(
                ctx.device.CreateUnorderedAccessView(resource.as_mut_ptr(), ptr::null(), uav.mut_self()),
                "CreateUnorderedAccessView",
            )?;
        }

        Ok(Self {
            storage: BufferStorage::Texture(resource),
            srv: Some(srv),
            uav: Some(uav),
            buffer_type: desc.buffer_type,
            index_format: index_format(desc.index_type()),
            append: false,
            byte_width: desc.byte_width(),
            dynamic: false,
            pitches: (row_pitch, depth_pitch),
        })
    }

    pub(crate) fn resource(&self) -> *mut d3d11::ID3D11Resource {
        match &self.storage {
            BufferStorage::Linear(buffer) => buffer.as_mut_ptr() as *mut d3d11::ID3D11Resource,
            BufferStorage::Texture(resource) => resource.as_mut_ptr(),
        }
    }

    /// The `ID3D11Buffer`, null for texture-backed buffers
    pub(crate) fn buffer(&self) -> *mut d3d11::ID3D11Buffer {
        match &self.storage {
            BufferStorage::Linear(buffer) => buffer.as_mut_ptr(),
            BufferStorage::Texture(_) => ptr::null_mut(),
        }
    }

    /// Write `data` from the start of the buffer through `context`
    ///
    /// Dynamic buffers are mapped with `WRITE_DISCARD`, everything else goes
    /// through `UpdateSubresource`. Works on immediate and deferred contexts.
    pub(crate) fn update_on(&self, context: &d3d11::ID3D11DeviceContext, data: &[u8]) -> Result<()> {
        if data.len() as u64 > self.byte_width {
            return Err(Error::InvalidResource(format!(
                "Update of {} bytes overflows the {} byte buffer",
                data.len(),
                self.byte_width
            )));
        }
        if data.is_empty() {
            return Ok(());
        }
        let resource = self.resource();

        unsafe {
            if self.dynamic {
                let mut mapped: d3d11::D3D11_MAPPED_SUBRESOURCE = mem::zeroed();
                let hr = context.Map(resource, 0, d3d11::D3D11_MAP_WRITE_DISCARD, 0, &mut mapped);
                if let Err(hr) = hr.into_result() {
                    rhi_error!(SOURCE, "Failed to map buffer! ({})", hresult_code(hr));
                    return Err(Error::MappingFailed(format!("Map returned {}", hresult_code(hr))));
                }
                ptr::copy_nonoverlapping(data.as_ptr(), mapped.pData as *mut u8, data.len());
                context.Unmap(resource, 0);
                return Ok(());
            }

            match self.storage {
                BufferStorage::Linear(_) => {
                    let region = d3d11::D3D11_BOX {
                        left: 0,
                        top: 0,
                        front: 0,
                        right: data.len() as u32,
                        bottom: 1,
                        back: 1,
                    };
                    context.UpdateSubresource(resource, 0, &region, data.as_ptr() as *const _, 0, 0);
                }
                BufferStorage::Texture(_) => {
                    let (row_pitch, depth_pitch) = self.pitches;
                    context.UpdateSubresource(resource, 0, ptr::null(), data.as_ptr() as *const _, row_pitch, depth_pitch);
                }
            }
        }
        Ok(())
    }
}

fn subresource_data(data: &[u8], row_pitch: u32, depth_pitch: u32) -> d3d11::D3D11_SUBRESOURCE_DATA {
    d3d11::D3D11_SUBRESOURCE_DATA {
        pSysMem: data.as_ptr() as *const _,
        SysMemPitch: row_pitch,
        SysMemSlicePitch: depth_pitch,
    }
}

fn create_buffer_srv(
    ctx: &D3D11Context,
    resource: *mut d3d11::ID3D11Resource,
    layout: &BufferViewLayout,
) -> Result<ComPtr<d3d11::ID3D11ShaderResourceView>> {
    let mut srv = ComPtr::<d3d11::ID3D11ShaderResourceView>::null();
    unsafe {
        let mut desc: d3d11::D3D11_SHADER_RESOURCE_VIEW_DESC = mem::zeroed();
        desc.Format = layout.format;
        desc.ViewDimension = d3dcommon::D3D11_SRV_DIMENSION_BUFFEREX;
        *desc.u.BufferEx_mut() = d3d11::D3D11_BUFFEREX_SRV {
            FirstElement: 0,
            NumElements: layout.num_elements,
            Flags: if layout.raw { d3d11::D3D11_BUFFEREX_SRV_FLAG_RAW } else { 0 },
        };
        check(ctx.device.CreateShaderResourceView(resource, &desc, srv.mut_self()), "CreateShaderResourceView")?;
    }
    Ok(srv)
}

fn create_buffer_uav(
    ctx: &D3D11Context,
    resource: *mut d3d11::ID3D11Resource,
    layout: &BufferViewLayout,
) -> Result<ComPtr<d3d11::ID3D11UnorderedAccessView>> {
    let mut flags = 0;
    if layout.raw {
        flags |= d3d11::D3D11_BUFFER_UAV_FLAG_RAW;
    }
    if layout.append {
        flags |= d3d11::D3D11_BUFFER_UAV_FLAG_APPEND;
    }

    let mut uav = ComPtr::<d3d11::ID3D11UnorderedAccessView>::null();
    unsafe {
        let mut desc: d3d11::D3D11_UNORDERED_ACCESS_VIEW_DESC = mem::zeroed();
        desc.Format = layout.format;
        desc.ViewDimension = d3d11::D3D11_UAV_DIMENSION_BUFFER;
        *desc.u.Buffer_mut() = d3d11::D3D11_BUFFER_UAV {
            FirstElement: 0,
            NumElements: layout.num_elements,
            Flags: flags,
        };
        check(ctx.device.CreateUnorderedAccessView(resource, &desc, uav.mut_self()), "CreateUnorderedAccessView")?;
    }
    Ok(uav)
}
