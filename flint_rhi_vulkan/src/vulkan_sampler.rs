/// VulkanSampler - Vulkan implementation of NativeSampler

use ash::vk;
use flint_rhi::flint::render::{NativeSampler, SamplerDesc};
use flint_rhi::flint::Result;
use flint_rhi::rhi_err;
use std::sync::Arc;

use crate::vulkan_context::{DeviceLimits, GpuContext};
use crate::vulkan_format::{border_color_to_vk, compare_op_to_vk, sampler_address_to_vk};

pub struct VulkanSampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
}

impl NativeSampler for VulkanSampler {}

impl VulkanSampler {
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &SamplerDesc) -> Result<Self> {
        let create_info = sampler_create_info(desc, &ctx.limits);
        let sampler = unsafe { ctx.device.create_sampler(&create_info, None) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to create VkSampler: {:?}", e))?;

        Ok(Self { ctx: ctx.clone(), sampler })
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_sampler(self.sampler, None) };
    }
}

fn filter(linear: bool) -> vk::Filter {
    if linear { vk::Filter::LINEAR } else { vk::Filter::NEAREST }
}

/// Sampler create info for `desc`, clamped to what the device supports
pub(crate) fn sampler_create_info(desc: &SamplerDesc, limits: &DeviceLimits) -> vk::SamplerCreateInfo<'static> {
    let mipmap_mode = if desc.filter.is_mip_linear() {
        vk::SamplerMipmapMode::LINEAR
    } else {
        vk::SamplerMipmapMode::NEAREST
    };

    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter(desc.filter.is_mag_linear()))
        .min_filter(filter(desc.filter.is_min_linear()))
        .mipmap_mode(mipmap_mode)
        .address_mode_u(sampler_address_to_vk(desc.address_u))
        .address_mode_v(sampler_address_to_vk(desc.address_v))
        .address_mode_w(sampler_address_to_vk(desc.address_w))
        .mip_lod_bias(desc.lod_bias)
        .min_lod(desc.min_lod)
        .max_lod(desc.max_lod)
        .border_color(border_color_to_vk(desc.border_color))
        .unnormalized_coordinates(false);

    if desc.filter.is_comparison() {
        create_info = create_info
            .compare_enable(true)
            .compare_op(compare_op_to_vk(desc.comparison_function));
    } else {
        create_info = create_info
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS);
    }

    match desc.filter.anisotropy() {
        Some(max_aniso) if limits.sampler_anisotropy => {
            create_info
                .anisotropy_enable(true)
                .max_anisotropy((max_aniso as f32).min(limits.max_sampler_anisotropy))
        }
        _ => create_info.anisotropy_enable(false).max_anisotropy(1.0),
    }
}

#[cfg(test)]
#[path = "vulkan_sampler_tests.rs"]
mod tests;
