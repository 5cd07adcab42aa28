/// VulkanPipelineState - Vulkan implementation of NativePipelineState
///
/// Graphics pipelines are compiled lazily, one variant per combination of
/// blend state, fill mode and attachment signature seen at draw time.
/// Everything else (depth-stencil, cull, bias, viewport, vertex strides) is
/// dynamic state. Compute pipelines are compiled at creation.

use ash::vk;
use flint_rhi::flint::render::{
    downcast_native, BlendStateKey, FillMode, InputLayoutEntry, NativeBlendState,
    NativeDepthStencilState, NativePipelineState, NativeRasterizerState, PipelineStateDesc,
    PrimitiveTopology, Shader,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_debug, rhi_err, rhi_warn};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{fill_mode_to_vk, image_format_to_vk, topology_to_vk};
use crate::vulkan_shader::{ShaderModule, VulkanShader, ENTRY_POINT};
use crate::vulkan_state::{VulkanBlendState, VulkanDepthStencilState, VulkanRasterizerState};

/// Formats and sample count of the bound attachments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub(crate) struct AttachmentSignature {
    pub color_formats: Vec<vk::Format>,
    pub depth_format: vk::Format,
    pub samples: vk::SampleCountFlags,
}

/// Everything a graphics variant is compiled for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VariantKey {
    pub blend: BlendStateKey,
    pub fill_mode: FillMode,
    pub attachments: AttachmentSignature,
}

/// Shader stages and vertex input of a graphics pipeline
struct GraphicsTemplate {
    shaders: Vec<Arc<ShaderModule>>,
    topology: vk::PrimitiveTopology,
    patch_control_points: u32,
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Native pipeline objects, shared with command lists that still reference them
pub(crate) struct PipelineShared {
    ctx: Arc<GpuContext>,
    template: Option<GraphicsTemplate>,
    compute: vk::Pipeline,
    variants: Mutex<FxHashMap<VariantKey, vk::Pipeline>>,
}

impl PipelineShared {
    pub(crate) fn is_compute(&self) -> bool {
        self.template.is_none()
    }

    pub(crate) fn compute_pipeline(&self) -> vk::Pipeline {
        self.compute
    }

    /// Graphics pipeline for `key`, compiled on first use
    pub(crate) fn variant(&self, key: &VariantKey, blend: &VulkanBlendState) -> Result<vk::Pipeline> {
        let template = self.template.as_ref().ok_or_else(|| {
            Error::InvalidState("Compute pipeline used for a draw".to_string())
        })?;

        let mut variants = self.variants.lock().map_err(|_| {
            Error::BackendError("Pipeline variant cache mutex poisoned".to_string())
        })?;
        if let Some(&pipeline) = variants.get(key) {
            return Ok(pipeline);
        }

        let pipeline = build_graphics_variant(&self.ctx, template, key, blend)?;
        rhi_debug!(
            "flint::vulkan",
            "Compiled pipeline variant #{} ({} color target(s), {:?})",
            variants.len() + 1,
            key.attachments.color_formats.len(),
            key.fill_mode
        );
        variants.insert(key.clone(), pipeline);
        Ok(pipeline)
    }
}

impl Drop for PipelineShared {
    fn drop(&mut self) {
        unsafe {
            if let Ok(mut variants) = self.variants.lock() {
                for (_, pipeline) in variants.drain() {
                    self.ctx.device.destroy_pipeline(pipeline, None);
                }
            }
            if self.compute != vk::Pipeline::null() {
                self.ctx.device.destroy_pipeline(self.compute, None);
            }
        }
    }
}

/// Vulkan pipeline implementation
pub struct VulkanPipelineState {
    pub(crate) shared: Arc<PipelineShared>,
    blend: Option<VulkanBlendState>,
    depth_stencil: Option<VulkanDepthStencilState>,
    rasterizer: Option<VulkanRasterizerState>,
}

impl NativePipelineState for VulkanPipelineState {
    fn blend_state(&self) -> Option<&dyn NativeBlendState> {
        self.blend.as_ref().map(|state| state as &dyn NativeBlendState)
    }

    fn depth_stencil_state(&self) -> Option<&dyn NativeDepthStencilState> {
        self.depth_stencil.as_ref().map(|state| state as &dyn NativeDepthStencilState)
    }

    fn rasterizer_state(&self) -> Option<&dyn NativeRasterizerState> {
        self.rasterizer.as_ref().map(|state| state as &dyn NativeRasterizerState)
    }
}

fn shader_module(shader: &Shader) -> Result<Arc<ShaderModule>> {
    let native = shader.native()?;
    Ok(downcast_native::<VulkanShader>(native.as_any(), "Shader")?.module.clone())
}

impl VulkanPipelineState {
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &PipelineStateDesc<'_>) -> Result<Self> {
        if let Some(compute_shader) = desc.compute_shader {
            let module = shader_module(compute_shader)?;
            let compute = build_compute(ctx, &module)?;
            return Ok(Self {
                shared: Arc::new(PipelineShared {
                    ctx: ctx.clone(),
                    template: None,
                    compute,
                    variants: Mutex::new(FxHashMap::default()),
                }),
                blend: None,
                depth_stencil: None,
                rasterizer: None,
            });
        }

        let shaders = desc
            .graphics_shaders()
            .map(shader_module)
            .collect::<Result<Vec<_>>>()?;

        let patch_control_points = match desc.primitive_topology {
            PrimitiveTopology::Patch { control_points } => {
                if !ctx.limits.tessellation {
                    return Err(Error::InvalidResource("Tessellation is not supported by this device".to_string()));
                }
                control_points
            }
            _ => 0,
        };

        let blend = match desc.blend_state {
            Some(state) => *downcast_native::<VulkanBlendState>(state.native()?.as_any(), "BlendState")?,
            None => VulkanBlendState::opaque(),
        };
        let depth_stencil = match desc.depth_stencil_state {
            Some(state) => Some(*downcast_native::<VulkanDepthStencilState>(state.native()?.as_any(), "DepthStencilState")?),
            None => None,
        };
        let rasterizer = match desc.rasterizer_state {
            Some(state) => Some(*downcast_native::<VulkanRasterizerState>(state.native()?.as_any(), "RasterizerState")?),
            None => None,
        };

        let (bindings, attributes) = vertex_input(&desc.input_layout);

        Ok(Self {
            shared: Arc::new(PipelineShared {
                ctx: ctx.clone(),
                template: Some(GraphicsTemplate {
                    shaders,
                    topology: topology_to_vk(desc.primitive_topology),
                    patch_control_points,
                    bindings,
                    attributes,
                }),
                compute: vk::Pipeline::null(),
                variants: Mutex::new(FxHashMap::default()),
            }),
            blend: Some(blend),
            depth_stencil,
            rasterizer,
        })
    }
}

// ===== PIPELINE CONSTRUCTION =====

/// One binding per vertex buffer slot, strides supplied when buffers are bound
pub(crate) fn vertex_input(
    entries: &[InputLayoutEntry],
) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
    let mut bindings: Vec<vk::VertexInputBindingDescription> = Vec::new();
    for entry in entries {
        if bindings.iter().any(|binding| binding.binding == entry.vertex_buffer_index) {
            continue;
        }
        if entry.instance_step_rate > 1 {
            rhi_warn!(
                "flint::vulkan",
                "Instance step rate {} on slot {} is treated as 1",
                entry.instance_step_rate,
                entry.vertex_buffer_index
            );
        }
        let input_rate = if entry.instance_step_rate > 0 {
            vk::VertexInputRate::INSTANCE
        } else {
            vk::VertexInputRate::VERTEX
        };
        bindings.push(vk::VertexInputBindingDescription {
            binding: entry.vertex_buffer_index,
            stride: 0,
            input_rate,
        });
    }

    let attributes = entries
        .iter()
        .map(|entry| vk::VertexInputAttributeDescription {
            location: entry.location,
            binding: entry.vertex_buffer_index,
            format: image_format_to_vk(entry.format),
            offset: entry.offset,
        })
        .collect();

    (bindings, attributes)
}

/// Dynamic states of every graphics variant
pub(crate) fn dynamic_states(depth_bounds: bool) -> Vec<vk::DynamicState> {
    let mut states = vec![
        vk::DynamicState::VIEWPORT,
        vk::DynamicState::SCISSOR,
        vk::DynamicState::CULL_MODE,
        vk::DynamicState::FRONT_FACE,
        vk::DynamicState::DEPTH_TEST_ENABLE,
        vk::DynamicState::DEPTH_WRITE_ENABLE,
        vk::DynamicState::DEPTH_COMPARE_OP,
        vk::DynamicState::DEPTH_BOUNDS_TEST_ENABLE,
        vk::DynamicState::STENCIL_TEST_ENABLE,
        vk::DynamicState::STENCIL_OP,
        vk::DynamicState::STENCIL_COMPARE_MASK,
        vk::DynamicState::STENCIL_WRITE_MASK,
        vk::DynamicState::STENCIL_REFERENCE,
        vk::DynamicState::DEPTH_BIAS_ENABLE,
        vk::DynamicState::DEPTH_BIAS,
        vk::DynamicState::VERTEX_INPUT_BINDING_STRIDE,
    ];
    if depth_bounds {
        states.push(vk::DynamicState::DEPTH_BOUNDS);
    }
    states
}

pub(crate) fn format_has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

fn build_graphics_variant(
    ctx: &GpuContext,
    template: &GraphicsTemplate,
    key: &VariantKey,
    blend: &VulkanBlendState,
) -> Result<vk::Pipeline> {
    let stages: Vec<vk::PipelineShaderStageCreateInfo> = template
        .shaders
        .iter()
        .map(|shader| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader.stage)
                .module(shader.module)
                .name(ENTRY_POINT)
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&template.bindings)
        .vertex_attribute_descriptions(&template.attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(template.topology)
        .primitive_restart_enable(false);

    let tessellation_state = vk::PipelineTessellationStateCreateInfo::default()
        .patch_control_points(template.patch_control_points);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let fill_mode = if key.fill_mode == FillMode::Wireframe && !ctx.limits.fill_mode_non_solid {
        rhi_warn!("flint::vulkan", "Wireframe fill is not supported by this device, drawing solid");
        FillMode::Solid
    } else {
        key.fill_mode
    };
    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(fill_mode_to_vk(fill_mode))
        .line_width(1.0);

    let sample_mask = [blend.sample_mask];
    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(key.attachments.samples)
        .sample_shading_enable(false)
        .sample_mask(&sample_mask)
        .alpha_to_coverage_enable(blend.alpha_to_coverage);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default();

    let blend_attachments = vec![blend.attachment; key.attachments.color_formats.len()];
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&blend_attachments)
        .blend_constants([1.0; 4]);

    let dynamic = dynamic_states(ctx.limits.depth_bounds);
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic);

    let stencil_format = if format_has_stencil(key.attachments.depth_format) {
        key.attachments.depth_format
    } else {
        vk::Format::UNDEFINED
    };
    let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
        .color_attachment_formats(&key.attachments.color_formats)
        .depth_attachment_format(key.attachments.depth_format)
        .stencil_attachment_format(stencil_format);

    let mut create_info = vk::GraphicsPipelineCreateInfo::default()
        .push_next(&mut rendering_info)
        .stages(&stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(ctx.pipeline_layout);
    if template.patch_control_points > 0 {
        create_info = create_info.tessellation_state(&tessellation_state);
    }

    let pipelines = unsafe {
        ctx.device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
    }
    .map_err(|(_, e)| rhi_err!("flint::vulkan", "Failed to create graphics pipeline: {:?}", e))?;

    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| Error::BackendError("vkCreateGraphicsPipelines returned no pipeline".to_string()))
}

fn build_compute(ctx: &GpuContext, module: &ShaderModule) -> Result<vk::Pipeline> {
    let stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module.module)
        .name(ENTRY_POINT);
    let create_info = vk::ComputePipelineCreateInfo::default()
        .stage(stage)
        .layout(ctx.pipeline_layout);

    let pipelines = unsafe {
        ctx.device
            .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
    }
    .map_err(|(_, e)| rhi_err!("flint::vulkan", "Failed to create compute pipeline: {:?}", e))?;

    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| Error::BackendError("vkCreateComputePipelines returned no pipeline".to_string()))
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
