use std::{
    ffi::CStr,
    fmt::{self, Debug},
    sync::Arc,
};

use erupt::{extensions::amd_rasterization_order as vkro, vk1_0, DeviceLoader};
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::convert::{
    compile_error_from_erupt, oom_error_from_erupt, shader_module_error_from_erupt,
    submit_error_from_erupt, wait_error_from_erupt, ToErupt as _,
};
use crate::{
    backend::{
        Backend, ComputePipelineDesc, DeviceCapability, GraphicsPipelineDesc, RasterizationOrder,
        ShaderStageDesc,
    },
    descriptor::DescriptorSlot,
    pipeline::{CompilePipelineError, PipelineBindPoint, SpecializationData},
    queue::SubmitError,
    shader::{CreateShaderModuleError, ShaderStage},
    spirv::SpirvCode,
    DeviceLost, OutOfMemory,
};

const ENTRY_POINT: &[u8] = b"main\0";

fn entry_point() -> &'static CStr {
    // Literal above is nul-terminated and has no interior nul.
    unsafe { CStr::from_bytes_with_nul_unchecked(ENTRY_POINT) }
}

/// Optional features enabled on the logical device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VulkanFeatures {
    pub geometry_shader: bool,
    pub tessellation_shader: bool,
    pub depth_bounds: bool,
    pub sample_rate_shading: bool,

    /// `VK_AMD_rasterization_order` is enabled.
    pub rasterization_order: bool,
}

/// Pipeline layout with its single descriptor set layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VulkanPipelineLayout {
    pub set_layout: vk1_0::DescriptorSetLayout,
    pub layout: vk1_0::PipelineLayout,
}

/// Recorded command buffer and fence signaled on its completion.
#[derive(Debug)]
pub struct VulkanCommandList {
    pub buffer: vk1_0::CommandBuffer,
    pub fence: vk1_0::Fence,
}

// Command buffer handle is only used by the submission thread.
unsafe impl Send for VulkanCommandList {}
unsafe impl Sync for VulkanCommandList {}

/// [`Backend`] on top of an existing erupt logical device.
pub struct VulkanBackend {
    logical: Arc<DeviceLoader>,
    queue: Mutex<vk1_0::Queue>,
    features: VulkanFeatures,
}

impl Debug for VulkanBackend {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fmt.alternate() {
            fmt.debug_struct("VulkanBackend")
                .field("logical", &self.logical.handle)
                .field("features", &self.features)
                .finish()
        } else {
            Debug::fmt(&self.logical.handle, fmt)
        }
    }
}

// Queue handle access is serialized by the mutex.
unsafe impl Send for VulkanBackend {}
unsafe impl Sync for VulkanBackend {}

impl VulkanBackend {
    /// Wraps logical device.
    ///
    /// # Safety
    ///
    /// `queue` must belong to `logical`.
    /// `features` must not report features that were not enabled.
    pub unsafe fn new(
        logical: Arc<DeviceLoader>,
        queue: vk1_0::Queue,
        features: VulkanFeatures,
    ) -> Self {
        VulkanBackend {
            logical,
            queue: Mutex::new(queue),
            features,
        }
    }

    pub fn logical(&self) -> &DeviceLoader {
        &self.logical
    }

    pub fn features(&self) -> VulkanFeatures {
        self.features
    }
}

fn specialization_entries(
    specialization: &SpecializationData,
) -> SmallVec<[vk1_0::SpecializationMapEntryBuilder<'static>; 128]> {
    specialization
        .entries()
        .map(|entry| {
            vk1_0::SpecializationMapEntryBuilder::new()
                .constant_id(entry.constant_id)
                .offset(entry.offset)
                .size(entry.size)
        })
        .collect()
}

fn shader_stage<'a>(
    stage: &'a ShaderStageDesc<'a, VulkanBackend>,
    specialization: &'a vk1_0::SpecializationInfoBuilder<'a>,
) -> vk1_0::PipelineShaderStageCreateInfoBuilder<'a> {
    vk1_0::PipelineShaderStageCreateInfoBuilder::new()
        .stage(stage.stage.to_erupt())
        .module(*stage.module)
        .name(entry_point())
        .specialization_info(specialization)
}

impl Backend for VulkanBackend {
    type ShaderModule = vk1_0::ShaderModule;
    type PipelineLayout = VulkanPipelineLayout;
    type Pipeline = vk1_0::Pipeline;
    type PipelineCache = vk1_0::PipelineCache;
    type CommandList = VulkanCommandList;

    fn supports(&self, capability: DeviceCapability) -> bool {
        match capability {
            DeviceCapability::GeometryShader => self.features.geometry_shader,
            DeviceCapability::TessellationShader => self.features.tessellation_shader,
            DeviceCapability::DepthBounds => self.features.depth_bounds,
            DeviceCapability::SampleRateShading => self.features.sample_rate_shading,
            DeviceCapability::PipelineDerivatives => true,
            DeviceCapability::RasterizationOrder => self.features.rasterization_order,
        }
    }

    fn create_shader_module(
        &self,
        _stage: ShaderStage,
        code: &SpirvCode,
    ) -> Result<vk1_0::ShaderModule, CreateShaderModuleError> {
        let module = unsafe {
            self.logical.create_shader_module(
                &vk1_0::ShaderModuleCreateInfoBuilder::new().code(code.words()),
                None,
                None,
            )
        }
        .result()
        .map_err(shader_module_error_from_erupt)?;

        trace!("Shader module created: {:?}", module);
        Ok(module)
    }

    fn destroy_shader_module(&self, module: &vk1_0::ShaderModule) {
        unsafe { self.logical.destroy_shader_module(Some(*module), None) }
    }

    fn create_pipeline_layout(
        &self,
        bindings: &[DescriptorSlot],
        _bind_point: PipelineBindPoint,
    ) -> Result<VulkanPipelineLayout, OutOfMemory> {
        let bindings = bindings
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                vk1_0::DescriptorSetLayoutBindingBuilder::new()
                    .binding(index as u32)
                    .descriptor_type(slot.ty.to_erupt())
                    .descriptor_count(1)
                    .stage_flags(slot.stages.to_erupt())
            })
            .collect::<SmallVec<[_; 32]>>();

        let set_layout = unsafe {
            self.logical.create_descriptor_set_layout(
                &vk1_0::DescriptorSetLayoutCreateInfoBuilder::new().bindings(&bindings),
                None,
                None,
            )
        }
        .result()
        .map_err(oom_error_from_erupt)?;

        let layout = unsafe {
            self.logical.create_pipeline_layout(
                &vk1_0::PipelineLayoutCreateInfoBuilder::new().set_layouts(&[set_layout]),
                None,
                None,
            )
        }
        .result();

        match layout {
            Ok(layout) => Ok(VulkanPipelineLayout { set_layout, layout }),
            Err(err) => {
                unsafe {
                    self.logical
                        .destroy_descriptor_set_layout(Some(set_layout), None)
                }
                Err(oom_error_from_erupt(err))
            }
        }
    }

    fn destroy_pipeline_layout(&self, layout: &VulkanPipelineLayout) {
        unsafe {
            self.logical.destroy_pipeline_layout(Some(layout.layout), None);
            self.logical
                .destroy_descriptor_set_layout(Some(layout.set_layout), None);
        }
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, Self>,
    ) -> Result<vk1_0::Pipeline, CompilePipelineError> {
        let entries = specialization_entries(desc.specialization);
        let specialization = vk1_0::SpecializationInfoBuilder::new()
            .map_entries(&entries)
            .data(desc.specialization.as_bytes());

        let mut builder = vk1_0::ComputePipelineCreateInfoBuilder::new()
            .flags(desc.flags.to_erupt())
            .stage(shader_stage(&desc.shader, &specialization).build())
            .layout(desc.layout.layout)
            .base_pipeline_index(-1);

        if let Some(base) = desc.base {
            builder = builder.base_pipeline_handle(base);
        }

        let pipelines = unsafe {
            self.logical
                .create_compute_pipelines(Some(*desc.cache), &[builder], None)
        }
        .result()
        .map_err(compile_error_from_erupt)?;

        debug_assert_eq!(pipelines.len(), 1);
        Ok(pipelines[0])
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_, Self>,
    ) -> Result<vk1_0::Pipeline, CompilePipelineError> {
        let state = desc.state;

        let entries = specialization_entries(desc.specialization);
        let specialization = vk1_0::SpecializationInfoBuilder::new()
            .map_entries(&entries)
            .data(desc.specialization.as_bytes());

        let stages = desc
            .stages
            .iter()
            .map(|stage| shader_stage(stage, &specialization))
            .collect::<SmallVec<[_; 5]>>();

        let vertex_bindings = state
            .input_layout
            .bindings
            .iter()
            .map(|binding| {
                vk1_0::VertexInputBindingDescriptionBuilder::new()
                    .binding(binding.binding)
                    .stride(binding.stride)
                    .input_rate(binding.rate.to_erupt())
            })
            .collect::<SmallVec<[_; 16]>>();

        let vertex_attributes = state
            .input_layout
            .attributes
            .iter()
            .map(|attribute| {
                vk1_0::VertexInputAttributeDescriptionBuilder::new()
                    .location(attribute.location)
                    .binding(attribute.binding)
                    .offset(attribute.offset)
                    .format(attribute.format.to_erupt())
            })
            .collect::<SmallVec<[_; 16]>>();

        let vertex_input_state = vk1_0::PipelineVertexInputStateCreateInfoBuilder::new()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk1_0::PipelineInputAssemblyStateCreateInfoBuilder::new()
            .topology(state.input_assembly.topology.to_erupt())
            .primitive_restart_enable(state.input_assembly.primitive_restart);

        let tessellation_state = vk1_0::PipelineTessellationStateCreateInfoBuilder::new()
            .patch_control_points(state.input_assembly.patch_vertex_count);

        let viewport_state = vk1_0::PipelineViewportStateCreateInfoBuilder::new()
            .viewport_count(state.rasterizer.viewport_count)
            .scissor_count(state.rasterizer.viewport_count);

        let mut rasterization_order = desc.rasterization_order.map(|order| {
            vkro::PipelineRasterizationStateRasterizationOrderAMDBuilder::new().rasterization_order(
                match order {
                    RasterizationOrder::Strict => vkro::RasterizationOrderAMD::STRICT_AMD,
                    RasterizationOrder::Relaxed => vkro::RasterizationOrderAMD::RELAXED_AMD,
                },
            )
        });

        let mut rasterization_state = vk1_0::PipelineRasterizationStateCreateInfoBuilder::new()
            .depth_clamp_enable(state.rasterizer.depth_clamp)
            .rasterizer_discard_enable(state.rasterizer.discard)
            .polygon_mode(state.rasterizer.polygon_mode.to_erupt())
            .cull_mode(state.rasterizer.culling.to_erupt())
            .front_face(state.rasterizer.front_face.to_erupt())
            .line_width(1.0);

        if let Some(bias) = state.rasterizer.depth_bias {
            rasterization_state = rasterization_state
                .depth_bias_enable(true)
                .depth_bias_constant_factor(bias.constant.into_inner())
                .depth_bias_clamp(bias.clamp.into_inner())
                .depth_bias_slope_factor(bias.slope.into_inner());
        }

        if let Some(order) = &mut rasterization_order {
            rasterization_state = rasterization_state.extend_from(order);
        }

        let sample_mask = [state.multisample.sample_mask, state.multisample.sample_mask];
        let mut multisample_state = vk1_0::PipelineMultisampleStateCreateInfoBuilder::new()
            .rasterization_samples(state.multisample.samples.to_erupt())
            .sample_mask(&sample_mask)
            .alpha_to_coverage_enable(state.multisample.alpha_to_coverage)
            .alpha_to_one_enable(state.multisample.alpha_to_one);

        if let Some(fraction) = state.multisample.sample_shading {
            multisample_state = multisample_state
                .sample_shading_enable(true)
                .min_sample_shading(fraction.into_inner());
        }

        let mut depth_stencil_state = vk1_0::PipelineDepthStencilStateCreateInfoBuilder::new();

        if let Some(depth_test) = state.depth_stencil.depth_test {
            depth_stencil_state = depth_stencil_state
                .depth_test_enable(true)
                .depth_write_enable(depth_test.write)
                .depth_compare_op(depth_test.compare.to_erupt());
        }

        if let Some(bounds) = state.depth_stencil.depth_bounds {
            depth_stencil_state = depth_stencil_state
                .depth_bounds_test_enable(true)
                .min_depth_bounds(bounds.min.into_inner())
                .max_depth_bounds(bounds.max.into_inner());
        }

        if let Some(stencil) = state.depth_stencil.stencil {
            depth_stencil_state = depth_stencil_state
                .stencil_test_enable(true)
                .front(stencil.front.to_erupt())
                .back(stencil.back.to_erupt());
        }

        let attachments = state
            .output_merger
            .attachments
            .iter()
            .map(|attachment| {
                match attachment.blending {
                    Some(blending) => vk1_0::PipelineColorBlendAttachmentStateBuilder::new()
                        .blend_enable(true)
                        .src_color_blend_factor(blending.color_src_factor.to_erupt())
                        .dst_color_blend_factor(blending.color_dst_factor.to_erupt())
                        .color_blend_op(blending.color_op.to_erupt())
                        .src_alpha_blend_factor(blending.alpha_src_factor.to_erupt())
                        .dst_alpha_blend_factor(blending.alpha_dst_factor.to_erupt())
                        .alpha_blend_op(blending.alpha_op.to_erupt()),
                    None => {
                        vk1_0::PipelineColorBlendAttachmentStateBuilder::new().blend_enable(false)
                    }
                }
                .color_write_mask(attachment.write_mask.to_erupt())
            })
            .collect::<SmallVec<[_; 8]>>();

        let mut color_blend_state =
            vk1_0::PipelineColorBlendStateCreateInfoBuilder::new().attachments(&attachments);

        if let Some(op) = state.output_merger.logic_op {
            color_blend_state = color_blend_state.logic_op_enable(true).logic_op(op.to_erupt());
        }

        let dynamic_states = desc
            .dynamic_states
            .iter()
            .map(|state| state.to_erupt())
            .collect::<SmallVec<[_; 4]>>();

        let dynamic_state =
            vk1_0::PipelineDynamicStateCreateInfoBuilder::new().dynamic_states(&dynamic_states);

        // Render pass presence is validated before compilation.
        let render_pass = state
            .output_merger
            .render_pass
            .map_or(vk1_0::RenderPass::null(), |handle| {
                vk1_0::RenderPass(handle.0.get())
            });

        let mut builder = vk1_0::GraphicsPipelineCreateInfoBuilder::new()
            .flags(desc.flags.to_erupt())
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(desc.layout.layout)
            .render_pass(render_pass)
            .subpass(0)
            .base_pipeline_index(-1);

        if state.input_assembly.patch_vertex_count != 0 {
            builder = builder.tessellation_state(&tessellation_state);
        }

        if let Some(base) = desc.base {
            builder = builder.base_pipeline_handle(base);
        }

        let pipelines = unsafe {
            self.logical
                .create_graphics_pipelines(Some(*desc.cache), &[builder], None)
        }
        .result()
        .map_err(compile_error_from_erupt)?;

        debug_assert_eq!(pipelines.len(), 1);
        Ok(pipelines[0])
    }

    fn destroy_pipeline(&self, pipeline: vk1_0::Pipeline) {
        unsafe { self.logical.destroy_pipeline(Some(pipeline), None) }
    }

    fn create_pipeline_cache(
        &self,
        initial_data: &[u8],
    ) -> Result<vk1_0::PipelineCache, OutOfMemory> {
        let result = unsafe {
            self.logical.create_pipeline_cache(
                &vk1_0::PipelineCacheCreateInfoBuilder::new().initial_data(initial_data),
                None,
                None,
            )
        }
        .result();

        match result {
            Ok(cache) => Ok(cache),
            Err(err) if !initial_data.is_empty() => {
                // Driver may reject blob written by another driver version.
                warn!("Pipeline cache data rejected: {}", err);
                self.create_pipeline_cache(&[])
            }
            Err(err) => Err(oom_error_from_erupt(err)),
        }
    }

    fn pipeline_cache_data(&self, cache: &vk1_0::PipelineCache) -> Result<Vec<u8>, OutOfMemory> {
        unsafe { self.logical.get_pipeline_cache_data(*cache, None) }
            .result()
            .map_err(oom_error_from_erupt)
    }

    fn destroy_pipeline_cache(&self, cache: &vk1_0::PipelineCache) {
        unsafe { self.logical.destroy_pipeline_cache(Some(*cache), None) }
    }

    fn submit(&self, list: &VulkanCommandList) -> Result<(), SubmitError> {
        let queue = self.queue.lock();

        unsafe {
            self.logical.queue_submit(
                *queue,
                &[vk1_0::SubmitInfoBuilder::new().command_buffers(&[list.buffer])],
                Some(list.fence),
            )
        }
        .result()
        .map_err(submit_error_from_erupt)
    }

    fn wait(&self, list: &VulkanCommandList) -> Result<(), DeviceLost> {
        unsafe { self.logical.wait_for_fences(&[list.fence], true, !0) }
            .result()
            .map_err(wait_error_from_erupt)?;

        unsafe { self.logical.reset_fences(&[list.fence]) }
            .result()
            .map_err(wait_error_from_erupt)
    }
}
