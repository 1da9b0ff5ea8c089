//!
//! Contains device abstraction used by pipelines, caches and queues.
//! Vulkan implementation is available with `vulkan` feature.
//!

#[cfg(feature = "vulkan")]
mod vulkan;

#[cfg(feature = "vulkan")]
pub use vulkan::*;

use std::{fmt::Debug, hash::Hash};

use crate::{
    descriptor::DescriptorSlot,
    pipeline::{
        CompilePipelineError, GraphicsPipelineState, PipelineBindPoint, SpecializationData,
    },
    queue::SubmitError,
    shader::{CreateShaderModuleError, ShaderStage},
    spirv::SpirvCode,
    DeviceLost, OutOfMemory,
};

bitflags::bitflags! {
    /// Flags for pipeline creation.
    #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
    pub struct PipelineCreateFlags: u32 {
        /// Pipeline may be used as base for derivative pipelines.
        const ALLOW_DERIVATIVES = 0b01;

        /// Pipeline is derived from the base pipeline.
        const DERIVATIVE = 0b10;
    }
}

/// Optional device capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceCapability {
    GeometryShader,
    TessellationShader,
    DepthBounds,
    SampleRateShading,

    /// Derivative pipelines are compiled faster than unrelated ones.
    PipelineDerivatives,

    /// Rasterization order can be relaxed per pipeline.
    RasterizationOrder,
}

/// Primitive rasterization order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum RasterizationOrder {
    /// Primitives are rasterized in submission order.
    Strict,

    /// Primitives may be rasterized out of order.
    Relaxed,
}

/// Pipeline state that is set by commands instead of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum DynamicState {
    Viewport,
    Scissor,
    BlendConstants,
    StencilReference,
}

/// Shader module bound to a pipeline stage.
#[derive(Debug)]
pub struct ShaderStageDesc<'a, B: Backend> {
    pub stage: ShaderStage,
    pub module: &'a B::ShaderModule,
}

/// Everything device needs to compile compute pipeline.
#[derive(Debug)]
pub struct ComputePipelineDesc<'a, B: Backend> {
    pub shader: ShaderStageDesc<'a, B>,
    pub layout: &'a B::PipelineLayout,
    pub specialization: &'a SpecializationData,
    pub cache: &'a B::PipelineCache,
    pub flags: PipelineCreateFlags,
    pub base: Option<B::Pipeline>,
}

/// Everything device needs to compile graphics pipeline.
#[derive(Debug)]
pub struct GraphicsPipelineDesc<'a, B: Backend> {
    pub stages: &'a [ShaderStageDesc<'a, B>],
    pub layout: &'a B::PipelineLayout,
    pub specialization: &'a SpecializationData,
    pub cache: &'a B::PipelineCache,
    pub flags: PipelineCreateFlags,
    pub base: Option<B::Pipeline>,
    pub state: &'a GraphicsPipelineState,
    pub dynamic_states: &'a [DynamicState],

    /// `None` unless device supports [`DeviceCapability::RasterizationOrder`].
    pub rasterization_order: Option<RasterizationOrder>,
}

/// Device functions used by this crate.
///
/// Handles returned by `create_*` functions are destroyed
/// with matching `destroy_*` functions exactly once.
pub trait Backend: Debug + Send + Sync + Sized + 'static {
    type ShaderModule: Debug + Send + Sync;
    type PipelineLayout: Debug + Send + Sync;
    type Pipeline: Copy + Debug + Eq + Hash + Send + Sync;
    type PipelineCache: Debug + Send + Sync;
    type CommandList: Debug + Send + Sync;

    fn supports(&self, capability: DeviceCapability) -> bool;

    fn create_shader_module(
        &self,
        stage: ShaderStage,
        code: &SpirvCode,
    ) -> Result<Self::ShaderModule, CreateShaderModuleError>;

    fn destroy_shader_module(&self, module: &Self::ShaderModule);

    fn create_pipeline_layout(
        &self,
        bindings: &[DescriptorSlot],
        bind_point: PipelineBindPoint,
    ) -> Result<Self::PipelineLayout, OutOfMemory>;

    fn destroy_pipeline_layout(&self, layout: &Self::PipelineLayout);

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, Self>,
    ) -> Result<Self::Pipeline, CompilePipelineError>;

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_, Self>,
    ) -> Result<Self::Pipeline, CompilePipelineError>;

    fn destroy_pipeline(&self, pipeline: Self::Pipeline);

    /// Creates driver pipeline cache.
    /// Driver may ignore `initial_data` it doesn't recognize.
    fn create_pipeline_cache(
        &self,
        initial_data: &[u8],
    ) -> Result<Self::PipelineCache, OutOfMemory>;

    /// Serializes pipeline cache content.
    fn pipeline_cache_data(&self, cache: &Self::PipelineCache) -> Result<Vec<u8>, OutOfMemory>;

    fn destroy_pipeline_cache(&self, cache: &Self::PipelineCache);

    /// Submits recorded command list to the device queue.
    fn submit(&self, list: &Self::CommandList) -> Result<(), SubmitError>;

    /// Waits until submitted command list completes.
    fn wait(&self, list: &Self::CommandList) -> Result<(), DeviceLost>;
}
