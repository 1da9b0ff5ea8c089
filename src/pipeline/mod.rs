mod compute;
mod graphics;
mod manager;
mod state;

pub use self::{compute::*, graphics::*, manager::*, state::*};

use std::{
    fmt::{self, Debug},
    sync::Arc,
};

use crate::{
    backend::Backend,
    descriptor::{BindingState, DescriptorSlot, DescriptorSlotMapping, MAX_ACTIVE_BINDINGS},
    shader::{CreateShaderModuleError, Shader, ShaderModule, ShaderStage},
    OutOfMemory,
};

/// Kind of pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum PipelineBindPoint {
    Compute,
    Graphics,
}

/// Error that may occur when pipeline is created or compiled.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CreatePipelineError {
    #[error(transparent)]
    OutOfMemory {
        #[from]
        source: OutOfMemory,
    },

    #[error("Failed to create shader module for shader {shader}")]
    ShaderModule {
        shader: String,
        #[source]
        source: CreateShaderModuleError,
    },

    #[error("Shader {shader} is {found} shader, {expected} shader expected")]
    WrongShaderStage {
        shader: String,
        expected: ShaderStage,
        found: ShaderStage,
    },

    #[error(transparent)]
    InvalidState {
        #[from]
        source: InvalidPipelineState,
    },

    #[error("Device failed to compile pipeline {pipeline}: {message}")]
    Compile { pipeline: String, message: String },

    #[error("Pipeline state does not match pipeline kind {kind:?}")]
    StateKindMismatch { kind: PipelineBindPoint },
}

/// Error that device may report when compiling a pipeline.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompilePipelineError {
    #[error(transparent)]
    OutOfMemory {
        #[from]
        source: OutOfMemory,
    },

    /// Device refused the pipeline for a reason other than memory exhaustion.
    #[error("Device rejected pipeline: {message}")]
    Rejected { message: String },
}

impl CreatePipelineError {
    fn from_compile(pipeline: impl Into<String>, err: CompilePipelineError) -> Self {
        match err {
            CompilePipelineError::OutOfMemory { source } => source.into(),
            CompilePipelineError::Rejected { message } => CreatePipelineError::Compile {
                pipeline: pipeline.into(),
                message,
            },
        }
    }
}

/// Graphics pipeline state that can't be compiled with pipeline shaders.
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidPipelineState {
    #[error("Render pass is not set")]
    MissingRenderPass,

    #[error("Input layout provides locations {provided:#b}, vertex shader consumes {required:#b}")]
    VertexInputMismatch { provided: u32, required: u32 },

    #[error("Tessellation patches are used without tessellation shaders")]
    PatchesWithoutTessellation,
}

/// Options applied to every pipeline created by [`PipelineManager`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineOptions {
    /// Relax rasterization order for every pipeline without blending.
    /// Application must not rely on ordering of coplanar primitives.
    pub assume_no_zfight: bool,
}

/// Specialization constant entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpecializationEntry {
    pub constant_id: u32,
    pub offset: u32,
    pub size: usize,
}

/// Specialization constants derived from [`BindingState`].
///
/// Constant `i` is a boolean telling whether binding `i` is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecializationData {
    values: [u32; MAX_ACTIVE_BINDINGS],
}

impl SpecializationData {
    pub fn new(bindings: &BindingState) -> Self {
        let mut values = [0; MAX_ACTIVE_BINDINGS];
        for (index, value) in values.iter_mut().enumerate() {
            *value = bindings.is_bound(index as u32) as u32;
        }
        SpecializationData { values }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.values)
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = SpecializationEntry> {
        (0..MAX_ACTIVE_BINDINGS as u32).map(|index| SpecializationEntry {
            constant_id: index,
            offset: index * 4,
            size: 4,
        })
    }
}

/// Device pipeline layout built from a slot mapping.
/// Destroyed when dropped.
pub struct PipelineLayout<B: Backend> {
    device: Arc<B>,
    handle: B::PipelineLayout,
    bind_point: PipelineBindPoint,
    bindings: Vec<DescriptorSlot>,
}

impl<B> Debug for PipelineLayout<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fmt.alternate() {
            fmt.debug_struct("PipelineLayout")
                .field("handle", &self.handle)
                .field("bind_point", &self.bind_point)
                .field("bindings", &self.bindings)
                .finish()
        } else {
            write!(fmt, "PipelineLayout({:?})", self.handle)
        }
    }
}

impl<B> PipelineLayout<B>
where
    B: Backend,
{
    pub fn new(
        device: &Arc<B>,
        mapping: &DescriptorSlotMapping,
        bind_point: PipelineBindPoint,
    ) -> Result<Self, OutOfMemory> {
        let handle = device.create_pipeline_layout(mapping.binding_infos(), bind_point)?;

        Ok(PipelineLayout {
            device: Arc::clone(device),
            handle,
            bind_point,
            bindings: mapping.binding_infos().to_vec(),
        })
    }

    pub fn handle(&self) -> &B::PipelineLayout {
        &self.handle
    }

    pub fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }

    pub fn bindings(&self) -> &[DescriptorSlot] {
        &self.bindings
    }

    pub fn binding_count(&self) -> u32 {
        self.bindings.len() as u32
    }
}

impl<B> Drop for PipelineLayout<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        self.device.destroy_pipeline_layout(&self.handle);
    }
}

/// Pipeline of either kind.
#[derive(Debug)]
pub enum Pipeline<B: Backend> {
    Compute(Arc<ComputePipeline<B>>),
    Graphics(Arc<GraphicsPipeline<B>>),
}

impl<B> Clone for Pipeline<B>
where
    B: Backend,
{
    fn clone(&self) -> Self {
        match self {
            Pipeline::Compute(pipeline) => Pipeline::Compute(Arc::clone(pipeline)),
            Pipeline::Graphics(pipeline) => Pipeline::Graphics(Arc::clone(pipeline)),
        }
    }
}

/// State of either pipeline kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState<'a> {
    Compute(&'a ComputePipelineState),
    Graphics(&'a GraphicsPipelineState),
}

impl<B> Pipeline<B>
where
    B: Backend,
{
    pub fn bind_point(&self) -> PipelineBindPoint {
        match self {
            Pipeline::Compute(_) => PipelineBindPoint::Compute,
            Pipeline::Graphics(_) => PipelineBindPoint::Graphics,
        }
    }

    pub fn layout(&self) -> &PipelineLayout<B> {
        match self {
            Pipeline::Compute(pipeline) => pipeline.layout(),
            Pipeline::Graphics(pipeline) => pipeline.layout(),
        }
    }

    /// Returns device pipeline for the state, compiling it if necessary.
    pub fn handle(&self, state: PipelineState<'_>) -> Result<B::Pipeline, CreatePipelineError> {
        match (self, state) {
            (Pipeline::Compute(pipeline), PipelineState::Compute(state)) => {
                pipeline.get_pipeline_handle(state)
            }
            (Pipeline::Graphics(pipeline), PipelineState::Graphics(state)) => {
                pipeline.get_pipeline_handle(state)
            }
            _ => Err(CreatePipelineError::StateKindMismatch {
                kind: self.bind_point(),
            }),
        }
    }
}

impl<B> From<Arc<ComputePipeline<B>>> for Pipeline<B>
where
    B: Backend,
{
    fn from(pipeline: Arc<ComputePipeline<B>>) -> Self {
        Pipeline::Compute(pipeline)
    }
}

impl<B> From<Arc<GraphicsPipeline<B>>> for Pipeline<B>
where
    B: Backend,
{
    fn from(pipeline: Arc<GraphicsPipeline<B>>) -> Self {
        Pipeline::Graphics(pipeline)
    }
}

fn create_shader_modules<'a, B>(
    device: &Arc<B>,
    mapping: &DescriptorSlotMapping,
    shaders: impl Iterator<Item = &'a Arc<Shader>>,
) -> Result<Vec<ShaderModule<B>>, CreatePipelineError>
where
    B: Backend,
{
    shaders
        .map(|shader| {
            shader
                .create_shader_module(device, mapping)
                .map_err(|source| CreatePipelineError::ShaderModule {
                    shader: shader.debug_name().to_owned(),
                    source,
                })
        })
        .collect()
}
