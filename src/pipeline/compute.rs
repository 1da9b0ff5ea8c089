use std::{
    fmt::{self, Debug},
    sync::Arc,
    time::Instant,
};

use parking_lot::Mutex;

use super::{CreatePipelineError, PipelineBindPoint, PipelineLayout, SpecializationData};
use crate::{
    backend::{Backend, ComputePipelineDesc, DeviceCapability, PipelineCreateFlags, ShaderStageDesc},
    cache::PipelineCache,
    descriptor::{BindingState, DescriptorSlotMapping},
    shader::{Shader, ShaderModule, ShaderStage},
};

/// State that selects compute pipeline variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComputePipelineState {
    pub bindings: BindingState,
}

/// Compute pipeline.
///
/// Owns shader module and layout,
/// and compiles one device pipeline per observed state.
pub struct ComputePipeline<B: Backend> {
    device: Arc<B>,
    cache: Arc<PipelineCache<B>>,
    shader: Arc<Shader>,
    module: ShaderModule<B>,
    layout: PipelineLayout<B>,
    pipelines: Mutex<Vec<(ComputePipelineState, B::Pipeline)>>,
}

impl<B> Debug for ComputePipeline<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fmt.alternate() {
            fmt.debug_struct("ComputePipeline")
                .field("shader", &self.shader)
                .field("layout", &self.layout)
                .field("pipelines", &*self.pipelines.lock())
                .finish()
        } else {
            write!(fmt, "ComputePipeline({})", self.shader.debug_name())
        }
    }
}

impl<B> ComputePipeline<B>
where
    B: Backend,
{
    pub fn new(
        device: &Arc<B>,
        cache: &Arc<PipelineCache<B>>,
        shader: &Arc<Shader>,
    ) -> Result<Self, CreatePipelineError> {
        if shader.stage() != ShaderStage::Compute {
            return Err(CreatePipelineError::WrongShaderStage {
                shader: shader.debug_name().to_owned(),
                expected: ShaderStage::Compute,
                found: shader.stage(),
            });
        }

        let mut mapping = DescriptorSlotMapping::new();
        shader.define_resource_slots(&mut mapping);

        let layout = PipelineLayout::new(device, &mapping, PipelineBindPoint::Compute)?;
        let module = shader
            .create_shader_module(device, &mapping)
            .map_err(|source| CreatePipelineError::ShaderModule {
                shader: shader.debug_name().to_owned(),
                source,
            })?;

        debug!(
            "Compute pipeline {} created with {} bindings",
            shader.debug_name(),
            mapping.binding_count()
        );

        Ok(ComputePipeline {
            device: Arc::clone(device),
            cache: Arc::clone(cache),
            shader: Arc::clone(shader),
            module,
            layout,
            pipelines: Mutex::new(Vec::new()),
        })
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    pub fn layout(&self) -> &PipelineLayout<B> {
        &self.layout
    }

    /// Returns device pipeline compiled for the state.
    ///
    /// Compiles and remembers new variant on first use of the state.
    /// Failed compilation is reported and not remembered.
    pub fn get_pipeline_handle(
        &self,
        state: &ComputePipelineState,
    ) -> Result<B::Pipeline, CreatePipelineError> {
        let mut pipelines = self.pipelines.lock();

        if let Some((_, handle)) = pipelines.iter().find(|(known, _)| known == state) {
            return Ok(*handle);
        }

        let base = if self.device.supports(DeviceCapability::PipelineDerivatives) {
            pipelines.first().map(|(_, handle)| *handle)
        } else {
            None
        };

        let handle = self.compile(state, base)?;
        pipelines.push((*state, handle));
        drop(pipelines);

        self.cache.update();
        Ok(handle)
    }

    /// Number of compiled variants.
    pub fn variant_count(&self) -> usize {
        self.pipelines.lock().len()
    }

    fn compile(
        &self,
        state: &ComputePipelineState,
        base: Option<B::Pipeline>,
    ) -> Result<B::Pipeline, CreatePipelineError> {
        let flags = match base {
            Some(_) => PipelineCreateFlags::DERIVATIVE,
            None if self.device.supports(DeviceCapability::PipelineDerivatives) => {
                PipelineCreateFlags::ALLOW_DERIVATIVES
            }
            None => PipelineCreateFlags::empty(),
        };

        let specialization = SpecializationData::new(&state.bindings);

        debug!("Compiling compute pipeline {}", self.shader.debug_name());
        let start = Instant::now();

        let result = self.device.create_compute_pipeline(&ComputePipelineDesc {
            shader: ShaderStageDesc {
                stage: ShaderStage::Compute,
                module: self.module.handle(),
            },
            layout: self.layout.handle(),
            specialization: &specialization,
            cache: self.cache.handle(),
            flags,
            base,
        });

        match result {
            Ok(handle) => {
                debug!(
                    "Compute pipeline {} compiled in {} ms",
                    self.shader.debug_name(),
                    start.elapsed().as_millis()
                );
                Ok(handle)
            }
            Err(err) => {
                error!(
                    "Failed to compile compute pipeline {}: {}",
                    self.shader.debug_name(),
                    err
                );
                Err(CreatePipelineError::from_compile(
                    self.shader.debug_name(),
                    err,
                ))
            }
        }
    }
}

impl<B> Drop for ComputePipeline<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        for (_, handle) in self.pipelines.get_mut().drain(..) {
            self.device.destroy_pipeline(handle);
        }
    }
}
