use std::{
    fmt::{self, Debug},
    num::NonZeroU64,
    sync::Arc,
    time::Instant,
};

use arrayvec::ArrayVec;
use ordered_float::OrderedFloat;
use parking_lot::Mutex;

use super::{
    create_shader_modules, Blending, CompareOp, ComponentMask, CreatePipelineError, Culling,
    DepthBias, DepthBounds, DepthTest, FrontFace, InvalidPipelineState, LogicOp, PipelineBindPoint,
    PipelineLayout, PipelineOptions, PolygonMode, PrimitiveTopology, Samples, SpecializationData,
    StencilTests, VertexFormat, VertexInputRate,
};
use crate::{
    backend::{
        Backend, DeviceCapability, DynamicState, GraphicsPipelineDesc, PipelineCreateFlags,
        RasterizationOrder, ShaderStageDesc,
    },
    cache::PipelineCache,
    descriptor::{BindingState, DescriptorSlotMapping},
    shader::{Shader, ShaderModule, ShaderStage},
};

pub const MAX_VERTEX_ATTRIBUTES: usize = 32;
pub const MAX_VERTEX_BINDINGS: usize = 32;
pub const MAX_RENDER_TARGETS: usize = 8;

/// States that are never baked into graphics pipelines.
pub const DYNAMIC_STATES: [DynamicState; 4] = [
    DynamicState::Viewport,
    DynamicState::Scissor,
    DynamicState::BlendConstants,
    DynamicState::StencilReference,
];

/// Opaque identifier of a render pass compatibility class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderPassHandle(pub NonZeroU64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct InputAssemblyState {
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,

    /// Control points per patch.
    /// Non-zero value requires both tessellation shaders.
    pub patch_vertex_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexInputAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub rate: VertexInputRate,
}

/// Vertex attributes and buffers they are fetched from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct InputLayoutState {
    pub attributes: ArrayVec<VertexInputAttribute, MAX_VERTEX_ATTRIBUTES>,
    pub bindings: ArrayVec<VertexInputBinding, MAX_VERTEX_BINDINGS>,
}

impl InputLayoutState {
    /// Mask of locations provided by attributes.
    pub fn location_mask(&self) -> u32 {
        self.attributes
            .iter()
            .filter(|attribute| attribute.location < 32)
            .fold(0, |mask, attribute| mask | (1 << attribute.location))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct RasterizerState {
    pub depth_clamp: bool,

    /// Primitives are discarded before rasterization.
    pub discard: bool,
    pub polygon_mode: PolygonMode,
    pub culling: Option<Culling>,
    pub front_face: FrontFace,
    pub depth_bias: Option<DepthBias>,
    pub viewport_count: u32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        RasterizerState {
            depth_clamp: false,
            discard: false,
            polygon_mode: PolygonMode::Fill,
            culling: None,
            front_face: FrontFace::Clockwise,
            depth_bias: None,
            viewport_count: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct MultisampleState {
    pub samples: Samples,
    pub sample_mask: u32,
    pub alpha_to_coverage: bool,
    pub alpha_to_one: bool,

    /// Minimal fraction of samples shaded individually.
    pub sample_shading: Option<OrderedFloat<f32>>,
}

impl Default for MultisampleState {
    fn default() -> Self {
        MultisampleState {
            samples: Samples::Samples1,
            sample_mask: !0,
            alpha_to_coverage: false,
            alpha_to_one: false,
            sample_shading: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthStencilState {
    pub depth_test: Option<DepthTest>,
    pub depth_bounds: Option<DepthBounds>,
    pub stencil: Option<StencilTests>,
}

impl DepthStencilState {
    /// Returns `true` if depth is both tested with strict ordering and written.
    /// Coplanar primitives can't change the result in this case.
    fn is_order_independent(&self) -> bool {
        match self.depth_test {
            Some(DepthTest { compare, write }) => {
                write && matches!(compare, CompareOp::Less | CompareOp::Greater)
            }
            None => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorBlendAttachment {
    pub blending: Option<Blending>,
    pub write_mask: ComponentMask,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        ColorBlendAttachment {
            blending: None,
            write_mask: ComponentMask::RGBA,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputMergerState {
    pub logic_op: Option<LogicOp>,
    pub render_pass: Option<RenderPassHandle>,
    pub attachments: [ColorBlendAttachment; MAX_RENDER_TARGETS],
}

/// State that selects graphics pipeline variant.
///
/// Two states select the same variant iff they are equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphicsPipelineState {
    pub bindings: BindingState,
    pub input_assembly: InputAssemblyState,
    pub input_layout: InputLayoutState,
    pub rasterizer: RasterizerState,
    pub multisample: MultisampleState,
    pub depth_stencil: DepthStencilState,
    pub output_merger: OutputMergerState,
}

/// Shaders of the graphics pipeline.
#[derive(Clone, Debug)]
pub struct GraphicsShaders {
    pub vertex: Arc<Shader>,
    pub tessellation_control: Option<Arc<Shader>>,
    pub tessellation_evaluation: Option<Arc<Shader>>,
    pub geometry: Option<Arc<Shader>>,
    pub fragment: Option<Arc<Shader>>,
}

impl GraphicsShaders {
    /// Present shaders with stages they are bound to, in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (ShaderStage, &Arc<Shader>)> + '_ {
        std::iter::once((ShaderStage::Vertex, &self.vertex))
            .chain(
                self.tessellation_control
                    .iter()
                    .map(|shader| (ShaderStage::TessellationControl, shader)),
            )
            .chain(
                self.tessellation_evaluation
                    .iter()
                    .map(|shader| (ShaderStage::TessellationEvaluation, shader)),
            )
            .chain(
                self.geometry
                    .iter()
                    .map(|shader| (ShaderStage::Geometry, shader)),
            )
            .chain(
                self.fragment
                    .iter()
                    .map(|shader| (ShaderStage::Fragment, shader)),
            )
    }

    fn names(&self) -> String {
        self.iter()
            .map(|(_, shader)| shader.debug_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Graphics pipeline.
///
/// Owns shader modules and layout,
/// and compiles one device pipeline per observed state.
pub struct GraphicsPipeline<B: Backend> {
    device: Arc<B>,
    cache: Arc<PipelineCache<B>>,
    options: PipelineOptions,
    shaders: GraphicsShaders,
    pipelines: Mutex<Vec<(GraphicsPipelineState, B::Pipeline)>>,
    modules: Vec<ShaderModule<B>>,
    layout: PipelineLayout<B>,
}

impl<B> Debug for GraphicsPipeline<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fmt.alternate() {
            fmt.debug_struct("GraphicsPipeline")
                .field("shaders", &self.shaders)
                .field("options", &self.options)
                .field("layout", &self.layout)
                .field("variants", &self.pipelines.lock().len())
                .finish()
        } else {
            write!(fmt, "GraphicsPipeline({})", self.shaders.names())
        }
    }
}

impl<B> GraphicsPipeline<B>
where
    B: Backend,
{
    pub fn new(
        device: &Arc<B>,
        cache: &Arc<PipelineCache<B>>,
        options: PipelineOptions,
        shaders: GraphicsShaders,
    ) -> Result<Self, CreatePipelineError> {
        let mut mapping = DescriptorSlotMapping::new();

        for (stage, shader) in shaders.iter() {
            if shader.stage() != stage {
                return Err(CreatePipelineError::WrongShaderStage {
                    shader: shader.debug_name().to_owned(),
                    expected: stage,
                    found: shader.stage(),
                });
            }
            shader.define_resource_slots(&mut mapping);
        }

        let layout = PipelineLayout::new(device, &mapping, PipelineBindPoint::Graphics)?;
        let modules = create_shader_modules(device, &mapping, shaders.iter().map(|(_, s)| s))?;

        debug!(
            "Graphics pipeline [{}] created with {} bindings",
            shaders.names(),
            mapping.binding_count()
        );

        Ok(GraphicsPipeline {
            device: Arc::clone(device),
            cache: Arc::clone(cache),
            options,
            shaders,
            pipelines: Mutex::new(Vec::new()),
            modules,
            layout,
        })
    }

    pub fn shaders(&self) -> &GraphicsShaders {
        &self.shaders
    }

    pub fn layout(&self) -> &PipelineLayout<B> {
        &self.layout
    }

    /// Returns device pipeline compiled for the state.
    ///
    /// Compiles and remembers new variant on first use of the state.
    /// Invalid state and failed compilation are reported and not remembered.
    pub fn get_pipeline_handle(
        &self,
        state: &GraphicsPipelineState,
    ) -> Result<B::Pipeline, CreatePipelineError> {
        let mut pipelines = self.pipelines.lock();

        if let Some((_, handle)) = pipelines.iter().find(|(known, _)| known == state) {
            return Ok(*handle);
        }

        self.validate(state)?;

        let base = if self.device.supports(DeviceCapability::PipelineDerivatives) {
            pipelines.first().map(|(_, handle)| *handle)
        } else {
            None
        };

        let handle = self.compile(state, base)?;
        pipelines.push((state.clone(), handle));
        drop(pipelines);

        self.cache.update();
        Ok(handle)
    }

    /// Number of compiled variants.
    pub fn variant_count(&self) -> usize {
        self.pipelines.lock().len()
    }

    /// Checks that the state can be used with pipeline shaders.
    pub fn validate(&self, state: &GraphicsPipelineState) -> Result<(), InvalidPipelineState> {
        if state.output_merger.render_pass.is_none() {
            return Err(InvalidPipelineState::MissingRenderPass);
        }

        let provided = state.input_layout.location_mask();
        let required = self.shaders.vertex.interface().inputs;
        if required & !provided != 0 {
            return Err(InvalidPipelineState::VertexInputMismatch { provided, required });
        }

        if state.input_assembly.patch_vertex_count != 0
            && (self.shaders.tessellation_control.is_none()
                || self.shaders.tessellation_evaluation.is_none())
        {
            return Err(InvalidPipelineState::PatchesWithoutTessellation);
        }

        Ok(())
    }

    /// Picks rasterization order for the state.
    pub fn rasterization_order(&self, state: &GraphicsPipelineState) -> RasterizationOrder {
        let outputs = self
            .shaders
            .fragment
            .as_ref()
            .map_or(0, |fragment| fragment.interface().outputs);

        let blending = state
            .output_merger
            .attachments
            .iter()
            .enumerate()
            .any(|(index, attachment)| {
                outputs & (1 << index) != 0 && attachment.blending.is_some()
            });

        if !blending
            && (self.options.assume_no_zfight || state.depth_stencil.is_order_independent())
        {
            RasterizationOrder::Relaxed
        } else {
            RasterizationOrder::Strict
        }
    }

    fn compile(
        &self,
        state: &GraphicsPipelineState,
        base: Option<B::Pipeline>,
    ) -> Result<B::Pipeline, CreatePipelineError> {
        let flags = match base {
            Some(_) => PipelineCreateFlags::DERIVATIVE,
            None if self.device.supports(DeviceCapability::PipelineDerivatives) => {
                PipelineCreateFlags::ALLOW_DERIVATIVES
            }
            None => PipelineCreateFlags::empty(),
        };

        let rasterization_order = if self.device.supports(DeviceCapability::RasterizationOrder) {
            Some(self.rasterization_order(state))
        } else {
            None
        };

        let stages: ArrayVec<ShaderStageDesc<'_, B>, 5> = self
            .modules
            .iter()
            .map(|module| ShaderStageDesc {
                stage: module.stage(),
                module: module.handle(),
            })
            .collect();

        let specialization = SpecializationData::new(&state.bindings);

        debug!("Compiling graphics pipeline [{}]", self.shaders.names());
        let start = Instant::now();

        let result = self.device.create_graphics_pipeline(&GraphicsPipelineDesc {
            stages: &stages,
            layout: self.layout.handle(),
            specialization: &specialization,
            cache: self.cache.handle(),
            flags,
            base,
            state,
            dynamic_states: &DYNAMIC_STATES,
            rasterization_order,
        });

        match result {
            Ok(handle) => {
                debug!(
                    "Graphics pipeline [{}] compiled in {} ms",
                    self.shaders.names(),
                    start.elapsed().as_millis()
                );
                Ok(handle)
            }
            Err(err) => {
                error!(
                    "Failed to compile graphics pipeline [{}]: {}",
                    self.shaders.names(),
                    err
                );
                Err(CreatePipelineError::from_compile(self.shaders.names(), err))
            }
        }
    }
}

impl<B> Drop for GraphicsPipeline<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        for (_, handle) in self.pipelines.get_mut().drain(..) {
            self.device.destroy_pipeline(handle);
        }
    }
}
