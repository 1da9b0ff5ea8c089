use erupt::vk1_0;

use crate::{
    backend::{DynamicState, PipelineCreateFlags},
    descriptor::DescriptorType,
    out_of_host_memory,
    pipeline::{
        BlendFactor, BlendOp, CompareOp, CompilePipelineError, ComponentMask, Culling, FrontFace,
        LogicOp, PolygonMode, PrimitiveTopology, Samples, StencilOp, StencilTest, VertexFormat,
        VertexInputRate,
    },
    queue::SubmitError,
    shader::{CreateShaderModuleError, ShaderStage, ShaderStageFlags},
    DeviceLost, OutOfMemory,
};

pub(crate) trait ToErupt<T> {
    fn to_erupt(self) -> T;
}

#[track_caller]
pub(crate) fn oom_error_from_erupt(err: vk1_0::Result) -> OutOfMemory {
    match err {
        vk1_0::Result::ERROR_OUT_OF_HOST_MEMORY => out_of_host_memory(),
        vk1_0::Result::ERROR_OUT_OF_DEVICE_MEMORY => OutOfMemory,
        _ => unreachable!("Error {} is unexpected", err),
    }
}

/// Maps pipeline creation failure.
/// Anything but memory exhaustion means the driver refused the pipeline.
#[track_caller]
pub(crate) fn compile_error_from_erupt(err: vk1_0::Result) -> CompilePipelineError {
    match err {
        vk1_0::Result::ERROR_OUT_OF_HOST_MEMORY => out_of_host_memory(),
        vk1_0::Result::ERROR_OUT_OF_DEVICE_MEMORY => OutOfMemory.into(),
        _ => CompilePipelineError::Rejected {
            message: err.to_string(),
        },
    }
}

#[track_caller]
pub(crate) fn shader_module_error_from_erupt(err: vk1_0::Result) -> CreateShaderModuleError {
    match err {
        vk1_0::Result::ERROR_OUT_OF_HOST_MEMORY => out_of_host_memory(),
        vk1_0::Result::ERROR_OUT_OF_DEVICE_MEMORY => OutOfMemory.into(),
        _ => CreateShaderModuleError::Rejected {
            message: err.to_string(),
        },
    }
}

#[track_caller]
pub(crate) fn submit_error_from_erupt(err: vk1_0::Result) -> SubmitError {
    match err {
        vk1_0::Result::ERROR_OUT_OF_HOST_MEMORY => out_of_host_memory(),
        vk1_0::Result::ERROR_OUT_OF_DEVICE_MEMORY => OutOfMemory.into(),
        vk1_0::Result::ERROR_DEVICE_LOST => DeviceLost.into(),
        _ => unreachable!("Error {} is unexpected", err),
    }
}

#[track_caller]
pub(crate) fn wait_error_from_erupt(err: vk1_0::Result) -> DeviceLost {
    match err {
        vk1_0::Result::ERROR_OUT_OF_HOST_MEMORY => out_of_host_memory(),
        vk1_0::Result::ERROR_DEVICE_LOST => DeviceLost,
        _ => unreachable!("Error {} is unexpected", err),
    }
}

impl ToErupt<vk1_0::ShaderStageFlags> for ShaderStageFlags {
    fn to_erupt(self) -> vk1_0::ShaderStageFlags {
        if self == ShaderStageFlags::ALL {
            return vk1_0::ShaderStageFlags::ALL;
        }

        if self == ShaderStageFlags::ALL_GRAPHICS {
            return vk1_0::ShaderStageFlags::ALL_GRAPHICS;
        }

        let mut result = vk1_0::ShaderStageFlags::empty();

        if self.contains(ShaderStageFlags::VERTEX) {
            result |= vk1_0::ShaderStageFlags::VERTEX;
        }

        if self.contains(ShaderStageFlags::TESSELLATION_CONTROL) {
            result |= vk1_0::ShaderStageFlags::TESSELLATION_CONTROL;
        }

        if self.contains(ShaderStageFlags::TESSELLATION_EVALUATION) {
            result |= vk1_0::ShaderStageFlags::TESSELLATION_EVALUATION;
        }

        if self.contains(ShaderStageFlags::GEOMETRY) {
            result |= vk1_0::ShaderStageFlags::GEOMETRY;
        }

        if self.contains(ShaderStageFlags::FRAGMENT) {
            result |= vk1_0::ShaderStageFlags::FRAGMENT;
        }

        if self.contains(ShaderStageFlags::COMPUTE) {
            result |= vk1_0::ShaderStageFlags::COMPUTE;
        }

        result
    }
}

impl ToErupt<vk1_0::ShaderStageFlagBits> for ShaderStage {
    fn to_erupt(self) -> vk1_0::ShaderStageFlagBits {
        match self {
            ShaderStage::Vertex => vk1_0::ShaderStageFlagBits::VERTEX,
            ShaderStage::TessellationControl => vk1_0::ShaderStageFlagBits::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => {
                vk1_0::ShaderStageFlagBits::TESSELLATION_EVALUATION
            }
            ShaderStage::Geometry => vk1_0::ShaderStageFlagBits::GEOMETRY,
            ShaderStage::Fragment => vk1_0::ShaderStageFlagBits::FRAGMENT,
            ShaderStage::Compute => vk1_0::ShaderStageFlagBits::COMPUTE,
        }
    }
}

impl ToErupt<vk1_0::PipelineCreateFlags> for PipelineCreateFlags {
    fn to_erupt(self) -> vk1_0::PipelineCreateFlags {
        let mut result = vk1_0::PipelineCreateFlags::empty();

        if self.contains(PipelineCreateFlags::ALLOW_DERIVATIVES) {
            result |= vk1_0::PipelineCreateFlags::ALLOW_DERIVATIVES;
        }

        if self.contains(PipelineCreateFlags::DERIVATIVE) {
            result |= vk1_0::PipelineCreateFlags::DERIVATIVE;
        }

        result
    }
}

impl ToErupt<vk1_0::DynamicState> for DynamicState {
    fn to_erupt(self) -> vk1_0::DynamicState {
        match self {
            DynamicState::Viewport => vk1_0::DynamicState::VIEWPORT,
            DynamicState::Scissor => vk1_0::DynamicState::SCISSOR,
            DynamicState::BlendConstants => vk1_0::DynamicState::BLEND_CONSTANTS,
            DynamicState::StencilReference => vk1_0::DynamicState::STENCIL_REFERENCE,
        }
    }
}

impl ToErupt<vk1_0::DescriptorType> for DescriptorType {
    fn to_erupt(self) -> vk1_0::DescriptorType {
        match self {
            Self::Sampler => vk1_0::DescriptorType::SAMPLER,
            Self::CombinedImageSampler => vk1_0::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::SampledImage => vk1_0::DescriptorType::SAMPLED_IMAGE,
            Self::StorageImage => vk1_0::DescriptorType::STORAGE_IMAGE,
            Self::UniformTexelBuffer => vk1_0::DescriptorType::UNIFORM_TEXEL_BUFFER,
            Self::StorageTexelBuffer => vk1_0::DescriptorType::STORAGE_TEXEL_BUFFER,
            Self::UniformBuffer => vk1_0::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer => vk1_0::DescriptorType::STORAGE_BUFFER,
            Self::UniformBufferDynamic => vk1_0::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            Self::StorageBufferDynamic => vk1_0::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        }
    }
}

impl ToErupt<vk1_0::VertexInputRate> for VertexInputRate {
    fn to_erupt(self) -> vk1_0::VertexInputRate {
        match self {
            VertexInputRate::Vertex => vk1_0::VertexInputRate::VERTEX,
            VertexInputRate::Instance => vk1_0::VertexInputRate::INSTANCE,
        }
    }
}

impl ToErupt<vk1_0::Format> for VertexFormat {
    fn to_erupt(self) -> vk1_0::Format {
        match self {
            Self::R8Unorm => vk1_0::Format::R8_UNORM,
            Self::RG8Unorm => vk1_0::Format::R8G8_UNORM,
            Self::RGBA8Unorm => vk1_0::Format::R8G8B8A8_UNORM,
            Self::RGBA8Snorm => vk1_0::Format::R8G8B8A8_SNORM,
            Self::RGBA8Uint => vk1_0::Format::R8G8B8A8_UINT,
            Self::BGRA8Unorm => vk1_0::Format::B8G8R8A8_UNORM,
            Self::R16Sfloat => vk1_0::Format::R16_SFLOAT,
            Self::RG16Sfloat => vk1_0::Format::R16G16_SFLOAT,
            Self::RGBA16Sfloat => vk1_0::Format::R16G16B16A16_SFLOAT,
            Self::RG16Snorm => vk1_0::Format::R16G16_SNORM,
            Self::RGBA16Snorm => vk1_0::Format::R16G16B16A16_SNORM,
            Self::RG16Unorm => vk1_0::Format::R16G16_UNORM,
            Self::RGBA16Unorm => vk1_0::Format::R16G16B16A16_UNORM,
            Self::RGBA16Uint => vk1_0::Format::R16G16B16A16_UINT,
            Self::R32Sfloat => vk1_0::Format::R32_SFLOAT,
            Self::RG32Sfloat => vk1_0::Format::R32G32_SFLOAT,
            Self::RGB32Sfloat => vk1_0::Format::R32G32B32_SFLOAT,
            Self::RGBA32Sfloat => vk1_0::Format::R32G32B32A32_SFLOAT,
            Self::R32Uint => vk1_0::Format::R32_UINT,
            Self::RG32Uint => vk1_0::Format::R32G32_UINT,
            Self::RGB32Uint => vk1_0::Format::R32G32B32_UINT,
            Self::RGBA32Uint => vk1_0::Format::R32G32B32A32_UINT,
            Self::R32Sint => vk1_0::Format::R32_SINT,
            Self::RG32Sint => vk1_0::Format::R32G32_SINT,
            Self::RGB32Sint => vk1_0::Format::R32G32B32_SINT,
            Self::RGBA32Sint => vk1_0::Format::R32G32B32A32_SINT,
            Self::A2B10G10R10Unorm => vk1_0::Format::A2B10G10R10_UNORM_PACK32,
        }
    }
}

impl ToErupt<vk1_0::PrimitiveTopology> for PrimitiveTopology {
    fn to_erupt(self) -> vk1_0::PrimitiveTopology {
        match self {
            Self::PointList => vk1_0::PrimitiveTopology::POINT_LIST,
            Self::LineList => vk1_0::PrimitiveTopology::LINE_LIST,
            Self::LineStrip => vk1_0::PrimitiveTopology::LINE_STRIP,
            Self::TriangleList => vk1_0::PrimitiveTopology::TRIANGLE_LIST,
            Self::TriangleStrip => vk1_0::PrimitiveTopology::TRIANGLE_STRIP,
            Self::TriangleFan => vk1_0::PrimitiveTopology::TRIANGLE_FAN,
            Self::LineListWithAdjacency => vk1_0::PrimitiveTopology::LINE_LIST_WITH_ADJACENCY,
            Self::LineStripWithAdjacency => vk1_0::PrimitiveTopology::LINE_STRIP_WITH_ADJACENCY,
            Self::TriangleListWithAdjacency => {
                vk1_0::PrimitiveTopology::TRIANGLE_LIST_WITH_ADJACENCY
            }
            Self::TriangleStripWithAdjacency => {
                vk1_0::PrimitiveTopology::TRIANGLE_STRIP_WITH_ADJACENCY
            }
            Self::PatchList => vk1_0::PrimitiveTopology::PATCH_LIST,
        }
    }
}

impl ToErupt<vk1_0::PolygonMode> for PolygonMode {
    fn to_erupt(self) -> vk1_0::PolygonMode {
        match self {
            PolygonMode::Point => vk1_0::PolygonMode::POINT,
            PolygonMode::Line => vk1_0::PolygonMode::LINE,
            PolygonMode::Fill => vk1_0::PolygonMode::FILL,
        }
    }
}

impl ToErupt<vk1_0::CullModeFlags> for Option<Culling> {
    fn to_erupt(self) -> vk1_0::CullModeFlags {
        match self {
            None => vk1_0::CullModeFlags::NONE,
            Some(Culling::Front) => vk1_0::CullModeFlags::FRONT,
            Some(Culling::Back) => vk1_0::CullModeFlags::BACK,
            Some(Culling::FrontAndBack) => vk1_0::CullModeFlags::FRONT_AND_BACK,
        }
    }
}

impl ToErupt<vk1_0::FrontFace> for FrontFace {
    fn to_erupt(self) -> vk1_0::FrontFace {
        match self {
            FrontFace::Clockwise => vk1_0::FrontFace::CLOCKWISE,
            FrontFace::CounterClockwise => vk1_0::FrontFace::COUNTER_CLOCKWISE,
        }
    }
}

impl ToErupt<vk1_0::CompareOp> for CompareOp {
    fn to_erupt(self) -> vk1_0::CompareOp {
        match self {
            CompareOp::Never => vk1_0::CompareOp::NEVER,
            CompareOp::Less => vk1_0::CompareOp::LESS,
            CompareOp::Equal => vk1_0::CompareOp::EQUAL,
            CompareOp::LessOrEqual => vk1_0::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk1_0::CompareOp::GREATER,
            CompareOp::NotEqual => vk1_0::CompareOp::NOT_EQUAL,
            CompareOp::GreaterOrEqual => vk1_0::CompareOp::GREATER_OR_EQUAL,
            CompareOp::Always => vk1_0::CompareOp::ALWAYS,
        }
    }
}

impl ToErupt<vk1_0::StencilOp> for StencilOp {
    fn to_erupt(self) -> vk1_0::StencilOp {
        match self {
            StencilOp::Keep => vk1_0::StencilOp::KEEP,
            StencilOp::Zero => vk1_0::StencilOp::ZERO,
            StencilOp::Replace => vk1_0::StencilOp::REPLACE,
            StencilOp::IncrementAndClamp => vk1_0::StencilOp::INCREMENT_AND_CLAMP,
            StencilOp::DecrementAndClamp => vk1_0::StencilOp::DECREMENT_AND_CLAMP,
            StencilOp::Invert => vk1_0::StencilOp::INVERT,
            StencilOp::IncrementAndWrap => vk1_0::StencilOp::INCREMENT_AND_WRAP,
            StencilOp::DecrementAndWrap => vk1_0::StencilOp::DECREMENT_AND_WRAP,
        }
    }
}

impl ToErupt<vk1_0::StencilOpState> for StencilTest {
    fn to_erupt(self) -> vk1_0::StencilOpState {
        *vk1_0::StencilOpStateBuilder::new()
            .fail_op(self.fail.to_erupt())
            .pass_op(self.pass.to_erupt())
            .depth_fail_op(self.depth_fail.to_erupt())
            .compare_op(self.compare.to_erupt())
            .compare_mask(self.compare_mask)
            .write_mask(self.write_mask)
    }
}

impl ToErupt<vk1_0::LogicOp> for LogicOp {
    fn to_erupt(self) -> vk1_0::LogicOp {
        match self {
            LogicOp::Clear => vk1_0::LogicOp::CLEAR,
            LogicOp::And => vk1_0::LogicOp::AND,
            LogicOp::AndReverse => vk1_0::LogicOp::AND_REVERSE,
            LogicOp::Copy => vk1_0::LogicOp::COPY,
            LogicOp::AndInverted => vk1_0::LogicOp::AND_INVERTED,
            LogicOp::NoOp => vk1_0::LogicOp::NO_OP,
            LogicOp::Xor => vk1_0::LogicOp::XOR,
            LogicOp::Or => vk1_0::LogicOp::OR,
            LogicOp::Nor => vk1_0::LogicOp::NOR,
            LogicOp::Equivalent => vk1_0::LogicOp::EQUIVALENT,
            LogicOp::Invert => vk1_0::LogicOp::INVERT,
            LogicOp::OrReverse => vk1_0::LogicOp::OR_REVERSE,
            LogicOp::CopyInverted => vk1_0::LogicOp::COPY_INVERTED,
            LogicOp::OrInverted => vk1_0::LogicOp::OR_INVERTED,
            LogicOp::Nand => vk1_0::LogicOp::NAND,
            LogicOp::Set => vk1_0::LogicOp::SET,
        }
    }
}

impl ToErupt<vk1_0::BlendFactor> for BlendFactor {
    fn to_erupt(self) -> vk1_0::BlendFactor {
        match self {
            Self::Zero => vk1_0::BlendFactor::ZERO,
            Self::One => vk1_0::BlendFactor::ONE,
            Self::SrcColor => vk1_0::BlendFactor::SRC_COLOR,
            Self::OneMinusSrcColor => vk1_0::BlendFactor::ONE_MINUS_SRC_COLOR,
            Self::DstColor => vk1_0::BlendFactor::DST_COLOR,
            Self::OneMinusDstColor => vk1_0::BlendFactor::ONE_MINUS_DST_COLOR,
            Self::SrcAlpha => vk1_0::BlendFactor::SRC_ALPHA,
            Self::OneMinusSrcAlpha => vk1_0::BlendFactor::ONE_MINUS_SRC_ALPHA,
            Self::DstAlpha => vk1_0::BlendFactor::DST_ALPHA,
            Self::OneMinusDstAlpha => vk1_0::BlendFactor::ONE_MINUS_DST_ALPHA,
            Self::ConstantColor => vk1_0::BlendFactor::CONSTANT_COLOR,
            Self::OneMinusConstantColor => vk1_0::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
            Self::ConstantAlpha => vk1_0::BlendFactor::CONSTANT_ALPHA,
            Self::OneMinusConstantAlpha => vk1_0::BlendFactor::ONE_MINUS_CONSTANT_ALPHA,
            Self::SrcAlphaSaturate => vk1_0::BlendFactor::SRC_ALPHA_SATURATE,
            Self::Src1Color => vk1_0::BlendFactor::SRC1_COLOR,
            Self::OneMinusSrc1Color => vk1_0::BlendFactor::ONE_MINUS_SRC1_COLOR,
            Self::Src1Alpha => vk1_0::BlendFactor::SRC1_ALPHA,
            Self::OneMinusSrc1Alpha => vk1_0::BlendFactor::ONE_MINUS_SRC1_ALPHA,
        }
    }
}

impl ToErupt<vk1_0::BlendOp> for BlendOp {
    fn to_erupt(self) -> vk1_0::BlendOp {
        match self {
            BlendOp::Add => vk1_0::BlendOp::ADD,
            BlendOp::Subtract => vk1_0::BlendOp::SUBTRACT,
            BlendOp::ReverseSubtract => vk1_0::BlendOp::REVERSE_SUBTRACT,
            BlendOp::Min => vk1_0::BlendOp::MIN,
            BlendOp::Max => vk1_0::BlendOp::MAX,
        }
    }
}

impl ToErupt<vk1_0::ColorComponentFlags> for ComponentMask {
    fn to_erupt(self) -> vk1_0::ColorComponentFlags {
        let mut result = vk1_0::ColorComponentFlags::empty();

        if self.contains(ComponentMask::R) {
            result |= vk1_0::ColorComponentFlags::R
        }

        if self.contains(ComponentMask::G) {
            result |= vk1_0::ColorComponentFlags::G
        }

        if self.contains(ComponentMask::B) {
            result |= vk1_0::ColorComponentFlags::B
        }

        if self.contains(ComponentMask::A) {
            result |= vk1_0::ColorComponentFlags::A
        }

        result
    }
}

impl ToErupt<vk1_0::SampleCountFlagBits> for Samples {
    fn to_erupt(self) -> vk1_0::SampleCountFlagBits {
        match self {
            Samples::Samples1 => vk1_0::SampleCountFlagBits::_1,
            Samples::Samples2 => vk1_0::SampleCountFlagBits::_2,
            Samples::Samples4 => vk1_0::SampleCountFlagBits::_4,
            Samples::Samples8 => vk1_0::SampleCountFlagBits::_8,
            Samples::Samples16 => vk1_0::SampleCountFlagBits::_16,
            Samples::Samples32 => vk1_0::SampleCountFlagBits::_32,
            Samples::Samples64 => vk1_0::SampleCountFlagBits::_64,
        }
    }
}
