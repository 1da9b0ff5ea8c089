use std::{
    fmt::{self, Debug, Display},
    io::{self, Read, Write},
    sync::Arc,
};

use xxhash_rust::xxh3::xxh3_64;

use crate::{
    backend::Backend,
    descriptor::{DescriptorSlotMapping, DescriptorType, ImageViewKind},
    spirv::{InvalidShader, ReadShaderError, SpirvCode},
    OutOfMemory,
};

bitflags::bitflags! {
    /// Flags for each of shader stages.
    #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
    pub struct ShaderStageFlags: u32 {
        const VERTEX                    = 0b000001;
        const TESSELLATION_CONTROL      = 0b000010;
        const TESSELLATION_EVALUATION   = 0b000100;
        const GEOMETRY                  = 0b001000;
        const FRAGMENT                  = 0b010000;
        const COMPUTE                   = 0b100000;

        const ALL_GRAPHICS              = 0b011111;
        const ALL                       = 0b111111;
    }
}

/// Shader stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// Short stage tag used in shader names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Vertex => "VS",
            Self::TessellationControl => "HS",
            Self::TessellationEvaluation => "DS",
            Self::Geometry => "GS",
            Self::Fragment => "PS",
            Self::Compute => "CS",
        }
    }
}

impl Display for ShaderStage {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => fmt.write_str("Vertex"),
            Self::TessellationControl => fmt.write_str("TessellationControl"),
            Self::TessellationEvaluation => fmt.write_str("TessellationEvaluation"),
            Self::Geometry => fmt.write_str("Geometry"),
            Self::Fragment => fmt.write_str("Fragment"),
            Self::Compute => fmt.write_str("Compute"),
        }
    }
}

impl From<ShaderStage> for ShaderStageFlags {
    fn from(stage: ShaderStage) -> ShaderStageFlags {
        match stage {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::TessellationControl => ShaderStageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => ShaderStageFlags::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => ShaderStageFlags::GEOMETRY,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

/// Shader resource slot.
/// `slot` is the value of `Binding` decorations in the shader code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceSlot {
    pub slot: u32,
    pub ty: DescriptorType,
    pub view: Option<ImageViewKind>,
}

/// Masks of stage input and output locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct InterfaceSlots {
    /// Bit `n` is set if location `n` is consumed.
    pub inputs: u32,

    /// Bit `n` is set if location `n` is written.
    pub outputs: u32,
}

/// Error that may occur when shader module is created.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CreateShaderModuleError {
    #[error(transparent)]
    OutOfMemory {
        #[from]
        source: OutOfMemory,
    },

    #[error(transparent)]
    InvalidShader {
        #[from]
        source: InvalidShader,
    },

    /// Device refused the code for a reason other than memory exhaustion.
    #[error("Device rejected shader module: {message}")]
    Rejected { message: String },
}

/// Translated shader of one stage.
///
/// Shaders are shared between pipelines as `Arc<Shader>`.
/// Pipelines are identified by shader identity, not content.
pub struct Shader {
    stage: ShaderStage,
    code: SpirvCode,
    slots: Vec<ResourceSlot>,
    interface: InterfaceSlots,
    debug_name: String,
    optimized: bool,
}

impl Debug for Shader {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fmt.alternate() {
            fmt.debug_struct("Shader")
                .field("stage", &self.stage)
                .field("code", &self.code)
                .field("slots", &self.slots)
                .field("interface", &self.interface)
                .field("debug_name", &self.debug_name)
                .finish()
        } else {
            write!(fmt, "Shader({})", self.debug_name)
        }
    }
}

impl Shader {
    pub fn new(
        stage: ShaderStage,
        code: SpirvCode,
        slots: Vec<ResourceSlot>,
        interface: InterfaceSlots,
    ) -> Self {
        let debug_name = format!("{}_{:016x}", stage.tag(), xxh3_64(code.as_bytes()));

        Shader {
            stage,
            code,
            slots,
            interface,
            debug_name,
            optimized: false,
        }
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = name.into();
        self
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn code(&self) -> &SpirvCode {
        &self.code
    }

    pub fn slots(&self) -> &[ResourceSlot] {
        &self.slots
    }

    pub fn interface(&self) -> InterfaceSlots {
        self.interface
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// Registers every resource slot of the shader in the mapping.
    pub fn define_resource_slots(&self, mapping: &mut DescriptorSlotMapping) {
        for slot in &self.slots {
            mapping.define_slot(slot.slot, slot.ty, slot.view, self.stage);
        }
    }

    /// Creates device shader module with bindings rewritten
    /// according to the mapping.
    pub fn create_shader_module<B>(
        &self,
        device: &Arc<B>,
        mapping: &DescriptorSlotMapping,
    ) -> Result<ShaderModule<B>, CreateShaderModuleError>
    where
        B: Backend,
    {
        let mut code = self.code.clone();
        let mut unmapped = 0;

        code.remap_bindings(|slot| {
            let binding = mapping.binding_id(slot);
            if binding.is_none() {
                unmapped += 1;
            }
            binding
        })?;

        if unmapped > 0 {
            warn!(
                "Shader {}: {} binding decorations have no mapped slot",
                self.debug_name,
                unmapped
            );
        }

        let handle = device.create_shader_module(self.stage, &code)?;

        Ok(ShaderModule {
            device: Arc::clone(device),
            handle,
            stage: self.stage,
            debug_name: self.debug_name.clone(),
        })
    }

    /// Strips debug information from the code.
    ///
    /// Must be called before the shader is first used.
    /// Does nothing if the shader is already optimized.
    /// On failure the original code is kept.
    pub fn optimize(&mut self) {
        if self.optimized {
            return;
        }

        match self.code.strip_debug() {
            Ok(code) => {
                info!(
                    "Shader {} optimized, {} -> {} bytes",
                    self.debug_name,
                    self.code.len_bytes(),
                    code.len_bytes()
                );
                self.code = code;
                self.optimized = true;
            }
            Err(err) => {
                error!("Failed to optimize {} shader: {}", self.debug_name, err);
            }
        }
    }

    /// Writes shader code to the stream.
    pub fn dump(&self, writer: impl Write) -> io::Result<()> {
        self.code.write_to(writer)
    }

    /// Replaces shader code with code read from the stream.
    pub fn read(&mut self, reader: impl Read) -> Result<(), ReadShaderError> {
        self.code = SpirvCode::read_from(reader)?;
        self.optimized = false;
        Ok(())
    }
}

/// Device shader module.
/// Destroyed when dropped.
pub struct ShaderModule<B: Backend> {
    device: Arc<B>,
    handle: B::ShaderModule,
    stage: ShaderStage,
    debug_name: String,
}

impl<B> Debug for ShaderModule<B>
where
    B: Backend,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fmt.alternate() {
            fmt.debug_struct("ShaderModule")
                .field("handle", &self.handle)
                .field("stage", &self.stage)
                .field("debug_name", &self.debug_name)
                .finish()
        } else {
            write!(fmt, "ShaderModule({})", self.debug_name)
        }
    }
}

impl<B> ShaderModule<B>
where
    B: Backend,
{
    pub fn handle(&self) -> &B::ShaderModule {
        &self.handle
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

impl<B> Drop for ShaderModule<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        self.device.destroy_shader_module(&self.handle);
    }
}
