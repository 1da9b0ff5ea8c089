mod mapping;
mod state;

pub use self::{mapping::*, state::*};

/// Type of descriptor bound to a resource slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum DescriptorType {
    /// Sampler descriptor.\
    /// Contains `Sampler` instance.
    Sampler,

    /// Combined image and sampler descriptor.\
    /// Contains both `ImageView` and `Sampler` instances.
    CombinedImageSampler,

    /// Image that can be used for sampling.\
    /// Contains `ImageView` instance.
    SampledImage,

    /// Image that can be used for storage operations.\
    /// Contains `ImageView` instance.
    StorageImage,

    /// Formatted read-only buffer view.
    UniformTexelBuffer,

    /// Formatted buffer view that can be used for storage operations.
    StorageTexelBuffer,

    /// Uniform buffer range.
    UniformBuffer,

    /// Storage buffer range.
    StorageBuffer,

    /// Uniform buffer range with offset specified at bind time.
    UniformBufferDynamic,

    /// Storage buffer range with offset specified at bind time.
    StorageBufferDynamic,
}

impl DescriptorType {
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            DescriptorType::CombinedImageSampler
                | DescriptorType::SampledImage
                | DescriptorType::StorageImage
        )
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBufferDynamic | DescriptorType::StorageBufferDynamic
        )
    }
}

/// Kind of image view a resource slot expects.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageViewKind {
    /// One dimensional image view
    D1,

    /// Two dimensional image view.
    D2,

    /// Three dimensional image view.
    D3,

    /// Cube view.
    /// 6 image layers are treated as sides of a cube.
    Cube,

    /// Array of one dimensional layers.
    D1Array,

    /// Array of two dimensional layers.
    D2Array,

    /// Array of cubes, 6 layers each.
    CubeArray,
}
