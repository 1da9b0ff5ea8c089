use super::{DescriptorType, ImageViewKind, MAX_ACTIVE_BINDINGS};
use crate::shader::{ShaderStage, ShaderStageFlags};

/// Resource slot of a pipeline after mapping.
///
/// Index of the slot in [`DescriptorSlotMapping::binding_infos`]
/// is its global binding index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct DescriptorSlot {
    /// Shader-local slot index.
    pub slot: u32,

    /// Descriptor type.
    pub ty: DescriptorType,

    /// Image view kind for image descriptors.
    pub view: Option<ImageViewKind>,

    /// Stages accessing the slot.
    pub stages: ShaderStageFlags,
}

/// Assigns every logical slot used by shaders of one pipeline
/// a global binding index.
///
/// First registration of a slot appends it.
/// Later registrations of the same slot from other stages
/// only extend its stage mask.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescriptorSlotMapping {
    slots: Vec<DescriptorSlot>,
}

impl DescriptorSlotMapping {
    pub const fn new() -> Self {
        DescriptorSlotMapping { slots: Vec::new() }
    }

    /// Registers slot used by `stage` and returns its global binding index.
    pub fn define_slot(
        &mut self,
        slot: u32,
        ty: DescriptorType,
        view: Option<ImageViewKind>,
        stage: ShaderStage,
    ) -> u32 {
        if let Some(index) = self.find(slot) {
            let entry = &mut self.slots[index as usize];
            if entry.ty != ty || entry.view != view {
                warn!(
                    "Slot {} redefined by {} stage as {:?}/{:?}, was {:?}/{:?}",
                    slot,
                    stage,
                    ty,
                    view,
                    entry.ty,
                    entry.view
                );
            }
            entry.stages |= ShaderStageFlags::from(stage);
            return index;
        }

        let index = self.slots.len() as u32;
        if index as usize == MAX_ACTIVE_BINDINGS {
            warn!(
                "Pipeline uses more than {} bindings, binding state does not track the rest",
                MAX_ACTIVE_BINDINGS
            );
        }

        self.slots.push(DescriptorSlot {
            slot,
            ty,
            view,
            stages: stage.into(),
        });
        index
    }

    /// Returns global binding index assigned to the slot.
    pub fn binding_id(&self, slot: u32) -> Option<u32> {
        self.find(slot)
    }

    pub fn binding_count(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn binding_infos(&self) -> &[DescriptorSlot] {
        &self.slots
    }

    fn find(&self, slot: u32) -> Option<u32> {
        self.slots
            .iter()
            .position(|entry| entry.slot == slot)
            .map(|index| index as u32)
    }
}
