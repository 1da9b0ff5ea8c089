/// Number of global bindings tracked by [`BindingState`].
pub const MAX_ACTIVE_BINDINGS: usize = 128;

/// Set of global bindings that have a resource bound.
///
/// Pipelines are specialized on this state so shaders can skip
/// accesses to unbound resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct BindingState {
    bits: [u64; MAX_ACTIVE_BINDINGS / 64],
}

impl BindingState {
    pub const fn new() -> Self {
        BindingState {
            bits: [0; MAX_ACTIVE_BINDINGS / 64],
        }
    }

    pub fn is_bound(&self, binding: u32) -> bool {
        match split(binding) {
            Some((word, bit)) => self.bits[word] & bit != 0,
            None => false,
        }
    }

    /// Marks binding as bound.
    /// Returns `true` if state changed.
    pub fn bind(&mut self, binding: u32) -> bool {
        match split(binding) {
            Some((word, bit)) => {
                let changed = self.bits[word] & bit == 0;
                self.bits[word] |= bit;
                changed
            }
            None => false,
        }
    }

    /// Marks binding as unbound.
    /// Returns `true` if state changed.
    pub fn unbind(&mut self, binding: u32) -> bool {
        match split(binding) {
            Some((word, bit)) => {
                let changed = self.bits[word] & bit != 0;
                self.bits[word] &= !bit;
                changed
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.bits = [0; MAX_ACTIVE_BINDINGS / 64];
    }

    pub fn bound_count(&self) -> u32 {
        self.bits.iter().map(|word| word.count_ones()).sum()
    }
}

fn split(binding: u32) -> Option<(usize, u64)> {
    let binding = binding as usize;
    if binding < MAX_ACTIVE_BINDINGS {
        Some((binding / 64, 1 << (binding % 64)))
    } else {
        None
    }
}
