use std::{collections::HashMap, sync::Mutex};

use bitflags::bitflags;
use once_cell::sync::OnceCell;

use crate::{
    bits::{self, StateKey},
    error::StateError,
    property::{Decal, DepthTest, Fog, Target, Transparency, WriteMask},
    shader::{ProgramHandle, ProgramType},
    texture::TextureHandle,
};

/// Upper bound on distinct render states per session.
pub const MAX_STATES: usize = 4096;

bitflags! {
    /// Material flags consumed by shaders, either per draw call or per vertex.
    pub struct MaterialFlags: u32 {
        /// Full brightness, ignores lighting.
        const EMISSIVE            = 0x0001;
        #[allow(missing_docs)]
        const DISABLE_DIFFUSE     = 0x0002;
        #[allow(missing_docs)]
        const DISABLE_AO          = 0x0004;
        /// Discard fragments below the cutout threshold.
        const CUTOUT              = 0x0008;
        #[allow(missing_docs)]
        const UNMIPPED            = 0x0010;
        /// Use a low cutout threshold instead of 50%.
        const TRANSLUCENT_CUTOUT  = 0x0020;
        /// Red blended overlay color.
        const HURT_OVERLAY        = 0x0040;
        /// White blended overlay color.
        const FLASH_OVERLAY       = 0x0080;
        #[allow(missing_docs)]
        const DISABLE_COLOR_INDEX = 0x0100;
        #[allow(missing_docs)]
        const DECAL_TRANSLUCENCY  = 0x0200;
    }
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// An interned render state.
///
/// Primitives with the same state share vertex encoding, uniform state and device state,
/// so they can be drawn in one call and should be packed contiguously.
///
/// States are created only by [StateRegistry] and never change. The decoded fields are
/// views of `key`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderState {
    /// Dense index, 0 for [StateRegistry::missing].
    pub index: usize,
    pub key: StateKey,

    pub primitive: u8,
    pub texture: TextureHandle,
    pub bilinear: bool,
    pub transparency: Transparency,
    pub depth_test: DepthTest,
    pub cull: bool,
    pub write_mask: WriteMask,
    pub enable_lightmap: bool,
    pub decal: Decal,
    pub target: Target,
    pub lines: bool,
    pub fog: Fog,
    pub emissive: bool,
    pub disable_diffuse: bool,
    pub disable_ao: bool,
    pub cutout: bool,
    pub unmipped: bool,
    pub translucent_cutout: bool,
    pub hurt_overlay: bool,
    pub flash_overlay: bool,
    pub disable_color_index: bool,
    pub decal_translucency: bool,
    pub default_blend_mode: bool,
    pub condition: u32,
    pub shader: ProgramHandle,
}

impl RenderState {
    fn new(index: usize, key: StateKey) -> Self {
        Self {
            index,
            key,
            primitive: key.primitive(),
            texture: TextureHandle(key.texture()),
            bilinear: key.bilinear(),
            transparency: key.transparency(),
            depth_test: key.depth_test(),
            cull: key.cull(),
            write_mask: key.write_mask(),
            enable_lightmap: key.enable_lightmap(),
            decal: key.decal(),
            target: key.target(),
            lines: key.lines(),
            fog: key.fog(),
            emissive: key.emissive(),
            disable_diffuse: key.disable_diffuse(),
            disable_ao: key.disable_ao(),
            cutout: key.cutout(),
            unmipped: key.unmipped(),
            translucent_cutout: key.translucent_cutout(),
            hurt_overlay: key.hurt_overlay(),
            flash_overlay: key.flash_overlay(),
            disable_color_index: key.disable_color_index(),
            decal_translucency: key.decal_translucency(),
            default_blend_mode: key.default_blend_mode(),
            condition: key.condition(),
            shader: ProgramHandle(key.shader()),
        }
    }

    /// True for the reserved MISSING state.
    pub fn is_missing(&self) -> bool {
        self.index == 0
    }

    /// Translucent states are sorted per primitive and use vertex-logic programs.
    pub fn is_translucent(&self) -> bool {
        self.transparency == Transparency::Translucent
    }

    /// The program variant this state's material needs.
    pub fn program_type(&self) -> ProgramType {
        program_type_for(self.transparency)
    }

    #[allow(missing_docs)]
    pub fn material_flags(&self) -> MaterialFlags {
        let mut flags = MaterialFlags::empty();
        flags.set(MaterialFlags::EMISSIVE, self.emissive);
        flags.set(MaterialFlags::DISABLE_DIFFUSE, self.disable_diffuse);
        flags.set(MaterialFlags::DISABLE_AO, self.disable_ao);
        flags.set(MaterialFlags::CUTOUT, self.cutout);
        flags.set(MaterialFlags::UNMIPPED, self.unmipped);
        flags.set(MaterialFlags::TRANSLUCENT_CUTOUT, self.translucent_cutout);
        flags.set(MaterialFlags::HURT_OVERLAY, self.hurt_overlay);
        flags.set(MaterialFlags::FLASH_OVERLAY, self.flash_overlay);
        flags.set(MaterialFlags::DISABLE_COLOR_INDEX, self.disable_color_index);
        flags.set(MaterialFlags::DECAL_TRANSLUCENCY, self.decal_translucency);
        flags
    }
}

pub(crate) fn program_type_for(transparency: Transparency) -> ProgramType {
    if transparency == Transparency::Translucent {
        ProgramType::MaterialVertexLogic
    } else {
        ProgramType::MaterialUniformLogic
    }
}

#[derive(Debug, Default)]
struct RegistryIndex {
    lookup: HashMap<StateKey, usize>,
    next_index: usize,
}

/// Deduplicating store of render states.
///
/// Creation is serialized by a lock. Published states sit in write-once slots, so
/// [StateRegistry::from_index] does not lock.
#[derive(Debug)]
pub struct StateRegistry {
    slots: Box<[OnceCell<RenderState>]>,
    index: Mutex<RegistryIndex>,
}

impl StateRegistry {
    /// Creates a registry with `capacity` slots. Slot 0 holds MISSING.
    ///
    /// # Panics
    /// Panics if `capacity` is zero or above [MAX_STATES].
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity <= MAX_STATES,
            "invalid render state capacity: {}",
            capacity
        );
        assert!(bits::TOTAL_BITS <= u64::BITS);
        tracing::debug!(
            "render state registry: {} slots, {} key bits",
            capacity,
            bits::TOTAL_BITS
        );

        let slots: Box<[OnceCell<RenderState>]> = (0..capacity).map(|_| OnceCell::new()).collect();
        let _ = slots[0].set(RenderState::new(0, StateKey(0)));

        Self {
            slots,
            index: Mutex::new(RegistryIndex {
                lookup: HashMap::new(),
                next_index: 1,
            }),
        }
    }

    /// Returns the state with exactly these bits, creating it if it does not exist.
    ///
    /// New states get the next sequential index. Running out of slots is fatal for the
    /// caller: the content requires more states than the session can represent.
    ///
    /// # Panics
    /// Panics if a field holds an ordinal that names no variant. The key is decoded
    /// before the registry is locked, so the registry stays usable afterwards.
    pub fn intern(&self, key: StateKey) -> Result<&RenderState, StateError> {
        let key = key.normalized();
        let mut state = RenderState::new(0, key);

        let mut index = self.index.lock().unwrap();
        if let Some(&existing) = index.lookup.get(&key) {
            return self
                .from_index(existing)
                .ok_or(StateError::UnknownStateIndex(existing));
        }

        let next = index.next_index;
        if next >= self.slots.len() {
            tracing::error!(
                "render state limit of {} exceeded by {:?}",
                self.slots.len(),
                key
            );
            return Err(StateError::StateCapacityExceeded {
                capacity: self.slots.len(),
            });
        }

        state.index = next;
        let _ = self.slots[next].set(state);
        index.lookup.insert(key, next);
        index.next_index += 1;
        tracing::debug!("render state {} created for {:?}", next, key);

        self.from_index(next)
            .ok_or(StateError::UnknownStateIndex(next))
    }

    /// Looks up a previously issued state.
    pub fn from_index(&self, index: usize) -> Option<&RenderState> {
        self.slots.get(index)?.get()
    }

    /// Looks up a state by its complete key without creating it.
    pub fn from_key(&self, key: StateKey) -> Option<&RenderState> {
        let index = *self.index.lock().unwrap().lookup.get(&key)?;
        self.from_index(index)
    }

    /// The reserved state at index 0, used for content this system does not manage.
    pub fn missing(&self) -> &RenderState {
        match self.slots[0].get() {
            Some(state) => state,
            None => unreachable!("missing state is set on construction"),
        }
    }

    /// Number of states issued, including MISSING.
    pub fn len(&self) -> usize {
        self.index.lock().unwrap().next_index
    }

    /// Always false; MISSING always exists.
    pub fn is_empty(&self) -> bool {
        false
    }

    #[allow(missing_docs)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_share_one_instance() {
        let registry = StateRegistry::new(16);
        let a = registry.intern(StateKey::DEFAULT).unwrap();
        let b = registry.intern(StateKey(StateKey::DEFAULT.0)).unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.index, 1);

        let c = registry.intern(StateKey::DEFAULT.with_emissive(true)).unwrap();
        assert_eq!(c.index, 2);
        assert!(c.emissive);
        assert_eq!(registry.from_index(2), Some(c));
        assert_eq!(registry.from_key(StateKey::DEFAULT), Some(a));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn shader_bits_participate_in_identity() {
        let registry = StateRegistry::new(16);
        let a = registry.intern(StateKey::DEFAULT).unwrap();
        let b = registry.intern(StateKey::DEFAULT.with_shader(1)).unwrap();
        assert_ne!(a.index, b.index);
        assert_eq!(b.shader.index(), 1);
    }

    #[test]
    fn missing_is_reserved_and_not_looked_up_by_bits() {
        let registry = StateRegistry::new(16);
        assert_eq!(registry.missing().index, 0);
        assert!(registry.missing().is_missing());
        let zero = registry.intern(StateKey(0)).unwrap();
        assert_eq!(zero.index, 1);
        assert!(!zero.is_missing());
    }

    #[test]
    fn capacity_error_on_first_pattern_past_the_limit() {
        let registry = StateRegistry::new(4);
        for condition in 0..3 {
            registry
                .intern(StateKey::DEFAULT.with_condition(condition))
                .unwrap();
        }
        assert_eq!(
            registry.intern(StateKey::DEFAULT.with_condition(3)),
            Err(StateError::StateCapacityExceeded { capacity: 4 })
        );
        // existing states are still found when full
        assert_eq!(
            registry
                .intern(StateKey::DEFAULT.with_condition(1))
                .unwrap()
                .index,
            2
        );
    }

    #[test]
    fn undecodable_key_leaves_registry_usable() {
        use std::panic::{self, AssertUnwindSafe};

        let registry = StateRegistry::new(16);
        let bad = StateKey(bits::TRANSPARENCY.field().mask());
        let result = panic::catch_unwind(AssertUnwindSafe(|| registry.intern(bad).map(|_| ())));
        assert!(result.is_err());

        let state = registry.intern(StateKey::DEFAULT).unwrap();
        assert_eq!(state.index, 1);
        assert_eq!(registry.from_key(StateKey::DEFAULT), Some(state));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn raw_translucent_decal_interns_as_its_alias() {
        let registry = StateRegistry::new(16);
        let raw = StateKey(bits::DECAL.field().set(
            u8::from(Decal::Translucent) as u64,
            StateKey::DEFAULT.0,
        ));
        let state = registry.intern(raw).unwrap();
        assert_eq!(state.decal, Decal::None);
        assert!(state.decal_translucency);

        let aliased = StateKey::DEFAULT
            .with_decal(Decal::None)
            .with_decal_translucency(true);
        assert!(std::ptr::eq(registry.intern(aliased).unwrap(), state));
    }

    #[test]
    fn unissued_index_is_none() {
        let registry = StateRegistry::new(4);
        assert_eq!(registry.from_index(3), None);
        assert_eq!(registry.from_index(100), None);
    }

    #[test]
    fn material_flags_mirror_decoded_fields() {
        let registry = StateRegistry::new(4);
        let state = registry
            .intern(
                StateKey::DEFAULT
                    .with_cutout(true)
                    .with_flash_overlay(true)
                    .with_transparency(Transparency::Translucent),
            )
            .unwrap();
        assert_eq!(
            state.material_flags(),
            MaterialFlags::CUTOUT | MaterialFlags::FLASH_OVERLAY
        );
        assert!(state.is_translucent());
        assert_eq!(state.program_type(), ProgramType::MaterialVertexLogic);
    }
}
