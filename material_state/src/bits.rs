//! Bit layout of a packed render state.
//!
//! Every field of a [StateKey] occupies a fixed, non-overlapping range of a `u64`. The
//! accessors read and write only their own range, so fields can be set in any order.
//! The one exception is the shader field, which is derived from the others by
//! [crate::StateFinder::find] and should be written last.

use core::fmt;
use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use crate::{
    device::primitive,
    property::{Decal, DepthTest, Fog, PropertyEnum, Target, Transparency, WriteMask},
};

/// Number of bits needed to store values `0..count`.
const fn bits_for(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}

/// A range of `width` bits starting at bit `shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    shift: u32,
    width: u32,
}

impl BitField {
    #[allow(missing_docs)]
    pub const fn new(shift: u32, width: u32) -> Self {
        assert!(width > 0 && width < 64);
        Self { shift, width }
    }

    /// First bit after this field.
    pub const fn end(self) -> u32 {
        self.shift + self.width
    }

    /// Largest value the field can hold.
    pub const fn max_value(self) -> u64 {
        (1 << self.width) - 1
    }

    #[allow(missing_docs)]
    pub const fn mask(self) -> u64 {
        self.max_value() << self.shift
    }

    #[allow(missing_docs)]
    pub fn get(self, bits: u64) -> u64 {
        (bits >> self.shift) & self.max_value()
    }

    /// Returns `bits` with this field replaced by `value`.
    ///
    /// # Panics
    /// Panics if `value` does not fit in the field.
    #[track_caller]
    pub fn set(self, value: u64, bits: u64) -> u64 {
        assert!(
            value <= self.max_value(),
            "value {} does not fit in {} bits",
            value,
            self.width
        );
        (bits & !self.mask()) | (value << self.shift)
    }
}

/// Unsigned integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntField(BitField);

impl IntField {
    #[allow(missing_docs)]
    pub const fn new(shift: u32, width: u32) -> Self {
        Self(BitField::new(shift, width))
    }

    #[allow(missing_docs)]
    pub const fn field(self) -> BitField {
        self.0
    }

    #[allow(missing_docs)]
    pub fn get(self, bits: u64) -> u32 {
        self.0.get(bits) as u32
    }

    #[allow(missing_docs)]
    #[track_caller]
    pub fn set(self, value: u32, bits: u64) -> u64 {
        self.0.set(value as u64, bits)
    }
}

/// Single bit flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolField(BitField);

impl BoolField {
    #[allow(missing_docs)]
    pub const fn new(shift: u32) -> Self {
        Self(BitField::new(shift, 1))
    }

    #[allow(missing_docs)]
    pub const fn field(self) -> BitField {
        self.0
    }

    #[allow(missing_docs)]
    pub fn get(self, bits: u64) -> bool {
        self.0.get(bits) != 0
    }

    #[allow(missing_docs)]
    pub fn set(self, value: bool, bits: u64) -> u64 {
        self.0.set(value as u64, bits)
    }
}

/// Field holding the ordinal of a [PropertyEnum].
#[derive(Debug)]
pub struct EnumField<T>(BitField, PhantomData<T>);

impl<T> Clone for EnumField<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EnumField<T> {}

impl<T: PropertyEnum> EnumField<T> {
    #[allow(missing_docs)]
    pub const fn new(shift: u32) -> Self {
        Self(BitField::new(shift, bits_for(T::COUNT)), PhantomData)
    }

    #[allow(missing_docs)]
    pub const fn field(self) -> BitField {
        self.0
    }

    /// # Panics
    /// Panics if the stored ordinal is not a variant of `T`.
    #[track_caller]
    pub fn get(self, bits: u64) -> T {
        let ordinal = self.0.get(bits);
        match T::try_from(ordinal as u8) {
            Ok(value) => value,
            Err(_) => panic!("invalid ordinal {} in render state bits", ordinal),
        }
    }

    #[allow(missing_docs)]
    pub fn set(self, value: T, bits: u64) -> u64 {
        let ordinal: u8 = value.into();
        assert!((ordinal as usize) < T::COUNT);
        self.0.set(ordinal as u64, bits)
    }
}

/// Width of the texture handle field.
pub const TEXTURE_BITS: u32 = 12;
/// Width of the condition index field.
pub const CONDITION_BITS: u32 = 6;
/// Width of the shader program handle field.
pub const SHADER_BITS: u32 = 12;

#[allow(missing_docs)]
pub const PRIMITIVE: IntField = IntField::new(0, 3);
#[allow(missing_docs)]
pub const TEXTURE: IntField = IntField::new(PRIMITIVE.field().end(), TEXTURE_BITS);
#[allow(missing_docs)]
pub const BILINEAR: BoolField = BoolField::new(TEXTURE.field().end());
#[allow(missing_docs)]
pub const TRANSPARENCY: EnumField<Transparency> = EnumField::new(BILINEAR.field().end());
#[allow(missing_docs)]
pub const DEPTH_TEST: EnumField<DepthTest> = EnumField::new(TRANSPARENCY.field().end());
#[allow(missing_docs)]
pub const CULL: BoolField = BoolField::new(DEPTH_TEST.field().end());
#[allow(missing_docs)]
pub const WRITE_MASK: EnumField<WriteMask> = EnumField::new(CULL.field().end());
#[allow(missing_docs)]
pub const ENABLE_LIGHTMAP: BoolField = BoolField::new(WRITE_MASK.field().end());
#[allow(missing_docs)]
pub const DECAL: EnumField<Decal> = EnumField::new(ENABLE_LIGHTMAP.field().end());
#[allow(missing_docs)]
pub const TARGET: EnumField<Target> = EnumField::new(DECAL.field().end());
#[allow(missing_docs)]
pub const LINES: BoolField = BoolField::new(TARGET.field().end());
#[allow(missing_docs)]
pub const FOG: EnumField<Fog> = EnumField::new(LINES.field().end());
#[allow(missing_docs)]
pub const EMISSIVE: BoolField = BoolField::new(FOG.field().end());
#[allow(missing_docs)]
pub const DISABLE_DIFFUSE: BoolField = BoolField::new(EMISSIVE.field().end());
#[allow(missing_docs)]
pub const DISABLE_AO: BoolField = BoolField::new(DISABLE_DIFFUSE.field().end());
#[allow(missing_docs)]
pub const CUTOUT: BoolField = BoolField::new(DISABLE_AO.field().end());
#[allow(missing_docs)]
pub const UNMIPPED: BoolField = BoolField::new(CUTOUT.field().end());
#[allow(missing_docs)]
pub const TRANSLUCENT_CUTOUT: BoolField = BoolField::new(UNMIPPED.field().end());
#[allow(missing_docs)]
pub const HURT_OVERLAY: BoolField = BoolField::new(TRANSLUCENT_CUTOUT.field().end());
#[allow(missing_docs)]
pub const FLASH_OVERLAY: BoolField = BoolField::new(HURT_OVERLAY.field().end());
#[allow(missing_docs)]
pub const DISABLE_COLOR_INDEX: BoolField = BoolField::new(FLASH_OVERLAY.field().end());
#[allow(missing_docs)]
pub const DECAL_TRANSLUCENCY: BoolField = BoolField::new(DISABLE_COLOR_INDEX.field().end());
#[allow(missing_docs)]
pub const DEFAULT_BLEND_MODE: BoolField = BoolField::new(DECAL_TRANSLUCENCY.field().end());
#[allow(missing_docs)]
pub const CONDITION: IntField = IntField::new(DEFAULT_BLEND_MODE.field().end(), CONDITION_BITS);
#[allow(missing_docs)]
pub const SHADER: IntField = IntField::new(CONDITION.field().end(), SHADER_BITS);

/// Total number of bits used by the layout.
pub const TOTAL_BITS: u32 = SHADER.field().end();

const _: () = assert!(TOTAL_BITS <= u64::BITS);

/// All fields in layout order, for validation.
pub fn layout() -> [BitField; 25] {
    [
        PRIMITIVE.field(),
        TEXTURE.field(),
        BILINEAR.field(),
        TRANSPARENCY.field(),
        DEPTH_TEST.field(),
        CULL.field(),
        WRITE_MASK.field(),
        ENABLE_LIGHTMAP.field(),
        DECAL.field(),
        TARGET.field(),
        LINES.field(),
        FOG.field(),
        EMISSIVE.field(),
        DISABLE_DIFFUSE.field(),
        DISABLE_AO.field(),
        CUTOUT.field(),
        UNMIPPED.field(),
        TRANSLUCENT_CUTOUT.field(),
        HURT_OVERLAY.field(),
        FLASH_OVERLAY.field(),
        DISABLE_COLOR_INDEX.field(),
        DECAL_TRANSLUCENCY.field(),
        DEFAULT_BLEND_MODE.field(),
        CONDITION.field(),
        SHADER.field(),
    ]
}

/// A complete packed render state.
///
/// Two states are the same state if and only if their keys are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct StateKey(pub u64);

impl fmt::Debug for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateKey({:#018X})", self.0)
    }
}

impl Default for StateKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

macro_rules! flag_accessors {
    ($($field:ident: $get:ident, $with:ident;)*) => {
        $(
            #[allow(missing_docs)]
            pub fn $get(self) -> bool {
                $field.get(self.0)
            }

            #[allow(missing_docs)]
            #[must_use]
            pub fn $with(self, value: bool) -> Self {
                Self($field.set(value, self.0))
            }
        )*
    };
}

impl StateKey {
    /// Key of a freshly reset finder, before the shader field is resolved.
    pub const DEFAULT: StateKey = StateKey(
        ((primitive::QUADS as u64) << PRIMITIVE.field().shift)
            | (1 << CULL.field().shift)
            | ((DepthTest::LEqual as u64) << DEPTH_TEST.field().shift)
            | (1 << ENABLE_LIGHTMAP.field().shift)
            | ((WriteMask::ColorDepth as u64) << WRITE_MASK.field().shift)
            | ((Fog::Fog as u64) << FOG.field().shift),
    );

    #[allow(missing_docs)]
    pub fn primitive(self) -> u8 {
        PRIMITIVE.get(self.0) as u8
    }

    /// # Panics
    /// Panics if `primitive > 7`.
    #[must_use]
    #[track_caller]
    pub fn with_primitive(self, primitive: u8) -> Self {
        assert!(primitive <= 7, "invalid primitive: {}", primitive);
        Self(PRIMITIVE.set(primitive as u32, self.0))
    }

    /// Texture handle, 0 for no texture.
    pub fn texture(self) -> u32 {
        TEXTURE.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    #[track_caller]
    pub fn with_texture(self, texture: u32) -> Self {
        Self(TEXTURE.set(texture, self.0))
    }

    #[allow(missing_docs)]
    pub fn transparency(self) -> Transparency {
        TRANSPARENCY.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_transparency(self, transparency: Transparency) -> Self {
        Self(TRANSPARENCY.set(transparency, self.0))
    }

    #[allow(missing_docs)]
    pub fn depth_test(self) -> DepthTest {
        DEPTH_TEST.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_depth_test(self, depth_test: DepthTest) -> Self {
        Self(DEPTH_TEST.set(depth_test, self.0))
    }

    #[allow(missing_docs)]
    pub fn write_mask(self) -> WriteMask {
        WRITE_MASK.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_write_mask(self, write_mask: WriteMask) -> Self {
        Self(WRITE_MASK.set(write_mask, self.0))
    }

    #[allow(missing_docs)]
    pub fn decal(self) -> Decal {
        DECAL.get(self.0)
    }

    /// Sets the decal mode. [Decal::Translucent] is stored as [Decal::None] with the
    /// decal translucency flag set.
    #[must_use]
    pub fn with_decal(self, decal: Decal) -> Self {
        match decal {
            Decal::Translucent => {
                Self(DECAL.set(Decal::None, self.0)).with_decal_translucency(true)
            }
            _ => Self(DECAL.set(decal, self.0)),
        }
    }

    /// The key with [Decal::Translucent] rewritten to its canonical form. Keys built
    /// through [Self::with_decal] are already normalized.
    #[must_use]
    pub fn normalized(self) -> Self {
        if DECAL.field().get(self.0) == u8::from(Decal::Translucent) as u64 {
            self.with_decal(Decal::Translucent)
        } else {
            self
        }
    }

    #[allow(missing_docs)]
    pub fn target(self) -> Target {
        TARGET.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_target(self, target: Target) -> Self {
        Self(TARGET.set(target, self.0))
    }

    #[allow(missing_docs)]
    pub fn fog(self) -> Fog {
        FOG.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_fog(self, fog: Fog) -> Self {
        Self(FOG.set(fog, self.0))
    }

    /// Condition index, 0 for the always-true condition.
    pub fn condition(self) -> u32 {
        CONDITION.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    #[track_caller]
    pub fn with_condition(self, condition: u32) -> Self {
        Self(CONDITION.set(condition, self.0))
    }

    /// Shader program handle.
    pub fn shader(self) -> u32 {
        SHADER.get(self.0)
    }

    #[allow(missing_docs)]
    #[must_use]
    #[track_caller]
    pub fn with_shader(self, shader: u32) -> Self {
        Self(SHADER.set(shader, self.0))
    }

    flag_accessors! {
        BILINEAR: bilinear, with_bilinear;
        CULL: cull, with_cull;
        ENABLE_LIGHTMAP: enable_lightmap, with_enable_lightmap;
        LINES: lines, with_lines;
        EMISSIVE: emissive, with_emissive;
        DISABLE_DIFFUSE: disable_diffuse, with_disable_diffuse;
        DISABLE_AO: disable_ao, with_disable_ao;
        CUTOUT: cutout, with_cutout;
        UNMIPPED: unmipped, with_unmipped;
        TRANSLUCENT_CUTOUT: translucent_cutout, with_translucent_cutout;
        HURT_OVERLAY: hurt_overlay, with_hurt_overlay;
        FLASH_OVERLAY: flash_overlay, with_flash_overlay;
        DISABLE_COLOR_INDEX: disable_color_index, with_disable_color_index;
        DECAL_TRANSLUCENCY: decal_translucency, with_decal_translucency;
        DEFAULT_BLEND_MODE: default_blend_mode, with_default_blend_mode;
    }
}
