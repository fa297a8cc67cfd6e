//! Closed sets of mutually exclusive device settings.
//!
//! Each variant knows the device commands needed to enter it ([DepthTest::apply] etc).
//! Which variant is currently active is not tracked here: the caller owns an
//! `Option<Variant>` memo per category and passes it to `enable`/`disable`, which skip
//! the device commands when nothing changes.

#![allow(missing_docs)]

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    device::{
        BlendFactor, BlendFunc, CompareFunc, FogMode, GraphicsDevice, PolygonOffset,
    },
    layer::phase,
};

/// An enumeration that can be stored in a [crate::bits::EnumField].
pub trait PropertyEnum: Copy + Eq + Into<u8> + TryFrom<u8> {
    /// Number of variants. Ordinals are `0..COUNT`.
    const COUNT: usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Transparency {
    None = 0,
    Additive = 1,
    Lightning = 2,
    Glint = 3,
    Crumbling = 4,
    Translucent = 5,
}

impl PropertyEnum for Transparency {
    const COUNT: usize = 6;
}

impl Transparency {
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            phase::ADDITIVE_TRANSPARENCY => Self::Additive,
            phase::LIGHTNING_TRANSPARENCY => Self::Lightning,
            phase::GLINT_TRANSPARENCY => Self::Glint,
            phase::CRUMBLING_TRANSPARENCY => Self::Crumbling,
            phase::TRANSLUCENT_TRANSPARENCY => Self::Translucent,
            _ => Self::None,
        }
    }

    /// The blend function for this mode, or `None` if blending is disabled.
    pub fn blend_func(self) -> Option<BlendFunc> {
        use BlendFactor::*;

        match self {
            Self::None => None,
            Self::Additive => Some(BlendFunc::uniform(One, One)),
            Self::Lightning => Some(BlendFunc::uniform(SrcAlpha, One)),
            Self::Glint => Some(BlendFunc {
                src_color: SrcColor,
                dst_color: One,
                src_alpha: Zero,
                dst_alpha: One,
            }),
            Self::Crumbling => Some(BlendFunc {
                src_color: DstColor,
                dst_color: SrcColor,
                src_alpha: One,
                dst_alpha: Zero,
            }),
            Self::Translucent => Some(BlendFunc {
                src_color: SrcAlpha,
                dst_color: OneMinusSrcAlpha,
                src_alpha: One,
                dst_alpha: OneMinusSrcAlpha,
            }),
        }
    }

    pub fn apply(self, device: &mut dyn GraphicsDevice) {
        device.set_blend(self.blend_func());
    }

    pub fn enable(self, active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if *active != Some(self) {
            self.apply(device);
            *active = Some(self);
        }
    }

    pub fn disable(active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if active.take().is_some() {
            Self::None.apply(device);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DepthTest {
    Disable = 0,
    Always = 1,
    Equal = 2,
    LEqual = 3,
}

impl PropertyEnum for DepthTest {
    const COUNT: usize = 4;
}

impl DepthTest {
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            phase::ALWAYS_DEPTH_TEST => Self::Always,
            phase::EQUAL_DEPTH_TEST => Self::Equal,
            phase::LEQUAL_DEPTH_TEST => Self::LEqual,
            _ => Self::Disable,
        }
    }

    pub fn apply(self, device: &mut dyn GraphicsDevice) {
        match self {
            Self::Disable => {
                device.set_depth_test(false);
                device.set_depth_func(CompareFunc::Never);
            }
            Self::Always => {
                device.set_depth_test(true);
                device.set_depth_func(CompareFunc::Always);
            }
            Self::Equal => {
                device.set_depth_test(true);
                device.set_depth_func(CompareFunc::Equal);
            }
            Self::LEqual => {
                device.set_depth_test(true);
                device.set_depth_func(CompareFunc::LessEqual);
            }
        }
    }

    pub fn enable(self, active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if *active != Some(self) {
            self.apply(device);
            *active = Some(self);
        }
    }

    pub fn disable(active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if active.take().is_some() {
            Self::Disable.apply(device);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum WriteMask {
    Color = 0,
    Depth = 1,
    ColorDepth = 2,
}

impl PropertyEnum for WriteMask {
    const COUNT: usize = 3;
}

impl WriteMask {
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            phase::COLOR_MASK => Self::Color,
            phase::DEPTH_MASK => Self::Depth,
            _ => Self::ColorDepth,
        }
    }

    pub fn writes_color(self) -> bool {
        self != Self::Depth
    }

    pub fn writes_depth(self) -> bool {
        self != Self::Color
    }

    pub fn apply(self, device: &mut dyn GraphicsDevice) {
        device.set_depth_mask(self.writes_depth());
        device.set_color_mask(self.writes_color());
    }

    pub fn enable(self, active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if *active != Some(self) {
            self.apply(device);
            *active = Some(self);
        }
    }

    pub fn disable(active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if active.take().is_some() {
            Self::ColorDepth.apply(device);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Fog {
    None = 0,
    Fog = 1,
    BlackFog = 2,
}

impl PropertyEnum for Fog {
    const COUNT: usize = 3;
}

impl Fog {
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            phase::NO_FOG => Self::None,
            phase::BLACK_FOG => Self::BlackFog,
            _ => Self::Fog,
        }
    }

    pub fn apply(self, device: &mut dyn GraphicsDevice) {
        device.set_fog(match self {
            Self::None => FogMode::Off,
            Self::Fog => FogMode::Standard,
            Self::BlackFog => FogMode::Black,
        });
    }

    pub fn enable(self, active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if *active != Some(self) {
            self.apply(device);
            *active = Some(self);
        }
    }

    pub fn disable(active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if active.take().is_some() {
            Self::None.apply(device);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Decal {
    None = 0,
    PolygonOffset = 1,
    ViewOffset = 2,
    /// Only accepted by the finder, which stores it as `None` plus the decal
    /// translucency flag.
    Translucent = 3,
}

impl PropertyEnum for Decal {
    const COUNT: usize = 4;
}

impl Decal {
    pub const POLYGON_OFFSET: PolygonOffset = PolygonOffset {
        factor: -1.0,
        units: -10.0,
    };

    pub fn from_phase(phase: &str) -> Self {
        match phase {
            phase::POLYGON_OFFSET_LAYERING => Self::PolygonOffset,
            phase::VIEW_OFFSET_Z_LAYERING => Self::ViewOffset,
            _ => Self::None,
        }
    }

    pub fn apply(self, device: &mut dyn GraphicsDevice) {
        match self {
            Self::None | Self::Translucent => {
                device.set_polygon_offset(None);
                device.set_view_offset(false);
            }
            Self::PolygonOffset => {
                device.set_polygon_offset(Some(Self::POLYGON_OFFSET));
                device.set_view_offset(false);
            }
            Self::ViewOffset => {
                device.set_polygon_offset(None);
                device.set_view_offset(true);
            }
        }
    }

    pub fn enable(self, active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if *active != Some(self) {
            self.apply(device);
            *active = Some(self);
        }
    }

    pub fn disable(active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if active.take().is_some() {
            Self::None.apply(device);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Target {
    Main = 0,
    Outline = 1,
    Translucent = 2,
    Particles = 3,
    Weather = 4,
    Clouds = 5,
    Entities = 6,
}

impl PropertyEnum for Target {
    const COUNT: usize = 7;
}

impl Target {
    pub fn from_phase(phase: &str) -> Self {
        match phase {
            phase::OUTLINE_TARGET => Self::Outline,
            phase::TRANSLUCENT_TARGET => Self::Translucent,
            phase::PARTICLES_TARGET => Self::Particles,
            phase::WEATHER_TARGET => Self::Weather,
            phase::CLOUDS_TARGET => Self::Clouds,
            phase::ITEM_ENTITY_TARGET => Self::Entities,
            _ => Self::Main,
        }
    }

    pub fn apply(self, device: &mut dyn GraphicsDevice) {
        device.bind_target(self);
    }

    pub fn enable(self, active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if *active != Some(self) {
            self.apply(device);
            *active = Some(self);
        }
    }

    pub fn disable(active: &mut Option<Self>, device: &mut dyn GraphicsDevice) {
        if active.take().is_some() {
            Self::Main.apply(device);
        }
    }
}

/// Legacy blend modes, each of which sets several independent fields.
/// See [crate::StateFinder::blend_mode].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Default,
    Solid,
    Cutout,
    CutoutMipped,
    Translucent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DeviceCall, RecordingDevice};

    #[test]
    fn unknown_phases_fall_back_to_conservative_variants() {
        assert_eq!(DepthTest::from_phase("greater_depth_test"), DepthTest::Disable);
        assert_eq!(Transparency::from_phase("??"), Transparency::None);
        assert_eq!(WriteMask::from_phase(""), WriteMask::ColorDepth);
        assert_eq!(Target::from_phase("custom_target"), Target::Main);
        assert_eq!(Decal::from_phase("other_layering"), Decal::None);
        assert_eq!(Fog::from_phase("weird_fog"), Fog::Fog);
    }

    #[test]
    fn known_phases() {
        assert_eq!(
            DepthTest::from_phase(phase::LEQUAL_DEPTH_TEST),
            DepthTest::LEqual
        );
        assert_eq!(
            Transparency::from_phase(phase::TRANSLUCENT_TRANSPARENCY),
            Transparency::Translucent
        );
        assert_eq!(WriteMask::from_phase(phase::DEPTH_MASK), WriteMask::Depth);
        assert_eq!(Fog::from_phase(phase::NO_FOG), Fog::None);
        assert_eq!(Target::from_phase(phase::ITEM_ENTITY_TARGET), Target::Entities);
    }

    #[test]
    fn enable_skips_active_variant() {
        let mut device = RecordingDevice::default();
        let mut active = None;

        DepthTest::LEqual.enable(&mut active, &mut device);
        assert_eq!(device.calls.len(), 2);
        DepthTest::LEqual.enable(&mut active, &mut device);
        assert_eq!(device.calls.len(), 2);
        DepthTest::Equal.enable(&mut active, &mut device);
        assert_eq!(
            device.calls[2..],
            [
                DeviceCall::DepthTest(true),
                DeviceCall::DepthFunc(CompareFunc::Equal)
            ]
        );
        assert_eq!(active, Some(DepthTest::Equal));
    }

    #[test]
    fn disable_resets_only_when_active() {
        let mut device = RecordingDevice::default();
        let mut active = None;

        WriteMask::disable(&mut active, &mut device);
        assert!(device.calls.is_empty());

        WriteMask::Color.enable(&mut active, &mut device);
        WriteMask::disable(&mut active, &mut device);
        assert_eq!(active, None);
        assert_eq!(
            device.calls[2..],
            [DeviceCall::DepthMask(true), DeviceCall::ColorMask(true)]
        );
    }

    #[test]
    fn translucent_blending_keeps_destination_alpha() {
        let func = Transparency::Translucent.blend_func().unwrap();
        assert_eq!(func.src_color, BlendFactor::SrcAlpha);
        assert_eq!(func.dst_alpha, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(Transparency::None.blend_func(), None);
    }
}
