//! Translation of host engine render layers into render states.
//!
//! The host describes each layer by a name and a set of phase names (one per property
//! category). [LayerAdapter::from_external_layer] maps those phases onto a [StateFinder].
//! Unrecognized phase names fall back to the most conservative variant.

use std::{collections::HashSet, sync::Mutex};

use serde::{Deserialize, Serialize};

use crate::{
    context::RenderStates,
    device::primitive,
    error::StateError,
    finder::StateFinder,
    property::{Decal, DepthTest, Fog, Target, Transparency, WriteMask},
    state::RenderState,
};

/// Phase names understood by the adapter.
pub mod phase {
    #![allow(missing_docs)]

    pub const NO_TRANSPARENCY: &str = "no_transparency";
    pub const ADDITIVE_TRANSPARENCY: &str = "additive_transparency";
    pub const LIGHTNING_TRANSPARENCY: &str = "lightning_transparency";
    pub const GLINT_TRANSPARENCY: &str = "glint_transparency";
    pub const CRUMBLING_TRANSPARENCY: &str = "crumbling_transparency";
    pub const TRANSLUCENT_TRANSPARENCY: &str = "translucent_transparency";

    pub const NO_DEPTH_TEST: &str = "no_depth_test";
    pub const ALWAYS_DEPTH_TEST: &str = "always_depth_test";
    pub const EQUAL_DEPTH_TEST: &str = "equal_depth_test";
    pub const LEQUAL_DEPTH_TEST: &str = "lequal_depth_test";

    pub const CULL: &str = "cull";
    pub const NO_CULL: &str = "no_cull";

    pub const COLOR_DEPTH_MASK: &str = "color_depth_mask";
    pub const COLOR_MASK: &str = "color_mask";
    pub const DEPTH_MASK: &str = "depth_mask";

    pub const LIGHTMAP: &str = "lightmap";
    pub const NO_LIGHTMAP: &str = "no_lightmap";

    pub const NO_LAYERING: &str = "no_layering";
    pub const POLYGON_OFFSET_LAYERING: &str = "polygon_offset_layering";
    pub const VIEW_OFFSET_Z_LAYERING: &str = "view_offset_z_layering";

    pub const MAIN_TARGET: &str = "main_target";
    pub const OUTLINE_TARGET: &str = "outline_target";
    pub const TRANSLUCENT_TARGET: &str = "translucent_target";
    pub const PARTICLES_TARGET: &str = "particles_target";
    pub const WEATHER_TARGET: &str = "weather_target";
    pub const CLOUDS_TARGET: &str = "clouds_target";
    pub const ITEM_ENTITY_TARGET: &str = "item_entity_target";

    pub const FULL_LINE_WIDTH: &str = "full_line_width";

    pub const NO_FOG: &str = "no_fog";
    pub const FOG: &str = "fog";
    pub const BLACK_FOG: &str = "black_fog";

    pub const DIFFUSE_LIGHTING: &str = "diffuse_lighting";
    pub const NO_DIFFUSE_LIGHTING: &str = "no_diffuse_lighting";

    pub const ZERO_ALPHA: &str = "zero_alpha";
    pub const ONE_TENTH_ALPHA: &str = "one_tenth_alpha";
    pub const HALF_ALPHA: &str = "half_alpha";
}

/// Layers that are always drawn by the host and map to the MISSING state.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "entity_shadow",
    "armor_glint",
    "armor_entity_glint",
    "glint_translucent",
    "glint",
    "glint_direct",
    "entity_glint",
    "entity_glint_direct",
    "lines",
    "lightning",
    "crumbling",
];

/// Terrain layers whose cull, texture, write mask and lightmap are applied by the host
/// at draw time instead of through their phases.
pub const TERRAIN_LAYERS: &[&str] = &["solid", "cutout_mipped", "cutout", "translucent"];

/// Layers drawn at full brightness.
pub const EMISSIVE_LAYERS: &[&str] = &["eyes", "beacon_beam"];

/// Read-only view of a host engine render layer.
#[allow(missing_docs)]
pub trait ExternalLayer {
    fn name(&self) -> &str;
    /// Texture identifier, `None` for untextured layers.
    fn texture(&self) -> Option<&str>;
    fn texture_mipmap(&self) -> bool;
    fn transparency(&self) -> &str;
    fn depth_test(&self) -> &str;
    fn cull(&self) -> &str;
    fn write_mask(&self) -> &str;
    fn lightmap(&self) -> &str;
    fn layering(&self) -> &str;
    fn target(&self) -> &str;
    fn line_width(&self) -> &str;
    fn fog(&self) -> &str;
    fn diffuse_lighting(&self) -> &str;
    fn alpha(&self) -> &str;
}

/// An owned layer description, for hosts that serialize their layers.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerDescription {
    pub name: String,
    pub texture: Option<String>,
    pub texture_mipmap: bool,
    pub transparency: String,
    pub depth_test: String,
    pub cull: String,
    pub write_mask: String,
    pub lightmap: String,
    pub layering: String,
    pub target: String,
    pub line_width: String,
    pub fog: String,
    pub diffuse_lighting: String,
    pub alpha: String,
}

impl LayerDescription {
    /// A layer with default phases.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Default for LayerDescription {
    fn default() -> Self {
        Self {
            name: String::new(),
            texture: None,
            texture_mipmap: false,
            transparency: phase::NO_TRANSPARENCY.to_string(),
            depth_test: phase::LEQUAL_DEPTH_TEST.to_string(),
            cull: phase::CULL.to_string(),
            write_mask: phase::COLOR_DEPTH_MASK.to_string(),
            lightmap: phase::NO_LIGHTMAP.to_string(),
            layering: phase::NO_LAYERING.to_string(),
            target: phase::MAIN_TARGET.to_string(),
            line_width: phase::FULL_LINE_WIDTH.to_string(),
            fog: phase::FOG.to_string(),
            diffuse_lighting: phase::NO_DIFFUSE_LIGHTING.to_string(),
            alpha: phase::ZERO_ALPHA.to_string(),
        }
    }
}

impl ExternalLayer for LayerDescription {
    fn name(&self) -> &str {
        &self.name
    }

    fn texture(&self) -> Option<&str> {
        self.texture.as_deref()
    }

    fn texture_mipmap(&self) -> bool {
        self.texture_mipmap
    }

    fn transparency(&self) -> &str {
        &self.transparency
    }

    fn depth_test(&self) -> &str {
        &self.depth_test
    }

    fn cull(&self) -> &str {
        &self.cull
    }

    fn write_mask(&self) -> &str {
        &self.write_mask
    }

    fn lightmap(&self) -> &str {
        &self.lightmap
    }

    fn layering(&self) -> &str {
        &self.layering
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn line_width(&self) -> &str {
        &self.line_width
    }

    fn fog(&self) -> &str {
        &self.fog
    }

    fn diffuse_lighting(&self) -> &str {
        &self.diffuse_lighting
    }

    fn alpha(&self) -> &str {
        &self.alpha
    }
}

/// Maps host layers to render states, skipping layers in its exclusion set.
#[derive(Debug)]
pub struct LayerAdapter {
    exclusions: Mutex<HashSet<String>>,
}

impl LayerAdapter {
    /// An adapter excluding [DEFAULT_EXCLUSIONS].
    pub fn new() -> Self {
        Self {
            exclusions: Mutex::new(
                DEFAULT_EXCLUSIONS
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
            ),
        }
    }

    /// Adds a layer name to the exclusion set.
    pub fn exclude(&self, name: &str) {
        self.exclusions.lock().unwrap().insert(name.to_string());
    }

    #[allow(missing_docs)]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.lock().unwrap().contains(name)
    }

    /// Returns the state for `layer`, or MISSING if the layer is excluded.
    pub fn from_external_layer<'s>(
        &self,
        states: &'s RenderStates,
        layer: &dyn ExternalLayer,
    ) -> Result<&'s RenderState, StateError> {
        let name = layer.name();
        if self.is_excluded(name) {
            return Ok(states.missing());
        }

        let mut finder = StateFinder::new(states);
        finder
            .primitive(primitive::QUADS)
            .texture(layer.texture())
            .transparency(Transparency::from_phase(layer.transparency()))
            .depth_test(DepthTest::from_phase(layer.depth_test()))
            .cull(layer.cull() == phase::CULL)
            .write_mask(WriteMask::from_phase(layer.write_mask()))
            .enable_lightmap(layer.lightmap() == phase::LIGHTMAP)
            .decal(Decal::from_phase(layer.layering()))
            .target(Target::from_phase(layer.target()))
            .lines(layer.line_width() != phase::FULL_LINE_WIDTH)
            .fog(Fog::from_phase(layer.fog()))
            .unmipped(!layer.texture_mipmap())
            .disable_diffuse(layer.diffuse_lighting() == phase::NO_DIFFUSE_LIGHTING)
            .cutout(layer.alpha() != phase::ZERO_ALPHA)
            .translucent_cutout(layer.alpha() == phase::ONE_TENTH_ALPHA)
            .disable_ao(true);

        if TERRAIN_LAYERS.contains(&name) {
            finder
                .cull(true)
                .texture(Some(states.config().terrain_atlas.as_str()))
                .write_mask(WriteMask::ColorDepth)
                .enable_lightmap(true);
        }

        // TODO: replace with data-driven material maps once the host can supply them
        if EMISSIVE_LAYERS.contains(&name) {
            finder.emissive(true);
        }

        finder.find()
    }
}
