use serde::{Deserialize, Serialize};

use crate::state::MAX_STATES;

/// Settings that affect how states are interned and activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Number of render state slots, including the reserved MISSING slot.
    ///
    /// Values above [MAX_STATES] are clamped.
    pub max_states: usize,
    /// Capture emissive output while states are active.
    pub enable_bloom: bool,
    /// Log registry and shader manager lifecycle events at info level.
    pub enable_lifecycle_debug: bool,
    /// Texture forced onto the canonical terrain layers.
    pub terrain_atlas: String,
    /// Minimum width of wide lines, in pixels.
    pub wide_line_width: f32,
    /// Framebuffer width at which wide lines are drawn at exactly `wide_line_width`.
    pub line_width_reference: f32,
    /// Vertex source used when none is given.
    pub default_vertex_source: String,
    /// Fragment source used when none is given.
    pub default_fragment_source: String,
}

impl StateConfig {
    /// The state capacity after clamping.
    pub fn state_capacity(&self) -> usize {
        self.max_states.clamp(1, MAX_STATES)
    }

    /// Line width for a state with the `lines` flag, given the framebuffer width.
    pub fn line_width(&self, lines: bool, framebuffer_width: u32) -> f32 {
        if lines {
            let scaled = framebuffer_width as f32 / self.line_width_reference * self.wide_line_width;
            scaled.max(self.wide_line_width)
        } else {
            1.0
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_states: MAX_STATES,
            enable_bloom: false,
            enable_lifecycle_debug: false,
            terrain_atlas: "minecraft:textures/atlas/blocks.png".to_string(),
            wide_line_width: 2.5,
            line_width_reference: 1920.0,
            default_vertex_source: "shaders/material/default.vert".to_string(),
            default_fragment_source: "shaders/material/default.frag".to_string(),
        }
    }
}
