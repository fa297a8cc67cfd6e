use once_cell::sync::OnceCell;

use crate::{
    bits::StateKey,
    condition::ConditionTable,
    config::StateConfig,
    error::StateError,
    finder::StateFinder,
    layer::{ExternalLayer, LayerAdapter},
    shader::ShaderManager,
    state::{RenderState, StateRegistry},
    texture::{DefaultTextureBackend, TextureBackend, TextureTable},
};

static GLOBAL: OnceCell<RenderStates> = OnceCell::new();

/// All interning tables for one rendering session.
#[derive(Debug)]
pub struct RenderStates {
    config: StateConfig,
    textures: TextureTable,
    shaders: ShaderManager,
    conditions: ConditionTable,
    registry: StateRegistry,
    layers: LayerAdapter,
}

impl RenderStates {
    #[allow(missing_docs)]
    pub fn new(config: StateConfig) -> Self {
        Self::with_texture_backend(config, Box::new(DefaultTextureBackend))
    }

    #[allow(missing_docs)]
    pub fn with_texture_backend(config: StateConfig, backend: Box<dyn TextureBackend>) -> Self {
        if config.enable_lifecycle_debug {
            tracing::info!(
                "Lifecycle Event: render states init ({} slots)",
                config.state_capacity()
            );
        }
        Self {
            textures: TextureTable::new(backend),
            shaders: ShaderManager::new(&config),
            conditions: ConditionTable::new(),
            registry: StateRegistry::new(config.state_capacity()),
            layers: LayerAdapter::new(),
            config,
        }
    }

    /// The process-wide instance, created with the default config on first use unless
    /// [Self::init_global] ran first.
    pub fn global() -> &'static RenderStates {
        GLOBAL.get_or_init(|| Self::new(StateConfig::default()))
    }

    /// Creates the process-wide instance with `config`.
    ///
    /// If it already exists, `config` is ignored and a warning is logged.
    pub fn init_global(config: StateConfig) -> &'static RenderStates {
        let mut config = Some(config);
        let states = GLOBAL.get_or_init(|| match config.take() {
            Some(config) => Self::new(config),
            None => Self::new(StateConfig::default()),
        });
        if config.is_some() {
            tracing::warn!("render states already initialized, ignoring config");
        }
        states
    }

    #[allow(missing_docs)]
    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    #[allow(missing_docs)]
    pub fn textures(&self) -> &TextureTable {
        &self.textures
    }

    #[allow(missing_docs)]
    pub fn shaders(&self) -> &ShaderManager {
        &self.shaders
    }

    #[allow(missing_docs)]
    pub fn conditions(&self) -> &ConditionTable {
        &self.conditions
    }

    #[allow(missing_docs)]
    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    /// The legacy layer adapter and its exclusion set.
    pub fn layers(&self) -> &LayerAdapter {
        &self.layers
    }

    /// A new finder in the reset state.
    pub fn finder(&self) -> StateFinder<'_> {
        StateFinder::new(self)
    }

    /// Interns a literal key.
    pub fn from_bits(&self, key: StateKey) -> Result<&RenderState, StateError> {
        self.registry.intern(key)
    }

    #[allow(missing_docs)]
    pub fn from_index(&self, index: usize) -> Option<&RenderState> {
        self.registry.from_index(index)
    }

    #[allow(missing_docs)]
    pub fn missing(&self) -> &RenderState {
        self.registry.missing()
    }

    /// Translates a host engine layer. See [LayerAdapter::from_external_layer].
    pub fn from_external_layer(
        &self,
        layer: &dyn ExternalLayer,
    ) -> Result<&RenderState, StateError> {
        self.layers.from_external_layer(self, layer)
    }

    /// Whether primitives using `state` should be drawn in the current frame.
    pub fn is_condition_active(&self, state: &RenderState) -> bool {
        self.conditions
            .is_active(state.condition, self.shaders.frame_index())
    }

    /// Advances the game tick counter.
    pub fn on_game_tick(&self) {
        self.shaders.on_game_tick();
    }

    /// Advances the render frame counter, which also expires cached condition results.
    pub fn on_render_frame(&self) {
        self.shaders.on_render_frame();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn conditions_follow_the_frame_counter() {
        let states = RenderStates::new(StateConfig::default());
        let visible = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&visible);
        let condition = states
            .conditions()
            .register(move || flag.load(Ordering::Relaxed), true, true)
            .unwrap();
        let state = states.finder().condition(condition.index).find().unwrap();

        assert!(states.is_condition_active(state));
        visible.store(false, Ordering::Relaxed);
        assert!(states.is_condition_active(state));
        states.on_render_frame();
        assert!(!states.is_condition_active(state));
        assert!(states.is_condition_active(states.finder().find().unwrap()));
    }

    #[test]
    fn capacity_comes_from_config() {
        let states = RenderStates::new(StateConfig {
            max_states: 3,
            ..StateConfig::default()
        });
        assert_eq!(states.registry().capacity(), 3);
        assert_eq!(states.from_index(0), Some(states.missing()));
        let mut finder = states.finder();
        finder.find().unwrap();
        finder.emissive(true).find().unwrap();
        assert!(matches!(
            finder.cutout(true).find(),
            Err(StateError::StateCapacityExceeded { capacity: 3 })
        ));
    }

    #[test]
    fn global_instance_is_shared() {
        assert!(std::ptr::eq(RenderStates::global(), RenderStates::global()));
        let states = RenderStates::init_global(StateConfig::default());
        assert!(std::ptr::eq(states, RenderStates::global()));
    }
}
