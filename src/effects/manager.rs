//! Effect manager - session state for the simulator
//!
//! The EffectManager owns the registry, the pipeline synchronizer, the host
//! pipeline and the source provider. Every user action goes through it, so
//! `&mut self` makes it the single writer of effect state.

use super::config::{ConfigError, EffectsConfig};
use super::registry::{EffectRegistry, RegistryError};
use super::runtime::{PipelineSynchronizer, SyncReport};
use super::traits::{EffectSourceProvider, RenderPipeline};
use super::types::{EffectDescriptor, UniformValue};

/// Owns effect state and keeps a render pipeline in step with it
pub struct EffectManager<P: RenderPipeline, F: EffectSourceProvider> {
    /// Effects and their live values
    registry: EffectRegistry,
    /// Stage bookkeeping for `pipeline`
    synchronizer: PipelineSynchronizer<P::Stage>,
    /// Host render pipeline
    pipeline: P,
    /// Shader source lookup
    sources: F,
    /// Bumped whenever the registry is replaced wholesale
    generation: u64,
}

impl<P: RenderPipeline, F: EffectSourceProvider> EffectManager<P, F> {
    /// Create a manager around an already-parsed registry
    pub fn new(registry: EffectRegistry, pipeline: P, sources: F) -> Self {
        log::info!("Effect manager created with {} effects", registry.len());
        Self {
            registry,
            synchronizer: PipelineSynchronizer::new(),
            pipeline,
            sources,
            generation: 0,
        }
    }

    /// Get a reference to the effect registry
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// Get a reference to the host pipeline
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn sources(&self) -> &F {
        &self.sources
    }

    /// Number of times the registry has been replaced by import or reload
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Enabled effects, ascending by order index
    pub fn enabled_in_order(&self) -> Vec<&EffectDescriptor> {
        self.registry.enabled_in_order()
    }

    /// Current value of a uniform
    pub fn current_value(&self, effect: &str, uniform: &str) -> Option<&UniformValue> {
        self.registry.current_value(effect, uniform)
    }

    pub fn set_enabled(&mut self, effect: &str, enabled: bool) -> Result<bool, RegistryError> {
        let changed = self.registry.set_enabled(effect, enabled)?;
        if changed {
            log::info!("{} {effect}", if enabled { "Enabled" } else { "Disabled" });
        }
        Ok(changed)
    }

    pub fn move_up(&mut self, effect: &str) -> Result<bool, RegistryError> {
        let moved = self.registry.move_up(effect)?;
        if moved {
            log::info!("Moved {effect} up: {:?}", self.registry.enabled_names());
        }
        Ok(moved)
    }

    pub fn move_down(&mut self, effect: &str) -> Result<bool, RegistryError> {
        let moved = self.registry.move_down(effect)?;
        if moved {
            log::info!("Moved {effect} down: {:?}", self.registry.enabled_names());
        }
        Ok(moved)
    }

    /// Set a parameter (clamped into range)
    pub fn set_parameter(
        &mut self,
        effect: &str,
        uniform: &str,
        value: UniformValue,
    ) -> Result<bool, RegistryError> {
        let changed = self.registry.set_parameter(effect, uniform, value)?;
        if changed {
            log::debug!("{effect}.{uniform} = {:?}", self.registry.current_value(effect, uniform));
        }
        Ok(changed)
    }

    /// Reset an effect's parameters to their defaults
    pub fn reset_effect(&mut self, effect: &str) -> Result<(), RegistryError> {
        self.registry.reset_effect(effect)?;
        log::info!("Reset {effect} to defaults");
        Ok(())
    }

    /// Capture the current state as a configuration document
    pub fn export_config(&self) -> EffectsConfig {
        EffectsConfig::from_registry(&self.registry)
    }

    /// Current state as pretty-printed JSON
    pub fn export_json(&self) -> Result<String, ConfigError> {
        self.export_config().to_json_string()
    }

    /// Replace the registry with `config` applied to fresh defaults
    pub fn import_config(&mut self, config: &EffectsConfig) {
        self.registry = config.apply_to(&self.registry);
        self.replaced();
        log::info!("Imported configuration: {:?}", self.registry.enabled_names());
    }

    /// Parse and import a JSON document. On error the registry is unchanged.
    pub fn import_json(&mut self, text: &str) -> Result<(), ConfigError> {
        let config = EffectsConfig::from_json_str(text)?;
        self.import_config(&config);
        Ok(())
    }

    /// Re-parse effect source text, keeping enabled flags, order and every
    /// live value whose effect, uniform and shape still match.
    pub fn reload_source(&mut self, source: &str) {
        let mut fresh = EffectRegistry::from_source(source);
        let previous_order = self.registry.enabled_names();

        for old in self.registry.iter() {
            let Some(effect) = fresh.get_mut(old.name()) else {
                log::info!("Effect {} no longer declared", old.name());
                continue;
            };
            effect.set_enabled_flag(old.is_enabled());
            for uniform in old.parameters() {
                let Some(target) = effect.uniform_mut(&uniform.name) else {
                    continue;
                };
                if target.kind() == uniform.kind() && target.array_length() == uniform.array_length() {
                    // same shape, so this cannot fail
                    let _ = target.set_value(uniform.value().clone());
                }
            }
        }
        fresh.rank_enabled(&previous_order);

        self.registry = fresh;
        self.replaced();
        log::info!("Reloaded effect source: {} effects", self.registry.len());
    }

    /// Force the next sync to re-fetch every enabled effect's source, for
    /// when a per-effect source file changed but the schema did not
    pub fn invalidate_sources(&mut self) {
        self.synchronizer.invalidate();
        log::info!("Effect sources changed; next sync rebuilds the pipeline");
    }

    fn replaced(&mut self) {
        self.generation += 1;
        self.synchronizer.invalidate();
    }

    /// Push the current state into the pipeline
    pub async fn sync(&mut self) -> SyncReport {
        self.synchronizer
            .sync(&self.registry, &mut self.pipeline, &self.sources)
            .await
    }
}
