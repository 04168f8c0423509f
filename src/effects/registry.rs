//! Effect registry and ordering engine
//!
//! The registry holds every effect parsed from the source in declaration
//! order, together with its live parameter values. It also owns the
//! ordering of the enabled subset: among enabled effects the order indices
//! always form the contiguous range `0..k`.

use super::types::{is_control_uniform, EffectDescriptor, UniformValue};
use crate::annotation::{parse_effect_source, ParsedEffect};

/// Errors returned by registry mutators
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown effect `{0}`")]
    UnknownEffect(String),
    #[error("effect `{effect}` has no uniform `{uniform}`")]
    UnknownUniform { effect: String, uniform: String },
    #[error("`{effect}.{uniform}` is a control field; use set_enabled or the move operations")]
    ControlUniform { effect: String, uniform: String },
    #[error("value for `{effect}.{uniform}` does not match its declared shape")]
    ShapeMismatch { effect: String, uniform: String },
}

/// Registry of effects, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectRegistry {
    effects: Vec<EffectDescriptor>,
}

impl EffectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from parsed effects, seeded with their defaults
    pub fn from_parsed(parsed: Vec<ParsedEffect>) -> Self {
        let effects = parsed
            .into_iter()
            .map(|p| EffectDescriptor::new(p.name, p.uniforms))
            .collect();
        let mut registry = Self { effects };
        registry.normalize_order();
        log::debug!("Registry seeded with {} effects", registry.len());
        registry
    }

    /// Parse effect source text and build a registry from it
    pub fn from_source(source: &str) -> Self {
        Self::from_parsed(parse_effect_source(source))
    }

    /// A fresh copy of this registry with every value at its default
    pub fn seeded_copy(&self) -> Self {
        let mut registry = Self {
            effects: self.effects.iter().map(EffectDescriptor::reseeded).collect(),
        };
        registry.normalize_order();
        registry
    }

    /// Get an effect by name
    pub fn get(&self, name: &str) -> Option<&EffectDescriptor> {
        self.effects.iter().find(|e| e.name() == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut EffectDescriptor> {
        self.effects.iter_mut().find(|e| e.name() == name)
    }

    fn position(&self, name: &str) -> Result<usize, RegistryError> {
        self.effects
            .iter()
            .position(|e| e.name() == name)
            .ok_or_else(|| RegistryError::UnknownEffect(name.to_string()))
    }

    /// Check if an effect exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All effects in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.effects.iter()
    }

    /// Effect names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().map(EffectDescriptor::name)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Positions of enabled effects, sorted by (order index, declaration)
    fn enabled_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = (0..self.effects.len())
            .filter(|&i| self.effects[i].is_enabled())
            .collect();
        positions.sort_by_key(|&i| (self.effects[i].order_index(), i));
        positions
    }

    /// Enabled effects, ascending by order index
    pub fn enabled_in_order(&self) -> Vec<&EffectDescriptor> {
        self.enabled_positions()
            .into_iter()
            .map(|i| &self.effects[i])
            .collect()
    }

    /// Names of enabled effects, ascending by order index
    pub fn enabled_names(&self) -> Vec<String> {
        self.enabled_in_order()
            .into_iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Number of enabled effects
    pub fn enabled_count(&self) -> usize {
        self.effects.iter().filter(|e| e.is_enabled()).count()
    }

    /// Enable or disable an effect.
    ///
    /// Enabling appends the effect at the end of the enabled order. Disabling
    /// closes the gap it leaves; the disabled effect keeps its stale index.
    /// Returns `Ok(false)` when the effect is already in the requested state.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<bool, RegistryError> {
        let pos = self.position(name)?;
        if self.effects[pos].is_enabled() == enabled {
            return Ok(false);
        }

        if enabled {
            let next = self.enabled_count();
            let effect = &mut self.effects[pos];
            effect.set_enabled_flag(true);
            effect.set_order_index(next);
        } else {
            let vacated = self.effects[pos].order_index();
            self.effects[pos].set_enabled_flag(false);
            for effect in self.effects.iter_mut().filter(|e| e.is_enabled()) {
                if effect.order_index() > vacated {
                    let shifted = effect.order_index() - 1;
                    effect.set_order_index(shifted);
                }
            }
        }

        Ok(true)
    }

    /// Move an enabled effect one step earlier. No-op if it is disabled or
    /// already first.
    pub fn move_up(&mut self, name: &str) -> Result<bool, RegistryError> {
        self.shift(name, -1)
    }

    /// Move an enabled effect one step later. No-op if it is disabled or
    /// already last.
    pub fn move_down(&mut self, name: &str) -> Result<bool, RegistryError> {
        self.shift(name, 1)
    }

    fn shift(&mut self, name: &str, delta: isize) -> Result<bool, RegistryError> {
        let pos = self.position(name)?;
        if !self.effects[pos].is_enabled() {
            return Ok(false);
        }

        let order = self.enabled_positions();
        let Some(rank) = order.iter().position(|&i| i == pos) else {
            return Ok(false);
        };
        let Some(neighbor) = rank.checked_add_signed(delta).and_then(|r| order.get(r)).copied() else {
            return Ok(false);
        };

        let mine = self.effects[pos].order_index();
        let theirs = self.effects[neighbor].order_index();
        self.effects[pos].set_order_index(theirs);
        self.effects[neighbor].set_order_index(mine);
        Ok(true)
    }

    /// Re-rank enabled effects to `0..k` by (order index, declaration)
    pub fn normalize_order(&mut self) {
        for (rank, pos) in self.enabled_positions().into_iter().enumerate() {
            if self.effects[pos].order_index() != rank {
                self.effects[pos].set_order_index(rank);
            }
        }
    }

    /// Whether the enabled order indices are exactly `0..k`
    pub fn is_order_contiguous(&self) -> bool {
        self.enabled_in_order()
            .iter()
            .enumerate()
            .all(|(rank, effect)| effect.order_index() == rank)
    }

    /// Re-rank enabled effects: those named in `preferred` first, in that
    /// order, then the rest by (order index, declaration).
    pub(crate) fn rank_enabled(&mut self, preferred: &[String]) {
        let mut ranked: Vec<usize> = Vec::new();
        for name in preferred {
            if let Ok(pos) = self.position(name) {
                if self.effects[pos].is_enabled() && !ranked.contains(&pos) {
                    ranked.push(pos);
                }
            }
        }
        for pos in self.enabled_positions() {
            if !ranked.contains(&pos) {
                ranked.push(pos);
            }
        }
        for (rank, pos) in ranked.into_iter().enumerate() {
            self.effects[pos].set_order_index(rank);
        }
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Set a parameter value (clamped into range). Returns whether the value
    /// changed.
    pub fn set_parameter(
        &mut self,
        effect: &str,
        uniform: &str,
        value: UniformValue,
    ) -> Result<bool, RegistryError> {
        if is_control_uniform(uniform) {
            return Err(RegistryError::ControlUniform {
                effect: effect.to_string(),
                uniform: uniform.to_string(),
            });
        }

        let descriptor = self
            .get_mut(effect)
            .ok_or_else(|| RegistryError::UnknownEffect(effect.to_string()))?
            .uniform_mut(uniform)
            .ok_or_else(|| RegistryError::UnknownUniform {
                effect: effect.to_string(),
                uniform: uniform.to_string(),
            })?;

        descriptor
            .set_value(value)
            .map_err(|_| RegistryError::ShapeMismatch {
                effect: effect.to_string(),
                uniform: uniform.to_string(),
            })
    }

    /// Current value of a uniform (control fields included)
    pub fn current_value(&self, effect: &str, uniform: &str) -> Option<&UniformValue> {
        self.get(effect)?.uniform(uniform).map(|u| u.value())
    }

    /// Reset an effect's parameters to their defaults. Enabled state and
    /// order are untouched.
    pub fn reset_effect(&mut self, name: &str) -> Result<(), RegistryError> {
        self.get_mut(name)
            .ok_or_else(|| RegistryError::UnknownEffect(name.to_string()))?
            .reset_parameters();
        Ok(())
    }
}
