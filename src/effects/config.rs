//! Configuration document for exporting and importing effect state
//!
//! ```json
//! { "effectOrder": ["ColorShift", "Blur"],
//!   "effectsState": { "ColorShift": { "enabled": true, "order": 0,
//!                                     "params": { "severity": 0.3 } } } }
//! ```
//!
//! Import never edits a registry in place: it produces a new registry from a
//! freshly seeded template, so a malformed document leaves the caller's
//! registry untouched.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::EffectRegistry;
use super::types::{is_control_uniform, EffectDescriptor, ACTIVE_UNIFORM, ORDER_UNIFORM};

/// Errors from reading or writing a configuration document
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Saved state of one effect
///
/// `enabled` and `order` are kept as raw JSON so a mistyped entry only
/// loses that field, the same way a mistyped parameter does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
    /// Uniform name -> value, in the JSON form of the uniform's kind
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Order index from any JSON number; negatives count as 0, fractions truncate
fn order_from_json(v: &Value) -> Option<usize> {
    if let Some(n) = v.as_u64() {
        return Some(usize::try_from(n).unwrap_or(usize::MAX));
    }
    let f = v.as_f64().filter(|f| f.is_finite())?;
    // saturating float-to-int cast
    Some(f.max(0.0) as usize)
}

impl EffectState {
    /// Enabled flag, falling back to an `isActive` entry in `params`
    fn enabled(&self) -> Option<bool> {
        self.enabled
            .as_ref()
            .or_else(|| self.params.get(ACTIVE_UNIFORM))
            .and_then(Value::as_bool)
    }

    /// Order index, falling back to an `order` entry in `params`
    fn order(&self) -> Option<usize> {
        self.order
            .as_ref()
            .or_else(|| self.params.get(ORDER_UNIFORM))
            .and_then(order_from_json)
    }
}

/// Serialized registry state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsConfig {
    /// Enabled effects, first to last
    #[serde(default)]
    pub effect_order: Vec<String>,
    #[serde(default)]
    pub effects_state: BTreeMap<String, EffectState>,
}

impl EffectsConfig {
    /// Capture the state of every effect in `registry`
    pub fn from_registry(registry: &EffectRegistry) -> Self {
        let effects_state = registry
            .iter()
            .map(|effect| {
                let params = effect
                    .parameters()
                    .map(|u| (u.name.clone(), u.value_to_json()))
                    .collect();
                let state = EffectState {
                    enabled: Some(Value::from(effect.is_enabled())),
                    order: Some(Value::from(effect.order_index())),
                    params,
                };
                (effect.name().to_string(), state)
            })
            .collect();

        Self {
            effect_order: registry.enabled_names(),
            effects_state,
        }
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write the document to a file
    pub fn export_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Read a document from a file
    pub fn import_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Build a new registry from `template`'s schema with this document's
    /// state applied.
    ///
    /// Starts from the template's defaults, ignores unknown effect and
    /// uniform names, clamps values, and ranks enabled effects by their
    /// position in `effectOrder` (then by saved `order` for enabled effects
    /// the list omits).
    pub fn apply_to(&self, template: &EffectRegistry) -> EffectRegistry {
        let mut registry = template.seeded_copy();

        for (name, state) in &self.effects_state {
            let Some(effect) = registry.get_mut(name) else {
                log::warn!("Config names unknown effect `{name}`; ignored");
                continue;
            };
            apply_state(effect, state);
        }

        registry.rank_enabled(&self.effect_order);

        registry
    }
}

fn apply_state(effect: &mut EffectDescriptor, state: &EffectState) {
    match state.enabled() {
        Some(enabled) => effect.set_enabled_flag(enabled),
        None if state.enabled.is_some() => {
            log::warn!("Config `enabled` for `{}` is not a boolean; default kept", effect.name());
        }
        None => {}
    }
    match state.order() {
        Some(order) => effect.set_order_index(order),
        None if state.order.is_some() => {
            log::warn!("Config `order` for `{}` is not a number; default kept", effect.name());
        }
        None => {}
    }

    for (uniform, json) in &state.params {
        if is_control_uniform(uniform) {
            continue;
        }
        let effect_name = effect.name().to_string();
        let Some(descriptor) = effect.uniform_mut(uniform) else {
            log::warn!("Config names unknown uniform `{effect_name}.{uniform}`; ignored");
            continue;
        };
        match descriptor.value_from_json(json) {
            Some(value) => {
                // shape already checked by value_from_json
                let _ = descriptor.set_value(value);
            }
            None => log::warn!("Config value for `{effect_name}.{uniform}` has the wrong shape; ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::UniformValue;
    use serde_json::json;

    const SOURCE: &str = "
struct ColorShift { bool isActive; int order; float severity; // min:0.1 max:0.9 default:0.3
    int cvdType; // dropdown:(Protan, Deutan, Tritan)
};
struct Blur { bool isActive; int order; vec2 center; float amount; };
struct Tunnel { bool isActive; int order; float radius[2]; };
";

    fn template() -> EffectRegistry {
        EffectRegistry::from_source(SOURCE)
    }

    #[test]
    fn test_export_shape() {
        let mut r = template();
        r.set_enabled("Blur", true).unwrap();
        r.set_parameter("ColorShift", "cvdType", UniformValue::int(2)).unwrap();

        let doc: Value = serde_json::from_str(&EffectsConfig::from_registry(&r).to_json_string().unwrap()).unwrap();
        assert_eq!(doc["effectOrder"], json!(["Blur"]));
        assert_eq!(doc["effectsState"]["Blur"]["enabled"], json!(true));
        assert_eq!(doc["effectsState"]["Blur"]["params"]["center"], json!([0.5, 0.5]));
        assert_eq!(doc["effectsState"]["ColorShift"]["params"]["cvdType"], json!(2));
        assert!(doc["effectsState"]["ColorShift"]["params"].get("isActive").is_none());
    }

    #[test]
    fn test_import_orders_by_effect_order() {
        let doc = json!({
            "effectOrder": ["Tunnel", "ColorShift"],
            "effectsState": {
                "ColorShift": { "enabled": true, "order": 0, "params": { "severity": 5.0 } },
                "Tunnel": { "enabled": true, "order": 1 },
                "Blur": { "enabled": true, "order": 0 },
                "Ghost": { "enabled": true }
            }
        });
        let config = EffectsConfig::from_json_str(&doc.to_string()).unwrap();
        let r = config.apply_to(&template());

        assert_eq!(r.enabled_names(), vec!["Tunnel", "ColorShift", "Blur"]);
        assert!(r.is_order_contiguous());
        // clamped to max
        assert_eq!(r.current_value("ColorShift", "severity"), Some(&UniformValue::float(0.9)));
    }

    #[test]
    fn test_import_starts_from_defaults() {
        let mut live = template();
        live.set_parameter("Blur", "amount", UniformValue::float(0.9)).unwrap();
        live.set_enabled("Blur", true).unwrap();

        let config = EffectsConfig::from_json_str(r#"{"effectOrder": [], "effectsState": {}}"#).unwrap();
        let r = config.apply_to(&live);
        assert_eq!(r.enabled_count(), 0);
        assert_eq!(r.current_value("Blur", "amount"), Some(&UniformValue::float(0.5)));
    }

    #[test]
    fn test_import_ignores_wrong_shapes_and_unknown_uniforms() {
        let doc = json!({
            "effectsState": {
                "Tunnel": { "params": { "radius": [0.2], "missing": 1 } },
                "Blur": { "params": { "center": { "x": 0.1, "y": 0.2 } } }
            }
        });
        let r = EffectsConfig::from_json_str(&doc.to_string()).unwrap().apply_to(&template());
        assert_eq!(
            r.current_value("Tunnel", "radius"),
            Some(&UniformValue::replicate(crate::effects::ElementValue::Float(0.5), Some(2)))
        );
        assert_eq!(
            r.current_value("Blur", "center"),
            Some(&UniformValue::Single(crate::effects::ElementValue::Vec(vec![0.1, 0.2])))
        );
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(EffectsConfig::from_json_str("{ not json"), Err(ConfigError::Json(_))));
        assert!(matches!(
            EffectsConfig::from_json_str(r#"{"effectOrder": 3}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_loosely_typed_control_fields() {
        let doc = json!({
            "effectOrder": [],
            "effectsState": {
                "Blur": { "enabled": true, "order": 1.0 },
                "Tunnel": { "enabled": true, "order": 0 },
                "ColorShift": { "enabled": "yes", "order": "first", "params": { "severity": 0.4 } }
            }
        });
        let r = EffectsConfig::from_json_str(&doc.to_string()).unwrap().apply_to(&template());

        assert_eq!(r.enabled_names(), vec!["Tunnel", "Blur"]);
        assert!(!r.get("ColorShift").unwrap().is_enabled());
        assert_eq!(r.current_value("ColorShift", "severity"), Some(&UniformValue::float(0.4)));
    }

    #[test]
    fn test_legacy_control_params() {
        let doc = json!({
            "effectsState": {
                "Blur": { "params": { "isActive": true, "order": 0 } }
            }
        });
        let r = EffectsConfig::from_json_str(&doc.to_string()).unwrap().apply_to(&template());
        assert_eq!(r.enabled_names(), vec!["Blur"]);
    }

    #[test]
    fn test_path_round_trip() {
        let mut r = template();
        r.set_enabled("Tunnel", true).unwrap();
        let path = std::env::temp_dir().join(format!("impairment-sim-config-{}.json", std::process::id()));

        EffectsConfig::from_registry(&r).export_to_path(&path).unwrap();
        let restored = EffectsConfig::import_from_path(&path).unwrap().apply_to(&template());
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.enabled_names(), vec!["Tunnel"]);
    }
}
