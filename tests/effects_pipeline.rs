//! End-to-end behaviour of the effect schema, ordering and pipeline sync

use impairment_sim::effects::headless::HeadlessPipeline;
use impairment_sim::effects::{ElementValue, EffectManager, EffectRegistry, EffectsConfig, SyncMode, UniformValue};
use impairment_sim::shaders::BUILTIN_EFFECTS;
use impairment_sim::{parse_effect_source, StaticSourceProvider};

const SOURCE: &str = r#"
struct Effect { bool isActive; int order; };

struct Glare {
    bool isActive;
    int order;
    float intensity;
    float severity; // min:0.1 max:0.9 default:0.3
};

struct ColorShift {
    bool isActive;
    int order;
    int cvdType; // min:(4) max:(9) dropdown:(A, B, C)
};

struct Tunnel {
    bool isActive;
    int order;
    vec2 centers[2]; // min:-1 max:1 default:0
    mat2 warp;
};
"#;

fn manager_with(sources: StaticSourceProvider) -> EffectManager<HeadlessPipeline, StaticSourceProvider> {
    EffectManager::new(EffectRegistry::from_source(SOURCE), HeadlessPipeline::new(), sources)
}

#[test]
fn test_parser_defaulting() {
    let effects = parse_effect_source(SOURCE);
    let glare = effects.iter().find(|e| e.name == "Glare").unwrap();

    let intensity = glare.uniforms.iter().find(|u| u.name == "intensity").unwrap();
    assert_eq!(intensity.default_value(), &UniformValue::float(0.5));
    assert_eq!(intensity.min(), &UniformValue::float(0.0));
    assert_eq!(intensity.max(), &UniformValue::float(1.0));
    assert_eq!(intensity.step(), Some(0.01));

    let severity = glare.uniforms.iter().find(|u| u.name == "severity").unwrap();
    assert_eq!(severity.min(), &UniformValue::float(0.1));
    assert_eq!(severity.max(), &UniformValue::float(0.9));
    assert_eq!(severity.default_value(), &UniformValue::float(0.3));
}

#[test]
fn test_dropdown_bounds_ignore_numeric_clauses() {
    let registry = EffectRegistry::from_source(SOURCE);
    let cvd = registry.get("ColorShift").unwrap().uniform("cvdType").unwrap();
    assert_eq!(cvd.min(), &UniformValue::int(0));
    assert_eq!(cvd.max(), &UniformValue::int(2));
    assert_eq!(cvd.step(), Some(1.0));
    assert_eq!(cvd.value(), &UniformValue::int(0));
}

#[test]
fn test_base_struct_and_control_fields_hidden() {
    let registry = EffectRegistry::from_source(SOURCE);
    assert!(!registry.contains("Effect"));
    let params: Vec<_> = registry
        .get("Glare")
        .unwrap()
        .parameters()
        .map(|u| u.name.clone())
        .collect();
    assert_eq!(params, vec!["intensity", "severity"]);
}

#[test]
fn test_move_boundaries_are_noops() {
    let mut registry = EffectRegistry::from_source(SOURCE);
    registry.set_enabled("Glare", true).unwrap();
    registry.set_enabled("Tunnel", true).unwrap();

    assert!(!registry.move_up("Glare").unwrap());
    assert!(!registry.move_down("Tunnel").unwrap());
    assert_eq!(registry.enabled_names(), vec!["Glare", "Tunnel"]);
}

#[test]
fn test_export_import_round_trip() {
    let mut manager = manager_with(StaticSourceProvider::with_fallback("void main() {}"));
    manager.set_enabled("Tunnel", true).unwrap();
    manager.set_enabled("Glare", true).unwrap();
    manager.set_enabled("ColorShift", true).unwrap();
    manager.move_up("ColorShift").unwrap();
    manager.set_enabled("Glare", false).unwrap();

    manager.set_parameter("Glare", "severity", UniformValue::float(0.7)).unwrap();
    manager.set_parameter("ColorShift", "cvdType", UniformValue::int(1)).unwrap();
    manager
        .set_parameter(
            "Tunnel",
            "centers",
            UniformValue::Array(vec![
                ElementValue::Vec(vec![0.25, -0.5]),
                ElementValue::Vec(vec![0.1, 0.9]),
            ]),
        )
        .unwrap();
    manager
        .set_parameter("Tunnel", "warp", UniformValue::Single(ElementValue::Mat(vec![0.1, 0.2, 0.3, 0.4])))
        .unwrap();

    let text = manager.export_json().unwrap();
    let restored = EffectsConfig::from_json_str(&text)
        .unwrap()
        .apply_to(&EffectRegistry::from_source(SOURCE));

    for effect in manager.registry().iter() {
        let other = restored.get(effect.name()).unwrap();
        assert_eq!(effect.is_enabled(), other.is_enabled(), "{}", effect.name());
        // disabled effects keep their stale index too
        assert_eq!(effect.order_index(), other.order_index(), "{}", effect.name());
        for uniform in effect.parameters() {
            let restored_value = other.uniform(&uniform.name).unwrap().value();
            let tolerance = uniform.step().unwrap_or(0.0);
            assert!(
                uniform.value().approx_eq(restored_value, tolerance),
                "{}.{}: {:?} != {:?}",
                effect.name(),
                uniform.name,
                uniform.value(),
                restored_value
            );
        }
    }
    assert_eq!(restored.enabled_names(), vec!["Tunnel", "ColorShift"]);
    assert_eq!(restored.get("Glare").unwrap().order_index(), 2);
}

#[test]
fn test_contiguity_over_builtin_effects() {
    let mut registry = EffectRegistry::from_source(BUILTIN_EFFECTS);
    let names: Vec<String> = registry.names().map(str::to_string).collect();
    assert!(names.len() >= 8);

    let mut seed: u64 = 0x5eed;
    for _ in 0..1000 {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let name = &names[(seed % names.len() as u64) as usize];
        match (seed >> 32) % 4 {
            0 => registry.set_enabled(name, true).unwrap(),
            1 => registry.set_enabled(name, false).unwrap(),
            2 => registry.move_up(name).unwrap(),
            _ => registry.move_down(name).unwrap(),
        };

        let enabled = registry.enabled_in_order();
        for (rank, effect) in enabled.iter().enumerate() {
            assert_eq!(effect.order_index(), rank);
            assert_eq!(
                registry.current_value(effect.name(), "order"),
                Some(&UniformValue::int(rank as i32))
            );
        }
    }
}

#[test]
fn test_partial_fetch_failure_keeps_relative_order() {
    let sources = StaticSourceProvider::new()
        .with_source("Glare", "glare()")
        .with_source("Tunnel", "tunnel()");
    let mut manager = manager_with(sources);
    manager.set_enabled("Glare", true).unwrap();
    manager.set_enabled("ColorShift", true).unwrap();
    manager.set_enabled("Tunnel", true).unwrap();

    let report = pollster::block_on(manager.sync());
    assert_eq!(report.mode, SyncMode::Rebuilt);
    assert_eq!(report.failed, vec!["ColorShift"]);
    assert_eq!(manager.pipeline().stage_names(), vec!["Glare", "Tunnel"]);
}

#[test]
fn test_pushed_values_are_copies() {
    let mut manager = manager_with(StaticSourceProvider::with_fallback("void main() {}"));
    manager.set_enabled("Tunnel", true).unwrap();
    pollster::block_on(manager.sync());

    let moved = UniformValue::Array(vec![
        ElementValue::Vec(vec![0.5, 0.5]),
        ElementValue::Vec(vec![-0.5, -0.5]),
    ]);
    manager.set_parameter("Tunnel", "centers", moved.clone()).unwrap();

    // not yet synced: the stage still holds the old value
    assert_eq!(
        manager.pipeline().uniform("Tunnel", "centers"),
        Some(UniformValue::replicate(ElementValue::Vec(vec![0.0, 0.0]), Some(2)))
    );

    let report = pollster::block_on(manager.sync());
    assert_eq!(report.mode, SyncMode::InPlace);
    assert_eq!(manager.pipeline().uniform("Tunnel", "centers"), Some(moved));
}

#[test]
fn test_out_of_range_edit_is_clamped() {
    let mut manager = manager_with(StaticSourceProvider::new());
    manager.set_parameter("Glare", "severity", UniformValue::float(5.0)).unwrap();
    assert_eq!(manager.current_value("Glare", "severity"), Some(&UniformValue::float(0.9)));

    manager.set_parameter("ColorShift", "cvdType", UniformValue::int(-3)).unwrap();
    assert_eq!(manager.current_value("ColorShift", "cvdType"), Some(&UniformValue::int(0)));
}
