//! Descriptor construction from parsed field declarations
//!
//! Applies the per-field priority rules: a dropdown clause wins, then
//! numeric clauses override the type fallbacks, then the fallbacks
//! themselves. Anything unusable degrades to fallbacks or omission with a
//! warning; a bad field never aborts its block.

use super::ast::{Annotation, ClauseBody, FieldDecl, Literal, StructBlock};
use crate::effects::{
    ElementValue, ScalarType, UniformBounds, UniformDescriptor, UniformKind, UniformValue,
};

/// Numeric metadata keys, in the order they are resolved
const NUMERIC_KEYS: [&str; 4] = ["min", "max", "default", "step"];

/// Element filled with `value` in every component
fn filled(kind: &UniformKind, float: f32, int: i32, boolean: bool) -> ElementValue {
    let n = kind.element_len();
    match kind {
        UniformKind::Float => ElementValue::Float(float),
        UniformKind::Int | UniformKind::Dropdown { .. } => ElementValue::Int(int),
        UniformKind::Bool => ElementValue::Bool(boolean),
        UniformKind::Vector { scalar: ScalarType::Float, .. } => ElementValue::Vec(vec![float; n]),
        UniformKind::Vector { scalar: ScalarType::Int, .. } => ElementValue::IVec(vec![int; n]),
        UniformKind::Vector { scalar: ScalarType::Bool, .. } => ElementValue::BVec(vec![boolean; n]),
        UniformKind::Matrix { .. } => ElementValue::Mat(vec![float; n]),
    }
}

/// Type fallbacks: (default, min, max, step)
fn fallback(kind: &UniformKind) -> (ElementValue, ElementValue, ElementValue, Option<f32>) {
    match kind {
        UniformKind::Int => (
            filled(kind, 0.0, 0, false),
            filled(kind, 0.0, -100, false),
            filled(kind, 0.0, 100, false),
            Some(1.0),
        ),
        // 0.5 truncates to 0 for integer vectors
        UniformKind::Vector { scalar: ScalarType::Int, .. } => (
            filled(kind, 0.0, 0, false),
            filled(kind, 0.0, 0, false),
            filled(kind, 0.0, 1, false),
            Some(1.0),
        ),
        UniformKind::Bool | UniformKind::Vector { scalar: ScalarType::Bool, .. } => (
            filled(kind, 0.0, 0, false),
            filled(kind, 0.0, 0, false),
            filled(kind, 0.0, 0, true),
            None,
        ),
        UniformKind::Dropdown { .. } => (
            filled(kind, 0.0, 0, false),
            filled(kind, 0.0, 0, false),
            filled(kind, 0.0, 0, false),
            Some(1.0),
        ),
        UniformKind::Float | UniformKind::Vector { .. } | UniformKind::Matrix { .. } => (
            filled(kind, 0.5, 0, false),
            filled(kind, 0.0, 0, false),
            filled(kind, 1.0, 0, false),
            Some(0.01),
        ),
    }
}

fn as_f32(lit: &Literal) -> Option<f32> {
    match lit {
        Literal::Number(v) => Some(*v as f32),
        Literal::Bool(_) => None,
    }
}

fn as_i32(lit: &Literal) -> Option<i32> {
    match lit {
        Literal::Number(v) => Some(v.trunc() as i32),
        Literal::Bool(_) => None,
    }
}

fn as_bool(lit: &Literal) -> Option<bool> {
    match lit {
        Literal::Bool(v) => Some(*v),
        Literal::Number(_) => None,
    }
}

/// Expand literals to `len` components: one value broadcasts, `len` values
/// assign per component
fn components<T: Clone>(lits: &[Literal], len: usize, conv: impl Fn(&Literal) -> Option<T>) -> Option<Vec<T>> {
    match lits {
        [single] => conv(single).map(|v| vec![v; len]),
        _ if lits.len() == len => lits.iter().map(conv).collect(),
        _ => None,
    }
}

fn scalar(lits: &[Literal]) -> Option<&Literal> {
    match lits {
        [single] => Some(single),
        _ => None,
    }
}

/// Build one element from a literal list, or `None` if the count or literal
/// types do not fit the kind
fn element_from(kind: &UniformKind, lits: &[Literal]) -> Option<ElementValue> {
    match kind {
        UniformKind::Float => scalar(lits).and_then(as_f32).map(ElementValue::Float),
        UniformKind::Int | UniformKind::Dropdown { .. } => scalar(lits).and_then(as_i32).map(ElementValue::Int),
        UniformKind::Bool => scalar(lits).and_then(as_bool).map(ElementValue::Bool),
        UniformKind::Vector { scalar: ScalarType::Float, size } => components(lits, *size, as_f32).map(ElementValue::Vec),
        UniformKind::Vector { scalar: ScalarType::Int, size } => components(lits, *size, as_i32).map(ElementValue::IVec),
        UniformKind::Vector { scalar: ScalarType::Bool, size } => components(lits, *size, as_bool).map(ElementValue::BVec),
        UniformKind::Matrix { size } => {
            let n = *size;
            if lits.len() == n {
                // one value per column
                let columns: Vec<f32> = lits.iter().map(as_f32).collect::<Option<_>>()?;
                Some(ElementValue::Mat(
                    columns.iter().flat_map(|c| std::iter::repeat(*c).take(n)).collect(),
                ))
            } else {
                components(lits, n * n, as_f32).map(ElementValue::Mat)
            }
        }
    }
}

/// Resolve a clause's literals to a full value of the field's shape
fn value_from(kind: &UniformKind, array_length: Option<usize>, lits: &[Literal]) -> Option<UniformValue> {
    match array_length {
        None => element_from(kind, lits).map(UniformValue::Single),
        Some(len) => {
            if let Some(element) = element_from(kind, lits) {
                return Some(UniformValue::replicate(element, Some(len)));
            }
            let element_len = kind.element_len();
            if lits.len() != len * element_len {
                return None;
            }
            lits.chunks(element_len)
                .map(|chunk| element_from(kind, chunk))
                .collect::<Option<_>>()
                .map(UniformValue::Array)
        }
    }
}

/// Numeric overrides for min / max / default / step
struct NumericOverrides {
    min: Option<UniformValue>,
    max: Option<UniformValue>,
    default: Option<UniformValue>,
    step: Option<f32>,
}

/// Collect numeric clauses. `Err` names the first clause that could not be
/// applied.
fn numeric_overrides(
    annotation: &Annotation,
    kind: &UniformKind,
    array_length: Option<usize>,
) -> Result<NumericOverrides, String> {
    let mut overrides = NumericOverrides {
        min: None,
        max: None,
        default: None,
        step: None,
    };

    for key in NUMERIC_KEYS {
        let lits = match annotation.clause(key) {
            None => continue,
            Some(ClauseBody::Values(lits)) => lits,
            Some(ClauseBody::Malformed(raw)) => return Err(format!("{key}: cannot read `{raw}`")),
            Some(ClauseBody::Labels(_)) => return Err(format!("{key}: unexpected labels")),
        };

        if key == "step" {
            match lits.as_slice() {
                [Literal::Number(v)] if *v > 0.0 => overrides.step = Some(*v as f32),
                _ => return Err("step: expected one positive number".to_string()),
            }
            continue;
        }

        let value = value_from(kind, array_length, lits)
            .ok_or_else(|| format!("{key}: {} value(s) do not fit the declared type", lits.len()))?;
        match key {
            "min" => overrides.min = Some(value),
            "max" => overrides.max = Some(value),
            _ => overrides.default = Some(value),
        }
    }

    Ok(overrides)
}

/// Build the descriptor for one field, or `None` if it must be skipped
pub fn build_uniform(effect: &str, field: &FieldDecl) -> Option<UniformDescriptor> {
    let Some(declared_kind) = UniformKind::from_glsl(&field.type_name) else {
        log::warn!(
            "{effect}.{} (line {}): unsupported type `{}`; field skipped",
            field.name,
            field.line,
            field.type_name
        );
        return None;
    };

    let empty = Annotation::default();
    let annotation = field.annotation.as_ref().unwrap_or(&empty);

    let kind = match annotation.clause("dropdown") {
        Some(ClauseBody::Labels(labels)) => UniformKind::Dropdown { options: labels.clone() },
        Some(_) => {
            log::warn!("{effect}.{}: unreadable dropdown options ignored", field.name);
            declared_kind
        }
        None => declared_kind,
    };

    let (default, min, max, step) = fallback(&kind);
    let mut bounds = UniformBounds {
        default: UniformValue::replicate(default, field.array_length),
        min: UniformValue::replicate(min, field.array_length),
        max: UniformValue::replicate(max, field.array_length),
        step,
    };

    if !matches!(kind, UniformKind::Dropdown { .. }) {
        match numeric_overrides(annotation, &kind, field.array_length) {
            Ok(overrides) => {
                if let Some(min) = overrides.min {
                    bounds.min = min;
                }
                if let Some(max) = overrides.max {
                    bounds.max = max;
                }
                if let Some(default) = overrides.default {
                    bounds.default = default;
                }
                if bounds.step.is_some() {
                    bounds.step = overrides.step.or(bounds.step);
                }
            }
            Err(reason) => {
                log::warn!(
                    "{effect}.{} (line {}): metadata ignored ({reason}); using type defaults",
                    field.name,
                    field.line
                );
            }
        }
    }

    match UniformDescriptor::new(
        field.name.clone(),
        field.type_name.clone(),
        kind,
        field.array_length,
        bounds,
    ) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            log::warn!("{effect}: {e}; field skipped");
            None
        }
    }
}

/// Build every usable uniform of a struct block. Duplicate field names keep
/// the first declaration.
pub fn build_uniforms(block: &StructBlock) -> Vec<UniformDescriptor> {
    let mut uniforms: Vec<UniformDescriptor> = Vec::with_capacity(block.fields.len());

    for field in &block.fields {
        if uniforms.iter().any(|u| u.name == field.name) {
            log::warn!(
                "{}.{} (line {}): duplicate field ignored",
                block.name,
                field.name,
                field.line
            );
            continue;
        }
        if let Some(uniform) = build_uniform(&block.name, field) {
            uniforms.push(uniform);
        }
    }

    uniforms
}
