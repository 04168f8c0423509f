//! Core uniform and effect data types
//!
//! These types define the typed parameter schema extracted from effect
//! sources, together with the live values the user edits. Values are always
//! interpreted through their descriptor's `UniformKind`; nothing here infers
//! a control type by looking at the shape of a value.

use serde_json::{Number, Value};

/// Reserved uniform mirroring an effect's enabled flag
pub const ACTIVE_UNIFORM: &str = "isActive";

/// Reserved uniform mirroring an effect's position among enabled effects
pub const ORDER_UNIFORM: &str = "order";

/// Whether a uniform name is one of the reserved control fields
pub fn is_control_uniform(name: &str) -> bool {
    name == ACTIVE_UNIFORM || name == ORDER_UNIFORM
}

/// Component type of a scalar or vector uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Float,
    Int,
    Bool,
}

/// Kind of a uniform, orthogonal to whether it is an array
#[derive(Debug, Clone, PartialEq)]
pub enum UniformKind {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `bool`
    Bool,
    /// `vecN`, `ivecN`, `bvecN`
    Vector { scalar: ScalarType, size: usize },
    /// `matN`, stored as N*N column-major floats
    Matrix { size: usize },
    /// Integer index into a list of labels, whatever the declared type
    Dropdown { options: Vec<String> },
}

fn parse_dimension(s: &str) -> Option<usize> {
    match s {
        "2" => Some(2),
        "3" => Some(3),
        "4" => Some(4),
        _ => None,
    }
}

impl UniformKind {
    /// Resolve a declared GLSL type name. Returns `None` for anything outside
    /// the supported set (samplers, nested structs, `uint`, ...).
    pub fn from_glsl(type_name: &str) -> Option<Self> {
        match type_name {
            "float" => return Some(Self::Float),
            "int" => return Some(Self::Int),
            "bool" => return Some(Self::Bool),
            _ => {}
        }

        if let Some(size) = type_name.strip_prefix("mat").and_then(parse_dimension) {
            return Some(Self::Matrix { size });
        }

        let (scalar, rest) = match type_name.as_bytes().first() {
            Some(b'i') => (ScalarType::Int, &type_name[1..]),
            Some(b'b') => (ScalarType::Bool, &type_name[1..]),
            _ => (ScalarType::Float, type_name),
        };
        rest.strip_prefix("vec")
            .and_then(parse_dimension)
            .map(|size| Self::Vector { scalar, size })
    }

    /// 2-4 for vectors and matrices, 1 otherwise
    pub fn component_count(&self) -> usize {
        match self {
            Self::Vector { size, .. } | Self::Matrix { size } => *size,
            _ => 1,
        }
    }

    /// Number of stored components in one element
    pub fn element_len(&self) -> usize {
        match self {
            Self::Vector { size, .. } => *size,
            Self::Matrix { size } => size * size,
            _ => 1,
        }
    }

    /// Scalar type of each component
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Float | Self::Matrix { .. } => ScalarType::Float,
            Self::Int | Self::Dropdown { .. } => ScalarType::Int,
            Self::Bool => ScalarType::Bool,
            Self::Vector { scalar, .. } => *scalar,
        }
    }

    /// Dropdown labels, if this is an enumerated uniform
    pub fn dropdown_options(&self) -> Option<&[String]> {
        match self {
            Self::Dropdown { options } => Some(options),
            _ => None,
        }
    }
}

/// One element of a uniform value (a scalar, a vector or a matrix)
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec(Vec<f32>),
    IVec(Vec<i32>),
    BVec(Vec<bool>),
    /// Column-major matrix entries
    Mat(Vec<f32>),
}

fn clamp_f32(v: f32, lo: f32, hi: f32) -> f32 {
    if v.is_nan() {
        lo
    } else {
        v.max(lo).min(hi)
    }
}

fn clamp_i32(v: i32, lo: i32, hi: i32) -> i32 {
    v.max(lo).min(hi)
}

fn clamp_bool(v: bool, lo: bool, hi: bool) -> bool {
    (v || lo) && hi
}

fn zip_clamp<T: Copy>(v: &[T], lo: &[T], hi: &[T], f: impl Fn(T, T, T) -> T) -> Vec<T> {
    v.iter()
        .zip(lo)
        .zip(hi)
        .map(|((v, lo), hi)| f(*v, *lo, *hi))
        .collect()
}

/// Shortest decimal form of an f32, so 0.1 exports as 0.1 rather than its
/// widened f64 expansion
fn json_f32(v: f32) -> Value {
    let widened = v.to_string().parse::<f64>().unwrap_or(f64::from(v));
    Number::from_f64(widened).map_or(Value::Null, Value::Number)
}

fn json_i32(v: &Value) -> Option<i32> {
    v.as_i64()
        .and_then(|i| i32::try_from(i).ok())
        .or_else(|| v.as_f64().map(|f| f as i32))
}

fn json_f32_of(v: &Value) -> Option<f32> {
    v.as_f64().map(|f| f as f32)
}

/// Components of a JSON vector, either `[x, y, ...]` or `{"x": .., "y": ..}`
fn json_components(v: &Value, size: usize) -> Option<Vec<&Value>> {
    match v {
        Value::Array(items) if items.len() == size => Some(items.iter().collect()),
        Value::Object(map) => ["x", "y", "z", "w"][..size.min(4)]
            .iter()
            .map(|axis| map.get(*axis))
            .collect(),
        _ => None,
    }
}

impl ElementValue {
    /// Whether this element has the variant and length `kind` requires
    pub fn fits(&self, kind: &UniformKind) -> bool {
        match (self, kind) {
            (Self::Float(_), UniformKind::Float) => true,
            (Self::Int(_), UniformKind::Int | UniformKind::Dropdown { .. }) => true,
            (Self::Bool(_), UniformKind::Bool) => true,
            (Self::Vec(v), UniformKind::Vector { scalar: ScalarType::Float, size }) => v.len() == *size,
            (Self::IVec(v), UniformKind::Vector { scalar: ScalarType::Int, size }) => v.len() == *size,
            (Self::BVec(v), UniformKind::Vector { scalar: ScalarType::Bool, size }) => v.len() == *size,
            (Self::Mat(v), UniformKind::Matrix { size }) => v.len() == size * size,
            _ => false,
        }
    }

    /// Clamp component-wise into `[min, max]`. Mismatched variants are
    /// returned unchanged; callers check `fits` first.
    pub fn clamped(&self, min: &Self, max: &Self) -> Self {
        match (self, min, max) {
            (Self::Float(v), Self::Float(lo), Self::Float(hi)) => Self::Float(clamp_f32(*v, *lo, *hi)),
            (Self::Int(v), Self::Int(lo), Self::Int(hi)) => Self::Int(clamp_i32(*v, *lo, *hi)),
            (Self::Bool(v), Self::Bool(lo), Self::Bool(hi)) => Self::Bool(clamp_bool(*v, *lo, *hi)),
            (Self::Vec(v), Self::Vec(lo), Self::Vec(hi)) => Self::Vec(zip_clamp(v, lo, hi, clamp_f32)),
            (Self::IVec(v), Self::IVec(lo), Self::IVec(hi)) => Self::IVec(zip_clamp(v, lo, hi, clamp_i32)),
            (Self::BVec(v), Self::BVec(lo), Self::BVec(hi)) => Self::BVec(zip_clamp(v, lo, hi, clamp_bool)),
            (Self::Mat(v), Self::Mat(lo), Self::Mat(hi)) => Self::Mat(zip_clamp(v, lo, hi, clamp_f32)),
            _ => self.clone(),
        }
    }

    /// Convert to the JSON form used by the configuration document
    pub fn to_json(&self) -> Value {
        match self {
            Self::Float(v) => json_f32(*v),
            Self::Int(v) => Value::from(*v),
            Self::Bool(v) => Value::Bool(*v),
            Self::Vec(v) | Self::Mat(v) => Value::Array(v.iter().map(|c| json_f32(*c)).collect()),
            Self::IVec(v) => Value::Array(v.iter().map(|c| Value::from(*c)).collect()),
            Self::BVec(v) => Value::Array(v.iter().map(|c| Value::Bool(*c)).collect()),
        }
    }

    /// Read a JSON element for the given kind. Returns `None` when the JSON
    /// does not have the kind's shape.
    pub fn from_json(kind: &UniformKind, v: &Value) -> Option<Self> {
        match kind {
            UniformKind::Float => json_f32_of(v).map(Self::Float),
            UniformKind::Int | UniformKind::Dropdown { .. } => json_i32(v).map(Self::Int),
            UniformKind::Bool => v.as_bool().map(Self::Bool),
            UniformKind::Vector { scalar, size } => {
                let items = json_components(v, *size)?;
                match scalar {
                    ScalarType::Float => items.into_iter().map(json_f32_of).collect::<Option<_>>().map(Self::Vec),
                    ScalarType::Int => items.into_iter().map(json_i32).collect::<Option<_>>().map(Self::IVec),
                    ScalarType::Bool => items.into_iter().map(Value::as_bool).collect::<Option<_>>().map(Self::BVec),
                }
            }
            UniformKind::Matrix { size } => match v {
                Value::Array(items) if items.len() == size * size => {
                    items.iter().map(json_f32_of).collect::<Option<_>>().map(Self::Mat)
                }
                _ => None,
            },
        }
    }

    /// Equality with floats compared within `tolerance`
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        let close = |a: &f32, b: &f32| (a - b).abs() <= tolerance;
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => close(a, b),
            (Self::Vec(a), Self::Vec(b)) | (Self::Mat(a), Self::Mat(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| close(a, b))
            }
            _ => self == other,
        }
    }
}

/// A live uniform value: a single element, or a fixed-length array of them
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Single(ElementValue),
    Array(Vec<ElementValue>),
}

impl UniformValue {
    pub fn float(v: f32) -> Self {
        Self::Single(ElementValue::Float(v))
    }

    pub fn int(v: i32) -> Self {
        Self::Single(ElementValue::Int(v))
    }

    pub fn bool(v: bool) -> Self {
        Self::Single(ElementValue::Bool(v))
    }

    /// Repeat one element across `array_length` slots (or keep it single)
    pub fn replicate(element: ElementValue, array_length: Option<usize>) -> Self {
        match array_length {
            Some(len) => Self::Array(vec![element; len]),
            None => Self::Single(element),
        }
    }

    /// Whether this value has exactly the shape of `kind` / `array_length`
    pub fn fits(&self, kind: &UniformKind, array_length: Option<usize>) -> bool {
        match (self, array_length) {
            (Self::Single(e), None) => e.fits(kind),
            (Self::Array(slots), Some(len)) => slots.len() == len && slots.iter().all(|e| e.fits(kind)),
            _ => false,
        }
    }

    /// Clamp every component into `[min, max]`
    pub fn clamped(&self, min: &Self, max: &Self) -> Self {
        match (self, min, max) {
            (Self::Single(v), Self::Single(lo), Self::Single(hi)) => Self::Single(v.clamped(lo, hi)),
            (Self::Array(v), Self::Array(lo), Self::Array(hi)) => Self::Array(
                v.iter()
                    .zip(lo)
                    .zip(hi)
                    .map(|((v, lo), hi)| v.clamped(lo, hi))
                    .collect(),
            ),
            _ => self.clone(),
        }
    }

    /// Whether every component already lies in `[min, max]`
    pub fn within(&self, min: &Self, max: &Self) -> bool {
        self.clamped(min, max) == *self
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Single(e) => e.to_json(),
            Self::Array(slots) => Value::Array(slots.iter().map(ElementValue::to_json).collect()),
        }
    }

    pub fn from_json(kind: &UniformKind, array_length: Option<usize>, v: &Value) -> Option<Self> {
        match array_length {
            None => ElementValue::from_json(kind, v).map(Self::Single),
            Some(len) => match v {
                Value::Array(items) if items.len() == len => items
                    .iter()
                    .map(|item| ElementValue::from_json(kind, item))
                    .collect::<Option<_>>()
                    .map(Self::Array),
                _ => None,
            },
        }
    }

    /// Scalar read used for the control uniforms
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Single(ElementValue::Bool(v)) => Some(*v),
            Self::Single(ElementValue::Int(v)) => Some(*v != 0),
            Self::Single(ElementValue::Float(v)) => Some(*v > 0.5),
            _ => None,
        }
    }

    /// Scalar read used for the control uniforms
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Single(ElementValue::Int(v)) => Some(*v),
            Self::Single(ElementValue::Float(v)) => Some(*v as i32),
            Self::Single(ElementValue::Bool(v)) => Some(i32::from(*v)),
            _ => None,
        }
    }

    /// Equality with floats compared within `tolerance`
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        match (self, other) {
            (Self::Single(a), Self::Single(b)) => a.approx_eq(b, tolerance),
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.approx_eq(b, tolerance))
            }
            _ => false,
        }
    }
}

/// Errors raised when a descriptor or value does not match its declared shape
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    #[error("uniform `{name}`: {field} does not match the declared shape")]
    ShapeMismatch { name: String, field: &'static str },
    #[error("uniform `{name}`: array length must be at least 1")]
    EmptyArray { name: String },
    #[error("uniform `{name}`: dropdown needs at least one option")]
    EmptyDropdown { name: String },
}

/// Default, bounds and step for a uniform, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBounds {
    pub default: UniformValue,
    pub min: UniformValue,
    pub max: UniformValue,
    /// Slider increment; `None` for boolean kinds
    pub step: Option<f32>,
}

/// Typed schema for one uniform, plus its current value
///
/// Shape and bounds are fixed by [`UniformDescriptor::new`] and exposed
/// read-only, so a descriptor can never hold a value, default or bound of
/// the wrong shape.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDescriptor {
    /// Field name, unique within the owning effect
    pub name: String,
    /// Type as written in the source (`float`, `ivec2`, ...)
    pub declared_type: String,
    kind: UniformKind,
    /// `Some(n)` for `name[n]` declarations
    array_length: Option<usize>,
    default: UniformValue,
    min: UniformValue,
    max: UniformValue,
    step: Option<f32>,
    value: UniformValue,
}

impl UniformDescriptor {
    /// Create a descriptor, checking that default and bounds have the
    /// declared shape. Dropdown bounds are forced to `[0, options-1]` with
    /// step 1, and the default is clamped into range.
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        kind: UniformKind,
        array_length: Option<usize>,
        bounds: UniformBounds,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();

        if array_length == Some(0) {
            return Err(DescriptorError::EmptyArray { name });
        }

        let UniformBounds { default, mut min, mut max, mut step } = bounds;

        if let UniformKind::Dropdown { options } = &kind {
            if options.is_empty() {
                return Err(DescriptorError::EmptyDropdown { name });
            }
            let last = i32::try_from(options.len() - 1).unwrap_or(i32::MAX);
            min = UniformValue::replicate(ElementValue::Int(0), array_length);
            max = UniformValue::replicate(ElementValue::Int(last), array_length);
            step = Some(1.0);
        }

        for (field, value) in [("default", &default), ("min", &min), ("max", &max)] {
            if !value.fits(&kind, array_length) {
                return Err(DescriptorError::ShapeMismatch { name, field });
            }
        }

        let default = default.clamped(&min, &max);
        Ok(Self {
            name,
            declared_type: declared_type.into(),
            kind,
            array_length,
            value: default.clone(),
            default,
            min,
            max,
            step,
        })
    }

    /// Scalar float uniform
    pub fn float(name: impl Into<String>, default: f32, min: f32, max: f32, step: f32) -> Self {
        let default = clamp_f32(default, min, max);
        Self {
            name: name.into(),
            declared_type: "float".to_string(),
            kind: UniformKind::Float,
            array_length: None,
            default: UniformValue::float(default),
            min: UniformValue::float(min),
            max: UniformValue::float(max),
            step: Some(step),
            value: UniformValue::float(default),
        }
    }

    /// Scalar int uniform
    pub fn int(name: impl Into<String>, default: i32, min: i32, max: i32) -> Self {
        let default = clamp_i32(default, min, max);
        Self {
            name: name.into(),
            declared_type: "int".to_string(),
            kind: UniformKind::Int,
            array_length: None,
            default: UniformValue::int(default),
            min: UniformValue::int(min),
            max: UniformValue::int(max),
            step: Some(1.0),
            value: UniformValue::int(default),
        }
    }

    /// Scalar bool uniform
    pub fn bool(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            declared_type: "bool".to_string(),
            kind: UniformKind::Bool,
            array_length: None,
            default: UniformValue::bool(default),
            min: UniformValue::bool(false),
            max: UniformValue::bool(true),
            step: None,
            value: UniformValue::bool(default),
        }
    }

    /// Dropdown uniform declared as `int`
    pub fn dropdown(name: impl Into<String>, options: Vec<String>) -> Result<Self, DescriptorError> {
        Self::new(
            name,
            "int",
            UniformKind::Dropdown { options },
            None,
            UniformBounds {
                default: UniformValue::int(0),
                min: UniformValue::int(0),
                max: UniformValue::int(0),
                step: Some(1.0),
            },
        )
    }

    /// Current live value
    pub fn value(&self) -> &UniformValue {
        &self.value
    }

    pub fn kind(&self) -> &UniformKind {
        &self.kind
    }

    /// `Some(n)` for `name[n]` declarations
    pub fn array_length(&self) -> Option<usize> {
        self.array_length
    }

    pub fn default_value(&self) -> &UniformValue {
        &self.default
    }

    pub fn min(&self) -> &UniformValue {
        &self.min
    }

    pub fn max(&self) -> &UniformValue {
        &self.max
    }

    /// Slider increment; `None` for boolean kinds
    pub fn step(&self) -> Option<f32> {
        self.step
    }

    pub fn is_array(&self) -> bool {
        self.array_length.is_some()
    }

    /// Number of array slots (1 for non-array uniforms)
    pub fn slot_count(&self) -> usize {
        self.array_length.unwrap_or(1)
    }

    pub fn component_count(&self) -> usize {
        self.kind.component_count()
    }

    pub fn dropdown_options(&self) -> Option<&[String]> {
        self.kind.dropdown_options()
    }

    /// Whether this is one of the reserved control fields
    pub fn is_control(&self) -> bool {
        is_control_uniform(&self.name)
    }

    /// Whether `value` has the declared shape and lies within bounds
    pub fn is_valid(&self, value: &UniformValue) -> bool {
        value.fits(&self.kind, self.array_length) && value.within(&self.min, &self.max)
    }

    /// Clamp `value` into bounds, or `None` if its shape is wrong
    pub fn clamp_value(&self, value: &UniformValue) -> Option<UniformValue> {
        value
            .fits(&self.kind, self.array_length)
            .then(|| value.clamped(&self.min, &self.max))
    }

    /// Copy of this descriptor carrying `value` (clamped), or `None` if its
    /// shape is wrong
    pub fn with_value(&self, value: UniformValue) -> Option<Self> {
        let value = self.clamp_value(&value)?;
        Some(Self { value, ..self.clone() })
    }

    /// Replace the live value (clamped). Returns whether it changed.
    pub fn set_value(&mut self, value: UniformValue) -> Result<bool, DescriptorError> {
        let clamped = self.clamp_value(&value).ok_or_else(|| DescriptorError::ShapeMismatch {
            name: self.name.clone(),
            field: "value",
        })?;
        if clamped == self.value {
            return Ok(false);
        }
        self.value = clamped;
        Ok(true)
    }

    /// Reset to the default value
    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }

    pub fn value_to_json(&self) -> Value {
        self.value.to_json()
    }

    /// Read a JSON value of this uniform's shape (not yet clamped)
    pub fn value_from_json(&self, v: &Value) -> Option<UniformValue> {
        UniformValue::from_json(&self.kind, self.array_length, v)
    }

    /// Write a control scalar without clamping, in whatever scalar type the
    /// field was declared with
    pub(crate) fn mirror_scalar(&mut self, n: i32) {
        let element = match self.kind {
            UniformKind::Float => ElementValue::Float(n as f32),
            UniformKind::Int | UniformKind::Dropdown { .. } => ElementValue::Int(n),
            UniformKind::Bool => ElementValue::Bool(n != 0),
            _ => return,
        };
        if self.array_length.is_none() {
            self.value = UniformValue::Single(element);
        }
    }
}

/// One named effect: its uniforms, enabled flag and order index
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDescriptor {
    name: String,
    uniforms: Vec<UniformDescriptor>,
    enabled: bool,
    order_index: usize,
}

impl EffectDescriptor {
    /// Create an effect. `enabled` and `order_index` are seeded from the
    /// current values of the `isActive` / `order` uniforms when present.
    pub fn new(name: impl Into<String>, uniforms: Vec<UniformDescriptor>) -> Self {
        let control = |field: &str| uniforms.iter().find(|u| u.name == field).map(|u| u.value());
        let enabled = control(ACTIVE_UNIFORM).and_then(UniformValue::as_bool).unwrap_or(false);
        let order_index = control(ORDER_UNIFORM)
            .and_then(UniformValue::as_i32)
            .map_or(0, |i| usize::try_from(i).unwrap_or(0));

        Self {
            name: name.into(),
            uniforms,
            enabled,
            order_index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All uniforms in declaration order, control fields included
    pub fn uniforms(&self) -> &[UniformDescriptor] {
        &self.uniforms
    }

    /// Get a uniform by name
    pub fn uniform(&self, name: &str) -> Option<&UniformDescriptor> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub(crate) fn uniform_mut(&mut self, name: &str) -> Option<&mut UniformDescriptor> {
        self.uniforms.iter_mut().find(|u| u.name == name)
    }

    /// User-facing parameters (control fields excluded)
    pub fn parameters(&self) -> impl Iterator<Item = &UniformDescriptor> {
        self.uniforms.iter().filter(|u| !u.is_control())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Position among enabled effects. Stale while the effect is disabled.
    pub fn order_index(&self) -> usize {
        self.order_index
    }

    pub(crate) fn set_enabled_flag(&mut self, enabled: bool) {
        self.enabled = enabled;
        if let Some(u) = self.uniform_mut(ACTIVE_UNIFORM) {
            u.mirror_scalar(i32::from(enabled));
        }
    }

    pub(crate) fn set_order_index(&mut self, index: usize) {
        self.order_index = index;
        if let Some(u) = self.uniform_mut(ORDER_UNIFORM) {
            u.mirror_scalar(i32::try_from(index).unwrap_or(i32::MAX));
        }
    }

    /// Reset every parameter to its default (enabled flag and order kept)
    pub(crate) fn reset_parameters(&mut self) {
        for uniform in self.uniforms.iter_mut().filter(|u| !u.is_control()) {
            uniform.reset();
        }
    }

    /// A copy with every uniform at its default, flags re-derived from them
    pub(crate) fn reseeded(&self) -> Self {
        let mut uniforms = self.uniforms.clone();
        uniforms.iter_mut().for_each(UniformDescriptor::reset);
        Self::new(self.name.clone(), uniforms)
    }

    /// Uniform map bound into a pipeline stage (owned copies, control fields
    /// excluded)
    pub fn binding_map(&self) -> Vec<(String, UniformValue)> {
        self.parameters()
            .map(|u| (u.name.clone(), u.value().clone()))
            .collect()
    }

    /// Human-readable label: "ColorShift" -> "Color Shift"
    pub fn display_name(&self) -> String {
        let mut label = String::with_capacity(self.name.len() + 4);
        let mut prev: Option<char> = None;
        for c in self.name.chars() {
            if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                label.push(' ');
            }
            if prev.is_none() {
                label.extend(c.to_uppercase());
            } else {
                label.push(c);
            }
            prev = Some(c);
        }
        label
    }

    /// Instance name the shader binds the struct under: "ColorShift" -> "colorShift"
    pub fn binding_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vec3_descriptor() -> UniformDescriptor {
        UniformDescriptor::new(
            "tint",
            "vec3",
            UniformKind::Vector { scalar: ScalarType::Float, size: 3 },
            None,
            UniformBounds {
                default: UniformValue::Single(ElementValue::Vec(vec![0.5; 3])),
                min: UniformValue::Single(ElementValue::Vec(vec![0.0; 3])),
                max: UniformValue::Single(ElementValue::Vec(vec![1.0; 3])),
                step: Some(0.01),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_kind_from_glsl() {
        assert_eq!(UniformKind::from_glsl("float"), Some(UniformKind::Float));
        assert_eq!(
            UniformKind::from_glsl("ivec3"),
            Some(UniformKind::Vector { scalar: ScalarType::Int, size: 3 })
        );
        assert_eq!(
            UniformKind::from_glsl("bvec2"),
            Some(UniformKind::Vector { scalar: ScalarType::Bool, size: 2 })
        );
        assert_eq!(UniformKind::from_glsl("mat4"), Some(UniformKind::Matrix { size: 4 }));
        assert_eq!(UniformKind::from_glsl("vec5"), None);
        assert_eq!(UniformKind::from_glsl("sampler2D"), None);
        assert_eq!(UniformKind::from_glsl("uint"), None);
    }

    #[test]
    fn test_matrix_element_len() {
        let kind = UniformKind::Matrix { size: 3 };
        assert_eq!(kind.component_count(), 3);
        assert_eq!(kind.element_len(), 9);
    }

    #[test]
    fn test_with_value_clamps() {
        let d = UniformDescriptor::float("severity", 0.5, 0.0, 1.0, 0.01);
        let updated = d.with_value(UniformValue::float(3.0)).unwrap();
        assert_eq!(updated.value(), &UniformValue::float(1.0));
        // original untouched
        assert_eq!(d.value(), &UniformValue::float(0.5));
    }

    #[test]
    fn test_with_value_rejects_wrong_shape() {
        let d = vec3_descriptor();
        let wrong = UniformValue::Single(ElementValue::Vec(vec![0.1, 0.2]));
        assert!(d.with_value(wrong).is_none());
        assert!(d.with_value(UniformValue::float(0.1)).is_none());
    }

    #[test]
    fn test_vector_clamp_component_wise() {
        let mut d = vec3_descriptor();
        let changed = d
            .set_value(UniformValue::Single(ElementValue::Vec(vec![-1.0, 0.25, 2.0])))
            .unwrap();
        assert!(changed);
        assert_eq!(
            d.value(),
            &UniformValue::Single(ElementValue::Vec(vec![0.0, 0.25, 1.0]))
        );
    }

    #[test]
    fn test_is_valid() {
        let d = UniformDescriptor::int("radius", 0, -100, 100);
        assert!(d.is_valid(&UniformValue::int(50)));
        assert!(!d.is_valid(&UniformValue::int(101)));
        assert!(!d.is_valid(&UniformValue::float(5.0)));
    }

    #[test]
    fn test_dropdown_bounds_forced() {
        let d = UniformDescriptor::dropdown(
            "cvdType",
            vec!["Protan".into(), "Deutan".into(), "Tritan".into()],
        )
        .unwrap();
        assert_eq!(d.min(), &UniformValue::int(0));
        assert_eq!(d.max(), &UniformValue::int(2));
        assert_eq!(d.step(), Some(1.0));

        let mut d = d;
        d.set_value(UniformValue::int(7)).unwrap();
        assert_eq!(d.value(), &UniformValue::int(2));
    }

    #[test]
    fn test_new_dropdown_ignores_supplied_bounds() {
        let kind = UniformKind::Dropdown {
            options: vec!["A".into(), "B".into()],
        };
        let bounds = UniformBounds {
            default: UniformValue::int(9),
            min: UniformValue::int(4),
            max: UniformValue::int(9),
            step: Some(0.5),
        };
        let d = UniformDescriptor::new("mode", "int", kind, None, bounds).unwrap();
        assert_eq!(d.min(), &UniformValue::int(0));
        assert_eq!(d.max(), &UniformValue::int(1));
        assert_eq!(d.step(), Some(1.0));
        assert_eq!(d.default_value(), &UniformValue::int(1));
        assert_eq!(d.value(), d.default_value());
        assert_eq!(d.array_length(), None);
        assert_eq!(d.dropdown_options(), Some(&["A".to_string(), "B".to_string()][..]));
    }

    #[test]
    fn test_empty_dropdown_rejected() {
        assert_eq!(
            UniformDescriptor::dropdown("mode", vec![]),
            Err(DescriptorError::EmptyDropdown { name: "mode".into() })
        );
    }

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let err = UniformDescriptor::new(
            "weights",
            "float",
            UniformKind::Float,
            Some(3),
            UniformBounds {
                default: UniformValue::float(0.5),
                min: UniformValue::float(0.0),
                max: UniformValue::float(1.0),
                step: Some(0.01),
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            DescriptorError::ShapeMismatch { name: "weights".into(), field: "default" }
        );
    }

    #[test]
    fn test_array_json_conversion() {
        let d = UniformDescriptor::new(
            "centers",
            "vec2",
            UniformKind::Vector { scalar: ScalarType::Float, size: 2 },
            Some(2),
            UniformBounds {
                default: UniformValue::replicate(ElementValue::Vec(vec![0.5, 0.5]), Some(2)),
                min: UniformValue::replicate(ElementValue::Vec(vec![0.0, 0.0]), Some(2)),
                max: UniformValue::replicate(ElementValue::Vec(vec![1.0, 1.0]), Some(2)),
                step: Some(0.01),
            },
        )
        .unwrap();

        assert_eq!(d.value_to_json(), json!([[0.5, 0.5], [0.5, 0.5]]));

        let parsed = d.value_from_json(&json!([[0.1, 0.2], {"x": 0.3, "y": 0.4}])).unwrap();
        assert_eq!(
            parsed,
            UniformValue::Array(vec![
                ElementValue::Vec(vec![0.1, 0.2]),
                ElementValue::Vec(vec![0.3, 0.4]),
            ])
        );

        assert!(d.value_from_json(&json!([[0.1, 0.2]])).is_none());
        assert!(d.value_from_json(&json!(0.5)).is_none());
    }

    #[test]
    fn test_float_json_is_shortest_form() {
        assert_eq!(ElementValue::Float(0.1).to_json(), json!(0.1));
    }

    #[test]
    fn test_control_mirrors() {
        let mut effect = EffectDescriptor::new(
            "ColorShift",
            vec![
                UniformDescriptor::bool(ACTIVE_UNIFORM, false),
                UniformDescriptor::int(ORDER_UNIFORM, 0, -100, 100),
                UniformDescriptor::float("severity", 0.5, 0.0, 1.0, 0.01),
            ],
        );
        assert!(!effect.is_enabled());

        effect.set_enabled_flag(true);
        effect.set_order_index(3);
        assert_eq!(effect.uniform(ACTIVE_UNIFORM).unwrap().value(), &UniformValue::bool(true));
        assert_eq!(effect.uniform(ORDER_UNIFORM).unwrap().value(), &UniformValue::int(3));

        let names: Vec<_> = effect.parameters().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["severity"]);
    }

    #[test]
    fn test_names() {
        let effect = EffectDescriptor::new("VisualAcuityLoss", vec![]);
        assert_eq!(effect.display_name(), "Visual Acuity Loss");
        assert_eq!(effect.binding_name(), "visualAcuityLoss");
    }

    #[test]
    fn test_approx_eq() {
        let a = UniformValue::Single(ElementValue::Vec(vec![0.5, 0.25]));
        let b = UniformValue::Single(ElementValue::Vec(vec![0.501, 0.249]));
        assert!(a.approx_eq(&b, 0.01));
        assert!(!a.approx_eq(&b, 0.0001));
    }
}
