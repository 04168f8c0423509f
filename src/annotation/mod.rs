//! Annotation parser for effect definitions
//!
//! Effect sources declare one GLSL `struct` per effect. Each field is a
//! parameter and may carry a trailing metadata comment:
//!
//! ```text
//! struct ColorShift {
//!     bool isActive;
//!     int order;
//!     float severity;  // min:0.1 max:0.9 default:0.3
//!     int cvdType;     // dropdown:(Protan, Deutan, Tritan)
//! };
//! ```
//!
//! The pipeline is lexer -> recursive-descent parser -> AST -> descriptors.
//! A struct named `Effect` is the shared base declaration and is skipped.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod schema;

use crate::effects::UniformDescriptor;

/// Name of the shared base struct, which is not an effect
pub const BASE_STRUCT: &str = "Effect";

/// One effect extracted from source text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEffect {
    pub name: String,
    /// Uniforms in declaration order, control fields included
    pub uniforms: Vec<UniformDescriptor>,
}

/// Extract every effect declared in `source`, in source order.
///
/// Never fails: unusable fields and blocks are logged and dropped.
pub fn parse_effect_source(source: &str) -> Vec<ParsedEffect> {
    let tokens = lexer::tokenize(source);
    let blocks = parser::parse_struct_blocks(&tokens);
    let mut effects: Vec<ParsedEffect> = Vec::with_capacity(blocks.len());

    for block in &blocks {
        if block.name == BASE_STRUCT {
            continue;
        }
        if effects.iter().any(|e| e.name == block.name) {
            log::warn!("line {}: effect `{}` declared twice; keeping the first", block.line, block.name);
            continue;
        }

        let uniforms = schema::build_uniforms(block);
        log::debug!("Parsed effect {} with {} uniforms", block.name, uniforms.len());
        effects.push(ParsedEffect {
            name: block.name.clone(),
            uniforms,
        });
    }

    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::UniformValue;

    const SOURCE: &str = r#"
#version 300 es
precision highp float;

struct Effect {
    bool isActive;
    int order;
};

struct ColorShift {
    bool isActive;
    int order;
    float severity; // min:0.1 max:0.9 default:0.3
    int cvdType; // dropdown:(Protan, Deutan, Tritan)
};

struct Blur {
    bool isActive;
    int order;
    float intensity;
    sampler2D lookup;
};

uniform ColorShift colorShift;

void main() {}
"#;

    #[test]
    fn test_parse_effect_source() {
        let effects = parse_effect_source(SOURCE);
        let names: Vec<_> = effects.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ColorShift", "Blur"]);

        let severity = effects[0].uniforms.iter().find(|u| u.name == "severity").unwrap();
        assert_eq!(severity.default_value(), &UniformValue::float(0.3));

        // sampler skipped, everything else kept in order
        let blur: Vec<_> = effects[1].uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(blur, vec!["isActive", "order", "intensity"]);
    }

    #[test]
    fn test_duplicate_effect_keeps_first() {
        let effects = parse_effect_source("struct A { float x; }; struct A { int y; };");
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].uniforms[0].name, "x");
    }

    #[test]
    fn test_huge_array_field_skipped() {
        let effects = parse_effect_source("struct A { float a[18446744073709551615]; float ok; };");
        let names: Vec<_> = effects[0].uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_effect_source("").is_empty());
    }
}
