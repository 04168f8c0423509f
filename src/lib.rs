//! Impairment Sim Library
//!
//! Turns annotated effect definitions (GLSL `struct` blocks with trailing
//! metadata comments) into a typed, editable parameter schema, and keeps the
//! ordered set of enabled effects in step with an external render pipeline.

pub mod annotation;
pub mod effects;
pub mod settings;
pub mod shaders;
pub mod telemetry;

pub use annotation::{parse_effect_source, ParsedEffect};
pub use effects::{
    EffectDescriptor, EffectManager, EffectRegistry, EffectsConfig, PipelineSynchronizer,
    RenderPipeline, StageHandle, SyncMode, SyncReport, UniformDescriptor, UniformKind,
    UniformValue,
};
pub use settings::AppPreferences;
pub use shaders::{FileSourceProvider, StaticSourceProvider};
