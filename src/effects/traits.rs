//! Pipeline and source boundaries
//!
//! This module defines the traits the host implements:
//! - `RenderPipeline` - Creates and removes per-effect stages
//! - `StageHandle` - Receives uniform updates for one live stage
//! - `EffectSourceProvider` - Fetches an effect's shader source

use super::types::UniformValue;
use crate::shaders::SourceError;

/// Initial uniform bindings for a stage, in declaration order
pub type UniformMap = Vec<(String, UniformValue)>;

/// A live stage in the host's render pipeline
pub trait StageHandle {
    /// Replace one uniform's value. The value is an owned copy; the stage
    /// never shares storage with the registry.
    fn set_uniform(&mut self, name: &str, value: UniformValue);
}

/// The host's render pipeline, as seen by the synchronizer
///
/// Stages are created in the order they should run. The pipeline decides
/// how a stage is compiled and scheduled.
pub trait RenderPipeline {
    type Stage: StageHandle;

    /// Create a stage for `effect` from its shader `source`, with every
    /// non-control uniform bound
    fn create_stage(&mut self, effect: &str, source: &str, uniforms: UniformMap) -> Self::Stage;

    /// Remove a stage from the pipeline
    fn remove_stage(&mut self, stage: Self::Stage);
}

/// Supplies shader source text for an effect by name
#[allow(async_fn_in_trait)]
pub trait EffectSourceProvider {
    async fn fetch_source(&self, effect: &str) -> Result<String, SourceError>;
}
