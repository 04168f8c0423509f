//! Effects system for impairment-sim
//!
//! Each simulated impairment (color shift, field-of-view reduction, acuity
//! loss, ...) is an effect with its own typed uniforms. Effects are toggled,
//! reordered and tuned live, and the enabled subset is bound into an external
//! render pipeline in order.
//!
//! # Architecture
//!
//! The effects system keeps data separate from the pipeline it drives:
//!
//! - **Data types** (`types.rs`): Uniform and effect descriptors, live values
//! - **Registry** (`registry.rs`): Effects by name plus the enabled ordering
//! - **Config** (`config.rs`): JSON export/import of the registry
//! - **Traits** (`traits.rs`): Pipeline and effect-source boundaries
//! - **Runtime** (`runtime.rs`): Synchronizes registry state into a pipeline
//! - **Manager** (`manager.rs`): Session state tying the pieces together
//! - **Headless** (`headless.rs`): In-memory pipeline for tools and tests
//!
//! # Usage
//!
//! ```ignore
//! let registry = EffectRegistry::from_source(&shader_source);
//! let mut manager = EffectManager::new(registry, HeadlessPipeline::new(), sources);
//!
//! manager.set_enabled("ColorShift", true);
//! manager.set_parameter("ColorShift", "severity", UniformValue::float(0.8));
//! manager.sync().await;
//! ```

mod types;
mod registry;
mod config;
mod traits;
mod runtime;
mod manager;
pub mod headless;

pub use types::*;
pub use registry::*;
pub use config::*;
pub use traits::*;
pub use runtime::*;
pub use manager::*;
