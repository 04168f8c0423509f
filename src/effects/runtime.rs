//! Pipeline synchronization
//!
//! `PipelineSynchronizer` pushes registry state into the host pipeline:
//! - In place, when the bound stages already match the enabled order and
//!   only values changed
//! - By a full rebuild, when the order changed, an effect was enabled, a
//!   previous fetch failed, or the registry was replaced

use super::registry::EffectRegistry;
use super::traits::{EffectSourceProvider, RenderPipeline, StageHandle, UniformMap};

/// How a sync pass updated the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Nothing needed pushing
    Unchanged,
    /// Existing stages were kept and changed uniforms pushed
    InPlace,
    /// Every stage was removed and recreated
    Rebuilt,
}

/// Outcome of one sync pass
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Effects with a live stage after the pass, in pipeline order
    pub stages: Vec<String>,
    /// `set_uniform` calls made on the in-place path
    pub uniforms_pushed: usize,
    /// Stages removed during the pass
    pub removed: usize,
    /// Effects whose source could not be fetched; retried next pass
    pub failed: Vec<String>,
}

/// A stage created by the synchronizer and the values it last received
struct BoundStage<S> {
    effect: String,
    stage: S,
    pushed: UniformMap,
}

/// Keeps an external pipeline in step with an `EffectRegistry`
pub struct PipelineSynchronizer<S> {
    bound: Vec<BoundStage<S>>,
    /// Set when the registry was replaced; forces the next pass to rebuild
    dirty: bool,
}

impl<S: StageHandle> Default for PipelineSynchronizer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StageHandle> PipelineSynchronizer<S> {
    pub fn new() -> Self {
        Self {
            bound: Vec::new(),
            dirty: true,
        }
    }

    /// Force the next pass to rebuild (after an import or source reload)
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn needs_rebuild(&self) -> bool {
        self.dirty
    }

    /// Effects with a live stage, in pipeline order
    pub fn bound_effects(&self) -> Vec<&str> {
        self.bound.iter().map(|b| b.effect.as_str()).collect()
    }

    /// Bring `pipeline` in line with `registry`.
    ///
    /// Sources are fetched one at a time during a rebuild. A failed fetch is
    /// logged and that effect is left out; the missing stage makes the next
    /// pass rebuild again, which retries it.
    pub async fn sync<P, F>(
        &mut self,
        registry: &EffectRegistry,
        pipeline: &mut P,
        sources: &F,
    ) -> SyncReport
    where
        P: RenderPipeline<Stage = S>,
        F: EffectSourceProvider,
    {
        let enabled = registry.enabled_in_order();
        let enabled_names: Vec<&str> = enabled.iter().map(|e| e.name()).collect();

        let (keep, stale): (Vec<_>, Vec<_>) = std::mem::take(&mut self.bound)
            .into_iter()
            .partition(|b| enabled_names.contains(&b.effect.as_str()));
        self.bound = keep;

        let mut removed = 0;
        for bound in stale {
            log::debug!("Removing stage for disabled effect {}", bound.effect);
            pipeline.remove_stage(bound.stage);
            removed += 1;
        }

        if !self.dirty && self.bound_effects() == enabled_names {
            let mut pushed = 0;
            for (bound, effect) in self.bound.iter_mut().zip(&enabled) {
                for (name, value) in effect.binding_map() {
                    match bound.pushed.iter_mut().find(|(n, _)| *n == name) {
                        Some((_, last)) if *last == value => continue,
                        Some((_, last)) => *last = value.clone(),
                        None => bound.pushed.push((name.clone(), value.clone())),
                    }
                    bound.stage.set_uniform(&name, value);
                    pushed += 1;
                }
            }

            let mode = if pushed == 0 && removed == 0 {
                SyncMode::Unchanged
            } else {
                SyncMode::InPlace
            };
            if mode == SyncMode::InPlace {
                log::debug!("In-place sync: {pushed} uniform(s) pushed, {removed} stage(s) removed");
            }
            return SyncReport {
                mode,
                stages: enabled_names.iter().map(|n| n.to_string()).collect(),
                uniforms_pushed: pushed,
                removed,
                failed: Vec::new(),
            };
        }

        for bound in self.bound.drain(..) {
            pipeline.remove_stage(bound.stage);
            removed += 1;
        }

        let mut failed = Vec::new();
        for effect in &enabled {
            match sources.fetch_source(effect.name()).await {
                Ok(source) => {
                    let uniforms = effect.binding_map();
                    let stage = pipeline.create_stage(effect.name(), &source, uniforms.clone());
                    self.bound.push(BoundStage {
                        effect: effect.name().to_string(),
                        stage,
                        pushed: uniforms,
                    });
                }
                Err(e) => {
                    log::warn!("Skipping {} this pass: {e}", effect.name());
                    failed.push(effect.name().to_string());
                }
            }
        }
        self.dirty = false;

        log::info!(
            "Pipeline rebuilt: [{}]{}",
            self.bound_effects().join(", "),
            if failed.is_empty() {
                String::new()
            } else {
                format!(", failed: [{}]", failed.join(", "))
            }
        );

        SyncReport {
            mode: SyncMode::Rebuilt,
            stages: self.bound.iter().map(|b| b.effect.clone()).collect(),
            uniforms_pushed: 0,
            removed,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::headless::{HeadlessPipeline, HeadlessStage};
    use crate::effects::{ElementValue, UniformValue};
    use crate::shaders::{SourceError, StaticSourceProvider};
    use std::cell::RefCell;

    const SOURCE: &str = "
struct A { bool isActive; int order; float amount; };
struct B { bool isActive; int order; vec2 centers[2]; };
struct C { bool isActive; int order; float amount; };
";

    /// Provider whose failing set can change between passes
    struct FlakySources {
        failing: RefCell<Vec<String>>,
    }

    impl EffectSourceProvider for FlakySources {
        async fn fetch_source(&self, effect: &str) -> Result<String, SourceError> {
            if self.failing.borrow().iter().any(|f| f == effect) {
                return Err(SourceError::NotFound(effect.to_string()));
            }
            Ok(format!("// {effect}"))
        }
    }

    fn setup() -> (EffectRegistry, HeadlessPipeline, PipelineSynchronizer<HeadlessStage>, StaticSourceProvider) {
        (
            EffectRegistry::from_source(SOURCE),
            HeadlessPipeline::new(),
            PipelineSynchronizer::new(),
            StaticSourceProvider::with_fallback("void main() {}"),
        )
    }

    #[test]
    fn test_first_pass_rebuilds_then_unchanged() {
        let (mut registry, mut pipeline, mut sync, sources) = setup();
        registry.set_enabled("A", true).unwrap();

        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.mode, SyncMode::Rebuilt);
        assert_eq!(report.stages, vec!["A"]);

        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.mode, SyncMode::Unchanged);
        assert_eq!(pipeline.created_count(), 1);
    }

    #[test]
    fn test_value_edit_goes_in_place() {
        let (mut registry, mut pipeline, mut sync, sources) = setup();
        registry.set_enabled("A", true).unwrap();
        registry.set_enabled("B", true).unwrap();
        pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));

        let centers = UniformValue::Array(vec![
            ElementValue::Vec(vec![0.1, 0.2]),
            ElementValue::Vec(vec![0.3, 0.4]),
        ]);
        registry.set_parameter("B", "centers", centers.clone()).unwrap();

        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.mode, SyncMode::InPlace);
        assert_eq!(report.uniforms_pushed, 1);
        assert_eq!(pipeline.uniform("B", "centers"), Some(centers));
        assert_eq!(pipeline.created_count(), 2);
    }

    #[test]
    fn test_control_fields_not_bound() {
        let (mut registry, mut pipeline, mut sync, sources) = setup();
        registry.set_enabled("A", true).unwrap();
        pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert!(pipeline.uniform("A", "isActive").is_none());
        assert!(pipeline.uniform("A", "order").is_none());
        assert_eq!(pipeline.uniform("A", "amount"), Some(UniformValue::float(0.5)));
    }

    #[test]
    fn test_reorder_rebuilds() {
        let (mut registry, mut pipeline, mut sync, sources) = setup();
        registry.set_enabled("A", true).unwrap();
        registry.set_enabled("C", true).unwrap();
        pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));

        registry.move_up("C").unwrap();
        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.mode, SyncMode::Rebuilt);
        assert_eq!(pipeline.stage_names(), vec!["C", "A"]);
    }

    #[test]
    fn test_disable_removes_stage_in_place() {
        let (mut registry, mut pipeline, mut sync, sources) = setup();
        for name in ["A", "B", "C"] {
            registry.set_enabled(name, true).unwrap();
        }
        pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));

        registry.set_enabled("B", false).unwrap();
        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.mode, SyncMode::InPlace);
        assert_eq!(report.removed, 1);
        assert_eq!(pipeline.stage_names(), vec!["A", "C"]);
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let (mut registry, mut pipeline, mut sync, sources) = setup();
        registry.set_enabled("A", true).unwrap();
        pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));

        sync.invalidate();
        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.mode, SyncMode::Rebuilt);
        assert_eq!(pipeline.stage_names(), vec!["A"]);
    }

    #[test]
    fn test_failed_fetch_retried_next_pass() {
        let mut registry = EffectRegistry::from_source(SOURCE);
        let mut pipeline = HeadlessPipeline::new();
        let mut sync = PipelineSynchronizer::new();
        let sources = FlakySources {
            failing: RefCell::new(vec!["B".to_string()]),
        };
        for name in ["A", "B", "C"] {
            registry.set_enabled(name, true).unwrap();
        }

        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.failed, vec!["B"]);
        assert_eq!(pipeline.stage_names(), vec!["A", "C"]);

        sources.failing.borrow_mut().clear();
        let report = pollster::block_on(sync.sync(&registry, &mut pipeline, &sources));
        assert_eq!(report.mode, SyncMode::Rebuilt);
        assert_eq!(pipeline.stage_names(), vec!["A", "B", "C"]);
    }
}
