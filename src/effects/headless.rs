//! In-memory render pipeline
//!
//! Records stages and uniform updates instead of drawing anything. The CLI
//! uses it to show what a real renderer would receive, and tests use it to
//! observe the synchronizer.

use std::cell::RefCell;
use std::rc::Rc;

use super::traits::{RenderPipeline, StageHandle, UniformMap};
use super::types::UniformValue;

/// Recorded state of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub id: u32,
    pub effect: String,
    pub source_len: usize,
    pub uniforms: UniformMap,
    /// Number of `set_uniform` calls received
    pub updates: usize,
}

type Stages = Rc<RefCell<Vec<StageRecord>>>;

/// Handle to a stage inside a `HeadlessPipeline`
#[derive(Debug)]
pub struct HeadlessStage {
    id: u32,
    stages: Stages,
}

impl StageHandle for HeadlessStage {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let mut stages = self.stages.borrow_mut();
        let Some(record) = stages.iter_mut().find(|s| s.id == self.id) else {
            log::warn!("set_uniform on removed stage {}", self.id);
            return;
        };
        match record.uniforms.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => record.uniforms.push((name.to_string(), value)),
        }
        record.updates += 1;
        log::trace!("stage {} ({}): {} updated", record.id, record.effect, name);
    }
}

/// Pipeline that keeps its stages in memory
#[derive(Debug, Default)]
pub struct HeadlessPipeline {
    stages: Stages,
    next_id: u32,
    created: usize,
    removed: usize,
}

impl HeadlessPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effect names of the live stages, in pipeline order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.borrow().iter().map(|s| s.effect.clone()).collect()
    }

    /// Snapshot of the live stages
    pub fn stages(&self) -> Vec<StageRecord> {
        self.stages.borrow().clone()
    }

    /// Current value of a uniform bound in the stage for `effect`
    pub fn uniform(&self, effect: &str, uniform: &str) -> Option<UniformValue> {
        self.stages
            .borrow()
            .iter()
            .find(|s| s.effect == effect)
            .and_then(|s| s.uniforms.iter().find(|(n, _)| n == uniform))
            .map(|(_, v)| v.clone())
    }

    /// Total stages created over the pipeline's lifetime
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Total stages removed over the pipeline's lifetime
    pub fn removed_count(&self) -> usize {
        self.removed
    }
}

impl RenderPipeline for HeadlessPipeline {
    type Stage = HeadlessStage;

    fn create_stage(&mut self, effect: &str, source: &str, uniforms: UniformMap) -> HeadlessStage {
        let id = self.next_id;
        self.next_id += 1;
        self.created += 1;

        log::debug!("stage {id}: created for {effect} with {} uniforms", uniforms.len());
        self.stages.borrow_mut().push(StageRecord {
            id,
            effect: effect.to_string(),
            source_len: source.len(),
            uniforms,
            updates: 0,
        });

        HeadlessStage {
            id,
            stages: Rc::clone(&self.stages),
        }
    }

    fn remove_stage(&mut self, stage: HeadlessStage) {
        self.removed += 1;
        self.stages.borrow_mut().retain(|s| s.id != stage.id);
        log::debug!("stage {}: removed", stage.id);
    }
}
