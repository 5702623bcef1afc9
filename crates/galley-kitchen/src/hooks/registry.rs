//! Processor registry with execution phases.

use std::sync::Arc;

use super::{ContentProcessor, HookPhase};

/// Processors paired with their phase.
///
/// Sorting happens once, in [`into_ordered`](Self::into_ordered); the sort is
/// stable so processors of the same phase keep their registration order.
#[derive(Clone, Default)]
pub struct HookRegistry {
    processors: Vec<(HookPhase, Arc<dyn ContentProcessor>)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<P: ContentProcessor + 'static>(&mut self, processor: P) {
        let phase = processor.phase();
        self.processors.push((phase, Arc::new(processor)));
    }

    pub fn add_shared(&mut self, processor: Arc<dyn ContentProcessor>) {
        let phase = processor.phase();
        self.processors.push((phase, processor));
    }

    /// Register `processor` under `phase` instead of its own.
    pub fn add_with_phase(&mut self, processor: Arc<dyn ContentProcessor>, phase: HookPhase) {
        self.processors.push((phase, processor));
    }

    pub fn into_ordered(mut self) -> Vec<Arc<dyn ContentProcessor>> {
        self.processors.sort_by_key(|(phase, _)| *phase);
        self.processors
            .into_iter()
            .map(|(_, processor)| processor)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|(phase, p)| (phase, p.name())))
            .finish()
    }
}
