//! Saga definitions and their registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::step::SagaStep;

/// An ordered list of steps registered under a saga type.
pub struct SagaDefinition {
    saga_type: &'static str,
    steps: Vec<Arc<dyn SagaStep>>,
}

impl SagaDefinition {
    /// Creates an empty definition for a saga type.
    pub fn new(saga_type: &'static str) -> Self {
        Self {
            saga_type,
            steps: Vec::new(),
        }
    }

    /// Appends a step. Order of calls is execution order.
    pub fn step(mut self, step: Arc<dyn SagaStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Returns the saga type identifier.
    pub fn saga_type(&self) -> &'static str {
        self.saga_type
    }

    /// Returns the steps in execution order.
    pub fn steps(&self) -> &[Arc<dyn SagaStep>] {
        &self.steps
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the definition has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Registry mapping saga types to their definitions.
#[derive(Default)]
pub struct SagaRegistry {
    definitions: HashMap<&'static str, Arc<SagaDefinition>>,
}

impl SagaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition under its saga type, replacing any previous
    /// definition of the same type.
    pub fn register(&mut self, definition: SagaDefinition) {
        self.definitions
            .insert(definition.saga_type(), Arc::new(definition));
    }

    /// Looks up a definition by saga type.
    pub fn get(&self, saga_type: &str) -> Option<Arc<SagaDefinition>> {
        self.definitions.get(saga_type).cloned()
    }
}
