use super::{ModelLoader, StochasticModel};
use crate::error::Result;
use crate::types::TaskType;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Slot = Arc<Mutex<Option<Arc<dyn StochasticModel>>>>;

/// Memoized per-task model cache.
///
/// Each task has its own slot lock, so concurrent first requests for one task
/// trigger exactly one load while other tasks load independently. Failed
/// loads leave the slot empty and are retried on the next request.
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    slots: Mutex<HashMap<TaskType, Slot>>,
}

impl ModelRegistry {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, task: TaskType) -> Slot {
        let mut slots = self.slots.lock();
        slots.entry(task).or_default().clone()
    }

    /// Cached model for `task`, loading it on first use
    pub fn get(&self, task: TaskType) -> Result<Arc<dyn StochasticModel>> {
        let slot = self.slot(task);
        let mut guard = slot.lock();

        if let Some(model) = guard.as_ref() {
            return Ok(Arc::clone(model));
        }

        log::info!("🧠 Loading {} model", task);
        let model = self.loader.load(task).map_err(|e| {
            log::error!("🧠 Failed to load {} model: {}", task, e);
            e
        })?;
        *guard = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Install an already constructed model, replacing any cached one
    pub fn insert(&self, task: TaskType, model: Arc<dyn StochasticModel>) {
        let slot = self.slot(task);
        *slot.lock() = Some(model);
    }

    pub fn is_loaded(&self, task: TaskType) -> bool {
        let slot = self.slots.lock().get(&task).cloned();
        slot.map_or(false, |slot| slot.lock().is_some())
    }

    pub fn loaded_tasks(&self) -> Vec<TaskType> {
        let mut tasks: Vec<TaskType> = TaskType::ALL
            .iter()
            .copied()
            .filter(|&task| self.is_loaded(task))
            .collect();
        tasks.sort();
        tasks
    }
}
