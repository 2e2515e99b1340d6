//! Persisted selected model id per engine type.

use super::types::EngineType;
use crate::config::StateConfig;
use crate::error::Result;
use crate::kv::KeyValueStore;
use std::sync::Arc;

/// Engine type → selected model id, one independent key per engine type.
#[derive(Clone)]
pub struct SelectionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SelectionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn key(engine_type: EngineType) -> String {
        format!("{}{}", StateConfig::SELECTION_KEY_PREFIX, engine_type.as_str())
    }

    pub fn get(&self, engine_type: EngineType) -> Result<Option<String>> {
        Ok(self
            .kv
            .get(StateConfig::SELECTION_NAMESPACE, &Self::key(engine_type))?
            .filter(|id| !id.trim().is_empty()))
    }

    /// Select `model_id`; a blank id clears the selection instead.
    pub fn set(&self, engine_type: EngineType, model_id: &str) -> Result<()> {
        if model_id.trim().is_empty() {
            return self.clear(engine_type);
        }
        self.kv.set(
            StateConfig::SELECTION_NAMESPACE,
            &Self::key(engine_type),
            model_id,
        )
    }

    pub fn clear(&self, engine_type: EngineType) -> Result<()> {
        self.kv
            .remove(StateConfig::SELECTION_NAMESPACE, &Self::key(engine_type))?;
        Ok(())
    }
}
