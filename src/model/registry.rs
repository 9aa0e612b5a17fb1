use crate::{
    error::{Error, Result},
    model::{Model, ModelConfig},
    store::Store,
};

use parking_lot::RwLock;
use std::{
    collections,
    sync::{Arc, LazyLock},
};

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::default);

/// Named set of models.
///
/// Most callers use the process-wide instance through the free functions of
/// this module; separate instances are handy in tests.
#[derive(Debug, Default)]
pub struct Registry {
    models: RwLock<collections::HashMap<String, Arc<Model>>>,
}

impl Registry {
    /// Create and register a model, failing if the name is taken.
    pub fn define(
        &self,
        name: impl Into<String>,
        config: ModelConfig,
        store: Arc<dyn Store>,
    ) -> Result<Arc<Model>> {
        let name = name.into();
        let mut models = self.models.write();
        if models.contains_key(&name) {
            return Err(Error::ModelExists(name));
        }
        let model = Model::new(name.clone(), config, store)?;
        models.insert(name, Arc::clone(&model));
        Ok(model)
    }

    /// Model registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ModelNotFound(name.to_string()))
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Unregister one model, returning it.
    pub fn remove(&self, name: &str) -> Option<Arc<Model>> {
        self.models.write().remove(name)
    }

    /// Unregister every model.
    pub fn reset(&self) {
        self.models.write().clear();
    }
}

/// The process-wide registry.
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Define a model in the process-wide registry.
pub fn define(
    name: impl Into<String>,
    config: ModelConfig,
    store: Arc<dyn Store>,
) -> Result<Arc<Model>> {
    GLOBAL.define(name, config, store)
}

/// Look up a model in the process-wide registry.
pub fn model(name: &str) -> Result<Arc<Model>> {
    GLOBAL.get(name)
}

/// Clear the process-wide registry.
pub fn reset() {
    GLOBAL.reset()
}
