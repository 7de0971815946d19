use std::path::PathBuf;

use circuitgen_core::{CircuitGenError, DesignEntity, Result};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::store::ModelStore;

/// Keyed store of every design entity known to a run. `name` is the sole
/// identity: inserting an existing name merges field-wise instead of
/// overwriting, so a later declaration can never clobber generated content.
pub struct ModelRegistry {
    entities: DashMap<String, DesignEntity>,
    store: ModelStore,
}

impl ModelRegistry {
    pub fn new(store: ModelStore) -> Self {
        Self {
            entities: DashMap::new(),
            store,
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn get(&self, name: &str) -> Option<DesignEntity> {
        self.entities.get(name).map(|entry| entry.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.key().clone()).collect()
    }

    /// Merge-on-insert under the entry lock. Returns true when the name was
    /// new to the registry.
    pub fn put(&self, entity: DesignEntity) -> bool {
        use dashmap::mapref::entry::Entry;

        match self.entities.entry(entity.name.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().merge_from(entity);
                false
            }
            Entry::Vacant(vacant) => {
                debug!("registered new entity `{}`", vacant.key());
                vacant.insert(entity);
                true
            }
        }
    }

    /// Replace an entity wholesale. This is the escape hatch for explicit
    /// regeneration; ordinary writes go through `put`.
    pub fn replace(&self, entity: DesignEntity) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Whole-file rewrite of the named entity's JSON record.
    pub fn persist(&self, name: &str) -> Result<()> {
        let entity = self
            .get(name)
            .ok_or_else(|| CircuitGenError::EntityNotFound(name.to_string()))?;
        self.store.save_entity(&entity)
    }

    /// Populate from every record on disk; corrupt files are skipped by the
    /// store scan. Returns how many entities were loaded.
    pub fn load_all(&self) -> Result<usize> {
        let entities = self.store.scan_entities()?;
        let mut loaded = 0;
        for entity in entities {
            if entity.name.is_empty() {
                continue;
            }
            self.put(entity);
            loaded += 1;
        }
        info!(
            "loaded {} entities from {:?}",
            loaded,
            self.store.model_dir()
        );
        Ok(loaded)
    }

    /// Write the named entity's implementation to its module file.
    pub fn write_implementation(&self, name: &str) -> Result<PathBuf> {
        let entity = self
            .get(name)
            .ok_or_else(|| CircuitGenError::EntityNotFound(name.to_string()))?;
        let code = entity.implementation.as_deref().ok_or_else(|| {
            CircuitGenError::InvalidOperation(format!(
                "entity `{}` has no implementation to write",
                name
            ))
        })?;
        self.store.write_module_code(name, code)
    }

    /// Write each test item that carries code to its own file, numbered by
    /// appearance order.
    pub fn write_test_artifacts(&self, name: &str) -> Result<Vec<PathBuf>> {
        let entity = self
            .get(name)
            .ok_or_else(|| CircuitGenError::EntityNotFound(name.to_string()))?;
        let mut paths = Vec::new();
        for (index, item) in entity.tests.iter().enumerate() {
            if let Some(code) = &item.code {
                paths.push(self.store.write_test_code(name, index + 1, code)?);
            }
        }
        Ok(paths)
    }
}
