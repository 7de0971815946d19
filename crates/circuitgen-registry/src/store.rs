use std::fs;
use std::path::{Path, PathBuf};

use circuitgen_core::{DesignEntity, Result, StoreSettings};
use tracing::{debug, warn};

/// On-disk layout: one JSON record per entity under `model_dir`, generated
/// implementation and testbench files under `module_dir`. Writes are
/// whole-file rewrites.
#[derive(Debug, Clone)]
pub struct ModelStore {
    model_dir: PathBuf,
    module_dir: PathBuf,
    module_ext: String,
}

impl ModelStore {
    pub fn new(
        model_dir: impl Into<PathBuf>,
        module_dir: impl Into<PathBuf>,
        module_ext: impl Into<String>,
    ) -> Self {
        Self {
            model_dir: model_dir.into(),
            module_dir: module_dir.into(),
            module_ext: module_ext.into(),
        }
    }

    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self::new(
            settings.model_dir.clone(),
            settings.module_dir.clone(),
            settings.module_ext.clone(),
        )
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn entity_path(&self, name: &str) -> PathBuf {
        self.model_dir.join(format!("{}.json", name))
    }

    pub fn module_path(&self, name: &str) -> PathBuf {
        self.module_dir
            .join(format!("{}.{}", name, self.module_ext))
    }

    pub fn test_path(&self, name: &str, index: usize) -> PathBuf {
        self.module_dir
            .join(format!("{}_Test{:02}.{}", name, index, self.module_ext))
    }

    /// Serialize the full field set; round-trips exactly through `load_entity`.
    pub fn save_entity(&self, entity: &DesignEntity) -> Result<()> {
        fs::create_dir_all(&self.model_dir)?;
        let json = serde_json::to_string_pretty(entity)?;
        fs::write(self.entity_path(&entity.name), json)?;
        debug!("persisted entity `{}`", entity.name);
        Ok(())
    }

    pub fn load_entity(&self, path: &Path) -> Result<DesignEntity> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read every entity record under `model_dir`. A corrupt or unreadable
    /// file is logged and skipped; the scan continues.
    pub fn scan_entities(&self) -> Result<Vec<DesignEntity>> {
        let mut entities = Vec::new();
        if !self.model_dir.exists() {
            return Ok(entities);
        }

        for entry in fs::read_dir(&self.model_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.load_entity(&path) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!("skipping corrupt entity file {:?}: {}", path, e),
            }
        }
        Ok(entities)
    }

    /// Write generated implementation text to its per-entity file.
    pub fn write_module_code(&self, name: &str, code: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.module_dir)?;
        let path = self.module_path(name);
        fs::write(&path, code)?;
        Ok(path)
    }

    pub fn write_test_code(&self, name: &str, index: usize, code: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.module_dir)?;
        let path = self.test_path(name, index);
        fs::write(&path, code)?;
        Ok(path)
    }
}
