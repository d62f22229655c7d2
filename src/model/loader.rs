//! Model file loading
//!
//! A model is either one JSON file holding a `ModelConfig`, or a directory
//! holding one `EntityConfig` per `*.json` file (loaded in file-name order).
//! Loading only parses; `Model::build` validates.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{ModelError, ModelResult};
use super::types::{EntityConfig, ModelConfig};

impl ModelConfig {
    /// Loads a model file or a directory of entity files.
    pub fn load(path: &Path) -> ModelResult<ModelConfig> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            let content = read(path)?;
            Self::from_json_str(&content).map_err(|e| relabel(e, path))
        }
    }

    /// Parses a model from JSON text.
    pub fn from_json_str(content: &str) -> ModelResult<ModelConfig> {
        serde_json::from_str(content).map_err(|e| ModelError::Parse {
            path: "<in-memory>".to_string(),
            message: e.to_string(),
        })
    }

    fn load_dir(dir: &Path) -> ModelResult<ModelConfig> {
        let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(dir, e))?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut config = ModelConfig::new();
        for file in files {
            let content = read(&file)?;
            let entity: EntityConfig = serde_json::from_str(&content).map_err(|e| ModelError::Parse {
                path: file.display().to_string(),
                message: e.to_string(),
            })?;
            config.entities.push(entity);
        }

        Ok(config)
    }
}

fn read(path: &Path) -> ModelResult<String> {
    fs::read_to_string(path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, e: std::io::Error) -> ModelError {
    ModelError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn relabel(err: ModelError, path: &Path) -> ModelError {
    match err {
        ModelError::Parse { message, .. } => ModelError::Parse {
            path: path.display().to_string(),
            message,
        },
        other => other,
    }
}
