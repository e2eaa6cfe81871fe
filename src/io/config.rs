//! Reconstruction configuration file.
//!
//! ```json
//! {
//!   "methods": [
//!     { "method": "intersection", "cuts": { "size_min": 100 } },
//!     { "method": "disp_bdt",
//!       "estimator": { "models": [{ "zenith_deg": 20, "path": "bdt_ze20.json" }] } },
//!     { "method": "zenith_blend", "estimator": { "same_as": 1 } }
//!   ]
//! }
//! ```
//!
//! Relative model paths are resolved against the directory of the config
//! file.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{EstimatorSource, MethodConfig};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoConfig {
    pub methods: Vec<MethodConfig>,
}

/// Read a config file and resolve model paths.
pub fn read_config(path: &Path) -> Result<RecoConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open config '{}': {e}", path.display())))?;
    let mut config: RecoConfig = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid config '{}': {e}", path.display())))?;

    if let Some(base) = path.parent() {
        resolve_model_paths(&mut config, base);
    }
    Ok(config)
}

/// Write a config file (pretty JSON).
pub fn write_config(path: &Path, config: &RecoConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create config '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, config)
        .map_err(|e| AppError::input(format!("Failed to write config: {e}")))
}

fn resolve_model_paths(config: &mut RecoConfig, base: &Path) {
    for method in &mut config.methods {
        if let Some(EstimatorSource::Models { models }) = &mut method.estimator {
            for model in models {
                if model.path.is_relative() {
                    model.path = base.join(&model.path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReconstructionMethod;
    use std::path::PathBuf;

    #[test]
    fn relative_model_paths_are_resolved() {
        let json = r#"{"methods": [
            {"method": "modified_pair"},
            {"method": "disp_table", "estimator": {"models": [
                {"zenith_deg": 20, "path": "models/t20.json"},
                {"zenith_deg": 40, "path": "/abs/t40.json"}
            ]}}
        ]}"#;
        let mut config: RecoConfig = serde_json::from_str(json).unwrap();
        resolve_model_paths(&mut config, Path::new("/etc/reco"));

        assert_eq!(config.methods[0].method, ReconstructionMethod::ModifiedPair);
        let Some(EstimatorSource::Models { models }) = &config.methods[1].estimator else {
            panic!("expected models");
        };
        assert_eq!(models[0].path, PathBuf::from("/etc/reco/models/t20.json"));
        assert_eq!(models[1].path, PathBuf::from("/abs/t40.json"));
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = read_config(Path::new("/nonexistent/reco.json")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
