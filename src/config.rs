//! Run configuration.
//!
//! The configuration is layered strictly in this order, later layers winning:
//! in-code defaults, a YAML config file, explicit `KEY value` overrides, and
//! finally the run-mode overrides applied by [`Config::finalize`]. The
//! finalized value is immutable; every pipeline stage borrows it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Selects which configuration subset [`Config::finalize`] enforces.
///
/// Progressive multi-resolution branches only exist during training; a
/// single-pass inference run deactivates them and pins the fixed evaluation
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Train,
    Inference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub output_dir: PathBuf,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ModelConfig {
    pub projection: ProjectionConfig,
    pub frustum3d: FrustumConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProjectionConfig {
    /// 3x3 pinhole intrinsic matrix at the color image resolution.
    pub intrinsic: [[f32; 3]; 3],
    /// Edge length of one voxel in metres.
    pub voxel_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FrustumConfig {
    /// Dense reconstruction grid extents `[x, y, z]`.
    pub grid_dimensions: [usize; 3],
    /// Signed-distance truncation band; also the fill value for unseen voxels.
    pub truncation: f32,
    /// Distance threshold below which a voxel counts as surface.
    pub iso_value: f32,
    pub is_level_64: bool,
    pub is_level_128: bool,
    pub is_level_256: bool,
    pub fix: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::default(),
            frustum3d: FrustumConfig::default(),
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            intrinsic: [
                [277.128_14, 0.0, 159.5],
                [0.0, 277.128_14, 119.5],
                [0.0, 0.0, 1.0],
            ],
            voxel_size: 0.03,
        }
    }
}

impl Default for FrustumConfig {
    fn default() -> Self {
        Self {
            grid_dimensions: [256, 256, 256],
            truncation: 3.0,
            iso_value: 1.0,
            is_level_64: true,
            is_level_128: true,
            is_level_256: true,
            fix: false,
        }
    }
}

impl Config {
    /// Deep-merges a YAML config file over this configuration.
    ///
    /// Keys absent from the file keep their current values.
    pub fn merge_file(self, path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let overlay: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|err| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        let base = self.to_value();
        let merged = merge_values(base, overlay);
        serde_yaml::from_value(merged).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// Applies a flat list of `KEY value` override pairs, dotted key paths
    /// addressing nested sections (`MODEL.FRUSTUM3D.TRUNCATION 2.0`).
    pub fn merge_overrides(self, opts: &[String]) -> Result<Self, ConfigError> {
        if opts.len() % 2 != 0 {
            return Err(ConfigError::Override(format!(
                "expected KEY value pairs, got {} entries",
                opts.len()
            )));
        }

        let mut value = self.to_value();
        for pair in opts.chunks_exact(2) {
            set_by_path(&mut value, &pair[0], &pair[1])?;
        }
        serde_yaml::from_value(value)
            .map_err(|err| ConfigError::Override(err.to_string()))
    }

    /// Applies the run-mode overrides and records the output directory,
    /// freezing the configuration.
    ///
    /// Inference unconditionally disables the three multi-resolution levels
    /// and enables the fixed evaluation path, whatever the file or override
    /// list said.
    pub fn finalize(mut self, mode: RunMode, output_dir: &Path) -> Self {
        self.output_dir = output_dir.to_path_buf();
        if mode == RunMode::Inference {
            let frustum = &mut self.model.frustum3d;
            frustum.is_level_64 = false;
            frustum.is_level_128 = false;
            frustum.is_level_256 = false;
            frustum.fix = true;
        }
        self
    }

    fn to_value(&self) -> serde_yaml::Value {
        // Config is a closed tree of serializable primitives; this cannot fail.
        serde_yaml::to_value(self).expect("config serialization")
    }
}

fn merge_values(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(mut base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            serde_yaml::Value::Mapping(base)
        }
        (_, overlay) => overlay,
    }
}

fn set_by_path(
    root: &mut serde_yaml::Value,
    key_path: &str,
    raw_value: &str,
) -> Result<(), ConfigError> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(raw_value)
        .map_err(|err| ConfigError::Override(format!("{key_path}: {err}")))?;

    let mut current = root;
    let segments: Vec<&str> = key_path.split('.').collect();
    for (index, segment) in segments.iter().enumerate() {
        let mapping = current
            .as_mapping_mut()
            .ok_or_else(|| ConfigError::Override(format!("{key_path}: not a section")))?;
        let key = serde_yaml::Value::String((*segment).to_owned());
        let entry = mapping
            .get_mut(&key)
            .ok_or_else(|| ConfigError::Override(format!("unknown config key: {key_path}")))?;

        if index == segments.len() - 1 {
            *entry = parsed;
            return Ok(());
        }
        current = entry;
    }

    Err(ConfigError::Override(format!("empty config key: {key_path}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_survive_an_empty_overlay() {
        let file = write_yaml("MODEL:\n  FRUSTUM3D:\n    TRUNCATION: 2.5\n");
        let config = Config::default().merge_file(file.path()).unwrap();

        assert_eq!(config.model.frustum3d.truncation, 2.5);
        // untouched siblings keep their defaults
        assert_eq!(config.model.frustum3d.grid_dimensions, [256, 256, 256]);
        assert_eq!(config.model.projection.intrinsic[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = Config::default()
            .merge_file(Path::new("/nonexistent/config.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = write_yaml("MODEL: [unclosed\n");
        let err = Config::default().merge_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn overrides_win_over_the_file() {
        let file = write_yaml("MODEL:\n  FRUSTUM3D:\n    ISO_VALUE: 0.5\n");
        let opts = vec![
            "MODEL.FRUSTUM3D.ISO_VALUE".to_owned(),
            "0.75".to_owned(),
            "MODEL.FRUSTUM3D.GRID_DIMENSIONS".to_owned(),
            "[64, 64, 64]".to_owned(),
        ];
        let config = Config::default()
            .merge_file(file.path())
            .unwrap()
            .merge_overrides(&opts)
            .unwrap();

        assert_eq!(config.model.frustum3d.iso_value, 0.75);
        assert_eq!(config.model.frustum3d.grid_dimensions, [64, 64, 64]);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let opts = vec!["MODEL.FRUSTUM3D.BOGUS".to_owned(), "1".to_owned()];
        let err = Config::default().merge_overrides(&opts).unwrap_err();
        assert!(matches!(err, ConfigError::Override(_)));
    }

    #[test]
    fn odd_override_list_is_rejected() {
        let opts = vec!["MODEL.FRUSTUM3D.FIX".to_owned()];
        assert!(Config::default().merge_overrides(&opts).is_err());
    }

    #[test]
    fn inference_finalize_forces_the_level_flags() {
        // file and overrides both try to keep the training branches on
        let file = write_yaml(
            "MODEL:\n  FRUSTUM3D:\n    IS_LEVEL_64: true\n    IS_LEVEL_128: true\n    FIX: false\n",
        );
        let opts = vec!["MODEL.FRUSTUM3D.IS_LEVEL_256".to_owned(), "true".to_owned()];
        let config = Config::default()
            .merge_file(file.path())
            .unwrap()
            .merge_overrides(&opts)
            .unwrap()
            .finalize(RunMode::Inference, Path::new("out"));

        assert!(!config.model.frustum3d.is_level_64);
        assert!(!config.model.frustum3d.is_level_128);
        assert!(!config.model.frustum3d.is_level_256);
        assert!(config.model.frustum3d.fix);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn train_finalize_keeps_the_merged_flags() {
        let config = Config::default().finalize(RunMode::Train, Path::new("out"));
        assert!(config.model.frustum3d.is_level_64);
        assert!(!config.model.frustum3d.fix);
    }
}
