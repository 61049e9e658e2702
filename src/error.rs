use std::path::PathBuf;

use thiserror::Error;

/// Failures while building the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid config override: {0}")]
    Override(String),
}

/// Failures while loading on-disk assets (checkpoint, frustum mask).
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("checkpoint not found: {0}")]
    CheckpointMissing(PathBuf),

    #[error("checkpoint {path} is incompatible with the model: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: burn::record::RecorderError,
    },

    #[error("frustum mask not found: {0}")]
    FrustumMaskMissing(PathBuf),

    #[error("failed to read frustum mask {path}: {reason}")]
    FrustumMask { path: PathBuf, reason: String },

    #[error("frustum mask shape {found:?} does not match grid dimensions {expected:?}")]
    FrustumMaskShape {
        expected: [usize; 3],
        found: Vec<usize>,
    },
}

/// Failures while decoding the input image.
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("failed to open input image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode input image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("input image {path} is not a PNG")]
    Format { path: PathBuf },
}

/// Accelerator device failures.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("accelerator device unavailable: {0}")]
    Unavailable(String),
}

/// Failures while writing a specific output file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The output file the failed stage was writing.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. } | Self::Encode { path, .. } => path,
        }
    }
}

/// Failures in loss evaluation.
#[derive(Debug, Error)]
pub enum LossError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Any failure along the inference pipeline. Every stage aborts the run;
/// nothing here is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Image(#[from] ImageDecodeError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
