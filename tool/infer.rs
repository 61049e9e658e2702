//! Single-image inference CLI.
//!
//! Loads a trained checkpoint, reconstructs the scene behind one PNG image,
//! and exports every artifact into the output directory.

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;

use burn_panoptic::camera::{
    COLOR_IMAGE_SIZE, DEPTH_IMAGE_SIZE, adjust_intrinsic, intrinsic_to_tensor,
};
use burn_panoptic::config::{Config, RunMode};
use burn_panoptic::export::export_results;
use burn_panoptic::frustum::load_frustum_mask;
use burn_panoptic::inference::{InferenceRunner, init_device};
use burn_panoptic::model::{PanopticNet, PanopticNetConfig};
use burn_panoptic::preprocess::prepare_input;

#[cfg(feature = "backend_cuda")]
type InferenceBackend = burn::backend::Cuda<f32>;

#[cfg(all(feature = "backend_wgpu", not(feature = "backend_cuda")))]
type InferenceBackend = burn::backend::Wgpu<f32>;

#[cfg(all(
    feature = "backend_ndarray",
    not(feature = "backend_cuda"),
    not(feature = "backend_wgpu")
))]
type InferenceBackend = burn::backend::NdArray<f32>;

/// Precomputed visibility mask asset, keyed by array name `mask`.
const FRUSTUM_MASK_PATH: &str = "data/frustum_mask.npz";

#[derive(Debug, Parser)]
#[command(about = "Single-image panoptic 3D scene reconstruction", version)]
struct Args {
    /// Path to the PNG input image.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the exported artifacts.
    #[arg(short, long)]
    output: PathBuf,

    /// YAML configuration file.
    #[arg(short, long, default_value = "configs/front3d_sample.yaml")]
    config_file: PathBuf,

    /// Model checkpoint.
    #[arg(short, long, default_value = "data/panoptic_front3d.mpk")]
    model: PathBuf,

    /// Trailing `KEY value` pairs merged into the configuration last.
    #[arg(trailing_var_arg = true)]
    opts: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt().init();
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = Config::default()
        .merge_file(&args.config_file)?
        .merge_overrides(&args.opts)?
        .finalize(RunMode::Inference, &args.output);

    let device = init_device::<InferenceBackend>()?;

    let model = PanopticNet::load_with_config(&device, model_config(&config), &args.model)?;
    let runner = InferenceRunner::<InferenceBackend, _>::new(model, device.clone());

    info!(input = %args.input.display(), "load input image");
    let input = prepare_input::<InferenceBackend>(&args.input, &device)?;

    let intrinsic = adjust_intrinsic(
        config.model.projection.intrinsic,
        COLOR_IMAGE_SIZE,
        DEPTH_IMAGE_SIZE,
    );
    let intrinsic = intrinsic_to_tensor::<InferenceBackend>(intrinsic, &device);

    let frustum_mask = load_frustum_mask::<InferenceBackend>(
        Path::new(FRUSTUM_MASK_PATH),
        config.model.frustum3d.grid_dimensions,
        &device,
    )?;

    let results = runner.run(input, intrinsic, frustum_mask);
    export_results(&results, &config)?;

    info!(output = %config.output_dir.display(), "results saved");
    Ok(())
}

fn model_config(config: &Config) -> PanopticNetConfig {
    PanopticNetConfig {
        truncation: config.model.frustum3d.truncation,
        voxel_size: config.model.projection.voxel_size,
        ..PanopticNetConfig::default()
    }
}
