//! Inference orchestration.
//!
//! One runner per process run: restore the model from its checkpoint, keep it
//! on the accelerator device, execute a single synchronous forward pass.
//! Inference backends carry no autodiff, so the pass records no gradients.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use burn::prelude::*;
use tracing::info;

use crate::error::{AssetError, DeviceError};
use crate::model::{ReconstructionResults, SceneReconstruction};

/// Owns the restored model and its device for the duration of the run.
pub struct InferenceRunner<B: Backend, M: SceneReconstruction<B>> {
    model: M,
    device: B::Device,
    backend: PhantomData<B>,
}

impl<B: Backend, M: SceneReconstruction<B>> InferenceRunner<B, M> {
    /// Wraps an already-restored model.
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            backend: PhantomData,
        }
    }

    /// Restores the model from `checkpoint` onto `device`.
    pub fn load(device: B::Device, checkpoint: &Path) -> Result<Self, AssetError> {
        info!(checkpoint = %checkpoint.display(), "load model");
        let model = M::load(&device, checkpoint)?;
        Ok(Self::new(model, device))
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Runs the single forward pass. Inputs must already live on the
    /// runner's device with the shapes fixed by [`SceneReconstruction`].
    pub fn run(
        &self,
        input: Tensor<B, 4>,
        intrinsic: Tensor<B, 2>,
        frustum_mask: Tensor<B, 5, Bool>,
    ) -> ReconstructionResults<B> {
        info!("perform panoptic 3d scene reconstruction");
        self.model.inference(input, intrinsic, frustum_mask)
    }
}

/// Probes the backend's default device.
///
/// Accelerator backends panic when no usable device exists; that surfaces
/// here as a [`DeviceError`] instead.
pub fn init_device<B: Backend>() -> Result<B::Device, DeviceError> {
    panic::catch_unwind(AssertUnwindSafe(B::Device::default))
        .map_err(|_| DeviceError::Unavailable("default device initialization panicked".into()))
}
